//! Minimal unified diff parser
//!
//! Parses `git log -p` / `git diff` output into per-file change lists,
//! tracking the old- and new-side line number of every changed line. An
//! added line has no old-side number, a removed line has no new-side
//! number, a context line has both.

use once_cell::sync::Lazy;
use regex::Regex;

static HUNK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^@@ -(\d+)(?:,\d+)? \+(\d+)(?:,\d+)? @@").unwrap());

/// One changed or context line inside a hunk.
#[derive(Clone, Debug, PartialEq)]
pub struct Change {
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
    pub text: String,
}

impl Change {
    pub fn is_added(&self) -> bool {
        self.old_line.is_none() && self.new_line.is_some()
    }

    pub fn is_removed(&self) -> bool {
        self.old_line.is_some() && self.new_line.is_none()
    }
}

/// All hunk lines for one file in a patch.
#[derive(Clone, Debug, Default)]
pub struct FileDiff {
    /// Path on the new side, `None` for deleted files.
    pub new_path: Option<String>,
    /// Path on the old side, `None` for added files.
    pub old_path: Option<String>,
    pub changes: Vec<Change>,
}

/// Parse a full patch (possibly spanning several files) into per-file diffs.
pub fn parse_patch(patch: &str) -> Vec<FileDiff> {
    let mut files: Vec<FileDiff> = Vec::new();
    let mut old_line: u32 = 0;
    let mut new_line: u32 = 0;
    let mut in_hunk = false;

    for line in patch.lines() {
        if line.starts_with("diff --git ") {
            files.push(FileDiff::default());
            in_hunk = false;
        } else if let Some(path) = line.strip_prefix("--- ") {
            if let Some(file) = files.last_mut() {
                file.old_path = strip_diff_prefix(path);
            }
        } else if let Some(path) = line.strip_prefix("+++ ") {
            if let Some(file) = files.last_mut() {
                file.new_path = strip_diff_prefix(path);
            }
        } else if let Some(caps) = HUNK_RE.captures(line) {
            old_line = caps[1].parse().unwrap_or(0);
            new_line = caps[2].parse().unwrap_or(0);
            in_hunk = true;
        } else if in_hunk {
            let file = match files.last_mut() {
                Some(file) => file,
                None => continue,
            };
            if let Some(text) = line.strip_prefix('+') {
                file.changes.push(Change {
                    old_line: None,
                    new_line: Some(new_line),
                    text: text.to_string(),
                });
                new_line += 1;
            } else if let Some(text) = line.strip_prefix('-') {
                file.changes.push(Change {
                    old_line: Some(old_line),
                    new_line: None,
                    text: text.to_string(),
                });
                old_line += 1;
            } else if let Some(text) = line.strip_prefix(' ') {
                file.changes.push(Change {
                    old_line: Some(old_line),
                    new_line: Some(new_line),
                    text: text.to_string(),
                });
                old_line += 1;
                new_line += 1;
            }
            // "\ No newline at end of file" and anything else: skip.
        }
    }

    files
}

/// Drop the `a/` / `b/` prefix git puts on paths; `/dev/null` means the
/// file has no content on that side.
fn strip_diff_prefix(path: &str) -> Option<String> {
    if path == "/dev/null" {
        return None;
    }
    let stripped = path
        .strip_prefix("a/")
        .or_else(|| path.strip_prefix("b/"))
        .unwrap_or(path);
    Some(stripped.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PATCH: &str = "\
diff --git a/app/web.py b/app/web.py
index 1234567..89abcde 100644
--- a/app/web.py
+++ b/app/web.py
@@ -10,4 +10,5 @@ def handle(url):
 context_before
-old_line = 1
+new_line = 1
+extra_line = 2
 context_after
diff --git a/removed.py b/removed.py
deleted file mode 100644
--- a/removed.py
+++ /dev/null
@@ -1,2 +0,0 @@
-gone = True
-also_gone = True
";

    #[test]
    fn test_paths() {
        let files = parse_patch(PATCH);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].new_path.as_deref(), Some("app/web.py"));
        assert_eq!(files[0].old_path.as_deref(), Some("app/web.py"));
        assert_eq!(files[1].new_path, None);
        assert_eq!(files[1].old_path.as_deref(), Some("removed.py"));
    }

    #[test]
    fn test_line_numbers() {
        let files = parse_patch(PATCH);
        let changes = &files[0].changes;

        assert_eq!(changes[0].old_line, Some(10));
        assert_eq!(changes[0].new_line, Some(10));
        assert_eq!(changes[0].text, "context_before");

        // Removed line occupies old-side 11.
        assert_eq!(changes[1].old_line, Some(11));
        assert_eq!(changes[1].new_line, None);
        assert!(changes[1].is_removed());

        // Added lines occupy new-side 11 and 12.
        assert_eq!(changes[2].new_line, Some(11));
        assert_eq!(changes[2].old_line, None);
        assert!(changes[2].is_added());
        assert_eq!(changes[3].new_line, Some(12));

        // Context after resumes with both counters advanced.
        assert_eq!(changes[4].old_line, Some(12));
        assert_eq!(changes[4].new_line, Some(13));
    }

    #[test]
    fn test_empty_patch() {
        assert!(parse_patch("").is_empty());
    }
}
