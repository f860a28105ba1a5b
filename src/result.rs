//! Evidence accumulation and ranking
//!
//! Every commit the pipeline finds evidence against gets one
//! [`CommitEvidence`] record, created on first reference and shared by
//! every later lookup of the same commit id. The rank is a fixed weighted
//! sum over the evidence sets; the weights are pinned by tests and
//! deliberately not configurable.

use std::collections::{BTreeMap, BTreeSet};

use chrono::DateTime;
use once_cell::unsync::OnceCell;
use serde_json::json;

use crate::git::{CommitInfo, FileState, GitError, GitFile, Vcs};

/// Accumulated evidence that one commit is related to the stacktrace.
pub struct CommitEvidence {
    commit: String,
    /// Keys are `path` or `path:line` when an exact line number matched.
    pub files_added: BTreeSet<String>,
    pub files_modified: BTreeSet<String>,
    pub files_deleted: BTreeSet<String>,
    pub lines_added: BTreeSet<String>,
    pub lines_removed: BTreeSet<String>,
    pub line_number_matches: usize,
    info: OnceCell<CommitInfo>,
}

impl CommitEvidence {
    fn new(commit: impl Into<String>) -> Self {
        CommitEvidence {
            commit: commit.into(),
            files_added: BTreeSet::new(),
            files_modified: BTreeSet::new(),
            files_deleted: BTreeSet::new(),
            lines_added: BTreeSet::new(),
            lines_removed: BTreeSet::new(),
            line_number_matches: 0,
            info: OnceCell::new(),
        }
    }

    pub fn commit(&self) -> &str {
        &self.commit
    }

    /// Register file-level evidence. A line number means the exact
    /// traceback line was added by this commit, the strongest signal.
    pub fn add_file(&mut self, file: &GitFile, line_number: Option<u32>) {
        let key = match line_number {
            Some(line) => format!("{}:{}", file.path, line),
            None => file.path.clone(),
        };
        if line_number.is_some() {
            self.line_number_matches += 1;
        }
        match file.state {
            FileState::Added | FileState::CopyEdit => self.files_added.insert(key),
            FileState::Deleted => self.files_deleted.insert(key),
            FileState::Modified | FileState::RenameEdit => self.files_modified.insert(key),
        };
    }

    /// Commit metadata, fetched on first access and cached for the life
    /// of this record. History is immutable, so no invalidation.
    pub fn info(&self, vcs: &dyn Vcs) -> Result<&CommitInfo, GitError> {
        self.info.get_or_try_init(|| vcs.commit_info(&self.commit))
    }

    /// Weighted evidence score. Weights reflect confidence: an exact
    /// line-number match is the strongest signal, a merely-modified file
    /// the weakest.
    pub fn rank(&self) -> usize {
        self.files_modified.len()
            + self.files_deleted.len() * 2
            + self.files_added.len() * 3
            + self.lines_added.len() * 3
            + self.lines_removed.len() * 2
            + self.line_number_matches * 4
    }

    /// Human-readable report block for this commit.
    pub fn format(&self, vcs: &dyn Vcs) -> Result<String, GitError> {
        let info = self.info(vcs)?;
        let mut out = format!(
            "commit {}\nCommit Date: {}\nAuthor:      {} <{}>\nSubject:     {}\n",
            info.commit, info.date, info.author_name, info.author_email, info.subject
        );
        if let Some(url) = &info.url {
            out.push_str(&format!("Link:        {}\n", url));
        }
        push_section(&mut out, "Files Added", &self.files_added, false);
        push_section(&mut out, "Files Modified", &self.files_modified, false);
        push_section(&mut out, "Files Deleted", &self.files_deleted, false);
        push_section(&mut out, "Lines Added", &self.lines_added, true);
        push_section(&mut out, "Lines Removed", &self.lines_removed, true);
        Ok(out)
    }

    /// Key-value projection for JSON output: commit id, metadata fields,
    /// and the evidence sets as ordered lists.
    pub fn to_json(&self, vcs: &dyn Vcs) -> Result<serde_json::Value, GitError> {
        let info = self.info(vcs)?;
        // Normalize git's RFC2822 date when it parses; pass it through
        // untouched otherwise.
        let date = DateTime::parse_from_rfc2822(&info.date)
            .map(|date| date.to_rfc3339())
            .unwrap_or_else(|_| info.date.clone());
        Ok(json!({
            "commit": &self.commit,
            "subject": &info.subject,
            "author_name": &info.author_name,
            "author_email": &info.author_email,
            "date": date,
            "body": &info.body,
            "url": &info.url,
            "files_added": &self.files_added,
            "files_modified": &self.files_modified,
            "files_deleted": &self.files_deleted,
            "lines_added": &self.lines_added,
            "lines_removed": &self.lines_removed,
            "rank": self.rank(),
        }))
    }
}

fn push_section(out: &mut String, title: &str, entries: &BTreeSet<String>, quoted: bool) {
    if entries.is_empty() {
        return;
    }
    out.push_str(title);
    out.push_str(":\n");
    for entry in entries {
        if quoted {
            out.push_str(&format!("    - \"{}\"\n", entry));
        } else {
            out.push_str(&format!("    - {}\n", entry));
        }
    }
}

/// Commit-id-keyed registry of evidence records.
#[derive(Default)]
pub struct Results {
    results: BTreeMap<String, CommitEvidence>,
}

impl Results {
    pub fn new() -> Self {
        Results::default()
    }

    /// Get-or-create: repeated lookups of the same commit id return the
    /// same record, so evidence accumulates in one place.
    pub fn get_result(&mut self, commit: &str) -> &mut CommitEvidence {
        self.results
            .entry(commit.to_string())
            .or_insert_with(|| CommitEvidence::new(commit))
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// All evidence ordered by descending rank; ties broken by ascending
    /// commit id so the ordering is stable across runs.
    pub fn sorted(&self) -> Vec<&CommitEvidence> {
        let mut sorted: Vec<&CommitEvidence> = self.results.values().collect();
        sorted.sort_by(|a, b| {
            b.rank()
                .cmp(&a.rank())
                .then_with(|| a.commit().cmp(b.commit()))
        });
        sorted
    }
}
