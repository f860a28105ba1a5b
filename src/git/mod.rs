//! Git gateway
//!
//! Everything the lookup pipeline knows about history comes through the
//! [`Vcs`] trait; [`GitRepo`] implements it by shelling out to `git` and
//! parsing its textual output. Each invocation runs with `LANG=C` /
//! `LANGUAGE=C` so the output is locale-independent.

pub mod diff;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SHA1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{40}\b").unwrap());

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {command:?} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("failed to run git: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid git file state: {0:?}")]
    InvalidFileState(String),
    #[error("Didn't find any commits in 'since' range, try updating your git repo")]
    EmptySinceRange,
}

/// How a commit altered a file, from git's single-letter status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileState {
    Added,
    Deleted,
    Modified,
    CopyEdit,
    RenameEdit,
}

impl FileState {
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'A' => Some(FileState::Added),
            'D' => Some(FileState::Deleted),
            'M' => Some(FileState::Modified),
            'C' => Some(FileState::CopyEdit),
            'R' => Some(FileState::RenameEdit),
            _ => None,
        }
    }
}

/// A (path, change-state) record from a commit's file list.
///
/// Equality is by path alone: the matcher looks resolved paths up inside
/// commit file lists, and the state is metadata rather than identity.
#[derive(Clone, Debug)]
pub struct GitFile {
    pub path: String,
    pub state: FileState,
}

impl GitFile {
    /// Fails closed on an unrecognized state letter.
    pub fn new(path: impl Into<String>, state: &str) -> Result<Self, GitError> {
        let letter = state.chars().next().unwrap_or(' ');
        let state = FileState::from_letter(letter)
            .ok_or_else(|| GitError::InvalidFileState(state.to_string()))?;
        Ok(GitFile {
            path: path.into(),
            state,
        })
    }
}

impl PartialEq for GitFile {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl PartialEq<str> for GitFile {
    fn eq(&self, other: &str) -> bool {
        self.path == other
    }
}

/// Metadata for one commit, fetched lazily and cached by the result layer.
#[derive(Clone, Debug)]
pub struct CommitInfo {
    pub commit: String,
    pub subject: String,
    pub author_name: String,
    pub author_email: String,
    /// Commit date, RFC2822 as printed by `git log --format=%cD`.
    pub date: String,
    pub body: String,
    /// Review URL from a `Differential Revision:` body line, if any.
    pub url: Option<String>,
}

/// Query interface to version-control history.
///
/// Object-safe so tests can substitute a canned implementation.
pub trait Vcs {
    /// Files changed by each commit in the range.
    fn files_touched(&self, range: &str) -> Result<BTreeMap<String, Vec<GitFile>>, GitError>;

    /// Full file listing at the range's upper endpoint.
    fn files(&self, range: &str) -> Result<Vec<String>, GitError>;

    /// Commits in the range whose diff changed the occurrence count of
    /// `snippet`, each paired with whether the line was removed (`true`)
    /// or added (`false`). Hits where the snippet only matched part of a
    /// line are filtered out.
    fn pickaxe(
        &self,
        snippet: &str,
        range: &str,
        path: Option<&str>,
    ) -> Result<Vec<(String, bool)>, GitError>;

    /// Whether `line_number` of `path` was added in `commit`.
    fn line_added_in_commit(
        &self,
        commit: &str,
        path: &str,
        line_number: u32,
    ) -> Result<bool, GitError>;

    fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError>;

    /// Convert a `--since` value into an explicit `old..new` range.
    fn convert_since(&self, since: &str, branch: Option<&str>) -> Result<String, GitError>;

    /// Whether the range contains any commits at all.
    fn valid_range(&self, range: &str) -> Result<bool, GitError>;
}

/// Git-by-subprocess implementation of [`Vcs`].
pub struct GitRepo {
    dir: Option<PathBuf>,
}

impl GitRepo {
    /// Operate on the repository in the current working directory.
    pub fn new() -> Self {
        GitRepo { dir: None }
    }

    /// Operate on the repository at `dir` (used by tests).
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        GitRepo {
            dir: Some(dir.into()),
        }
    }

    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        debug!("running git {:?}", args);
        let mut command = Command::new("git");
        command.args(args).env("LANG", "C").env("LANGUAGE", "C");
        if let Some(dir) = &self.dir {
            command.current_dir(dir);
        }
        let output = command.output()?;
        if !output.status.success() {
            return Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
    }

    fn diff_text(&self, commit: &str) -> Result<String, GitError> {
        self.run(&["log", "-1", "--format=", "-p", commit])
    }

    /// Classify a pickaxe hit: `Some(true)` if the snippet was removed in
    /// the commit, `Some(false)` if added, `None` if it never matched a
    /// full changed line. Pickaxe matches substrings, so a hit whose
    /// snippet only appears as a fragment of a line is discarded here.
    fn line_removed(&self, snippet: &str, commit: &str) -> Result<Option<bool>, GitError> {
        let patch = self.diff_text(commit)?;
        for file in diff::parse_patch(&patch) {
            for change in &file.changes {
                if change.text.trim() == snippet {
                    if change.is_added() {
                        return Ok(Some(false));
                    }
                    if change.is_removed() {
                        return Ok(Some(true));
                    }
                }
            }
        }
        Ok(None)
    }
}

impl Default for GitRepo {
    fn default() -> Self {
        GitRepo::new()
    }
}

impl Vcs for GitRepo {
    fn files_touched(&self, range: &str) -> Result<BTreeMap<String, Vec<GitFile>>, GitError> {
        let data = self.run(&["log", "--pretty=%H", "--raw", range])?;
        parse_files_touched(&data)
    }

    fn files(&self, range: &str) -> Result<Vec<String>, GitError> {
        // The listing is taken at the upper endpoint of the range.
        let commit = range.rsplit('.').next().unwrap_or(range);
        let data = self.run(&["ls-tree", "-r", "--name-only", commit])?;
        Ok(data.lines().map(|line| line.to_string()).collect())
    }

    fn pickaxe(
        &self,
        snippet: &str,
        range: &str,
        path: Option<&str>,
    ) -> Result<Vec<(String, bool)>, GitError> {
        let mut args = vec!["log", "-b", "--pretty=%H", "-S", snippet, range];
        if let Some(path) = path {
            args.push("--");
            args.push(path);
        }
        let data = self.run(&args)?;

        let mut hits = Vec::new();
        for commit in data.lines().filter(|line| !line.is_empty()) {
            // Pickaxe matches substrings; keep only full-line matches.
            if let Some(removed) = self.line_removed(snippet, commit)? {
                hits.push((commit.to_string(), removed));
            }
        }
        Ok(hits)
    }

    fn line_added_in_commit(
        &self,
        commit: &str,
        path: &str,
        line_number: u32,
    ) -> Result<bool, GitError> {
        let patch = self.diff_text(commit)?;
        for file in diff::parse_patch(&patch) {
            if file.new_path.as_deref() != Some(path) {
                continue;
            }
            for change in &file.changes {
                if change.is_added() && change.new_line == Some(line_number) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn commit_info(&self, commit: &str) -> Result<CommitInfo, GitError> {
        let format = "--format=%H%x00%s%x00%aN%x00%aE%x00%cD%x00%b";
        let data = self.run(&["log", "-1", format, commit])?;
        let mut fields = data.splitn(6, '\0');
        let mut next = || fields.next().unwrap_or("").to_string();
        let commit = next();
        let subject = next();
        let author_name = next();
        let author_email = next();
        let date = next();
        let body = next();

        let url = body
            .lines()
            .find(|line| line.starts_with("Differential Revision:"))
            .and_then(|line| line.split_whitespace().nth(2))
            .map(|url| url.to_string());

        Ok(CommitInfo {
            commit,
            subject,
            author_name,
            author_email,
            date,
            body,
            url,
        })
    }

    fn convert_since(&self, since: &str, branch: Option<&str>) -> Result<String, GitError> {
        let since_arg = format!("--since={}", since);
        let mut args = vec!["log", "--pretty=%H", since_arg.as_str()];
        if let Some(branch) = branch {
            args.push(branch);
        }
        let data = self.run(&args)?;
        parse_since_range(&data)
    }

    fn valid_range(&self, range: &str) -> Result<bool, GitError> {
        let data = self.run(&["log", "--oneline", range])?;
        Ok(data.lines().any(|line| !line.is_empty()))
    }
}

/// Parse `git log --pretty=%H --raw` output into per-commit file lists.
///
/// Commit boundaries are lines that are bare 40-hex ids; `--raw` lines are
/// tab-separated with the status letters in the first field and the path
/// last (renames and copies list the new path last).
fn parse_files_touched(data: &str) -> Result<BTreeMap<String, Vec<GitFile>>, GitError> {
    let mut commits: BTreeMap<String, Vec<GitFile>> = BTreeMap::new();
    let mut commit: Option<String> = None;

    for line in data.lines() {
        if SHA1_RE.is_match(line) {
            let id = line.to_string();
            commits.entry(id.clone()).or_default();
            commit = Some(id);
        } else if !line.trim().is_empty() {
            let commit = match &commit {
                Some(commit) => commit,
                None => continue,
            };
            let fields: Vec<&str> = line.split('\t').collect();
            let path = fields[fields.len() - 1];
            let state = fields[0].split(' ').next_back().unwrap_or("");
            let file = GitFile::new(path, state)?;
            if let Some(files) = commits.get_mut(commit) {
                files.push(file);
            }
        }
    }
    Ok(commits)
}

fn parse_since_range(data: &str) -> Result<String, GitError> {
    let lines: Vec<&str> = data.lines().filter(|line| !line.is_empty()).collect();
    match (lines.last(), lines.first()) {
        (Some(oldest), Some(newest)) => Ok(format!("{}..{}", oldest, newest)),
        _ => Err(GitError::EmptySinceRange),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_file_states() {
        assert_eq!(GitFile::new("file1", "M").unwrap().state, FileState::Modified);
        assert_eq!(GitFile::new("file2", "A").unwrap().state, FileState::Added);
        assert_eq!(GitFile::new("file3", "C68").unwrap().state, FileState::CopyEdit);
        assert!(matches!(
            GitFile::new("file1", "x"),
            Err(GitError::InvalidFileState(_))
        ));
    }

    #[test]
    fn test_git_file_equality_by_path() {
        let modified = GitFile::new("file1", "M").unwrap();
        let added = GitFile::new("file1", "A").unwrap();
        assert_eq!(modified, added);
        assert!(modified == *"file1");
    }

    #[test]
    fn test_parse_files_touched() {
        let data = "\
1ca8dd2b178ef8f308849bac2b0eaecaf91abc70

:100644 100644 bcd1234... 0123456... M\tfile0
:100644 100644 abcd123... 1234567... C68\tfile1\tfile2
:100644 100644 abcd123... 1234567... R86\tfile1\tfile3
:000000 100644 0000000... 1234567... A\tfile4 space/log
:100644 000000 1234567... 0000000... D\tfile5";
        let commits = parse_files_touched(data).unwrap();
        let files = &commits["1ca8dd2b178ef8f308849bac2b0eaecaf91abc70"];
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["file0", "file2", "file3", "file4 space/log", "file5"]);
        assert_eq!(files[1].state, FileState::CopyEdit);
        assert_eq!(files[2].state, FileState::RenameEdit);
    }

    #[test]
    fn test_parse_since_range() {
        let data = "\
de75c8dd27af30daef012a9902af4c39c4728710
04a13ace3a3e490a5e1a74aae740f45fee6562c3
32eba9e2c389c427c5b7b2288353eaf0903d52c0";
        let range = parse_since_range(data).unwrap();
        assert_eq!(
            range,
            "32eba9e2c389c427c5b7b2288353eaf0903d52c0..de75c8dd27af30daef012a9902af4c39c4728710"
        );
    }

    #[test]
    fn test_parse_since_range_empty() {
        assert!(matches!(
            parse_since_range(""),
            Err(GitError::EmptySinceRange)
        ));
    }
}
