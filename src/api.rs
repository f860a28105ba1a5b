//! Lookup pipeline
//!
//! Ties the parsed traceback to history: resolve each frame's recorded
//! path to a repository path, register file-level evidence for every
//! commit in range that touched it, then run a pickaxe search for each
//! frame's source snippet to find the commits that added or removed that
//! exact line.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::git::{GitError, GitFile, Vcs};
use crate::result::Results;
use crate::traceback::Traceback;

/// Most specific candidate: greatest number of `/`-delimited segments.
/// The first maximal element wins when several tie, so the choice is
/// stable for a given candidate order.
fn longest_filename(matches: &[String]) -> Option<&String> {
    let mut best: Option<(&String, usize)> = None;
    for candidate in matches {
        let segments = candidate.split('/').count();
        if best.map_or(true, |(_, most)| segments > most) {
            best = Some((candidate, segments));
        }
    }
    best.map(|(candidate, _)| candidate)
}

/// Resolve frame paths against the repository file list and register
/// file-level evidence for every commit whose change list contains the
/// resolved path.
fn lookup_files(
    vcs: &dyn Vcs,
    commit_files: &BTreeMap<String, Vec<GitFile>>,
    git_files: &[String],
    traceback: &mut Traceback,
    results: &mut Results,
) -> Result<(), GitError> {
    let match_lists: Vec<Vec<String>> = traceback
        .frames
        .iter()
        .map(|frame| {
            traceback
                .dialect()
                .match_filenames(&frame.source_path, git_files)
        })
        .collect();

    for (frame, matches) in traceback.frames.iter_mut().zip(match_lists) {
        let best = match longest_filename(&matches) {
            Some(best) => best.clone(),
            None => continue,
        };

        for (commit, file_list) in commit_files {
            let git_file = match file_list.iter().find(|file| file.path == best) {
                Some(git_file) => git_file,
                None => continue,
            };
            if frame.resolved_path.is_none() {
                frame.resolved_path = Some(git_file.path.clone());
            }
            let line_number = match frame.line_number {
                Some(line) if vcs.line_added_in_commit(commit, &git_file.path, line)? => {
                    Some(line)
                }
                _ => None,
            };
            results.get_result(commit).add_file(git_file, line_number);
        }

        // Best-effort default so the pickaxe search still has a filename
        // to scope by even when no commit in range touched it.
        if frame.resolved_path.is_none() {
            frame.resolved_path = Some(best);
        }
    }
    Ok(())
}

/// Look up which commits in `range` could have caused the stacktrace.
///
/// With `fast` set, frames whose file could not be resolved are not
/// pickaxe-searched at all, trading recall for speed.
pub fn lookup_stacktrace(
    vcs: &dyn Vcs,
    traceback: &mut Traceback,
    range: &str,
    fast: bool,
) -> Result<Results, GitError> {
    let mut results = Results::new();

    let commit_files = vcs.files_touched(range)?;
    let git_files = vcs.files(range)?;
    lookup_files(vcs, &commit_files, &git_files, traceback, &mut results)?;

    for frame in &traceback.frames {
        let snippet = match &frame.source_snippet {
            Some(snippet) => snippet,
            None => continue,
        };
        if fast && frame.resolved_path.is_none() {
            debug!("fast mode: skipping unresolved frame {}", frame.source_path);
            continue;
        }
        let hits = match vcs.pickaxe(snippet, range, frame.resolved_path.as_deref()) {
            Ok(hits) => hits,
            Err(err) => {
                // Partial results beat total failure; move on to the
                // next frame.
                warn!("pickaxe failed for {:?}: {}", snippet, err);
                continue;
            }
        };
        for (commit, line_removed) in hits {
            let evidence = results.get_result(&commit);
            if line_removed {
                evidence.lines_removed.insert(snippet.clone());
            } else {
                evidence.lines_added.insert(snippet.clone());
            }
        }
    }

    Ok(results)
}
