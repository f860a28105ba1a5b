//! JavaScript (V8) stack trace dialect
//!
//! Frames are tab-prefixed `at symbol (path:line:col)` lines, with both
//! the symbol and the parenthesized location optional in V8's output.
//! No source snippet ever appears in this format.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, Extracted, Frame, ParseError};

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:(?P<symbol>.+) \((?P<path>.+):(?P<line>\d+):(?P<col>\d+)\)|(?P<bare_path>.+):(?P<bare_line>\d+):(?P<bare_col>\d+))$",
    )
    .unwrap()
});

#[derive(Debug)]
pub struct JavaScript;

impl Dialect for JavaScript {
    fn name(&self) -> &'static str {
        "javascript"
    }

    fn extract_frames(&self, lines: &[String]) -> Result<Extracted, ParseError> {
        let first = lines.iter().position(|line| line.starts_with('\t'));
        let last = lines.iter().rposition(|line| line.starts_with('\t'));
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ParseError::NoFrames),
        };

        let header: Vec<String> = lines[..first].to_vec();
        let footer: Vec<String> = lines[last + 1..].to_vec();

        let mut frames = Vec::new();
        for line in &lines[first..=last] {
            if !line.starts_with('\t') {
                continue;
            }
            let rest = line
                .strip_prefix("\tat ")
                .ok_or_else(|| ParseError::MalformedFrame(line.clone()))?;

            let frame = match FRAME_RE.captures(rest) {
                Some(caps) => {
                    let (path, line_number) = if let Some(path) = caps.name("path") {
                        (path.as_str(), caps.name("line"))
                    } else {
                        (
                            caps.name("bare_path").map(|m| m.as_str()).unwrap_or(""),
                            caps.name("bare_line"),
                        )
                    };
                    let line_number = line_number
                        .and_then(|m| m.as_str().parse::<u32>().ok())
                        .ok_or_else(|| ParseError::MalformedFrame(line.clone()))?;
                    let symbol = caps.name("symbol").map(|m| m.as_str().to_string());
                    Frame::new(path, Some(line_number), symbol, None)
                }
                // Location-less frame, e.g. `at runMicrotasks (<anonymous>)`:
                // keep the symbol, there is no file or line to resolve.
                None => match rest.rsplit_once(" (") {
                    Some((symbol, location)) => Frame::new(
                        location.trim_end_matches(')'),
                        None,
                        Some(symbol.to_string()),
                        None,
                    ),
                    None => Frame::new(rest, None, None, None),
                },
            };
            frames.push(frame);
        }
        if frames.is_empty() {
            return Err(ParseError::NoFrames);
        }

        Ok(Extracted {
            header,
            footer,
            frames,
        })
    }

    fn format_frames(&self, frames: &[Frame]) -> String {
        frames
            .iter()
            .map(|frame| {
                let location = match frame.line_number {
                    Some(n) => format!("{}:{}", frame.source_path, n),
                    None => frame.source_path.clone(),
                };
                match &frame.function_name {
                    Some(symbol) => format!("\tat {} ({})\n", symbol, location),
                    None => format!("\tat {}\n", location),
                }
            })
            .collect()
    }

    /// V8 frame paths are absolute bundle/module paths, matched like
    /// Python's: the frame path ends with the repository path.
    fn match_filenames(&self, trace_filename: &str, git_files: &[String]) -> Vec<String> {
        git_files
            .iter()
            .filter(|git_file| trace_filename.ends_with(git_file.as_str()))
            .cloned()
            .collect()
    }
}
