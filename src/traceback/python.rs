//! Python traceback dialect
//!
//! Frames are two-space-indented pairs: a `File "...", line N, in func`
//! header followed by an optional source line. The extracted frames are
//! reformatted and compared against the input as a self-check; any
//! disagreement fails the parse rather than returning bad frames.

use super::{Dialect, Extracted, Frame, ParseError};

const FRAME_PREFIX: &str = "  File \"";

#[derive(Debug)]
pub struct Python;

impl Python {
    fn format_frame(frame: &Frame) -> String {
        let mut out = format!(
            "{}{}\", line {}, in {}\n",
            FRAME_PREFIX,
            frame.source_path,
            frame.line_number.unwrap_or(0),
            frame.function_name.as_deref().unwrap_or(""),
        );
        if let Some(snippet) = &frame.source_snippet {
            out.push_str("    ");
            out.push_str(snippet);
            out.push('\n');
        }
        out
    }
}

impl Dialect for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn extract_frames(&self, lines: &[String]) -> Result<Extracted, ParseError> {
        let first = lines.iter().position(|line| line.starts_with("  "));
        let last = lines.iter().rposition(|line| line.starts_with("  "));
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(ParseError::NoFrames),
        };

        let header: Vec<String> = lines[..first].to_vec();
        let footer: Vec<String> = lines[last + 1..].to_vec();
        let frame_lines: Vec<&String> = lines[first..=last]
            .iter()
            .filter(|line| line.starts_with("  "))
            .collect();

        let mut frames = Vec::new();
        let mut i = 0;
        while i < frame_lines.len() {
            let line = frame_lines[i];
            let words: Vec<&str> = line.split(", ").collect();
            if words.len() < 3
                || !words[0].starts_with(FRAME_PREFIX)
                || !words[1].starts_with("line ")
                || !words[2].starts_with("in")
            {
                return Err(ParseError::MalformedFrame(line.clone()));
            }

            let path = words[0]
                .split('"')
                .nth(1)
                .ok_or_else(|| ParseError::MalformedFrame(line.clone()))?
                .trim();
            let line_number: u32 = words[1]
                .split(' ')
                .nth(1)
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| ParseError::MalformedFrame(line.clone()))?;
            let function: String = words[2]
                .split(' ')
                .skip(1)
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            // The next line is the source snippet unless it opens a new frame.
            let snippet = match frame_lines.get(i + 1) {
                Some(next) if !next.starts_with(FRAME_PREFIX) => {
                    i += 1;
                    Some(next.trim().to_string())
                }
                _ => None,
            };
            i += 1;

            frames.push(Frame::new(path, Some(line_number), Some(function), snippet));
        }

        if frames.is_empty() {
            return Err(ParseError::NoFrames);
        }

        // Sanity check: reformatting the frames must reproduce the input
        // exactly, otherwise something above mis-parsed.
        let original: String = frame_lines
            .iter()
            .map(|line| format!("{}\n", line))
            .collect();
        if self.format_frames(&frames) != original {
            return Err(ParseError::RoundTrip);
        }

        Ok(Extracted {
            header,
            footer,
            frames,
        })
    }

    fn format_frames(&self, frames: &[Frame]) -> String {
        frames.iter().map(Python::format_frame).collect()
    }

    /// Python frame paths are absolute or prefixed forms of repository
    /// paths, so a repository path matches when the frame path ends with it.
    fn match_filenames(&self, trace_filename: &str, git_files: &[String]) -> Vec<String> {
        git_files
            .iter()
            .filter(|git_file| trace_filename.ends_with(git_file.as_str()))
            .cloned()
            .collect()
    }
}
