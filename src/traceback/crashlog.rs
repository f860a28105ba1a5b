//! Native crash report dialect (iOS-style crash logs)
//!
//! Identified by the `Incident Identifier:` header token. Only the frames
//! of the crashed thread are extracted; the rest of the report (other
//! threads, binary images, register state) is ignored. Frame lines carry
//! a frame number, module, address and function call, with an optional
//! trailing `(file:line)` and a memory offset suffix that gets stripped.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{Dialect, Extracted, Frame, ParseError};

const HEADER_TOKEN: &str = "Incident Identifier:";

static CRASHED_THREAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Thread \d+ Crashed").unwrap());

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+\s+(?P<module>\S+)\s+(?P<address>0x[0-9a-fA-F]+)\s+(?P<call>.+)$").unwrap()
});

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+\((?P<file>[^:()]+):(?P<line>\d+)\)$").unwrap());

static OFFSET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+\+\s+\d+$").unwrap());

#[derive(Debug)]
pub struct CrashLog;

impl Dialect for CrashLog {
    fn name(&self) -> &'static str {
        "crashlog"
    }

    fn extract_frames(&self, lines: &[String]) -> Result<Extracted, ParseError> {
        if !lines.iter().any(|line| line.starts_with(HEADER_TOKEN)) {
            return Err(ParseError::MissingHeader);
        }

        let marker = lines
            .iter()
            .position(|line| CRASHED_THREAD_RE.is_match(line))
            .ok_or(ParseError::NoFrames)?;

        let mut frames = Vec::new();
        let mut end = marker + 1;
        for line in &lines[marker + 1..] {
            let caps = match FRAME_RE.captures(line) {
                Some(caps) => caps,
                None => break,
            };
            end += 1;

            let mut call = caps["call"].to_string();
            let mut source_file = None;
            let mut line_number = None;
            if let Some(loc) = LOCATION_RE.captures(&call) {
                source_file = Some(loc["file"].to_string());
                line_number = loc["line"].parse::<u32>().ok();
                call = LOCATION_RE.replace(&call, "").into_owned();
            }
            call = OFFSET_RE.replace(&call, "").into_owned();

            let module = caps["module"].to_string();
            let path = source_file.unwrap_or_else(|| module.clone());
            let mut frame = Frame::new(path, line_number, Some(call), None);
            frame.class_name = Some(module);
            frames.push(frame);
        }
        if frames.is_empty() {
            return Err(ParseError::NoFrames);
        }

        Ok(Extracted {
            header: lines[..=marker].to_vec(),
            footer: lines[end..].to_vec(),
            frames,
        })
    }

    fn format_frames(&self, frames: &[Frame]) -> String {
        frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                let module = frame.class_name.as_deref().unwrap_or("???");
                let call = frame.function_name.as_deref().unwrap_or("");
                match frame.line_number {
                    Some(n) => {
                        format!("{}   {}  {} ({}:{})\n", i, module, call, frame.source_path, n)
                    }
                    None => format!("{}   {}  {}\n", i, module, call),
                }
            })
            .collect()
    }

    /// Crash log frames carry bare file names, so a repository path
    /// matches when it ends with the frame's file name.
    fn match_filenames(&self, trace_filename: &str, git_files: &[String]) -> Vec<String> {
        git_files
            .iter()
            .filter(|git_file| git_file.ends_with(trace_filename))
            .cloned()
            .collect()
    }
}
