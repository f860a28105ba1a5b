//! Java stack trace dialect
//!
//! Frames are tab-prefixed `at pkg.Class.method(File.java:N)` lines,
//! optionally ending in `(Native Method)` or `(Unknown Source)` in place
//! of the file and line. The frame's file path is derived from the
//! package: `com.example.Book.getTitle(Book.java:16)` becomes
//! `com/example/Book.java`.

use super::{Dialect, Extracted, Frame, ParseError};

#[derive(Debug)]
pub struct Java;

impl Java {
    fn parse_frame(line: &str) -> Result<Frame, ParseError> {
        let malformed = || ParseError::MalformedFrame(line.to_string());

        if !line.starts_with('\t') {
            return Err(malformed());
        }
        let tokens: Vec<&str> = line
            .trim_start_matches('\t')
            .split(|c| c == ' ' || c == '(' || c == ')' || c == ':')
            .collect();
        if tokens.len() != 5 || tokens[0] != "at" {
            return Err(malformed());
        }

        // tokens[1] is the fully qualified method: package segments, then
        // the class, then the method name.
        let qualified: Vec<&str> = tokens[1].split('.').collect();
        if qualified.len() < 2 {
            return Err(malformed());
        }
        let function = qualified[qualified.len() - 1].to_string();
        let class = qualified[qualified.len() - 2].to_string();
        let package_dirs = &qualified[..qualified.len() - 2];

        let is_native = tokens[2] == "Native" && tokens[3] == "Method";
        let is_unknown = tokens[2] == "Unknown" && tokens[3] == "Source";

        let file = if is_native || is_unknown {
            format!("{}.java", class)
        } else {
            tokens[2].to_string()
        };
        let path = if package_dirs.is_empty() {
            file
        } else {
            format!("{}/{}", package_dirs.join("/"), file)
        };

        let line_number = if is_native || is_unknown {
            None
        } else {
            Some(tokens[3].parse::<u32>().map_err(|_| malformed())?)
        };

        let mut frame = Frame::new(path, line_number, Some(function), None);
        frame.class_name = Some(class);
        frame.is_native_method = is_native;
        frame.is_unknown_source = is_unknown;
        Ok(frame)
    }

    fn format_frame(frame: &Frame) -> String {
        // Rebuild pkg.Class.method from the derived path and names.
        let package = frame
            .source_path
            .rsplit_once('/')
            .map(|(dirs, _)| dirs.replace('/', "."))
            .unwrap_or_default();
        let class = frame.class_name.as_deref().unwrap_or("");
        let method = frame.function_name.as_deref().unwrap_or("");
        let qualified = if package.is_empty() {
            format!("{}.{}", class, method)
        } else {
            format!("{}.{}.{}", package, class, method)
        };

        let location = if frame.is_native_method {
            "Native Method".to_string()
        } else if frame.is_unknown_source {
            "Unknown Source".to_string()
        } else {
            let file = frame
                .source_path
                .rsplit('/')
                .next()
                .unwrap_or(&frame.source_path);
            format!("{}:{}", file, frame.line_number.unwrap_or(0))
        };

        format!("\tat {}({})\n", qualified, location)
    }
}

impl Dialect for Java {
    fn name(&self) -> &'static str {
        "java"
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
            frames.push(Java::parse_frame(line)?);
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
        frames.iter().map(Java::format_frame).collect()
    }

    /// Java frame paths are package-derived and shorter than repository
    /// paths, so the direction is the inverse of Python's: a repository
    /// path matches when it ends with the frame path.
    fn match_filenames(&self, trace_filename: &str, git_files: &[String]) -> Vec<String> {
        git_files
            .iter()
            .filter(|git_file| git_file.ends_with(trace_filename))
            .cloned()
            .collect()
    }
}
