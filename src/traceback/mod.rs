//! Traceback parsing across stack trace dialects
//!
//! Raw crash text comes in many shapes. Each supported dialect knows how to
//! extract frames from its own format, how to print them back, and which
//! direction its filename suffix matching runs. Dialect detection is an
//! ordered trial: the first dialect that parses the input wins.

mod crashlog;
mod java;
mod javascript;
mod python;

use std::fmt;

use log::debug;
use thiserror::Error;

pub use crashlog::CrashLog;
pub use java::Java;
pub use javascript::JavaScript;
pub use python::Python;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unable to parse traceback")]
    UnknownFormat,
    #[error("malformed frame line: {0:?}")]
    MalformedFrame(String),
    #[error("no stack frames found")]
    NoFrames,
    #[error("reformatted traceback does not match input")]
    RoundTrip,
    #[error("missing crash report header")]
    MissingHeader,
}

/// One stack entry extracted from a traceback.
///
/// `resolved_path` starts out unset and is written at most once, when the
/// matcher ties the frame's recorded path to an actual repository path.
/// Everything else is fixed at parse time.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Path as it appears in the traceback (often absolute).
    pub source_path: String,
    pub line_number: Option<u32>,
    pub function_name: Option<String>,
    /// Source line printed under the frame header, trimmed. Python only.
    pub source_snippet: Option<String>,
    /// Repository-relative path, filled in by the matcher.
    pub resolved_path: Option<String>,
    /// Enclosing class, for dialects that carry one (Java, crash logs).
    pub class_name: Option<String>,
    pub is_native_method: bool,
    pub is_unknown_source: bool,
}

impl Frame {
    pub fn new(
        source_path: impl Into<String>,
        line_number: Option<u32>,
        function_name: Option<String>,
        source_snippet: Option<String>,
    ) -> Self {
        Frame {
            source_path: source_path.into(),
            line_number,
            function_name,
            source_snippet,
            resolved_path: None,
            class_name: None,
            is_native_method: false,
            is_unknown_source: false,
        }
    }
}

/// Frames plus the surrounding non-frame text of one parsed traceback.
#[derive(Debug)]
pub struct Extracted {
    pub header: Vec<String>,
    pub footer: Vec<String>,
    pub frames: Vec<Frame>,
}

/// One supported traceback text format.
pub trait Dialect: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Extract frames from normalized (blank-stripped) input lines.
    /// All-or-nothing: any structural problem fails the whole dialect.
    fn extract_frames(&self, lines: &[String]) -> Result<Extracted, ParseError>;

    /// Render frames back into this dialect's textual form.
    fn format_frames(&self, frames: &[Frame]) -> String;

    /// Return the repository paths that plausibly correspond to the
    /// frame path. The suffix direction is dialect-specific: Python and
    /// JavaScript frame paths are absolute forms of repository paths,
    /// Java and crash log frame paths are shortened forms.
    fn match_filenames(&self, trace_filename: &str, git_files: &[String]) -> Vec<String>;
}

/// Registered dialects in detection priority order.
fn dialects() -> Vec<Box<dyn Dialect>> {
    vec![
        Box::new(Python),
        Box::new(Java),
        Box::new(JavaScript),
        Box::new(CrashLog),
    ]
}

/// A parsed traceback: ordered frames (outermost call first) plus the
/// header/footer lines reproduced verbatim on re-serialization.
#[derive(Debug)]
pub struct Traceback {
    pub header: Vec<String>,
    pub footer: Vec<String>,
    pub frames: Vec<Frame>,
    dialect: Box<dyn Dialect>,
}

impl Traceback {
    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    /// Drop frames from installed third-party packages
    /// (paths containing `/site-packages/`).
    pub fn filter_site_packages(&mut self) {
        self.frames
            .retain(|frame| !frame.source_path.contains("/site-packages/"));
    }
}

impl fmt::Display for Traceback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.header {
            writeln!(f, "{}", line)?;
        }
        write!(f, "{}", self.dialect.format_frames(&self.frames))?;
        for line in &self.footer {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Parse a traceback from a single block of text.
pub fn parse_trace(blob: &str) -> Result<Traceback, ParseError> {
    parse_trace_from_lines(&[blob.to_string()])
}

/// Parse a traceback from pre-split lines.
///
/// A one-element list whose element contains escaped newlines (`\n` as two
/// characters, common when a trace is pasted out of a log aggregator) is
/// rewritten to real newlines and re-split. Blank lines are dropped before
/// the dialects see the input.
pub fn parse_trace_from_lines(input: &[String]) -> Result<Traceback, ParseError> {
    let mut lines: Vec<String> = if input.len() == 1 {
        input[0]
            .replace("\\n", "\n")
            .split('\n')
            .map(|line| line.trim_end().to_string())
            .collect()
    } else {
        input.iter().map(|line| line.trim_end().to_string()).collect()
    };
    lines.retain(|line| !line.trim().is_empty());

    for dialect in dialects() {
        match dialect.extract_frames(&lines) {
            Ok(extracted) => {
                debug!("parsed traceback as {}", dialect.name());
                return Ok(Traceback {
                    header: extracted.header,
                    footer: extracted.footer,
                    frames: extracted.frames,
                    dialect,
                });
            }
            Err(err) => debug!("not a {} traceback: {}", dialect.name(), err),
        }
    }
    Err(ParseError::UnknownFormat)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PYTHON_TRACE: &str = "\
Traceback (most recent call last):
  File \"../common/utils/geo_utils.py\", line 68, in get_ip_geo
    return get_geo_db().record_by_addr(ip_address)
  File \"/mnt/virtualenv_A/local/lib/python2.7/site-packages/pygeoip/__init__.py\", line 563, in record_by_addr
    ipnum = util.ip2long(addr)
  File \"/mnt/virtualenv_A/local/lib/python2.7/site-packages/pygeoip/util.py\", line 36, in ip2long
    return int(binascii.hexlify(socket.inet_pton(socket.AF_INET6, ip)), 16)
socket.error: [Errno 97] Address family not supported by protocol
";

    const JAVA_TRACE: &str = "\
Exception in thread \"main\" java.lang.NullPointerException
\tat com.example.myproject.Book.getTitle(Book.java:16)
\tat com.example.myproject.Author.getBookTitles(Author.java:25)
\tat com.example.myproject.Bootstrap.main(Bootstrap.java:14)
";

    #[test]
    fn test_detects_python() {
        let traceback = parse_trace(PYTHON_TRACE).unwrap();
        assert_eq!(traceback.dialect().name(), "python");
        assert_eq!(traceback.frames.len(), 3);
    }

    #[test]
    fn test_detects_java() {
        let traceback = parse_trace(JAVA_TRACE).unwrap();
        assert_eq!(traceback.dialect().name(), "java");
        assert_eq!(traceback.frames.len(), 3);
    }

    #[test]
    fn test_unknown_format() {
        let err = parse_trace("nothing resembling a traceback").unwrap_err();
        assert!(matches!(err, ParseError::UnknownFormat));
    }

    #[test]
    fn test_escaped_newlines_collapsed() {
        let blob = PYTHON_TRACE.replace('\n', "\\n");
        let traceback = parse_trace_from_lines(&[blob]).unwrap();
        assert_eq!(traceback.frames.len(), 3);
    }

    #[test]
    fn test_filter_site_packages() {
        let mut traceback = parse_trace(PYTHON_TRACE).unwrap();
        traceback.filter_site_packages();
        assert_eq!(traceback.frames.len(), 1);
        assert_eq!(traceback.frames[0].source_path, "../common/utils/geo_utils.py");
    }

    #[test]
    fn test_debug_formatting_names_the_dialect() {
        let traceback = parse_trace(PYTHON_TRACE).unwrap();
        assert!(format!("{:?}", traceback).contains("Python"));
    }

    #[test]
    fn test_display_round_trips_python() {
        let traceback = parse_trace(PYTHON_TRACE).unwrap();
        assert_eq!(traceback.to_string(), PYTHON_TRACE);
    }
}
