mod event_types;
mod line_parser;
mod types;

pub use event_types::{EventSpec, classify};
pub use line_parser::parse_log_line;
pub use types::*;

use crate::tree::{CallTree, TreeBuilder};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Parse errors that can occur while reading a trace
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Invalid line format: {0}")]
    InvalidFormat(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Invalid JSON event: {0}")]
    InvalidJson(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Result type for parser operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Line-level parser state.
///
/// Malformed lines never abort a parse: they are recorded in `errors` with
/// their line number and skipped.
#[derive(Debug)]
pub struct TraceParser {
    /// Accumulated errors during parsing
    pub errors: Vec<(usize, ParseError)>,
    /// Current line number
    line_number: usize,
    /// Latest timestamp seen, used to stamp raw truncation markers
    last_timestamp: u64,
}

impl TraceParser {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            line_number: 0,
            last_timestamp: 0,
        }
    }

    /// Parse one raw line; `None` for blank or malformed lines
    pub fn parse_line(&mut self, line: &str) -> Option<LogEvent> {
        self.line_number += 1;

        if line.trim().is_empty() {
            return None;
        }

        match parse_log_line(line, self.last_timestamp) {
            Ok(mut event) => {
                event.input_line = self.line_number;
                self.last_timestamp = self
                    .last_timestamp
                    .max(event.timestamp)
                    .max(event.exit_timestamp.unwrap_or(0));
                Some(event)
            }
            Err(e) => {
                log::debug!("Skipping line {}: {}", self.line_number, e);
                self.errors.push((self.line_number, e));
                None
            }
        }
    }

    /// Parse one raw line as read from disk, without its line terminator.
    /// Invalid UTF-8 is recorded like any other malformed line.
    pub fn parse_raw_line(&mut self, raw: &[u8]) -> Option<LogEvent> {
        match std::str::from_utf8(raw) {
            Ok(line) => self.parse_line(line),
            Err(e) => {
                self.line_number += 1;
                log::debug!("Skipping line {}: {}", self.line_number, e);
                self.errors.push((
                    self.line_number,
                    ParseError::InvalidFormat(format!("invalid UTF-8: {}", e)),
                ));
                None
            }
        }
    }

    /// Parse an entire trace file into events
    pub fn parse_file(&mut self, path: impl AsRef<Path>) -> ParseResult<Vec<LogEvent>> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ParseError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut events = Vec::new();
        while read_raw_line(&mut reader, &mut buf)
            .map_err(|e| ParseError::Io(e.to_string()))?
        {
            events.extend(self.parse_raw_line(&buf));
        }
        Ok(events)
    }

    /// Parse trace lines from an iterator
    pub fn parse_lines<I, S>(&mut self, lines: I) -> Vec<LogEvent>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .filter_map(|line| self.parse_line(line.as_ref()))
            .collect()
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Read the next line into `buf` without its `\n` or `\r\n` terminator.
/// Returns `false` at end of input.
fn read_raw_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<bool> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Ok(false);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    Ok(true)
}

impl Default for TraceParser {
    fn default() -> Self {
        Self::new()
    }
}

/// A fully loaded trace: the aggregated tree plus the lines that were skipped
#[derive(Debug)]
pub struct LoadedTrace {
    pub tree: CallTree,
    pub errors: Vec<(usize, ParseError)>,
}

impl LoadedTrace {
    pub fn error_info(&self) -> Vec<ParseErrorInfo> {
        self.errors
            .iter()
            .map(|(line, err)| ParseErrorInfo {
                line_number: *line,
                message: err.to_string(),
            })
            .collect()
    }
}

/// Incremental trace loader.
///
/// Reads and builds in bounded chunks so a host event loop can stay responsive
/// between calls to [`TraceLoader::advance`]. Dropping the loader (or calling
/// [`TraceLoader::cancel`]) discards the partial tree.
pub struct TraceLoader<R: BufRead> {
    reader: R,
    buf: Vec<u8>,
    parser: TraceParser,
    builder: TreeBuilder,
    exhausted: bool,
}

impl TraceLoader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> ParseResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| ParseError::Io(format!("Failed to open {}: {}", path.display(), e)))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceLoader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            parser: TraceParser::new(),
            builder: TreeBuilder::new(),
            exhausted: false,
        }
    }

    /// Consume up to `budget` lines. Returns `true` once the input is exhausted.
    pub fn advance(&mut self, budget: usize) -> ParseResult<bool> {
        for _ in 0..budget {
            let more = read_raw_line(&mut self.reader, &mut self.buf).map_err(|e| {
                ParseError::Io(format!(
                    "Failed to read line {}: {}",
                    self.parser.line_number() + 1,
                    e
                ))
            })?;
            if !more {
                self.exhausted = true;
                break;
            }
            if let Some(event) = self.parser.parse_raw_line(&self.buf) {
                self.builder.push(event);
            }
        }
        Ok(self.exhausted)
    }

    pub fn lines_read(&self) -> usize {
        self.parser.line_number()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Close the tree and run aggregation. Unread input is ignored.
    pub fn finish(self) -> LoadedTrace {
        log::info!(
            "Loaded {} lines ({} skipped)",
            self.parser.line_number(),
            self.parser.errors.len()
        );
        LoadedTrace {
            tree: self.builder.finish(),
            errors: self.parser.errors,
        }
    }

    /// Abandon the load and drop everything built so far
    pub fn cancel(self) {
        log::info!(
            "Trace load cancelled after {} lines",
            self.parser.line_number()
        );
    }
}

/// Load a whole trace file in one go
pub fn load_trace(path: impl AsRef<Path>) -> ParseResult<LoadedTrace> {
    let mut loader = TraceLoader::open(path)?;
    while !loader.advance(usize::MAX)? {}
    Ok(loader.finish())
}
