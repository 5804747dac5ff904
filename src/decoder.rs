//! ttar stream decoder
//!
//! [`Decoder`] drives a two-state machine over the stream lines and reports
//! each record to a [`RecordSink`]. Listing and extraction are both sinks.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::archive::{ArchiveError, Header};

/// Receives the records of a stream in order.
///
/// `path` is the path of the record currently open, i.e. the last `Path:` or
/// `Directory:` header seen.
pub trait RecordSink {
    /// `Path: <p>` was read
    fn begin_path(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    /// `Lines: <n>` was read for the file at `path`
    fn begin_file(&mut self, path: &Path, lines: usize) -> Result<()>;

    /// One content line of the open file, without its line terminator
    fn content_line(&mut self, _path: &Path, _line: &[u8]) -> Result<()> {
        Ok(())
    }

    /// The content block of the open file is complete
    fn end_file(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn directory(&mut self, path: &Path) -> Result<()>;

    fn symlink(&mut self, path: &Path, target: &Path) -> Result<()>;

    fn mode(&mut self, _path: &Path, _mode: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Expecting a header line
    Scanning,
    /// Consuming verbatim content lines
    InContent { remaining: usize },
}

/// Decodes a ttar stream
#[derive(Debug, Default)]
pub struct Decoder {}

impl Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self {}
    }

    /// Decode `reader` line by line, reporting every record to `sink`.
    ///
    /// Unknown lines outside a content block, and a stream that ends inside
    /// one, are errors.
    pub fn decode<R: BufRead, S: RecordSink>(&self, mut reader: R, sink: &mut S) -> Result<()> {
        let mut state = State::Scanning;
        let mut path: Option<PathBuf> = None;
        let mut buffer = Vec::new();
        let mut line_number = 0;

        loop {
            buffer.clear();
            let read = reader
                .read_until(b'\n', &mut buffer)
                .with_context(|| format!("Failed to read archive line {}", line_number + 1))?;
            if read == 0 {
                break;
            }
            line_number += 1;
            let line = buffer.strip_suffix(b"\n").unwrap_or(&buffer);

            state = match state {
                State::InContent { remaining } => {
                    let current = open_path(&path, line_number, line)?;
                    sink.content_line(current, line)?;
                    if remaining == 1 {
                        sink.end_file(current)?;
                        State::Scanning
                    } else {
                        State::InContent { remaining: remaining - 1 }
                    }
                }
                State::Scanning => {
                    let header =
                        Header::parse(line).ok_or_else(|| malformed(line_number, line))?;
                    Self::scan(header, &mut path, sink, line_number, line)?
                }
            };
        }

        if let State::InContent { remaining } = state {
            return Err(ArchiveError::TruncatedContent {
                path: path.unwrap_or_default(),
                missing: remaining,
            }
            .into());
        }

        Ok(())
    }

    fn scan<S: RecordSink>(
        header: Header<'_>,
        path: &mut Option<PathBuf>,
        sink: &mut S,
        line_number: usize,
        line: &[u8],
    ) -> Result<State> {
        match header {
            Header::Path(p) => {
                sink.begin_path(p)?;
                *path = Some(p.to_path_buf());
            }
            Header::Lines(count) => {
                let current = open_path(path, line_number, line)?;
                sink.begin_file(current, count)?;
                if count == 0 {
                    sink.end_file(current)?;
                } else {
                    return Ok(State::InContent { remaining: count });
                }
            }
            Header::Directory(p) => {
                sink.directory(p)?;
                *path = Some(p.to_path_buf());
            }
            Header::SymlinkTo(target) => {
                let current = open_path(path, line_number, line)?;
                sink.symlink(current, target)?;
            }
            Header::Mode(mode) => {
                let current = open_path(path, line_number, line)?;
                sink.mode(current, mode)?;
            }
            Header::Comment | Header::Blank => {}
        }
        Ok(State::Scanning)
    }
}

fn malformed(line_number: usize, line: &[u8]) -> anyhow::Error {
    ArchiveError::MalformedArchive {
        line_number,
        line: String::from_utf8_lossy(line).into_owned(),
    }
    .into()
}

/// The current record path, or an error if no record has been opened yet
fn open_path<'p>(path: &'p Option<PathBuf>, line_number: usize, line: &[u8]) -> Result<&'p Path> {
    path.as_deref().ok_or_else(|| malformed(line_number, line))
}
