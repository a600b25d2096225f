use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Take};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoding::CharacterEncoding;
use crate::error::ReaderError;
use crate::segment::Segment;

const CHUNK_SIZE_BYTES: usize = 8192;

/// One physical line, newline (and a trailing `\r`) stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorLine {
    Line {
        line_number: usize,
        text: String,
    },
    /// The line exceeded the configured bound and its bytes were discarded.
    TooLong {
        line_number: usize,
        observed_bytes: usize,
        max_line_bytes: usize,
    },
}

impl CursorLine {
    pub fn line_number(&self) -> usize {
        match self {
            Self::Line { line_number, .. } | Self::TooLong { line_number, .. } => *line_number,
        }
    }
}

enum RawLine {
    Line(Vec<u8>),
    TooLong { observed_bytes: usize },
}

/// Splits a byte stream on `\n` in fixed-size chunks, optionally discarding
/// lines that grow past `max_line_bytes` without buffering them.
struct BoundedLines<R: Read> {
    reader: R,
    max_line_bytes: Option<usize>,
    buffer: Box<[u8; CHUNK_SIZE_BYTES]>,
    buffer_pos: usize,
    buffer_len: usize,
    current_line: Vec<u8>,
    observed_bytes: usize,
    discard_mode: bool,
    done: bool,
}

impl<R: Read> BoundedLines<R> {
    fn new(reader: R, max_line_bytes: Option<usize>) -> Self {
        Self {
            reader,
            max_line_bytes,
            buffer: Box::new([0u8; CHUNK_SIZE_BYTES]),
            buffer_pos: 0,
            buffer_len: 0,
            current_line: Vec::new(),
            observed_bytes: 0,
            discard_mode: false,
            done: false,
        }
    }

    fn finish_line(&mut self) -> RawLine {
        let observed_bytes = self.observed_bytes;
        let discarded = self.discard_mode;
        self.observed_bytes = 0;
        self.discard_mode = false;
        if discarded {
            self.current_line.clear();
            return RawLine::TooLong { observed_bytes };
        }
        RawLine::Line(std::mem::take(&mut self.current_line))
    }

    fn observe_bytes(&mut self, additional: usize) {
        self.observed_bytes = self.observed_bytes.saturating_add(additional);
        if let Some(max) = self.max_line_bytes {
            if self.observed_bytes > max && !self.discard_mode {
                self.discard_mode = true;
                self.current_line.clear();
            }
        }
    }

    fn next_raw(&mut self) -> std::io::Result<Option<RawLine>> {
        if self.done {
            return Ok(None);
        }

        loop {
            if self.buffer_pos >= self.buffer_len {
                self.buffer_pos = 0;
                self.buffer_len = match self.reader.read(&mut self.buffer[..]) {
                    Ok(n) => n,
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        self.done = true;
                        return Err(err);
                    }
                };
                if self.buffer_len == 0 {
                    self.done = true;
                    if self.discard_mode || !self.current_line.is_empty() {
                        return Ok(Some(self.finish_line()));
                    }
                    return Ok(None);
                }
            }

            let slice = &self.buffer[self.buffer_pos..self.buffer_len];
            let newline_idx = slice.iter().position(|b| *b == b'\n');
            let take = newline_idx.unwrap_or(slice.len());

            self.observe_bytes(take);
            if !self.discard_mode {
                let segment = &self.buffer[self.buffer_pos..self.buffer_pos + take];
                self.current_line.extend_from_slice(segment);
            }

            match newline_idx {
                Some(idx) => {
                    self.buffer_pos += idx + 1;
                    return Ok(Some(self.finish_line()));
                }
                None => self.buffer_pos = self.buffer_len,
            }
        }
    }
}

/// Line-at-a-time access to one segment of one file.
///
/// The underlying file handle is owned by the cursor and released by
/// [`LineCursor::close`] or on drop.
pub struct LineCursor {
    path: PathBuf,
    encoding: CharacterEncoding,
    lines: Option<BoundedLines<Take<File>>>,
    line_number: usize,
    bytes_read: u64,
    at_file_start: bool,
}

impl LineCursor {
    pub fn open(
        segment: &Segment,
        encoding: CharacterEncoding,
        max_line_bytes: Option<usize>,
    ) -> Result<Self, ReaderError> {
        let path = segment.path().to_path_buf();
        let mut file = File::open(&path).map_err(|source| ReaderError::Open {
            path: path.clone(),
            source,
        })?;
        if segment.start() > 0 {
            file.seek(SeekFrom::Start(segment.start()))
                .map_err(|source| ReaderError::Open {
                    path: path.clone(),
                    source,
                })?;
        }
        debug!(
            path = %path.display(),
            start = segment.start(),
            length = segment.length(),
            "opened line cursor"
        );
        Ok(Self {
            lines: Some(BoundedLines::new(file.take(segment.length()), max_line_bytes)),
            path,
            encoding,
            line_number: 0,
            bytes_read: 0,
            at_file_start: segment.start() == 0,
        })
    }

    /// Returns the next line, or `None` once the segment is exhausted or the
    /// cursor has been closed.
    pub fn next_line(&mut self) -> Result<Option<CursorLine>, ReaderError> {
        let Some(lines) = self.lines.as_mut() else {
            return Ok(None);
        };
        let raw = lines.next_raw().map_err(|source| ReaderError::Read {
            path: self.path.clone(),
            source,
        })?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        self.line_number += 1;
        let line_number = self.line_number;
        match raw {
            RawLine::TooLong { observed_bytes } => {
                self.bytes_read += observed_bytes as u64;
                Ok(Some(CursorLine::TooLong {
                    line_number,
                    observed_bytes,
                    max_line_bytes: lines.max_line_bytes.unwrap_or(usize::MAX),
                }))
            }
            RawLine::Line(bytes) => {
                let Some(mut text) = self.encoding.decode(bytes) else {
                    return Err(ReaderError::Decode {
                        path: self.path.clone(),
                        line_number,
                        encoding: self.encoding,
                    });
                };
                if text.ends_with('\r') {
                    text.pop();
                }
                // Byte-order mark at the head of the file.
                if line_number == 1 && self.at_file_start && text.starts_with('\u{feff}') {
                    text.drain(..'\u{feff}'.len_utf8());
                }
                self.bytes_read += text.len() as u64;
                Ok(Some(CursorLine::Line { line_number, text }))
            }
        }
    }

    /// Releases the file handle. Safe to call more than once.
    pub fn close(&mut self) {
        self.lines = None;
    }

    pub fn is_closed(&self) -> bool {
        self.lines.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// UTF-8 length of every line returned so far, newlines excluded.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
