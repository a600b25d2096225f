use std::path::PathBuf;

use tracing::{debug, error, warn};

use crate::config::ReaderConfig;
use crate::cursor::{CursorLine, LineCursor};
use crate::error::{ReaderError, SkipDiagnostic, SkipReason};
use crate::key::{JsonFieldKeyResolver, KeyResolver, SequentialIdKeyResolver};
use crate::segment::Segment;
use crate::sequencer::SegmentSequencer;
use crate::uri::encode_uri;

/// Pull-based record source driven by an external split scheduler.
pub trait RecordReader {
    /// One-time setup for the assigned segment. Opens the first file.
    fn initialize(&mut self, segment: Segment) -> Result<(), ReaderError>;
    /// Moves to the next record. `Ok(false)` means there is nothing left.
    fn advance(&mut self) -> Result<bool, ReaderError>;
    /// Key of the current record; `None` marks a line the consumer must skip.
    fn current_key(&self) -> Option<&str>;
    fn current_value(&self) -> Option<&str>;
    /// Fraction of the segment consumed, in `[0, 1]`.
    fn progress(&self) -> f32;
    /// Releases the open file. Afterwards the reader yields no more records.
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Uri-encoded key, or `None` for a skipped line.
    pub key: Option<String>,
    /// The physical line, exactly as read.
    pub value: String,
    pub collection: Option<String>,
}

impl Record {
    pub fn is_skipped(&self) -> bool {
        self.key.is_none()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum ReaderState {
    Uninitialized,
    Streaming,
    Exhausted,
    Closed,
}

/// Reads newline-delimited JSON from a file or a directory of files, one
/// record per physical line.
pub struct DelimitedJsonReader {
    config: ReaderConfig,
    state: ReaderState,
    sequencer: SegmentSequencer,
    cursor: Option<LineCursor>,
    current_path: PathBuf,
    current_collection: Option<String>,
    resolver: Option<Box<dyn KeyResolver>>,
    current: Option<Record>,
    bytes_read: u64,
    total_bytes: u64,
    skipped: u64,
}

impl DelimitedJsonReader {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            config,
            state: ReaderState::Uninitialized,
            sequencer: SegmentSequencer::new(),
            cursor: None,
            current_path: PathBuf::new(),
            current_collection: None,
            resolver: None,
            current: None,
            bytes_read: 0,
            total_bytes: 0,
            skipped: 0,
        }
    }

    pub fn current_record(&self) -> Option<&Record> {
        self.current.as_ref()
    }

    /// Number of lines turned into skipped records so far.
    pub fn skipped_lines(&self) -> u64 {
        self.skipped
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    fn open_cursor(&mut self, segment: &Segment) -> Result<(), ReaderError> {
        self.close_cursor();
        debug!(path = %segment.path().display(), "opening segment");
        let cursor =
            LineCursor::open(segment, self.config.encoding, self.config.max_line_bytes)?;
        self.current_path = segment.path().to_path_buf();
        self.current_collection = if self.config.filename_as_collection {
            segment
                .path()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        } else {
            None
        };
        self.cursor = Some(cursor);
        Ok(())
    }

    fn close_cursor(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
    }

    fn exhaust(&mut self) -> bool {
        self.close_cursor();
        self.current = None;
        self.bytes_read = self.total_bytes;
        self.state = ReaderState::Exhausted;
        false
    }

    fn next_record(&mut self) -> Result<bool, ReaderError> {
        loop {
            let Some(cursor) = self.cursor.as_mut() else {
                return Ok(self.exhaust());
            };
            let before = cursor.bytes_read();
            let line = cursor.next_line()?;
            self.bytes_read += cursor.bytes_read() - before;
            let Some(line) = line else {
                match self.sequencer.advance()? {
                    Some(segment) => {
                        self.open_cursor(&segment)?;
                        continue;
                    }
                    None => return Ok(self.exhaust()),
                }
            };
            let record = self.classify(line)?;
            self.current = Some(record);
            return Ok(true);
        }
    }

    fn classify(&mut self, line: CursorLine) -> Result<Record, ReaderError> {
        let (line_number, text) = match line {
            CursorLine::TooLong {
                line_number,
                observed_bytes,
                max_line_bytes,
            } => {
                let reason = SkipReason::LineTooLong {
                    observed_bytes,
                    max_line_bytes,
                };
                return Ok(self.skip(line_number, reason, String::new()));
            }
            CursorLine::Line { line_number, text } => (line_number, text),
        };

        if text.trim().is_empty() {
            return Ok(self.skip(line_number, SkipReason::BlankLine, text));
        }
        if text.starts_with(' ') {
            return Ok(self.skip(line_number, SkipReason::LeadingSpace, text));
        }

        let resolver = self.resolver.as_mut().ok_or(ReaderError::NotInitialized)?;
        let key = resolver
            .resolve(&text)
            .and_then(|key| encode_uri(&key).ok_or(SkipReason::InvalidUri));
        Ok(match key {
            Ok(key) => Record {
                key: Some(key),
                value: text,
                collection: self.current_collection.clone(),
            },
            Err(reason) => self.skip(line_number, reason, text),
        })
    }

    fn skip(&mut self, line_number: usize, reason: SkipReason, value: String) -> Record {
        let path = self.current_path.display();
        match reason {
            SkipReason::BlankLine => {
                warn!(path = %path, line_number, reason = %reason, "line skipped")
            }
            _ => error!(path = %path, line_number, reason = %reason, "line skipped"),
        }
        if let Some(sink) = self.config.diagnostic_sink.as_mut() {
            sink.on_skip(&SkipDiagnostic {
                path: self.current_path.clone(),
                line_number,
                reason,
            });
        }
        self.skipped += 1;
        Record {
            key: None,
            value,
            collection: self.current_collection.clone(),
        }
    }
}

impl RecordReader for DelimitedJsonReader {
    fn initialize(&mut self, segment: Segment) -> Result<(), ReaderError> {
        self.close_cursor();
        self.current = None;

        let resolver: Box<dyn KeyResolver> = match self.config.key_field()? {
            Some(field) => Box::new(JsonFieldKeyResolver::new(field)),
            None => Box::new(SequentialIdKeyResolver::for_segment(&segment)),
        };
        self.resolver = Some(resolver);
        self.bytes_read = 0;
        self.total_bytes = segment.length();
        self.skipped = 0;

        let first = if self.sequencer.initialize(&segment)? {
            self.sequencer.advance()?
        } else {
            Some(segment)
        };
        if let Some(first) = first {
            self.open_cursor(&first)?;
        }
        self.state = ReaderState::Streaming;
        Ok(())
    }

    fn advance(&mut self) -> Result<bool, ReaderError> {
        if self.state != ReaderState::Streaming {
            self.current = None;
            return Ok(false);
        }
        let result = self.next_record();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn current_key(&self) -> Option<&str> {
        self.current.as_ref().and_then(|record| record.key.as_deref())
    }

    fn current_value(&self) -> Option<&str> {
        self.current.as_ref().map(|record| record.value.as_str())
    }

    fn progress(&self) -> f32 {
        if self.state == ReaderState::Exhausted {
            return 1.0;
        }
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.bytes_read as f64 / self.total_bytes as f64).min(1.0) as f32
    }

    fn close(&mut self) {
        self.close_cursor();
        self.current = None;
        if self.state != ReaderState::Exhausted {
            self.state = ReaderState::Closed;
        }
    }
}

impl Iterator for DelimitedJsonReader {
    type Item = Result<Record, ReaderError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_input(contents: &str) -> (tempfile::TempDir, Segment) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, contents).unwrap();
        let segment = Segment::for_path(&path).unwrap();
        (dir, segment)
    }

    #[test]
    fn advance_before_initialize_reports_nothing() {
        let mut reader = DelimitedJsonReader::new(ReaderConfig::uri_field("id"));
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.current_value(), None);
        assert_eq!(reader.progress(), 0.0);
    }

    #[test]
    fn missing_uri_field_fails_initialize() {
        let (_dir, segment) = write_input("{\"id\":1}\n");
        let mut reader = DelimitedJsonReader::new(ReaderConfig::default());
        assert!(matches!(
            reader.initialize(segment),
            Err(ReaderError::MissingUriField)
        ));
    }

    #[test]
    fn close_mid_stream_makes_reader_inert() {
        let (_dir, segment) = write_input("{\"id\":1}\n{\"id\":2}\n{\"id\":3}\n");
        let mut reader = DelimitedJsonReader::new(ReaderConfig::uri_field("id"));
        reader.initialize(segment).unwrap();
        assert!(reader.advance().unwrap());
        assert_eq!(reader.current_key(), Some("1"));
        let progress = reader.progress();

        reader.close();
        reader.close();
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.current_key(), None);
        assert_eq!(reader.current_value(), None);
        assert_eq!(reader.progress(), progress);
    }

    #[test]
    fn decode_failure_is_fatal_and_closes_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, b"{\"id\":1}\n\xff\n{\"id\":3}\n").unwrap();
        let mut reader = DelimitedJsonReader::new(ReaderConfig::uri_field("id"));
        reader.initialize(Segment::for_path(&path).unwrap()).unwrap();

        assert!(reader.advance().unwrap());
        assert!(matches!(
            reader.advance(),
            Err(ReaderError::Decode { line_number: 2, .. })
        ));
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn skipped_lines_are_counted() {
        let (_dir, segment) = write_input("{\"id\":1}\n\n {\"id\":2}\nnope\n");
        let mut reader = DelimitedJsonReader::new(ReaderConfig::uri_field("id"));
        reader.initialize(segment).unwrap();
        let records: Vec<Record> = reader.by_ref().map(Result::unwrap).collect();
        assert_eq!(records.len(), 4);
        assert_eq!(reader.skipped_lines(), 3);
    }

    #[test]
    fn bytes_read_follows_the_cursor_across_lines() {
        let (_dir, segment) = write_input("{\"id\":1}\n\n  \n{\"id\":22}\n");
        let mut reader = DelimitedJsonReader::new(ReaderConfig::uri_field("id"));
        reader.initialize(segment).unwrap();

        let mut seen = Vec::new();
        while reader.advance().unwrap() {
            seen.push(reader.bytes_read());
        }
        assert_eq!(seen, vec![8, 8, 10, 19]);
        assert_eq!(reader.bytes_read(), 23);
    }

    #[test]
    fn empty_directory_is_immediately_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = DelimitedJsonReader::new(ReaderConfig::generated_ids());
        reader.initialize(Segment::for_path(dir.path()).unwrap()).unwrap();
        assert!(!reader.advance().unwrap());
        assert_eq!(reader.progress(), 1.0);
    }
}
