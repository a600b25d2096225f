#![forbid(unsafe_code)]
//! Record reader for newline-delimited JSON input.
//!
//! A [`DelimitedJsonReader`] is handed one [`Segment`] (a file, or a directory
//! of files) and turns every physical line into a [`Record`]: the raw line plus
//! a uri key taken either from a JSON field or from a per-segment counter.
//! Lines that cannot produce a key become skipped records (`key == None`)
//! instead of errors, so one bad line never stops a load.
//!
//! - [`LineCursor`] reads lines from a single segment.
//! - [`SegmentSequencer`] walks directory input file by file.
//! - [`KeyResolver`] implementations derive keys.

mod config;
mod cursor;
mod encoding;
mod error;
mod key;
mod reader;
mod segment;
mod sequencer;
mod uri;

pub use config::ReaderConfig;
pub use cursor::{CursorLine, LineCursor};
pub use encoding::CharacterEncoding;
pub use error::{DiagnosticSink, ReaderError, SkipDiagnostic, SkipReason};
pub use key::{find_field, JsonFieldKeyResolver, JsonNode, KeyResolver, SequentialIdKeyResolver};
pub use reader::{DelimitedJsonReader, Record, RecordReader};
pub use segment::Segment;
pub use sequencer::{DirectorySegmentQueue, SegmentSequencer};
pub use uri::encode_uri;
