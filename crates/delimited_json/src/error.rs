use std::path::PathBuf;

use thiserror::Error;

use crate::encoding::CharacterEncoding;

/// Fatal failures. Any of these aborts the current unit of work.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("failed to open `{path}`: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to stat `{path}`: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to list directory `{path}`: {source}")]
    List {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("`{path}` line {line_number} is not valid {encoding}")]
    Decode {
        path: PathBuf,
        line_number: usize,
        encoding: CharacterEncoding,
    },
    #[error("reader used before initialize")]
    NotInitialized,
    #[error("uri_id must be set when generate_id is disabled")]
    MissingUriField,
    #[error("unsupported character encoding `{0}`")]
    UnsupportedEncoding(String),
}

/// Why a single line was turned into a skipped record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("no document")]
    BlankLine,
    #[error("starts with spaces")]
    LeadingSpace,
    #[error("not valid JSON document: {message}")]
    InvalidJson { message: String },
    #[error("no uri {field} found")]
    FieldNotFound { field: String },
    #[error("uri_id {field} expects string or number")]
    InvalidFieldType { field: String },
    #[error("line too long (observed_bytes={observed_bytes}, max_line_bytes={max_line_bytes})")]
    LineTooLong {
        observed_bytes: usize,
        max_line_bytes: usize,
    },
    #[error("key does not form a valid uri")]
    InvalidUri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipDiagnostic {
    pub path: PathBuf,
    /// 1-based line number within `path`.
    pub line_number: usize,
    pub reason: SkipReason,
}

pub trait DiagnosticSink: Send + 'static {
    fn on_skip(&mut self, diagnostic: &SkipDiagnostic);
}
