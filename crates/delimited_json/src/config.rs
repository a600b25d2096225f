use serde::Deserialize;

use crate::encoding::CharacterEncoding;
use crate::error::{DiagnosticSink, ReaderError};

#[derive(Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Synthesize sequential keys instead of looking up `uri_id`.
    pub generate_id: bool,
    /// JSON field holding the document uri. Required unless `generate_id` is set.
    pub uri_id: Option<String>,
    pub encoding: CharacterEncoding,
    /// Lines longer than this are discarded and reported as skipped.
    pub max_line_bytes: Option<usize>,
    /// Attach the name of the file each record came from as its collection.
    pub filename_as_collection: bool,
    #[serde(skip)]
    pub diagnostic_sink: Option<Box<dyn DiagnosticSink>>,
}

impl ReaderConfig {
    pub fn generated_ids() -> Self {
        Self {
            generate_id: true,
            ..Self::default()
        }
    }

    pub fn uri_field(field: impl Into<String>) -> Self {
        Self {
            uri_id: Some(field.into()),
            ..Self::default()
        }
    }

    pub fn with_diagnostic_sink(mut self, sink: impl DiagnosticSink) -> Self {
        self.diagnostic_sink = Some(Box::new(sink));
        self
    }

    /// The field name to resolve keys from, or `None` when keys are generated.
    pub(crate) fn key_field(&self) -> Result<Option<&str>, ReaderError> {
        if self.generate_id {
            return Ok(None);
        }
        match self.uri_id.as_deref() {
            Some(field) if !field.is_empty() => Ok(Some(field)),
            _ => Err(ReaderError::MissingUriField),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            generate_id: false,
            uri_id: None,
            encoding: CharacterEncoding::utf8(),
            max_line_bytes: None,
            filename_as_collection: false,
            diagnostic_sink: None,
        }
    }
}
