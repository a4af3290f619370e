//! Import file decoding.
//!
//! A file is a JSON or YAML sequence of candidate records. Items that fail
//! schema or constraint checks are dropped; the file as a whole is rejected
//! only when it is not a sequence or nothing survives.

use std::fmt;
use std::path::Path;

use serde_json::Value;
use strata_core::records::CandidateRecord;
use strata_schema::SchemaRegistry;

use crate::error::ParseError;

/// Supported serialization formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Extensions accepted at intake, lowercase.
    pub const EXTENSIONS: [&'static str; 3] = ["json", "yaml", "yml"];

    /// Case-insensitive lookup.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnsupportedFormat`] for anything outside [`Self::EXTENSIONS`].
    pub fn from_extension(ext: &str) -> Result<Self, ParseError> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(ParseError::UnsupportedFormat(ext.to_string())),
        }
    }

    /// Format of an uploaded file, from its original name.
    ///
    /// # Errors
    ///
    /// [`ParseError::UnsupportedFormat`] when the extension is missing or unknown.
    pub fn from_file_name(name: &str) -> Result<Self, ParseError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }

    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Yaml => "application/yaml",
        }
    }

    fn decode(self, bytes: &[u8]) -> Result<Value, ParseError> {
        let malformed = |reason: String| ParseError::Malformed {
            format: self,
            reason,
        };
        match self {
            Self::Json => serde_json::from_slice(bytes).map_err(|e| malformed(e.to_string())),
            Self::Yaml => serde_yaml::from_slice(bytes).map_err(|e| malformed(e.to_string())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
        })
    }
}

/// Decode `bytes` and keep the items that validate as candidate records.
///
/// # Errors
///
/// [`ParseError::Malformed`] for undecodable bytes, [`ParseError::NotAnArray`]
/// when the top level is not a sequence, [`ParseError::NoValidItems`] when every
/// item was dropped.
pub fn parse(
    bytes: &[u8],
    format: FileFormat,
    schemas: &SchemaRegistry,
) -> Result<Vec<CandidateRecord>, ParseError> {
    let Value::Array(items) = format.decode(bytes)? else {
        return Err(ParseError::NotAnArray);
    };

    let total = items.len();
    let records: Vec<CandidateRecord> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match schemas.candidate(item) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!(index, error = %e, "dropping invalid import item");
                None
            }
        })
        .collect();

    if records.is_empty() {
        return Err(ParseError::NoValidItems);
    }
    tracing::debug!(%format, total, valid = records.len(), "import file parsed");
    Ok(records)
}
