use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Translation
// ---------------------------------------------------------------------------

/// The value domains the translator maps between the planning system (MoM)
/// and the execution repository (OTDB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Status,
    ClockMode,
    AntennaArray,
    AntennaSet,
    BandFilter,
}

impl Domain {
    pub fn as_str(self) -> &'static str {
        match self {
            Domain::Status => "status",
            Domain::ClockMode => "clock mode",
            Domain::AntennaArray => "antenna array",
            Domain::AntennaSet => "antenna set",
            Domain::BandFilter => "band filter",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lookup that has no counterpart in the other system's vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no {domain} mapping for '{value}'")]
pub struct UnmappedValue {
    pub domain: Domain,
    pub value: String,
}

impl UnmappedValue {
    pub fn new(domain: Domain, value: impl Into<String>) -> Self {
        Self {
            domain,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// XML codecs
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] roxmltree::Error),

    #[error("expected root element 'observation', found '{0}'")]
    UnexpectedRoot(String),

    #[error("invalid {field} value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error(transparent)]
    Unmapped(#[from] UnmappedValue),

    #[error("duplicate beam id {0} within one observation")]
    DuplicateBeam(i64),

    #[error("failed to write XML: {0}")]
    Write(String),

    #[error("observation has no mom2Id")]
    MissingId,
}

impl CodecError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        CodecError::InvalidValue {
            field,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Execution repository
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("observation has no mom2Id and cannot be stored")]
    MissingId,

    #[error("repository lock poisoned")]
    Poisoned,

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to encode observation record: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// MomsyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MomsyncError {
    #[error("config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MomsyncError>;
