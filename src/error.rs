//! Error types for wheelsmith

use thiserror::Error;

/// Main error type for wheel operations
#[derive(Error, Debug)]
pub enum WheelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Corrupt archive {path}: {reason}")]
    ArchiveCorrupt { path: String, reason: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("No dist-info directory matching {expected}")]
    DistInfoNotFound { expected: String },

    #[error("Multiple dist-info directories match: {}", candidates.join(", "))]
    AmbiguousDistInfo { candidates: Vec<String> },

    #[error("Missing dist-info file: {path}")]
    MissingDistInfoFile { path: String },

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("WHEEL file error: {0}")]
    WheelInfo(#[from] WheelInfoError),

    #[error("Field is not editable: {0}")]
    UnknownField(String),

    #[error("Inconsistent repack: {0}")]
    RepackInconsistent(String),
}

impl WheelError {
    pub(crate) fn corrupt(path: impl Into<String>, reason: impl ToString) -> Self {
        WheelError::ArchiveCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        WheelError::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors related to METADATA parsing and editing
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Cannot remove required field: {0}")]
    RequiredField(String),

    #[error("Malformed header at line {line}: '{content}'")]
    Malformed { line: usize, content: String },
}

/// Errors related to RECORD file
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Invalid CSV: {0}")]
    InvalidCsv(String),

    #[error("Malformed RECORD line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHash(String),
}

/// Errors related to the WHEEL descriptor
#[derive(Error, Debug)]
pub enum WheelInfoError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid tag: {0}")]
    InvalidTag(String),

    #[error(transparent)]
    Syntax(#[from] MetadataError),
}

/// Result of validating a wheel
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Individual validation error
#[derive(Debug)]
pub enum ValidationError {
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },
    MissingFile {
        path: String,
    },
    ExtraFile {
        path: String,
    },
}
