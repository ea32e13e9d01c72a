//! Error types for the preprocessing pipeline.
//!
//! Every fallible operation in this crate returns [`PrepResult`]. Failures
//! carry the offending file, column or value so the CLI can print a single
//! actionable message and stop before any output is written.

use std::path::Path;

/// Result type for preprocessing operations.
pub type PrepResult<T> = Result<T, PreprocError>;

/// Error type for preprocessing operations.
#[derive(Debug, thiserror::Error)]
pub enum PreprocError {
    /// Malformed or missing required metadata structure, or a
    /// cross-scenario inconsistency. Fatal to the whole collection run.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A required column is absent from a tabular log's header.
    #[error("column '{column}' not found in {file}")]
    ColumnNotFound { column: String, file: String },

    /// A required input file is missing or not the expected format.
    #[error("file not found or not usable: {file}")]
    FileNotFound { file: String },

    /// Undefined arithmetic in legend classification (zero-width range).
    #[error("domain error: {message}")]
    Domain { message: String },

    /// A cell value could not be interpreted (e.g. a non-integer time step).
    #[error("invalid value '{value}' in column '{column}'")]
    InvalidValue { column: String, value: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PreprocError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a configuration error naming the document it occurred in.
    pub fn configuration_in(path: &Path, message: impl Into<String>) -> Self {
        Self::Configuration {
            message: format!("{}: {}", path.display(), message.into()),
        }
    }

    /// Create a column-not-found error.
    pub fn column_not_found(column: impl Into<String>, file: &Path) -> Self {
        Self::ColumnNotFound {
            column: column.into(),
            file: file.display().to_string(),
        }
    }

    /// Create a file-not-found error.
    pub fn file_not_found(file: &Path) -> Self {
        Self::FileNotFound {
            file: file.display().to_string(),
        }
    }

    /// Create a domain error.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain {
            message: message.into(),
        }
    }

    /// Create an invalid-value error.
    pub fn invalid_value(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether this error is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Whether this error is a domain error.
    pub fn is_domain(&self) -> bool {
        matches!(self, Self::Domain { .. })
    }
}
