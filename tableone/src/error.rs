//! Error types for the tableone pipeline.
//!
//! This module defines the error hierarchy:
//!
//! - [`ConfigurationError`] - Malformed rules, unknown columns, invalid options
//! - [`RangeError`] - A numeric value outside every bucket
//! - [`ExportError`] - Rendering and file export failures
//! - [`ThemeError`] - Theme registry errors
//! - [`TableError`] - Top-level pipeline errors
//! - [`ServerError`] - HTTP layer errors
//!
//! CSV loading errors live next to the loader in [`crate::parser::CsvError`].
//! Conversion into [`TableError`] is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while validating a request before any output is produced.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A referenced column does not exist in the dataset.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A column name is used twice.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Columns of a dataset must all have the same length.
    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    /// Bucket boundaries are malformed.
    #[error("Invalid bucket boundaries: {0}")]
    InvalidBoundaries(String),

    /// Number of labels does not match the number of intervals.
    #[error("Bucketing rule has {labels} labels for {intervals} intervals")]
    LabelCountMismatch { labels: usize, intervals: usize },

    /// A numeric operation was requested on a column holding text.
    #[error("Column '{column}' is not numeric (row {row}: '{value}')")]
    NonNumericColumn {
        column: String,
        row: usize,
        value: String,
    },

    /// A field option contradicts the field's data or kind.
    #[error("Invalid configuration for field '{field}': {message}")]
    InvalidField { field: String, message: String },

    /// A table-level option is invalid.
    #[error("Invalid option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    /// A stratum named in the configuration does not exist.
    #[error("Unknown stratum: {0}")]
    UnknownStratum(String),

    /// JSON Schema violations.
    #[error("Configuration does not match schema: {}", .errors.join("; "))]
    Schema { errors: Vec<String> },

    /// JSON syntax or shape error.
    #[error("Configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Range Errors
// =============================================================================

/// A numeric value that falls outside every interval of a bucketing rule.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Value {value} in column '{column}' (row {row}) falls outside all buckets")]
pub struct RangeError {
    /// Source column.
    pub column: String,
    /// 1-based data row (header excluded).
    pub row: usize,
    /// Offending value.
    pub value: f64,
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while rendering or writing a table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// File extension or format name is not supported.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    /// Output path has no extension to select a format from.
    #[error("Cannot infer export format, path has no extension: {}", .0.display())]
    MissingExtension(PathBuf),

    /// Writing the file failed.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("Export JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV serialization failed.
    #[error("Export CSV error: {0}")]
    Csv(String),
}

// =============================================================================
// Theme Registry Errors
// =============================================================================

/// Errors from the theme registry.
#[derive(Debug, Error)]
pub enum ThemeError {
    /// Theme not found.
    #[error("Theme not found: {0}")]
    NotFound(String),

    /// Invalid theme data.
    #[error("Invalid theme: {0}")]
    InvalidTheme(String),

    /// IO error.
    #[error("Theme registry IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Theme registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::build_table`].
/// It wraps all lower-level errors.
#[derive(Debug, Error)]
pub enum TableError {
    /// CSV loading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigurationError),

    /// Bucketing range error.
    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Theme registry error.
    #[error("Theme error: {0}")]
    Theme(#[from] ThemeError),

    /// The dataset has no rows.
    #[error("Dataset has no rows")]
    EmptyDataset,
}

impl TableError {
    /// Whether the error was caused by the caller's input rather than the environment.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            TableError::Export(ExportError::Io(_)) | TableError::Theme(ThemeError::Io(_))
        )
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Table(#[from] TableError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigurationError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for theme registry operations.
pub type ThemeResult<T> = Result<T, ThemeError>;

/// Result type for pipeline operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
