//! # tableone - Descriptive summary tables from tabular data
//!
//! tableone turns a CSV of subjects into the "Table 1" of a clinical or
//! epidemiological report: one row per characteristic, one column per
//! group, with counts, percentages, means and quartiles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│   Bucket    │────▶│  Summary    │────▶│   Table     │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  (derived)  │     │ (by strata) │     │ (rendered)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tableone::{build_table, example_config, render, Format, Theme};
//! use std::path::Path;
//!
//! let result = build_table(Path::new("data/pima.csv"), &example_config(), &Theme::default()).unwrap();
//! println!("{}", render(&result.table, Format::Markdown).unwrap());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Dataset, columns and cells
//! - [`parser`] - CSV loading with auto-detection
//! - [`transform`] - Derived fields and the pipeline
//! - [`summary`] - Grouped aggregation
//! - [`table`] - Table assembly, rendering and export
//! - [`config`] - Request configuration and themes
//! - [`validation`] - JSON schema validation
//! - [`themes`] - Stored themes
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Loading
pub mod parser;

// Derived fields and pipeline
pub mod transform;

// Aggregation and layout
pub mod summary;
pub mod table;

// Configuration
pub mod config;
pub mod validation;
pub mod themes;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigResult, ConfigurationError, ExportError, ExportResult, RangeError, ServerError, TableError,
    TableResult, ThemeError, ThemeResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Column, ColumnType, Dataset};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    csv_to_dataset, decode_content, detect_delimiter, detect_encoding, parse_bytes_auto, parse_csv,
    parse_csv_file_auto, write_csv, CsvError, LoadOptions, ParseResult,
};

// =============================================================================
// Re-exports - Derived fields
// =============================================================================

pub use transform::bucket::{derive_categorical, Boundary, BucketRule, BucketSpec, Closed};

// =============================================================================
// Re-exports - Aggregation and tables
// =============================================================================

pub use summary::{
    summarize, ContinuousSummary, FieldSpec, LevelCount, Statistic, Stratum, StratumInfo, Summary,
    SummaryOptions, SummaryRow,
};
pub use table::{assemble, export, render, Format, RowKind, SpanCell, Spanner, Table, TableLayout, TableRow};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{
    example_config, ContinuousStat, FieldConfig, FieldKind, MissingDisplay, PercentMode,
    ResolvedConfig, TableConfig, Theme,
};
pub use validation::{
    is_valid, is_valid_table_config, is_valid_theme, validate, validate_table_config, validate_theme,
};
pub use themes::{StoredTheme, ThemeRegistry};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    build_table, build_table_bytes, build_table_from_dataset, CsvInfo, PipelineResult,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, CsvMetadata, ResponseMetadata, StratumMetadata, SummarizeResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
