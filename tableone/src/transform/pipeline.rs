//! High-level pipeline API: CSV in, summary table out.
//!
//! This module combines all steps: loading, derived fields, configuration
//! resolution, aggregation and assembly. Each step reports through the log
//! broadcaster.
//!
//! # Example
//!
//! ```rust,no_run
//! use tableone::config::{example_config, Theme};
//! use tableone::table::{render, Format};
//! use tableone::transform::pipeline::build_table;
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let result = build_table(Path::new("data/pima.csv"), &example_config(), &Theme::default())?;
//!     println!("{}", render(&result.table, Format::Text)?);
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::path::Path;

use super::bucket::derive_categorical;
use crate::api::logs::{log_info, log_info_indent, log_success, log_success_indent, log_warning};
use crate::config::{TableConfig, Theme};
use crate::error::{TableError, TableResult};
use crate::models::Dataset;
use crate::parser::{parse_bytes_auto, parse_csv_file_auto, LoadOptions, ParseResult};
use crate::summary::{summarize, Summary};
use crate::table::{assemble, Table};

/// Result of a complete pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub table: Table,
    /// Statistics behind the table
    pub summary: Summary,
    /// CSV parsing metadata
    pub csv_info: CsvInfo,
}

/// CSV file information
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Build a summary table from a CSV file.
///
/// 1. Parses the CSV with auto-detection
/// 2. Adds every derived column of the config
/// 3. Resolves the config against the data and the theme
/// 4. Aggregates per stratum
/// 5. Assembles the table
pub fn build_table(path: &Path, config: &TableConfig, theme: &Theme) -> TableResult<PipelineResult> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_csv_file_auto(path, &LoadOptions::default())?;
    build_parsed(parsed, config, theme)
}

/// Same as [`build_table`] but from raw bytes.
pub fn build_table_bytes(bytes: &[u8], config: &TableConfig, theme: &Theme) -> TableResult<PipelineResult> {
    log_info(format!("📖 Reading {} bytes...", bytes.len()));
    let parsed = parse_bytes_auto(bytes, &LoadOptions::default())?;
    build_parsed(parsed, config, theme)
}

/// Build a table from an already loaded dataset.
pub fn build_table_from_dataset(
    dataset: Dataset,
    config: &TableConfig,
    theme: &Theme,
) -> TableResult<PipelineResult> {
    let parsed = ParseResult {
        headers: dataset.column_names(),
        dataset,
        encoding: "utf-8".to_string(),
        delimiter: ',',
    };
    build_parsed(parsed, config, theme)
}

fn build_parsed(parsed: ParseResult, config: &TableConfig, theme: &Theme) -> TableResult<PipelineResult> {
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.dataset.row_count(),
        parsed.headers.len()
    ));

    let csv_info = CsvInfo {
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
        row_count: parsed.dataset.row_count(),
    };

    if parsed.dataset.row_count() == 0 {
        return Err(TableError::EmptyDataset);
    }

    let (table, summary) = run(parsed.dataset, config, theme)?;
    Ok(PipelineResult {
        table,
        summary,
        csv_info,
    })
}

fn run(dataset: Dataset, config: &TableConfig, theme: &Theme) -> TableResult<(Table, Summary)> {
    let mut dataset = dataset;

    if !config.derive.is_empty() {
        log_info("🧮 Deriving categorical fields...");
        for spec in &config.derive {
            dataset = derive_categorical(&dataset, spec)?;
            log_success_indent(
                format!("{} → {} ({} levels)", spec.source, spec.target, spec.labels.len()),
                1,
            );
        }
    }

    log_info("⚙️  Resolving configuration...");
    let resolved = config.resolve(&dataset, theme)?;
    for field in &resolved.summary.fields {
        log_info_indent(format!("{} ({:?})", field.name, field.kind), 1);
    }
    match resolved.summary.by {
        Some(ref by) => log_info(format!("📊 Summarizing by '{}'...", by)),
        None => log_info("📊 Summarizing..."),
    }

    let summary = summarize(&dataset, &resolved.summary)?;
    log_success(format!(
        "{} fields across {} strata",
        summary.fields.len(),
        summary.strata.len()
    ));
    for field in &summary.fields {
        let missing = dataset
            .column(&field.name)
            .map(|c| c.missing_count())
            .unwrap_or(0);
        if missing > 0 {
            log_warning(format!("{}: {} missing values", field.name, missing));
        }
    }

    log_info("🗂️  Assembling table...");
    let table = assemble(&summary, &resolved.layout)?;
    log_success(format!(
        "{} rows × {} columns",
        table.rows.len(),
        table.column_count()
    ));

    Ok((table, summary))
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}
