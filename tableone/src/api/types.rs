//! REST API types.
//!
//! Responses carry both the rendered table (in the requested format) and
//! its structured form, so clients can display or post-process either.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::summary::{Stratum, StratumInfo};
use crate::table::{Format, Table, TableRow};
use crate::transform::pipeline::{CsvInfo, PipelineResult};

/// Response sent after a CSV upload has been summarized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeResponse {
    /// Unique job identifier
    pub job_id: String,

    /// "ready", or "warning" when some summarized value was missing
    pub status: String,

    /// Render format name
    pub format: String,

    /// Table rendered in `format`
    pub rendered: String,

    pub table: Table,

    /// Table body, duplicated for clients that only need rows
    pub rows: Vec<TableRow>,

    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub csv_info: CsvMetadata,
    pub strata: Vec<StratumMetadata>,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<CsvInfo> for CsvMetadata {
    fn from(info: CsvInfo) -> Self {
        Self {
            encoding: info.encoding,
            delimiter: info.delimiter.to_string(),
            row_count: info.row_count,
            columns: info.headers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StratumMetadata {
    /// Group value, or the missing label for rows without one; `None` for
    /// the overall stratum
    pub name: Option<String>,
    pub overall: bool,
    /// Rows whose grouping value is missing
    #[serde(default)]
    pub missing: bool,
    pub n: usize,
}

impl StratumMetadata {
    pub fn new(info: &StratumInfo, missing_label: &str) -> Self {
        let (name, overall, missing) = match &info.stratum {
            Stratum::Overall => (None, true, false),
            Stratum::Group(name) => (Some(name.clone()), false, false),
            Stratum::Missing => (Some(missing_label.to_string()), false, true),
        };
        Self {
            name,
            overall,
            missing,
            n: info.n,
        }
    }
}

impl SummarizeResponse {
    pub fn new(result: PipelineResult, format: Format, rendered: String) -> Self {
        let has_missing = result
            .table
            .rows
            .iter()
            .any(|r| r.kind == crate::table::RowKind::Unknown && r.cells.iter().any(|c| c != "0"));

        SummarizeResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if has_missing { "warning" } else { "ready" }.to_string(),
            format: format.name().to_string(),
            rendered,
            rows: result.table.rows.clone(),
            metadata: ResponseMetadata {
                csv_info: result.csv_info.into(),
                // Table column order, which honors an explicit stratum order
                strata: result
                    .table
                    .strata
                    .iter()
                    .map(|info| StratumMetadata::new(info, &result.summary.missing_label))
                    .collect(),
            },
            table: result.table,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "rendered": null,
        "rows": [],
        "metadata": {
            "csvInfo": null,
            "strata": []
        }
    })
}
