//! Table assembly.
//!
//! [`assemble`] lays a [`Summary`] out as a [`Table`]: ordered stratum
//! columns, one block of rows per field, formatted statistic cells,
//! spanning headers and footnotes. Rendering to a concrete format lives in
//! [`render`], writing to disk in [`export`].
//!
//! ```text
//!                          ┌──────── Diabetes ────────┐
//! Characteristic   Overall, N = 768   neg, N = 500   pos, N = 268
//! Age, years       33.2 (11.8)        31.2 (11.7)    37.1 (11.0)
//! Parity
//!   nulliparous    111 (14.5%)        73 (14.6%)     38 (14.2%)
//!   ...
//! ```

pub mod export;
pub mod render;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::{ContinuousStat, FieldKind, MissingDisplay};
use crate::error::{ConfigResult, ConfigurationError};
use crate::summary::{ContinuousSummary, FieldSpec, LevelCount, Statistic, Stratum, StratumInfo, Summary};

pub use export::export;
pub use render::{render, Format};

/// A header spanning several stratum columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Spanner {
    pub label: String,
    /// Stratum names covered, contiguous after ordering
    pub strata: Vec<String>,
}

/// Presentation options for [`assemble`].
#[derive(Debug, Clone, PartialEq)]
pub struct TableLayout {
    pub caption: Option<String>,
    pub footnotes: Vec<String>,
    pub spanners: Vec<Spanner>,
    pub stratum_order: Vec<String>,
    pub label_header: String,
    pub overall_label: String,
    /// Annotate stratum headers with their row count
    pub header_n: bool,
    pub missing: MissingDisplay,
    /// Prepend a legend of the statistics used
    pub statistic_footnote: bool,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            caption: None,
            footnotes: Vec::new(),
            spanners: Vec::new(),
            stratum_order: Vec::new(),
            label_header: "Characteristic".to_string(),
            overall_label: "Overall".to_string(),
            header_n: true,
            missing: MissingDisplay::IfAny,
            statistic_footnote: true,
        }
    }
}

// =============================================================================
// Table
// =============================================================================

/// A spanning header placed over header columns `start..start + span`.
///
/// Column 0 is the label column, so `start` is at least 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpanCell {
    pub label: String,
    pub start: usize,
    pub span: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Continuous,
    /// Heading row of a categorical field, no statistics
    Categorical,
    Level,
    Dichotomous,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub label: String,
    /// 0 for field rows, 1 for levels and unknown rows
    pub indent: usize,
    /// One formatted cell per stratum column
    pub cells: Vec<String>,
    pub kind: RowKind,
}

/// The assembled artifact, independent of any output format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub caption: Option<String>,
    pub spanners: Vec<SpanCell>,
    /// Label header followed by one header per stratum
    pub headers: Vec<String>,
    /// Stratum behind each header after the label header
    pub strata: Vec<StratumInfo>,
    pub rows: Vec<TableRow>,
    pub footnotes: Vec<String>,
}

impl Table {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Spanner covering header column `col`, if any.
    pub fn spanner_at(&self, col: usize) -> Option<&SpanCell> {
        self.spanners
            .iter()
            .find(|s| col >= s.start && col < s.start + s.span)
    }
}

// =============================================================================
// Assembly
// =============================================================================

/// Assemble a summary into a table.
pub fn assemble(summary: &Summary, layout: &TableLayout) -> ConfigResult<Table> {
    let namer = StratumNamer {
        overall: &layout.overall_label,
        missing: &summary.missing_label,
    };
    namer.check_unique(&summary.strata)?;
    let strata = order_strata(&summary.strata, layout, &namer)?;
    let spanners = place_spanners(&strata, layout, &namer)?;

    let mut headers = Vec::with_capacity(strata.len() + 1);
    headers.push(layout.label_header.clone());
    for info in &strata {
        let name = namer.name(&info.stratum);
        headers.push(if layout.header_n {
            format!("{}, N = {}", name, info.n)
        } else {
            name
        });
    }

    let mut rows = Vec::new();
    for field in &summary.fields {
        field_rows(summary, field, &strata, layout, &mut rows);
    }

    let mut footnotes = Vec::new();
    if layout.statistic_footnote {
        if let Some(legend) = statistic_legend(&summary.fields) {
            footnotes.push(legend);
        }
    }
    footnotes.extend(layout.footnotes.iter().cloned());

    Ok(Table {
        caption: layout.caption.clone(),
        spanners,
        headers,
        strata,
        rows,
        footnotes,
    })
}

/// Display names of strata; also the names `stratum_order` and spanners refer to.
struct StratumNamer<'a> {
    overall: &'a str,
    missing: &'a str,
}

impl StratumNamer<'_> {
    fn name(&self, stratum: &Stratum) -> String {
        match stratum {
            Stratum::Overall => self.overall.to_string(),
            Stratum::Group(name) => name.clone(),
            Stratum::Missing => self.missing.to_string(),
        }
    }

    /// A group value equal to the overall or missing label would make two
    /// columns share a name.
    fn check_unique(&self, strata: &[StratumInfo]) -> ConfigResult<()> {
        let mut seen = HashSet::new();
        for info in strata {
            let name = self.name(&info.stratum);
            if !seen.insert(name.clone()) {
                return Err(ConfigurationError::InvalidOption {
                    option: "by".into(),
                    message: format!(
                        "group value '{}' collides with the overall or missing stratum label",
                        name
                    ),
                });
            }
        }
        Ok(())
    }
}

/// Explicitly named strata first, the rest in order of appearance.
///
/// The overall column stays in front unless the order names it.
fn order_strata(
    strata: &[StratumInfo],
    layout: &TableLayout,
    namer: &StratumNamer,
) -> ConfigResult<Vec<StratumInfo>> {
    if layout.stratum_order.is_empty() {
        return Ok(strata.to_vec());
    }

    let mut named: Vec<StratumInfo> = Vec::with_capacity(layout.stratum_order.len());
    for name in &layout.stratum_order {
        let info = strata
            .iter()
            .find(|s| &namer.name(&s.stratum) == name)
            .ok_or_else(|| ConfigurationError::UnknownStratum(name.clone()))?;
        if named.contains(info) {
            return Err(ConfigurationError::InvalidOption {
                option: "stratum_order".into(),
                message: format!("'{}' listed twice", name),
            });
        }
        named.push(info.clone());
    }

    let mut ordered = Vec::with_capacity(strata.len());
    let overall_named = named.iter().any(|s| s.stratum == Stratum::Overall);
    if !overall_named {
        ordered.extend(strata.iter().filter(|s| s.stratum == Stratum::Overall).cloned());
    }
    ordered.extend(named.iter().cloned());
    ordered.extend(
        strata
            .iter()
            .filter(|s| s.stratum != Stratum::Overall && !named.contains(s))
            .cloned(),
    );
    Ok(ordered)
}

fn place_spanners(
    strata: &[StratumInfo],
    layout: &TableLayout,
    namer: &StratumNamer,
) -> ConfigResult<Vec<SpanCell>> {
    let names: Vec<String> = strata.iter().map(|s| namer.name(&s.stratum)).collect();
    let mut covered = HashSet::new();
    let mut cells = Vec::with_capacity(layout.spanners.len());

    for spanner in &layout.spanners {
        let mut positions = Vec::with_capacity(spanner.strata.len());
        for name in &spanner.strata {
            let pos = names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| ConfigurationError::UnknownStratum(name.clone()))?;
            if !covered.insert(pos) {
                return Err(ConfigurationError::InvalidOption {
                    option: "spanners".into(),
                    message: format!("stratum '{}' is covered by more than one spanner", name),
                });
            }
            positions.push(pos);
        }
        positions.sort_unstable();

        let (first, last) = match (positions.first(), positions.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(ConfigurationError::InvalidOption {
                    option: "spanners".into(),
                    message: format!("spanner '{}' covers no strata", spanner.label),
                })
            }
        };
        if last - first + 1 != positions.len() {
            return Err(ConfigurationError::InvalidOption {
                option: "spanners".into(),
                message: format!("strata under '{}' are not adjacent", spanner.label),
            });
        }

        cells.push(SpanCell {
            label: spanner.label.clone(),
            start: first + 1,
            span: positions.len(),
        });
    }

    cells.sort_by_key(|c| c.start);
    Ok(cells)
}

fn field_rows(
    summary: &Summary,
    field: &FieldSpec,
    strata: &[StratumInfo],
    layout: &TableLayout,
    rows: &mut Vec<TableRow>,
) {
    let cells_for = |level: Option<&str>| -> Vec<String> {
        strata
            .iter()
            .map(|info| match summary.find(&field.name, &info.stratum, level) {
                Some(row) => format_statistic(&row.statistic, field),
                None => "NA".to_string(),
            })
            .collect()
    };

    match field.kind {
        FieldKind::Continuous => rows.push(TableRow {
            label: field.label.clone(),
            indent: 0,
            cells: cells_for(None),
            kind: RowKind::Continuous,
        }),
        FieldKind::Categorical => {
            rows.push(TableRow {
                label: field.label.clone(),
                indent: 0,
                cells: vec![String::new(); strata.len()],
                kind: RowKind::Categorical,
            });
            for level in summary.levels_of(&field.name) {
                rows.push(TableRow {
                    label: level.clone(),
                    indent: 1,
                    cells: cells_for(Some(level)),
                    kind: RowKind::Level,
                });
            }
        }
        FieldKind::Dichotomous => {
            let cells = match field.value {
                Some(ref value) => cells_for(Some(value)),
                None => vec!["NA".to_string(); strata.len()],
            };
            rows.push(TableRow {
                label: field.label.clone(),
                indent: 0,
                cells,
                kind: RowKind::Dichotomous,
            });
        }
    }

    let unknown: Vec<usize> = strata
        .iter()
        .map(|info| summary.unknown_count(&field.name, &info.stratum))
        .collect();
    let show = match layout.missing {
        MissingDisplay::Always => true,
        MissingDisplay::IfAny => unknown.iter().any(|&n| n > 0),
        MissingDisplay::No => false,
    };
    if show {
        rows.push(TableRow {
            label: summary.missing_label.clone(),
            indent: 1,
            cells: unknown.iter().map(|n| n.to_string()).collect(),
            kind: RowKind::Unknown,
        });
    }
}

// =============================================================================
// Cell formatting
// =============================================================================

fn fixed(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", digits, v),
        None => "NA".to_string(),
    }
}

fn format_continuous(s: &ContinuousSummary, field: &FieldSpec) -> String {
    let d = field.digits;
    match field.statistic {
        ContinuousStat::MeanSd => format!("{} ({})", fixed(s.mean, d), fixed(s.sd, d)),
        ContinuousStat::MedianIqr => format!(
            "{} ({}, {})",
            fixed(s.median, d),
            fixed(s.q1, d),
            fixed(s.q3, d)
        ),
    }
}

fn format_level(c: &LevelCount, field: &FieldSpec) -> String {
    match c.percent {
        Some(p) => format!("{} ({:.*}%)", c.n, field.digits, p),
        None => format!("{} (NA)", c.n),
    }
}

/// Format one statistic for display.
pub fn format_statistic(statistic: &Statistic, field: &FieldSpec) -> String {
    match statistic {
        Statistic::Continuous(s) => format_continuous(s, field),
        Statistic::Level(c) => format_level(c, field),
        Statistic::Unknown { n } => n.to_string(),
    }
}

/// Legend describing the statistics shown, e.g. `n (%); Mean (SD)`.
fn statistic_legend(fields: &[FieldSpec]) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    if fields.iter().any(|f| f.kind != FieldKind::Continuous) {
        parts.push("n (%)");
    }
    for stat in [ContinuousStat::MeanSd, ContinuousStat::MedianIqr] {
        if fields
            .iter()
            .any(|f| f.kind == FieldKind::Continuous && f.statistic == stat)
        {
            parts.push(stat.legend());
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PercentMode;
    use crate::models::{Cell, Column, Dataset};
    use crate::summary::{summarize, SummaryOptions};

    fn spec(name: &str, label: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.into(),
            label: label.into(),
            kind,
            digits: 1,
            statistic: ContinuousStat::MeanSd,
            value: None,
        }
    }

    fn dataset() -> Dataset {
        let group: Vec<Cell> = ["a", "b", "a", "c", "b", "a"]
            .iter()
            .map(|s| Cell::from(*s))
            .collect();
        let age: Vec<Cell> = [30.0, 40.0, 50.0, 60.0, 20.0, 10.0]
            .iter()
            .map(|v| Cell::Number(*v))
            .collect();
        let sex = vec![
            Cell::from("F"),
            Cell::from("M"),
            Cell::Missing,
            Cell::from("F"),
            Cell::from("F"),
            Cell::from("M"),
        ];
        Dataset::new(vec![
            Column::new("group", group),
            Column::new("age", age),
            Column::new("sex", sex),
        ])
        .unwrap()
    }

    fn summary(overall: bool) -> Summary {
        let options = SummaryOptions {
            fields: vec![
                spec("age", "Age", FieldKind::Continuous),
                spec("sex", "Sex", FieldKind::Categorical),
            ],
            by: Some("group".into()),
            percent: PercentMode::Column,
            percent_include_missing: false,
            overall,
            missing_label: "Unknown".into(),
        };
        summarize(&dataset(), &options).unwrap()
    }

    #[test]
    fn test_headers_and_rows() {
        let table = assemble(&summary(true), &TableLayout::default()).unwrap();
        assert_eq!(
            table.headers,
            vec!["Characteristic", "Overall, N = 6", "a, N = 3", "b, N = 2", "c, N = 1"]
        );

        let labels: Vec<&str> = table.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Age", "Sex", "F", "M", "Unknown"]);

        assert_eq!(table.rows[0].cells[0], "35.0 (18.7)");
        assert_eq!(table.rows[0].cells[1], "30.0 (20.0)");
        assert_eq!(table.rows[0].cells[3], "60.0 (NA)");
        assert_eq!(table.rows[2].cells[1], "1 (50.0%)");
        assert_eq!(table.rows[4].cells, vec!["1", "1", "0", "0"]);
        assert_eq!(table.rows[4].kind, RowKind::Unknown);
        assert_eq!(table.footnotes, vec!["n (%); Mean (SD)"]);
    }

    #[test]
    fn test_missing_display_modes() {
        let s = summary(false);
        let no = TableLayout {
            missing: MissingDisplay::No,
            ..TableLayout::default()
        };
        let table = assemble(&s, &no).unwrap();
        assert!(table.rows.iter().all(|r| r.kind != RowKind::Unknown));

        let always = TableLayout {
            missing: MissingDisplay::Always,
            ..TableLayout::default()
        };
        let table = assemble(&s, &always).unwrap();
        assert_eq!(table.rows.iter().filter(|r| r.kind == RowKind::Unknown).count(), 2);
    }

    #[test]
    fn test_explicit_order_wins() {
        let layout = TableLayout {
            stratum_order: vec!["c".into(), "a".into()],
            header_n: false,
            ..TableLayout::default()
        };
        let table = assemble(&summary(true), &layout).unwrap();
        assert_eq!(table.headers, vec!["Characteristic", "Overall", "c", "a", "b"]);
    }

    #[test]
    fn test_table_strata_follow_order() {
        let layout = TableLayout {
            stratum_order: vec!["c".into(), "a".into()],
            ..TableLayout::default()
        };
        let table = assemble(&summary(true), &layout).unwrap();
        let strata: Vec<Stratum> = table.strata.iter().map(|s| s.stratum.clone()).collect();
        assert_eq!(
            strata,
            vec![
                Stratum::Overall,
                Stratum::Group("c".into()),
                Stratum::Group("a".into()),
                Stratum::Group("b".into()),
            ]
        );
        assert_eq!(table.strata.len() + 1, table.column_count());
    }

    #[test]
    fn test_repeated_stratum_in_order_rejected() {
        let layout = TableLayout {
            stratum_order: vec!["a".into(), "b".into(), "a".into()],
            ..TableLayout::default()
        };
        assert!(matches!(
            assemble(&summary(false), &layout),
            Err(ConfigurationError::InvalidOption { ref option, .. }) if option == "stratum_order"
        ));
    }

    fn grouped_by(values: &[Option<&str>], overall: bool) -> Summary {
        let group: Vec<Cell> = values.iter().map(|v| Cell::from(*v)).collect();
        let age: Vec<Cell> = (0..values.len()).map(|i| Cell::Number(20.0 + i as f64)).collect();
        let ds = Dataset::new(vec![Column::new("group", group), Column::new("age", age)]).unwrap();
        let options = SummaryOptions {
            fields: vec![spec("age", "Age", FieldKind::Continuous)],
            by: Some("group".into()),
            percent: PercentMode::Column,
            percent_include_missing: false,
            overall,
            missing_label: "Unknown".into(),
        };
        summarize(&ds, &options).unwrap()
    }

    #[test]
    fn test_missing_group_column() {
        let layout = TableLayout {
            stratum_order: vec!["Unknown".into()],
            ..TableLayout::default()
        };
        let table = assemble(&grouped_by(&[Some("a"), None, Some("b"), None], false), &layout).unwrap();
        assert_eq!(
            table.headers,
            vec!["Characteristic", "Unknown, N = 2", "a, N = 1", "b, N = 1"]
        );
        assert_eq!(table.strata[0].stratum, Stratum::Missing);
    }

    #[test]
    fn test_group_value_colliding_with_labels_rejected() {
        let unknown = grouped_by(&[Some("Unknown"), None, Some("a")], false);
        assert!(matches!(
            assemble(&unknown, &TableLayout::default()),
            Err(ConfigurationError::InvalidOption { ref option, .. }) if option == "by"
        ));

        let overall = grouped_by(&[Some("Overall"), Some("a")], true);
        assert!(matches!(
            assemble(&overall, &TableLayout::default()),
            Err(ConfigurationError::InvalidOption { ref option, .. }) if option == "by"
        ));

        // Without an overall column the value is just a group.
        let table = assemble(&grouped_by(&[Some("Overall"), Some("a")], false), &TableLayout::default()).unwrap();
        assert_eq!(table.headers[1], "Overall, N = 1");
    }

    #[test]
    fn test_unknown_stratum_rejected() {
        let layout = TableLayout {
            stratum_order: vec!["z".into()],
            ..TableLayout::default()
        };
        assert!(matches!(
            assemble(&summary(false), &layout),
            Err(ConfigurationError::UnknownStratum(ref s)) if s == "z"
        ));
    }

    #[test]
    fn test_spanners() {
        let layout = TableLayout {
            spanners: vec![Spanner {
                label: "Groups".into(),
                strata: vec!["b".into(), "a".into()],
            }],
            ..TableLayout::default()
        };
        let table = assemble(&summary(true), &layout).unwrap();
        assert_eq!(
            table.spanners,
            vec![SpanCell { label: "Groups".into(), start: 2, span: 2 }]
        );
        assert_eq!(table.spanner_at(3).map(|s| s.label.as_str()), Some("Groups"));
        assert!(table.spanner_at(4).is_none());

        let gap = TableLayout {
            spanners: vec![Spanner {
                label: "Split".into(),
                strata: vec!["a".into(), "c".into()],
            }],
            ..TableLayout::default()
        };
        assert!(assemble(&summary(false), &gap).is_err());

        let overlap = TableLayout {
            spanners: vec![
                Spanner { label: "One".into(), strata: vec!["a".into()] },
                Spanner { label: "Two".into(), strata: vec!["a".into(), "b".into()] },
            ],
            ..TableLayout::default()
        };
        assert!(assemble(&summary(false), &overlap).is_err());
    }

    #[test]
    fn test_median_and_dichotomous() {
        let options = SummaryOptions {
            fields: vec![
                FieldSpec {
                    statistic: ContinuousStat::MedianIqr,
                    ..spec("age", "Age", FieldKind::Continuous)
                },
                FieldSpec {
                    value: Some("F".into()),
                    ..spec("sex", "Female", FieldKind::Dichotomous)
                },
            ],
            by: None,
            percent: PercentMode::Column,
            percent_include_missing: false,
            overall: false,
            missing_label: "Unknown".into(),
        };
        let s = summarize(&dataset(), &options).unwrap();
        let table = assemble(&s, &TableLayout::default()).unwrap();

        assert_eq!(table.headers, vec!["Characteristic", "Overall, N = 6"]);
        assert_eq!(table.rows[0].cells, vec!["35.0 (22.5, 47.5)"]);
        assert_eq!(table.rows[1].label, "Female");
        assert_eq!(table.rows[1].cells, vec!["3 (60.0%)"]);
        assert_eq!(table.footnotes[0], "n (%); Median (Q1, Q3)");
    }

    #[test]
    fn test_caption_and_footnotes_kept() {
        let layout = TableLayout {
            caption: Some("Table 1".into()),
            footnotes: vec!["Source: cohort".into()],
            statistic_footnote: false,
            ..TableLayout::default()
        };
        let table = assemble(&summary(false), &layout).unwrap();
        assert_eq!(table.caption.as_deref(), Some("Table 1"));
        assert_eq!(table.footnotes, vec!["Source: cohort"]);
    }
}
