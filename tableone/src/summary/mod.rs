//! Grouped aggregation of dataset fields.
//!
//! [`summarize`] turns a dataset and resolved [`SummaryOptions`] into a
//! [`Summary`]: one [`SummaryRow`] per (field, stratum, level), plus an
//! explicit unknown row per (field, stratum) counting missing values.
//!
//! # Architecture
//!
//! ```text
//! Dataset rows               Strata                  Summary rows
//! ┌──────────────────┐      ┌───────────────┐       ┌──────────────────────────────┐
//! │ age=50 dia=pos   │      │ Overall (all) │       │ age     pos   mean/sd        │
//! │ age=31 dia=neg   │  →   │ pos           │  →    │ parity  pos   multiparous n% │
//! │ age=NA dia=NA    │      │ neg           │       │ parity  pos   unknown n      │
//! └──────────────────┘      │ Unknown       │       └──────────────────────────────┘
//!                           └───────────────┘
//! ```
//!
//! Missing values never enter a statistic. Non-finite numbers of a
//! continuous field count as missing. A missing grouping value puts the row
//! in its own [`Stratum::Missing`] stratum, headed by the missing label.

pub mod stats;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::config::{ContinuousStat, FieldKind, PercentMode};
use crate::error::{ConfigResult, ConfigurationError};
use crate::models::{Cell, Column, Dataset};

pub use stats::ContinuousSummary;

/// A resolved field: what to compute and how to print it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSpec {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub digits: usize,
    pub statistic: ContinuousStat,
    /// Displayed level of a dichotomous field
    pub value: Option<String>,
}

/// Options for one aggregation request.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOptions {
    pub fields: Vec<FieldSpec>,
    pub by: Option<String>,
    pub percent: PercentMode,
    /// Add missing values to column and cell denominators
    pub percent_include_missing: bool,
    /// Add an overall stratum when grouping
    pub overall: bool,
    pub missing_label: String,
}

/// A stratum column of the summary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "name", rename_all = "snake_case")]
pub enum Stratum {
    /// All rows
    Overall,
    /// Rows sharing one grouping value
    Group(String),
    /// Rows whose grouping value is missing
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StratumInfo {
    pub stratum: Stratum,
    /// Number of rows in the stratum
    pub n: usize,
}

/// Count and percentage of one categorical level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelCount {
    pub n: usize,
    pub denominator: usize,
    /// `None` when the denominator is zero
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statistic {
    Continuous(ContinuousSummary),
    Level(LevelCount),
    /// Missing values of the field in the stratum
    Unknown { n: usize },
}

/// One aggregated statistic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub field: String,
    pub stratum: Stratum,
    /// Categorical level; `None` for continuous and unknown rows
    pub level: Option<String>,
    pub statistic: Statistic,
}

/// Result of one aggregation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub strata: Vec<StratumInfo>,
    pub fields: Vec<FieldSpec>,
    pub rows: Vec<SummaryRow>,
    pub percent: PercentMode,
    pub missing_label: String,
    /// Levels of each categorical field, in display order
    pub levels: BTreeMap<String, Vec<String>>,
}

impl Summary {
    /// Find the row for a (field, stratum, level) triple.
    pub fn find(&self, field: &str, stratum: &Stratum, level: Option<&str>) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| {
            r.field == field
                && &r.stratum == stratum
                && r.level.as_deref() == level
                && !matches!(r.statistic, Statistic::Unknown { .. })
        })
    }

    /// Missing count of a field in a stratum.
    pub fn unknown_count(&self, field: &str, stratum: &Stratum) -> usize {
        self.rows
            .iter()
            .find_map(|r| match r.statistic {
                Statistic::Unknown { n } if r.field == field && &r.stratum == stratum => Some(n),
                _ => None,
            })
            .unwrap_or(0)
    }

    pub fn levels_of(&self, field: &str) -> &[String] {
        self.levels.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Aggregate every field of `options` over the strata of the grouping column.
pub fn summarize(dataset: &Dataset, options: &SummaryOptions) -> ConfigResult<Summary> {
    let strata = build_strata(dataset, options)?;
    // Strata that partition the rows; the overall stratum only repeats them.
    let partition: Vec<&(Stratum, Vec<usize>)> = if options.by.is_some() {
        strata.iter().filter(|(s, _)| *s != Stratum::Overall).collect()
    } else {
        strata.iter().collect()
    };

    let mut rows = Vec::new();
    let mut levels = BTreeMap::new();

    for field in &options.fields {
        let column = dataset.require_column(&field.name)?;
        match field.kind {
            FieldKind::Continuous => {
                summarize_continuous(column, &strata, &mut rows)?;
            }
            FieldKind::Categorical | FieldKind::Dichotomous => {
                let field_levels = column.distinct_levels();
                summarize_categorical(column, &field_levels, &strata, &partition, options, &mut rows);
                levels.insert(field.name.clone(), field_levels);
            }
        }
    }

    Ok(Summary {
        strata: strata
            .into_iter()
            .map(|(stratum, idx)| StratumInfo { stratum, n: idx.len() })
            .collect(),
        fields: options.fields.clone(),
        rows,
        percent: options.percent,
        missing_label: options.missing_label.clone(),
        levels,
    })
}

/// Row indices of each stratum, overall first, groups in order of appearance.
fn build_strata(dataset: &Dataset, options: &SummaryOptions) -> ConfigResult<Vec<(Stratum, Vec<usize>)>> {
    let all: Vec<usize> = (0..dataset.row_count()).collect();

    let by = match options.by {
        Some(ref by) => dataset.require_column(by)?,
        None => return Ok(vec![(Stratum::Overall, all)]),
    };

    let mut groups: Vec<(Stratum, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<Stratum, usize> = HashMap::new();
    for (i, cell) in by.cells.iter().enumerate() {
        let stratum = match cell.level_key() {
            Some(key) => Stratum::Group(key),
            None => Stratum::Missing,
        };
        let pos = *positions.entry(stratum.clone()).or_insert_with(|| {
            groups.push((stratum, Vec::new()));
            groups.len() - 1
        });
        groups[pos].1.push(i);
    }

    if options.overall {
        groups.insert(0, (Stratum::Overall, all));
    }
    Ok(groups)
}

fn summarize_continuous(
    column: &Column,
    strata: &[(Stratum, Vec<usize>)],
    rows: &mut Vec<SummaryRow>,
) -> ConfigResult<()> {
    for (stratum, indices) in strata {
        let mut values = Vec::with_capacity(indices.len());
        let mut missing = 0;
        for &i in indices {
            match &column.cells[i] {
                Cell::Number(v) if v.is_finite() => values.push(*v),
                // inf has no place in a mean; it is reported with the missing values
                Cell::Number(_) | Cell::Missing => missing += 1,
                Cell::Text(s) => {
                    return Err(ConfigurationError::NonNumericColumn {
                        column: column.name.clone(),
                        row: i + 1,
                        value: s.clone(),
                    })
                }
            }
        }

        rows.push(SummaryRow {
            field: column.name.clone(),
            stratum: stratum.clone(),
            level: None,
            statistic: Statistic::Continuous(ContinuousSummary::compute(&values)),
        });
        rows.push(unknown_row(column, stratum, missing));
    }
    Ok(())
}

#[derive(Default)]
struct LevelTally {
    counts: HashMap<String, usize>,
    present: usize,
    missing: usize,
}

impl LevelTally {
    fn of(column: &Column, indices: &[usize]) -> Self {
        let mut tally = LevelTally::default();
        for &i in indices {
            match column.cells[i].level_key() {
                Some(key) => {
                    *tally.counts.entry(key).or_insert(0) += 1;
                    tally.present += 1;
                }
                None => tally.missing += 1,
            }
        }
        tally
    }

    fn count(&self, level: &str) -> usize {
        self.counts.get(level).copied().unwrap_or(0)
    }
}

fn summarize_categorical(
    column: &Column,
    levels: &[String],
    strata: &[(Stratum, Vec<usize>)],
    partition: &[&(Stratum, Vec<usize>)],
    options: &SummaryOptions,
    rows: &mut Vec<SummaryRow>,
) {
    let partition_tallies: Vec<LevelTally> = partition
        .iter()
        .map(|(_, indices)| LevelTally::of(column, indices))
        .collect();
    let level_totals: HashMap<&str, usize> = levels
        .iter()
        .map(|l| (l.as_str(), partition_tallies.iter().map(|t| t.count(l)).sum()))
        .collect();
    let grand_present: usize = partition_tallies.iter().map(|t| t.present).sum();
    let grand_missing: usize = partition_tallies.iter().map(|t| t.missing).sum();

    for (stratum, indices) in strata {
        let tally = LevelTally::of(column, indices);

        for level in levels {
            let n = tally.count(level);
            let denominator = match options.percent {
                PercentMode::Column => {
                    tally.present + if options.percent_include_missing { tally.missing } else { 0 }
                }
                PercentMode::Row => level_totals.get(level.as_str()).copied().unwrap_or(0),
                PercentMode::Cell => {
                    grand_present + if options.percent_include_missing { grand_missing } else { 0 }
                }
            };
            let percent = if denominator > 0 {
                Some(n as f64 * 100.0 / denominator as f64)
            } else {
                None
            };

            rows.push(SummaryRow {
                field: column.name.clone(),
                stratum: stratum.clone(),
                level: Some(level.clone()),
                statistic: Statistic::Level(LevelCount { n, denominator, percent }),
            });
        }
        rows.push(unknown_row(column, stratum, tally.missing));
    }
}

fn unknown_row(column: &Column, stratum: &Stratum, missing: usize) -> SummaryRow {
    SummaryRow {
        field: column.name.clone(),
        stratum: stratum.clone(),
        level: None,
        statistic: Statistic::Unknown { n: missing },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, kind: FieldKind) -> FieldSpec {
        FieldSpec {
            name: name.to_string(),
            label: name.to_string(),
            kind,
            digits: 1,
            statistic: ContinuousStat::MeanSd,
            value: None,
        }
    }

    fn options(fields: Vec<FieldSpec>, by: Option<&str>, percent: PercentMode) -> SummaryOptions {
        SummaryOptions {
            fields,
            by: by.map(String::from),
            percent,
            percent_include_missing: false,
            overall: false,
            missing_label: "Unknown".to_string(),
        }
    }

    fn text(values: &[Option<&str>]) -> Vec<Cell> {
        values.iter().map(|v| Cell::from(*v)).collect()
    }

    /// 10 subjects, 2 with unknown smoking status.
    fn cohort() -> Dataset {
        let smoker = text(&[
            Some("yes"), Some("no"), None, Some("no"), Some("yes"),
            Some("no"), Some("no"), None, Some("yes"), Some("no"),
        ]);
        let diabetes = text(&[
            Some("pos"), Some("neg"), Some("neg"), Some("pos"), Some("neg"),
            Some("neg"), None, Some("pos"), Some("neg"), Some("neg"),
        ]);
        let age: Vec<Cell> = [50.0, 31.0, 32.0, 21.0, 33.0, 30.0, 26.0, 29.0, 53.0, 54.0]
            .iter()
            .map(|v| Cell::Number(*v))
            .collect();
        Dataset::new(vec![
            Column::new("smoker", smoker),
            Column::new("diabetes", diabetes),
            Column::new("age", age),
        ])
        .unwrap()
    }

    fn level(summary: &Summary, field: &str, stratum: &Stratum, lvl: &str) -> LevelCount {
        match &summary.find(field, stratum, Some(lvl)).unwrap().statistic {
            Statistic::Level(c) => c.clone(),
            other => panic!("expected level row, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_reported_separately() {
        let opts = options(vec![field("smoker", FieldKind::Categorical)], None, PercentMode::Column);
        let summary = summarize(&cohort(), &opts).unwrap();

        let yes = level(&summary, "smoker", &Stratum::Overall, "yes");
        let no = level(&summary, "smoker", &Stratum::Overall, "no");
        assert_eq!(yes.n + no.n, 8);
        assert_eq!(yes.denominator, 8);
        assert_eq!(summary.unknown_count("smoker", &Stratum::Overall), 2);
        assert_eq!(yes.percent, Some(37.5));
        assert_eq!(no.percent, Some(62.5));
    }

    #[test]
    fn test_missing_in_denominator_option() {
        let mut opts = options(vec![field("smoker", FieldKind::Categorical)], None, PercentMode::Column);
        opts.percent_include_missing = true;
        let summary = summarize(&cohort(), &opts).unwrap();

        let yes = level(&summary, "smoker", &Stratum::Overall, "yes");
        assert_eq!(yes.denominator, 10);
        assert_eq!(yes.percent, Some(30.0));
    }

    #[test]
    fn test_strata_first_appearance_with_missing_group() {
        let opts = options(vec![field("age", FieldKind::Continuous)], Some("diabetes"), PercentMode::Column);
        let summary = summarize(&cohort(), &opts).unwrap();

        let strata: Vec<(Stratum, usize)> = summary
            .strata
            .iter()
            .map(|s| (s.stratum.clone(), s.n))
            .collect();
        assert_eq!(
            strata,
            vec![
                (Stratum::Group("pos".into()), 3),
                (Stratum::Group("neg".into()), 6),
                (Stratum::Missing, 1),
            ]
        );
    }

    #[test]
    fn test_level_counts_sum_to_non_missing() {
        let mut opts = options(vec![field("smoker", FieldKind::Categorical)], Some("diabetes"), PercentMode::Column);
        opts.overall = true;
        let summary = summarize(&cohort(), &opts).unwrap();
        let ds = cohort();
        let smoker = ds.column("smoker").unwrap();
        let diabetes = ds.column("diabetes").unwrap();

        for info in &summary.strata {
            let non_missing = (0..ds.row_count())
                .filter(|&i| match &info.stratum {
                    Stratum::Overall => true,
                    Stratum::Group(g) => diabetes.cells[i].level_key().as_ref() == Some(g),
                    Stratum::Missing => diabetes.cells[i].is_missing(),
                })
                .filter(|&i| !smoker.cells[i].is_missing())
                .count();

            let sum: usize = summary
                .levels_of("smoker")
                .iter()
                .map(|l| level(&summary, "smoker", &info.stratum, l).n)
                .sum();
            assert_eq!(sum, non_missing, "stratum {:?}", info.stratum);
        }
    }

    #[test]
    fn test_column_percentages_sum_to_100() {
        let opts = options(vec![field("smoker", FieldKind::Categorical)], Some("diabetes"), PercentMode::Column);
        let summary = summarize(&cohort(), &opts).unwrap();

        for info in &summary.strata {
            let total: f64 = summary
                .levels_of("smoker")
                .iter()
                .filter_map(|l| level(&summary, "smoker", &info.stratum, l).percent)
                .sum();
            assert!((total - 100.0).abs() < 1e-9, "stratum {:?} sums to {}", info.stratum, total);
        }
    }

    #[test]
    fn test_row_percentages_sum_across_strata() {
        let opts = options(vec![field("smoker", FieldKind::Categorical)], Some("diabetes"), PercentMode::Row);
        let summary = summarize(&cohort(), &opts).unwrap();

        for lvl in summary.levels_of("smoker") {
            let total: f64 = summary
                .strata
                .iter()
                .filter_map(|info| level(&summary, "smoker", &info.stratum, lvl).percent)
                .sum();
            assert!((total - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cell_percentages_use_grand_total() {
        let opts = options(vec![field("smoker", FieldKind::Categorical)], Some("diabetes"), PercentMode::Cell);
        let summary = summarize(&cohort(), &opts).unwrap();

        let pos_yes = level(&summary, "smoker", &Stratum::Group("pos".into()), "yes");
        assert_eq!(pos_yes.denominator, 8);

        let total: f64 = summary
            .rows
            .iter()
            .filter_map(|r| match &r.statistic {
                Statistic::Level(c) => c.percent,
                _ => None,
            })
            .sum();
        assert!((total - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_continuous_by_group() {
        let mut opts = options(vec![field("age", FieldKind::Continuous)], Some("diabetes"), PercentMode::Column);
        opts.overall = true;
        let summary = summarize(&cohort(), &opts).unwrap();

        assert_eq!(summary.strata[0].stratum, Stratum::Overall);
        match &summary.find("age", &Stratum::Group("pos".into()), None).unwrap().statistic {
            Statistic::Continuous(s) => {
                assert_eq!(s.n, 3);
                assert!((s.mean.unwrap() - (50.0 + 21.0 + 29.0) / 3.0).abs() < 1e-12);
            }
            other => panic!("expected continuous row, got {:?}", other),
        }
        assert_eq!(summary.unknown_count("age", &Stratum::Overall), 0);
    }

    #[test]
    fn test_cell_percentages_with_missing_in_denominator() {
        let mut opts = options(vec![field("smoker", FieldKind::Categorical)], Some("diabetes"), PercentMode::Cell);
        opts.percent_include_missing = true;
        let summary = summarize(&cohort(), &opts).unwrap();

        let pos_yes = level(&summary, "smoker", &Stratum::Group("pos".into()), "yes");
        assert_eq!(pos_yes.n, 1);
        assert_eq!(pos_yes.denominator, 10);
        assert_eq!(pos_yes.percent, Some(10.0));
    }

    #[test]
    fn test_infinite_values_counted_as_unknown() {
        let ds = Dataset::new(vec![Column::new(
            "x",
            vec![Cell::Number(1.0), Cell::Number(f64::INFINITY), Cell::Number(2.0)],
        )])
        .unwrap();
        let opts = options(vec![field("x", FieldKind::Continuous)], None, PercentMode::Column);
        let summary = summarize(&ds, &opts).unwrap();

        match &summary.find("x", &Stratum::Overall, None).unwrap().statistic {
            Statistic::Continuous(s) => {
                assert_eq!(s.n, 2);
                assert_eq!(s.mean, Some(1.5));
            }
            other => panic!("expected continuous row, got {:?}", other),
        }
        assert_eq!(summary.unknown_count("x", &Stratum::Overall), 1);
        assert_eq!(summary.strata[0].n, 3);
    }

    #[test]
    fn test_missing_group_separate_from_unknown_value() {
        let ds = Dataset::new(vec![
            Column::new("group", text(&[Some("Unknown"), None, Some("a")])),
            Column::new("age", vec![Cell::Number(30.0), Cell::Number(40.0), Cell::Number(50.0)]),
        ])
        .unwrap();
        let opts = options(vec![field("age", FieldKind::Continuous)], Some("group"), PercentMode::Column);
        let summary = summarize(&ds, &opts).unwrap();

        let strata: Vec<(Stratum, usize)> = summary
            .strata
            .iter()
            .map(|s| (s.stratum.clone(), s.n))
            .collect();
        assert_eq!(
            strata,
            vec![
                (Stratum::Group("Unknown".into()), 1),
                (Stratum::Missing, 1),
                (Stratum::Group("a".into()), 1),
            ]
        );
    }

    #[test]
    fn test_continuous_rejects_text() {
        let opts = options(vec![field("smoker", FieldKind::Continuous)], None, PercentMode::Column);
        assert!(matches!(
            summarize(&cohort(), &opts),
            Err(ConfigurationError::NonNumericColumn { .. })
        ));
    }

    #[test]
    fn test_idempotent() {
        let mut opts = options(
            vec![field("age", FieldKind::Continuous), field("smoker", FieldKind::Categorical)],
            Some("diabetes"),
            PercentMode::Column,
        );
        opts.overall = true;
        let ds = cohort();
        let first = summarize(&ds, &opts).unwrap();
        let second = summarize(&ds, &opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first.rows).unwrap(),
            serde_json::to_string(&second.rows).unwrap()
        );
    }
}
