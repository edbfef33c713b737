//! Request configuration and themes.
//!
//! A [`TableConfig`] is what a caller sends with each request (JSON, unknown
//! keys rejected). Options it leaves unset are filled from a [`Theme`], an
//! explicit default object passed alongside the config. Resolution against
//! the dataset produces a [`ResolvedConfig`]: every field with a concrete
//! kind, label and precision, ready for the aggregator and the assembler.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{ConfigResult, ConfigurationError};
use crate::models::{ColumnType, Dataset};
use crate::summary::{FieldSpec, SummaryOptions};
use crate::table::{Spanner, TableLayout};
use crate::transform::bucket::{Boundary, BucketSpec, Closed};
use crate::validation::validate_table_config;

/// Upper bound on decimal places.
pub const MAX_DIGITS: usize = 10;

// =============================================================================
// Enumerated options
// =============================================================================

/// How a field is summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Mean (SD) or median (Q1, Q3)
    Continuous,
    /// n (%) for every level
    Categorical,
    /// n (%) for a single level
    Dichotomous,
}

/// Statistic shown for continuous fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContinuousStat {
    #[default]
    MeanSd,
    MedianIqr,
}

impl ContinuousStat {
    /// Legend text used in the statistic footnote.
    pub fn legend(&self) -> &'static str {
        match self {
            ContinuousStat::MeanSd => "Mean (SD)",
            ContinuousStat::MedianIqr => "Median (Q1, Q3)",
        }
    }
}

/// Denominator used for categorical percentages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentMode {
    /// Share of the field's rows within the stratum.
    #[default]
    Column,
    /// Share of the level's rows across strata.
    Row,
    /// Share of the field's rows across all strata.
    Cell,
}

/// When the unknown (missing) row is displayed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingDisplay {
    /// Only for fields with at least one missing value.
    #[default]
    IfAny,
    Always,
    No,
}

// =============================================================================
// Theme
// =============================================================================

/// Document-wide defaults. Passed explicitly with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Theme {
    pub digits: usize,
    pub percent: PercentMode,
    pub percent_include_missing: bool,
    pub continuous: ContinuousStat,
    pub missing: MissingDisplay,
    pub missing_label: String,
    pub label_header: String,
    pub overall: bool,
    pub overall_label: String,
    pub header_n: bool,
    pub statistic_footnote: bool,
    /// Numeric columns with at most this many distinct values are inferred categorical.
    pub categorical_threshold: usize,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            digits: 1,
            percent: PercentMode::Column,
            percent_include_missing: false,
            continuous: ContinuousStat::MeanSd,
            missing: MissingDisplay::IfAny,
            missing_label: "Unknown".to_string(),
            label_header: "Characteristic".to_string(),
            overall: false,
            overall_label: "Overall".to_string(),
            header_n: true,
            statistic_footnote: true,
            categorical_threshold: 10,
        }
    }
}

impl Theme {
    pub fn check(&self) -> ConfigResult<()> {
        if self.digits > MAX_DIGITS {
            return Err(ConfigurationError::InvalidOption {
                option: "digits".into(),
                message: format!("must be at most {}", MAX_DIGITS),
            });
        }
        if self.missing_label.trim().is_empty() {
            return Err(ConfigurationError::InvalidOption {
                option: "missing_label".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Request configuration
// =============================================================================

/// Per-field settings. Unset values are inferred or inherited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<FieldKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<usize>,
    /// Continuous fields only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistic: Option<ContinuousStat>,
    /// Dichotomous fields only: the level to show
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl FieldConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            label: None,
            digits: None,
            statistic: None,
            value: None,
        }
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One table request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableConfig {
    /// Derived categorical columns, applied in order before summarizing
    #[serde(default)]
    pub derive: Vec<BucketSpec>,
    /// Fields in table order (all columns but `by` when empty)
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    /// Grouping column
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub percent: Option<PercentMode>,
    #[serde(default)]
    pub percent_include_missing: Option<bool>,
    #[serde(default)]
    pub missing: Option<MissingDisplay>,
    #[serde(default)]
    pub overall: Option<bool>,
    /// Default precision for fields without their own
    #[serde(default)]
    pub digits: Option<usize>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub footnotes: Vec<String>,
    #[serde(default)]
    pub spanners: Vec<Spanner>,
    /// Explicit stratum column order; unnamed strata follow in order of appearance
    #[serde(default)]
    pub stratum_order: Vec<String>,
}

/// Fully resolved configuration for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub summary: SummaryOptions,
    pub layout: TableLayout,
}

impl TableConfig {
    /// Parse JSON text, checking it against the embedded schema first.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> ConfigResult<Self> {
        validate_table_config(&value).map_err(|errors| ConfigurationError::Schema { errors })?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Check the request against the dataset and fill unset options from the theme.
    pub fn resolve(&self, dataset: &Dataset, theme: &Theme) -> ConfigResult<ResolvedConfig> {
        theme.check()?;

        if let Some(ref by) = self.by {
            dataset.require_column(by)?;
        }

        let default_digits = self.digits.unwrap_or(theme.digits);
        if default_digits > MAX_DIGITS {
            return Err(ConfigurationError::InvalidOption {
                option: "digits".into(),
                message: format!("must be at most {}", MAX_DIGITS),
            });
        }

        let field_configs: Vec<FieldConfig> = if self.fields.is_empty() {
            dataset
                .column_names()
                .into_iter()
                .filter(|name| Some(name) != self.by.as_ref())
                .map(FieldConfig::named)
                .collect()
        } else {
            self.fields.clone()
        };

        let mut seen = HashSet::new();
        let mut fields = Vec::with_capacity(field_configs.len());
        for field in &field_configs {
            if !seen.insert(field.name.as_str()) {
                return Err(ConfigurationError::DuplicateColumn(field.name.clone()));
            }
            if Some(&field.name) == self.by.as_ref() {
                return Err(invalid_field(&field.name, "the grouping column cannot be summarized"));
            }
            fields.push(resolve_field(field, dataset, theme, default_digits)?);
        }

        let mut order_seen = HashSet::new();
        for name in &self.stratum_order {
            if !order_seen.insert(name.as_str()) {
                return Err(ConfigurationError::InvalidOption {
                    option: "stratum_order".into(),
                    message: format!("'{}' listed twice", name),
                });
            }
        }
        if !self.stratum_order.is_empty() && self.by.is_none() {
            return Err(ConfigurationError::InvalidOption {
                option: "stratum_order".into(),
                message: "requires a grouping column".into(),
            });
        }
        if let Some(spanner) = self.spanners.iter().find(|s| s.strata.is_empty()) {
            return Err(ConfigurationError::InvalidOption {
                option: "spanners".into(),
                message: format!("spanner '{}' covers no strata", spanner.label),
            });
        }

        let percent = self.percent.unwrap_or(theme.percent);
        let percent_include_missing = self
            .percent_include_missing
            .unwrap_or(theme.percent_include_missing);
        // Row denominators are level totals; missing values belong to no level.
        if percent == PercentMode::Row && percent_include_missing {
            return Err(ConfigurationError::InvalidOption {
                option: "percent_include_missing".into(),
                message: "cannot be combined with row percentages".into(),
            });
        }

        let summary = SummaryOptions {
            fields,
            by: self.by.clone(),
            percent,
            percent_include_missing,
            overall: self.overall.unwrap_or(theme.overall),
            missing_label: theme.missing_label.clone(),
        };

        let layout = TableLayout {
            caption: self.caption.clone(),
            footnotes: self.footnotes.clone(),
            spanners: self.spanners.clone(),
            stratum_order: self.stratum_order.clone(),
            label_header: theme.label_header.clone(),
            overall_label: theme.overall_label.clone(),
            header_n: theme.header_n,
            missing: self.missing.unwrap_or(theme.missing),
            statistic_footnote: theme.statistic_footnote,
        };

        Ok(ResolvedConfig { summary, layout })
    }
}

fn invalid_field(field: &str, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidField {
        field: field.to_string(),
        message: message.into(),
    }
}

fn resolve_field(
    field: &FieldConfig,
    dataset: &Dataset,
    theme: &Theme,
    default_digits: usize,
) -> ConfigResult<FieldSpec> {
    let column = dataset.require_column(&field.name)?;
    let column_type = column.column_type();
    let levels = column.distinct_levels();

    let kind = match field.kind {
        Some(kind) => kind,
        None => infer_kind(column_type, column.levels.is_some(), &levels, theme),
    };

    if kind == FieldKind::Continuous && column_type == ColumnType::Text {
        return Err(invalid_field(&field.name, "continuous summary of a text column"));
    }
    if kind == FieldKind::Continuous && column.levels.is_some() {
        return Err(invalid_field(&field.name, "continuous summary of a derived categorical column"));
    }
    if field.statistic.is_some() && kind != FieldKind::Continuous {
        return Err(invalid_field(&field.name, "'statistic' applies to continuous fields only"));
    }
    if field.value.is_some() && kind != FieldKind::Dichotomous {
        return Err(invalid_field(&field.name, "'value' applies to dichotomous fields only"));
    }

    let value = if kind == FieldKind::Dichotomous {
        match field.value {
            Some(ref v) if !levels.contains(v) => {
                return Err(invalid_field(
                    &field.name,
                    format!("value '{}' does not occur (levels: {})", v, levels.join(", ")),
                ));
            }
            Some(ref v) => Some(v.clone()),
            None => default_dichotomous_value(&levels),
        }
    } else {
        None
    };

    let digits = field.digits.unwrap_or(default_digits);
    if digits > MAX_DIGITS {
        return Err(invalid_field(&field.name, format!("digits must be at most {}", MAX_DIGITS)));
    }

    Ok(FieldSpec {
        name: field.name.clone(),
        label: field.label.clone().unwrap_or_else(|| field.name.clone()),
        kind,
        digits,
        statistic: field.statistic.unwrap_or(theme.continuous),
        value,
    })
}

fn infer_kind(column_type: ColumnType, declared_levels: bool, levels: &[String], theme: &Theme) -> FieldKind {
    match column_type {
        ColumnType::Text | ColumnType::Empty => FieldKind::Categorical,
        ColumnType::Numeric if declared_levels => FieldKind::Categorical,
        ColumnType::Numeric => {
            if levels == ["0", "1"] {
                FieldKind::Dichotomous
            } else if levels.len() <= theme.categorical_threshold {
                FieldKind::Categorical
            } else {
                FieldKind::Continuous
            }
        }
    }
}

fn default_dichotomous_value(levels: &[String]) -> Option<String> {
    const PREFERRED: [&str; 7] = ["1", "yes", "Yes", "true", "TRUE", "pos", "positive"];
    PREFERRED
        .iter()
        .find(|p| levels.iter().any(|l| l == *p))
        .map(|p| p.to_string())
        .or_else(|| levels.last().cloned())
}

/// Example configuration for the Pima diabetes data.
pub fn example_config() -> TableConfig {
    TableConfig {
        derive: vec![BucketSpec {
            source: "pregnant".into(),
            target: "parity".into(),
            boundaries: vec![
                Boundary(f64::NEG_INFINITY),
                Boundary(0.0),
                Boundary(4.0),
                Boundary(f64::INFINITY),
            ],
            labels: vec![
                "nulliparous".into(),
                "multiparous".into(),
                "grand multiparous".into(),
            ],
            closed: Closed::Right,
            include_lowest: false,
        }],
        fields: vec![
            FieldConfig::named("age")
                .with_kind(FieldKind::Continuous)
                .with_label("Age, years"),
            FieldConfig::named("glucose")
                .with_kind(FieldKind::Continuous)
                .with_label("Plasma glucose, mg/dL"),
            FieldConfig::named("mass")
                .with_kind(FieldKind::Continuous)
                .with_label("Body mass index"),
            FieldConfig::named("parity").with_label("Parity"),
        ],
        by: Some("diabetes".into()),
        percent: Some(PercentMode::Column),
        overall: Some(true),
        caption: Some("Table 1. Patient characteristics by diabetes status".into()),
        spanners: vec![Spanner {
            label: "Diabetes".into(),
            strata: vec!["neg".into(), "pos".into()],
        }],
        stratum_order: vec!["neg".into(), "pos".into()],
        ..TableConfig::default()
    }
}
