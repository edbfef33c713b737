//! Derived categorical fields from numeric columns.
//!
//! A [`BucketRule`] partitions the real line into labeled intervals. Applying
//! it to a numeric column yields a new categorical column whose declared
//! level order is the label order.
//!
//! ```text
//! pregnant:  0            1            5                  2
//!            │            │            │                  │
//! (-inf, 0]  nulliparous  ·            ·                  ·
//! (0, 4]     ·            multiparous  ·                  multiparous
//! (4, inf]   ·            ·            grand multiparous  ·
//! ```

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigResult, ConfigurationError, RangeError, TableResult};
use crate::models::{Cell, Column, Dataset};

/// Which end of each interval is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Closed {
    /// `(lo, hi]`: a value equal to a boundary belongs to the interval it closes.
    #[default]
    Right,
    /// `[lo, hi)`: a value equal to a boundary belongs to the interval it opens.
    Left,
}

/// One interval edge. Serialized as a number, or as `"-inf"` / `"inf"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary(pub f64);

impl Serialize for Boundary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 == f64::INFINITY {
            serializer.serialize_str("inf")
        } else if self.0 == f64::NEG_INFINITY {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Boundary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(Boundary(v)),
            Repr::Text(s) => s
                .parse::<Boundary>()
                .map_err(|_| de::Error::custom(format!("invalid boundary '{}'", s))),
        }
    }
}

impl std::str::FromStr for Boundary {
    type Err = std::num::ParseFloatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inf" | "+inf" | "infinity" => Ok(Boundary(f64::INFINITY)),
            "-inf" | "-infinity" => Ok(Boundary(f64::NEG_INFINITY)),
            other => other.parse::<f64>().map(Boundary),
        }
    }
}

/// Configuration of one derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketSpec {
    /// Numeric source column
    pub source: String,
    /// Name of the new categorical column
    pub target: String,
    /// Interval edges, strictly increasing, outer edges may be infinite
    pub boundaries: Vec<Boundary>,
    /// One label per interval
    pub labels: Vec<String>,
    #[serde(default)]
    pub closed: Closed,
    /// Close the outermost finite edge (lowest for `right`, highest for `left`)
    #[serde(default)]
    pub include_lowest: bool,
}

impl BucketSpec {
    pub fn rule(&self) -> ConfigResult<BucketRule> {
        BucketRule::new(
            self.boundaries.iter().map(|b| b.0).collect(),
            self.labels.clone(),
            self.closed,
            self.include_lowest,
        )
    }
}

/// A validated bucketing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRule {
    boundaries: Vec<f64>,
    labels: Vec<String>,
    closed: Closed,
    include_lowest: bool,
}

impl BucketRule {
    /// Validate boundaries and labels.
    pub fn new(
        boundaries: Vec<f64>,
        labels: Vec<String>,
        closed: Closed,
        include_lowest: bool,
    ) -> ConfigResult<Self> {
        if boundaries.len() < 2 {
            return Err(ConfigurationError::InvalidBoundaries(format!(
                "need at least 2 boundaries, got {}",
                boundaries.len()
            )));
        }
        if boundaries.iter().any(|b| b.is_nan()) {
            return Err(ConfigurationError::InvalidBoundaries(
                "boundaries must not be NaN".to_string(),
            ));
        }
        if let Some(pair) = boundaries.windows(2).find(|w| w[0] >= w[1]) {
            return Err(ConfigurationError::InvalidBoundaries(format!(
                "boundaries must be strictly increasing ({} >= {})",
                pair[0], pair[1]
            )));
        }

        let intervals = boundaries.len() - 1;
        if labels.len() != intervals {
            return Err(ConfigurationError::LabelCountMismatch {
                labels: labels.len(),
                intervals,
            });
        }

        Ok(Self {
            boundaries,
            labels,
            closed,
            include_lowest,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Label of the interval containing `value`, if any.
    pub fn classify(&self, value: f64) -> Option<&str> {
        if value.is_nan() {
            return None;
        }
        let last = self.labels.len() - 1;
        self.boundaries
            .windows(2)
            .enumerate()
            .find(|(i, w)| self.contains(w[0], w[1], value, *i == 0, *i == last))
            .map(|(i, _)| self.labels[i].as_str())
    }

    fn contains(&self, lo: f64, hi: f64, value: f64, first: bool, last: bool) -> bool {
        match self.closed {
            Closed::Right => {
                let above = value > lo
                    || (first && (lo == f64::NEG_INFINITY || (self.include_lowest && value == lo)));
                above && value <= hi
            }
            Closed::Left => {
                let below = value < hi
                    || (last && (hi == f64::INFINITY || (self.include_lowest && value == hi)));
                value >= lo && below
            }
        }
    }

    /// Map every cell of a numeric column to its label.
    ///
    /// Missing cells stay missing. Text cells are a configuration error, values
    /// outside all intervals a [`RangeError`].
    pub fn apply(&self, column: &Column) -> TableResult<Vec<Cell>> {
        column
            .cells
            .iter()
            .enumerate()
            .map(|(i, cell)| -> TableResult<Cell> {
                match cell {
                    Cell::Missing => Ok(Cell::Missing),
                    Cell::Text(s) => Err(ConfigurationError::NonNumericColumn {
                        column: column.name.clone(),
                        row: i + 1,
                        value: s.clone(),
                    }
                    .into()),
                    Cell::Number(v) => self
                        .classify(*v)
                        .map(|label| Cell::Text(label.to_string()))
                        .ok_or_else(|| {
                            RangeError {
                                column: column.name.clone(),
                                row: i + 1,
                                value: *v,
                            }
                            .into()
                        }),
                }
            })
            .collect()
    }
}

/// Append the derived column described by `spec` to a copy of `dataset`.
pub fn derive_categorical(dataset: &Dataset, spec: &BucketSpec) -> TableResult<Dataset> {
    let rule = spec.rule()?;
    let source = dataset.require_column(&spec.source)?;
    if dataset.column(&spec.target).is_some() {
        return Err(ConfigurationError::DuplicateColumn(spec.target.clone()).into());
    }

    let cells = rule.apply(source)?;
    let column = Column::new(spec.target.clone(), cells).with_levels(rule.labels().to_vec());
    Ok(dataset.with_column(column)?)
}
