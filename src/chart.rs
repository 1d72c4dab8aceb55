//! Chart classification for query results.
//!
//! Decides whether a result set should be drawn, and as what. This is a fixed
//! threshold policy on row count and first-row column types, not a judgement of
//! visual quality:
//!
//! - fewer than two columns, or no numeric column: no chart
//! - up to [`PIE_MAX_ROWS`] rows: pie
//! - more than [`LINE_MIN_ROWS`] rows: line
//! - otherwise: bar

use serde::{Deserialize, Serialize};

use crate::db::{ResultSet, Value};

/// Largest row count still drawn as a pie.
pub const PIE_MAX_ROWS: usize = 10;

/// Row counts above this are drawn as a line.
pub const LINE_MIN_ROWS: usize = 20;

/// Number of leading rows a pie chart shows.
pub const PIE_MAX_SLICES: usize = 8;

/// Kind of chart to draw for a result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    None,
    Pie,
    Bar,
    Line,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pie => "pie",
            Self::Bar => "bar",
            Self::Line => "line",
        }
    }
}

/// The classifier's decision for one result set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub kind: ChartKind,
    /// Always the first column when a chart is drawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_column: Option<String>,
    /// Numeric columns after the first, in result order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_columns: Vec<String>,
}

impl Classification {
    /// A "don't draw" decision.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_none(&self) -> bool {
        self.kind == ChartKind::None
    }
}

/// Returns true if a first-row value makes its column numeric.
fn is_numeric(value: &Value) -> bool {
    value.is_number() || value.as_f64().is_some()
}

/// Classifies a result set for visualization.
pub fn classify(results: &ResultSet) -> Classification {
    let Some(first) = results.first() else {
        return Classification::none();
    };

    let columns: Vec<&str> = first.columns().collect();
    let numeric: Vec<&str> = first
        .iter()
        .filter(|(_, value)| is_numeric(value))
        .map(|(name, _)| name)
        .collect();

    if numeric.is_empty() || columns.len() < 2 {
        return Classification::none();
    }

    let rows = results.len();
    let kind = if rows <= PIE_MAX_ROWS {
        ChartKind::Pie
    } else if rows > LINE_MIN_ROWS {
        ChartKind::Line
    } else {
        ChartKind::Bar
    };

    let label = columns[0];
    let value_columns = numeric
        .into_iter()
        .filter(|name| *name != label)
        .map(String::from)
        .collect();

    Classification {
        kind,
        label_column: Some(label.to_string()),
        value_columns,
    }
}

/// One slice of a pie chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PieSlice {
    pub name: Value,
    pub value: f64,
}

/// One x-axis position of a bar or line chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub label: Value,
    /// One value per value column, same order as `Classification::value_columns`.
    pub values: Vec<f64>,
}

/// Renderer-ready chart data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChartData {
    Pie {
        slices: Vec<PieSlice>,
    },
    Bar {
        series: Vec<String>,
        points: Vec<SeriesPoint>,
    },
    Line {
        series: Vec<String>,
        points: Vec<SeriesPoint>,
    },
}

fn coerce(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

/// Shapes a result set into chart data according to a classification.
///
/// Returns `None` when the classification says not to draw anything.
pub fn chart_data(results: &ResultSet, classification: &Classification) -> Option<ChartData> {
    let label = classification.label_column.as_deref()?;

    match classification.kind {
        ChartKind::None => None,
        ChartKind::Pie => {
            let value_column = classification.value_columns.first().map(String::as_str);
            let slices = results
                .rows()
                .iter()
                .take(PIE_MAX_SLICES)
                .map(|row| PieSlice {
                    name: row.get(label).cloned().unwrap_or_default(),
                    value: coerce(value_column.and_then(|col| row.get(col))),
                })
                .collect();
            Some(ChartData::Pie { slices })
        }
        ChartKind::Bar | ChartKind::Line => {
            let points = results
                .rows()
                .iter()
                .map(|row| SeriesPoint {
                    label: row.get(label).cloned().unwrap_or_default(),
                    values: classification
                        .value_columns
                        .iter()
                        .map(|col| coerce(row.get(col)))
                        .collect(),
                })
                .collect();
            let series = classification.value_columns.clone();
            Some(if classification.kind == ChartKind::Bar {
                ChartData::Bar { series, points }
            } else {
                ChartData::Line { series, points }
            })
        }
    }
}
