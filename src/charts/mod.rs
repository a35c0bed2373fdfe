//! Canonical chart models.
//!
//! The backend answers every analytical resource with one of two JSON
//! shapes: a labelled series document (`labels` + `datasets`) or a heat
//! matrix (`x_labels` + `y_labels` + `values`). The normalizers in
//! [`normalize`] turn those documents into the value types defined here,
//! which are what the dashboard slots hold and what the views render.
//!
//! All models are plain immutable values rebuilt from scratch on every
//! refresh cycle.

pub mod kpi;
pub mod normalize;

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Model kinds
// ---------------------------------------------------------------------------

/// Which canonical model a resource normalizes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Single-dataset distribution (`name` → `value`).
    Category,
    /// Multi-dataset grouped or stacked bars.
    Grouped,
    /// Period series, all datasets summed per period.
    Trend,
    /// Two-dimensional heat matrix.
    Heat,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Category => write!(f, "category"),
            Self::Grouped => write!(f, "grouped"),
            Self::Trend => write!(f, "trend"),
            Self::Heat => write!(f, "heat"),
        }
    }
}

// ---------------------------------------------------------------------------
// Category series
// ---------------------------------------------------------------------------

/// One bar/slice of a category distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPoint {
    pub name: String,
    pub value: f64,
}

impl CategoryPoint {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Ordered category distribution, in upstream label order.
pub type CategorySeries = Vec<CategoryPoint>;

// ---------------------------------------------------------------------------
// Grouped series
// ---------------------------------------------------------------------------

/// One group (x-axis label) of a grouped/stacked chart.
///
/// `values[i]` belongs to the series label at the same index in
/// [`GroupedSeries::series`].
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedRow {
    pub name: String,
    pub values: Vec<f64>,
}

impl GroupedRow {
    /// Sum of all series values in this row.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

/// Grouped/stacked series sharing one label set across every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSeries {
    pub series: Vec<String>,
    pub rows: Vec<GroupedRow>,
}

impl GroupedSeries {
    /// Look up a single cell by row name and series label.
    pub fn value(&self, row: &str, label: &str) -> Option<f64> {
        let col = self.series.iter().position(|s| s == label)?;
        let row = self.rows.iter().find(|r| r.name == row)?;
        row.values.get(col).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Serializes as `{series: [...], rows: [{name, <label>: value, ...}]}` so a
/// chart library can consume the rows directly.
impl Serialize for GroupedSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct RowView<'a> {
            series: &'a [String],
            row: &'a GroupedRow,
        }

        impl Serialize for RowView<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.series.len() + 1))?;
                map.serialize_entry("name", &self.row.name)?;
                for (label, value) in self.series.iter().zip(&self.row.values) {
                    map.serialize_entry(label, value)?;
                }
                map.end()
            }
        }

        let rows: Vec<RowView<'_>> = self
            .rows
            .iter()
            .map(|row| RowView {
                series: &self.series,
                row,
            })
            .collect();

        let mut s = serializer.serialize_struct("GroupedSeries", 2)?;
        s.serialize_field("series", &self.series)?;
        s.serialize_field("rows", &rows)?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Trend series
// ---------------------------------------------------------------------------

/// One period of a trend line; `value` is the sum across all datasets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: String,
    pub value: f64,
}

impl TrendPoint {
    pub fn new(period: impl Into<String>, value: f64) -> Self {
        Self {
            period: period.into(),
            value,
        }
    }
}

/// Trend points in upstream order (assumed chronological, never re-sorted).
pub type TrendSeries = Vec<TrendPoint>;

// ---------------------------------------------------------------------------
// Heat matrix
// ---------------------------------------------------------------------------

/// Two-dimensional heat matrix.
///
/// `values.len() == y_labels.len()` and every row has `x_labels.len()`
/// cells. An empty matrix has `min == max == 0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeatMatrix {
    pub x_labels: Vec<String>,
    pub y_labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
    pub min: f64,
    pub max: f64,
}

impl HeatMatrix {
    pub fn is_empty(&self) -> bool {
        self.x_labels.is_empty() || self.y_labels.is_empty()
    }

    /// Position of `v` within `[min, max]`, in `0.0..=1.0`.
    pub fn intensity(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span <= 0.0 {
            0.0
        } else {
            ((v - self.min) / span).clamp(0.0, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// Model union
// ---------------------------------------------------------------------------

/// A normalized chart, as stored in a dashboard slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum ChartModel {
    Category(CategorySeries),
    Grouped(GroupedSeries),
    Trend(TrendSeries),
    Heat(HeatMatrix),
}

impl ChartModel {
    pub fn kind(&self) -> ChartKind {
        match self {
            Self::Category(_) => ChartKind::Category,
            Self::Grouped(_) => ChartKind::Grouped,
            Self::Trend(_) => ChartKind::Trend,
            Self::Heat(_) => ChartKind::Heat,
        }
    }

    /// Number of points (category/trend), rows (grouped) or matrix rows (heat).
    pub fn len(&self) -> usize {
        match self {
            Self::Category(points) => points.len(),
            Self::Grouped(grouped) => grouped.rows.len(),
            Self::Trend(points) => points.len(),
            Self::Heat(matrix) => matrix.values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_category(&self) -> Option<&CategorySeries> {
        match self {
            Self::Category(points) => Some(points),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Payload classification
// ---------------------------------------------------------------------------

/// The shape of a raw backend document, discriminated by which fields are
/// present.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChartPayload<'a> {
    /// Nothing usable: missing input, JSON `null`, or an unrecognised shape.
    Absent,
    /// The backend answered `{"error": ...}`.
    Error(&'a Value),
    /// `labels` + `datasets` document.
    Series(&'a Value),
    /// `x_labels` + `y_labels` + `values` document.
    Heat(&'a Value),
}

impl<'a> ChartPayload<'a> {
    pub fn classify(doc: Option<&'a Value>) -> Self {
        let Some(doc) = doc else {
            return Self::Absent;
        };
        let Some(obj) = doc.as_object() else {
            return Self::Absent;
        };

        if obj.get("error").is_some_and(|e| !e.is_null()) {
            Self::Error(doc)
        } else if obj.contains_key("x_labels")
            || obj.contains_key("y_labels")
            || obj.contains_key("values")
        {
            Self::Heat(doc)
        } else if obj.contains_key("labels") || obj.contains_key("datasets") {
            Self::Series(doc)
        } else {
            Self::Absent
        }
    }

    /// The backend's error message, if this is an error document.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Error(doc) => doc.get("error").map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            _ => None,
        }
    }
}
