/// Total conversions from raw backend JSON to canonical chart models.
///
/// Every parser accepts an arbitrary, possibly malformed document and always
/// returns a model. Missing input, JSON `null`, an `{"error": ...}` document
/// or a structurally wrong shape degrade to the empty form so the rest of the
/// dashboard pipeline never has to handle a parse failure.
///
/// Numeric coercion is lenient: JSON numbers and numeric strings are
/// accepted, anything else (including `null`, booleans, non-finite values
/// and short arrays) reads as `0`.
use serde_json::Value;

use super::{
    CategoryPoint, CategorySeries, ChartKind, ChartModel, ChartPayload, GroupedRow, GroupedSeries,
    HeatMatrix, TrendPoint, TrendSeries,
};

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Normalize `doc` into the model for `kind`.
pub fn normalize(kind: ChartKind, doc: Option<&Value>) -> ChartModel {
    match kind {
        ChartKind::Category => ChartModel::Category(parse_category(doc)),
        ChartKind::Grouped => ChartModel::Grouped(parse_grouped(doc)),
        ChartKind::Trend => ChartModel::Trend(parse_trend(doc)),
        ChartKind::Heat => ChartModel::Heat(parse_heat(doc)),
    }
}

// ---------------------------------------------------------------------------
// Series-shaped parsers
// ---------------------------------------------------------------------------

/// Pair `labels[i]` with `datasets[0].data[i]`.
pub fn parse_category(doc: Option<&Value>) -> CategorySeries {
    let Some(doc) = series_doc(doc) else {
        return Vec::new();
    };

    let data = datasets(doc)
        .first()
        .and_then(|ds| ds.get("data"))
        .and_then(Value::as_array);

    labels(doc, "labels")
        .into_iter()
        .enumerate()
        .map(|(i, name)| CategoryPoint {
            name,
            value: number_at(data, i),
        })
        .collect()
}

/// One row per label, one column per dataset label.
///
/// Datasets without a label are called `Series N` (1-based). Datasets that
/// share a label are merged into the first one so every row carries the same
/// label set exactly once.
pub fn parse_grouped(doc: Option<&Value>) -> GroupedSeries {
    let Some(doc) = series_doc(doc) else {
        return GroupedSeries::default();
    };

    let row_names = labels(doc, "labels");
    let mut series: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for (i, ds) in datasets(doc).iter().enumerate() {
        let label = match ds.get("label").map(label_text) {
            Some(l) if !l.is_empty() => l,
            _ => format!("Series {}", i + 1),
        };
        let col = match series.iter().position(|s| *s == label) {
            Some(col) => col,
            None => {
                series.push(label);
                columns.push(vec![0.0; row_names.len()]);
                series.len() - 1
            }
        };

        let data = ds.get("data").and_then(Value::as_array);
        for (row, cell) in columns[col].iter_mut().enumerate() {
            *cell += number_at(data, row);
        }
    }

    let rows = row_names
        .into_iter()
        .enumerate()
        .map(|(row, name)| GroupedRow {
            name,
            values: columns.iter().map(|c| c[row]).collect(),
        })
        .collect();

    GroupedSeries { series, rows }
}

/// Sum every dataset at each label index.
pub fn parse_trend(doc: Option<&Value>) -> TrendSeries {
    let Some(doc) = series_doc(doc) else {
        return Vec::new();
    };

    let data: Vec<Option<&Vec<Value>>> = datasets(doc)
        .iter()
        .map(|ds| ds.get("data").and_then(Value::as_array))
        .collect();

    labels(doc, "labels")
        .into_iter()
        .enumerate()
        .map(|(i, period)| TrendPoint {
            period,
            value: data.iter().map(|d| number_at(*d, i)).sum(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Heat matrix
// ---------------------------------------------------------------------------

/// Build a rectangular heat matrix.
///
/// Rows are padded with zeros (or truncated) to `x_labels.len()`; missing
/// rows become all-zero rows. When an axis has no labels at all the axis is
/// labelled by 1-based position from the shape of `values`. `min`/`max` are
/// taken from the document when numeric, otherwise from the flattened cells
/// of `values`. A matrix with an empty axis keeps one empty row per y label
/// and has zero bounds.
pub fn parse_heat(doc: Option<&Value>) -> HeatMatrix {
    let ChartPayload::Heat(doc) = ChartPayload::classify(doc) else {
        return HeatMatrix::default();
    };
    let Some(rows) = doc.get("values").and_then(Value::as_array) else {
        return HeatMatrix::default();
    };

    let raw_rows: Vec<Vec<f64>> = rows
        .iter()
        .map(|row| {
            row.as_array()
                .map(|cells| cells.iter().map(coerce_number).collect())
                .unwrap_or_default()
        })
        .collect();

    let widest = raw_rows.iter().map(Vec::len).max().unwrap_or(0);
    let Some(x_labels) = axis_labels(doc.get("x_labels"), widest) else {
        return HeatMatrix::default();
    };
    let Some(y_labels) = axis_labels(doc.get("y_labels"), raw_rows.len()) else {
        return HeatMatrix::default();
    };

    if x_labels.is_empty() || y_labels.is_empty() {
        let values = vec![Vec::new(); y_labels.len()];
        return HeatMatrix {
            x_labels,
            y_labels,
            values,
            ..HeatMatrix::default()
        };
    }

    // Bounds cover every cell the document carries, including cells cut off
    // by the x axis; padding zeros are not counted.
    let mut seen_min: Option<f64> = None;
    let mut seen_max: Option<f64> = None;
    for &v in raw_rows.iter().flatten() {
        seen_min = Some(seen_min.map_or(v, |m| m.min(v)));
        seen_max = Some(seen_max.map_or(v, |m| m.max(v)));
    }

    let values: Vec<Vec<f64>> = (0..y_labels.len())
        .map(|y| {
            let raw = raw_rows.get(y).map(Vec::as_slice).unwrap_or(&[]);
            let mut row = raw[..raw.len().min(x_labels.len())].to_vec();
            row.resize(x_labels.len(), 0.0);
            row
        })
        .collect();

    let min = finite_number(doc.get("min")).unwrap_or_else(|| seen_min.unwrap_or(0.0));
    let max = finite_number(doc.get("max")).unwrap_or_else(|| seen_max.unwrap_or(0.0));

    HeatMatrix {
        x_labels,
        y_labels,
        values,
        min,
        max,
    }
}

/// Labels for one heat axis.
///
/// Absent → positional labels for `len` entries; an array → its entries;
/// anything else → `None` (structural failure).
fn axis_labels(axis: Option<&Value>, len: usize) -> Option<Vec<String>> {
    match axis {
        None | Some(Value::Null) => Some((1..=len).map(|i| i.to_string()).collect()),
        Some(Value::Array(items)) => Some(items.iter().map(label_text).collect()),
        Some(_) => None,
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

/// The document if it is series-shaped, `None` for absent/error/heat shapes.
fn series_doc(doc: Option<&Value>) -> Option<&Value> {
    match ChartPayload::classify(doc) {
        ChartPayload::Series(doc) => Some(doc),
        _ => None,
    }
}

fn datasets(doc: &Value) -> &[Value] {
    doc.get("datasets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn labels(doc: &Value, key: &str) -> Vec<String> {
    doc.get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(label_text).collect())
        .unwrap_or_default()
}

fn label_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

fn number_at(data: Option<&Vec<Value>>, i: usize) -> f64 {
    data.and_then(|d| d.get(i)).map(coerce_number).unwrap_or(0.0)
}

fn coerce_number(v: &Value) -> f64 {
    finite_number(Some(v)).unwrap_or(0.0)
}

fn finite_number(v: Option<&Value>) -> Option<f64> {
    let n = match v? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
