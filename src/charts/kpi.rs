//! Headline KPIs derived from the entries-by-category distribution.

use serde::Serialize;

use super::CategoryPoint;

/// Categories surfaced as headline cards, in display order.
pub const KPI_LABELS: [&str; 4] = ["Incidents", "Hazards", "Audits", "Inspections"];

/// A headline number. `delta` is reserved for period-over-period change and
/// is not computed by the backend today.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpi {
    pub label: String,
    pub value: f64,
    pub delta: Option<f64>,
}

/// Look up `label` in `series` (case-insensitive); absent names yield `0`.
pub fn kpi_for(series: &[CategoryPoint], label: &str) -> Kpi {
    let value = series
        .iter()
        .find(|p| p.name.trim().to_lowercase() == label.to_lowercase())
        .map(|p| p.value)
        .unwrap_or(0.0);

    Kpi {
        label: label.to_string(),
        value,
        delta: None,
    }
}

/// One KPI per entry of [`KPI_LABELS`].
pub fn derive_kpis(series: &[CategoryPoint]) -> Vec<Kpi> {
    KPI_LABELS.iter().map(|label| kpi_for(series, label)).collect()
}
