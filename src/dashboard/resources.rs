//! The catalogue of analytical resources polled on every refresh cycle.

use serde::Serialize;

use crate::charts::ChartKind;
use crate::config::ResourceSelection;

/// Resource group, mirroring how the backend organises its chart routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceSet {
    /// Cross-category overview charts under `/chart/*`.
    Unified,
    /// Incident- and hazard-specific charts.
    Modular,
}

impl std::fmt::Display for ResourceSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unified => write!(f, "unified"),
            Self::Modular => write!(f, "modular"),
        }
    }
}

/// One named analytical query against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resource {
    /// Stable key, also used as the `chart_key` for insights requests.
    pub key: &'static str,
    /// Path relative to the backend base URL.
    pub path: &'static str,
    pub title: &'static str,
    pub set: ResourceSet,
    pub kind: ChartKind,
}

/// Resource whose category series feeds the headline KPIs.
pub const KPI_SOURCE: &str = "entries_by_category";

const fn resource(
    key: &'static str,
    path: &'static str,
    title: &'static str,
    set: ResourceSet,
    kind: ChartKind,
) -> Resource {
    Resource {
        key,
        path,
        title,
        set,
        kind,
    }
}

use ChartKind::{Category, Grouped, Heat, Trend};
use ResourceSet::{Modular, Unified};

/// Every resource, in display (and failure-reporting) order.
pub const RESOURCES: &[Resource] = &[
    resource("entries_by_category", "/chart/entries-by-category", "Entries by Category", Unified, Category),
    resource("incident_hazard_types", "/chart/incident-hazard-types", "Incident & Hazard Types", Unified, Category),
    resource("monthly_trends", "/chart/monthly-trends", "Monthly Trends", Unified, Trend),
    resource("entries_by_location", "/chart/entries-by-location", "Entries by Location", Unified, Category),
    resource("stacked_entries_by_location", "/chart/stacked-entries-by-location", "Entries by Location and Category", Unified, Grouped),
    resource("types_by_location", "/chart/types-by-location", "Types by Location", Unified, Grouped),
    resource("proportion_by_location", "/chart/proportion-by-location", "Proportion by Location", Unified, Category),
    resource("status_by_location", "/chart/status-by-location", "Status by Location", Unified, Grouped),
    resource("heatmap", "/chart/heatmap", "Incidents and Hazards by Location", Unified, Heat),
    resource("incidents_types", "/chart/incidents/types", "Incident Types", Modular, Category),
    resource("incidents_top_locations", "/chart/incidents/top-locations", "Top Incident Locations", Modular, Category),
    resource("hazards_monthly", "/chart/hazards/monthly", "Hazards per Month", Modular, Trend),
    resource("hazards_by_location", "/chart/hazards/by-location", "Hazards by Location", Modular, Category),
    resource("hazards_by_risk", "/hazards/by-risk", "Hazards by Risk", Modular, Category),
    resource("hazards_by_area", "/hazards/by-area", "Hazards by Area", Modular, Category),
    resource("hazards_heatmap", "/hazards/heatmap", "Location vs Hazard Type", Modular, Heat),
    resource("hazards_vs_incidents_dept", "/hazards/compare-by-department", "Hazards vs Incidents by Department", Modular, Grouped),
];

/// Find a resource by key.
pub fn find(key: &str) -> Option<&'static Resource> {
    RESOURCES.iter().find(|r| r.key == key)
}

/// Resources included by a selection, in catalogue order.
pub fn select(selection: ResourceSelection) -> Vec<&'static Resource> {
    RESOURCES
        .iter()
        .filter(|r| match selection {
            ResourceSelection::All => true,
            ResourceSelection::Unified => r.set == Unified,
            ResourceSelection::Modular => r.set == Modular,
        })
        .collect()
}
