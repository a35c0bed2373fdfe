//! Structured trailer appended to streamed answers.
//!
//! After the prose, the backend may emit `\n[[META]]{json}` carrying a chart
//! and table that back the answer. The trailer is never shown as text.

use serde::Deserialize;
use serde_json::Value;

use crate::charts::CategorySeries;
use crate::charts::normalize::parse_category;

pub const META_MARKER: &str = "[[META]]";

/// Tabular data for display under the answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub headers: Vec<String>,
    /// Cells are mixed strings and numbers.
    #[serde(default)]
    pub rows: Vec<Vec<Value>>,
}

/// One chart/table pair of a multi-block answer.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChartBlock {
    #[serde(default)]
    pub chart_data: Option<Value>,
    #[serde(default)]
    pub table_data: Option<TableData>,
}

impl ChartBlock {
    pub fn chart(&self) -> CategorySeries {
        parse_category(self.chart_data.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightMeta {
    #[serde(default)]
    pub chart_data: Option<Value>,
    #[serde(default)]
    pub table_data: Option<TableData>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub chart_blocks: Vec<ChartBlock>,
}

impl InsightMeta {
    /// The primary chart as a category series (empty when absent).
    pub fn chart(&self) -> CategorySeries {
        parse_category(self.chart_data.as_ref())
    }

    /// Every table in display order: the primary one, then block tables.
    pub fn tables(&self) -> Vec<&TableData> {
        self.table_data
            .iter()
            .chain(self.chart_blocks.iter().filter_map(|b| b.table_data.as_ref()))
            .collect()
    }
}

/// Split a complete answer into its visible text and parsed trailer.
///
/// An unparseable trailer is still hidden.
pub fn split(text: &str) -> (&str, Option<InsightMeta>) {
    match text.find(META_MARKER) {
        Some(idx) => {
            let raw = text[idx + META_MARKER.len()..].trim();
            (text[..idx].trim_end(), serde_json::from_str(raw).ok())
        }
        None => (text, None),
    }
}

/// Text that is safe to show while the answer is still streaming.
///
/// Like [`split`], but also hides a trailing prefix of the marker that may
/// complete on the next frame.
pub fn visible_prefix(text: &str) -> &str {
    if let Some(idx) = text.find(META_MARKER) {
        return text[..idx].trim_end();
    }
    for len in (1..META_MARKER.len()).rev() {
        if text.ends_with(&META_MARKER[..len]) {
            return text[..text.len() - len].trim_end();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_parses_chart_and_table() {
        let text = "Most incidents are in Plant A.\n[[META]]{\"chart_data\":{\"labels\":[\"Plant A\"],\"datasets\":[{\"data\":[7]}]},\"table_data\":{\"headers\":[\"Location\",\"Count\"],\"rows\":[[\"Plant A\",7]]}}";
        let (visible, meta) = split(text);
        assert_eq!(visible, "Most incidents are in Plant A.");
        let meta = meta.unwrap();
        assert_eq!(meta.chart()[0].value, 7.0);
        assert_eq!(meta.tables()[0].headers, ["Location", "Count"]);
    }

    #[test]
    fn malformed_trailer_is_hidden() {
        let (visible, meta) = split("Answer\n[[META]]{not json");
        assert_eq!(visible, "Answer");
        assert!(meta.is_none());
    }

    #[test]
    fn text_without_marker_is_untouched() {
        assert_eq!(split("plain "), ("plain ", None));
        assert_eq!(visible_prefix("plain "), "plain ");
    }

    #[test]
    fn partial_marker_is_hidden_while_streaming() {
        assert_eq!(visible_prefix("Answer\n[[ME"), "Answer");
        assert_eq!(visible_prefix("Answer\n["), "Answer");
        assert_eq!(visible_prefix("Answer\n[[META]]{\"no"), "Answer");
        assert_eq!(visible_prefix("a [b]"), "a [b]");
    }

    #[test]
    fn chart_blocks_contribute_tables() {
        let (_, meta) = split("x[[META]]{\"note\":\"n\",\"chart_blocks\":[{\"table_data\":{\"headers\":[\"A\"],\"rows\":[]}},{}]}");
        let meta = meta.unwrap();
        assert_eq!(meta.note.as_deref(), Some("n"));
        assert_eq!(meta.chart_blocks.len(), 2);
        assert_eq!(meta.tables().len(), 1);
        assert!(meta.chart_blocks[1].chart().is_empty());
    }
}
