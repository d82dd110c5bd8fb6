//! Host state model and analytics-eligibility classification.
//!
//! The host delivers arbitrary result entries; only entries carrying a stable
//! object identifier are analytics-eligible. Classification is an explicit
//! optional-field check against a typed schema, never runtime shape-sniffing.
//! Ineligible entries are silently dropped from every event path.

use serde::{Deserialize, Serialize};

/// One raw result-set entry as supplied by the host interaction surface.
///
/// Fields this crate does not understand are preserved in `extra` so that
/// round-tripping host items through the plugin is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultEntry {
    /// Stable object identifier. Entries without one are never eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,

    /// Absolute position of the entry within the rendered result set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,

    /// Identifier of the query that produced this entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,

    /// Name of the index/collection the entry came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_index: Option<String>,

    /// Remaining host-specific fields, carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ResultEntry {
    /// Entry with an object identifier and nothing else.
    #[must_use]
    pub fn identified(object_id: impl Into<String>) -> Self {
        Self {
            object_id: Some(object_id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_position(mut self, position: u32) -> Self {
        self.position = Some(position);
        self
    }

    #[must_use]
    pub fn with_query_id(mut self, query_id: impl Into<String>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }

    #[must_use]
    pub fn with_source_index(mut self, source_index: impl Into<String>) -> Self {
        self.source_index = Some(source_index.into());
        self
    }
}

/// A classified, analytics-eligible result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibleHit {
    pub object_id: String,
    pub position: Option<u32>,
    pub query_id: Option<String>,
    pub source_index: Option<String>,
}

impl EligibleHit {
    /// Classify one raw entry.
    ///
    /// Returns `Some` iff the entry carries a non-empty object identifier.
    /// Pure; never raises on malformed entries.
    #[must_use]
    pub fn classify(entry: &ResultEntry) -> Option<Self> {
        match entry.object_id.as_deref() {
            Some(id) if !id.is_empty() => Some(Self {
                object_id: id.to_owned(),
                position: entry.position,
                query_id: entry.query_id.clone(),
                source_index: entry.source_index.clone(),
            }),
            _ => None,
        }
    }
}

/// One ordered group of result entries (one host result source).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResultGroup {
    pub source_id: String,
    pub entries: Vec<ResultEntry>,
}

impl ResultGroup {
    #[must_use]
    pub fn new(source_id: impl Into<String>, entries: Vec<ResultEntry>) -> Self {
        Self {
            source_id: source_id.into(),
            entries,
        }
    }
}

/// Full host surface state delivered on every re-render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchState {
    /// Whether the interaction surface is open. Closed surfaces are a no-op
    /// for change detection.
    pub open: bool,
    /// Grouped result collections, in render order.
    pub groups: Vec<ResultGroup>,
}

impl SearchState {
    /// Open state with a single result group, as most hosts produce.
    #[must_use]
    pub fn open_with(source_id: impl Into<String>, entries: Vec<ResultEntry>) -> Self {
        Self {
            open: true,
            groups: vec![ResultGroup::new(source_id, entries)],
        }
    }
}

/// One backend response descriptor, consumed by permission verification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    /// Explicit marker that the backend wants analytics for this response.
    pub analytics_opt_in: bool,
}

/// Outcome of flattening and classifying one full host state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassifiedState {
    /// Eligible hits in group order, then item order within group.
    pub hits: Vec<EligibleHit>,
    /// Count of entries dropped as ineligible.
    pub ineligible: usize,
}

/// Flatten all groups of `state` in order and classify every entry.
#[must_use]
pub fn classify_state(state: &SearchState) -> ClassifiedState {
    let mut classified = ClassifiedState::default();
    for group in &state.groups {
        for entry in &group.entries {
            match EligibleHit::classify(entry) {
                Some(hit) => classified.hits.push(hit),
                None => classified.ineligible = classified.ineligible.saturating_add(1),
            }
        }
    }
    classified
}

/// Order-sensitive comparison of two hit sequences by identifier only.
///
/// Identifier-only comparison is stable under re-renders that shuffle
/// unrelated metadata without changing which items are visible.
#[must_use]
pub fn same_identifier_sequence(previous: &[EligibleHit], current: &[EligibleHit]) -> bool {
    previous.len() == current.len()
        && previous
            .iter()
            .zip(current)
            .all(|(a, b)| a.object_id == b.object_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_requires_non_empty_identifier() {
        assert!(EligibleHit::classify(&ResultEntry::identified("doc-1")).is_some());
        assert!(EligibleHit::classify(&ResultEntry::default()).is_none());

        let empty_id = ResultEntry {
            object_id: Some(String::new()),
            ..ResultEntry::default()
        };
        assert!(EligibleHit::classify(&empty_id).is_none());
    }

    #[test]
    fn classify_carries_query_context() {
        let entry = ResultEntry::identified("doc-1")
            .with_position(3)
            .with_query_id("q-9")
            .with_source_index("products");
        let hit = EligibleHit::classify(&entry).expect("eligible");
        assert_eq!(hit.object_id, "doc-1");
        assert_eq!(hit.position, Some(3));
        assert_eq!(hit.query_id.as_deref(), Some("q-9"));
        assert_eq!(hit.source_index.as_deref(), Some("products"));
    }

    #[test]
    fn classify_ignores_extra_fields() {
        let mut entry = ResultEntry::identified("doc-1");
        entry
            .extra
            .insert("title".to_owned(), serde_json::json!("A Result"));
        assert!(EligibleHit::classify(&entry).is_some());
    }

    #[test]
    fn classify_state_flattens_in_group_then_item_order() {
        let state = SearchState {
            open: true,
            groups: vec![
                ResultGroup::new(
                    "products",
                    vec![
                        ResultEntry::identified("a"),
                        ResultEntry::default(),
                        ResultEntry::identified("b"),
                    ],
                ),
                ResultGroup::new("articles", vec![ResultEntry::identified("c")]),
            ],
        };

        let classified = classify_state(&state);
        let ids: Vec<&str> = classified
            .hits
            .iter()
            .map(|hit| hit.object_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(classified.ineligible, 1);
    }

    #[test]
    fn identifier_comparison_is_order_sensitive() {
        let a = EligibleHit::classify(&ResultEntry::identified("a")).unwrap();
        let b = EligibleHit::classify(&ResultEntry::identified("b")).unwrap();

        assert!(same_identifier_sequence(
            &[a.clone(), b.clone()],
            &[a.clone(), b.clone()]
        ));
        assert!(!same_identifier_sequence(
            &[a.clone(), b.clone()],
            &[b.clone(), a.clone()]
        ));
        assert!(!same_identifier_sequence(&[a.clone(), b.clone()], &[a.clone()]));
        assert!(same_identifier_sequence(&[], &[]));
    }

    #[test]
    fn identifier_comparison_ignores_metadata_changes() {
        let before = EligibleHit::classify(&ResultEntry::identified("a").with_position(1)).unwrap();
        let after = EligibleHit::classify(
            &ResultEntry::identified("a")
                .with_position(7)
                .with_query_id("q-2"),
        )
        .unwrap();
        assert!(same_identifier_sequence(&[before], &[after]));
    }

    #[test]
    fn result_entry_serde_roundtrip_preserves_extra_fields() {
        let json = r#"{"objectId":"doc-1","position":2,"title":"A Result"}"#;
        let entry: ResultEntry = serde_json::from_str(json).expect("deserialize");
        assert_eq!(entry.object_id.as_deref(), Some("doc-1"));
        assert_eq!(entry.position, Some(2));
        assert_eq!(entry.extra.get("title"), Some(&serde_json::json!("A Result")));

        let back = serde_json::to_string(&entry).expect("serialize");
        let reparsed: ResultEntry = serde_json::from_str(&back).expect("reparse");
        assert_eq!(entry, reparsed);
    }

    #[test]
    fn query_response_defaults_to_no_opt_in() {
        let response: QueryResponse = serde_json::from_str("{}").expect("deserialize");
        assert!(!response.analytics_opt_in);
    }
}
