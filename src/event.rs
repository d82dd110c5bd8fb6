//! Pure builders turning eligible hits into backend-shaped insights events.
//!
//! Builders are the only producers of [`InsightsEvent`]; the client adapter is
//! the only consumer. Deduplication is not performed here — it happens
//! upstream via change detection.

use serde::{Deserialize, Serialize};

use crate::hit::EligibleHit;

/// Event name tag for a rendered/visible item batch.
pub const ITEMS_VIEWED_EVENT: &str = "Items Viewed";
/// Event name tag for an explicit user selection.
pub const ITEM_SELECTED_EVENT: &str = "Item Selected";
/// Event name tag for an item made active (highlighted/previewed).
pub const ITEM_ACTIVE_EVENT: &str = "Item Active";

/// Which interaction an event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Selected,
    Active,
}

impl InteractionKind {
    /// Backend event name tag for this interaction.
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Selected => ITEM_SELECTED_EVENT,
            Self::Active => ITEM_ACTIVE_EVENT,
        }
    }
}

/// One analytics event in the shape the backend accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InsightsEvent {
    pub event_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    pub object_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
}

impl Default for InsightsEvent {
    fn default() -> Self {
        Self {
            event_name: String::new(),
            index: None,
            object_ids: Vec::new(),
            positions: None,
            query_id: None,
        }
    }
}

/// Build one "Items Viewed" event per eligible hit.
///
/// Empty input yields empty output; callers must never dispatch an empty
/// batch.
#[must_use]
pub fn build_viewed_events(hits: &[EligibleHit]) -> Vec<InsightsEvent> {
    hits.iter()
        .map(|hit| InsightsEvent {
            event_name: ITEMS_VIEWED_EVENT.to_owned(),
            index: hit.source_index.clone(),
            object_ids: vec![hit.object_id.clone()],
            positions: hit.position.map(|position| vec![position]),
            query_id: hit.query_id.clone(),
        })
        .collect()
}

/// Build one interaction event for `hit`, recovering position and query
/// context from the most recent snapshot.
///
/// At interaction time the host-supplied item may already be detached from
/// the rendered list, so the snapshot entry wins over the item's own embedded
/// metadata; the embedded fields are the fallback for stale or cleared
/// snapshots.
#[must_use]
pub fn build_interaction_event(
    hit: &EligibleHit,
    snapshot: &[EligibleHit],
    kind: InteractionKind,
) -> InsightsEvent {
    let located = snapshot
        .iter()
        .enumerate()
        .find(|(_, candidate)| candidate.object_id == hit.object_id);

    let (position, query_id, index) = match located {
        Some((snapshot_index, candidate)) => (
            candidate
                .position
                .or_else(|| u32::try_from(snapshot_index).ok()),
            candidate.query_id.clone().or_else(|| hit.query_id.clone()),
            candidate
                .source_index
                .clone()
                .or_else(|| hit.source_index.clone()),
        ),
        None => (hit.position, hit.query_id.clone(), hit.source_index.clone()),
    };

    InsightsEvent {
        event_name: kind.event_name().to_owned(),
        index,
        object_ids: vec![hit.object_id.clone()],
        positions: position.map(|position| vec![position]),
        query_id,
    }
}
