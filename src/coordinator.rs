//! Change-detection loop, interaction handlers, and permission-gated
//! emission.
//!
//! The coordinator owns the two pieces of shared mutable state in the crate:
//! the item snapshot (replaced wholesale on change, never mutated in place)
//! and the permission gate. All timing is clock-driven — callers pass
//! `now_ms` explicitly — so debounce behavior is deterministic under test;
//! the plugin's background worker supplies wall-clock time in production.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use crate::client::{
    lock_or_recover, BufferingClient, ClientLoader, InsightsAdapter, InteractionForwarder,
    ItemsForwarder,
};
use crate::debounce::Debouncer;
use crate::event::{build_interaction_event, build_viewed_events, InteractionKind};
use crate::gate::PermissionGate;
use crate::hit::{
    classify_state, same_identifier_sequence, EligibleHit, QueryResponse, ResultEntry, SearchState,
};

/// Public coordinator statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CoordinatorStats {
    pub states_observed: u64,
    pub changes_detected: u64,
    pub viewed_batches_emitted: u64,
    pub interactions_emitted: u64,
    pub emissions_skipped_pending: u64,
    pub ineligible_dropped: u64,
    pub dispatch_errors: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    states_observed: AtomicU64,
    changes_detected: AtomicU64,
    viewed_batches_emitted: AtomicU64,
    interactions_emitted: AtomicU64,
    emissions_skipped_pending: AtomicU64,
    ineligible_dropped: AtomicU64,
    dispatch_errors: AtomicU64,
}

impl StatsInner {
    fn add(counter: &AtomicU64, count: u64) {
        counter.fetch_add(count, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            states_observed: self.states_observed.load(Ordering::Relaxed),
            changes_detected: self.changes_detected.load(Ordering::Relaxed),
            viewed_batches_emitted: self.viewed_batches_emitted.load(Ordering::Relaxed),
            interactions_emitted: self.interactions_emitted.load(Ordering::Relaxed),
            emissions_skipped_pending: self.emissions_skipped_pending.load(Ordering::Relaxed),
            ineligible_dropped: self.ineligible_dropped.load(Ordering::Relaxed),
            dispatch_errors: self.dispatch_errors.load(Ordering::Relaxed),
        }
    }
}

/// Event-coordination engine shared by every host entry point.
pub struct EventCoordinator {
    adapter: InsightsAdapter,
    gate: Arc<PermissionGate>,
    buffering: Option<Arc<BufferingClient>>,
    loader: Arc<dyn ClientLoader>,
    loader_fired: AtomicBool,
    snapshot: Mutex<Arc<[EligibleHit]>>,
    viewed: Mutex<Debouncer<Arc<[EligibleHit]>>>,
    on_items_change: ItemsForwarder,
    on_select: InteractionForwarder,
    on_active: InteractionForwarder,
    stats: StatsInner,
}

impl EventCoordinator {
    pub(crate) fn new(
        adapter: InsightsAdapter,
        gate: Arc<PermissionGate>,
        buffering: Option<Arc<BufferingClient>>,
        loader: Arc<dyn ClientLoader>,
        viewed_debounce_ms: u64,
        on_items_change: Option<ItemsForwarder>,
        on_select: Option<InteractionForwarder>,
        on_active: Option<InteractionForwarder>,
    ) -> Self {
        let on_items_change = on_items_change
            .unwrap_or_else(|| Arc::new(|adapter, events| adapter.viewed_object_ids(events)));
        let on_select = on_select
            .unwrap_or_else(|| Arc::new(|adapter, event| adapter.clicked_object_ids_after_search(event)));
        // Activation defaults to producing no network event; integrations
        // opt in with an explicit hook.
        let on_active = on_active.unwrap_or_else(|| Arc::new(|_adapter, _event| Ok(())));

        Self {
            adapter,
            gate,
            buffering,
            loader,
            loader_fired: AtomicBool::new(false),
            snapshot: Mutex::new(Arc::from(Vec::new())),
            viewed: Mutex::new(Debouncer::new(viewed_debounce_ms)),
            on_items_change,
            on_select,
            on_active,
            stats: StatsInner::default(),
        }
    }

    #[must_use]
    pub fn adapter(&self) -> &InsightsAdapter {
        &self.adapter
    }

    #[must_use]
    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.stats.snapshot()
    }

    /// The most recent item snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[EligibleHit]> {
        Arc::clone(&lock_or_recover(&self.snapshot))
    }

    /// React to one host state-change notification.
    ///
    /// Closed surfaces are a complete no-op. An unchanged identifier
    /// sequence leaves the snapshot reference untouched and schedules
    /// nothing. A changed sequence replaces the snapshot unconditionally
    /// and, when non-empty, (re)arms the debounced viewed emission.
    pub fn observe_state(&self, state: &SearchState, now_ms: u64) {
        StatsInner::add(&self.stats.states_observed, 1);
        if !state.open {
            return;
        }

        let classified = classify_state(state);
        StatsInner::add(
            &self.stats.ineligible_dropped,
            u64::try_from(classified.ineligible).unwrap_or(u64::MAX),
        );

        let hits: Arc<[EligibleHit]> = {
            let mut snapshot = lock_or_recover(&self.snapshot);
            if same_identifier_sequence(&snapshot, &classified.hits) {
                return;
            }
            let hits: Arc<[EligibleHit]> = classified.hits.into();
            *snapshot = Arc::clone(&hits);
            hits
        };

        StatsInner::add(&self.stats.changes_detected, 1);
        if !hits.is_empty() {
            lock_or_recover(&self.viewed).arm(now_ms, hits);
        }
    }

    /// Fire the debounced viewed emission if its deadline has elapsed.
    ///
    /// Skipped (with bookkeeping intact) while the permission gate is
    /// pending. Dispatch failures are logged and swallowed.
    pub fn flush_ready(&self, now_ms: u64) {
        let Some(hits) = lock_or_recover(&self.viewed).take_ready(now_ms) else {
            return;
        };

        if !self.gate.is_authorized() {
            StatsInner::add(&self.stats.emissions_skipped_pending, 1);
            debug!(
                items = hits.len(),
                "viewed emission skipped while permission pending"
            );
            return;
        }

        let events = build_viewed_events(&hits);
        if events.is_empty() {
            return;
        }
        match (self.on_items_change)(&self.adapter, events) {
            Ok(()) => StatsInner::add(&self.stats.viewed_batches_emitted, 1),
            Err(error) => {
                StatsInner::add(&self.stats.dispatch_errors, 1);
                warn!(error = %error, "viewed emission failed");
            }
        }
    }

    /// Deadline of the pending viewed emission, if armed.
    #[must_use]
    pub fn next_deadline_ms(&self) -> Option<u64> {
        lock_or_recover(&self.viewed).deadline_ms()
    }

    /// Handle a selection or activation, synchronously and without debounce.
    ///
    /// Ineligible items make this a no-op. Position and query context are
    /// recovered from the latest snapshot; the item's own embedded fields are
    /// the stale-snapshot fallback.
    pub fn notice_interaction(&self, entry: &ResultEntry, kind: InteractionKind) {
        let Some(hit) = EligibleHit::classify(entry) else {
            StatsInner::add(&self.stats.ineligible_dropped, 1);
            return;
        };

        let snapshot = self.snapshot();
        let event = build_interaction_event(&hit, &snapshot, kind);

        if !self.gate.is_authorized() {
            StatsInner::add(&self.stats.emissions_skipped_pending, 1);
            debug!(kind = ?kind, "interaction emission skipped while permission pending");
            return;
        }

        let forwarder = match kind {
            InteractionKind::Selected => &self.on_select,
            InteractionKind::Active => &self.on_active,
        };
        match forwarder(&self.adapter, event) {
            Ok(()) => StatsInner::add(&self.stats.interactions_emitted, 1),
            Err(error) => {
                StatsInner::add(&self.stats.dispatch_errors, 1);
                warn!(kind = ?kind, error = %error, "interaction emission failed");
            }
        }
    }

    /// Consume one resolved backend response batch for permission
    /// verification.
    ///
    /// The first batch carrying an analytics opt-in marker authorizes the
    /// gate and triggers the backend load exactly once.
    pub fn resolve_responses(&self, responses: &[QueryResponse]) {
        if !responses.iter().any(|response| response.analytics_opt_in) {
            return;
        }
        if self.gate.authorize() {
            debug!("analytics emission authorized by backend response");
            self.ensure_backend_loaded();
        }
    }

    /// Fire the environment loader at most once and attach the backend to
    /// the buffering client.
    ///
    /// Load failure is reported once and execution continues with the
    /// buffering handle; there is no retry.
    pub(crate) fn ensure_backend_loaded(&self) {
        let Some(buffering) = &self.buffering else {
            return;
        };
        if self.loader_fired.swap(true, Ordering::AcqRel) {
            return;
        }

        match self.loader.load() {
            Ok(backend) => {
                let replayed = buffering.attach(backend);
                debug!(replayed, "insights backend attached");
            }
            Err(error) => {
                warn!(error = %error, "insights backend load failed; commands will buffer");
            }
        }
    }
}
