//! Debounced analytics event coordination for search-as-you-type surfaces.
//!
//! A typeahead surface re-renders on every keystroke, and naively reporting
//! each intermediate result set floods the analytics backend with events for
//! states nobody looked at. This crate sits between a host interaction
//! surface and a remote analytics client and coordinates three event kinds —
//! "Items Viewed", "Item Selected", "Item Active" — with:
//!
//! - change detection over the classified result set (order-sensitive,
//!   identifier-only), so re-renders without visible change emit nothing;
//! - a debounce window collapsing each keystroke burst into one outbound
//!   "viewed" batch carrying only the final items;
//! - immediate, exactly-once interaction events with positions recovered
//!   from the last rendered snapshot;
//! - a one-way permission gate deferring all emission (and the backend
//!   library load) until the backend opts in per-response, when requested.
//!
//! The host surface and the analytics backend stay external: the host plugs
//! in through [`HostRegistrar`] and state-change notifications, the backend
//! through the [`InsightsClient`] command trait.
//!
//! ```
//! use std::sync::Arc;
//! use typeahead_insights::{
//!     ClientCommand, InsightsClient, InsightsConfig, InsightsPlugin, InsightsResult,
//!     ResultEntry, SearchState,
//! };
//!
//! struct NullClient;
//! impl InsightsClient for NullClient {
//!     fn dispatch(&self, _command: ClientCommand) -> InsightsResult<()> {
//!         Ok(())
//!     }
//! }
//!
//! let plugin = InsightsPlugin::bootstrap(InsightsConfig {
//!     insights_client: Some(Arc::new(NullClient)),
//!     ..InsightsConfig::default()
//! })?;
//!
//! let state = SearchState::open_with("products", vec![ResultEntry::identified("doc-1")]);
//! plugin.on_state_change(&state);
//! # Ok::<(), typeahead_insights::InsightsError>(())
//! ```

pub mod client;
pub mod config;
pub mod coordinator;
pub mod debounce;
pub mod error;
pub mod event;
pub mod gate;
pub mod hit;
pub mod plugin;

pub use client::{
    process_client, register_process_client, BufferingClient, ClientCommand, ClientLoader,
    InsightsAdapter, InsightsClient, InteractionForwarder, ItemsForwarder,
    UnsupportedEnvironmentLoader,
};
pub use config::{
    InsightsConfig, DEFAULT_AGENT_TAG, DEFAULT_MAX_BUFFERED_COMMANDS, DEFAULT_VIEWED_DEBOUNCE_MS,
};
pub use coordinator::{CoordinatorStats, EventCoordinator};
pub use debounce::{now_millis, Debouncer};
pub use error::{InsightsError, InsightsResult};
pub use event::{
    build_interaction_event, build_viewed_events, InsightsEvent, InteractionKind,
    ITEMS_VIEWED_EVENT, ITEM_ACTIVE_EVENT, ITEM_SELECTED_EVENT,
};
pub use gate::{PermissionGate, PermissionState};
pub use hit::{
    classify_state, same_identifier_sequence, ClassifiedState, EligibleHit, QueryResponse,
    ResultEntry, ResultGroup, SearchState,
};
pub use plugin::{
    HostItemCallback, HostRegistrar, HostResponseCallback, InsightsPlugin, SharedContext,
    PLUGIN_NAME,
};
