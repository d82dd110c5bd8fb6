//! Configuration surface for the insights plugin.
//!
//! All scalar fields have sensible defaults and round-trip through serde.
//! Handles and hooks (client, loader, forwarders) are runtime-only and
//! skipped during (de)serialization.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{ClientLoader, InsightsClient, InteractionForwarder, ItemsForwarder};
use crate::error::{InsightsError, InsightsResult};

/// Delay window for debounced "viewed" emission. Collapses the state churn
/// of one fast keystroke burst into a single outbound batch.
pub const DEFAULT_VIEWED_DEBOUNCE_MS: u64 = 400;
/// Capacity of the buffering client used before the backend attaches.
pub const DEFAULT_MAX_BUFFERED_COMMANDS: usize = 64;
/// Agent tag registered with the backend client once per plugin.
pub const DEFAULT_AGENT_TAG: &str = "typeahead-insights-rust";

/// Configuration for [`InsightsPlugin::bootstrap`](crate::plugin::InsightsPlugin::bootstrap).
///
/// The configured value is echoed back verbatim through
/// [`InsightsPlugin::config`](crate::plugin::InsightsPlugin::config) for host
/// introspection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    /// Agent identifier registered with the client handle at bootstrap.
    pub agent_tag: String,

    /// Debounce window for "viewed" emission, in milliseconds.
    pub viewed_debounce_ms: u64,

    /// Gate emission behind per-response backend opt-in. When set, the
    /// backend library is only loaded after a qualifying response.
    pub verify_event_permission: bool,

    /// Bound on the buffering client's command queue.
    pub max_buffered_commands: usize,

    /// Pre-built client handle. Skips the buffering stub and loader entirely.
    #[serde(skip)]
    pub insights_client: Option<Arc<dyn InsightsClient>>,

    /// Environment loader override. Defaults to the unsupported-environment
    /// loader, which warns once and leaves commands buffering.
    #[serde(skip)]
    pub loader: Option<Arc<dyn ClientLoader>>,

    /// Override for forwarding a viewed batch. Default calls
    /// `viewed_object_ids`.
    #[serde(skip)]
    pub on_items_change: Option<ItemsForwarder>,

    /// Override for forwarding a selection event. Default calls
    /// `clicked_object_ids_after_search`.
    #[serde(skip)]
    pub on_select: Option<InteractionForwarder>,

    /// Override for forwarding an activation event. Default is a no-op:
    /// activation stays inert unless the integration opts in.
    #[serde(skip)]
    pub on_active: Option<InteractionForwarder>,
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            agent_tag: DEFAULT_AGENT_TAG.to_owned(),
            viewed_debounce_ms: DEFAULT_VIEWED_DEBOUNCE_MS,
            verify_event_permission: false,
            max_buffered_commands: DEFAULT_MAX_BUFFERED_COMMANDS,
            insights_client: None,
            loader: None,
            on_items_change: None,
            on_select: None,
            on_active: None,
        }
    }
}

impl fmt::Debug for InsightsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightsConfig")
            .field("agent_tag", &self.agent_tag)
            .field("viewed_debounce_ms", &self.viewed_debounce_ms)
            .field("verify_event_permission", &self.verify_event_permission)
            .field("max_buffered_commands", &self.max_buffered_commands)
            .field("insights_client", &self.insights_client.is_some())
            .field("loader", &self.loader.is_some())
            .field("on_items_change", &self.on_items_change.is_some())
            .field("on_select", &self.on_select.is_some())
            .field("on_active", &self.on_active.is_some())
            .finish()
    }
}

impl InsightsConfig {
    /// Validate scalar fields.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> InsightsResult<()> {
        if self.agent_tag.trim().is_empty() {
            return Err(InsightsError::InvalidConfig {
                field: "agent_tag".to_owned(),
                value: self.agent_tag.clone(),
                reason: "must be a non-empty identifier".to_owned(),
            });
        }
        if self.max_buffered_commands == 0 {
            return Err(InsightsError::InvalidConfig {
                field: "max_buffered_commands".to_owned(),
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}
