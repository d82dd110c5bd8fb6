//! Remote analytics client seam: command model, adapter, buffering stub, and
//! environment loader.
//!
//! The real backend client is an external collaborator. This crate only
//! assumes a generic command-dispatch surface ([`InsightsClient`]) and wraps
//! it behind two semantic operations on [`InsightsAdapter`]. When no client
//! is available at bootstrap, a [`BufferingClient`] queues commands until the
//! environment loader attaches the real backend, then replays them in order.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{InsightsError, InsightsResult};
use crate::event::InsightsEvent;

/// One command accepted by the remote analytics client.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Register the integration's agent tag. Issued once per plugin.
    RegisterAgent { agent: String },
    /// Report a batch of rendered items.
    ViewedObjectIds { events: Vec<InsightsEvent> },
    /// Report a selection/activation after a search.
    ClickedObjectIdsAfterSearch { events: Vec<InsightsEvent> },
}

impl ClientCommand {
    /// Stable command name used in diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RegisterAgent { .. } => "registerAgent",
            Self::ViewedObjectIds { .. } => "viewedObjectIDs",
            Self::ClickedObjectIdsAfterSearch { .. } => "clickedObjectIDsAfterSearch",
        }
    }
}

/// Callable command queue exposed by the remote analytics client.
pub trait InsightsClient: Send + Sync {
    /// Forward one command to the backend.
    ///
    /// # Errors
    ///
    /// Returns a dispatch failure from the underlying transport. Emission is
    /// fire-and-forget; callers log and continue.
    fn dispatch(&self, command: ClientCommand) -> InsightsResult<()>;
}

/// Hook deciding how a viewed-items batch is forwarded.
pub type ItemsForwarder =
    Arc<dyn Fn(&InsightsAdapter, Vec<InsightsEvent>) -> InsightsResult<()> + Send + Sync>;

/// Hook deciding how a single interaction event is forwarded.
pub type InteractionForwarder =
    Arc<dyn Fn(&InsightsAdapter, InsightsEvent) -> InsightsResult<()> + Send + Sync>;

/// Semantic wrapper around the raw command queue.
#[derive(Clone)]
pub struct InsightsAdapter {
    client: Arc<dyn InsightsClient>,
}

impl InsightsAdapter {
    #[must_use]
    pub fn new(client: Arc<dyn InsightsClient>) -> Self {
        Self { client }
    }

    /// The wrapped client handle, for publishing into host shared context.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn InsightsClient> {
        &self.client
    }

    /// Register the process-wide agent tag.
    ///
    /// # Errors
    ///
    /// Returns the dispatch failure from the client.
    pub fn register_agent(&self, agent: &str) -> InsightsResult<()> {
        self.client.dispatch(ClientCommand::RegisterAgent {
            agent: agent.to_owned(),
        })
    }

    /// Forward pre-built viewed events. An empty batch never dispatches.
    ///
    /// # Errors
    ///
    /// Returns the dispatch failure from the client.
    pub fn viewed_object_ids(&self, events: Vec<InsightsEvent>) -> InsightsResult<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.client.dispatch(ClientCommand::ViewedObjectIds { events })
    }

    /// Forward one pre-built interaction event.
    ///
    /// # Errors
    ///
    /// Returns the dispatch failure from the client.
    pub fn clicked_object_ids_after_search(&self, event: InsightsEvent) -> InsightsResult<()> {
        self.client
            .dispatch(ClientCommand::ClickedObjectIdsAfterSearch {
                events: vec![event],
            })
    }
}

struct BufferingState {
    backend: Option<Arc<dyn InsightsClient>>,
    queued: VecDeque<ClientCommand>,
    dropped: u64,
}

/// Queueing stub standing in for the backend client until it loads.
///
/// Commands buffer up to `capacity`; once the real backend is attached the
/// queue replays in order and subsequent dispatches forward directly. When
/// the queue is full the oldest command is dropped — analytics delivery is
/// non-critical and must never grow without bound.
pub struct BufferingClient {
    capacity: usize,
    state: Mutex<BufferingState>,
}

impl BufferingClient {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(BufferingState {
                backend: None,
                queued: VecDeque::new(),
                dropped: 0,
            }),
        }
    }

    /// Attach the real backend and replay queued commands in order.
    ///
    /// Replay failures are logged and skipped; returns the number of
    /// successfully replayed commands.
    pub fn attach(&self, backend: Arc<dyn InsightsClient>) -> usize {
        let queued = {
            let mut state = lock_or_recover(&self.state);
            state.backend = Some(Arc::clone(&backend));
            std::mem::take(&mut state.queued)
        };

        let mut replayed = 0_usize;
        for command in queued {
            let name = command.name();
            match backend.dispatch(command) {
                Ok(()) => replayed = replayed.saturating_add(1),
                Err(error) => {
                    warn!(command = name, error = %error, "buffered command lost during replay");
                }
            }
        }
        replayed
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        lock_or_recover(&self.state).backend.is_some()
    }

    /// Number of commands currently buffered.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        lock_or_recover(&self.state).queued.len()
    }

    /// Number of commands dropped due to the capacity bound.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        lock_or_recover(&self.state).dropped
    }
}

impl InsightsClient for BufferingClient {
    fn dispatch(&self, command: ClientCommand) -> InsightsResult<()> {
        let backend = {
            let mut state = lock_or_recover(&self.state);
            match &state.backend {
                Some(backend) => Arc::clone(backend),
                None => {
                    if state.queued.len() >= self.capacity {
                        state.queued.pop_front();
                        state.dropped = state.dropped.saturating_add(1);
                        debug!(
                            capacity = self.capacity,
                            "insights buffer full, dropped oldest command"
                        );
                    }
                    state.queued.push_back(command);
                    return Ok(());
                }
            }
        };
        backend.dispatch(command)
    }
}

/// Environment-appropriate mechanism for fetching the backend client library.
///
/// Script injection into a hosting document, process-local discovery, or a
/// test stub all sit behind this seam. Load failure is reported once by the
/// caller and never retried.
pub trait ClientLoader: Send + Sync {
    /// Resolve a live backend client.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::LoaderUnavailable`] when this environment has
    /// no loading path, or [`InsightsError::LoaderFailed`] when loading was
    /// attempted and failed.
    fn load(&self) -> InsightsResult<Arc<dyn InsightsClient>>;
}

/// Default loader for environments without a script-injection path.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedEnvironmentLoader;

impl ClientLoader for UnsupportedEnvironmentLoader {
    fn load(&self) -> InsightsResult<Arc<dyn InsightsClient>> {
        Err(InsightsError::LoaderUnavailable {
            reason: "no script loading path in this environment".to_owned(),
        })
    }
}

static PROCESS_CLIENT: OnceLock<Arc<dyn InsightsClient>> = OnceLock::new();

/// Publish a process-wide client handle consulted by bootstrap when no
/// explicit client is configured. First registration wins.
pub fn register_process_client(client: Arc<dyn InsightsClient>) -> bool {
    PROCESS_CLIENT.set(client).is_ok()
}

/// The process-wide client handle, if one was registered.
#[must_use]
pub fn process_client() -> Option<Arc<dyn InsightsClient>> {
    PROCESS_CLIENT.get().cloned()
}

pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
