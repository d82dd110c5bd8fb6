//! Plugin surface exposed to the host interaction surface.
//!
//! [`InsightsPlugin::bootstrap`] resolves the client handle (explicit →
//! process-wide → buffering stub + environment loader), registers the agent
//! tag once, and wires the event coordinator. The host then calls
//! [`subscribe`](InsightsPlugin::subscribe) to register its lifecycle
//! callbacks and [`on_state_change`](InsightsPlugin::on_state_change) after
//! every re-render. A background worker pumps debounce deadlines; without it,
//! hosts drive deadlines cooperatively via [`poll`](InsightsPlugin::poll).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::client::{
    lock_or_recover, process_client, BufferingClient, InsightsAdapter, InsightsClient,
    UnsupportedEnvironmentLoader,
};
use crate::config::InsightsConfig;
use crate::coordinator::{CoordinatorStats, EventCoordinator};
use crate::debounce::now_millis;
use crate::error::{InsightsError, InsightsResult};
use crate::event::InteractionKind;
use crate::gate::PermissionGate;
use crate::hit::{QueryResponse, ResultEntry, SearchState};

/// Plugin identifier reported to the host.
pub const PLUGIN_NAME: &str = "typeahead-insights";

/// Callback invoked with the current state and the interacted-with item.
pub type HostItemCallback = Box<dyn Fn(&SearchState, &ResultEntry) + Send + Sync>;
/// Callback invoked with each resolved backend response batch.
pub type HostResponseCallback = Box<dyn Fn(&[QueryResponse]) + Send + Sync>;

/// Shared context published to downstream rendering.
#[derive(Clone)]
pub struct SharedContext {
    /// The resolved client handle, for integrations that emit custom events.
    pub insights_client: Arc<dyn InsightsClient>,
    /// Requests click-tracking-aware behavior from the backend.
    pub click_analytics: bool,
}

/// Registration hooks the host interaction surface must provide.
pub trait HostRegistrar {
    fn on_item_selected(&mut self, callback: HostItemCallback);
    fn on_item_active(&mut self, callback: HostItemCallback);
    fn on_responses_resolved(&mut self, callback: HostResponseCallback);
    fn set_context(&mut self, context: SharedContext);
}

#[derive(Default)]
struct WorkerControl {
    stop_flag: Option<Arc<AtomicBool>>,
    sender: Option<mpsc::Sender<SearchState>>,
    worker: Option<thread::JoinHandle<()>>,
}

/// Analytics plugin for a search-as-you-type interaction surface.
pub struct InsightsPlugin {
    config: InsightsConfig,
    coordinator: Arc<EventCoordinator>,
    control: Mutex<WorkerControl>,
}

impl InsightsPlugin {
    /// Resolve the client handle and wire the event-coordination engine.
    ///
    /// Handle resolution order: explicit `insights_client`, then the
    /// process-wide registered handle, then a buffering stub. The buffering
    /// path loads the backend eagerly unless permission verification is
    /// requested, in which case the load is deferred to the first qualifying
    /// response.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::InvalidConfig`] for invalid configuration.
    pub fn bootstrap(config: InsightsConfig) -> InsightsResult<Self> {
        config.validate()?;

        let explicit = config.insights_client.clone();
        let (client, buffering): (Arc<dyn InsightsClient>, Option<Arc<BufferingClient>>) =
            match explicit.or_else(process_client) {
                Some(handle) => (handle, None),
                None => {
                    let buffering = Arc::new(BufferingClient::new(config.max_buffered_commands));
                    (buffering.clone(), Some(buffering))
                }
            };

        let adapter = InsightsAdapter::new(client);
        if let Err(error) = adapter.register_agent(&config.agent_tag) {
            // Agent registration is best-effort; analytics must not block
            // plugin construction.
            warn!(error = %error, "agent registration failed");
        }

        let loader = config
            .loader
            .clone()
            .unwrap_or_else(|| Arc::new(UnsupportedEnvironmentLoader));
        let coordinator = Arc::new(EventCoordinator::new(
            adapter,
            Arc::new(PermissionGate::new(config.verify_event_permission)),
            buffering,
            loader,
            config.viewed_debounce_ms,
            config.on_items_change.clone(),
            config.on_select.clone(),
            config.on_active.clone(),
        ));

        if !config.verify_event_permission {
            coordinator.ensure_backend_loaded();
        }

        Ok(Self {
            config,
            coordinator,
            control: Mutex::new(WorkerControl::default()),
        })
    }

    /// Plugin identifier.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// The configuration this plugin was built with, for host introspection.
    #[must_use]
    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> CoordinatorStats {
        self.coordinator.stats()
    }

    /// Register host lifecycle callbacks and publish shared context.
    pub fn subscribe(&self, registrar: &mut dyn HostRegistrar) {
        let coordinator = Arc::clone(&self.coordinator);
        registrar.on_item_selected(Box::new(move |_state, entry| {
            coordinator.notice_interaction(entry, InteractionKind::Selected);
        }));

        let coordinator = Arc::clone(&self.coordinator);
        registrar.on_item_active(Box::new(move |_state, entry| {
            coordinator.notice_interaction(entry, InteractionKind::Active);
        }));

        let coordinator = Arc::clone(&self.coordinator);
        registrar.on_responses_resolved(Box::new(move |responses| {
            coordinator.resolve_responses(responses);
        }));

        registrar.set_context(SharedContext {
            insights_client: Arc::clone(self.coordinator.adapter().client()),
            click_analytics: true,
        });
    }

    /// Entry point for every host state-change notification.
    ///
    /// With the worker running, states are queued and synchronous bursts
    /// collapse in the worker's drain. Without it, the state is processed
    /// inline and elapsed deadlines are flushed.
    pub fn on_state_change(&self, state: &SearchState) {
        {
            let control = lock_or_recover(&self.control);
            if let Some(sender) = &control.sender {
                if sender.send(state.clone()).is_ok() {
                    return;
                }
                warn!("insights worker channel closed; processing state inline");
            }
        }

        let now = now_millis();
        self.coordinator.observe_state(state, now);
        self.coordinator.flush_ready(now);
    }

    /// Fire any debounced emission whose deadline has elapsed.
    ///
    /// Only needed when the background worker is not running.
    pub fn poll(&self) {
        self.coordinator.flush_ready(now_millis());
    }

    /// Process one state immediately, bypassing the debounce window.
    ///
    /// Intended for tests and host teardown paths that must not wait out the
    /// delay.
    pub fn process_state_now(&self, state: &SearchState) {
        self.coordinator.observe_state(state, now_millis());
        self.coordinator.flush_ready(u64::MAX);
    }

    /// Start the background worker that pumps debounce deadlines.
    ///
    /// Idempotent while a worker is running.
    ///
    /// # Errors
    ///
    /// Returns [`InsightsError::WorkerUnavailable`] if the worker thread
    /// cannot be spawned.
    pub fn start(&self) -> InsightsResult<()> {
        let mut control = lock_or_recover(&self.control);
        if let Some(worker) = control.worker.take() {
            if worker.is_finished() {
                if worker.join().is_err() {
                    warn!("previous insights worker panicked");
                }
                control.stop_flag = None;
                control.sender = None;
            } else {
                control.worker = Some(worker);
                return Ok(());
            }
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let (sender, receiver) = mpsc::channel::<SearchState>();
        let worker_stop = Arc::clone(&stop_flag);
        let coordinator = Arc::clone(&self.coordinator);

        let worker = thread::Builder::new()
            .name("typeahead-insights".to_owned())
            .spawn(move || run_worker_loop(&coordinator, &receiver, &worker_stop))
            .map_err(|error| InsightsError::WorkerUnavailable {
                reason: format!("failed to spawn worker thread: {error}"),
            })?;

        control.stop_flag = Some(stop_flag);
        control.sender = Some(sender);
        control.worker = Some(worker);
        Ok(())
    }

    /// Stop the background worker, dropping any un-elapsed debounced
    /// emission (fire-and-forget).
    pub fn stop(&self) {
        let (stop_flag, sender, worker) = {
            let mut control = lock_or_recover(&self.control);
            (
                control.stop_flag.take(),
                control.sender.take(),
                control.worker.take(),
            )
        };

        if let Some(flag) = stop_flag {
            flag.store(true, Ordering::Release);
        }
        // Disconnecting the channel wakes a blocked recv immediately.
        drop(sender);

        if let Some(worker) = worker {
            if worker.join().is_err() {
                warn!("insights worker panicked during shutdown");
            }
        }
    }
}

impl Drop for InsightsPlugin {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker_loop(
    coordinator: &EventCoordinator,
    receiver: &mpsc::Receiver<SearchState>,
    stop_flag: &AtomicBool,
) {
    while !stop_flag.load(Ordering::Acquire) {
        let now = now_millis();
        // Sleep until the earliest debounce deadline, capped so the stop
        // flag is checked regularly.
        let timeout = coordinator.next_deadline_ms().map_or(
            Duration::from_millis(100),
            |deadline| Duration::from_millis(deadline.saturating_sub(now).min(100)),
        );

        let mut latest = match receiver.recv_timeout(timeout) {
            Ok(state) => Some(state),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => break,
        };
        // Collapse synchronous notification bursts: only the last queued
        // state of a burst is observed.
        while let Ok(state) = receiver.try_recv() {
            latest = Some(state);
        }

        if let Some(state) = latest {
            coordinator.observe_state(&state, now_millis());
        }
        coordinator.flush_ready(now_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ClientCommand, ClientLoader};
    use crate::error::InsightsResult;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct RecordingClient {
        commands: Mutex<Vec<ClientCommand>>,
    }

    impl RecordingClient {
        fn command_names(&self) -> Vec<&'static str> {
            lock_or_recover(&self.commands)
                .iter()
                .map(ClientCommand::name)
                .collect()
        }
    }

    impl InsightsClient for RecordingClient {
        fn dispatch(&self, command: ClientCommand) -> InsightsResult<()> {
            lock_or_recover(&self.commands).push(command);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRegistrar {
        on_selected: Option<HostItemCallback>,
        on_active: Option<HostItemCallback>,
        on_resolved: Option<HostResponseCallback>,
        context: Option<SharedContext>,
    }

    impl HostRegistrar for FakeRegistrar {
        fn on_item_selected(&mut self, callback: HostItemCallback) {
            self.on_selected = Some(callback);
        }

        fn on_item_active(&mut self, callback: HostItemCallback) {
            self.on_active = Some(callback);
        }

        fn on_responses_resolved(&mut self, callback: HostResponseCallback) {
            self.on_resolved = Some(callback);
        }

        fn set_context(&mut self, context: SharedContext) {
            self.context = Some(context);
        }
    }

    fn plugin_with(client: Arc<RecordingClient>) -> InsightsPlugin {
        InsightsPlugin::bootstrap(InsightsConfig {
            insights_client: Some(client),
            ..InsightsConfig::default()
        })
        .expect("bootstrap")
    }

    #[test]
    fn bootstrap_registers_agent_once_with_explicit_client() {
        let client = Arc::new(RecordingClient::default());
        let plugin = plugin_with(client.clone());
        assert_eq!(plugin.name(), PLUGIN_NAME);
        assert_eq!(client.command_names(), vec!["registerAgent"]);
    }

    #[test]
    fn bootstrap_rejects_invalid_config() {
        let result = InsightsPlugin::bootstrap(InsightsConfig {
            max_buffered_commands: 0,
            ..InsightsConfig::default()
        });
        assert!(matches!(
            result,
            Err(InsightsError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn bootstrap_without_client_buffers_and_fires_loader_eagerly() {
        struct CountingLoader {
            calls: AtomicUsize,
        }
        impl ClientLoader for CountingLoader {
            fn load(&self) -> InsightsResult<Arc<dyn InsightsClient>> {
                self.calls.fetch_add(1, Ordering::AcqRel);
                Ok(Arc::new(RecordingClient::default()))
            }
        }

        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let _plugin = InsightsPlugin::bootstrap(InsightsConfig {
            loader: Some(loader.clone()),
            ..InsightsConfig::default()
        })
        .expect("bootstrap");
        assert_eq!(loader.calls.load(Ordering::Acquire), 1, "eager load");
    }

    #[test]
    fn bootstrap_defers_loader_in_verify_mode() {
        struct CountingLoader {
            calls: AtomicUsize,
        }
        impl ClientLoader for CountingLoader {
            fn load(&self) -> InsightsResult<Arc<dyn InsightsClient>> {
                self.calls.fetch_add(1, Ordering::AcqRel);
                Ok(Arc::new(RecordingClient::default()))
            }
        }

        let loader = Arc::new(CountingLoader {
            calls: AtomicUsize::new(0),
        });
        let plugin = InsightsPlugin::bootstrap(InsightsConfig {
            loader: Some(loader.clone()),
            verify_event_permission: true,
            ..InsightsConfig::default()
        })
        .expect("bootstrap");
        assert_eq!(loader.calls.load(Ordering::Acquire), 0, "deferred load");

        let mut registrar = FakeRegistrar::default();
        plugin.subscribe(&mut registrar);
        let resolved = registrar.on_resolved.expect("resolved callback");
        resolved(&[QueryResponse {
            analytics_opt_in: true,
            ..QueryResponse::default()
        }]);
        assert_eq!(loader.calls.load(Ordering::Acquire), 1);
    }

    #[test]
    fn subscribe_wires_selection_and_context() {
        let client = Arc::new(RecordingClient::default());
        let plugin = plugin_with(client.clone());

        let mut registrar = FakeRegistrar::default();
        plugin.subscribe(&mut registrar);

        let context = registrar.context.as_ref().expect("context published");
        assert!(context.click_analytics);

        let state = SearchState::open_with(
            "products",
            vec![
                ResultEntry::identified("a").with_position(0),
                ResultEntry::identified("b").with_position(1),
            ],
        );
        plugin.process_state_now(&state);

        let selected = registrar.on_selected.expect("selection callback");
        selected(&state, &ResultEntry::identified("b"));

        assert_eq!(
            client.command_names(),
            vec![
                "registerAgent",
                "viewedObjectIDs",
                "clickedObjectIDsAfterSearch"
            ]
        );
    }

    #[test]
    fn active_callback_is_inert_by_default() {
        let client = Arc::new(RecordingClient::default());
        let plugin = plugin_with(client.clone());

        let mut registrar = FakeRegistrar::default();
        plugin.subscribe(&mut registrar);

        let state = SearchState::open_with("products", vec![ResultEntry::identified("a")]);
        plugin.process_state_now(&state);

        let active = registrar.on_active.expect("active callback");
        active(&state, &ResultEntry::identified("a"));

        assert_eq!(client.command_names(), vec!["registerAgent", "viewedObjectIDs"]);
    }

    #[test]
    fn config_is_echoed_back_for_introspection() {
        let client = Arc::new(RecordingClient::default());
        let plugin = InsightsPlugin::bootstrap(InsightsConfig {
            insights_client: Some(client),
            viewed_debounce_ms: 123,
            ..InsightsConfig::default()
        })
        .expect("bootstrap");
        assert_eq!(plugin.config().viewed_debounce_ms, 123);
    }

    #[test]
    fn inline_state_change_flushes_after_window() {
        let client = Arc::new(RecordingClient::default());
        let plugin = InsightsPlugin::bootstrap(InsightsConfig {
            insights_client: Some(client.clone()),
            viewed_debounce_ms: 0,
            ..InsightsConfig::default()
        })
        .expect("bootstrap");

        let state = SearchState::open_with("products", vec![ResultEntry::identified("a")]);
        plugin.on_state_change(&state);
        plugin.poll();
        assert_eq!(client.command_names(), vec!["registerAgent", "viewedObjectIDs"]);
    }

    #[test]
    fn worker_collapses_burst_into_one_emission() {
        let client = Arc::new(RecordingClient::default());
        let plugin = InsightsPlugin::bootstrap(InsightsConfig {
            insights_client: Some(client.clone()),
            viewed_debounce_ms: 150,
            ..InsightsConfig::default()
        })
        .expect("bootstrap");
        plugin.start().expect("worker starts");

        for ids in [vec!["a"], vec!["a", "b"], vec!["a", "b", "c"]] {
            let entries = ids.iter().map(|id| ResultEntry::identified(*id)).collect();
            plugin.on_state_change(&SearchState::open_with("products", entries));
        }

        // Wait out the debounce window plus worker scheduling slack.
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        loop {
            let names = client.command_names();
            if names.len() >= 2 {
                assert_eq!(names, vec!["registerAgent", "viewedObjectIDs"]);
                break;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "worker never emitted: {names:?}"
            );
            thread::sleep(Duration::from_millis(10));
        }

        plugin.stop();
        assert_eq!(plugin.stats().viewed_batches_emitted, 1);
    }

    #[test]
    fn start_is_idempotent_and_stop_joins() {
        let client = Arc::new(RecordingClient::default());
        let plugin = plugin_with(client);
        plugin.start().expect("first start");
        plugin.start().expect("second start is a no-op");
        plugin.stop();
        plugin.stop();
    }
}
