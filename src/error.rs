/// Unified error type covering all failure modes in the insights pipeline.
///
/// Every variant includes an actionable error message guiding the consumer
/// toward resolution. Analytics delivery is non-critical by design: host-facing
/// handlers catch these errors, log them, and never propagate them back into
/// the host's rendering loop.
#[derive(Debug, thiserror::Error)]
pub enum InsightsError {
    // === Environment loader errors ===
    /// No script-loading path exists in this environment.
    #[error(
        "Insights backend loader unavailable: {reason}. Pass a pre-built client via InsightsConfig.insights_client."
    )]
    LoaderUnavailable {
        /// Why no loader can run here.
        reason: String,
    },

    /// The environment loader ran but could not attach the backend library.
    #[error(
        "Insights backend failed to load: {source}. Events will buffer until a client is attached; check network access to the script host."
    )]
    LoaderFailed {
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // === Client errors ===
    /// The remote client rejected a dispatched command.
    #[error("Insights client rejected {command}: {source}. Event dropped; emission is fire-and-forget.")]
    DispatchFailed {
        /// Name of the rejected command.
        command: &'static str,
        /// The underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The buffering client's queue is at capacity.
    #[error(
        "Insights command buffer full ({capacity} commands). Oldest command dropped; attach a backend or raise max_buffered_commands."
    )]
    BufferOverflow {
        /// Configured buffer capacity.
        capacity: usize,
    },

    // === Configuration errors ===
    /// A configuration value is invalid.
    #[error("Invalid config {field}=\"{value}\": {reason}")]
    InvalidConfig {
        /// Which config field.
        field: String,
        /// The invalid value.
        value: String,
        /// Why it is invalid.
        reason: String,
    },

    // === Worker errors ===
    /// The background debounce worker could not be started.
    #[error("Insights worker unavailable: {reason}. Drive deadlines manually via poll() instead.")]
    WorkerUnavailable {
        /// Why the worker failed to start.
        reason: String,
    },
}

/// Convenience alias used throughout the crate.
pub type InsightsResult<T> = Result<T, InsightsError>;
