//! Error taxonomy for the core daemon.
//!
//! The four subsystems (hub coordinator, sellops controller, decision
//! engine, transaction monitor) all report failures through this one enum
//! rather than ad hoc strings, so callers can dispatch on `kind` instead of
//! matching message text.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Closed error taxonomy, matching spec §7's kinds.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed txid, wallet spec mismatch, missing required fields.
    /// Surfaced to the caller; never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Persistence layer cannot initialise or is missing a required
    /// capability. Fatal during setup; during a tick the tick is logged and
    /// skipped instead.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Transient network / RPC error, eligible for retry under an
    /// exponential-backoff policy.
    #[error("transient network error: {0}")]
    Transient(String),

    /// Per-call deadline exceeded.
    #[error("timed out after {0}ms")]
    Timeout(u64),

    /// A configured retry policy exhausted its attempt budget.
    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: String },

    /// Unknown gate type, strategy document schema mismatch. Gate
    /// evaluation fails closed; the tick aborts for that position only.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// Persistence, HUD write, or autopsy failure. Always logged and
    /// swallowed by the caller — never surfaced as the return value of a
    /// decision.
    #[error("side-effect failure: {0}")]
    SideEffectFailure(String),

    /// A namespaced job was requested while one with the same namespace was
    /// already in flight in the hub coordinator.
    #[error("job already running for namespace {0}")]
    AlreadyRunning(String),
}

impl CoreError {
    /// Whether this error represents a condition worth retrying under a
    /// backoff policy. Transient network errors and timeouts are; nothing
    /// else is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::Timeout(_))
    }
}
