// crates/pointplay-core/src/error.rs
//
// Error kinds surfaced by the player core.
//
// InferenceError is the value an InferenceChannel resolves with on failure.
// It is plain data so it can cross the reply channel and be retried on the
// next sampler tick — a failed request never poisons the channel.

use thiserror::Error;
use uuid::Uuid;

/// Failure reported by the inference side for a single request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    /// The estimator ran and rejected the image.
    #[error("depth estimation failed: {0}")]
    Rejected(String),
    /// The estimator returned data that cannot be turned into positions.
    #[error("malformed depth map: {0}")]
    Malformed(String),
    /// The request payload could not be decoded by the worker.
    #[error("undecodable request payload: {0}")]
    Payload(String),
    /// The worker went away before answering.
    #[error("inference worker disconnected")]
    Disconnected,
}

/// Player-level error kinds.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    /// Channel rejected the request or returned malformed data.
    #[error("inference failure: {0}")]
    InferenceFailure(#[from] InferenceError),
    /// Result tagged for a Session that is no longer current. Never shown to
    /// the user — logged and dropped.
    #[error("stale result for session {session} (request #{request})")]
    StaleResult { session: Uuid, request: u64 },
    /// A sample was requested with no active video or channel. The state
    /// machine should make this unreachable.
    #[error("missing resource: {0}")]
    MissingResource(&'static str),
    /// Rejected configuration value.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl PlayerError {
    /// True for kinds the user should hear about; stale discards are silent.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, PlayerError::StaleResult { .. })
    }
}
