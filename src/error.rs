// Engine errors - shared error type for the control surface and collaborators

use thiserror::Error;

/// Errors surfaced by the playback engine and its collaborators.
///
/// Most control-surface operations do not return these directly: invalid or
/// premature calls are logged and become no-ops so the host UI can keep
/// feeding the engine transiently bad values while the user is editing.
/// The variants still travel through the sound-loading path and the bank's
/// commit discipline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation arrived before initial sound loading completed.
    #[error("engine not ready: {0}")]
    NotReady(&'static str),

    /// Non-finite or non-positive parameter rejected; prior state kept.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// A sound failed to load; the role keeps its previous buffer.
    #[error("failed to load sound '{id}': {reason}")]
    SoundLoadFailure { id: String, reason: String },

    /// A hot-swap response arrived after a newer request superseded it.
    #[error("stale async result for superseded request")]
    StaleAsyncResult,
}
