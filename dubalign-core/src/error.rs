//! Error types for the synchronization engine

use thiserror::Error;

/// Engine errors
///
/// Inconclusive alignment is deliberately not represented here: the
/// estimator reports it as a zero-confidence [`crate::AlignmentResult`]
/// so callers can fall back to manual alignment without error handling.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source track missing, corrupt or unreadable. Non-retryable
    /// without user intervention (e.g. re-select the file).
    #[error("Decode error: {0}")]
    Decode(String),

    /// Contract violation by the caller (mismatched framing parameters,
    /// non-positive search bound). Fails fast, never silently coerced.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// IO error while reading a source artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
