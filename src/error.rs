//! Error taxonomy for Flowpad
//!
//! External data (catalog fetches, channel messages, document loads) is
//! converted into one of these kinds at the boundary where it enters the
//! store; none of them unwind into the rendering layer.

use thiserror::Error;

/// Errors surfaced by the Flowpad core.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// Inbound data does not match any known value or field shape.
    #[error("schema violation: discriminator '{discriminator}' {detail}")]
    SchemaViolation {
        discriminator: String,
        detail: String,
    },

    /// A store write addressed a path whose parent did not exist.
    /// Recoverable: the path is materialized and a warning logged.
    #[error("path '{path}' not found")]
    PathNotFound { path: String },

    /// HTTP or streaming-channel failure. Non-blocking; the triggering
    /// action may be retried.
    #[error("transport failure: {0}")]
    Transport(String),

    /// Large-object upload did not return success.
    #[error("upload failed: {0}")]
    Upload(String),

    /// Typed scalar construction from user input failed.
    #[error("invalid {dtype} value: {detail}")]
    Validation { dtype: String, detail: String },
}

impl FlowError {
    pub fn schema(discriminator: impl Into<String>, detail: impl Into<String>) -> Self {
        FlowError::SchemaViolation {
            discriminator: discriminator.into(),
            detail: detail.into(),
        }
    }
}
