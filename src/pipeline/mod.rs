pub mod attributes;
pub mod render;
pub mod stream;
pub mod autosave;

use thiserror::Error;

/// Failures along the chat exchange pipeline.
///
/// Transport and HTTP status failures end an exchange and are shown to the
/// patient; decode and persistence failures are logged and swallowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("{0}")]
    TransportFailure(String),

    #[error("HTTP error! status: {status}")]
    HttpStatusFailure { status: u16 },

    #[error("Could not decode side-channel data: {0}")]
    DecodeFailure(String),

    #[error("Auto-save failed: {0}")]
    PersistenceFailure(String),
}

impl PipelineError {
    /// Whether this error terminates the exchange (vs. logged and ignored).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::TransportFailure(_) | Self::HttpStatusFailure { .. })
    }
}
