//! Error types for binaural masking

use thiserror::Error;

/// Binaural masking error types.
///
/// All variants signal a caller or integration bug; none are retried.
#[derive(Error, Debug)]
pub enum MaskingError {
    /// Buffer length, channel count or channel index does not match what
    /// the stage was built for
    #[error("Precondition violated: {what} expected {expected}, got {got}")]
    PreconditionViolation {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Invalid construction parameters
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Filter bank could not be built for the requested layout
    #[error("Filter bank construction failed: {0}")]
    Construction(String),

    /// Malformed JSON configuration; a configuration error like `Config`
    #[error("Configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

impl MaskingError {
    pub(crate) fn precondition(what: &'static str, expected: usize, got: usize) -> Self {
        Self::PreconditionViolation {
            what,
            expected,
            got,
        }
    }

    /// True for errors raised while constructing a stage.
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Construction(_) | Self::Parse(_))
    }
}

/// Result type for masking operations
pub type MaskingResult<T> = Result<T, MaskingError>;
