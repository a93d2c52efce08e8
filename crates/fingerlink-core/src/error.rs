use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // Acquisition protocol misuse
    #[error("Acquisition already running")]
    AlreadyAcquiring,

    #[error("Acquisition is not running")]
    NotAcquiring,

    #[error("Stop already pending")]
    StopPending,

    #[error("Operation {operation} already in progress")]
    Busy { operation: String },

    // Host argument errors
    #[error("{0}")]
    InvalidArgument(String),

    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    // Lifecycle
    #[error("Engine is shutting down")]
    ShuttingDown,

    #[error("Engine not initialized")]
    NotInitialized,

    // Background work
    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a busy error for a named single-flight operation.
    pub fn busy(operation: impl Into<String>) -> Self {
        Self::Busy {
            operation: operation.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// True for errors caused by calling the engine in the wrong state.
    pub fn is_protocol_misuse(&self) -> bool {
        matches!(
            self,
            Self::AlreadyAcquiring | Self::NotAcquiring | Self::StopPending | Self::Busy { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_error_display() {
        let error = Error::busy("compare");
        assert_eq!(error.to_string(), "Operation compare already in progress");
        assert!(error.is_protocol_misuse());
    }

    #[test]
    fn test_invalid_argument_passes_message_through() {
        let error = Error::invalid_argument("Feature must be a non-empty buffer!");
        assert_eq!(error.to_string(), "Feature must be a non-empty buffer!");
        assert!(!error.is_protocol_misuse());
    }
}
