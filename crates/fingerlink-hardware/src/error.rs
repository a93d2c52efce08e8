//! Error types for reader driver and matching engine primitives.
//!
//! The variants mirror the status codes the reader SDKs return, so callers
//! can tell a "buffer too small, retry" answer apart from a lost device or
//! a plain failure.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors returned by driver and matching engine primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HardwareError {
    /// The result does not fit the supplied capacity; retry with `required`.
    #[error("More data: {required} entries required")]
    MoreData { required: usize },

    /// The device handle no longer refers to a present reader.
    #[error("Invalid device")]
    InvalidDevice,

    /// The reader is held by another client.
    #[error("Device busy")]
    DeviceBusy,

    /// The SDK library was not initialised.
    #[error("Not initialized")]
    NotInitialized,

    /// An argument was rejected by the primitive.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Feature extraction produced nothing usable.
    #[error("Extraction failed: {message}")]
    ExtractionFailed { message: String },

    /// The enrollment accumulator rejected an operation.
    #[error("Enrollment error: {message}")]
    EnrollmentFailed { message: String },

    /// Generic failure with the raw SDK status code.
    #[error("Operation failed with code {code:#x}")]
    Failure { code: i32 },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl HardwareError {
    /// Create a new more-data error.
    pub fn more_data(required: usize) -> Self {
        Self::MoreData { required }
    }

    /// Create a new invalid parameter error.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create a new extraction error.
    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            message: message.into(),
        }
    }

    /// Create a new enrollment error.
    pub fn enrollment(message: impl Into<String>) -> Self {
        Self::EnrollmentFailed {
            message: message.into(),
        }
    }

    /// Create a new failure from a raw status code.
    pub fn failure(code: i32) -> Self {
        Self::Failure { code }
    }

    /// Create a generic error with custom message.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// Required capacity when this is a more-data answer.
    pub fn required_capacity(&self) -> Option<usize> {
        match self {
            Self::MoreData { required } => Some(*required),
            _ => None,
        }
    }

    /// True when the device is gone and the session must be reset.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, Self::InvalidDevice)
    }
}

impl From<HardwareError> for fingerlink_core::Error {
    fn from(error: HardwareError) -> Self {
        fingerlink_core::Error::Hardware(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_more_data_error() {
        let error = HardwareError::more_data(3);
        assert_eq!(error.required_capacity(), Some(3));
        assert_eq!(error.to_string(), "More data: 3 entries required");
    }

    #[test]
    fn test_invalid_device_is_device_lost() {
        assert!(HardwareError::InvalidDevice.is_device_lost());
        assert!(!HardwareError::DeviceBusy.is_device_lost());
        assert_eq!(HardwareError::InvalidDevice.required_capacity(), None);
    }

    #[test]
    fn test_failure_display() {
        let error = HardwareError::failure(0x05ba_000d);
        assert_eq!(error.to_string(), "Operation failed with code 0x5ba000d");
    }

    #[test]
    fn test_into_core_error() {
        let error: fingerlink_core::Error = HardwareError::DeviceBusy.into();
        assert_eq!(
            error,
            fingerlink_core::Error::Hardware("Device busy".to_string())
        );
    }
}
