use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{STATUS_COMPLETE, STATUS_CONNECTED, STATUS_DISCONNECTED, STATUS_ENROLLED};
use crate::error::{Error, Result};

/// What the reader is doing while an acquisition is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    /// Not capturing.
    #[default]
    None,

    /// Capture one sample, then go idle.
    SingleCapture,

    /// Capture samples until stopped, re-arming after each one.
    ContinuousCapture,

    /// Accumulate samples into an enrollment template.
    Enroll,
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            CaptureMode::None => "none",
            CaptureMode::SingleCapture => "single-capture",
            CaptureMode::ContinuousCapture => "continuous-capture",
            CaptureMode::Enroll => "enroll",
        };
        write!(f, "{}", mode)
    }
}

/// Options accepted by `start_acquire`.
///
/// # Examples
///
/// ```
/// use fingerlink_core::{AcquireOptions, CaptureMode};
/// use serde_json::json;
///
/// let options = AcquireOptions::from_value(&json!({ "enroll": true })).unwrap();
/// assert_eq!(options.mode(), CaptureMode::Enroll);
///
/// let options = AcquireOptions::from_value(&json!(false)).unwrap();
/// assert_eq!(options.mode(), CaptureMode::ContinuousCapture);
///
/// assert!(AcquireOptions::from_value(&json!("enroll")).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquireOptions {
    /// Run an enrollment instead of plain capture.
    pub enroll: bool,

    /// Keep capturing after each sample. Ignored when enrolling.
    pub continuous: bool,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self {
            enroll: false,
            continuous: true,
        }
    }
}

impl AcquireOptions {
    /// Options for an enrollment session.
    pub fn enroll() -> Self {
        Self {
            enroll: true,
            ..Self::default()
        }
    }

    /// Options for a one-shot capture.
    pub fn single() -> Self {
        Self {
            enroll: false,
            continuous: false,
        }
    }

    /// Parse options passed by a host as a loosely typed value.
    ///
    /// Accepts `null` (defaults), a bare boolean (the enroll flag) or an
    /// object with optional `enroll` and `continuous` booleans.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for any other shape.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Bool(enroll) => Ok(Self {
                enroll: *enroll,
                ..Self::default()
            }),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map_err(|_| Error::invalid_argument("Object required!")),
            _ => Err(Error::invalid_argument("Object required!")),
        }
    }

    /// Capture mode these options select.
    pub fn mode(&self) -> CaptureMode {
        if self.enroll {
            CaptureMode::Enroll
        } else if self.continuous {
            CaptureMode::ContinuousCapture
        } else {
            CaptureMode::SingleCapture
        }
    }
}

/// Payload delivered to the host `on_event` callback.
///
/// Serializes to the discriminated shape hosts consume:
///
/// ```
/// use fingerlink_core::AcquireEvent;
///
/// let json = serde_json::to_string(&AcquireEvent::Connected).unwrap();
/// assert_eq!(json, r#"{"status":"connected"}"#);
///
/// let json = serde_json::to_string(&AcquireEvent::Complete { data: vec![1, 2] }).unwrap();
/// assert_eq!(json, r#"{"status":"complete","data":[1,2]}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AcquireEvent {
    /// At least one reader is present.
    Connected,

    /// No reader is present.
    Disconnected,

    /// A sample was captured; `data` is its feature record.
    Complete { data: Vec<u8> },

    /// Enrollment finished; `data` is the synthesized template.
    Enrolled { data: Vec<u8> },
}

impl AcquireEvent {
    /// The status string carried by this event.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Connected => STATUS_CONNECTED,
            Self::Disconnected => STATUS_DISCONNECTED,
            Self::Complete { .. } => STATUS_COMPLETE,
            Self::Enrolled { .. } => STATUS_ENROLLED,
        }
    }

    /// The byte payload, if any.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Complete { data } | Self::Enrolled { data } => Some(data),
            _ => None,
        }
    }
}
