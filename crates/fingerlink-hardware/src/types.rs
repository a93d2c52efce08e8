//! Common types shared by driver and matching engine primitives.
//!
//! Reader identities, open handles, capture parameters, raw capture results
//! and the record formats the matching engine understands.

use serde::{Deserialize, Serialize};

/// Reader description returned by enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Unique reader name, used to open it.
    pub name: String,

    /// Optional vendor string.
    pub vendor: Option<String>,

    /// Optional product string.
    pub product: Option<String>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo with the required name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor: None,
            product: None,
        }
    }

    /// Set the vendor.
    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    /// Set the product.
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }
}

/// Opaque handle to an open reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderHandle(u64);

impl ReaderHandle {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> u64 {
        self.0
    }
}

/// Access priority requested when opening a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Shareable with other clients.
    #[default]
    Cooperative,

    /// Exclusive access.
    Exclusive,
}

/// Reader status reported by a successful status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Ready,
    Busy,
    NeedCalibration,
    Failure,
}

/// Raw image encoding requested from the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageFormat {
    /// ISO/IEC 19794-4 finger image record.
    #[default]
    Iso19794,

    /// ANSI INCITS 381 finger image record.
    Ansi381,

    /// Unprocessed raw pixels.
    Raw,
}

/// Parameters for arming an asynchronous capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureParams {
    pub image_format: ImageFormat,
    pub resolution_dpi: u32,
}

impl CaptureParams {
    pub fn new(resolution_dpi: u32) -> Self {
        Self {
            image_format: ImageFormat::default(),
            resolution_dpi,
        }
    }
}

/// Record formats understood by the matching engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FmdFormat {
    /// Vendor verification features, used for captured samples.
    DpVerFeatures,

    /// Vendor registration features, used for enrolled templates.
    DpRegFeatures,

    /// Vendor pre-registration features, fed to the enrollment accumulator.
    DpPreRegFeatures,

    /// ANSI INCITS 378 minutiae record.
    Ansi378,

    /// ISO/IEC 19794-2 minutiae record.
    Iso19794_2,
}

impl FmdFormat {
    /// Format to extract samples in when enrolling towards `self`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_hardware::types::FmdFormat;
    ///
    /// assert_eq!(FmdFormat::DpRegFeatures.enrollment_sample_format(), FmdFormat::DpPreRegFeatures);
    /// assert_eq!(FmdFormat::Ansi378.enrollment_sample_format(), FmdFormat::Ansi378);
    /// ```
    pub fn enrollment_sample_format(self) -> Self {
        match self {
            Self::DpRegFeatures => Self::DpPreRegFeatures,
            other => other,
        }
    }

    /// One-byte tag identifying the format.
    pub fn tag(self) -> u8 {
        match self {
            Self::DpVerFeatures => 0x01,
            Self::DpRegFeatures => 0x02,
            Self::DpPreRegFeatures => 0x03,
            Self::Ansi378 => 0x10,
            Self::Iso19794_2 => 0x11,
        }
    }
}

/// Quality verdict attached to a capture result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureQuality {
    Good,

    /// The capture was cancelled before a finger was read.
    Canceled,

    NoFinger,

    /// Any other vendor-specific quality flag set.
    Other(u32),
}

/// Status of the capture operation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Success,
    Failed { code: i32 },
}

/// Record handed to the capture callback by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureResult {
    pub status: CaptureStatus,
    pub quality: CaptureQuality,
    pub image_format: ImageFormat,

    /// Raw sample bytes; empty when nothing was captured.
    pub sample: Vec<u8>,

    /// When the driver produced the record.
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl CaptureResult {
    /// A good capture carrying `sample`.
    pub fn success(sample: Vec<u8>) -> Self {
        Self {
            status: CaptureStatus::Success,
            quality: CaptureQuality::Good,
            image_format: ImageFormat::default(),
            sample,
            timestamp: chrono::Utc::now(),
        }
    }

    /// A capture that completed without a sample.
    pub fn empty(quality: CaptureQuality) -> Self {
        Self {
            status: CaptureStatus::Success,
            quality,
            image_format: ImageFormat::default(),
            sample: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// The result delivered when an armed capture is cancelled.
    pub fn canceled() -> Self {
        Self::empty(CaptureQuality::Canceled)
    }

    /// A capture the driver reported as failed.
    pub fn failed(code: i32) -> Self {
        Self {
            status: CaptureStatus::Failed { code },
            ..Self::empty(CaptureQuality::NoFinger)
        }
    }

    /// True when the record carries usable sample bytes.
    pub fn has_sample(&self) -> bool {
        self.status == CaptureStatus::Success && !self.sample.is_empty()
    }
}

/// One identification hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Index into the candidate list passed to identify.
    pub index: usize,

    /// Which view of a multi-view template matched.
    pub view: u32,
}

impl Candidate {
    pub fn new(index: usize) -> Self {
        Self { index, view: 0 }
    }
}

/// Answer of the incremental enrollment accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollProgress {
    /// Enough samples collected; a template can be created.
    Ready,

    /// Present the same finger again.
    NeedMoreSamples,
}
