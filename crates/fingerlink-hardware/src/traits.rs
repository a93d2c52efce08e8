//! Reader driver and matching engine trait definitions.
//!
//! These traits are the boundary to the vendor SDK. Everything behind them
//! is opaque to the acquisition engine: enumeration, open/close, status,
//! asynchronous capture arming, feature extraction, comparison,
//! identification and template synthesis.
//!
//! The driver uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT) since every call talks to a device. The matching engine is
//! synchronous: its primitives are CPU-bound and are run on blocking
//! threads by the caller.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::sink::CaptureSink;
use crate::types::{
    Candidate, CaptureParams, CaptureResult, DeviceStatus, EnrollProgress, FmdFormat, Priority,
    ReaderHandle, ReaderInfo,
};

/// Fingerprint reader driver.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic parameters, or the enum wrapper
/// [`AnyReaderDriver`](crate::devices::AnyReaderDriver) for concrete dispatch.
///
/// # Examples
///
/// ```no_run
/// use fingerlink_hardware::traits::ReaderDriver;
/// use fingerlink_hardware::types::Priority;
/// use fingerlink_hardware::Result;
///
/// async fn open_first<D: ReaderDriver>(driver: &mut D) -> Result<()> {
///     let readers = driver.query_devices(16).await?;
///     if let Some(reader) = readers.first() {
///         let handle = driver.open(&reader.name, Priority::Cooperative).await?;
///         driver.close(handle).await?;
///     }
///     Ok(())
/// }
/// ```
pub trait ReaderDriver: Send + Sync {
    /// List attached readers.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::MoreData`](crate::HardwareError::MoreData)
    /// when more than `capacity` readers are attached; the caller retries
    /// with the reported size.
    async fn query_devices(&mut self, capacity: usize) -> Result<Vec<ReaderInfo>>;

    /// Open a reader by name.
    async fn open(&mut self, name: &str, priority: Priority) -> Result<ReaderHandle>;

    /// Release an open reader.
    async fn close(&mut self, handle: ReaderHandle) -> Result<()>;

    /// Query the status of an open reader.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InvalidDevice`](crate::HardwareError::InvalidDevice)
    /// once the reader has been unplugged.
    async fn status(&mut self, handle: ReaderHandle) -> Result<DeviceStatus>;

    /// Arm an asynchronous capture. Results are delivered through `sink`,
    /// possibly from another thread.
    async fn capture_async(
        &mut self,
        handle: ReaderHandle,
        params: CaptureParams,
        sink: CaptureSink,
    ) -> Result<()>;

    /// Cancel an armed capture.
    async fn cancel(&mut self, handle: ReaderHandle) -> Result<()>;
}

/// Biometric matching engine.
///
/// Implementations must tolerate `compare` and `identify` being called
/// from several threads while the enrollment accumulator is used by the
/// polling task.
pub trait MatchEngine: Send + Sync {
    /// Extract a feature record of `format` from a raw capture.
    fn extract_feature(&self, capture: &CaptureResult, format: FmdFormat) -> Result<Vec<u8>>;

    /// Compare two records; returns the false-match score (lower is a
    /// better match).
    fn compare(
        &self,
        feature_format: FmdFormat,
        feature: &[u8],
        template_format: FmdFormat,
        template: &[u8],
    ) -> Result<u32>;

    /// Return candidates whose score falls below `threshold`, best first,
    /// at most `max_candidates`.
    fn identify(
        &self,
        feature_format: FmdFormat,
        feature: &[u8],
        template_format: FmdFormat,
        templates: &[Vec<u8>],
        threshold: u32,
        max_candidates: usize,
    ) -> Result<Vec<Candidate>>;

    /// Begin a new enrollment accumulating records of `format`.
    fn start_enrollment(&self, format: FmdFormat) -> Result<()>;

    /// Add one record to the running enrollment.
    fn add_to_enrollment(&self, format: FmdFormat, feature: &[u8]) -> Result<EnrollProgress>;

    /// Synthesize the enrolled template.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::MoreData`](crate::HardwareError::MoreData)
    /// when the template is larger than `capacity`.
    fn create_enrollment_fmd(&self, capacity: usize) -> Result<Vec<u8>>;

    /// Discard the running enrollment, if any.
    fn finish_enrollment(&self) -> Result<()>;
}
