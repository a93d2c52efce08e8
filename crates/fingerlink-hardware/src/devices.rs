//! Enum wrappers for driver and engine dispatch.
//!
//! Native `async fn` in traits is not object-safe, so the acquisition engine
//! holds concrete enums instead of `Box<dyn ReaderDriver>`. Every variant is
//! dispatched at compile time, and the futures stay `Send` because their
//! concrete types are known.
//!
//! # Examples
//!
//! ```
//! use fingerlink_hardware::devices::AnyReaderDriver;
//! use fingerlink_hardware::mock::MockReader;
//!
//! let (driver, _handle) = MockReader::new();
//! let any_driver = AnyReaderDriver::Mock(driver);
//! ```

use crate::mock::{MockMatchEngine, MockReader};
use crate::sink::CaptureSink;
use crate::traits::{MatchEngine, ReaderDriver};
use crate::types::{
    Candidate, CaptureParams, CaptureResult, DeviceStatus, EnrollProgress, FmdFormat, Priority,
    ReaderHandle, ReaderInfo,
};
use crate::Result;

/// Enum wrapper for reader driver dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyReaderDriver {
    /// Mock driver for development and testing.
    Mock(MockReader),
}

impl ReaderDriver for AnyReaderDriver {
    async fn query_devices(&mut self, capacity: usize) -> Result<Vec<ReaderInfo>> {
        match self {
            Self::Mock(driver) => driver.query_devices(capacity).await,
        }
    }

    async fn open(&mut self, name: &str, priority: Priority) -> Result<ReaderHandle> {
        match self {
            Self::Mock(driver) => driver.open(name, priority).await,
        }
    }

    async fn close(&mut self, handle: ReaderHandle) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.close(handle).await,
        }
    }

    async fn status(&mut self, handle: ReaderHandle) -> Result<DeviceStatus> {
        match self {
            Self::Mock(driver) => driver.status(handle).await,
        }
    }

    async fn capture_async(
        &mut self,
        handle: ReaderHandle,
        params: CaptureParams,
        sink: CaptureSink,
    ) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.capture_async(handle, params, sink).await,
        }
    }

    async fn cancel(&mut self, handle: ReaderHandle) -> Result<()> {
        match self {
            Self::Mock(driver) => driver.cancel(handle).await,
        }
    }
}

/// Enum wrapper for matching engine dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyMatchEngine {
    /// Mock engine for development and testing.
    Mock(MockMatchEngine),
}

impl MatchEngine for AnyMatchEngine {
    fn extract_feature(&self, capture: &CaptureResult, format: FmdFormat) -> Result<Vec<u8>> {
        match self {
            Self::Mock(engine) => engine.extract_feature(capture, format),
        }
    }

    fn compare(
        &self,
        feature_format: FmdFormat,
        feature: &[u8],
        template_format: FmdFormat,
        template: &[u8],
    ) -> Result<u32> {
        match self {
            Self::Mock(engine) => {
                engine.compare(feature_format, feature, template_format, template)
            }
        }
    }

    fn identify(
        &self,
        feature_format: FmdFormat,
        feature: &[u8],
        template_format: FmdFormat,
        templates: &[Vec<u8>],
        threshold: u32,
        max_candidates: usize,
    ) -> Result<Vec<Candidate>> {
        match self {
            Self::Mock(engine) => engine.identify(
                feature_format,
                feature,
                template_format,
                templates,
                threshold,
                max_candidates,
            ),
        }
    }

    fn start_enrollment(&self, format: FmdFormat) -> Result<()> {
        match self {
            Self::Mock(engine) => engine.start_enrollment(format),
        }
    }

    fn add_to_enrollment(&self, format: FmdFormat, feature: &[u8]) -> Result<EnrollProgress> {
        match self {
            Self::Mock(engine) => engine.add_to_enrollment(format, feature),
        }
    }

    fn create_enrollment_fmd(&self, capacity: usize) -> Result<Vec<u8>> {
        match self {
            Self::Mock(engine) => engine.create_enrollment_fmd(capacity),
        }
    }

    fn finish_enrollment(&self) -> Result<()> {
        match self {
            Self::Mock(engine) => engine.finish_enrollment(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_any_reader_driver_mock() {
        let (driver, handle) = crate::mock::MockReader::with_reader("Reader A");
        let mut any_driver = AnyReaderDriver::Mock(driver);

        let readers = any_driver.query_devices(1).await.unwrap();
        assert_eq!(readers[0].name, "Reader A");
        assert_eq!(handle.calls().query, 1);
    }

    #[test]
    fn test_any_match_engine_mock() {
        let (engine, handle) = crate::mock::MockMatchEngine::new();
        let any_engine = AnyMatchEngine::Mock(engine);

        let record = handle.feature_for(FmdFormat::DpVerFeatures, &[1, 2]);
        let score = any_engine
            .compare(
                FmdFormat::DpVerFeatures,
                &record,
                FmdFormat::DpRegFeatures,
                &record,
            )
            .unwrap();
        assert_eq!(score, 0);
        assert_eq!(handle.calls().compare, 1);
    }
}
