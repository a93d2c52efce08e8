//! Reader SDK boundary for the fingerlink acquisition engine.
//!
//! This crate defines the opaque primitives the engine drives: a
//! [`ReaderDriver`] for enumeration, open/close, status and asynchronous
//! capture, and a [`MatchEngine`] for feature extraction, comparison,
//! identification and enrollment. Mock implementations with control
//! handles live in [`mock`] for development and tests.
//!
//! # Capture callbacks
//!
//! SDKs report captures through a callback on a thread of their choosing.
//! Drivers are handed a [`CaptureSink`] when a capture is armed and call
//! [`CaptureSink::notify`] from that callback. The sink only enqueues, so
//! the polling task stays the sole owner of session state.
//!
//! ```no_run
//! use fingerlink_hardware::sink::CaptureSink;
//! use fingerlink_hardware::traits::ReaderDriver;
//! use fingerlink_hardware::types::{CaptureParams, Priority};
//! use fingerlink_hardware::Result;
//!
//! async fn arm<D: ReaderDriver>(driver: &mut D, name: &str) -> Result<()> {
//!     let handle = driver.open(name, Priority::Cooperative).await?;
//!     let (sink, mut results) = CaptureSink::channel(16);
//!     driver.capture_async(handle, CaptureParams::new(500), sink).await?;
//!
//!     if let Some(result) = results.recv().await {
//!         println!("captured {} bytes", result.sample.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`] naming the SDK status, including the
//! [`MoreData`](HardwareError::MoreData) answer used to negotiate result
//! buffer sizes.

pub mod devices;
pub mod error;
pub mod mock;
pub mod sink;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::{AnyMatchEngine, AnyReaderDriver};
pub use error::{HardwareError, Result};
pub use sink::CaptureSink;
pub use traits::{MatchEngine, ReaderDriver};
pub use types::{
    Candidate, CaptureParams, CaptureQuality, CaptureResult, CaptureStatus, DeviceStatus,
    EnrollProgress, FmdFormat, ImageFormat, Priority, ReaderHandle, ReaderInfo,
};
