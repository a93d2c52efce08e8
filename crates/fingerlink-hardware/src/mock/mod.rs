//! Mock driver and engine implementations for testing and development.
//!
//! These simulate a reader SDK that can be controlled programmatically
//! without physical hardware.

pub mod engine;
pub mod reader;

// Re-export commonly used types
pub use engine::{MockEngineCalls, MockMatchEngine, MockMatchEngineHandle};
pub use reader::{MockReader, MockReaderCalls, MockReaderHandle};
