//! Engine-wide constants.
//!
//! Polling cadences, matching thresholds and buffer bounds used across the
//! acquisition engine. Values mirror what the reader SDKs expect; most of
//! them can be overridden through [`EngineConfig`](crate::EngineConfig).
//!
//! # Usage
//!
//! ```
//! use fingerlink_core::constants::*;
//! use std::time::Duration;
//!
//! let poll = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);
//! assert_eq!(poll.as_millis(), 10);
//! assert!(DEFAULT_FALSE_MATCH_RATE < PROBABILITY_ONE);
//! ```

// ============================================================================
// Polling
// ============================================================================

/// Sleep between two iterations of a polling loop.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Minimum spacing between two reader enumerations.
pub const DEFAULT_READER_POLL_INTERVAL_MS: u64 = 1000;

/// Minimum spacing for every other rate-limited step (status, enroll,
/// capture, cancel).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5000;

// ============================================================================
// Matching
// ============================================================================

/// Probability unit used by the matching engine for false-match scores.
///
/// A score of `PROBABILITY_ONE` means the two records certainly belong to
/// different fingers; `0` means a certain match.
pub const PROBABILITY_ONE: u32 = 0x7fff_ffff;

/// Default acceptance threshold: one false match in 100 000 comparisons.
///
/// # Examples
///
/// ```
/// use fingerlink_core::constants::{DEFAULT_FALSE_MATCH_RATE, PROBABILITY_ONE};
///
/// assert_eq!(DEFAULT_FALSE_MATCH_RATE, PROBABILITY_ONE / 100_000);
/// ```
pub const DEFAULT_FALSE_MATCH_RATE: u32 = PROBABILITY_ONE / 100_000;

/// Number of samples an enrollment accumulates before a template is ready.
pub const FEATURES_LEN: u32 = 4;

/// Upper bound on candidates considered by one identification.
pub const IDENTIFICATION_LEN: u32 = 16;

// ============================================================================
// Buffers and channels
// ============================================================================

/// Largest feature record the extraction primitive may produce.
pub const MAX_FMD_SIZE: usize = 1562;

/// Bound on "buffer too small, retry" rounds when negotiating result sizes.
pub const DEFAULT_NEGOTIATION_ATTEMPTS: u32 = 8;

/// Capacity of the channel carrying raw capture results from the driver.
pub const DEFAULT_CAPTURE_CHANNEL_CAPACITY: usize = 16;

/// Capture resolution requested when arming the reader.
pub const DEFAULT_CAPTURE_RESOLUTION_DPI: u32 = 500;

// ============================================================================
// Host payloads
// ============================================================================

/// Event status: a reader is present.
pub const STATUS_CONNECTED: &str = "connected";

/// Event status: no reader is present.
pub const STATUS_DISCONNECTED: &str = "disconnected";

/// Event status: one sample was captured and its feature extracted.
pub const STATUS_COMPLETE: &str = "complete";

/// Event status: an enrollment template was synthesized.
pub const STATUS_ENROLLED: &str = "enrolled";

/// Identify result meaning "no candidate matched".
pub const NO_MATCH: i32 = -1;
