//! Capture callback registration.
//!
//! Reader SDKs report capture results through a callback invoked on a
//! thread of their choosing. A [`CaptureSink`] is what gets registered in
//! that callback's place: it only enqueues into a bounded channel, so it is
//! safe to call from any thread and never touches session state. The
//! polling task owns the receiving end.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::types::CaptureResult;

/// Sending half of the capture result channel.
#[derive(Debug, Clone)]
pub struct CaptureSink {
    tx: mpsc::Sender<CaptureResult>,
}

impl CaptureSink {
    /// Create a sink and the receiver the polling task drains.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_hardware::sink::CaptureSink;
    /// use fingerlink_hardware::types::CaptureResult;
    ///
    /// let (sink, mut rx) = CaptureSink::channel(4);
    /// assert!(sink.notify(CaptureResult::success(vec![1, 2, 3])));
    /// assert_eq!(rx.try_recv().unwrap().sample, vec![1, 2, 3]);
    /// ```
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<CaptureResult>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Hand a result to the polling task without blocking.
    ///
    /// Returns `false` if the result was dropped because the channel is
    /// full or nobody is listening any more.
    pub fn notify(&self, result: CaptureResult) -> bool {
        match self.tx.try_send(result) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Capture result dropped: channel full");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
