//! Mock reader driver for testing and development.
//!
//! The driver and its handle share one state block. The handle plays the
//! part of the physical world: plugging readers in, pulling them out and
//! putting fingers on the glass.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    HardwareError, Result,
    sink::CaptureSink,
    traits::ReaderDriver,
    types::{CaptureParams, CaptureResult, DeviceStatus, Priority, ReaderHandle, ReaderInfo},
};

/// How many times each primitive was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockReaderCalls {
    pub query: usize,
    pub open: usize,
    pub close: usize,
    pub status: usize,
    pub capture: usize,
    pub cancel: usize,
}

#[derive(Debug, Default)]
struct MockReaderState {
    readers: Vec<ReaderInfo>,
    open: Option<(ReaderHandle, String)>,
    next_handle: u64,
    sink: Option<CaptureSink>,
    params: Option<CaptureParams>,
    lost: bool,
    fail_open: bool,
    fail_capture: bool,
    fail_cancel: bool,
    fail_query: bool,
    calls: MockReaderCalls,
}

fn lock(state: &Mutex<MockReaderState>) -> MutexGuard<'_, MockReaderState> {
    // Poisoning only happens when a test thread panics mid-call.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock fingerprint reader driver.
///
/// # Examples
///
/// ```
/// use fingerlink_hardware::mock::MockReader;
/// use fingerlink_hardware::traits::ReaderDriver;
///
/// #[tokio::main]
/// async fn main() -> fingerlink_hardware::Result<()> {
///     let (mut driver, handle) = MockReader::new();
///     handle.attach_reader("Reader A");
///
///     let readers = driver.query_devices(4).await?;
///     assert_eq!(readers[0].name, "Reader A");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockReader {
    state: Arc<Mutex<MockReaderState>>,
}

impl MockReader {
    /// Create a driver with no readers attached.
    pub fn new() -> (Self, MockReaderHandle) {
        let state = Arc::new(Mutex::new(MockReaderState {
            next_handle: 1,
            ..MockReaderState::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockReaderHandle { state },
        )
    }

    /// Create a driver with one reader already attached.
    pub fn with_reader(name: impl Into<String>) -> (Self, MockReaderHandle) {
        let (driver, handle) = Self::new();
        handle.attach_reader(name);
        (driver, handle)
    }
}

impl ReaderDriver for MockReader {
    async fn query_devices(&mut self, capacity: usize) -> Result<Vec<ReaderInfo>> {
        let mut state = lock(&self.state);
        state.calls.query += 1;
        if state.fail_query {
            return Err(HardwareError::failure(0x05ba_0001));
        }
        if capacity < state.readers.len() {
            return Err(HardwareError::more_data(state.readers.len()));
        }
        Ok(state.readers.clone())
    }

    async fn open(&mut self, name: &str, _priority: Priority) -> Result<ReaderHandle> {
        let mut state = lock(&self.state);
        state.calls.open += 1;
        if state.fail_open {
            return Err(HardwareError::DeviceBusy);
        }
        if !state.readers.iter().any(|r| r.name == name) {
            return Err(HardwareError::InvalidDevice);
        }
        let handle = ReaderHandle::new(state.next_handle);
        state.next_handle += 1;
        state.open = Some((handle, name.to_string()));
        state.lost = false;
        Ok(handle)
    }

    async fn close(&mut self, handle: ReaderHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.close += 1;
        if state.open.as_ref().is_some_and(|(h, _)| *h == handle) {
            state.open = None;
            state.sink = None;
            state.params = None;
        }
        Ok(())
    }

    async fn status(&mut self, handle: ReaderHandle) -> Result<DeviceStatus> {
        let mut state = lock(&self.state);
        state.calls.status += 1;
        match &state.open {
            Some((h, _)) if *h == handle && !state.lost => Ok(DeviceStatus::Ready),
            _ => Err(HardwareError::InvalidDevice),
        }
    }

    async fn capture_async(
        &mut self,
        handle: ReaderHandle,
        params: CaptureParams,
        sink: CaptureSink,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.capture += 1;
        if state.fail_capture {
            return Err(HardwareError::failure(0x05ba_000d));
        }
        match &state.open {
            Some((h, _)) if *h == handle && !state.lost => {
                state.sink = Some(sink);
                state.params = Some(params);
                Ok(())
            }
            _ => Err(HardwareError::InvalidDevice),
        }
    }

    async fn cancel(&mut self, handle: ReaderHandle) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.cancel += 1;
        if state.fail_cancel {
            return Err(HardwareError::failure(0x05ba_0005));
        }
        if !state.open.as_ref().is_some_and(|(h, _)| *h == handle) {
            return Err(HardwareError::InvalidDevice);
        }
        if let Some(sink) = state.sink.take() {
            sink.notify(CaptureResult::canceled());
        }
        Ok(())
    }
}

/// Handle for controlling a [`MockReader`].
///
/// # Examples
///
/// ```
/// use fingerlink_hardware::mock::MockReader;
///
/// let (_driver, handle) = MockReader::new();
/// handle.attach_reader("Reader A");
/// assert_eq!(handle.reader_count(), 1);
///
/// // Nothing armed yet, so the finger goes unnoticed
/// assert!(!handle.present_finger(vec![1, 2, 3]));
/// ```
#[derive(Debug, Clone)]
pub struct MockReaderHandle {
    state: Arc<Mutex<MockReaderState>>,
}

impl MockReaderHandle {
    /// Plug in a reader.
    pub fn attach_reader(&self, name: impl Into<String>) {
        let mut state = lock(&self.state);
        state.readers.push(ReaderInfo::new(name).with_vendor("Mock"));
    }

    /// Unplug every reader. An open handle becomes invalid.
    pub fn detach_all(&self) {
        let mut state = lock(&self.state);
        state.readers.clear();
        state.sink = None;
        if state.open.is_some() {
            state.lost = true;
        }
    }

    /// Put a finger on the reader.
    ///
    /// Returns `true` if a capture was armed and the result was delivered.
    pub fn present_finger(&self, sample: Vec<u8>) -> bool {
        self.deliver(CaptureResult::success(sample))
    }

    /// Deliver an arbitrary result to the armed capture.
    pub fn deliver(&self, result: CaptureResult) -> bool {
        let state = lock(&self.state);
        match &state.sink {
            Some(sink) => sink.notify(result),
            None => false,
        }
    }

    /// Make subsequent `open` calls fail as busy.
    pub fn set_fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// Make subsequent `capture_async` calls fail.
    pub fn set_fail_capture(&self, fail: bool) {
        lock(&self.state).fail_capture = fail;
    }

    /// Make subsequent `cancel` calls fail.
    pub fn set_fail_cancel(&self, fail: bool) {
        lock(&self.state).fail_cancel = fail;
    }

    /// Make subsequent `query_devices` calls fail.
    pub fn set_fail_query(&self, fail: bool) {
        lock(&self.state).fail_query = fail;
    }

    /// True while a capture is armed.
    pub fn is_armed(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// True while a reader is open.
    pub fn is_open(&self) -> bool {
        lock(&self.state).open.is_some()
    }

    /// Name of the open reader, if any.
    pub fn open_reader(&self) -> Option<String> {
        lock(&self.state).open.as_ref().map(|(_, name)| name.clone())
    }

    /// Parameters of the armed capture.
    pub fn capture_params(&self) -> Option<CaptureParams> {
        lock(&self.state).params
    }

    /// Number of attached readers.
    pub fn reader_count(&self) -> usize {
        lock(&self.state).readers.len()
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> MockReaderCalls {
        lock(&self.state).calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_query_negotiates_capacity() {
        let (mut driver, handle) = MockReader::new();
        handle.attach_reader("A");
        handle.attach_reader("B");

        let err = driver.query_devices(0).await.unwrap_err();
        assert_eq!(err.required_capacity(), Some(2));

        let readers = driver.query_devices(2).await.unwrap();
        assert_eq!(readers.len(), 2);
        assert_eq!(handle.calls().query, 2);
    }

    #[tokio::test]
    async fn test_query_empty_fits_zero_capacity() {
        let (mut driver, _handle) = MockReader::new();
        assert!(driver.query_devices(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_unknown_reader_fails() {
        let (mut driver, _handle) = MockReader::new();
        let result = driver.open("missing", Priority::Cooperative).await;
        assert_eq!(result.unwrap_err(), HardwareError::InvalidDevice);
    }

    #[tokio::test]
    async fn test_capture_roundtrip_through_sink() {
        let (mut driver, handle) = MockReader::with_reader("A");
        let device = driver.open("A", Priority::Cooperative).await.unwrap();

        let (sink, mut rx) = CaptureSink::channel(4);
        driver
            .capture_async(device, CaptureParams::new(500), sink)
            .await
            .unwrap();
        assert!(handle.is_armed());
        assert_eq!(handle.capture_params().unwrap().resolution_dpi, 500);

        assert!(handle.present_finger(vec![4, 5, 6]));
        assert_eq!(rx.recv().await.unwrap().sample, vec![4, 5, 6]);
    }

    #[tokio::test]
    async fn test_cancel_delivers_canceled_result() {
        let (mut driver, handle) = MockReader::with_reader("A");
        let device = driver.open("A", Priority::Cooperative).await.unwrap();
        let (sink, mut rx) = CaptureSink::channel(4);
        driver
            .capture_async(device, CaptureParams::new(500), sink)
            .await
            .unwrap();

        driver.cancel(device).await.unwrap();
        assert!(!handle.is_armed());
        let result = rx.recv().await.unwrap();
        assert!(!result.has_sample());
    }

    #[tokio::test]
    async fn test_detach_invalidates_open_handle() {
        let (mut driver, handle) = MockReader::with_reader("A");
        let device = driver.open("A", Priority::Cooperative).await.unwrap();
        assert_eq!(driver.status(device).await.unwrap(), DeviceStatus::Ready);

        handle.detach_all();
        assert_eq!(
            driver.status(device).await.unwrap_err(),
            HardwareError::InvalidDevice
        );
    }

    #[tokio::test]
    async fn test_close_disarms() {
        let (mut driver, handle) = MockReader::with_reader("A");
        let device = driver.open("A", Priority::Cooperative).await.unwrap();
        let (sink, _rx) = CaptureSink::channel(4);
        driver
            .capture_async(device, CaptureParams::new(500), sink)
            .await
            .unwrap();

        driver.close(device).await.unwrap();
        assert!(!handle.is_open());
        assert!(!handle.is_armed());
        assert!(!handle.present_finger(vec![1]));
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let (mut driver, handle) = MockReader::with_reader("A");
        handle.set_fail_open(true);
        assert_eq!(
            driver.open("A", Priority::Cooperative).await.unwrap_err(),
            HardwareError::DeviceBusy
        );
        handle.set_fail_open(false);
        let device = driver.open("A", Priority::Cooperative).await.unwrap();

        handle.set_fail_capture(true);
        let (sink, _rx) = CaptureSink::channel(1);
        assert!(
            driver
                .capture_async(device, CaptureParams::new(500), sink)
                .await
                .is_err()
        );

        handle.set_fail_cancel(true);
        assert!(driver.cancel(device).await.is_err());
        assert_eq!(handle.calls().cancel, 1);
    }
}
