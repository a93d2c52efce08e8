//! Reader inventory and the open device.
//!
//! The session enumerates attached readers, tracks which one is selected,
//! and owns the handle of the opened reader. Enumeration and status checks
//! are rate-limited through the session's [`TickScheduler`] and collapse
//! overlapping requests through [`StateFlags`].

use fingerlink_core::EngineConfig;
use fingerlink_hardware::{
    AnyReaderDriver, HardwareError, Priority, ReaderDriver, ReaderHandle, ReaderInfo,
};
use tracing::{debug, info, trace, warn};

use crate::flags::{Flag, StateFlags};
use crate::tick::{Tick, TickScheduler};

/// Buffer sizing policy for SDK calls whose result buffer is sized by the
/// caller.
///
/// The first attempt offers an empty buffer; every
/// [`HardwareError::MoreData`] answer grows it to the size the SDK asked
/// for, at most `attempts` times. Sync and async callers drive the same
/// policy:
///
/// ```text
/// while let Some(capacity) = negotiation.next_capacity() {
///     if let Some(result) = negotiation.settle(call(capacity)) {
///         return result;
///     }
/// }
/// negotiation.give_up()
/// ```
#[derive(Debug, Clone, Copy)]
pub(crate) struct Negotiation {
    remaining: u32,
    attempts: u32,
    capacity: usize,
}

impl Negotiation {
    pub(crate) fn new(attempts: u32) -> Self {
        Self {
            remaining: attempts,
            attempts,
            capacity: 0,
        }
    }

    /// Buffer size for the next attempt, or `None` once attempts run out.
    pub(crate) fn next_capacity(&mut self) -> Option<usize> {
        self.remaining = self.remaining.checked_sub(1)?;
        Some(self.capacity)
    }

    /// Final outcome of an attempt, or `None` when the SDK asked for a
    /// larger buffer.
    pub(crate) fn settle<T>(
        &mut self,
        result: fingerlink_hardware::Result<T>,
    ) -> Option<fingerlink_hardware::Result<T>> {
        match result {
            Err(HardwareError::MoreData { required }) => {
                trace!("Result buffer needs room for {}", required);
                self.capacity = required;
                None
            }
            other => Some(other),
        }
    }

    pub(crate) fn give_up<T>(&self) -> fingerlink_hardware::Result<T> {
        Err(HardwareError::other(format!(
            "buffer size negotiation gave up after {} attempts",
            self.attempts
        )))
    }
}

/// Run a synchronous sized call under [`Negotiation`].
pub(crate) fn negotiate<T>(
    attempts: u32,
    mut call: impl FnMut(usize) -> fingerlink_hardware::Result<T>,
) -> fingerlink_hardware::Result<T> {
    let mut negotiation = Negotiation::new(attempts);
    while let Some(capacity) = negotiation.next_capacity() {
        if let Some(result) = negotiation.settle(call(capacity)) {
            return result;
        }
    }
    negotiation.give_up()
}

/// Attached readers, the current selection and the open device.
#[derive(Debug)]
pub struct DeviceSession {
    driver: AnyReaderDriver,
    readers: Vec<String>,
    selected: Option<usize>,
    device: Option<ReaderHandle>,
    ticks: TickScheduler,
    flags: StateFlags,
    negotiation_attempts: u32,
}

impl DeviceSession {
    pub fn new(driver: AnyReaderDriver, config: &EngineConfig) -> Self {
        Self {
            driver,
            readers: Vec::new(),
            selected: None,
            device: None,
            ticks: TickScheduler::from_config(config),
            flags: StateFlags::new(),
            negotiation_attempts: config.negotiation_attempts,
        }
    }

    /// Reader names from the last successful enumeration.
    pub fn readers(&self) -> &[String] {
        &self.readers
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_name(&self) -> Option<&str> {
        self.selected
            .and_then(|index| self.readers.get(index))
            .map(String::as_str)
    }

    pub fn device(&self) -> Option<ReaderHandle> {
        self.device
    }

    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Select a reader by exact name. Leaves the selection unchanged when
    /// the name is unknown.
    pub fn select(&mut self, name: &str) -> bool {
        match self.readers.iter().position(|reader| reader == name) {
            Some(index) => self.select_index(index),
            None => {
                debug!("Reader {} not in inventory", name);
                false
            }
        }
    }

    /// Select a reader by inventory position.
    pub fn select_index(&mut self, index: usize) -> bool {
        if index >= self.readers.len() {
            return false;
        }
        if self.selected != Some(index) {
            info!("Reader {} selected", self.readers[index]);
        }
        self.selected = Some(index);
        true
    }

    pub fn flags(&self) -> &StateFlags {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut StateFlags {
        &mut self.flags
    }

    pub fn ticks_mut(&mut self) -> &mut TickScheduler {
        &mut self.ticks
    }

    pub(crate) fn driver_mut(&mut self) -> &mut AnyReaderDriver {
        &mut self.driver
    }

    /// Refresh the reader inventory if the reader tick is due.
    ///
    /// Returns `true` when an enumeration completed, whether or not the
    /// list changed. A failed enumeration is logged and leaves the previous
    /// inventory in place.
    pub async fn enumerate(&mut self) -> bool {
        if !self.ticks.should_run(Tick::Reader) {
            return false;
        }
        if self.flags.test_and_set(Flag::QueryPending) {
            return false;
        }

        let completed = match self.query_readers().await {
            Ok(readers) => {
                self.readers = readers.into_iter().map(|reader| reader.name).collect();
                trace!("Enumerated {} reader(s)", self.readers.len());
                self.fix_selection();
                true
            }
            Err(e) => {
                warn!("Unable to enumerate readers: {}", e);
                false
            }
        };

        self.flags.clear(Flag::QueryPending);
        completed
    }

    /// Check the open device if the status tick is due.
    ///
    /// Returns `true` when the device was found gone. The handle, selection
    /// and inventory are then dropped so the next enumeration starts clean.
    pub async fn check_status(&mut self) -> bool {
        if !self.ticks.should_run(Tick::Status) {
            return false;
        }
        if self.flags.test_and_set(Flag::StatusPending) {
            return false;
        }

        let mut lost = false;
        if let Some(device) = self.device {
            match self.driver.status(device).await {
                Ok(status) => trace!("Reader status: {:?}", status),
                Err(e) if e.is_device_lost() => {
                    warn!("Reader lost: {}", e);
                    self.device = None;
                    self.selected = None;
                    self.readers.clear();
                    lost = true;
                }
                Err(e) => debug!("Unable to read reader status: {}", e),
            }
        }

        self.flags.clear(Flag::StatusPending);
        lost
    }

    /// Open the selected reader with cooperative priority. Does nothing when
    /// a reader is already open or none is selected.
    pub async fn open(&mut self) {
        if self.device.is_some() {
            return;
        }
        let Some(name) = self.selected_name().map(str::to_string) else {
            return;
        };

        match self.driver.open(&name, Priority::Cooperative).await {
            Ok(handle) => {
                info!("Reader {} opened", name);
                self.device = Some(handle);
            }
            Err(e) => warn!("Unable to open reader {}: {}", name, e),
        }
    }

    /// Close the open reader, if any.
    pub async fn close(&mut self) {
        let Some(device) = self.device.take() else {
            return;
        };
        match self.driver.close(device).await {
            Ok(()) => info!("Reader closed"),
            Err(e) => warn!("Error closing reader: {}", e),
        }
    }

    async fn query_readers(&mut self) -> fingerlink_hardware::Result<Vec<ReaderInfo>> {
        let mut negotiation = Negotiation::new(self.negotiation_attempts);
        while let Some(capacity) = negotiation.next_capacity() {
            let result = self.driver.query_devices(capacity).await;
            if let Some(result) = negotiation.settle(result) {
                return result;
            }
        }
        negotiation.give_up()
    }

    fn fix_selection(&mut self) {
        match self.selected {
            Some(index) if index < self.readers.len() => {}
            _ if self.readers.is_empty() => self.selected = None,
            _ => {
                self.selected = Some(0);
                info!("Reader {} selected", self.readers[0]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerlink_hardware::mock::{MockReader, MockReaderHandle};
    use std::time::Duration;

    fn session(driver: MockReader) -> DeviceSession {
        let config = EngineConfig::default()
            .with_reader_poll_interval(Duration::ZERO)
            .with_tick_interval(Duration::ZERO);
        DeviceSession::new(AnyReaderDriver::Mock(driver), &config)
    }

    fn session_with(names: &[&str]) -> (DeviceSession, MockReaderHandle) {
        let (driver, handle) = MockReader::new();
        for name in names {
            handle.attach_reader(*name);
        }
        (session(driver), handle)
    }

    #[test]
    fn test_negotiate_grows_buffer() {
        let mut seen = Vec::new();
        let result = negotiate(4, |capacity| {
            seen.push(capacity);
            if capacity < 3 {
                Err(HardwareError::more_data(3))
            } else {
                Ok(capacity)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(seen, vec![0, 3]);
    }

    #[test]
    fn test_negotiate_is_bounded() {
        let mut calls = 0;
        let result: fingerlink_hardware::Result<()> = negotiate(3, |capacity| {
            calls += 1;
            Err(HardwareError::more_data(capacity + 1))
        });
        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_negotiation_without_attempts_never_calls() {
        let mut negotiation = Negotiation::new(0);
        assert_eq!(negotiation.next_capacity(), None);
        assert!(negotiation.give_up::<()>().is_err());
    }

    #[test]
    fn test_negotiation_passes_through_other_errors() {
        let mut negotiation = Negotiation::new(3);
        assert_eq!(negotiation.next_capacity(), Some(0));
        assert_eq!(
            negotiation.settle::<()>(Err(HardwareError::more_data(12))),
            None
        );
        assert_eq!(negotiation.next_capacity(), Some(12));
        assert_eq!(
            negotiation.settle::<()>(Err(HardwareError::InvalidDevice)),
            Some(Err(HardwareError::InvalidDevice))
        );
    }

    #[tokio::test]
    async fn test_enumerate_selects_first_reader() {
        let (mut session, handle) = session_with(&["Reader A", "Reader B"]);

        assert!(session.enumerate().await);
        assert_eq!(session.readers(), ["Reader A", "Reader B"]);
        assert_eq!(session.selected_name(), Some("Reader A"));
        // Empty first query plus the sized retry
        assert_eq!(handle.calls().query, 2);
    }

    #[tokio::test]
    async fn test_enumerate_reports_unchanged_list() {
        let (mut session, _handle) = session_with(&["Reader A"]);
        assert!(session.enumerate().await);
        assert!(session.enumerate().await);
        assert_eq!(session.readers().len(), 1);
    }

    #[tokio::test]
    async fn test_enumerate_is_rate_limited() {
        let (driver, handle) = MockReader::with_reader("Reader A");
        let config = EngineConfig::default().with_reader_poll_interval(Duration::from_secs(60));
        let mut session = DeviceSession::new(AnyReaderDriver::Mock(driver), &config);

        assert!(session.enumerate().await);
        assert!(!session.enumerate().await);
        assert_eq!(handle.calls().query, 2);
    }

    #[tokio::test]
    async fn test_enumerate_failure_keeps_inventory() {
        let (mut session, handle) = session_with(&["Reader A"]);
        assert!(session.enumerate().await);

        handle.set_fail_query(true);
        assert!(!session.enumerate().await);
        assert_eq!(session.readers(), ["Reader A"]);
        assert!(!session.flags().is_set(Flag::QueryPending));
    }

    #[tokio::test]
    async fn test_selection_follows_shrinking_inventory() {
        let (mut session, handle) = session_with(&["Reader A", "Reader B"]);
        session.enumerate().await;
        assert!(session.select("Reader B"));

        handle.detach_all();
        handle.attach_reader("Reader C");
        session.enumerate().await;
        assert_eq!(session.selected_name(), Some("Reader C"));
    }

    #[tokio::test]
    async fn test_select_unknown_reader() {
        let (mut session, _handle) = session_with(&["Reader A"]);
        session.enumerate().await;

        assert!(!session.select("Reader Z"));
        assert!(!session.select_index(3));
        assert_eq!(session.selected(), Some(0));
    }

    #[tokio::test]
    async fn test_open_and_close() {
        let (mut session, handle) = session_with(&["Reader A"]);

        // Nothing selected yet
        session.open().await;
        assert!(!session.is_open());

        session.enumerate().await;
        session.open().await;
        assert!(session.is_open());
        assert_eq!(handle.open_reader().as_deref(), Some("Reader A"));

        // Already open
        session.open().await;
        assert_eq!(handle.calls().open, 1);

        session.close().await;
        assert!(!session.is_open());
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_open_failure_is_retried() {
        let (mut session, handle) = session_with(&["Reader A"]);
        session.enumerate().await;

        handle.set_fail_open(true);
        session.open().await;
        assert!(!session.is_open());

        handle.set_fail_open(false);
        session.open().await;
        assert!(session.is_open());
    }

    #[tokio::test]
    async fn test_check_status_detects_lost_device() {
        let (mut session, handle) = session_with(&["Reader A"]);
        session.enumerate().await;
        session.open().await;

        assert!(!session.check_status().await);

        handle.detach_all();
        assert!(session.check_status().await);
        assert!(!session.is_open());
        assert_eq!(session.selected(), None);
        assert!(session.readers().is_empty());
    }

    #[tokio::test]
    async fn test_check_status_without_device() {
        let (mut session, handle) = session_with(&["Reader A"]);
        assert!(!session.check_status().await);
        assert_eq!(handle.calls().status, 0);
    }
}
