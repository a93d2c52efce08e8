//! Session state flags.

/// Named session condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// A reader enumeration is running.
    QueryPending,
    /// A device status check is running.
    StatusPending,
    /// Reader presence was reported for the current capture session.
    Reported,
    /// A cancel was issued for the current idle period.
    CancelPending,
    /// An asynchronous capture is armed.
    CapturePrepared,
    /// An enrollment session was started.
    EnrollPrepared,
    /// The orchestrator is idle.
    OpIdle,
    /// The orchestrator is capturing.
    OpCapturing,
}

impl Flag {
    pub const ALL: [Flag; 8] = [
        Flag::QueryPending,
        Flag::StatusPending,
        Flag::Reported,
        Flag::CancelPending,
        Flag::CapturePrepared,
        Flag::EnrollPrepared,
        Flag::OpIdle,
        Flag::OpCapturing,
    ];
}

/// Set of session conditions, each tracked as its own boolean.
///
/// Every expensive step is guarded with [`test_and_set`](Self::test_and_set):
/// the first caller sees `false` and performs the step, later callers see
/// `true` and skip it until the flag is cleared again.
///
/// # Examples
///
/// ```
/// use fingerlink_acquire::flags::{Flag, StateFlags};
///
/// let mut flags = StateFlags::new();
/// assert!(flags.is_set(Flag::OpIdle));
///
/// assert!(!flags.test_and_set(Flag::CapturePrepared));
/// assert!(flags.test_and_set(Flag::CapturePrepared));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateFlags {
    query_pending: bool,
    status_pending: bool,
    reported: bool,
    cancel_pending: bool,
    capture_prepared: bool,
    enroll_prepared: bool,
    op_idle: bool,
    op_capturing: bool,
}

impl StateFlags {
    /// Idle, with nothing prepared.
    pub fn new() -> Self {
        Self {
            query_pending: false,
            status_pending: false,
            reported: false,
            cancel_pending: false,
            capture_prepared: false,
            enroll_prepared: false,
            op_idle: true,
            op_capturing: false,
        }
    }

    pub fn is_set(&self, flag: Flag) -> bool {
        match flag {
            Flag::QueryPending => self.query_pending,
            Flag::StatusPending => self.status_pending,
            Flag::Reported => self.reported,
            Flag::CancelPending => self.cancel_pending,
            Flag::CapturePrepared => self.capture_prepared,
            Flag::EnrollPrepared => self.enroll_prepared,
            Flag::OpIdle => self.op_idle,
            Flag::OpCapturing => self.op_capturing,
        }
    }

    pub fn set(&mut self, flag: Flag) {
        *self.slot(flag) = true;
    }

    pub fn clear(&mut self, flag: Flag) {
        *self.slot(flag) = false;
    }

    /// Set `flag`, returning whether it was already set.
    pub fn test_and_set(&mut self, flag: Flag) -> bool {
        std::mem::replace(self.slot(flag), true)
    }

    /// Exactly one of idle and capturing holds.
    pub fn is_consistent(&self) -> bool {
        self.op_idle != self.op_capturing
    }

    fn slot(&mut self, flag: Flag) -> &mut bool {
        match flag {
            Flag::QueryPending => &mut self.query_pending,
            Flag::StatusPending => &mut self.status_pending,
            Flag::Reported => &mut self.reported,
            Flag::CancelPending => &mut self.cancel_pending,
            Flag::CapturePrepared => &mut self.capture_prepared,
            Flag::EnrollPrepared => &mut self.enroll_prepared,
            Flag::OpIdle => &mut self.op_idle,
            Flag::OpCapturing => &mut self.op_capturing,
        }
    }
}

impl Default for StateFlags {
    fn default() -> Self {
        Self::new()
    }
}
