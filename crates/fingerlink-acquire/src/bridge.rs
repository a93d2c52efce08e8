//! Handing events from the polling task to the host.
//!
//! Events raised while a polling iteration runs are collected in an
//! [`EventQueue`]. The polling task pops one entry per iteration and pushes
//! it through a [`DeliveryGate`], which runs the host callback on a
//! dedicated host thread and blocks the polling task until the callback has
//! returned. At most one delivery is ever in flight per gate.

use std::collections::VecDeque;
use std::sync::Arc;

use fingerlink_core::AcquireEvent;
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Entry raised by the orchestrator.
///
/// Reader changes carry no payload; they are resolved to connected or
/// disconnected against the inventory at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedEvent {
    ReaderChanged,
    CaptureComplete(Vec<u8>),
    EnrollComplete(Vec<u8>),
}

impl QueuedEvent {
    /// Translate into the host payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use fingerlink_acquire::bridge::QueuedEvent;
    /// use fingerlink_core::AcquireEvent;
    ///
    /// assert_eq!(QueuedEvent::ReaderChanged.into_event(true), AcquireEvent::Connected);
    /// assert_eq!(QueuedEvent::ReaderChanged.into_event(false), AcquireEvent::Disconnected);
    /// ```
    pub fn into_event(self, reader_present: bool) -> AcquireEvent {
        match self {
            Self::ReaderChanged if reader_present => AcquireEvent::Connected,
            Self::ReaderChanged => AcquireEvent::Disconnected,
            Self::CaptureComplete(data) => AcquireEvent::Complete { data },
            Self::EnrollComplete(data) => AcquireEvent::Enrolled { data },
        }
    }
}

/// FIFO of raised events.
#[derive(Debug, Default)]
pub struct EventQueue {
    entries: VecDeque<QueuedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: QueuedEvent) {
        self.entries.push_back(event);
    }

    pub fn pop(&mut self) -> Option<QueuedEvent> {
        self.entries.pop_front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The host side of a gate is gone; the item was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateClosed;

impl std::fmt::Display for GateClosed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("host callback is no longer running")
    }
}

impl std::error::Error for GateClosed {}

struct Delivery<T> {
    item: T,
    ack: oneshot::Sender<()>,
}

/// Single-slot, acknowledged hand-off to a host callback.
///
/// # Examples
///
/// ```
/// use fingerlink_acquire::bridge::DeliveryGate;
/// use std::sync::{Arc, Mutex};
///
/// # #[tokio::main]
/// # async fn main() {
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let (gate, consumer) = DeliveryGate::spawn(&tokio::runtime::Handle::current(), move |n: u32| {
///     sink.lock().unwrap().push(n);
/// });
///
/// gate.deliver(1).await.unwrap();
/// // The callback already ran when deliver returns
/// assert_eq!(*seen.lock().unwrap(), vec![1]);
///
/// drop(gate);
/// consumer.await.unwrap();
/// # }
/// ```
pub struct DeliveryGate<T> {
    tx: mpsc::Sender<Delivery<T>>,
    slot: Arc<Semaphore>,
}

impl<T: Send + 'static> DeliveryGate<T> {
    /// Start the host thread running `callback` and return the gate feeding
    /// it. The thread ends once the gate is dropped.
    pub fn spawn<F>(runtime: &Handle, mut callback: F) -> (Self, JoinHandle<()>)
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Delivery<T>>(1);
        let consumer = runtime.spawn_blocking(move || {
            while let Some(Delivery { item, ack }) = rx.blocking_recv() {
                callback(item);
                let _ = ack.send(());
            }
            trace!("Host delivery thread finished");
        });
        (
            Self {
                tx,
                slot: Arc::new(Semaphore::new(1)),
            },
            consumer,
        )
    }

    /// Hand `item` to the callback and wait until it has returned.
    pub async fn deliver(&self, item: T) -> Result<(), GateClosed> {
        let _permit = self.slot.acquire().await.map_err(|_| GateClosed)?;
        let (ack, acked) = oneshot::channel();
        self.tx
            .send(Delivery { item, ack })
            .await
            .map_err(|_| GateClosed)?;
        acked.await.map_err(|_| {
            debug!("Host callback did not acknowledge delivery");
            GateClosed
        })
    }
}

impl<T> std::fmt::Debug for DeliveryGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryGate")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[rstest]
    #[case(QueuedEvent::CaptureComplete(vec![1]), "complete")]
    #[case(QueuedEvent::EnrollComplete(vec![2]), "enrolled")]
    fn test_payload_events_ignore_presence(#[case] event: QueuedEvent, #[case] status: &str) {
        assert_eq!(event.clone().into_event(true).status(), status);
        assert_eq!(event.into_event(false).status(), status);
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = EventQueue::new();
        queue.push(QueuedEvent::ReaderChanged);
        queue.push(QueuedEvent::CaptureComplete(vec![7]));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.pop(), Some(QueuedEvent::ReaderChanged));
        assert_eq!(queue.pop(), Some(QueuedEvent::CaptureComplete(vec![7])));
        assert_eq!(queue.pop(), None);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_queue_preserves_order(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..4), 0..32),
        ) {
            let mut queue = EventQueue::new();
            for payload in &payloads {
                queue.push(QueuedEvent::CaptureComplete(payload.clone()));
            }
            let popped: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
            let expected: Vec<_> = payloads.into_iter().map(QueuedEvent::CaptureComplete).collect();
            prop_assert_eq!(popped, expected);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_deliver_waits_for_callback() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let (gate, _consumer) = DeliveryGate::spawn(&Handle::current(), move |_: ()| {
            std::thread::sleep(Duration::from_millis(50));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        gate.deliver(()).await.unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_deliveries_never_overlap() {
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));
        let order = Arc::new(Mutex::new(Vec::new()));

        let (a, o, log) = (Arc::clone(&active), Arc::clone(&overlaps), Arc::clone(&order));
        let (gate, _consumer) = DeliveryGate::spawn(&Handle::current(), move |n: usize| {
            if a.fetch_add(1, Ordering::SeqCst) != 0 {
                o.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            log.lock().unwrap().push(n);
            a.fetch_sub(1, Ordering::SeqCst);
        });
        let gate = Arc::new(gate);

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move { gate.deliver(n).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(order.lock().unwrap().len(), 8);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_sequential_deliveries_keep_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        let (gate, _consumer) = DeliveryGate::spawn(&Handle::current(), move |n: usize| {
            log.lock().unwrap().push(n);
        });

        for n in 0..32 {
            gate.deliver(n).await.unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), (0..32).collect::<Vec<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicking_callback_closes_gate() {
        let (gate, consumer) = DeliveryGate::spawn(&Handle::current(), |_: ()| {
            panic!("host callback failed");
        });

        assert_eq!(gate.deliver(()).await, Err(GateClosed));
        assert!(consumer.await.is_err());
        assert_eq!(gate.deliver(()).await, Err(GateClosed));
    }
}
