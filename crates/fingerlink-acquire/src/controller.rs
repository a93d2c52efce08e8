//! Background work: the acquisition loop, the stop protocol and the reader
//! monitor.
//!
//! At most one acquisition runs at a time. Its loop owns the event queue
//! for its lifetime and delivers events one by one through a
//! [`DeliveryGate`]. Stopping is two-phase: [`AcquisitionController::stop`]
//! only flags the loop and returns; the stop callback runs once the loop
//! has torn down and released the queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fingerlink_core::{AcquireEvent, CaptureMode, EngineConfig, Error, Result};
use tokio::runtime::Handle;
use tokio::sync::{Semaphore, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info, info_span, trace, warn};
use uuid::Uuid;

use crate::bridge::{DeliveryGate, EventQueue};
use crate::orchestrator::Orchestrator;

struct AcquireWork {
    id: Uuid,
    stopped: Arc<AtomicBool>,
    done: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
struct WorkSlots {
    monitor: Option<JoinHandle<()>>,
    acquire: Option<AcquireWork>,
    stop_pending: bool,
}

struct Shared {
    orchestrator: tokio::sync::Mutex<Orchestrator>,
    work: Mutex<WorkSlots>,
    exiting: AtomicBool,
    stop_gate: Semaphore,
    poll_interval: Duration,
}

impl Shared {
    fn work(&self) -> MutexGuard<'_, WorkSlots> {
        self.work.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::Acquire)
    }
}

/// Clears the acquisition slot and signals completion when the loop ends,
/// however it ends.
struct LoopGuard {
    shared: Arc<Shared>,
    id: Uuid,
    done: Option<oneshot::Sender<()>>,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        {
            let mut work = self.shared.work();
            if work.acquire.as_ref().is_some_and(|w| w.id == self.id) {
                work.acquire = None;
            }
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// Owner of the orchestrator and of every background task driving it.
pub struct AcquisitionController {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl AcquisitionController {
    pub fn new(orchestrator: Orchestrator, config: &EngineConfig, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                orchestrator: tokio::sync::Mutex::new(orchestrator),
                work: Mutex::new(WorkSlots::default()),
                exiting: AtomicBool::new(false),
                stop_gate: Semaphore::new(1),
                poll_interval: config.poll_interval(),
            }),
            runtime,
        }
    }

    /// The orchestrator, for short host-initiated operations. Never hold
    /// the lock across a host callback.
    pub fn orchestrator(&self) -> &tokio::sync::Mutex<Orchestrator> {
        &self.shared.orchestrator
    }

    /// Start the reader monitor. Returns `false` if it is already running
    /// or the controller is shutting down.
    pub fn start_monitor(&self) -> bool {
        if self.shared.is_exiting() {
            return false;
        }
        let mut work = self.shared.work();
        if work.monitor.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }
        let shared = Arc::clone(&self.shared);
        work.monitor = Some(
            self.runtime
                .spawn(run_monitor(shared).instrument(info_span!("monitor"))),
        );
        true
    }

    /// Ask every background task to finish. Returns `false` if already
    /// requested.
    pub fn shutdown(&self) -> bool {
        let first = !self.shared.exiting.swap(true, Ordering::AcqRel);
        if first {
            info!("Shutting down");
        }
        first
    }

    pub fn is_exiting(&self) -> bool {
        self.shared.is_exiting()
    }

    /// Begin an acquisition in `mode`, delivering events to `on_event` on a
    /// host thread.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyAcquiring`] if an acquisition loop is still running,
    /// including one that was asked to stop but has not finished.
    pub fn start<F>(&self, mode: CaptureMode, on_event: F) -> Result<Uuid>
    where
        F: FnMut(AcquireEvent) + Send + 'static,
    {
        if self.shared.is_exiting() {
            return Err(Error::ShuttingDown);
        }
        let mut work = self.shared.work();
        if work.acquire.is_some() {
            return Err(Error::AlreadyAcquiring);
        }

        let id = Uuid::new_v4();
        let stopped = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = oneshot::channel();
        let (gate, _consumer) = DeliveryGate::spawn(&self.runtime, on_event);
        let guard = LoopGuard {
            shared: Arc::clone(&self.shared),
            id,
            done: Some(done_tx),
        };

        let span = info_span!("acquisition", %id, %mode);
        self.runtime.spawn(
            run_acquisition(
                Arc::clone(&self.shared),
                mode,
                gate,
                Arc::clone(&stopped),
                guard,
            )
            .instrument(span),
        );

        work.acquire = Some(AcquireWork {
            id,
            stopped,
            done: Some(done_rx),
        });
        Ok(id)
    }

    /// Request the running acquisition to stop. `on_done` runs on a host
    /// thread after the loop has torn down.
    ///
    /// Returns immediately, so it may be called from inside the event
    /// callback. The callback must not block waiting for `on_done`: the
    /// loop cannot finish while its delivery is outstanding.
    ///
    /// # Errors
    ///
    /// [`Error::NotAcquiring`] without a live acquisition,
    /// [`Error::StopPending`] if a stop was already requested.
    pub fn stop<F>(&self, on_done: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut work = self.shared.work();
        if work.stop_pending {
            return Err(Error::StopPending);
        }
        let Some(acquire) = work.acquire.as_mut() else {
            return Err(Error::NotAcquiring);
        };
        if acquire.stopped.load(Ordering::Acquire) {
            return Err(Error::NotAcquiring);
        }
        let Some(done) = acquire.done.take() else {
            return Err(Error::StopPending);
        };
        acquire.stopped.store(true, Ordering::Release);
        let span = info_span!("stop", id = %acquire.id);
        work.stop_pending = true;
        drop(work);
        info!("Stop requested");

        self.runtime
            .spawn(run_stop(Arc::clone(&self.shared), done, on_done).instrument(span));
        Ok(())
    }

    /// True while an acquisition loop runs and has not been asked to stop.
    pub fn is_acquiring(&self) -> bool {
        self.shared
            .work()
            .acquire
            .as_ref()
            .is_some_and(|acquire| !acquire.stopped.load(Ordering::Acquire))
    }
}

impl std::fmt::Debug for AcquisitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionController")
            .field("acquiring", &self.is_acquiring())
            .field("exiting", &self.is_exiting())
            .finish()
    }
}

async fn run_acquisition(
    shared: Arc<Shared>,
    mode: CaptureMode,
    gate: DeliveryGate<AcquireEvent>,
    stopped: Arc<AtomicBool>,
    guard: LoopGuard,
) {
    {
        let mut orch = shared.orchestrator.lock().await;
        orch.attach(EventQueue::new());
        orch.discard_results();
        orch.start(mode);
    }
    info!("Acquisition started");

    while !stopped.load(Ordering::Acquire) && !shared.is_exiting() {
        let event = {
            let mut orch = shared.orchestrator.lock().await;
            orch.pump();
            if orch.is_capturing() {
                orch.tick_capture().await;
            } else {
                orch.tick_idle().await;
            }
            orch.next_event()
        };

        if let Some(event) = event {
            trace!("Delivering {} event", event.status());
            if let Err(e) = gate.deliver(event).await {
                warn!("Event dropped: {}", e);
            }
        }
        tokio::time::sleep(shared.poll_interval).await;
    }

    {
        let mut orch = shared.orchestrator.lock().await;
        orch.stop(true);
        orch.tick_idle().await;
        orch.discard_results();
        if let Some(queue) = orch.detach().filter(|queue| !queue.is_empty()) {
            debug!("Dropping {} undelivered event(s)", queue.len());
        }
    }
    info!("Acquisition finished");

    // The host thread must be released before completion is signalled
    drop(gate);
    drop(guard);
}

async fn run_stop<F>(shared: Arc<Shared>, done: oneshot::Receiver<()>, on_done: F)
where
    F: FnOnce() + Send + 'static,
{
    // Stop callbacks run one at a time
    let _permit = shared.stop_gate.acquire().await.ok();

    if done.await.is_err() {
        debug!("Acquisition ended without signalling");
    }
    shared.work().stop_pending = false;

    if let Err(e) = tokio::task::spawn_blocking(on_done).await {
        warn!("Stop callback failed: {}", e);
    }
    info!("Acquisition stopped");
}

async fn run_monitor(shared: Arc<Shared>) {
    info!("Reader monitor started");
    while !shared.is_exiting() {
        {
            let mut orch = shared.orchestrator.lock().await;
            if !orch.is_attached() {
                orch.pump();
                orch.tick_idle().await;
            }
        }
        tokio::time::sleep(shared.poll_interval).await;
    }
    info!("Reader monitor stopped");
}
