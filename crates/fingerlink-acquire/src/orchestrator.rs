//! Capture state machine.
//!
//! The [`Orchestrator`] owns the [`DeviceSession`], the capture mode and the
//! raw capture channel. It is driven by one polling task at a time through
//! [`tick_capture`](Orchestrator::tick_capture) and
//! [`tick_idle`](Orchestrator::tick_idle); results the driver pushed into
//! the channel are processed by [`pump`](Orchestrator::pump) on the same
//! task, so no state here is ever touched from an SDK thread.
//!
//! # Lifecycle
//!
//! ```text
//!            start(mode)                   result (single / enroll done)
//!   Idle ───────────────▶ Capturing ─────────────────────────────────▶ Idle
//!    ▲                     │    ▲
//!    │      stop(force)    │    │ result (continuous): stop, re-arm
//!    └─────────────────────┘    └──┘
//! ```

use std::sync::Arc;

use fingerlink_core::{CaptureMode, EngineConfig};
use fingerlink_hardware::{
    AnyMatchEngine, AnyReaderDriver, CaptureParams, CaptureQuality, CaptureResult, CaptureSink,
    CaptureStatus, EnrollProgress, FmdFormat, MatchEngine, ReaderDriver,
};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bridge::{EventQueue, QueuedEvent};
use crate::flags::{Flag, StateFlags};
use crate::session::{DeviceSession, negotiate};
use crate::tick::Tick;

/// Record format of captured features.
pub const FEATURE_FORMAT: FmdFormat = FmdFormat::DpVerFeatures;

/// Record format of enrolled templates.
pub const TEMPLATE_FORMAT: FmdFormat = FmdFormat::DpRegFeatures;

/// Capture mode plus session state, advanced one tick at a time.
#[derive(Debug)]
pub struct Orchestrator {
    session: DeviceSession,
    engine: Arc<AnyMatchEngine>,
    mode: CaptureMode,
    capture_params: CaptureParams,
    sink: CaptureSink,
    results: mpsc::Receiver<CaptureResult>,
    queue: Option<EventQueue>,
    feature: Option<Vec<u8>>,
    template: Option<Vec<u8>>,
    negotiation_attempts: u32,
}

impl Orchestrator {
    pub fn new(driver: AnyReaderDriver, engine: Arc<AnyMatchEngine>, config: &EngineConfig) -> Self {
        let (sink, results) = CaptureSink::channel(config.capture_channel_capacity);
        Self {
            session: DeviceSession::new(driver, config),
            engine,
            mode: CaptureMode::None,
            capture_params: CaptureParams::new(config.capture_resolution_dpi),
            sink,
            results,
            queue: None,
            feature: None,
            template: None,
            negotiation_attempts: config.negotiation_attempts,
        }
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn flags(&self) -> &StateFlags {
        self.session.flags()
    }

    pub fn is_capturing(&self) -> bool {
        self.flags().is_set(Flag::OpCapturing)
    }

    /// Feature extracted from the most recent good capture.
    pub fn feature(&self) -> Option<&[u8]> {
        self.feature.as_deref()
    }

    /// Template produced by the most recent completed enrollment.
    pub fn template(&self) -> Option<&[u8]> {
        self.template.as_deref()
    }

    /// Route raised events into `queue` until [`detach`](Self::detach).
    pub fn attach(&mut self, queue: EventQueue) {
        self.queue = Some(queue);
    }

    /// Stop routing events and hand back the queue with whatever it still
    /// holds.
    pub fn detach(&mut self) -> Option<EventQueue> {
        self.queue.take()
    }

    pub fn is_attached(&self) -> bool {
        self.queue.is_some()
    }

    /// Pop the oldest raised event, resolved against the current inventory.
    pub fn next_event(&mut self) -> Option<fingerlink_core::AcquireEvent> {
        let reader_present = !self.session.readers().is_empty();
        self.queue
            .as_mut()
            .and_then(EventQueue::pop)
            .map(|event| event.into_event(reader_present))
    }

    /// Enumerate readers now if the reader tick allows it.
    pub async fn refresh_readers(&mut self) -> bool {
        let completed = self.session.enumerate().await;
        if completed {
            self.raise(QueuedEvent::ReaderChanged);
        }
        completed
    }

    /// Enter capturing in `mode`. Does nothing for [`CaptureMode::None`] or
    /// when already capturing.
    pub fn start(&mut self, mode: CaptureMode) {
        if mode == CaptureMode::None {
            return;
        }
        self.mode = mode;
        let flags = self.session.flags_mut();
        if flags.test_and_set(Flag::OpCapturing) {
            return;
        }
        flags.clear(Flag::OpIdle);
        flags.clear(Flag::CancelPending);
        debug!("Capture started in {} mode", mode);
    }

    /// Leave capturing.
    ///
    /// In continuous mode an unforced stop keeps the armed capture and
    /// immediately re-enters capturing; otherwise the armed capture is
    /// forgotten and the mode resets to [`CaptureMode::None`].
    pub fn stop(&mut self, force: bool) {
        if self.mode == CaptureMode::None {
            return;
        }
        let mode = self.mode;
        let flags = self.session.flags_mut();
        if flags.test_and_set(Flag::OpIdle) {
            return;
        }
        flags.clear(Flag::OpCapturing);
        flags.clear(Flag::Reported);
        flags.clear(Flag::EnrollPrepared);

        let rearm = mode == CaptureMode::ContinuousCapture && !force;
        if !rearm {
            flags.clear(Flag::CapturePrepared);
        }

        if rearm {
            debug!("Continuing capture");
            self.start(mode);
        } else {
            debug!("Capture stopped");
            self.mode = CaptureMode::None;
        }
    }

    /// One capturing iteration: find and open a reader, report presence,
    /// prepare enrollment and arm the capture.
    pub async fn tick_capture(&mut self) {
        if self.session.selected().is_none() {
            self.refresh_readers().await;
        }
        if self.session.selected().is_some() {
            self.session.open().await;
        }
        if self.session.is_open() && self.session.check_status().await {
            self.on_device_lost();
        }

        if !self.session.flags_mut().test_and_set(Flag::Reported) {
            self.raise(QueuedEvent::ReaderChanged);
        }

        if self.mode == CaptureMode::Enroll && !self.prepare_enroll() {
            return;
        }
        self.prepare_capture().await;
    }

    /// One idle iteration: cancel anything armed, then close the reader.
    pub async fn tick_idle(&mut self) {
        if self.session.is_open() && self.session.check_status().await {
            self.on_device_lost();
        }
        if !self.cancel_capture().await {
            return;
        }
        self.session.close().await;
    }

    /// Process every capture result the driver has delivered so far.
    pub fn pump(&mut self) {
        while let Ok(result) = self.results.try_recv() {
            self.handle_capture_result(result);
        }
    }

    /// Drop capture results still queued from an earlier round without
    /// processing them.
    pub fn discard_results(&mut self) -> usize {
        let mut discarded = 0;
        while self.results.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            debug!("Discarded {} stale capture result(s)", discarded);
        }
        discarded
    }

    fn handle_capture_result(&mut self, result: CaptureResult) {
        if !self.is_capturing() {
            trace!("Capture result ignored while idle");
            return;
        }
        match self.mode {
            CaptureMode::Enroll => self.on_enroll_result(result),
            _ => self.on_capture_result(result),
        }
    }

    /// Turn a raw capture into a verification feature and finish the
    /// capture round.
    pub fn on_capture_result(&mut self, result: CaptureResult) {
        let Some(feature) = self.extract(&result, FEATURE_FORMAT) else {
            return;
        };
        self.feature = Some(feature.clone());
        self.stop(false);
        self.raise(QueuedEvent::CaptureComplete(feature));
    }

    /// Feed a raw capture to the enrollment accumulator, finishing the
    /// enrollment once it has enough samples.
    pub fn on_enroll_result(&mut self, result: CaptureResult) {
        let format = TEMPLATE_FORMAT.enrollment_sample_format();
        let Some(feature) = self.extract(&result, format) else {
            return;
        };
        self.feature = Some(feature.clone());
        self.raise(QueuedEvent::CaptureComplete(feature.clone()));

        match self.engine.add_to_enrollment(format, &feature) {
            Ok(EnrollProgress::Ready) => {
                info!("Enrollment samples complete");
                self.stop(false);
                self.finish_enroll();
            }
            Ok(EnrollProgress::NeedMoreSamples) => debug!("Enroll the same finger again"),
            Err(e) => warn!("Unable to add enrollment sample: {}", e),
        }
    }

    fn extract(&self, result: &CaptureResult, format: FmdFormat) -> Option<Vec<u8>> {
        if let CaptureStatus::Failed { code } = result.status {
            warn!("Capture failed: {:#x}", code);
            return None;
        }
        if !result.has_sample() {
            match result.quality {
                CaptureQuality::Canceled => debug!("Capture cancelled"),
                quality => debug!("Bad capture quality: {:?}", quality),
            }
            return None;
        }

        match self.engine.extract_feature(result, format) {
            Ok(feature) => {
                debug!("Feature extraction completed, {} bytes", feature.len());
                Some(feature)
            }
            Err(e) => {
                warn!("Unable to extract feature: {}", e);
                None
            }
        }
    }

    fn finish_enroll(&mut self) {
        let engine = Arc::clone(&self.engine);
        match negotiate(self.negotiation_attempts, |capacity| {
            engine.create_enrollment_fmd(capacity)
        }) {
            Ok(template) => {
                info!("Enrollment completed, {} bytes", template.len());
                if let Err(e) = self.engine.finish_enrollment() {
                    debug!("Error finishing enrollment: {}", e);
                }
                self.template = Some(template.clone());
                self.raise(QueuedEvent::EnrollComplete(template));
            }
            Err(e) => warn!("Unable to create enrollment template: {}", e),
        }
    }

    /// Start a fresh enrollment session once per capture round.
    fn prepare_enroll(&mut self) -> bool {
        if !self.session.is_open() {
            return false;
        }

        let engine = Arc::clone(&self.engine);
        let session = &mut self.session;
        if !session.flags_mut().test_and_set(Flag::EnrollPrepared) {
            // Discard whatever a previous round left behind
            if let Err(e) = engine.finish_enrollment() {
                debug!("No previous enrollment to finish: {}", e);
            }
            let result = engine.start_enrollment(TEMPLATE_FORMAT);
            match &result {
                Ok(()) => info!("Enrollment started"),
                Err(e) => warn!("Unable to start enrollment: {}", e),
            }
            let ticks = session.ticks_mut();
            ticks.touch(Tick::Enroll);
            ticks.set_result(Tick::Enroll, result.is_ok());
        } else if !session.ticks_mut().result(Tick::Enroll)
            && session.ticks_mut().should_run(Tick::Enroll)
        {
            session.flags_mut().clear(Flag::EnrollPrepared);
        }
        session.ticks_mut().result(Tick::Enroll)
    }

    /// Arm an asynchronous capture once per capture round.
    async fn prepare_capture(&mut self) -> bool {
        let Some(device) = self.session.device() else {
            return false;
        };

        if !self.session.flags_mut().test_and_set(Flag::CapturePrepared) {
            let params = self.capture_params;
            let sink = self.sink.clone();
            let result = self
                .session
                .driver_mut()
                .capture_async(device, params, sink)
                .await;
            match &result {
                Ok(()) => info!("Capture armed"),
                Err(e) => warn!("Unable to start capture: {}", e),
            }
            let ticks = self.session.ticks_mut();
            ticks.touch(Tick::Capture);
            ticks.set_result(Tick::Capture, result.is_ok());
        } else if !self.session.ticks_mut().result(Tick::Capture)
            && self.session.ticks_mut().should_run(Tick::Capture)
        {
            self.session.flags_mut().clear(Flag::CapturePrepared);
        }
        self.session.ticks_mut().result(Tick::Capture)
    }

    /// Cancel the armed capture once per idle period.
    async fn cancel_capture(&mut self) -> bool {
        let Some(device) = self.session.device() else {
            return false;
        };

        if !self.session.flags_mut().test_and_set(Flag::CancelPending) {
            let result = self.session.driver_mut().cancel(device).await;
            match &result {
                Ok(()) => debug!("Capture cancelled"),
                Err(e) => warn!("Unable to cancel capture: {}", e),
            }
            let ticks = self.session.ticks_mut();
            ticks.touch(Tick::Cancel);
            ticks.set_result(Tick::Cancel, result.is_ok());
        } else if !self.session.ticks_mut().result(Tick::Cancel)
            && self.session.ticks_mut().should_run(Tick::Cancel)
        {
            self.session.flags_mut().clear(Flag::CancelPending);
        }
        self.session.ticks_mut().result(Tick::Cancel)
    }

    fn on_device_lost(&mut self) {
        let flags = self.session.flags_mut();
        flags.clear(Flag::CapturePrepared);
        flags.clear(Flag::EnrollPrepared);
        // Reported stays set so the loss is announced exactly once
        flags.set(Flag::Reported);
        self.raise(QueuedEvent::ReaderChanged);
    }

    fn raise(&mut self, event: QueuedEvent) {
        match self.queue.as_mut() {
            Some(queue) => queue.push(event),
            None => trace!("No listener, dropping {:?}", event),
        }
    }
}
