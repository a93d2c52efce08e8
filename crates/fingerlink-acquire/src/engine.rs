//! Host-facing engine.

use std::sync::Arc;

use fingerlink_core::constants::{FEATURES_LEN, IDENTIFICATION_LEN};
use fingerlink_core::{AcquireEvent, AcquireOptions, EngineConfig, Error, Result};
use fingerlink_hardware::{AnyMatchEngine, AnyReaderDriver};
use tokio::runtime::Handle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::controller::AcquisitionController;
use crate::dispatcher::{Dispatcher, Matcher, Pending};
use crate::orchestrator::Orchestrator;

/// Fingerprint acquisition and matching engine.
///
/// The engine must be created inside a Tokio runtime; all background work
/// runs on that runtime. Host callbacks run on blocking-pool threads, never
/// on a runtime worker, so they may block briefly.
///
/// # Examples
///
/// ```no_run
/// use fingerlink_acquire::Engine;
/// use fingerlink_core::{AcquireOptions, EngineConfig};
/// use fingerlink_hardware::mock::{MockMatchEngine, MockReader};
/// use fingerlink_hardware::{AnyMatchEngine, AnyReaderDriver};
///
/// # #[tokio::main]
/// # async fn main() -> fingerlink_core::Result<()> {
/// let (driver, reader) = MockReader::with_reader("Reader A");
/// let (matcher, _) = MockMatchEngine::new();
/// let engine = Engine::new(
///     AnyReaderDriver::Mock(driver),
///     AnyMatchEngine::Mock(matcher),
///     EngineConfig::default(),
/// )?;
///
/// engine.init();
/// engine.start_acquire(AcquireOptions::single(), |event| {
///     println!("{}", event.status());
/// });
/// reader.present_finger(vec![1, 2, 3]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Engine {
    controller: AcquisitionController,
    dispatcher: Dispatcher,
}

impl Engine {
    /// Build an engine on the current Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an invalid configuration,
    /// [`Error::NotInitialized`] outside a runtime.
    pub fn new(driver: AnyReaderDriver, engine: AnyMatchEngine, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| Error::NotInitialized)?;

        let engine = Arc::new(engine);
        let orchestrator = Orchestrator::new(driver, Arc::clone(&engine), &config);
        let controller = AcquisitionController::new(orchestrator, &config, runtime.clone());
        let dispatcher = Dispatcher::new(Matcher::new(engine, &config), runtime);

        debug!("Engine created with {:?}", config);
        Ok(Self {
            controller,
            dispatcher,
        })
    }

    /// Start the reader monitor, which keeps an unused reader cancelled and
    /// closed. Returns `false` if it already runs or after [`exit`](Self::exit).
    pub fn init(&self) -> bool {
        let started = self.controller.start_monitor();
        if started {
            info!("Engine initialized");
        }
        started
    }

    /// Request every background task to finish.
    pub fn exit(&self) -> bool {
        self.controller.shutdown()
    }

    /// Number of samples an enrollment collects.
    pub fn features_len(&self) -> u32 {
        FEATURES_LEN
    }

    /// Upper bound on identification candidates.
    pub fn identification_len(&self) -> u32 {
        IDENTIFICATION_LEN
    }

    /// Names of the attached readers, optionally enumerating first.
    ///
    /// Enumeration stays rate-limited, so a refresh right after another
    /// one returns the cached list.
    pub async fn list_readers(&self, refresh: bool) -> Vec<String> {
        let mut orch = self.controller.orchestrator().lock().await;
        if refresh {
            orch.refresh_readers().await;
        }
        orch.session().readers().to_vec()
    }

    /// Select a reader by exact name.
    pub async fn select_reader(&self, name: &str) -> bool {
        let mut orch = self.controller.orchestrator().lock().await;
        orch.session_mut().select(name)
    }

    /// Select a reader by position in [`list_readers`](Self::list_readers).
    pub async fn select_reader_index(&self, index: usize) -> bool {
        let mut orch = self.controller.orchestrator().lock().await;
        orch.session_mut().select_index(index)
    }

    /// Begin acquiring. Returns `false` if an acquisition is already live.
    pub fn start_acquire<F>(&self, options: AcquireOptions, on_event: F) -> bool
    where
        F: FnMut(AcquireEvent) + Send + 'static,
    {
        match self.try_start_acquire(options, on_event) {
            Ok(_) => true,
            Err(e) => {
                debug!("Acquisition not started: {}", e);
                false
            }
        }
    }

    /// [`start_acquire`](Self::start_acquire) reporting why it was refused.
    pub fn try_start_acquire<F>(&self, options: AcquireOptions, on_event: F) -> Result<Uuid>
    where
        F: FnMut(AcquireEvent) + Send + 'static,
    {
        self.controller.start(options.mode(), on_event)
    }

    /// Request the live acquisition to stop; `on_done` runs once it has
    /// fully torn down. Returns `false` if there is nothing to stop or a
    /// stop is already pending.
    ///
    /// Safe to call from inside the event callback, as long as that
    /// callback does not then wait for `on_done`.
    pub fn stop_acquire<F>(&self, on_done: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.try_stop_acquire(on_done) {
            Ok(()) => true,
            Err(e) => {
                debug!("Acquisition not stopped: {}", e);
                false
            }
        }
    }

    /// [`stop_acquire`](Self::stop_acquire) reporting why it was refused.
    pub fn try_stop_acquire<F>(&self, on_done: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.controller.stop(on_done)
    }

    pub fn is_acquiring(&self) -> bool {
        self.controller.is_acquiring()
    }

    /// Compare a feature from a `complete` event against an enrolled
    /// template.
    pub fn compare(&self, feature: Vec<u8>, template: Vec<u8>) -> Result<Pending<bool>> {
        self.dispatcher.compare(feature, template)
    }

    /// Find the enrolled template matching a feature. Resolves to its index
    /// or [`NO_MATCH`](fingerlink_core::constants::NO_MATCH).
    pub fn identify(&self, feature: Vec<u8>, templates: Vec<Vec<u8>>) -> Result<Pending<i32>> {
        self.dispatcher.identify(feature, templates)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.controller.shutdown();
    }
}
