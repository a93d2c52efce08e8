//! Background fingerprint matching.
//!
//! Compare and identify run on the blocking pool so the host never waits
//! on the matching engine. Each kind admits one job at a time; a second
//! request while one is running is rejected with [`Error::Busy`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use fingerlink_core::constants::NO_MATCH;
use fingerlink_core::{EngineConfig, Error, Result};
use fingerlink_hardware::{AnyMatchEngine, MatchEngine};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::orchestrator::{FEATURE_FORMAT, TEMPLATE_FORMAT};

/// Result of a background job, resolved exactly once.
#[derive(Debug)]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|result| result.map_err(|_| Error::TaskFailed("job ended without a result".into())))
    }
}

/// Matching rules on top of the engine primitives.
#[derive(Debug, Clone)]
pub struct Matcher {
    engine: Arc<AnyMatchEngine>,
    threshold: u32,
    max_candidates: usize,
}

impl Matcher {
    pub fn new(engine: Arc<AnyMatchEngine>, config: &EngineConfig) -> Self {
        Self {
            engine,
            threshold: config.false_match_rate,
            max_candidates: config.max_identify_candidates as usize,
        }
    }

    /// True when the dissimilarity score falls strictly below the false
    /// match rate. Engine errors count as no match.
    pub fn compare(&self, feature: &[u8], template: &[u8]) -> bool {
        match self
            .engine
            .compare(FEATURE_FORMAT, feature, TEMPLATE_FORMAT, template)
        {
            Ok(score) if score < self.threshold => {
                debug!("Fingerprint matched, score {}", score);
                true
            }
            Ok(score) => {
                debug!("Fingerprint did not match, score {}", score);
                false
            }
            Err(e) => {
                warn!("Unable to compare fingerprints: {}", e);
                false
            }
        }
    }

    /// Index of the best candidate, confirmed by a direct comparison.
    pub fn identify(&self, feature: &[u8], templates: &[Vec<u8>]) -> Option<usize> {
        let candidates = match self.engine.identify(
            FEATURE_FORMAT,
            feature,
            TEMPLATE_FORMAT,
            templates,
            self.threshold,
            self.max_candidates,
        ) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Unable to identify fingerprint: {}", e);
                return None;
            }
        };

        let best = candidates.first()?;
        let Some(template) = templates.get(best.index) else {
            warn!("Identify returned out of range candidate {}", best.index);
            return None;
        };
        if self.compare(feature, template) {
            Some(best.index)
        } else {
            debug!("Candidate {} not confirmed", best.index);
            None
        }
    }
}

/// Releases a single-flight slot when the job ends, even by panic.
struct Slot(Arc<AtomicBool>);

impl Drop for Slot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight front end for [`Matcher`].
#[derive(Debug)]
pub struct Dispatcher {
    matcher: Matcher,
    runtime: Handle,
    comparing: Arc<AtomicBool>,
    identifying: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(matcher: Matcher, runtime: Handle) -> Self {
        Self {
            matcher,
            runtime,
            comparing: Arc::new(AtomicBool::new(false)),
            identifying: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Compare a captured feature against one enrolled template.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty input, [`Error::Busy`] while
    /// another compare runs.
    pub fn compare(&self, feature: Vec<u8>, template: Vec<u8>) -> Result<Pending<bool>> {
        if feature.is_empty() {
            return Err(Error::invalid_argument(
                "Feature must be a non-empty buffer!",
            ));
        }
        if template.is_empty() {
            return Err(Error::invalid_argument("FMD must be a non-empty buffer!"));
        }

        let matcher = self.matcher.clone();
        self.run("compare", &self.comparing, move || {
            matcher.compare(&feature, &template)
        })
    }

    /// Find which template matches a captured feature, resolving to its
    /// index or [`NO_MATCH`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] for an empty feature, an empty list or an
    /// empty element; [`Error::Busy`] while another identify runs.
    pub fn identify(&self, feature: Vec<u8>, templates: Vec<Vec<u8>>) -> Result<Pending<i32>> {
        if feature.is_empty() {
            return Err(Error::invalid_argument(
                "Feature must be a non-empty buffer!",
            ));
        }
        if templates.is_empty() {
            return Err(Error::invalid_argument("FMD list must not be empty!"));
        }
        if templates.iter().any(Vec::is_empty) {
            return Err(Error::invalid_argument(
                "Array element must be a non-empty buffer!",
            ));
        }

        let matcher = self.matcher.clone();
        self.run("identify", &self.identifying, move || {
            matcher
                .identify(&feature, &templates)
                .and_then(|index| i32::try_from(index).ok())
                .unwrap_or(NO_MATCH)
        })
    }

    pub fn is_comparing(&self) -> bool {
        self.comparing.load(Ordering::Acquire)
    }

    pub fn is_identifying(&self) -> bool {
        self.identifying.load(Ordering::Acquire)
    }

    fn run<T, F>(&self, operation: &str, flag: &Arc<AtomicBool>, job: F) -> Result<Pending<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::busy(operation));
        }
        let slot = Slot(Arc::clone(flag));
        let (tx, rx) = oneshot::channel();

        self.runtime.spawn_blocking(move || {
            let result = job();
            // Free the slot before the caller can observe the result
            drop(slot);
            let _ = tx.send(result);
        });
        Ok(Pending { rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fingerlink_core::constants::PROBABILITY_ONE;
    use fingerlink_hardware::Candidate;
    use fingerlink_hardware::mock::{MockMatchEngine, MockMatchEngineHandle};
    use rstest::rstest;

    fn matcher() -> (Matcher, MockMatchEngineHandle) {
        let (engine, handle) = MockMatchEngine::new();
        let matcher = Matcher::new(
            Arc::new(AnyMatchEngine::Mock(engine)),
            &EngineConfig::default(),
        );
        (matcher, handle)
    }

    fn records(handle: &MockMatchEngineHandle) -> (Vec<u8>, Vec<Vec<u8>>) {
        let feature = handle.feature_for(FEATURE_FORMAT, &[5, 5, 5]);
        let templates = vec![
            handle.feature_for(TEMPLATE_FORMAT, &[1, 1, 1]),
            handle.feature_for(TEMPLATE_FORMAT, &[5, 5, 5]),
            handle.feature_for(TEMPLATE_FORMAT, &[9, 9, 9]),
        ];
        (feature, templates)
    }

    #[rstest]
    #[case(0, true)]
    #[case(fingerlink_core::constants::DEFAULT_FALSE_MATCH_RATE - 1, true)]
    #[case(fingerlink_core::constants::DEFAULT_FALSE_MATCH_RATE, false)]
    #[case(PROBABILITY_ONE, false)]
    fn test_compare_threshold(#[case] score: u32, #[case] matched: bool) {
        let (matcher, handle) = matcher();
        handle.script_scores([score]);
        assert_eq!(matcher.compare(&[1, 2], &[1, 3]), matched);
    }

    #[test]
    fn test_identify_finds_matching_template() {
        let (matcher, handle) = matcher();
        let (feature, templates) = records(&handle);
        assert_eq!(matcher.identify(&feature, &templates), Some(1));
    }

    #[test]
    fn test_identify_without_candidates() {
        let (matcher, handle) = matcher();
        let (feature, mut templates) = records(&handle);
        templates.remove(1);
        assert_eq!(matcher.identify(&feature, &templates), None);
    }

    #[test]
    fn test_identify_requires_confirmation() {
        let (matcher, handle) = matcher();
        let (feature, templates) = records(&handle);
        handle.script_identify(vec![Candidate::new(1)]);
        handle.script_scores([PROBABILITY_ONE]);
        assert_eq!(matcher.identify(&feature, &templates), None);
    }

    #[test]
    fn test_identify_ignores_out_of_range_candidate() {
        let (matcher, handle) = matcher();
        let (feature, templates) = records(&handle);
        handle.script_identify(vec![Candidate::new(7)]);
        assert_eq!(matcher.identify(&feature, &templates), None);
    }

    #[tokio::test]
    async fn test_dispatch_compare() {
        let (matcher, handle) = matcher();
        let (feature, templates) = records(&handle);
        let dispatcher = Dispatcher::new(matcher, Handle::current());

        let matched = dispatcher
            .compare(feature.clone(), templates[1].clone())
            .unwrap()
            .await
            .unwrap();
        assert!(matched);

        // Slot is free again once the result is out
        let matched = dispatcher
            .compare(feature, templates[0].clone())
            .unwrap()
            .await
            .unwrap();
        assert!(!matched);
    }

    #[tokio::test]
    async fn test_dispatch_identify() {
        let (matcher, handle) = matcher();
        let (feature, templates) = records(&handle);
        let dispatcher = Dispatcher::new(matcher, Handle::current());

        let index = dispatcher.identify(feature.clone(), templates.clone()).unwrap();
        assert_eq!(index.await.unwrap(), 1);

        handle.script_identify(Vec::new());
        let index = dispatcher.identify(feature, templates).unwrap();
        assert_eq!(index.await.unwrap(), NO_MATCH);
    }

    #[rstest]
    #[case(vec![], vec![vec![1]], "Feature must be a non-empty buffer!")]
    #[case(vec![1], vec![], "FMD list must not be empty!")]
    #[case(vec![1], vec![vec![1], vec![]], "Array element must be a non-empty buffer!")]
    #[tokio::test]
    async fn test_identify_rejects_empty_input(
        #[case] feature: Vec<u8>,
        #[case] templates: Vec<Vec<u8>>,
        #[case] message: &str,
    ) {
        let (matcher, _handle) = matcher();
        let dispatcher = Dispatcher::new(matcher, Handle::current());
        let err = dispatcher.identify(feature, templates).unwrap_err();
        assert_eq!(err, Error::invalid_argument(message));
        assert!(!dispatcher.is_identifying());
    }

    #[tokio::test]
    async fn test_compare_rejects_empty_template() {
        let (matcher, _handle) = matcher();
        let dispatcher = Dispatcher::new(matcher, Handle::current());
        let err = dispatcher.compare(vec![1], Vec::new()).unwrap_err();
        assert_eq!(err.to_string(), "FMD must be a non-empty buffer!");
    }

    #[tokio::test]
    async fn test_second_job_of_same_kind_is_busy() {
        let (matcher, _handle) = matcher();
        let dispatcher = Dispatcher::new(matcher, Handle::current());

        // Hold the compare slot as a running job would
        dispatcher.comparing.store(true, Ordering::Release);
        let err = dispatcher.compare(vec![1], vec![1]).unwrap_err();
        assert_eq!(err, Error::busy("compare"));

        // Identify has its own slot
        let pending = dispatcher.identify(vec![1, 1], vec![vec![2, 1]]).unwrap();
        assert_eq!(pending.await.unwrap(), 0);
    }
}
