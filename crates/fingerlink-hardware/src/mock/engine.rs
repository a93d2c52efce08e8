//! Mock matching engine for testing and development.
//!
//! Feature records are the format tag followed by the raw sample bytes, and
//! two records match when their sample bytes are equal. Scores and
//! identification answers can be scripted through the handle to exercise
//! the confirmation paths of the dispatcher.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use fingerlink_core::constants::{FEATURES_LEN, MAX_FMD_SIZE, PROBABILITY_ONE};
use subtle::ConstantTimeEq;

use crate::{
    HardwareError, Result,
    traits::MatchEngine,
    types::{Candidate, CaptureResult, EnrollProgress, FmdFormat},
};

/// How many times each primitive was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockEngineCalls {
    pub extract: usize,
    pub compare: usize,
    pub identify: usize,
    pub start_enrollment: usize,
    pub add_to_enrollment: usize,
    pub create_enrollment_fmd: usize,
    pub finish_enrollment: usize,
}

#[derive(Debug)]
struct Enrollment {
    format: FmdFormat,
    samples: Vec<Vec<u8>>,
}

#[derive(Debug)]
struct MockEngineState {
    required_samples: u32,
    enrollment: Option<Enrollment>,
    scripted_scores: VecDeque<u32>,
    scripted_identify: Option<Vec<Candidate>>,
    fail_extract: bool,
    fail_start_enrollment: bool,
    scripted_add_errors: VecDeque<HardwareError>,
    calls: MockEngineCalls,
}

fn lock(state: &Mutex<MockEngineState>) -> MutexGuard<'_, MockEngineState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Sample bytes carried by a mock record.
fn payload(record: &[u8]) -> &[u8] {
    record.get(1..).unwrap_or_default()
}

fn encode(format: FmdFormat, sample: &[u8]) -> Vec<u8> {
    let mut record = Vec::with_capacity(sample.len() + 1);
    record.push(format.tag());
    record.extend_from_slice(sample);
    record
}

/// Mock matching engine.
///
/// # Examples
///
/// ```
/// use fingerlink_hardware::mock::MockMatchEngine;
/// use fingerlink_hardware::traits::MatchEngine;
/// use fingerlink_hardware::types::{CaptureResult, FmdFormat};
///
/// let (engine, _handle) = MockMatchEngine::new();
/// let capture = CaptureResult::success(vec![1, 2, 3]);
///
/// let a = engine.extract_feature(&capture, FmdFormat::DpVerFeatures).unwrap();
/// let b = engine.extract_feature(&capture, FmdFormat::DpRegFeatures).unwrap();
/// let score = engine
///     .compare(FmdFormat::DpVerFeatures, &a, FmdFormat::DpRegFeatures, &b)
///     .unwrap();
/// assert_eq!(score, 0);
/// ```
#[derive(Debug)]
pub struct MockMatchEngine {
    state: Arc<Mutex<MockEngineState>>,
}

impl MockMatchEngine {
    /// Create an engine requiring the default number of enrollment samples.
    pub fn new() -> (Self, MockMatchEngineHandle) {
        Self::with_required_samples(FEATURES_LEN)
    }

    /// Create an engine whose enrollment is ready after `required` samples.
    pub fn with_required_samples(required: u32) -> (Self, MockMatchEngineHandle) {
        let state = Arc::new(Mutex::new(MockEngineState {
            required_samples: required.max(1),
            enrollment: None,
            scripted_scores: VecDeque::new(),
            scripted_identify: None,
            fail_extract: false,
            fail_start_enrollment: false,
            scripted_add_errors: VecDeque::new(),
            calls: MockEngineCalls::default(),
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockMatchEngineHandle { state },
        )
    }

    fn score(state: &mut MockEngineState, feature: &[u8], template: &[u8]) -> u32 {
        if let Some(score) = state.scripted_scores.pop_front() {
            return score;
        }
        if bool::from(payload(feature).ct_eq(payload(template))) {
            0
        } else {
            PROBABILITY_ONE
        }
    }
}

impl MatchEngine for MockMatchEngine {
    fn extract_feature(&self, capture: &CaptureResult, format: FmdFormat) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        state.calls.extract += 1;
        if state.fail_extract {
            return Err(HardwareError::extraction("scripted failure"));
        }
        if !capture.has_sample() {
            return Err(HardwareError::extraction("no sample"));
        }
        if capture.sample.len() + 1 > MAX_FMD_SIZE {
            return Err(HardwareError::extraction("record too large"));
        }
        Ok(encode(format, &capture.sample))
    }

    fn compare(
        &self,
        _feature_format: FmdFormat,
        feature: &[u8],
        _template_format: FmdFormat,
        template: &[u8],
    ) -> Result<u32> {
        let mut state = lock(&self.state);
        state.calls.compare += 1;
        if feature.is_empty() || template.is_empty() {
            return Err(HardwareError::invalid_parameter("empty record"));
        }
        Ok(Self::score(&mut state, feature, template))
    }

    fn identify(
        &self,
        _feature_format: FmdFormat,
        feature: &[u8],
        _template_format: FmdFormat,
        templates: &[Vec<u8>],
        threshold: u32,
        max_candidates: usize,
    ) -> Result<Vec<Candidate>> {
        let mut state = lock(&self.state);
        state.calls.identify += 1;
        if feature.is_empty() {
            return Err(HardwareError::invalid_parameter("empty record"));
        }
        if let Some(scripted) = state.scripted_identify.take() {
            return Ok(scripted);
        }
        let mut hits: Vec<(u32, usize)> = templates
            .iter()
            .enumerate()
            .filter(|(_, template)| !template.is_empty())
            .map(|(index, template)| {
                let matched = bool::from(payload(feature).ct_eq(payload(template)));
                (if matched { 0 } else { PROBABILITY_ONE }, index)
            })
            .filter(|(score, _)| *score < threshold)
            .collect();
        hits.sort_unstable();
        Ok(hits
            .into_iter()
            .take(max_candidates)
            .map(|(_, index)| Candidate::new(index))
            .collect())
    }

    fn start_enrollment(&self, format: FmdFormat) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.start_enrollment += 1;
        if state.fail_start_enrollment {
            return Err(HardwareError::failure(0x05ba_0010));
        }
        if state.enrollment.is_some() {
            return Err(HardwareError::enrollment("enrollment already started"));
        }
        state.enrollment = Some(Enrollment {
            format,
            samples: Vec::new(),
        });
        Ok(())
    }

    fn add_to_enrollment(&self, _format: FmdFormat, feature: &[u8]) -> Result<EnrollProgress> {
        let mut state = lock(&self.state);
        state.calls.add_to_enrollment += 1;
        if let Some(error) = state.scripted_add_errors.pop_front() {
            return Err(error);
        }
        let required = state.required_samples as usize;
        let enrollment = state
            .enrollment
            .as_mut()
            .ok_or_else(|| HardwareError::enrollment("enrollment not started"))?;
        enrollment.samples.push(payload(feature).to_vec());
        if enrollment.samples.len() >= required {
            Ok(EnrollProgress::Ready)
        } else {
            Ok(EnrollProgress::NeedMoreSamples)
        }
    }

    fn create_enrollment_fmd(&self, capacity: usize) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        state.calls.create_enrollment_fmd += 1;
        let required = state.required_samples as usize;
        let enrollment = state
            .enrollment
            .as_ref()
            .ok_or_else(|| HardwareError::enrollment("enrollment not started"))?;
        if enrollment.samples.len() < required {
            return Err(HardwareError::enrollment("not enough samples"));
        }
        let template = encode(enrollment.format, &enrollment.samples[0]);
        if capacity < template.len() {
            return Err(HardwareError::more_data(template.len()));
        }
        Ok(template)
    }

    fn finish_enrollment(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.finish_enrollment += 1;
        state.enrollment = None;
        Ok(())
    }
}

/// Handle for scripting a [`MockMatchEngine`].
#[derive(Debug, Clone)]
pub struct MockMatchEngineHandle {
    state: Arc<Mutex<MockEngineState>>,
}

impl MockMatchEngineHandle {
    /// Make the next `compare` calls return these scores, in order.
    pub fn script_scores(&self, scores: impl IntoIterator<Item = u32>) {
        lock(&self.state).scripted_scores.extend(scores);
    }

    /// Make the next `identify` call return exactly these candidates.
    pub fn script_identify(&self, candidates: Vec<Candidate>) {
        lock(&self.state).scripted_identify = Some(candidates);
    }

    /// Make the next `add_to_enrollment` calls fail, in order.
    pub fn script_add_errors(&self, errors: impl IntoIterator<Item = HardwareError>) {
        lock(&self.state).scripted_add_errors.extend(errors);
    }

    /// Make extraction fail until switched back.
    pub fn set_fail_extract(&self, fail: bool) {
        lock(&self.state).fail_extract = fail;
    }

    /// Make `start_enrollment` fail until switched back.
    pub fn set_fail_start_enrollment(&self, fail: bool) {
        lock(&self.state).fail_start_enrollment = fail;
    }

    /// Samples accumulated by the running enrollment.
    pub fn enrolled_samples(&self) -> Option<usize> {
        lock(&self.state)
            .enrollment
            .as_ref()
            .map(|enrollment| enrollment.samples.len())
    }

    /// Mock feature record for `sample`, as extraction would produce it.
    pub fn feature_for(&self, format: FmdFormat, sample: &[u8]) -> Vec<u8> {
        encode(format, sample)
    }

    /// Snapshot of the call counters.
    pub fn calls(&self) -> MockEngineCalls {
        lock(&self.state).calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_requires_sample() {
        let (engine, _handle) = MockMatchEngine::new();
        let result = engine.extract_feature(&CaptureResult::canceled(), FmdFormat::DpVerFeatures);
        assert!(matches!(result, Err(HardwareError::ExtractionFailed { .. })));
    }

    #[test]
    fn test_compare_different_fingers() {
        let (engine, handle) = MockMatchEngine::new();
        let a = handle.feature_for(FmdFormat::DpVerFeatures, &[1, 2]);
        let b = handle.feature_for(FmdFormat::DpRegFeatures, &[3, 4]);
        let score = engine
            .compare(FmdFormat::DpVerFeatures, &a, FmdFormat::DpRegFeatures, &b)
            .unwrap();
        assert_eq!(score, PROBABILITY_ONE);
    }

    #[test]
    fn test_scripted_scores_take_precedence() {
        let (engine, handle) = MockMatchEngine::new();
        handle.script_scores([42]);
        let a = handle.feature_for(FmdFormat::DpVerFeatures, &[1]);
        let score = engine
            .compare(FmdFormat::DpVerFeatures, &a, FmdFormat::DpRegFeatures, &a)
            .unwrap();
        assert_eq!(score, 42);
        let score = engine
            .compare(FmdFormat::DpVerFeatures, &a, FmdFormat::DpRegFeatures, &a)
            .unwrap();
        assert_eq!(score, 0);
    }

    #[test]
    fn test_identify_orders_and_bounds_hits() {
        let (engine, handle) = MockMatchEngine::new();
        let feature = handle.feature_for(FmdFormat::DpVerFeatures, &[9]);
        let templates = vec![
            handle.feature_for(FmdFormat::DpRegFeatures, &[1]),
            handle.feature_for(FmdFormat::DpRegFeatures, &[9]),
            handle.feature_for(FmdFormat::DpRegFeatures, &[9]),
        ];
        let hits = engine
            .identify(
                FmdFormat::DpVerFeatures,
                &feature,
                FmdFormat::DpRegFeatures,
                &templates,
                1000,
                1,
            )
            .unwrap();
        assert_eq!(hits, vec![Candidate::new(1)]);
    }

    #[test]
    fn test_enrollment_flow() {
        let (engine, handle) = MockMatchEngine::with_required_samples(2);
        engine.start_enrollment(FmdFormat::DpRegFeatures).unwrap();

        let sample = handle.feature_for(FmdFormat::DpPreRegFeatures, &[5, 5]);
        assert_eq!(
            engine
                .add_to_enrollment(FmdFormat::DpPreRegFeatures, &sample)
                .unwrap(),
            EnrollProgress::NeedMoreSamples
        );
        assert!(engine.create_enrollment_fmd(64).is_err());
        assert_eq!(
            engine
                .add_to_enrollment(FmdFormat::DpPreRegFeatures, &sample)
                .unwrap(),
            EnrollProgress::Ready
        );

        let err = engine.create_enrollment_fmd(0).unwrap_err();
        assert_eq!(err.required_capacity(), Some(3));
        let template = engine.create_enrollment_fmd(3).unwrap();
        assert_eq!(template, vec![FmdFormat::DpRegFeatures.tag(), 5, 5]);

        engine.finish_enrollment().unwrap();
        assert_eq!(handle.enrolled_samples(), None);
    }

    #[test]
    fn test_start_enrollment_twice_fails() {
        let (engine, _handle) = MockMatchEngine::new();
        engine.start_enrollment(FmdFormat::DpRegFeatures).unwrap();
        assert!(engine.start_enrollment(FmdFormat::DpRegFeatures).is_err());
        engine.finish_enrollment().unwrap();
        assert!(engine.start_enrollment(FmdFormat::DpRegFeatures).is_ok());
    }
}
