use crate::{
    config::DetectionConfig,
    detectors::{backtrack, refractory, DetectionStrategy},
    error::{DetectionError, Result},
    metrics::{self, SpikeClips, SpikeRecord},
    preprocess,
    signal::Recording,
};
use log::debug;
use serde::{Deserialize, Serialize};

/// Everything one `detect` call produces. Built fresh on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub sample_rate_khz: f64,
    pub sample_count: usize,
    pub strategy: DetectionStrategy,
    pub config: DetectionConfig,
    /// Median width actually applied (0 = off)
    pub median_filter_width: usize,
    pub filtered_voltage: Vec<f64>,
    pub derivative: Vec<f64>,
    /// Refractory-filtered dV/dt crossings before backtracking, for display only.
    /// `None` in voltage mode.
    pub threshold_times: Option<Vec<usize>>,
    /// Authoritative spike times (points)
    pub spike_times: Vec<usize>,
    pub spikes: Vec<SpikeRecord>,
    pub clips: Option<SpikeClips>,
}

impl DetectionResult {
    pub fn num_spikes(&self) -> usize {
        self.spikes.len()
    }

    /// Recoverable errors recorded across all spikes.
    pub fn error_count(&self) -> usize {
        self.spikes.iter().map(|s| s.error_count).sum()
    }

    /// Every recorded error message with the index of the spike it belongs to.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &str)> + '_ {
        self.spikes
            .iter()
            .flat_map(|s| s.errors.iter().map(move |e| (s.spike_index, e.as_str())))
    }
}

/// Detect spikes in `recording` and measure each one.
///
/// Fails only on invalid input or configuration; problems with individual
/// spikes are recorded on the spike records instead.
pub fn detect(recording: &Recording, cfg: &DetectionConfig) -> Result<DetectionResult> {
    let rate = recording.sample_rate_khz;
    if !(rate > 0.0 && rate.is_finite()) {
        return Err(DetectionError::InvalidSampleRate(rate));
    }
    if recording.len() < 2 {
        return Err(DetectionError::TooFewSamples(recording.len()));
    }
    cfg.validate()?;

    let tb = recording.timebase();
    let pre = preprocess::compute(&recording.voltage, rate, cfg.median_filter_width);
    let strategy = DetectionStrategy::from_config(cfg);
    let candidates = strategy.locate(&pre.voltage, &pre.derivative, tb, cfg);

    let (threshold_times, spike_times, backtrack_issues) = if strategy.needs_refinement() {
        let kept = refractory::filter(&candidates, tb.ms_to_points(cfg.refractory_ms));
        debug!(
            "refractory filter kept {} of {} candidate(s)",
            kept.len(),
            candidates.len()
        );
        let refined = backtrack::refine_all(
            &kept,
            &pre.derivative,
            tb.ms_to_points(cfg.pre_upstroke_window_ms),
            cfg.percent_of_max_for_threshold,
        );
        (Some(kept), refined.spike_times, refined.issues)
    } else {
        (None, candidates, Vec::new())
    };

    let mut spikes = metrics::extract(&spike_times, &pre.voltage, &pre.derivative, tb, cfg);
    for (record, issue) in spikes.iter_mut().zip(backtrack_issues) {
        record.prepend_issues(issue);
    }
    let clips = cfg
        .clip_width_ms
        .map(|width| metrics::extract_clips(&spike_times, &pre.voltage, tb, width));

    let result = DetectionResult {
        sample_rate_khz: rate,
        sample_count: recording.len(),
        strategy,
        config: cfg.clone(),
        median_filter_width: pre.median_filter_width,
        filtered_voltage: pre.voltage,
        derivative: pre.derivative,
        threshold_times,
        spike_times,
        spikes,
        clips,
    };
    debug!(
        "detected {} spike(s) with {} recoverable error(s)",
        result.num_spikes(),
        result.error_count()
    );
    Ok(result)
}
