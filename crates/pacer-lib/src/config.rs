use crate::error::{DetectionError, Result};
use serde::{Deserialize, Serialize};

/// Fractional span of the preMin→threshold interval used for the early diastolic fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitRange {
    pub start: f64,
    pub stop: f64,
}

impl Default for FitRange {
    fn default() -> Self {
        Self {
            start: 0.1,
            stop: 0.5,
        }
    }
}

/// Parameters for spike detection and per-spike feature extraction.
///
/// Omitted fields take their `Default` value when deserialized; values that are
/// present but invalid are rejected by [`DetectionConfig::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// dV/dt threshold (mV/ms). `None` selects voltage-threshold detection.
    pub dvdt_threshold: Option<f64>,
    /// Minimum peak voltage for a candidate to count as a spike (mV).
    pub min_spike_vm: f64,
    /// Centered median filter width in points, 0 disables. Even values are bumped to odd.
    pub median_filter_width: usize,
    /// Heights (percent of postMin→peak) at which widths are measured.
    pub half_height_fractions: Vec<f64>,
    /// Analysis window start (seconds).
    pub start_s: Option<f64>,
    /// Analysis window stop (seconds).
    pub stop_s: Option<f64>,
    /// Minimum spacing between derivative-mode candidates (ms).
    pub refractory_ms: f64,
    /// Look-ahead after a threshold point for the AP peak (ms).
    pub peak_window_ms: f64,
    /// Window centered on a raw minimum that is averaged into preMin/postMin (ms).
    pub avg_window_ms: f64,
    /// Back-search window before a candidate for the dV/dt maximum (ms).
    pub pre_upstroke_window_ms: f64,
    /// Fraction of the back-search dV/dt maximum that marks the true threshold.
    pub percent_of_max_for_threshold: f64,
    /// Minimum spacing between voltage-mode spikes (ms).
    pub min_isi_ms: f64,
    /// Points averaged before/after a voltage-mode crossing to confirm a rising edge.
    pub edge_window_points: usize,
    /// Window after the peak searched for the maximum repolarization rate (ms).
    pub post_spike_window_ms: f64,
    pub early_diastolic_fit: FitRange,
    /// Width of the voltage clip centered on each spike (ms). `None` disables clips.
    pub clip_width_ms: Option<f64>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            dvdt_threshold: Some(100.0),
            min_spike_vm: -20.0,
            median_filter_width: 0,
            half_height_fractions: vec![20.0, 50.0, 80.0],
            start_s: None,
            stop_s: None,
            refractory_ms: 20.0,
            peak_window_ms: 10.0,
            avg_window_ms: 5.0,
            pre_upstroke_window_ms: 2.0,
            percent_of_max_for_threshold: 0.10,
            min_isi_ms: 75.0,
            edge_window_points: 10,
            post_spike_window_ms: 10.0,
            early_diastolic_fit: FitRange::default(),
            clip_width_ms: Some(500.0),
        }
    }
}

impl DetectionConfig {
    /// Voltage-threshold detection with otherwise default parameters.
    pub fn voltage_mode(min_spike_vm: f64) -> Self {
        Self {
            dvdt_threshold: None,
            min_spike_vm,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.half_height_fractions.is_empty() {
            return Err(DetectionError::EmptyHeightFractions);
        }
        if let Some(&bad) = self
            .half_height_fractions
            .iter()
            .find(|&&h| !(h > 0.0 && h < 100.0))
        {
            return Err(DetectionError::HeightFractionOutOfRange(bad));
        }
        if let Some(threshold) = self.dvdt_threshold {
            if !threshold.is_finite() {
                return Err(DetectionError::InvalidDvdtThreshold(threshold));
            }
        }
        positive("peak_window_ms", self.peak_window_ms)?;
        positive("pre_upstroke_window_ms", self.pre_upstroke_window_ms)?;
        positive("post_spike_window_ms", self.post_spike_window_ms)?;
        if let Some(clip) = self.clip_width_ms {
            positive("clip_width_ms", clip)?;
        }
        non_negative("refractory_ms", self.refractory_ms)?;
        non_negative("avg_window_ms", self.avg_window_ms)?;
        non_negative("min_isi_ms", self.min_isi_ms)?;
        if let Some(start) = self.start_s {
            non_negative("start_s", start)?;
        }
        if let Some(stop) = self.stop_s {
            non_negative("stop_s", stop)?;
        }
        if let (Some(start), Some(stop)) = (self.start_s, self.stop_s) {
            if start >= stop {
                return Err(DetectionError::InvertedWindow { start, stop });
            }
        }
        let pct = self.percent_of_max_for_threshold;
        if !(pct > 0.0 && pct <= 1.0) {
            return Err(DetectionError::PercentOfMaxOutOfRange(pct));
        }
        let FitRange { start, stop } = self.early_diastolic_fit;
        if !(start >= 0.0 && start < stop && stop <= 1.0) {
            return Err(DetectionError::InvalidFitRange { start, stop });
        }
        Ok(())
    }

}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DetectionError::NonPositiveWindow { name, value })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(DetectionError::NegativeValue { name, value })
    }
}
