//! Labeled per-spike statistics and the tabular spike report.

use crate::{engine::DetectionResult, metrics::SpikeRecord};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Scalar per-spike statistics with their report labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpikeStat {
    ThresholdSec,
    ThresholdMs,
    ThresholdVal,
    ThresholdDvdt,
    PeakMs,
    PeakVal,
    PeakHeight,
    PreMinVal,
    PostMinVal,
    ApDuration,
    EarlyDiastolicDuration,
    EarlyDiastolicRate,
    DiastolicDuration,
    Isi,
    SpikeFreq,
    CycleLength,
    UpstrokeDvdt,
    UpstrokeVm,
    DownstrokeDvdt,
    DownstrokeVm,
}

impl SpikeStat {
    pub const ALL: [SpikeStat; 20] = [
        SpikeStat::ThresholdSec,
        SpikeStat::ThresholdMs,
        SpikeStat::ThresholdVal,
        SpikeStat::ThresholdDvdt,
        SpikeStat::PeakMs,
        SpikeStat::PeakVal,
        SpikeStat::PeakHeight,
        SpikeStat::PreMinVal,
        SpikeStat::PostMinVal,
        SpikeStat::ApDuration,
        SpikeStat::EarlyDiastolicDuration,
        SpikeStat::EarlyDiastolicRate,
        SpikeStat::DiastolicDuration,
        SpikeStat::Isi,
        SpikeStat::SpikeFreq,
        SpikeStat::CycleLength,
        SpikeStat::UpstrokeDvdt,
        SpikeStat::UpstrokeVm,
        SpikeStat::DownstrokeDvdt,
        SpikeStat::DownstrokeVm,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SpikeStat::ThresholdSec => "Take Off Potential (s)",
            SpikeStat::ThresholdMs => "Take Off Potential (ms)",
            SpikeStat::ThresholdVal => "Take Off Potential (mV)",
            SpikeStat::ThresholdDvdt => "Take Off Potential (dV/dt)",
            SpikeStat::PeakMs => "AP Peak (ms)",
            SpikeStat::PeakVal => "AP Peak (mV)",
            SpikeStat::PeakHeight => "AP Height (mV)",
            SpikeStat::PreMinVal => "Pre AP Min (mV)",
            SpikeStat::PostMinVal => "Post AP Min (mV)",
            SpikeStat::ApDuration => "AP Duration (ms)",
            SpikeStat::EarlyDiastolicDuration => "Early Diastolic Duration (ms)",
            SpikeStat::EarlyDiastolicRate => "Early Diastolic Depol Rate (dV/s)",
            SpikeStat::DiastolicDuration => "Diastolic Duration (ms)",
            SpikeStat::Isi => "Inter-Spike-Interval (ms)",
            SpikeStat::SpikeFreq => "Spike Frequency (Hz)",
            SpikeStat::CycleLength => "Cycle Length (ms)",
            SpikeStat::UpstrokeDvdt => "Max AP Upstroke (dV/dt)",
            SpikeStat::UpstrokeVm => "Max AP Upstroke (mV)",
            SpikeStat::DownstrokeDvdt => "Max AP Repolarization (dV/dt)",
            SpikeStat::DownstrokeVm => "Max AP Repolarization (mV)",
        }
    }

    /// Snake-case key, as accepted on the command line.
    pub fn key(&self) -> &'static str {
        match self {
            SpikeStat::ThresholdSec => "threshold_sec",
            SpikeStat::ThresholdMs => "threshold_ms",
            SpikeStat::ThresholdVal => "threshold_val",
            SpikeStat::ThresholdDvdt => "threshold_dvdt",
            SpikeStat::PeakMs => "peak_ms",
            SpikeStat::PeakVal => "peak_val",
            SpikeStat::PeakHeight => "peak_height",
            SpikeStat::PreMinVal => "pre_min_val",
            SpikeStat::PostMinVal => "post_min_val",
            SpikeStat::ApDuration => "ap_duration",
            SpikeStat::EarlyDiastolicDuration => "early_diastolic_duration",
            SpikeStat::EarlyDiastolicRate => "early_diastolic_rate",
            SpikeStat::DiastolicDuration => "diastolic_duration",
            SpikeStat::Isi => "isi",
            SpikeStat::SpikeFreq => "spike_freq",
            SpikeStat::CycleLength => "cycle_length",
            SpikeStat::UpstrokeDvdt => "upstroke_dvdt",
            SpikeStat::UpstrokeVm => "upstroke_vm",
            SpikeStat::DownstrokeDvdt => "downstroke_dvdt",
            SpikeStat::DownstrokeVm => "downstroke_vm",
        }
    }

    pub fn value(&self, spike: &SpikeRecord) -> Option<f64> {
        match self {
            SpikeStat::ThresholdSec => Some(spike.threshold_sec),
            SpikeStat::ThresholdMs => Some(spike.threshold_sec * 1000.0),
            SpikeStat::ThresholdVal => Some(spike.threshold_val),
            SpikeStat::ThresholdDvdt => Some(spike.threshold_dvdt),
            SpikeStat::PeakMs => Some(spike.peak_sec * 1000.0),
            SpikeStat::PeakVal => Some(spike.peak_val),
            SpikeStat::PeakHeight => Some(spike.peak_height),
            SpikeStat::PreMinVal => spike.pre_min.map(|m| m.val),
            SpikeStat::PostMinVal => spike.post_min.map(|m| m.val),
            SpikeStat::ApDuration => spike.ap_duration_ms,
            SpikeStat::EarlyDiastolicDuration => spike.early_diastolic.map(|f| f.duration_ms),
            SpikeStat::EarlyDiastolicRate => spike.early_diastolic.map(|f| f.slope),
            SpikeStat::DiastolicDuration => spike.diastolic_duration_ms,
            SpikeStat::Isi => spike.isi_ms,
            SpikeStat::SpikeFreq => spike.inst_freq_hz,
            SpikeStat::CycleLength => spike.cycle_length_ms,
            SpikeStat::UpstrokeDvdt => spike.upstroke_max.map(|u| u.dvdt),
            SpikeStat::UpstrokeVm => spike.upstroke_max.map(|u| u.voltage),
            SpikeStat::DownstrokeDvdt => spike.downstroke_min.map(|d| d.dvdt),
            SpikeStat::DownstrokeVm => spike.downstroke_min.map(|d| d.voltage),
        }
    }
}

impl fmt::Display for SpikeStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStat(pub String);

impl fmt::Display for UnknownStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown spike statistic: {}", self.0)
    }
}

impl std::error::Error for UnknownStat {}

impl FromStr for SpikeStat {
    type Err = UnknownStat;

    /// Accepts either the key (`peak_val`) or the label (`AP Peak (mV)`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpikeStat::ALL
            .iter()
            .copied()
            .find(|stat| stat.key() == s || stat.label() == s)
            .ok_or_else(|| UnknownStat(s.to_string()))
    }
}

/// x/y values of two statistics, one pair per spike. Unavailable values stay `None`.
pub fn stat_pairs(
    result: &DetectionResult,
    x: SpikeStat,
    y: SpikeStat,
) -> Vec<(Option<f64>, Option<f64>)> {
    result
        .spikes
        .iter()
        .map(|spike| (x.value(spike), y.value(spike)))
        .collect()
}

/// One row per spike, one column per statistic and per configured width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeReport {
    pub headers: Vec<String>,
    /// Unavailable values are empty strings.
    pub rows: Vec<Vec<String>>,
}

impl SpikeReport {
    /// Build the report, keeping spikes whose threshold time (s) lies in
    /// `window_s` (inclusive) when a window is given.
    pub fn build(result: &DetectionResult, window_s: Option<(f64, f64)>) -> Self {
        let fractions = &result.config.half_height_fractions;
        let mut headers: Vec<String> = vec!["Spike".to_string()];
        headers.extend(SpikeStat::ALL.iter().map(|s| s.label().to_string()));
        headers.extend(fractions.iter().map(|h| format!("Width {} (ms)", h)));
        headers.push("Error Count".to_string());
        headers.push("Errors".to_string());

        let rows = result
            .spikes
            .iter()
            .filter(|spike| match window_s {
                Some((min, max)) => spike.threshold_sec >= min && spike.threshold_sec <= max,
                None => true,
            })
            .map(|spike| {
                let mut row = vec![spike.spike_index.to_string()];
                row.extend(SpikeStat::ALL.iter().map(|s| cell(s.value(spike))));
                row.extend(
                    fractions
                        .iter()
                        .map(|&h| cell(spike.width(h).and_then(|w| w.width_ms))),
                );
                row.push(spike.error_count.to_string());
                row.push(spike.errors.join("; "));
                row
            })
            .collect();

        Self { headers, rows }
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
