//! Raw threshold-crossing candidates, located either on dV/dt or on voltage.

use crate::{config::DetectionConfig, search, signal::Timebase};
use log::debug;
use serde::{Deserialize, Serialize};

/// How candidate spike onsets are found.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DetectionStrategy {
    /// dV/dt crosses `dvdt_threshold`; candidates are refractory-filtered and
    /// backtracked afterwards.
    Derivative { dvdt_threshold: f64 },
    /// Voltage crosses `min_spike_vm` on a rising edge; the crossing is final.
    Voltage,
}

impl DetectionStrategy {
    pub fn from_config(cfg: &DetectionConfig) -> Self {
        match cfg.dvdt_threshold {
            Some(dvdt_threshold) => DetectionStrategy::Derivative { dvdt_threshold },
            None => DetectionStrategy::Voltage,
        }
    }

    /// Whether candidates still need refractory filtering and threshold backtracking.
    pub fn needs_refinement(&self) -> bool {
        matches!(self, DetectionStrategy::Derivative { .. })
    }

    /// Ordered candidate indices inside the configured analysis window.
    pub fn locate(
        &self,
        voltage: &[f64],
        derivative: &[f64],
        tb: Timebase,
        cfg: &DetectionConfig,
    ) -> Vec<usize> {
        let window = analysis_window(voltage.len(), tb, cfg);
        match *self {
            DetectionStrategy::Derivative { dvdt_threshold } => {
                let crossings = in_window(run_starts_above(derivative, dvdt_threshold), window);
                let peak_points = tb.ms_to_points(cfg.peak_window_ms);
                let accepted: Vec<usize> = crossings
                    .iter()
                    .copied()
                    .filter(|&t| reaches_min_vm(voltage, t, peak_points, cfg.min_spike_vm))
                    .collect();
                debug!(
                    "dV/dt > {}: {} crossing(s), {} reach {} mV",
                    dvdt_threshold,
                    crossings.len(),
                    accepted.len(),
                    cfg.min_spike_vm
                );
                accepted
            }
            DetectionStrategy::Voltage => {
                let crossings = in_window(run_starts_above(voltage, cfg.min_spike_vm), window);
                let min_isi = tb.ms_to_points(cfg.min_isi_ms);
                let mut accepted: Vec<usize> = Vec::new();
                for &t in &crossings {
                    if !is_rising_edge(voltage, t, cfg.edge_window_points) {
                        continue;
                    }
                    if let Some(&last) = accepted.last() {
                        if t - last < min_isi {
                            continue;
                        }
                    }
                    accepted.push(t);
                }
                debug!(
                    "Vm > {}: {} crossing(s), {} accepted rising edge(s)",
                    cfg.min_spike_vm,
                    crossings.len(),
                    accepted.len()
                );
                accepted
            }
        }
    }
}

/// Inclusive [start, stop] point window from the configured seconds.
fn analysis_window(len: usize, tb: Timebase, cfg: &DetectionConfig) -> (usize, usize) {
    let start = cfg.start_s.map(|s| tb.seconds_to_points(s)).unwrap_or(0);
    let stop = cfg
        .stop_s
        .map(|s| tb.seconds_to_points(s))
        .unwrap_or(usize::MAX)
        .min(len.saturating_sub(1));
    (start, stop)
}

fn in_window(indices: Vec<usize>, (start, stop): (usize, usize)) -> Vec<usize> {
    indices
        .into_iter()
        .filter(|&i| i >= start && i <= stop)
        .collect()
}

/// First index of every maximal run of samples strictly above `level`.
pub fn run_starts_above(trace: &[f64], level: f64) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut inside = false;
    for (i, &x) in trace.iter().enumerate() {
        let above = x > level;
        if above && !inside {
            starts.push(i);
        }
        inside = above;
    }
    starts
}

fn reaches_min_vm(voltage: &[f64], t: usize, peak_points: usize, min_spike_vm: f64) -> bool {
    match search::argmax(voltage, t..t.saturating_add(peak_points)) {
        Some((_, peak)) => peak > min_spike_vm,
        None => true,
    }
}

/// Mean after the crossing exceeds mean before it. A side clamped to nothing accepts.
fn is_rising_edge(voltage: &[f64], t: usize, edge_points: usize) -> bool {
    let before = search::mean(voltage, t.saturating_sub(edge_points)..t);
    let after = search::mean(voltage, t + 1..(t + 1).saturating_add(edge_points));
    match (before, after) {
        (Some(pre), Some(post)) => post > pre,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_train(len: usize, onsets: &[usize], rise: usize, amp: f64, base: f64) -> Vec<f64> {
        let mut v = vec![base; len];
        for &onset in onsets {
            for k in 0..=2 * rise {
                let idx = onset + k;
                if idx >= len {
                    break;
                }
                let frac = if k <= rise {
                    k as f64 / rise as f64
                } else {
                    (2 * rise - k) as f64 / rise as f64
                };
                v[idx] = base + (amp - base) * frac;
            }
        }
        v
    }

    fn derivative(v: &[f64], rate: f64) -> Vec<f64> {
        crate::preprocess::compute(v, rate, 0).derivative
    }

    #[test]
    fn runs_collapse_to_first_member() {
        let trace = [0.0, 5.0, 6.0, 0.0, 0.0, 9.0, 9.0, 9.0, 0.0, 7.0];
        assert_eq!(run_starts_above(&trace, 1.0), vec![1, 5, 9]);
        assert_eq!(run_starts_above(&[2.0, 2.0, 0.0], 1.0), vec![0]);
        assert!(run_starts_above(&[0.0; 5], 1.0).is_empty());
    }

    #[test]
    fn derivative_mode_requires_peak_above_min_vm() {
        let tb = Timebase::new(10.0);
        let mut v = pulse_train(1000, &[100], 20, 50.0, 0.0);
        // small bump that crosses the dV/dt threshold but never reaches minSpikeVm
        for k in 0..4 {
            v[600 + k] = -40.0 + 3.0 * k as f64;
        }
        for x in v.iter_mut() {
            if *x == 0.0 {
                *x = -50.0;
            }
        }
        let d = derivative(&v, 10.0);
        let cfg = DetectionConfig {
            dvdt_threshold: Some(5.0),
            min_spike_vm: -20.0,
            ..DetectionConfig::default()
        };
        let strategy = DetectionStrategy::from_config(&cfg);
        let found = strategy.locate(&v, &d, tb, &cfg);
        assert_eq!(found, vec![101]);
    }

    #[test]
    fn window_restricts_candidates() {
        let tb = Timebase::new(10.0);
        let v = pulse_train(4000, &[500, 2500], 20, 50.0, 0.0);
        let d = derivative(&v, 10.0);
        let cfg = DetectionConfig {
            dvdt_threshold: Some(5.0),
            start_s: Some(0.1),
            stop_s: Some(0.3),
            ..DetectionConfig::default()
        };
        let found = DetectionStrategy::from_config(&cfg).locate(&v, &d, tb, &cfg);
        assert_eq!(found, vec![2501]);
    }

    #[test]
    fn voltage_mode_keeps_rising_edges_and_min_isi() {
        let tb = Timebase::new(1.0);
        // onsets 100 and 130 are closer than min_isi (75 ms at 1 pt/ms)
        let v = pulse_train(600, &[100, 130, 400], 10, 20.0, -60.0);
        let d = derivative(&v, 1.0);
        let cfg = DetectionConfig::voltage_mode(-20.0);
        let strategy = DetectionStrategy::from_config(&cfg);
        assert!(!strategy.needs_refinement());
        let found = strategy.locate(&v, &d, tb, &cfg);
        assert_eq!(found.len(), 2);
        assert!(found[0] > 100 && found[0] < 110);
        assert!(found[1] > 400 && found[1] < 410);
    }

    #[test]
    fn voltage_mode_rejects_falling_crossing() {
        let tb = Timebase::new(1.0);
        let cfg = DetectionConfig::voltage_mode(0.0);
        // brief dip below 0 at index 10, re-crossing at 11 on the way down
        let mut v = vec![30.0; 10];
        v.push(-5.0);
        v.push(1.0);
        v.extend(std::iter::repeat(-50.0).take(30));
        let d = derivative(&v, 1.0);
        // index 0 has no samples before it, so the clamped window accepts it
        assert_eq!(DetectionStrategy::Voltage.locate(&v, &d, tb, &cfg), vec![0]);
    }

    #[test]
    fn no_crossings_is_empty_not_error() {
        let tb = Timebase::new(10.0);
        let v = vec![-70.0; 500];
        let d = derivative(&v, 10.0);
        let cfg = DetectionConfig::default();
        assert!(DetectionStrategy::from_config(&cfg)
            .locate(&v, &d, tb, &cfg)
            .is_empty());
        assert!(DetectionStrategy::Voltage.locate(&v, &d, tb, &cfg).is_empty());
    }
}
