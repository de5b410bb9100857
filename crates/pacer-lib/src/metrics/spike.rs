//! Per-spike measurements: peak, pre/post minima, early diastolic slope,
//! upstroke/downstroke rates, intervals and widths.
//!
//! Neighbor-relative fields need the previous and next spike, so the first and
//! last spike only carry threshold and peak values. Problems inside one spike
//! are recorded on that spike's `errors` and never stop the pass.

use crate::{
    config::DetectionConfig, error::ExtractionIssue, metrics::fit::linear_fit, search,
    signal::Timebase,
};
use log::trace;
use serde::{Deserialize, Serialize};

/// A minimum located by averaging around the raw extremum, then re-searching
/// for where the trace crosses that average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageMinimum {
    pub point: usize,
    /// Averaged minimum voltage (mV)
    pub val: f64,
}

/// Linear fit of voltage against time over the early diastolic depolarization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarlyDiastolicFit {
    pub start_point: usize,
    pub stop_point: usize,
    pub start_val: f64,
    pub stop_val: f64,
    /// mV/s
    pub slope: f64,
    pub duration_ms: f64,
}

/// Extremum of dV/dt with the voltage at the same point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateExtremum {
    pub point: usize,
    pub voltage: f64,
    pub dvdt: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeWidth {
    /// Percent of the postMin→peak amplitude
    pub height_fraction: f64,
    pub rising_point: Option<usize>,
    pub rising_val: Option<f64>,
    pub falling_point: Option<usize>,
    pub falling_val: Option<f64>,
    pub width_points: Option<usize>,
    pub width_ms: Option<f64>,
}

impl SpikeWidth {
    fn unavailable(height_fraction: f64) -> Self {
        Self {
            height_fraction,
            rising_point: None,
            rising_val: None,
            falling_point: None,
            falling_val: None,
            width_points: None,
            width_ms: None,
        }
    }
}

/// All measurements of one detected spike. `None` means unavailable, not zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeRecord {
    pub spike_index: usize,
    pub threshold_point: usize,
    pub threshold_sec: f64,
    pub threshold_val: f64,
    pub threshold_dvdt: f64,
    pub peak_point: usize,
    pub peak_sec: f64,
    pub peak_val: f64,
    pub peak_height: f64,
    pub pre_min: Option<VoltageMinimum>,
    pub post_min: Option<VoltageMinimum>,
    pub early_diastolic: Option<EarlyDiastolicFit>,
    pub upstroke_max: Option<RateExtremum>,
    pub downstroke_min: Option<RateExtremum>,
    pub isi_points: Option<usize>,
    pub isi_ms: Option<f64>,
    pub inst_freq_hz: Option<f64>,
    pub cycle_length_points: Option<isize>,
    pub cycle_length_ms: Option<f64>,
    pub ap_duration_ms: Option<f64>,
    pub diastolic_duration_ms: Option<f64>,
    pub widths: Vec<SpikeWidth>,
    pub error_count: usize,
    pub errors: Vec<String>,
}

impl SpikeRecord {
    /// Width entry for `height_fraction`, if that fraction was configured.
    pub fn width(&self, height_fraction: f64) -> Option<&SpikeWidth> {
        self.widths
            .iter()
            .find(|w| w.height_fraction == height_fraction)
    }

    pub fn push_issue(&mut self, issue: ExtractionIssue) {
        trace!("{}", issue);
        self.errors.push(issue.to_string());
        self.error_count = self.errors.len();
    }

    /// Put issues raised before extraction (e.g. during backtracking) ahead of the rest.
    pub fn prepend_issues<I>(&mut self, issues: I)
    where
        I: IntoIterator<Item = ExtractionIssue>,
    {
        let earlier: Vec<String> = issues
            .into_iter()
            .inspect(|issue| trace!("{}", issue))
            .map(|issue| issue.to_string())
            .collect();
        self.errors.splice(0..0, earlier);
        self.error_count = self.errors.len();
    }
}

/// Measure every spike in `spike_times`. The output has one record per spike time.
///
/// # Panics
/// If a spike time is not a valid index into `voltage`.
pub fn extract(
    spike_times: &[usize],
    voltage: &[f64],
    derivative: &[f64],
    tb: Timebase,
    cfg: &DetectionConfig,
) -> Vec<SpikeRecord> {
    // window sizes never exceed the trace, so index arithmetic cannot overflow
    let len = voltage.len();
    let measurer = SpikeMeasurer {
        spike_times,
        voltage,
        derivative,
        tb,
        cfg,
        peak_points: tb.ms_to_points(cfg.peak_window_ms).clamp(1, len.max(1)),
        avg_half_points: (tb.ms_to_points(cfg.avg_window_ms) / 2).min(len),
        post_spike_points: tb.ms_to_points(cfg.post_spike_window_ms).min(len),
    };
    let mut records: Vec<SpikeRecord> = (0..spike_times.len())
        .map(|i| measurer.measure(i))
        .collect();

    // cycle length runs postMin to postMin, so it needs the previous record
    let last = spike_times.len().saturating_sub(1);
    for i in 2..last {
        match (records[i - 1].post_min, records[i].post_min) {
            (Some(prev), Some(cur)) => {
                records[i].cycle_length_points = Some(cur.point as isize - prev.point as isize);
                records[i].cycle_length_ms = Some(tb.elapsed_ms(prev.point, cur.point));
            }
            _ => records[i].push_issue(ExtractionIssue::NeighborUnavailable {
                spike: i,
                field: "cycle length",
            }),
        }
    }
    records
}

struct SpikeMeasurer<'a> {
    spike_times: &'a [usize],
    voltage: &'a [f64],
    derivative: &'a [f64],
    tb: Timebase,
    cfg: &'a DetectionConfig,
    peak_points: usize,
    avg_half_points: usize,
    post_spike_points: usize,
}

impl SpikeMeasurer<'_> {
    fn measure(&self, i: usize) -> SpikeRecord {
        let v = self.voltage;
        let t = self.spike_times[i];
        let (peak_point, peak_val) =
            search::argmax(v, t..t + self.peak_points).unwrap_or((t, v[t]));
        let mut record = SpikeRecord {
            spike_index: i,
            threshold_point: t,
            threshold_sec: self.tb.point_to_seconds(t),
            threshold_val: v[t],
            threshold_dvdt: self.derivative[t],
            peak_point,
            peak_sec: self.tb.point_to_seconds(peak_point),
            peak_val,
            peak_height: peak_val - v[t],
            pre_min: None,
            post_min: None,
            early_diastolic: None,
            upstroke_max: None,
            downstroke_min: None,
            isi_points: None,
            isi_ms: None,
            inst_freq_hz: None,
            cycle_length_points: None,
            cycle_length_ms: None,
            ap_duration_ms: None,
            diastolic_duration_ms: None,
            widths: self
                .cfg
                .half_height_fractions
                .iter()
                .map(|&h| SpikeWidth::unavailable(h))
                .collect(),
            error_count: 0,
            errors: Vec::new(),
        };
        if i == 0 || i + 1 >= self.spike_times.len() {
            return record;
        }

        let mut issues = Vec::new();
        let pre_min = self.pre_min(i, &mut issues);
        let post_min = self.post_min(i, &mut issues);
        record.early_diastolic = pre_min.and_then(|pre| self.early_diastolic(i, pre, &mut issues));
        record.upstroke_max = self.upstroke(i, peak_point, &mut issues);
        record.downstroke_min = self.downstroke(i, peak_point, &mut issues);

        if i >= 2 {
            let prev = self.spike_times[i - 1];
            match t.checked_sub(prev) {
                Some(isi) => {
                    let isi_ms = self.tb.points_to_ms(isi as f64);
                    record.isi_points = Some(isi);
                    record.isi_ms = Some(isi_ms);
                    record.inst_freq_hz = (isi_ms > 0.0).then(|| 1000.0 / isi_ms);
                }
                None => issues.push(ExtractionIssue::NeighborUnavailable {
                    spike: i,
                    field: "inter-spike interval",
                }),
            }
        }
        record.ap_duration_ms = post_min.map(|post| self.tb.elapsed_ms(t, post.point));
        record.diastolic_duration_ms = pre_min.map(|pre| self.tb.elapsed_ms(pre.point, t));
        record.widths = self.widths(i, peak_point, peak_val, pre_min, post_min, &mut issues);
        record.pre_min = pre_min;
        record.post_min = post_min;

        for issue in issues {
            record.push_issue(issue);
        }
        record
    }

    /// Average of the voltage centered on `raw`, or the raw value when the window is empty.
    fn averaged(&self, raw: usize) -> f64 {
        let half = self.avg_half_points;
        search::mean(self.voltage, raw.saturating_sub(half)..raw + half)
            .unwrap_or(self.voltage[raw])
    }

    fn pre_min(&self, i: usize, issues: &mut Vec<ExtractionIssue>) -> Option<VoltageMinimum> {
        let (prev, t) = (self.spike_times[i - 1], self.spike_times[i]);
        let Some((raw, _)) = search::argmin(self.voltage, prev..t) else {
            issues.push(ExtractionIssue::EmptyWindow {
                spike: i,
                window: "pre-spike",
            });
            return None;
        };
        let val = self.averaged(raw);
        let point = match search::last_below(self.voltage, raw..t, val) {
            Some(below) => below + 1,
            None => {
                issues.push(ExtractionIssue::PreMinNotFound {
                    spike: i,
                    target: val,
                });
                raw
            }
        };
        Some(VoltageMinimum { point, val })
    }

    fn post_min(&self, i: usize, issues: &mut Vec<ExtractionIssue>) -> Option<VoltageMinimum> {
        let (t, next) = (self.spike_times[i], self.spike_times[i + 1]);
        let Some((raw, _)) = search::argmin(self.voltage, t..next) else {
            issues.push(ExtractionIssue::EmptyWindow {
                spike: i,
                window: "post-spike",
            });
            return None;
        };
        let val = self.averaged(raw);
        let point = match search::first_below(self.voltage, t..raw, val) {
            Some(point) => point,
            None => {
                issues.push(ExtractionIssue::PostMinNotFound {
                    spike: i,
                    target: val,
                });
                raw
            }
        };
        Some(VoltageMinimum { point, val })
    }

    fn early_diastolic(
        &self,
        i: usize,
        pre: VoltageMinimum,
        issues: &mut Vec<ExtractionIssue>,
    ) -> Option<EarlyDiastolicFit> {
        let t = self.spike_times[i];
        let interval = t.saturating_sub(pre.point) as f64;
        let range = self.cfg.early_diastolic_fit;
        let p0 = pre.point + (interval * range.start).floor() as usize;
        let p1 = pre.point + (interval * range.stop).floor() as usize;
        let fit_window = search::clamp(p0, p1, self.voltage.len());
        let x: Vec<f64> = fit_window
            .clone()
            .map(|p| self.tb.point_to_seconds(p))
            .collect();
        let fit = linear_fit(&x, &self.voltage[fit_window.clone()]);
        match (fit, self.voltage.get(p1)) {
            (Some(fit), Some(&stop_val)) => Some(EarlyDiastolicFit {
                start_point: p0,
                stop_point: p1,
                start_val: self.voltage[p0],
                stop_val,
                slope: fit.slope,
                duration_ms: self.tb.elapsed_ms(p0, p1),
            }),
            _ => {
                issues.push(ExtractionIssue::EarlyDiastolicFit {
                    spike: i,
                    points: fit_window.len(),
                });
                None
            }
        }
    }

    fn upstroke(
        &self,
        i: usize,
        peak_point: usize,
        issues: &mut Vec<ExtractionIssue>,
    ) -> Option<RateExtremum> {
        let t = self.spike_times[i];
        match search::argmax(self.derivative, t..peak_point + 1) {
            Some((point, dvdt)) => Some(RateExtremum {
                point,
                voltage: self.voltage[point],
                dvdt,
            }),
            None => {
                issues.push(ExtractionIssue::UpstrokeNotFound { spike: i });
                None
            }
        }
    }

    /// Searched from the peak, not from the threshold point.
    fn downstroke(
        &self,
        i: usize,
        peak_point: usize,
        issues: &mut Vec<ExtractionIssue>,
    ) -> Option<RateExtremum> {
        match search::argmin(self.derivative, peak_point..peak_point + self.post_spike_points) {
            Some((point, dvdt)) => Some(RateExtremum {
                point,
                voltage: self.voltage[point],
                dvdt,
            }),
            None => {
                issues.push(ExtractionIssue::EmptyWindow {
                    spike: i,
                    window: "downstroke",
                });
                None
            }
        }
    }

    fn widths(
        &self,
        i: usize,
        peak_point: usize,
        peak_val: f64,
        pre: Option<VoltageMinimum>,
        post: Option<VoltageMinimum>,
        issues: &mut Vec<ExtractionIssue>,
    ) -> Vec<SpikeWidth> {
        let v = self.voltage;
        self.cfg
            .half_height_fractions
            .iter()
            .map(|&h| {
                let mut width = SpikeWidth::unavailable(h);
                let crossing = pre.zip(post).and_then(|(pre, post)| {
                    let target = post.val + (peak_val - post.val) * h / 100.0;
                    let falling = search::first_below(v, peak_point..post.point, target)?;
                    let rising = search::first_above(v, pre.point..peak_point, v[falling])?;
                    Some((rising, falling))
                });
                match crossing {
                    Some((rising, falling)) => {
                        let points = falling - rising;
                        width.rising_point = Some(rising);
                        width.rising_val = Some(v[rising]);
                        width.falling_point = Some(falling);
                        width.falling_val = Some(v[falling]);
                        width.width_points = Some(points);
                        width.width_ms = Some(self.tb.points_to_ms(points as f64));
                    }
                    None => issues.push(ExtractionIssue::WidthNotFound {
                        spike: i,
                        fraction: h,
                    }),
                }
                width
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess;

    const RATE: f64 = 10.0;
    const DIASTOLE: usize = 500;
    const UPSTROKE: usize = 20;
    const REPOL: usize = 160;
    const CYCLE: usize = DIASTOLE + UPSTROKE + REPOL;

    /// Sinoatrial-like cycles: -60 → -40 mV slow ramp, fast rise to +20 mV,
    /// linear repolarization back to -60 mV.
    fn pacemaker_trace(cycles: usize) -> (Vec<f64>, Vec<usize>) {
        let v = (0..cycles * CYCLE)
            .map(|i| {
                let j = i % CYCLE;
                if j < DIASTOLE {
                    -60.0 + 20.0 * j as f64 / DIASTOLE as f64
                } else if j < DIASTOLE + UPSTROKE {
                    -40.0 + 60.0 * (j - DIASTOLE) as f64 / UPSTROKE as f64
                } else {
                    20.0 - 80.0 * (j - DIASTOLE - UPSTROKE) as f64 / REPOL as f64
                }
            })
            .collect();
        let spikes = (0..cycles).map(|k| k * CYCLE + DIASTOLE).collect();
        (v, spikes)
    }

    fn run(cycles: usize, cfg: &DetectionConfig) -> (Vec<usize>, Vec<SpikeRecord>) {
        let (v, spikes) = pacemaker_trace(cycles);
        let pre = preprocess::compute(&v, RATE, 0);
        let records = extract(&spikes, &pre.voltage, &pre.derivative, Timebase::new(RATE), cfg);
        (spikes, records)
    }

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn one_record_per_spike_time() {
        let cfg = DetectionConfig::default();
        for cycles in [1, 2, 3, 6] {
            let (spikes, records) = run(cycles, &cfg);
            assert_eq!(records.len(), spikes.len());
            for (i, r) in records.iter().enumerate() {
                assert_eq!(r.spike_index, i);
                assert_eq!(r.threshold_point, spikes[i]);
            }
        }
    }

    #[test]
    fn boundary_spikes_only_carry_threshold_and_peak() {
        let cfg = DetectionConfig::default();
        let (_, records) = run(5, &cfg);
        for r in [&records[0], &records[4]] {
            assert!(close(r.peak_val, 20.0, 1e-9));
            assert!(r.pre_min.is_none() && r.post_min.is_none());
            assert!(r.isi_ms.is_none() && r.cycle_length_ms.is_none());
            assert!(r.upstroke_max.is_none() && r.early_diastolic.is_none());
            assert_eq!(r.widths.len(), 3);
            assert!(r.widths.iter().all(|w| w.width_ms.is_none()));
            assert!(r.errors.is_empty());
            assert_eq!(r.error_count, 0);
        }
    }

    #[test]
    fn interior_features_match_waveform() {
        let cfg = DetectionConfig::default();
        let (spikes, records) = run(5, &cfg);
        let r = &records[2];
        let t = spikes[2];
        let cycle_start = t - DIASTOLE;
        assert!(r.errors.is_empty(), "{:?}", r.errors);

        assert_eq!(r.peak_point, t + UPSTROKE);
        assert!(close(r.threshold_val, -40.0, 1e-9));
        assert!(close(r.peak_height, 60.0, 1e-9));

        let pre = r.pre_min.unwrap();
        assert_eq!(pre.point, cycle_start + 88);
        assert!(close(pre.val, -56.51, 1e-9));
        let post = r.post_min.unwrap();
        assert_eq!(post.point, t + UPSTROKE + 154);

        let fit = r.early_diastolic.unwrap();
        assert_eq!(fit.start_point, cycle_start + 129);
        assert_eq!(fit.stop_point, cycle_start + 294);
        assert!(close(fit.slope, 400.0, 1e-6));
        assert!(close(fit.duration_ms, 16.5, 1e-9));

        let up = r.upstroke_max.unwrap();
        assert_eq!(up.point, t + 1);
        assert!(close(up.dvdt, 30.0, 1e-6));
        let down = r.downstroke_min.unwrap();
        assert_eq!(down.point, t + UPSTROKE + 1);
        assert!(close(down.dvdt, -5.0, 1e-6));

        assert_eq!(r.isi_points, Some(CYCLE));
        assert!(close(r.isi_ms.unwrap(), 68.0, 1e-9));
        assert!(close(r.inst_freq_hz.unwrap(), 1000.0 / 68.0, 1e-9));
        assert_eq!(r.cycle_length_points, Some(CYCLE as isize));
        assert!(close(r.cycle_length_ms.unwrap(), 68.0, 1e-9));
        assert!(close(r.ap_duration_ms.unwrap(), 17.4, 1e-9));
        assert!(close(r.diastolic_duration_ms.unwrap(), 41.2, 1e-9));

        let half = r.width(50.0).unwrap();
        assert_eq!(half.rising_point, Some(t + 8));
        assert_eq!(half.falling_point, Some(t + UPSTROKE + 77));
        assert_eq!(half.width_points, Some(89));
        assert!(close(half.width_ms.unwrap(), 8.9, 1e-9));
        let w20 = r.width(20.0).unwrap().width_ms.unwrap();
        let w80 = r.width(80.0).unwrap().width_ms.unwrap();
        assert!(w20 > half.width_ms.unwrap() && half.width_ms.unwrap() > w80);
    }

    #[test]
    fn isi_starts_at_third_spike() {
        let cfg = DetectionConfig::default();
        let (_, records) = run(5, &cfg);
        assert!(records[1].isi_ms.is_none());
        assert!(records[1].cycle_length_ms.is_none());
        assert!(records[1].post_min.is_some());
        assert!(records[2].isi_ms.is_some());
        assert!(records[3].cycle_length_ms.is_some());
    }

    #[test]
    fn missing_width_crossing_is_recorded_and_others_continue() {
        let (mut v, spikes) = pacemaker_trace(3);
        // flatten the repolarization of the middle spike above the 20% level
        let peak = spikes[1] + UPSTROKE;
        for x in v[peak..peak + REPOL - 10].iter_mut() {
            *x = x.max(-30.0);
        }
        let pre = preprocess::compute(&v, RATE, 0);
        let cfg = DetectionConfig {
            half_height_fractions: vec![10.0, 50.0],
            ..DetectionConfig::default()
        };
        let records = extract(&spikes, &pre.voltage, &pre.derivative, Timebase::new(RATE), &cfg);
        let r = &records[1];
        assert!(r.width(10.0).unwrap().width_ms.is_none());
        assert!(r.width(50.0).unwrap().width_ms.is_some());
        assert_eq!(r.error_count, 1);
        assert!(r.errors[0].contains("half width 10"));
    }

    #[test]
    fn empty_fit_window_is_recoverable() {
        let cfg = DetectionConfig::default();
        // adjacent spike times leave no room for minima or the diastolic fit
        let v: Vec<f64> = (0..50).map(|i| (i as f64 * 0.7).sin() * 30.0).collect();
        let pre = preprocess::compute(&v, RATE, 0);
        let records = extract(
            &[10, 11, 12],
            &pre.voltage,
            &pre.derivative,
            Timebase::new(RATE),
            &cfg,
        );
        assert_eq!(records.len(), 3);
        let r = &records[1];
        assert!(r.early_diastolic.is_none());
        assert!(r.error_count > 0);
        assert_eq!(r.error_count, r.errors.len());
    }

    /// Baseline -60 mV with pulses rising as `k²` over 10 points to +40 mV,
    /// then falling linearly back over 50 points.
    fn accelerating_pulses(len: usize, onsets: &[usize]) -> Vec<f64> {
        let mut v = vec![-60.0; len];
        for &onset in onsets {
            for k in 0..=10 {
                v[onset + k] = -60.0 + (k * k) as f64;
            }
            for k in 1..=50 {
                v[onset + 10 + k] = 40.0 - 2.0 * k as f64;
            }
        }
        v
    }

    #[test]
    fn upstroke_search_includes_the_peak_sample() {
        let v = accelerating_pulses(900, &[100, 300, 500, 700]);
        let pre = preprocess::compute(&v, RATE, 0);
        let cfg = DetectionConfig::default();
        // second interior spike time sits on its own peak
        let spikes = [100, 300, 510, 700];
        let records = extract(&spikes, &pre.voltage, &pre.derivative, Timebase::new(RATE), &cfg);

        let r = &records[1];
        assert_eq!(r.peak_point, 310);
        let up = r.upstroke_max.unwrap();
        assert_eq!(up.point, r.peak_point);
        assert!(close(up.dvdt, 190.0, 1e-9));
        assert!(close(up.voltage, 40.0, 1e-9));

        let r = &records[2];
        assert_eq!(r.peak_point, 510);
        assert_eq!(r.upstroke_max.unwrap().point, 510);
        assert!(r.errors.iter().all(|e| !e.contains("upstroke")), "{:?}", r.errors);
    }

    #[test]
    fn oversized_windows_are_clamped_to_the_trace() {
        let cfg = DetectionConfig {
            peak_window_ms: 1e300,
            avg_window_ms: 1e300,
            post_spike_window_ms: 1e300,
            ..DetectionConfig::default()
        };
        assert!(cfg.validate().is_ok());
        let (_, records) = run(4, &cfg);
        assert_eq!(records.len(), 4);
        assert!(close(records[1].peak_val, 20.0, 1e-9));
        assert!(records[1].downstroke_min.is_some());
        assert!(records[1].pre_min.is_some());
    }

    #[test]
    fn prepended_issues_come_first() {
        let cfg = DetectionConfig::default();
        let (_, mut records) = run(3, &cfg);
        records[1].push_issue(ExtractionIssue::UpstrokeNotFound { spike: 1 });
        records[1].prepend_issues([ExtractionIssue::BacktrackNotFound {
            spike: 1,
            candidate: 7,
        }]);
        assert_eq!(records[1].error_count, 2);
        assert!(records[1].errors[0].contains("backtrack"));
    }
}
