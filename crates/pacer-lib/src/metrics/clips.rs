use crate::signal::Timebase;
use log::warn;
use serde::{Deserialize, Serialize};

/// Voltage snippet centered on one spike time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeClip {
    /// Index into the spike list this clip belongs to
    pub spike_index: usize,
    pub samples: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpikeClips {
    pub clips: Vec<SpikeClip>,
    /// Shared x axis in ms, 0 at the spike time
    pub time_axis_ms: Vec<f64>,
    /// Spikes whose window ran past either end of the trace
    pub dropped_count: usize,
}

/// Cut a `clip_width_ms` window around every spike time. Windows that would
/// leave the trace are dropped, not padded, so every kept clip has the same length.
pub fn extract_clips(
    spike_times: &[usize],
    voltage: &[f64],
    tb: Timebase,
    clip_width_ms: f64,
) -> SpikeClips {
    let half = tb.ms_to_points(clip_width_ms) / 2;
    if half > voltage.len() / 2 {
        warn!(
            "clip width {} ms is wider than the trace, dropping all {} clip(s)",
            clip_width_ms,
            spike_times.len()
        );
        return SpikeClips {
            dropped_count: spike_times.len(),
            ..SpikeClips::default()
        };
    }
    let time_axis_ms = (0..2 * half)
        .map(|k| tb.points_to_ms(k as f64 - half as f64))
        .collect();
    let mut out = SpikeClips {
        clips: Vec::with_capacity(spike_times.len()),
        time_axis_ms,
        dropped_count: 0,
    };
    for (spike_index, &t) in spike_times.iter().enumerate() {
        match t.checked_sub(half) {
            Some(start) if t + half <= voltage.len() => out.clips.push(SpikeClip {
                spike_index,
                samples: voltage[start..t + half].to_vec(),
            }),
            _ => out.dropped_count += 1,
        }
    }
    if out.dropped_count > 0 {
        warn!(
            "dropped {} of {} spike clip(s) running past the trace ({} ms wide)",
            out.dropped_count,
            spike_times.len(),
            clip_width_ms
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clips_are_centered_and_equal_length() {
        let v: Vec<f64> = (0..1000).map(|i| i as f64).collect();
        let out = extract_clips(&[300, 600], &v, Timebase::new(10.0), 10.0);
        assert_eq!(out.dropped_count, 0);
        assert_eq!(out.time_axis_ms.len(), 100);
        assert!((out.time_axis_ms[0] + 5.0).abs() < 1e-12);
        assert!((out.time_axis_ms[50]).abs() < 1e-12);
        for clip in &out.clips {
            assert_eq!(clip.samples.len(), 100);
        }
        assert_eq!(out.clips[1].samples[50], 600.0);
    }

    #[test]
    fn clip_past_either_end_is_dropped() {
        let v = vec![0.0; 1000];
        let out = extract_clips(&[20, 500, 990], &v, Timebase::new(10.0), 10.0);
        assert_eq!(out.dropped_count, 2);
        assert_eq!(out.clips.len(), 1);
        assert_eq!(out.clips[0].spike_index, 1);
    }

    #[test]
    fn width_beyond_trace_drops_every_clip() {
        let v = vec![0.0; 1000];
        let out = extract_clips(&[100, 500, 900], &v, Timebase::new(10.0), 1e12);
        assert_eq!(out.dropped_count, 3);
        assert!(out.clips.is_empty());
        assert!(out.time_axis_ms.is_empty());
    }

    #[test]
    fn window_exactly_at_bounds_is_kept() {
        let v = vec![1.0; 100];
        let out = extract_clips(&[50], &v, Timebase::new(1.0), 100.0);
        assert_eq!(out.dropped_count, 0);
        assert_eq!(out.clips[0].samples.len(), 100);
    }
}
