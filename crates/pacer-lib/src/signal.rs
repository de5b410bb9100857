use serde::{Deserialize, Serialize};

/// A single decoded membrane-potential sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    /// Uniform sampling rate in points per millisecond (kHz)
    pub sample_rate_khz: f64,
    /// Samples (mV)
    pub voltage: Vec<f64>,
}

impl Recording {
    pub fn new(sample_rate_khz: f64, voltage: Vec<f64>) -> Self {
        Self {
            sample_rate_khz,
            voltage,
        }
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_s(&self) -> f64 {
        self.voltage.len() as f64 / self.sample_rate_khz / 1000.0
    }

    pub fn timebase(&self) -> Timebase {
        Timebase::new(self.sample_rate_khz)
    }
}

/// Point/time conversions at a fixed sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timebase {
    pub points_per_ms: f64,
}

impl Timebase {
    pub fn new(points_per_ms: f64) -> Self {
        Self { points_per_ms }
    }

    pub fn ms_to_points(&self, ms: f64) -> usize {
        (ms * self.points_per_ms).round().max(0.0) as usize
    }

    pub fn seconds_to_points(&self, seconds: f64) -> usize {
        self.ms_to_points(seconds * 1000.0)
    }

    pub fn points_to_ms(&self, points: f64) -> f64 {
        points / self.points_per_ms
    }

    pub fn point_to_seconds(&self, point: usize) -> f64 {
        self.points_to_ms(point as f64) / 1000.0
    }

    /// Signed elapsed time in ms from `from` to `to`.
    pub fn elapsed_ms(&self, from: usize, to: usize) -> f64 {
        self.points_to_ms(to as f64 - from as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_round_trip_whole_points() {
        let tb = Timebase::new(10.0);
        assert_eq!(tb.ms_to_points(20.0), 200);
        assert_eq!(tb.seconds_to_points(0.5), 5000);
        assert!((tb.point_to_seconds(5000) - 0.5).abs() < 1e-12);
        assert!((tb.elapsed_ms(30, 10) + 2.0).abs() < 1e-12);
    }

    #[test]
    fn duration_uses_khz_rate() {
        let rec = Recording::new(20.0, vec![0.0; 40_000]);
        assert!((rec.duration_s() - 2.0).abs() < 1e-12);
    }
}
