//! Median filtering and the scaled first derivative.

use log::warn;

/// Filtered voltage and its derivative, index-aligned with the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    pub voltage: Vec<f64>,
    /// dV/dt in mV/ms, `derivative[0] == 0`
    pub derivative: Vec<f64>,
    /// Median width actually applied (0 = off)
    pub median_filter_width: usize,
}

/// Median-filter `voltage` (if `median_filter_width > 0`) and differentiate it.
pub fn compute(voltage: &[f64], sample_rate_khz: f64, median_filter_width: usize) -> Preprocessed {
    let width = match median_filter_width {
        0 => 0,
        w if w % 2 == 0 => {
            warn!(
                "median filter width {} is even, using {} instead",
                w,
                w + 1
            );
            w + 1
        }
        w => w,
    };
    let filtered = if width > 0 {
        median_filter(voltage, width)
    } else {
        voltage.to_vec()
    };
    let derivative = derivative(&filtered, sample_rate_khz);
    Preprocessed {
        voltage: filtered,
        derivative,
        median_filter_width: width,
    }
}

/// Centered median of odd `width`; samples beyond either end count as zero.
fn median_filter(data: &[f64], width: usize) -> Vec<f64> {
    let half = width / 2;
    let mut window = Vec::with_capacity(width);
    let mut out = Vec::with_capacity(data.len());
    for i in 0..data.len() {
        window.clear();
        for k in 0..width {
            let idx = (i + k).checked_sub(half);
            window.push(idx.and_then(|j| data.get(j)).copied().unwrap_or(0.0));
        }
        window.sort_by(f64::total_cmp);
        out.push(window[half]);
    }
    out
}

fn derivative(data: &[f64], sample_rate_khz: f64) -> Vec<f64> {
    if data.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; data.len()];
    for i in 1..data.len() {
        out[i] = (data[i] - data[i - 1]) * sample_rate_khz;
    }
    out
}
