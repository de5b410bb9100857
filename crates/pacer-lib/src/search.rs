//! Bounded window searches over a trace. Every range is clamped to the trace,
//! and a search that finds nothing returns `None`.

use std::ops::Range;

/// Clamp `start..end` to `0..len`; an inverted range becomes empty.
pub fn clamp(start: usize, end: usize, len: usize) -> Range<usize> {
    let end = end.min(len);
    start.min(end)..end
}

/// Index and value of the first maximum in `range`.
pub fn argmax(data: &[f64], range: Range<usize>) -> Option<(usize, f64)> {
    let range = clamp(range.start, range.end, data.len());
    let mut best: Option<(usize, f64)> = None;
    for i in range {
        match best {
            Some((_, v)) if data[i] <= v => {}
            _ => best = Some((i, data[i])),
        }
    }
    best
}

/// Index and value of the first minimum in `range`.
pub fn argmin(data: &[f64], range: Range<usize>) -> Option<(usize, f64)> {
    let range = clamp(range.start, range.end, data.len());
    let mut best: Option<(usize, f64)> = None;
    for i in range {
        match best {
            Some((_, v)) if data[i] >= v => {}
            _ => best = Some((i, data[i])),
        }
    }
    best
}

pub fn mean(data: &[f64], range: Range<usize>) -> Option<f64> {
    let range = clamp(range.start, range.end, data.len());
    if range.is_empty() {
        return None;
    }
    let n = range.len() as f64;
    Some(data[range].iter().sum::<f64>() / n)
}

/// First index in `range` (searching forward) whose value is below `level`.
pub fn first_below(data: &[f64], range: Range<usize>, level: f64) -> Option<usize> {
    clamp(range.start, range.end, data.len()).find(|&i| data[i] < level)
}

/// First index in `range` (searching forward) whose value is above `level`.
pub fn first_above(data: &[f64], range: Range<usize>, level: f64) -> Option<usize> {
    clamp(range.start, range.end, data.len()).find(|&i| data[i] > level)
}

/// Last index in `range` whose value is below `level`, i.e. the first hit
/// when searching backward from `range.end`.
pub fn last_below(data: &[f64], range: Range<usize>, level: f64) -> Option<usize> {
    clamp(range.start, range.end, data.len())
        .rev()
        .find(|&i| data[i] < level)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [f64; 6] = [3.0, 1.0, 4.0, 1.0, 5.0, 4.0];

    #[test]
    fn extrema_prefer_first_occurrence() {
        assert_eq!(argmin(&DATA, 0..6), Some((1, 1.0)));
        assert_eq!(argmax(&DATA, 0..4), Some((2, 4.0)));
        assert_eq!(argmax(&DATA, 5..2), None);
    }

    #[test]
    fn ranges_are_clamped_to_trace() {
        assert_eq!(clamp(4, 100, 6), 4..6);
        assert_eq!(clamp(9, 100, 6), 6..6);
        assert_eq!(argmax(&DATA, 3..100), Some((4, 5.0)));
        assert_eq!(mean(&DATA, 4..100), Some(4.5));
        assert_eq!(mean(&DATA, 7..9), None);
    }

    #[test]
    fn directional_crossings() {
        assert_eq!(first_below(&DATA, 2..6, 2.0), Some(3));
        assert_eq!(first_above(&DATA, 0..6, 4.0), Some(4));
        assert_eq!(last_below(&DATA, 0..4, 2.0), Some(3));
        assert_eq!(last_below(&DATA, 4..6, 2.0), None);
    }
}
