/// Greedy left-to-right sweep: keep a candidate only if it lies at least
/// `refractory_points` after the last kept one. Dropped candidates never
/// become the reference, so the earliest member of a cluster survives.
pub fn filter(candidates: &[usize], refractory_points: usize) -> Vec<usize> {
    let mut kept: Vec<usize> = Vec::with_capacity(candidates.len());
    for &c in candidates {
        match kept.last() {
            Some(&last) if c.saturating_sub(last) < refractory_points => {}
            _ => kept.push(c),
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_candidate_always_kept() {
        assert_eq!(filter(&[7], 100), vec![7]);
        assert!(filter(&[], 100).is_empty());
    }

    #[test]
    fn earliest_in_cluster_wins() {
        assert_eq!(filter(&[100, 105, 150, 299, 300], 200), vec![100, 300]);
    }

    #[test]
    fn dropped_candidates_are_not_references() {
        // 180 is within 100 of 100; 250 is 150 after the kept 100 even though
        // it is only 70 after the dropped 180
        assert_eq!(filter(&[100, 180, 250], 100), vec![100, 250]);
    }

    #[test]
    fn kept_candidates_respect_spacing() {
        let candidates: Vec<usize> = (0..500).map(|i| i * 7 + (i % 3)).collect();
        let kept = filter(&candidates, 40);
        for w in kept.windows(2) {
            assert!(w[1] - w[0] >= 40);
        }
        assert_eq!(kept[0], candidates[0]);
    }

    #[test]
    fn zero_refractory_keeps_everything() {
        assert_eq!(filter(&[1, 2, 3], 0), vec![1, 2, 3]);
    }
}
