//! Walk back from a dV/dt crossing to the point where the upstroke actually begins.

use crate::{error::ExtractionIssue, search};
use log::trace;

/// Refined spike times with the recoverable issue (if any) of each one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Backtracked {
    pub spike_times: Vec<usize>,
    pub issues: Vec<Option<ExtractionIssue>>,
}

/// Refine one candidate.
///
/// Takes the dV/dt maximum over `[candidate - window_points, candidate)`, sets
/// the target to `max * percent_of_max`, and searches backward from the
/// candidate for the last sample below that target. The refined index is the
/// sample right after it, i.e. where dV/dt climbs back to the target.
/// Returns `None` when the window is empty or nothing falls below the target.
pub fn refine(
    candidate: usize,
    derivative: &[f64],
    window_points: usize,
    percent_of_max: f64,
) -> Option<usize> {
    let window = candidate.saturating_sub(window_points)..candidate;
    let (_, max) = search::argmax(derivative, window.clone())?;
    let target = max * percent_of_max;
    search::last_below(derivative, window, target).map(|i| i + 1)
}

/// Refine every candidate, falling back to the unrefined index when no onset is found.
pub fn refine_all(
    candidates: &[usize],
    derivative: &[f64],
    window_points: usize,
    percent_of_max: f64,
) -> Backtracked {
    let mut out = Backtracked::default();
    for (spike, &candidate) in candidates.iter().enumerate() {
        match refine(candidate, derivative, window_points, percent_of_max) {
            Some(refined) => {
                out.spike_times.push(refined);
                out.issues.push(None);
            }
            None => {
                let issue = ExtractionIssue::BacktrackNotFound { spike, candidate };
                trace!("{}", issue);
                out.spike_times.push(candidate);
                out.issues.push(Some(issue));
            }
        }
    }
    out
}
