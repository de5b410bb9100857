use thiserror::Error;

pub type Result<T> = std::result::Result<T, DetectionError>;

/// Fatal, pre-flight failures. No result is produced when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("sample rate must be a positive finite number of points/ms, got {0}")]
    InvalidSampleRate(f64),
    #[error("recording needs at least 2 samples, got {0}")]
    TooFewSamples(usize),
    #[error("half-height fractions must not be empty")]
    EmptyHeightFractions,
    #[error("half-height fraction {0} is outside (0, 100)")]
    HeightFractionOutOfRange(f64),
    #[error("dV/dt threshold must be finite, got {0}")]
    InvalidDvdtThreshold(f64),
    #[error("{name} must be positive, got {value}")]
    NonPositiveWindow { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    NegativeValue { name: &'static str, value: f64 },
    #[error("percent of max for threshold must be in (0, 1], got {0}")]
    PercentOfMaxOutOfRange(f64),
    #[error("analysis window start {start}s must precede stop {stop}s")]
    InvertedWindow { start: f64, stop: f64 },
    #[error("early diastolic fit range {start}..{stop} must satisfy 0 <= start < stop <= 1")]
    InvalidFitRange { start: f64, stop: f64 },
}

/// Recoverable, per-spike problems. Recorded on the spike, never returned as `Err`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionIssue {
    #[error("spike {spike}: no dV/dt point below percent of max within backtrack window of candidate {candidate}")]
    BacktrackNotFound { spike: usize, candidate: usize },
    #[error("spike {spike}: empty {window} window")]
    EmptyWindow { spike: usize, window: &'static str },
    #[error("spike {spike}: searching for preMinVal {target:.3}")]
    PreMinNotFound { spike: usize, target: f64 },
    #[error("spike {spike}: searching for postMinVal {target:.3}")]
    PostMinNotFound { spike: usize, target: f64 },
    #[error("spike {spike}: early diastolic fit window has {points} point(s)")]
    EarlyDiastolicFit { spike: usize, points: usize },
    #[error("spike {spike}: searching for upstroke dV/dt max")]
    UpstrokeNotFound { spike: usize },
    #[error("spike {spike}: half width {fraction} crossing not found")]
    WidthNotFound { spike: usize, fraction: f64 },
    #[error("spike {spike}: {field} needs a neighbor value that is unavailable")]
    NeighborUnavailable { spike: usize, field: &'static str },
}
