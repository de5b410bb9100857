pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod preprocess;
pub mod report;
pub mod search;
pub mod signal;

pub use config::*;
pub use engine::*;
pub use error::*;
pub use signal::*;
