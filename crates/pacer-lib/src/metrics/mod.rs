pub mod clips;
pub mod fit;
pub mod spike;

pub use clips::{extract_clips, SpikeClip, SpikeClips};
pub use spike::{extract, EarlyDiastolicFit, RateExtremum, SpikeRecord, SpikeWidth, VoltageMinimum};
