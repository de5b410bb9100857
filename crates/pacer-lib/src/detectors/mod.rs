pub mod backtrack;
pub mod crossing;
pub mod refractory;

pub use crossing::DetectionStrategy;
