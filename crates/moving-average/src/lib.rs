pub mod cache;
pub mod engine;
pub mod indicators;
pub mod policy;


pub use cache::IndicatorCache;
pub use engine::{MovingAverageEngine, RecomputeReport};
pub use indicators::*;
pub use policy::{TimeframePolicy, TimeframeSpec};
