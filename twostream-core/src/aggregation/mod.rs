//! Score aggregation: views into a sample score (`stream`) and clips into a
//! video prediction (`video`).

pub mod stream;
pub mod video;

pub use stream::combine;
pub use video::{VideoAccumulator, VideoEntry, VideoLevelAggregator, VideoMetrics};
