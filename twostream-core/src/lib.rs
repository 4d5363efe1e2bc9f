//! Core library for preparing video clips for a two-stream action-recognition
//! model and turning per-clip model scores into video-level predictions.
//!
//! This crate provides clip indexing (stochastic training ranges and a fixed
//! evaluation grid), frame stacking for color and optical-flow inputs, view
//! and video-level score aggregation with top-k accuracy, and a batched
//! loader that keeps aggregation on a single consumer thread.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use twostream_core::{
//!     ClipDataset, CoreConfig, DatasetMode, ImageFrameLoader, MetadataStore, ResizeToTensor,
//! };
//! use twostream_core::pipeline::{BatchLoader, PassOptions, evaluate_pass};
//! # use twostream_core::pipeline::ScoreModel;
//! # fn model() -> Box<dyn ScoreModel> { unimplemented!() }
//!
//! let config = CoreConfig::default();
//! let store = MetadataStore::load(
//!     Path::new("frame_count.json"),
//!     Path::new("testlist01.txt"),
//!     Some(Path::new("classInd.txt")),
//! ).unwrap();
//! let dataset = ClipDataset::new(
//!     DatasetMode::Evaluate,
//!     &store,
//!     &config,
//!     Arc::new(ImageFrameLoader::new("tvl1_flow")),
//!     Arc::new(ResizeToTensor::new(224, 224)),
//! ).unwrap();
//!
//! let loader = BatchLoader::new(&dataset, &config);
//! let mut aggregator = twostream_core::VideoLevelAggregator::new();
//! let _outcome = evaluate_pass(
//!     &loader,
//!     model().as_ref(),
//!     &mut aggregator,
//!     &AtomicBool::new(false),
//!     PassOptions::from(&config),
//! ).unwrap();
//! ```

pub mod aggregation;
pub mod config;
pub mod dataset;
pub mod error;
pub mod frames;
pub mod metadata;
pub mod metrics;
pub mod pipeline;
pub mod progress;
pub mod reporting;
pub mod sampling;
pub mod tensor;

// Re-exports for public API
pub use aggregation::{VideoAccumulator, VideoLevelAggregator, VideoMetrics, combine};
pub use config::{CoreConfig, CoreConfigBuilder};
pub use dataset::{ClipDataset, DatasetMode, Sample};
pub use error::{CoreError, CoreResult};
pub use frames::{
    FrameChannel, FrameLoader, FrameTransform, ImageFrameLoader, Modality, ResizeToTensor, View,
};
pub use metadata::{ClassIndex, FrameCountTable, MetadataStore, SplitEntry, VideoRecord};
pub use sampling::{
    EvalClipKey, FrameBatchAssembler, TrainClipKey, build_eval_index, build_train_index,
    resolve_train_offset,
};
pub use tensor::Tensor;
