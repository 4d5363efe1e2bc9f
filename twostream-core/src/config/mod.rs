//! Configuration structures and constants for the twostream-core library.
//!
//! This module provides the configuration system for sampling, assembly and
//! evaluation behavior. A 10-frame flow stack, 19 evaluation clips per video
//! and 224x224 inputs are the defaults; all of them can be overridden.

mod builder;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::frames::Modality;

pub use builder::CoreConfigBuilder;

// Default constants

/// Default number of consecutive frames stacked into one sample.
/// Ten optical-flow frames is the usual temporal stream input.
pub const DEFAULT_WINDOW: u32 = 10;

/// Default number of evenly spaced clips scored per video during evaluation.
pub const DEFAULT_NUM_SAMPLES: u32 = 19;

/// Default frame height after the transform, in pixels.
pub const DEFAULT_FRAME_HEIGHT: u32 = 224;

/// Default frame width after the transform, in pixels.
pub const DEFAULT_FRAME_WIDTH: u32 = 224;

/// Default number of samples per batch.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Default number of assembly worker threads.
pub const DEFAULT_WORKERS: usize = 8;

/// Default capacity of the batch queue, in batches.
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Default number of views (crops) per sample.
pub const DEFAULT_VIEWS: usize = 1;

/// Default k for top-k accuracy.
pub const DEFAULT_TOP_K: usize = 5;

/// Default progress logging interval, in batches.
pub const DEFAULT_PRINT_FREQ: usize = 20;

/// Default number of classes (UCF101).
pub const DEFAULT_NUM_CLASSES: usize = 101;

/// Main configuration structure for the twostream-core library.
///
/// All fields have defaults. The builder provides a fluent way to override
/// them; `validate` must pass before the config is handed to a dataset or
/// loader.
///
/// # Examples
///
/// ```rust
/// use twostream_core::config::CoreConfigBuilder;
/// use twostream_core::frames::Modality;
///
/// let config = CoreConfigBuilder::new()
///     .modality(Modality::Flow)
///     .window(10)
///     .num_samples(19)
///     .batch_size(16)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Number of consecutive frames per sample
    pub window: u32,

    /// Number of evaluation clips per video
    pub num_samples: u32,

    /// Color frames or optical flow pairs
    pub modality: Modality,

    /// Height of a transformed frame
    pub frame_height: u32,

    /// Width of a transformed frame
    pub frame_width: u32,

    /// Samples per batch
    pub batch_size: usize,

    /// Worker threads assembling samples
    pub workers: usize,

    /// Batches buffered between workers and the consumer
    pub queue_capacity: usize,

    /// Parallel views per sample whose scores are summed
    pub views: usize,

    /// k used for top-k accuracy
    pub top_k: usize,

    /// Log progress every this many batches
    pub print_freq: usize,

    /// Length of every score vector
    pub num_classes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            num_samples: DEFAULT_NUM_SAMPLES,
            modality: Modality::Flow,
            frame_height: DEFAULT_FRAME_HEIGHT,
            frame_width: DEFAULT_FRAME_WIDTH,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            views: DEFAULT_VIEWS,
            top_k: DEFAULT_TOP_K,
            print_freq: DEFAULT_PRINT_FREQ,
            num_classes: DEFAULT_NUM_CLASSES,
        }
    }
}

impl CoreConfig {
    /// Checks that every count-like setting is non-zero.
    pub fn validate(&self) -> CoreResult<()> {
        let checks: [(&str, usize); 10] = [
            ("window", self.window as usize),
            ("num_samples", self.num_samples as usize),
            ("frame_height", self.frame_height as usize),
            ("frame_width", self.frame_width as usize),
            ("batch_size", self.batch_size),
            ("workers", self.workers),
            ("queue_capacity", self.queue_capacity),
            ("views", self.views),
            ("top_k", self.top_k),
            ("num_classes", self.num_classes),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(CoreError::InvalidConfig(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }

    /// Number of tensor channels one frame contributes.
    #[must_use]
    pub fn channels_per_frame(&self) -> usize {
        self.modality.channels_per_frame()
    }

    /// Reads a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &std::path::Path) -> CoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: CoreConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }
}
