//! Builder pattern for `CoreConfig`.
//!
//! A fluent API for creating and configuring `CoreConfig` instances. Every
//! setting starts from its `DEFAULT_*` constant.

// ---- Internal crate imports ----
use super::CoreConfig;
use crate::frames::Modality;

/// Builder for creating CoreConfig instances.
///
/// # Examples
///
/// ```rust
/// use twostream_core::config::CoreConfigBuilder;
/// use twostream_core::frames::Modality;
///
/// let config = CoreConfigBuilder::new()
///     .modality(Modality::Color)
///     .window(1)
///     .views(3)
///     .top_k(5)
///     .build();
/// assert_eq!(config.channels_per_frame(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
}

impl CoreConfigBuilder {
    /// Creates a new CoreConfigBuilder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing config, e.g. one read from a file.
    pub fn from_config(config: CoreConfig) -> Self {
        Self { config }
    }

    /// Sets the number of consecutive frames per sample.
    pub fn window(mut self, window: u32) -> Self {
        self.config.window = window;
        self
    }

    /// Sets the number of evaluation clips per video.
    pub fn num_samples(mut self, num_samples: u32) -> Self {
        self.config.num_samples = num_samples;
        self
    }

    /// Sets the input modality.
    pub fn modality(mut self, modality: Modality) -> Self {
        self.config.modality = modality;
        self
    }

    /// Sets the transformed frame size.
    ///
    /// # Arguments
    ///
    /// * `height` - Frame height in pixels
    /// * `width` - Frame width in pixels
    pub fn frame_size(mut self, height: u32, width: u32) -> Self {
        self.config.frame_height = height;
        self.config.frame_width = width;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    /// Sets the number of assembly worker threads.
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Sets the batch queue capacity.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Sets the number of views per sample.
    pub fn views(mut self, views: usize) -> Self {
        self.config.views = views;
        self
    }

    /// Sets k for top-k accuracy.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Sets the progress logging interval.
    pub fn print_freq(mut self, print_freq: usize) -> Self {
        self.config.print_freq = print_freq;
        self
    }

    /// Sets the number of classes.
    pub fn num_classes(mut self, num_classes: usize) -> Self {
        self.config.num_classes = num_classes;
        self
    }

    /// Builds the CoreConfig instance. Call `validate` on the result before use.
    pub fn build(self) -> CoreConfig {
        self.config
    }
}
