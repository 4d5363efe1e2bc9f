//! Frame storage: raw frame loading and per-frame transforms.
//!
//! Frames are addressed by `(video_id, frame_index, channel)`. The loader and
//! the transform are the two collaborators the assembler consumes; both are
//! traits so that other storage layouts or preprocessing pipelines can be
//! plugged in. The defaults read the extracted-JPEG layout:
//!
//! ```text
//! color: <root>/v_<video_id>/frame000001.jpg
//! flow:  <root>/u/v_<video_id>/frame000001.jpg
//!        <root>/v/v_<video_id>/frame000001.jpg
//! ```
//!
//! Frame numbers start at 1 and are zero-padded to six digits.

// ---- Standard library imports ----
use std::path::{Path, PathBuf};

// ---- External crate imports ----
use image::imageops::FilterType;
use image::DynamicImage;
use log::debug;
use serde::{Deserialize, Serialize};

// ---- Internal crate imports ----
use crate::error::{CoreError, CoreResult};
use crate::tensor::Tensor;

// ============================================================================
// MODALITY AND CHANNELS
// ============================================================================

/// Input stream of the two-stream model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// One RGB image per frame
    Color,
    /// Horizontal and vertical optical flow images per frame
    Flow,
}

impl Modality {
    /// Images loaded for every frame, in channel order.
    #[must_use]
    pub fn frame_channels(self) -> &'static [FrameChannel] {
        match self {
            Modality::Color => &[FrameChannel::Rgb],
            Modality::Flow => &[FrameChannel::FlowU, FrameChannel::FlowV],
        }
    }

    /// Tensor channels produced per frame.
    #[must_use]
    pub fn channels_per_frame(self) -> usize {
        self.frame_channels()
            .iter()
            .map(|channel| channel.tensor_channels())
            .sum()
    }
}

impl std::str::FromStr for Modality {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rgb" | "color" | "spatial" => Ok(Modality::Color),
            "flow" | "motion" | "temporal" => Ok(Modality::Flow),
            other => Err(CoreError::InvalidConfig(format!("unknown modality '{other}'"))),
        }
    }
}

/// A single stored image of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameChannel {
    Rgb,
    FlowU,
    FlowV,
}

impl FrameChannel {
    /// Tensor channels this image becomes after the transform.
    #[must_use]
    pub fn tensor_channels(self) -> usize {
        match self {
            FrameChannel::Rgb => 3,
            FrameChannel::FlowU | FrameChannel::FlowV => 1,
        }
    }
}

// ============================================================================
// COLLABORATOR TRAITS
// ============================================================================

/// Loads one raw frame image.
///
/// Implementations report an absent or unreadable frame as
/// `CoreError::MissingFrame` carrying the requested video and frame index.
pub trait FrameLoader: Send + Sync {
    fn load(&self, video_id: &str, frame_index: u32, channel: FrameChannel) -> CoreResult<DynamicImage>;
}

/// Which of a sample's views a transform is producing.
///
/// Every frame of one view is transformed with the same `View`, so a view
/// is a consistent crop of the whole stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct View {
    pub index: usize,
    pub count: usize,
}

impl View {
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    /// The only view of a single-view sample.
    pub fn single() -> Self {
        Self::new(0, 1)
    }
}

impl Default for View {
    fn default() -> Self {
        Self::single()
    }
}

/// Maps a raw frame image to a `[channels, H, W]` tensor.
pub trait FrameTransform: Send + Sync {
    fn apply(&self, image: &DynamicImage, channel: FrameChannel, view: View) -> CoreResult<Tensor>;
}

// ============================================================================
// DEFAULT LOADER
// ============================================================================

/// Reads frames from the extracted-JPEG directory layout.
#[derive(Debug, Clone)]
pub struct ImageFrameLoader {
    root: PathBuf,
    extension: String,
}

impl ImageFrameLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "jpg".to_string(),
        }
    }

    /// Uses a different file extension (e.g. `png`).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one frame image.
    #[must_use]
    pub fn frame_path(&self, video_id: &str, frame_index: u32, channel: FrameChannel) -> PathBuf {
        let base = match channel {
            FrameChannel::Rgb => self.root.clone(),
            FrameChannel::FlowU => self.root.join("u"),
            FrameChannel::FlowV => self.root.join("v"),
        };
        base.join(format!("v_{video_id}"))
            .join(format!("frame{frame_index:06}.{}", self.extension))
    }
}

impl FrameLoader for ImageFrameLoader {
    fn load(&self, video_id: &str, frame_index: u32, channel: FrameChannel) -> CoreResult<DynamicImage> {
        let path = self.frame_path(video_id, frame_index, channel);
        image::open(&path).map_err(|e| {
            debug!("Failed to load {}: {}", path.display(), e);
            CoreError::MissingFrame {
                video_id: video_id.to_string(),
                frame_index,
            }
        })
    }
}

// ============================================================================
// DEFAULT TRANSFORM
// ============================================================================

/// Default share of each side kept by a multi-view crop (224 of 256).
pub const DEFAULT_CROP_SCALE: f32 = 0.875;

/// Crops, resizes to `height x width`, scales pixels to `[0, 1]` and
/// optionally normalizes each channel with `(x - mean) / std`.
///
/// Flow images become one grayscale channel; color images three RGB channels.
///
/// A single-view sample uses the whole frame. With several views, view `i`
/// takes a `crop_scale` crop at position `i % 5` (center, top-left,
/// top-right, bottom-left, bottom-right) and views `5..10` of each group of
/// ten are mirrored. Mirroring a horizontal flow image also inverts it, so
/// the flow keeps pointing the right way.
#[derive(Debug, Clone)]
pub struct ResizeToTensor {
    height: u32,
    width: u32,
    crop_scale: f32,
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl ResizeToTensor {
    pub fn new(height: u32, width: u32) -> Self {
        Self {
            height,
            width,
            crop_scale: DEFAULT_CROP_SCALE,
            mean: Vec::new(),
            std: Vec::new(),
        }
    }

    /// Sets the share of each side a multi-view crop keeps, in `(0, 1]`.
    pub fn with_crop_scale(mut self, crop_scale: f32) -> CoreResult<Self> {
        if !(crop_scale > 0.0 && crop_scale <= 1.0) {
            return Err(CoreError::InvalidConfig(format!(
                "crop scale must be in (0, 1], got {crop_scale}"
            )));
        }
        self.crop_scale = crop_scale;
        Ok(self)
    }

    /// Adds per-channel normalization. Channel `c` uses `mean[c % len]`.
    pub fn with_normalization(mut self, mean: Vec<f32>, std: Vec<f32>) -> CoreResult<Self> {
        if mean.is_empty() || mean.len() != std.len() {
            return Err(CoreError::InvalidConfig(
                "normalization mean and std must be non-empty and of equal length".to_string(),
            ));
        }
        if std.iter().any(|s| *s == 0.0) {
            return Err(CoreError::InvalidConfig("normalization std must be non-zero".to_string()));
        }
        self.mean = mean;
        self.std = std;
        Ok(self)
    }

    /// Crop rectangle `(x, y, w, h)` and mirroring for `view`.
    fn view_geometry(&self, width: u32, height: u32, view: View) -> ((u32, u32, u32, u32), bool) {
        if view.count <= 1 {
            return ((0, 0, width, height), false);
        }
        let crop_w = ((width as f32 * self.crop_scale).round() as u32).clamp(1, width.max(1));
        let crop_h = ((height as f32 * self.crop_scale).round() as u32).clamp(1, height.max(1));
        let (right, bottom) = (width.saturating_sub(crop_w), height.saturating_sub(crop_h));
        let (x, y) = match view.index % 5 {
            0 => (right / 2, bottom / 2),
            1 => (0, 0),
            2 => (right, 0),
            3 => (0, bottom),
            _ => (right, bottom),
        };
        let mirrored = view.index % 10 >= 5;
        ((x, y, crop_w, crop_h), mirrored)
    }

    fn prepared(&self, image: &DynamicImage, view: View) -> (DynamicImage, bool) {
        let ((x, y, w, h), mirrored) = self.view_geometry(image.width(), image.height(), view);
        let mut frame = if (x, y, w, h) == (0, 0, image.width(), image.height()) {
            image.clone()
        } else {
            image.crop_imm(x, y, w, h)
        };
        if mirrored {
            frame = frame.fliph();
        }
        if frame.width() != self.width || frame.height() != self.height {
            frame = frame.resize_exact(self.width, self.height, FilterType::Triangle);
        }
        (frame, mirrored)
    }
}

impl FrameTransform for ResizeToTensor {
    fn apply(&self, image: &DynamicImage, channel: FrameChannel, view: View) -> CoreResult<Tensor> {
        let (resized, mirrored) = self.prepared(image, view);
        let (h, w) = (self.height as usize, self.width as usize);
        let channels = channel.tensor_channels();
        let mut data = vec![0.0f32; channels * h * w];

        match channel {
            FrameChannel::Rgb => {
                let rgb = resized.to_rgb8();
                for (x, y, pixel) in rgb.enumerate_pixels() {
                    let offset = y as usize * w + x as usize;
                    for c in 0..3 {
                        data[c * h * w + offset] = f32::from(pixel[c]) / 255.0;
                    }
                }
            }
            FrameChannel::FlowU | FrameChannel::FlowV => {
                let invert = mirrored && channel == FrameChannel::FlowU;
                let gray = resized.to_luma8();
                for (x, y, pixel) in gray.enumerate_pixels() {
                    let value = f32::from(pixel[0]) / 255.0;
                    data[y as usize * w + x as usize] = if invert { 1.0 - value } else { value };
                }
            }
        }

        if !self.mean.is_empty() {
            for c in 0..channels {
                let mean = self.mean[c % self.mean.len()];
                let std = self.std[c % self.std.len()];
                for value in &mut data[c * h * w..(c + 1) * h * w] {
                    *value = (*value - mean) / std;
                }
            }
        }

        Tensor::from_vec(channels, h, w, data)
    }
}
