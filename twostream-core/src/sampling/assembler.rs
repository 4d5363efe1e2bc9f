//! Frame stacking: turns a resolved clip into the model's input tensor.

use log::trace;

use crate::error::{CoreError, CoreResult};
use crate::frames::{FrameLoader, FrameTransform, Modality, View};
use crate::tensor::Tensor;

/// Stacks `window` consecutive frames of one video into a
/// `[window * channels_per_frame, H, W]` tensor.
///
/// Holds only configuration; every call is independent, so one assembler can
/// be shared by all worker threads.
#[derive(Debug, Clone, Copy)]
pub struct FrameBatchAssembler {
    pub modality: Modality,
    pub height: usize,
    pub width: usize,
}

impl FrameBatchAssembler {
    pub fn new(modality: Modality, height: u32, width: u32) -> Self {
        Self {
            modality,
            height: height as usize,
            width: width as usize,
        }
    }

    /// Output shape for a given window.
    #[must_use]
    pub fn output_shape(&self, window: u32) -> (usize, usize, usize) {
        (
            window as usize * self.modality.channels_per_frame(),
            self.height,
            self.width,
        )
    }

    /// Loads frames `start_offset..start_offset + window` and writes frame
    /// `start_offset + j` into slot `j`.
    ///
    /// For flow, slot `j` holds the horizontal image in channel `2j` and the
    /// vertical image in channel `2j + 1`. Any frame that cannot be loaded
    /// fails the whole clip with `MissingFrame`. Every frame is transformed
    /// as part of `view`.
    pub fn assemble(
        &self,
        video_id: &str,
        start_offset: u32,
        window: u32,
        loader: &dyn FrameLoader,
        transform: &dyn FrameTransform,
        view: View,
    ) -> CoreResult<Tensor> {
        let (channels, height, width) = self.output_shape(window);
        let mut stack = Tensor::zeros(channels, height, width);
        let per_frame = self.modality.channels_per_frame();

        for slot in 0..window {
            let frame_index = start_offset + slot;
            let mut channel = slot as usize * per_frame;

            for &frame_channel in self.modality.frame_channels() {
                let image = loader
                    .load(video_id, frame_index, frame_channel)
                    .map_err(|e| match e {
                        CoreError::Io(_) | CoreError::MissingFrame { .. } => CoreError::MissingFrame {
                            video_id: video_id.to_string(),
                            frame_index,
                        },
                        other => other,
                    })?;
                let plane = transform.apply(&image, frame_channel, view)?;

                let expected = (frame_channel.tensor_channels(), height, width);
                if plane.shape() != expected {
                    let (c, h, w) = plane.shape();
                    return Err(CoreError::ShapeMismatch {
                        expected: expected.0 * expected.1 * expected.2,
                        found: c * h * w,
                    });
                }
                stack.write_channels(channel, &plane)?;
                channel += plane.channels();
            }
        }

        trace!("Assembled {video_id}@{start_offset} ({window} frames, view {})", view.index);
        Ok(stack)
    }
}
