//! Dense `[channels, height, width]` tensor used as model input.

use crate::error::{CoreError, CoreResult};

/// Row-major `f32` tensor of shape `[channels, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    channels: usize,
    height: usize,
    width: usize,
    data: Vec<f32>,
}

impl Tensor {
    /// Allocates a zero-filled tensor.
    pub fn zeros(channels: usize, height: usize, width: usize) -> Self {
        Self {
            channels,
            height,
            width,
            data: vec![0.0; channels * height * width],
        }
    }

    /// Wraps existing data; the length must equal `channels * height * width`.
    pub fn from_vec(channels: usize, height: usize, width: usize, data: Vec<f32>) -> CoreResult<Self> {
        let expected = channels * height * width;
        if data.len() != expected {
            return Err(CoreError::ShapeMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            channels,
            height,
            width,
            data,
        })
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.height, self.width)
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Plane of a single channel.
    #[must_use]
    pub fn channel(&self, index: usize) -> &[f32] {
        let plane = self.height * self.width;
        &self.data[index * plane..(index + 1) * plane]
    }

    /// Copies `source` into the channels starting at `first_channel`.
    ///
    /// `source` must share this tensor's height and width and fit within its
    /// channel range.
    pub fn write_channels(&mut self, first_channel: usize, source: &Tensor) -> CoreResult<()> {
        if source.height != self.height || source.width != self.width {
            return Err(CoreError::ShapeMismatch {
                expected: self.height * self.width,
                found: source.height * source.width,
            });
        }
        if first_channel + source.channels > self.channels {
            return Err(CoreError::ShapeMismatch {
                expected: self.channels,
                found: first_channel + source.channels,
            });
        }
        let plane = self.height * self.width;
        let start = first_channel * plane;
        self.data[start..start + source.data.len()].copy_from_slice(&source.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_channels_places_planes_in_order() {
        let mut stack = Tensor::zeros(4, 1, 2);
        let pair = Tensor::from_vec(2, 1, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        stack.write_channels(2, &pair).unwrap();
        assert_eq!(stack.data(), &[0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(stack.channel(3), &[3.0, 4.0]);
    }

    #[test]
    fn write_past_last_channel_fails() {
        let mut stack = Tensor::zeros(2, 1, 1);
        let pair = Tensor::zeros(2, 1, 1);
        assert!(matches!(
            stack.write_channels(1, &pair),
            Err(CoreError::ShapeMismatch { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn from_vec_checks_length() {
        assert!(Tensor::from_vec(1, 2, 2, vec![0.0; 3]).is_err());
    }
}
