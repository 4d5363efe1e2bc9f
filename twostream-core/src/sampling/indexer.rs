//! Clip indexing: which frame windows a video contributes.
//!
//! Training keeps one key per video carrying the range of legal start
//! offsets; the concrete offset is drawn every time the sample is fetched.
//! Evaluation enumerates a fixed grid of `num_samples` offsets per video, so
//! repeated indexing of the same metadata always yields the same keys.

use std::collections::BTreeMap;

use log::debug;
use rand::Rng;

use crate::error::{CoreError, CoreResult};
use crate::metadata::VideoRecord;

/// Training key: the start offset is resolved per draw from `[1, max_start_offset]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrainClipKey {
    pub video_id: String,
    pub max_start_offset: u32,
}

/// Evaluation key: a fixed 1-based start offset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvalClipKey {
    pub video_id: String,
    pub start_offset: u32,
}

fn check_window(window: u32) -> CoreResult<()> {
    if window == 0 {
        return Err(CoreError::InvalidConfig("window must be greater than zero".to_string()));
    }
    Ok(())
}

/// Number of legal start offsets, or `InvalidWindow` if the window does not fit.
/// `window` is at least 1.
fn max_start(record: &VideoRecord, window: u32) -> CoreResult<u32> {
    record
        .frame_count
        .checked_sub(window - 1)
        .filter(|max_start| *max_start >= 1)
        .ok_or_else(|| CoreError::InvalidWindow {
            video_id: record.id.clone(),
            frame_count: record.frame_count,
            window,
        })
}

/// Builds the training index: one key per video.
///
/// Fails as a whole on the first video that cannot hold `window` frames, so
/// no partial key is ever produced.
pub fn build_train_index<'a, I>(records: I, window: u32) -> CoreResult<BTreeMap<TrainClipKey, usize>>
where
    I: IntoIterator<Item = &'a VideoRecord>,
{
    check_window(window)?;
    let mut index = BTreeMap::new();
    for record in records {
        let max_start_offset = max_start(record, window)?;
        index.insert(
            TrainClipKey {
                video_id: record.id.clone(),
                max_start_offset,
            },
            record.label,
        );
    }
    debug!("Training index: {} videos, window {}", index.len(), window);
    Ok(index)
}

/// Builds the evaluation grid: `num_samples` evenly spaced offsets per video.
///
/// `interval = floor((frame_count - window + 1) / num_samples)` and offsets
/// are `i * interval + 1` for `i` in `0..num_samples`.
pub fn build_eval_index<'a, I>(records: I, window: u32, num_samples: u32) -> CoreResult<BTreeMap<EvalClipKey, usize>>
where
    I: IntoIterator<Item = &'a VideoRecord>,
{
    check_window(window)?;
    if num_samples == 0 {
        return Err(CoreError::InvalidConfig("num_samples must be greater than zero".to_string()));
    }

    let mut index = BTreeMap::new();
    for record in records {
        let interval = max_start(record, window)? / num_samples;
        if interval < 1 {
            return Err(CoreError::InvalidWindow {
                video_id: record.id.clone(),
                frame_count: record.frame_count,
                window,
            });
        }
        for sample_index in 0..num_samples {
            index.insert(
                EvalClipKey {
                    video_id: record.id.clone(),
                    start_offset: sample_index * interval + 1,
                },
                record.label,
            );
        }
    }
    debug!(
        "Evaluation index: {} clips, {} per video, window {}",
        index.len(),
        num_samples,
        window
    );
    Ok(index)
}

/// Draws a start offset uniformly from `[1, key.max_start_offset]`.
///
/// Called once per fetch, so the same key yields different windows across
/// epochs.
pub fn resolve_train_offset<R: Rng + ?Sized>(key: &TrainClipKey, rng: &mut R) -> u32 {
    rng.gen_range(1..=key.max_start_offset.max(1))
}
