//! Video-level aggregation: clip scores to video predictions.
//!
//! During an evaluation pass every clip's (view-combined) score vector is
//! added to its video's running vector. After the pass, the running vector
//! decides the video's class and top-1 / top-k accuracy is measured over
//! videos, not clips.
//!
//! Accumulation is an element-wise sum keyed by video, so it is commutative
//! and associative: clip order does not matter, and partial accumulators from
//! independent partitions can be merged. Videos are visited in lexicographic
//! order of their identifiers when metrics are computed. A call that fails
//! leaves the accumulator exactly as it was.

// ---- Standard library imports ----
use std::collections::BTreeMap;

// ---- External crate imports ----
use log::debug;
use serde::{Deserialize, Serialize};

// ---- Internal crate imports ----
use super::stream::add_into;
use crate::error::{CoreError, CoreResult};
use crate::metrics::{argmax, cross_entropy, top_k_indices};

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Running state for one video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoEntry {
    pub scores: Vec<f32>,
    /// True label, when the caller supplied it while accumulating
    pub label: Option<usize>,
    /// Number of clip vectors added so far
    pub clips: usize,
}

/// `video_id -> (running score vector, true label)` for one pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAccumulator {
    videos: BTreeMap<String, VideoEntry>,
}

impl VideoAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks that `scores` (and `label`) can be added to `video_id` without
    /// changing anything.
    fn check(&self, video_id: &str, label: Option<usize>, scores: &[f32]) -> CoreResult<()> {
        let Some(entry) = self.videos.get(video_id) else {
            return Ok(());
        };
        if let (Some(existing), Some(found)) = (entry.label, label) {
            if existing != found {
                return Err(CoreError::LabelConflict {
                    video_id: video_id.to_string(),
                    existing,
                    found,
                });
            }
        }
        if entry.scores.len() != scores.len() {
            return Err(CoreError::ShapeMismatch {
                expected: entry.scores.len(),
                found: scores.len(),
            });
        }
        Ok(())
    }

    /// Adds one clip's scores to its video, initializing the video on first
    /// sight. On error the accumulator is unchanged.
    pub fn add(&mut self, video_id: &str, label: Option<usize>, scores: &[f32]) -> CoreResult<()> {
        self.check(video_id, label, scores)?;
        match self.videos.get_mut(video_id) {
            Some(entry) => {
                add_into(&mut entry.scores, scores)?;
                entry.label = entry.label.or(label);
                entry.clips += 1;
            }
            None => {
                self.videos.insert(
                    video_id.to_string(),
                    VideoEntry {
                        scores: scores.to_vec(),
                        label,
                        clips: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Folds `other` into `self` with the same semantics as `add`.
    ///
    /// Every video of `other` is checked before any is merged, so a
    /// conflicting partition leaves `self` unchanged.
    pub fn merge(&mut self, other: VideoAccumulator) -> CoreResult<()> {
        for (video_id, entry) in &other.videos {
            self.check(video_id, entry.label, &entry.scores)?;
        }
        for (video_id, entry) in other.videos {
            match self.videos.get_mut(&video_id) {
                Some(existing) => {
                    add_into(&mut existing.scores, &entry.scores)?;
                    existing.label = existing.label.or(entry.label);
                    existing.clips += entry.clips;
                }
                None => {
                    self.videos.insert(video_id, entry);
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, video_id: &str) -> Option<&VideoEntry> {
        self.videos.get(video_id)
    }

    /// Entries in lexicographic video order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VideoEntry)> {
        self.videos.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.videos.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn clear(&mut self) {
        self.videos.clear();
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Video-level result of one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetrics {
    /// Percentage of videos whose argmax equals the label, in `[0, 100]`
    pub top1: f64,
    /// Percentage of videos whose label is among the `k` best classes
    pub topk: f64,
    pub k: usize,
    /// Mean softmax cross-entropy of the video vectors
    pub loss: f64,
    pub videos: usize,
    pub predictions: BTreeMap<String, usize>,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Owns the accumulator of an evaluation pass.
///
/// Not synchronized: exactly one consumer calls `accumulate`. Parallel
/// producers either hand their results to that consumer or build separate
/// accumulators and `merge` them.
#[derive(Debug, Clone, Default)]
pub struct VideoLevelAggregator {
    accumulator: VideoAccumulator,
}

impl VideoLevelAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all recorded videos. Call at the start of every pass.
    pub fn reset(&mut self) {
        self.accumulator.clear();
    }

    /// Adds a clip's score vector to its video.
    pub fn accumulate(&mut self, video_id: &str, scores: &[f32]) -> CoreResult<()> {
        self.accumulator.add(video_id, None, scores)
    }

    /// Adds a clip's score vector and records the video's true label.
    pub fn accumulate_labeled(&mut self, video_id: &str, label: usize, scores: &[f32]) -> CoreResult<()> {
        self.accumulator.add(video_id, Some(label), scores)
    }

    /// Merges a partition's accumulator.
    pub fn merge(&mut self, partial: VideoAccumulator) -> CoreResult<()> {
        self.accumulator.merge(partial)
    }

    #[must_use]
    pub fn accumulator(&self) -> &VideoAccumulator {
        &self.accumulator
    }

    /// Number of distinct videos recorded so far.
    #[must_use]
    pub fn recorded_videos(&self) -> usize {
        self.accumulator.len()
    }

    /// Computes video-level top-1 / top-k accuracy.
    ///
    /// Labels come from `labels`, falling back to the label recorded while
    /// accumulating. Videos are visited in lexicographic order; argmax and
    /// top-k ties go to the lowest class index.
    pub fn finalize(&self, labels: &BTreeMap<String, usize>, k: usize) -> CoreResult<VideoMetrics> {
        if self.accumulator.is_empty() {
            return Err(CoreError::EmptyAccumulator);
        }

        let mut top1_hits = 0usize;
        let mut topk_hits = 0usize;
        let mut loss_sum = 0.0f64;
        let mut predictions = BTreeMap::new();

        for (video_id, entry) in self.accumulator.iter() {
            let label = match (labels.get(video_id), entry.label) {
                (Some(&given), Some(recorded)) if given != recorded => {
                    return Err(CoreError::LabelConflict {
                        video_id: video_id.clone(),
                        existing: recorded,
                        found: given,
                    });
                }
                (Some(&given), _) => given,
                (None, Some(recorded)) => recorded,
                (None, None) => return Err(CoreError::UnknownVideo(video_id.clone())),
            };

            let predicted = argmax(&entry.scores).ok_or(CoreError::ShapeMismatch {
                expected: label + 1,
                found: 0,
            })?;
            if predicted == label {
                top1_hits += 1;
            }
            if top_k_indices(&entry.scores, k).contains(&label) {
                topk_hits += 1;
            }
            loss_sum += cross_entropy(&entry.scores, label)?;
            predictions.insert(video_id.clone(), predicted);
        }

        let videos = self.accumulator.len();
        let metrics = VideoMetrics {
            top1: top1_hits as f64 * 100.0 / videos as f64,
            topk: topk_hits as f64 * 100.0 / videos as f64,
            k,
            loss: loss_sum / videos as f64,
            videos,
            predictions,
        };
        debug!(
            "Video-level: {} videos, top1 {:.3}, top{} {:.3}, loss {:.5}",
            videos, metrics.top1, k, metrics.topk, metrics.loss
        );
        Ok(metrics)
    }

    /// `finalize` using only the labels recorded while accumulating.
    pub fn finalize_recorded(&self, k: usize) -> CoreResult<VideoMetrics> {
        self.finalize(&BTreeMap::new(), k)
    }
}
