//! Training and evaluation passes over a `BatchLoader`.
//!
//! The network is an external capability: evaluation scores tensors through
//! a `ScoreModel`, training hands whole batches to a `TrainStep` that runs
//! forward, backward and update. Both passes consume batches on the calling
//! thread, which is also the only thread touching the video aggregator.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use log::info;
use serde::{Deserialize, Serialize};

use super::loader::{BatchLoader, LoadOutcome};
use crate::aggregation::{VideoLevelAggregator, VideoMetrics, combine};
use crate::config::CoreConfig;
use crate::dataset::{DatasetMode, Sample};
use crate::error::{CoreError, CoreResult};
use crate::metrics::{RunningAverage, batch_topk_accuracy};
use crate::progress::pass_progress;
use crate::tensor::Tensor;

/// Maps an input tensor to a class-score vector.
pub trait ScoreModel: Send + Sync {
    fn num_classes(&self) -> usize;

    fn score(&self, input: &Tensor) -> CoreResult<Vec<f32>>;
}

/// Result of one optimization step on a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// View-combined scores, one vector per sample in batch order
    pub scores: Vec<Vec<f32>>,
    /// Mean loss over the batch
    pub loss: f64,
}

/// One forward/backward/update step of the external model.
pub trait TrainStep {
    fn step(&mut self, samples: &[Sample]) -> CoreResult<StepOutput>;
}

/// Reporting knobs shared by both passes.
#[derive(Debug, Clone, Copy)]
pub struct PassOptions {
    /// Length every score vector must have
    pub num_classes: usize,
    pub top_k: usize,
    pub print_freq: usize,
    pub show_progress: bool,
}

impl From<&CoreConfig> for PassOptions {
    fn from(config: &CoreConfig) -> Self {
        Self {
            num_classes: config.num_classes,
            top_k: config.top_k,
            print_freq: config.print_freq.max(1),
            show_progress: false,
        }
    }
}

/// How an evaluation pass ended.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Completed(VideoMetrics),
    /// The pass was aborted; only whole batches were accumulated.
    Cancelled { recorded: usize, expected: usize },
}

/// Averages of one training epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: u64,
    pub batches: usize,
    pub loss: f64,
    pub top1: f64,
    pub topk: f64,
    pub k: usize,
    pub data_time: f64,
    pub batch_time: f64,
    pub cancelled: bool,
}

fn score_sample(model: &dyn ScoreModel, sample: &Sample) -> CoreResult<Vec<f32>> {
    let views = sample
        .views()
        .iter()
        .map(|view| {
            let scores = model.score(view)?;
            if scores.len() != model.num_classes() {
                return Err(CoreError::ShapeMismatch {
                    expected: model.num_classes(),
                    found: scores.len(),
                });
            }
            Ok(scores)
        })
        .collect::<CoreResult<Vec<_>>>()?;
    combine(&views)
}

/// Scores every evaluation clip and reduces the scores to video level.
///
/// The aggregator is reset first. Each batch is scored completely before any
/// of it is accumulated, so a failing or cancelled pass never leaves a
/// partial batch in the aggregator.
pub fn evaluate_pass(
    loader: &BatchLoader<'_>,
    model: &dyn ScoreModel,
    aggregator: &mut VideoLevelAggregator,
    cancel: &AtomicBool,
    options: PassOptions,
) -> CoreResult<EvalOutcome> {
    let dataset = loader.dataset();
    if dataset.mode() != DatasetMode::Evaluate {
        return Err(CoreError::InvalidMode(dataset.mode().to_string()));
    }

    if model.num_classes() != options.num_classes {
        return Err(CoreError::InvalidConfig(format!(
            "model scores {} classes, configured for {}",
            model.num_classes(),
            options.num_classes
        )));
    }

    aggregator.reset();
    let total = loader.num_batches();
    let progress = pass_progress(total, "Evaluate", options.show_progress);
    let mut batch_time = RunningAverage::new();
    let mut end = Instant::now();

    let outcome = loader.run(0, cancel, |batch| {
        let mut scored = Vec::with_capacity(batch.samples.len());
        for sample in &batch.samples {
            let Sample::Evaluate { video_id, label, .. } = sample else {
                return Err(CoreError::InvalidMode(DatasetMode::Train.to_string()));
            };
            scored.push((video_id.as_str(), *label, score_sample(model, sample)?));
        }
        for (video_id, label, scores) in scored {
            aggregator.accumulate_labeled(video_id, label, &scores)?;
        }

        batch_time.update(end.elapsed().as_secs_f64(), 1);
        end = Instant::now();
        progress.inc(1);
        if batch.index % options.print_freq == 0 {
            info!(
                "Test: [{}/{}]\tTime {:.3} ({:.3})",
                batch.index, total, batch_time.val, batch_time.avg
            );
        }
        Ok(())
    });
    progress.finish_and_clear();

    match outcome? {
        LoadOutcome::Cancelled { .. } => Ok(EvalOutcome::Cancelled {
            recorded: aggregator.recorded_videos(),
            expected: dataset.video_count(),
        }),
        LoadOutcome::Completed { .. } => {
            let metrics = aggregator.finalize_recorded(options.top_k)?;
            info!(
                " * Video Prec@1 {:.3} Prec@{} {:.3} Loss {:.5}",
                metrics.top1, metrics.k, metrics.topk, metrics.loss
            );
            Ok(EvalOutcome::Completed(metrics))
        }
    }
}

/// Runs one training epoch through an external step.
pub fn train_epoch(
    loader: &BatchLoader<'_>,
    step: &mut dyn TrainStep,
    epoch: u64,
    cancel: &AtomicBool,
    options: PassOptions,
) -> CoreResult<EpochStats> {
    let dataset = loader.dataset();
    if dataset.mode() != DatasetMode::Train {
        return Err(CoreError::InvalidMode(dataset.mode().to_string()));
    }

    let total = loader.num_batches();
    let progress = pass_progress(total, &format!("Epoch {epoch}"), options.show_progress);
    let mut batch_time = RunningAverage::new();
    let mut data_time = RunningAverage::new();
    let mut losses = RunningAverage::new();
    let mut top1 = RunningAverage::new();
    let mut topk = RunningAverage::new();
    let mut end = Instant::now();

    let outcome = loader.run(epoch, cancel, |batch| {
        data_time.update(end.elapsed().as_secs_f64(), 1);

        let output = step.step(&batch.samples)?;
        if let Some(row) = output.scores.iter().find(|row| row.len() != options.num_classes) {
            return Err(CoreError::ShapeMismatch {
                expected: options.num_classes,
                found: row.len(),
            });
        }
        let labels: Vec<usize> = batch.samples.iter().map(Sample::label).collect();
        let accuracy = batch_topk_accuracy(&output.scores, &labels, &[1, options.top_k])?;
        let n = batch.samples.len();
        losses.update(output.loss, n);
        top1.update(accuracy[0], n);
        topk.update(accuracy[1], n);

        batch_time.update(end.elapsed().as_secs_f64(), 1);
        end = Instant::now();
        progress.inc(1);
        if batch.index % options.print_freq == 0 {
            info!(
                "Epoch: [{}][{}/{}]\tTime {:.3} ({:.3})\tData {:.3} ({:.3})\tLoss {:.4} ({:.4})\tPrec@1 {:.3} ({:.3})\tPrec@{} {:.3} ({:.3})",
                epoch,
                batch.index,
                total,
                batch_time.val,
                batch_time.avg,
                data_time.val,
                data_time.avg,
                losses.val,
                losses.avg,
                top1.val,
                top1.avg,
                options.top_k,
                topk.val,
                topk.avg
            );
        }
        Ok(())
    });
    progress.finish_and_clear();
    let outcome = outcome?;

    Ok(EpochStats {
        epoch,
        batches: outcome.batches(),
        loss: losses.avg,
        top1: top1.avg,
        topk: topk.avg,
        k: options.top_k,
        data_time: data_time.avg,
        batch_time: batch_time.avg,
        cancelled: matches!(outcome, LoadOutcome::Cancelled { .. }),
    })
}
