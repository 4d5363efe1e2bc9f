// twostream-core/tests/pipeline_tests.rs
//
// End-to-end passes with synthetic frames and stand-in models.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, GrayImage, Luma};
use twostream_core::frames::{FrameChannel, FrameLoader, FrameTransform, View};
use twostream_core::pipeline::{
    BatchLoader, EvalOutcome, PassOptions, ScoreModel, StepOutput, TrainStep, evaluate_pass,
    train_epoch,
};
use twostream_core::{
    ClipDataset, CoreConfig, CoreConfigBuilder, CoreError, CoreResult, DatasetMode, MetadataStore,
    Modality, ResizeToTensor, Sample, Tensor, VideoLevelAggregator, VideoRecord,
};

/// Pixel value = `class_hint * 100 + frame_index` (frame indices stay below 100).
struct SyntheticFrames {
    class_hint: HashMap<String, u8>,
}

impl FrameLoader for SyntheticFrames {
    fn load(&self, video_id: &str, frame_index: u32, _channel: FrameChannel) -> CoreResult<DynamicImage> {
        let hint = self.class_hint.get(video_id).ok_or_else(|| CoreError::MissingFrame {
            video_id: video_id.to_string(),
            frame_index,
        })?;
        let value = hint * 100 + frame_index as u8;
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([value]))))
    }
}

struct RawPixel;

impl FrameTransform for RawPixel {
    fn apply(&self, image: &DynamicImage, _channel: FrameChannel, _view: View) -> CoreResult<Tensor> {
        Tensor::from_vec(1, 1, 1, vec![f32::from(image.to_luma8().get_pixel(0, 0)[0])])
    }
}

/// Raw pixel plus `1000 * view index`, so each view's contribution is visible.
struct ViewTagged;

impl FrameTransform for ViewTagged {
    fn apply(&self, image: &DynamicImage, _channel: FrameChannel, view: View) -> CoreResult<Tensor> {
        let value = f32::from(image.to_luma8().get_pixel(0, 0)[0]) + 1000.0 * view.index as f32;
        Tensor::from_vec(1, 1, 1, vec![value])
    }
}

/// Scores `[first value, 1]`.
struct FirstValueModel;

impl ScoreModel for FirstValueModel {
    fn num_classes(&self) -> usize {
        2
    }

    fn score(&self, input: &Tensor) -> CoreResult<Vec<f32>> {
        Ok(vec![input.data()[0], 1.0])
    }
}

/// One-hot on the class hint carried by the first pixel.
struct HintModel {
    cancel_after_first: Option<Arc<AtomicBool>>,
}

impl ScoreModel for HintModel {
    fn num_classes(&self) -> usize {
        2
    }

    fn score(&self, input: &Tensor) -> CoreResult<Vec<f32>> {
        if let Some(flag) = &self.cancel_after_first {
            flag.store(true, Ordering::SeqCst);
        }
        let class = (input.data()[0] / 100.0).floor() as usize;
        let mut scores = vec![0.0; 2];
        scores[class] = 1.0;
        Ok(scores)
    }
}

fn store() -> MetadataStore {
    [
        VideoRecord { id: "a".into(), frame_count: 40, label: 0 },
        VideoRecord { id: "b".into(), frame_count: 29, label: 1 },
        VideoRecord { id: "c".into(), frame_count: 60, label: 1 },
    ]
    .into_iter()
    .collect()
}

fn frames() -> Arc<SyntheticFrames> {
    // "b" looks like class 0 although it is labeled 1.
    let class_hint = [("a", 0u8), ("b", 0), ("c", 1)]
        .into_iter()
        .map(|(id, hint)| (id.to_string(), hint))
        .collect();
    Arc::new(SyntheticFrames { class_hint })
}

fn config(batch_size: usize) -> CoreConfig {
    CoreConfigBuilder::new()
        .modality(Modality::Flow)
        .window(10)
        .num_samples(19)
        .frame_size(1, 1)
        .batch_size(batch_size)
        .workers(3)
        .queue_capacity(2)
        .num_classes(2)
        .top_k(2)
        .build()
}

#[test]
fn evaluation_reduces_clips_to_videos() {
    let config = config(7);
    let dataset = ClipDataset::new(DatasetMode::Evaluate, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    assert_eq!(dataset.len(), 57);
    assert_eq!(dataset.video_count(), 3);

    let loader = BatchLoader::new(&dataset, &config);
    let mut aggregator = VideoLevelAggregator::new();
    let model = HintModel { cancel_after_first: None };
    let outcome = evaluate_pass(
        &loader,
        &model,
        &mut aggregator,
        &AtomicBool::new(false),
        PassOptions::from(&config),
    )
    .unwrap();

    let EvalOutcome::Completed(metrics) = outcome else {
        panic!("pass should complete");
    };
    assert_eq!(metrics.videos, 3);
    assert!((metrics.top1 - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.topk, 100.0);
    assert_eq!(metrics.predictions["b"], 0);

    let a = aggregator.accumulator().get("a").unwrap();
    assert_eq!(a.clips, 19);
    assert_eq!(a.scores, vec![19.0, 0.0]);
}

#[test]
fn cancelled_evaluation_keeps_whole_batches_only() {
    // One batch per video: the grid is ordered by video then offset.
    let config = config(19);
    let dataset = ClipDataset::new(DatasetMode::Evaluate, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config);
    let cancel = Arc::new(AtomicBool::new(false));
    let model = HintModel { cancel_after_first: Some(Arc::clone(&cancel)) };
    let mut aggregator = VideoLevelAggregator::new();

    let outcome = evaluate_pass(&loader, &model, &mut aggregator, &cancel, PassOptions::from(&config)).unwrap();
    assert_eq!(outcome, EvalOutcome::Cancelled { recorded: 1, expected: 3 });
    assert_eq!(aggregator.accumulator().get("a").unwrap().clips, 19);
}

#[test]
fn evaluation_aborts_on_missing_frames() {
    let config = config(8);
    let mut records: Vec<VideoRecord> = store().records().cloned().collect();
    records.push(VideoRecord { id: "ghost".into(), frame_count: 40, label: 0 });
    let store: MetadataStore = records.into_iter().collect();
    let dataset = ClipDataset::new(DatasetMode::Evaluate, &store, &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config);
    let mut aggregator = VideoLevelAggregator::new();

    let result = evaluate_pass(
        &loader,
        &HintModel { cancel_after_first: None },
        &mut aggregator,
        &AtomicBool::new(false),
        PassOptions::from(&config),
    );
    assert!(matches!(
        result,
        Err(CoreError::MissingFrame { ref video_id, .. }) if video_id == "ghost"
    ));
}

#[test]
fn evaluate_pass_rejects_training_dataset() {
    let config = config(4);
    let dataset = ClipDataset::new(DatasetMode::Train, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config);
    let result = evaluate_pass(
        &loader,
        &HintModel { cancel_after_first: None },
        &mut VideoLevelAggregator::new(),
        &AtomicBool::new(false),
        PassOptions::from(&config),
    );
    assert!(matches!(result, Err(CoreError::InvalidMode(_))));
}

/// Records the start offset of every sample it is given.
#[derive(Default)]
struct RecordingStep {
    seen: Arc<Mutex<Vec<(usize, u32)>>>,
}

impl TrainStep for RecordingStep {
    fn step(&mut self, samples: &[Sample]) -> CoreResult<StepOutput> {
        let mut scores = Vec::with_capacity(samples.len());
        for sample in samples {
            let Sample::Train { label, .. } = sample else {
                return Err(CoreError::InvalidMode("evaluate".to_string()));
            };
            let first = sample.tensor().data()[0] as u32 % 100;
            self.seen.lock().unwrap().push((*label, first));
            let mut row = vec![0.0; 2];
            row[*label] = 1.0;
            scores.push(row);
        }
        Ok(StepOutput { scores, loss: 0.25 })
    }
}

fn offsets_for_epoch(seed: u64, epoch: u64) -> Vec<(usize, u32)> {
    let config = config(2);
    let dataset = ClipDataset::new(DatasetMode::Train, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config).with_seed(seed);
    let mut step = RecordingStep::default();
    let stats = train_epoch(&loader, &mut step, epoch, &AtomicBool::new(false), PassOptions::from(&config)).unwrap();
    assert_eq!(stats.batches, 2);
    assert_eq!(stats.top1, 100.0);
    assert!((stats.loss - 0.25).abs() < 1e-12);
    assert!(!stats.cancelled);
    let seen = step.seen.lock().unwrap().clone();
    seen
}

#[test]
fn training_offsets_stay_in_range_and_are_reproducible() {
    let first = offsets_for_epoch(11, 0);
    assert_eq!(first.len(), 3);
    assert_eq!(first, offsets_for_epoch(11, 0));

    // Per-video bounds: a has 31 legal starts, b 20, c 51.
    let mut seen_all = Vec::new();
    for epoch in 0..20 {
        seen_all.extend(offsets_for_epoch(5, epoch));
    }
    assert!(seen_all.iter().all(|(_, offset)| *offset >= 1 && *offset <= 51));
    let distinct: std::collections::BTreeSet<u32> = seen_all.iter().map(|(_, o)| *o).collect();
    assert!(distinct.len() > 3);
}

#[test]
fn train_dataset_yields_fresh_windows() {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    let config = config(1);
    let dataset = ClipDataset::new(DatasetMode::Train, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let mut rng = StdRng::seed_from_u64(3);
    // Index 1 is video "b": 29 frames, window 10.
    let offsets: Vec<u32> = (0..200)
        .map(|_| dataset.get(1, &mut rng).unwrap().tensor().data()[0] as u32 % 100)
        .collect();
    assert!(offsets.iter().all(|o| (1..=20).contains(o)));
    assert!(offsets.iter().any(|o| *o != offsets[0]));
}

#[test]
fn evaluation_sums_every_view_of_a_clip() {
    let config = CoreConfigBuilder::from_config(config(5)).views(2).build();
    let dataset = ClipDataset::new(DatasetMode::Evaluate, &store(), &config, frames(), Arc::new(ViewTagged)).unwrap();
    let loader = BatchLoader::new(&dataset, &config);
    let mut aggregator = VideoLevelAggregator::new();

    let outcome = evaluate_pass(
        &loader,
        &FirstValueModel,
        &mut aggregator,
        &AtomicBool::new(false),
        PassOptions::from(&config),
    )
    .unwrap();
    assert!(matches!(outcome, EvalOutcome::Completed(_)));

    // Video "a": offsets 1..=19, views score s and s + 1000.
    let a = aggregator.accumulator().get("a").unwrap();
    assert_eq!(a.clips, 19);
    assert_eq!(a.scores, vec![2.0 * 190.0 + 19.0 * 1000.0, 38.0]);
}

#[test]
fn evaluation_rejects_model_with_other_class_count() {
    let config = CoreConfigBuilder::from_config(config(4)).num_classes(3).top_k(2).build();
    let dataset = ClipDataset::new(DatasetMode::Evaluate, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config);
    let result = evaluate_pass(
        &loader,
        &HintModel { cancel_after_first: None },
        &mut VideoLevelAggregator::new(),
        &AtomicBool::new(false),
        PassOptions::from(&config),
    );
    assert!(matches!(result, Err(CoreError::InvalidConfig(_))));
}

/// Records the start offset of every view of every sample.
#[derive(Default)]
struct ViewRecordingStep {
    views: Vec<Vec<u32>>,
}

impl TrainStep for ViewRecordingStep {
    fn step(&mut self, samples: &[Sample]) -> CoreResult<StepOutput> {
        for sample in samples {
            self.views
                .push(sample.views().iter().map(|v| v.data()[0] as u32 % 100).collect());
        }
        let scores = samples
            .iter()
            .map(|s| {
                let mut row = vec![0.0; 2];
                row[s.label()] = 1.0;
                row
            })
            .collect();
        Ok(StepOutput { scores, loss: 0.5 })
    }
}

#[test]
fn training_views_draw_their_own_offsets() {
    let config = CoreConfigBuilder::from_config(config(3)).views(3).build();
    let dataset = ClipDataset::new(DatasetMode::Train, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config).with_seed(9);
    let mut step = ViewRecordingStep::default();
    for epoch in 0..4 {
        train_epoch(&loader, &mut step, epoch, &AtomicBool::new(false), PassOptions::from(&config)).unwrap();
    }

    assert_eq!(step.views.len(), 12);
    assert!(step.views.iter().all(|views| views.len() == 3));
    assert!(step.views.iter().any(|views| views.iter().any(|o| *o != views[0])));
}

/// Pixel value grows with both coordinates and the frame number.
struct GradientFrames;

impl FrameLoader for GradientFrames {
    fn load(&self, _video_id: &str, frame_index: u32, _channel: FrameChannel) -> CoreResult<DynamicImage> {
        let shift = (frame_index % 2) as u8;
        Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(16, 16, |x, y| {
            Luma([(x * 12 + y * 3) as u8 + shift])
        })))
    }
}

fn assert_views_distinct(sample: &Sample) {
    let views = sample.views();
    assert_eq!(views.len(), 4);
    for (i, a) in views.iter().enumerate() {
        for b in &views[i + 1..] {
            assert_ne!(a.data(), b.data());
        }
    }
}

#[test]
fn views_of_one_sample_differ() {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    let store: MetadataStore = [VideoRecord { id: "long".into(), frame_count: 200, label: 0 }]
        .into_iter()
        .collect();
    let config = CoreConfigBuilder::new()
        .modality(Modality::Flow)
        .window(2)
        .num_samples(4)
        .frame_size(4, 4)
        .views(4)
        .num_classes(2)
        .build();
    let mut rng = StdRng::seed_from_u64(1);

    for mode in [DatasetMode::Train, DatasetMode::Evaluate] {
        let dataset = ClipDataset::new(
            mode,
            &store,
            &config,
            Arc::new(GradientFrames),
            Arc::new(ResizeToTensor::new(4, 4)),
        )
        .unwrap();
        assert_views_distinct(&dataset.get(0, &mut rng).unwrap());
    }
}

/// Fails on the second batch.
struct FailingStep {
    calls: usize,
}

impl TrainStep for FailingStep {
    fn step(&mut self, samples: &[Sample]) -> CoreResult<StepOutput> {
        self.calls += 1;
        if self.calls == 2 {
            return Err(CoreError::Model("diverged".to_string()));
        }
        Ok(StepOutput {
            scores: samples.iter().map(|_| vec![1.0, 0.0]).collect(),
            loss: 1.0,
        })
    }
}

#[test]
fn failed_training_step_ends_the_epoch_with_its_error() {
    let config = config(1);
    let dataset = ClipDataset::new(DatasetMode::Train, &store(), &config, frames(), Arc::new(RawPixel)).unwrap();
    let loader = BatchLoader::new(&dataset, &config).with_seed(2);
    let mut step = FailingStep { calls: 0 };
    let options = PassOptions {
        show_progress: true,
        ..PassOptions::from(&config)
    };
    let result = train_epoch(&loader, &mut step, 0, &AtomicBool::new(false), options);
    assert!(matches!(result, Err(CoreError::Model(ref message)) if message == "diverged"));
    assert_eq!(step.calls, 2);
}
