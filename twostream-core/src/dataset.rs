//! Clip dataset: the indexed keys of one split plus everything needed to
//! turn a key into a sample.
//!
//! The mode is fixed at construction. `Train` draws a fresh start offset for
//! every view on every fetch and yields `(views, label)`; `Evaluate` walks
//! the fixed grid and yields `(video_id, views, label)` so scores can be
//! grouped by video.
//! No per-fetch state is stored on the dataset, so `get` can be called from
//! any number of threads at once.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use log::info;
use rand::Rng;

use crate::config::CoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::frames::{FrameLoader, FrameTransform, View};
use crate::metadata::MetadataStore;
use crate::sampling::{
    EvalClipKey, FrameBatchAssembler, TrainClipKey, build_eval_index, build_train_index,
    resolve_train_offset,
};
use crate::tensor::Tensor;

/// Which sampling scheme a dataset uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetMode {
    Train,
    Evaluate,
}

impl FromStr for DatasetMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "train" => Ok(DatasetMode::Train),
            "eval" | "evaluate" | "val" | "test" => Ok(DatasetMode::Evaluate),
            other => Err(CoreError::InvalidMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for DatasetMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetMode::Train => write!(f, "train"),
            DatasetMode::Evaluate => write!(f, "evaluate"),
        }
    }
}

/// One assembled sample. `views` holds one tensor per view of the clip.
#[derive(Debug, Clone)]
pub enum Sample {
    Train {
        views: Vec<Tensor>,
        label: usize,
    },
    Evaluate {
        video_id: String,
        views: Vec<Tensor>,
        label: usize,
    },
}

impl Sample {
    #[must_use]
    pub fn label(&self) -> usize {
        match self {
            Sample::Train { label, .. } | Sample::Evaluate { label, .. } => *label,
        }
    }

    #[must_use]
    pub fn views(&self) -> &[Tensor] {
        match self {
            Sample::Train { views, .. } | Sample::Evaluate { views, .. } => views,
        }
    }

    /// The first (and usually only) view.
    #[must_use]
    pub fn tensor(&self) -> &Tensor {
        &self.views()[0]
    }

    #[must_use]
    pub fn video_id(&self) -> Option<&str> {
        match self {
            Sample::Train { .. } => None,
            Sample::Evaluate { video_id, .. } => Some(video_id),
        }
    }
}

#[derive(Debug, Clone)]
enum ClipIndex {
    Train(Vec<(TrainClipKey, usize)>),
    Evaluate(Vec<(EvalClipKey, usize)>),
}

/// Indexed clips of one split in one mode.
#[derive(Clone)]
pub struct ClipDataset {
    mode: DatasetMode,
    index: ClipIndex,
    window: u32,
    views: usize,
    assembler: FrameBatchAssembler,
    loader: Arc<dyn FrameLoader>,
    transform: Arc<dyn FrameTransform>,
}

impl std::fmt::Debug for ClipDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipDataset")
            .field("mode", &self.mode)
            .field("len", &self.len())
            .field("window", &self.window)
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

impl ClipDataset {
    /// Indexes `store` for `mode`.
    pub fn new(
        mode: DatasetMode,
        store: &MetadataStore,
        config: &CoreConfig,
        loader: Arc<dyn FrameLoader>,
        transform: Arc<dyn FrameTransform>,
    ) -> CoreResult<Self> {
        config.validate()?;
        let index = match mode {
            DatasetMode::Train => {
                ClipIndex::Train(build_train_index(store.records(), config.window)?.into_iter().collect())
            }
            DatasetMode::Evaluate => ClipIndex::Evaluate(
                build_eval_index(store.records(), config.window, config.num_samples)?
                    .into_iter()
                    .collect(),
            ),
        };

        let dataset = Self {
            mode,
            index,
            window: config.window,
            views: config.views,
            assembler: FrameBatchAssembler::new(config.modality, config.frame_height, config.frame_width),
            loader,
            transform,
        };
        info!(
            "{} dataset: {} clips from {} videos, input shape {:?}",
            mode,
            dataset.len(),
            store.len(),
            dataset.assembler.output_shape(config.window)
        );
        Ok(dataset)
    }

    /// Like `new`, with the mode given as a string (`train`, `eval`, `val`, ...).
    pub fn from_mode_str(
        mode: &str,
        store: &MetadataStore,
        config: &CoreConfig,
        loader: Arc<dyn FrameLoader>,
        transform: Arc<dyn FrameTransform>,
    ) -> CoreResult<Self> {
        Self::new(mode.parse()?, store, config, loader, transform)
    }

    #[must_use]
    pub fn mode(&self) -> DatasetMode {
        self.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match &self.index {
            ClipIndex::Train(keys) => keys.len(),
            ClipIndex::Evaluate(keys) => keys.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct videos behind the clips.
    #[must_use]
    pub fn video_count(&self) -> usize {
        match &self.index {
            ClipIndex::Train(keys) => keys.len(),
            ClipIndex::Evaluate(keys) => keys
                .iter()
                .map(|(key, _)| key.video_id.as_str())
                .collect::<BTreeSet<_>>()
                .len(),
        }
    }

    /// Evaluation keys in index order; empty for a training dataset.
    pub fn eval_keys(&self) -> impl Iterator<Item = &EvalClipKey> {
        let keys: &[(EvalClipKey, usize)] = match &self.index {
            ClipIndex::Evaluate(keys) => keys,
            ClipIndex::Train(_) => &[],
        };
        keys.iter().map(|(key, _)| key)
    }

    /// Assembles sample `index`.
    ///
    /// Every view of a training sample draws its own start offset from `rng`.
    /// Evaluation views share the grid offset. In both modes view `i` is
    /// transformed as `View::new(i, views)`, so the transform can crop each
    /// view differently.
    pub fn get<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> CoreResult<Sample> {
        let out_of_range = || {
            CoreError::InvalidConfig(format!("sample index {index} out of range for {} clips", self.len()))
        };
        match &self.index {
            ClipIndex::Train(keys) => {
                let (key, label) = keys.get(index).ok_or_else(out_of_range)?;
                let views = (0..self.views)
                    .map(|i| {
                        let start_offset = resolve_train_offset(key, rng);
                        self.assemble_view(&key.video_id, start_offset, i)
                    })
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(Sample::Train { views, label: *label })
            }
            ClipIndex::Evaluate(keys) => {
                let (key, label) = keys.get(index).ok_or_else(out_of_range)?;
                let views = (0..self.views)
                    .map(|i| self.assemble_view(&key.video_id, key.start_offset, i))
                    .collect::<CoreResult<Vec<_>>>()?;
                Ok(Sample::Evaluate {
                    video_id: key.video_id.clone(),
                    views,
                    label: *label,
                })
            }
        }
    }

    fn assemble_view(&self, video_id: &str, start_offset: u32, view: usize) -> CoreResult<Tensor> {
        self.assembler.assemble(
            video_id,
            start_offset,
            self.window,
            self.loader.as_ref(),
            self.transform.as_ref(),
            View::new(view, self.views),
        )
    }
}
