//! Run records: per-epoch metric lines, best-result tracking and export of
//! video-level score tables.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::aggregation::{VideoAccumulator, VideoMetrics};
use crate::error::CoreResult;
use crate::pipeline::EpochStats;

/// Phase an epoch record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Train,
    Test,
}

/// One line of the run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: u64,
    pub phase: Phase,
    pub loss: f64,
    pub top1: f64,
    pub topk: f64,
    pub k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_time: Option<f64>,
}

impl EpochRecord {
    pub fn from_train(stats: &EpochStats) -> Self {
        Self {
            epoch: stats.epoch,
            phase: Phase::Train,
            loss: stats.loss,
            top1: stats.top1,
            topk: stats.topk,
            k: stats.k,
            batch_time: Some(stats.batch_time),
            data_time: Some(stats.data_time),
        }
    }

    pub fn from_eval(epoch: u64, metrics: &VideoMetrics) -> Self {
        Self {
            epoch,
            phase: Phase::Test,
            loss: metrics.loss,
            top1: metrics.top1,
            topk: metrics.topk,
            k: metrics.k,
            batch_time: None,
            data_time: None,
        }
    }
}

/// Appends `record` as one JSON line, creating the file if needed.
pub fn append_record(path: &Path, record: &EpochRecord) -> CoreResult<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, record)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Reads back every record of a run file.
pub fn read_records(path: &Path) -> CoreResult<Vec<EpochRecord>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}

/// Writes the accumulated video vectors and labels as pretty JSON.
pub fn export_video_predictions(path: &Path, accumulator: &VideoAccumulator) -> CoreResult<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, accumulator)?;
    writer.flush()?;
    info!("Wrote {} video predictions to {}", accumulator.len(), path.display());
    Ok(())
}

/// Remembers the best top-1 seen so far.
#[derive(Debug, Clone, Copy, Default)]
pub struct BestTracker {
    best: Option<f64>,
}

impl BestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `top1` strictly improves on every earlier value.
    pub fn observe(&mut self, top1: f64) -> bool {
        let is_best = self.best.is_none_or(|best| top1 > best);
        if is_best {
            self.best = Some(top1);
        }
        is_best
    }

    #[must_use]
    pub fn best(&self) -> Option<f64> {
        self.best
    }
}
