// twostream-cli/src/commands/aggregate.rs
//
// Implementation of the 'aggregate' subcommand.
//
// Reads per-clip score lines produced by an external model, sums the views
// of each line, accumulates the result per video and reports video-level
// accuracy against the split's labels.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use owo_colors::OwoColorize;
use serde::Deserialize;
use twostream_core::reporting::{EpochRecord, append_record, export_video_predictions};
use twostream_core::{VideoLevelAggregator, VideoMetrics, combine};

use crate::cli::AggregateArgs;
use crate::commands::load_store;
use crate::config::resolve_core_config;

/// One line of the score file. Either `scores` or `views` must be present.
#[derive(Debug, Deserialize)]
struct ScoreLine {
    video_id: String,
    #[serde(default)]
    scores: Option<Vec<f32>>,
    #[serde(default)]
    views: Vec<Vec<f32>>,
}

impl ScoreLine {
    fn into_scores(self) -> Result<(String, Vec<f32>)> {
        let scores = match (self.scores, self.views.is_empty()) {
            (Some(scores), true) => scores,
            (None, false) => combine(&self.views)?,
            (Some(_), false) => bail!("both 'scores' and 'views' given for '{}'", self.video_id),
            (None, true) => bail!("no scores given for '{}'", self.video_id),
        };
        Ok((self.video_id, scores))
    }
}

/// Feeds every line of `path` into `aggregator`, returning the line count.
///
/// Every line must carry exactly `num_classes` scores.
pub fn accumulate_score_file(
    path: &Path,
    num_classes: usize,
    aggregator: &mut VideoLevelAggregator,
) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("Failed to open score file '{}'", path.display()))?;
    let mut lines = 0usize;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ScoreLine = serde_json::from_str(&line)
            .with_context(|| format!("Invalid score line {} in '{}'", number + 1, path.display()))?;
        let (video_id, scores) = parsed
            .into_scores()
            .with_context(|| format!("Invalid score line {} in '{}'", number + 1, path.display()))?;
        if scores.len() != num_classes {
            bail!(
                "Invalid score line {} in '{}': {} scores for '{}', expected {}",
                number + 1,
                path.display(),
                scores.len(),
                video_id,
                num_classes
            );
        }
        aggregator.accumulate(&video_id, &scores)?;
        lines += 1;
    }
    debug!("Accumulated {} score lines from {}", lines, path.display());
    Ok(lines)
}

pub fn run_aggregate(args: &AggregateArgs) -> Result<VideoMetrics> {
    let config = resolve_core_config(&args.overrides)?;
    let store = load_store(&args.split)?;
    let labels = store.labels();

    let mut aggregator = VideoLevelAggregator::new();
    let lines = accumulate_score_file(&args.scores, config.num_classes, &mut aggregator)?;
    info!(
        "Read {} score lines covering {} videos",
        lines,
        aggregator.recorded_videos()
    );
    if aggregator.recorded_videos() < store.len() {
        warn!(
            "Scores cover {} of {} videos in the split",
            aggregator.recorded_videos(),
            store.len()
        );
    }

    let metrics = aggregator.finalize(&labels, config.top_k)?;

    println!("{}", "Video-level results".bold());
    println!("  Videos:   {}", metrics.videos.bold());
    println!("  Prec@1:   {}", format!("{:.2}", metrics.top1).green().bold());
    println!(
        "  Prec@{}:   {}",
        metrics.k,
        format!("{:.2}", metrics.topk).green().bold()
    );
    println!("  Loss:     {:.5}", metrics.loss);

    if let Some(path) = &args.export {
        export_video_predictions(path, aggregator.accumulator())
            .with_context(|| format!("Failed to export predictions to '{}'", path.display()))?;
        println!("{} Wrote video scores to {}", "[OK]".green(), path.display());
    }
    if let Some(path) = &args.record {
        append_record(path, &EpochRecord::from_eval(args.epoch, &metrics))
            .with_context(|| format!("Failed to append run record '{}'", path.display()))?;
    }
    Ok(metrics)
}
