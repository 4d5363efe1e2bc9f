// twostream-cli/src/commands/verify.rs
//
// Implementation of the 'verify' subcommand.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;
use owo_colors::OwoColorize;
use twostream_core::pipeline::{BatchLoader, LoadOutcome};
use twostream_core::progress::pass_progress;
use twostream_core::{ClipDataset, DatasetMode, ImageFrameLoader, ResizeToTensor};

use crate::cli::VerifyArgs;
use crate::commands::load_store;
use crate::config::resolve_core_config;

/// Returns the number of clips that were assembled.
pub fn run_verify(args: &VerifyArgs) -> Result<usize> {
    let config = resolve_core_config(&args.overrides)?;
    let store = load_store(&args.split)?;
    let loader = ImageFrameLoader::new(&args.frame_root).with_extension(&args.extension);
    let transform = ResizeToTensor::new(config.frame_height, config.frame_width);
    let dataset = ClipDataset::new(
        DatasetMode::Evaluate,
        &store,
        &config,
        Arc::new(loader),
        Arc::new(transform),
    )?;
    info!(
        "Verifying {} clips of {} videos under {}",
        dataset.len(),
        dataset.video_count(),
        args.frame_root.display()
    );

    let batches = BatchLoader::new(&dataset, &config);
    let progress = pass_progress(batches.num_batches(), "Verify", args.progress);
    let start = Instant::now();
    let mut clips = 0usize;
    let outcome = batches
        .run(0, &AtomicBool::new(false), |batch| {
            clips += batch.samples.len();
            progress.inc(1);
            Ok(())
        })
        .context("Frame verification failed")?;
    progress.finish_and_clear();

    if let LoadOutcome::Cancelled { batches } = outcome {
        anyhow::bail!("Verification stopped after {} batches", batches);
    }
    println!(
        "{} {} clips assembled in {:.1}s",
        "[OK]".green(),
        clips.bold(),
        start.elapsed().as_secs_f64()
    );
    Ok(clips)
}
