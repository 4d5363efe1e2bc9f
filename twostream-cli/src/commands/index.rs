// twostream-cli/src/commands/index.rs
//
// Implementation of the 'index' subcommand.

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use log::info;
use owo_colors::OwoColorize;
use serde::Serialize;
use twostream_core::{build_eval_index, build_train_index};

use crate::cli::IndexArgs;
use crate::commands::load_store;
use crate::config::resolve_core_config;

/// One evaluation clip in the exported key list.
#[derive(Debug, Serialize)]
struct EvalKeyLine<'a> {
    video_id: &'a str,
    start_offset: u32,
    label: usize,
}

pub fn run_index(args: &IndexArgs) -> Result<()> {
    let config = resolve_core_config(&args.overrides)?;
    let store = load_store(&args.split)?;
    info!("Loaded {} videos from {}", store.len(), args.split.split.display());

    let train = build_train_index(store.records(), config.window)?;
    let eval = build_eval_index(store.records(), config.window, config.num_samples)?;

    println!("{}", "Clip index".bold());
    println!("  Videos:           {}", store.len());
    println!("  Window:           {}", config.window);
    println!("  Training keys:    {}", train.len());
    println!(
        "  Evaluation clips: {} ({} per video)",
        eval.len(),
        config.num_samples
    );

    if let Some(path) = &args.output {
        let lines: Vec<EvalKeyLine<'_>> = eval
            .iter()
            .map(|(key, label)| EvalKeyLine {
                video_id: &key.video_id,
                start_offset: key.start_offset,
                label: *label,
            })
            .collect();
        let file = File::create(path)
            .with_context(|| format!("Failed to create '{}'", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &lines)?;
        println!("{} Wrote evaluation keys to {}", "[OK]".green(), path.display());
    }
    Ok(())
}
