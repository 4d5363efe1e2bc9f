// twostream-cli/src/cli.rs
//
// Defines the command-line argument structures using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

// --- CLI Argument Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version, // Reads from Cargo.toml via "cargo" feature in clap
    about = "Twostream: clip sampling and video-level score aggregation",
    long_about = "Indexes action-recognition splits into clips and reduces per-clip scores to video-level accuracy using the twostream-core library."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Optional: Directory for a per-run log file
    #[arg(long, global = true, value_name = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Builds the training and evaluation clip indexes for a split
    Index(IndexArgs),
    /// Reduces per-clip score lines to video-level accuracy
    Aggregate(AggregateArgs),
    /// Loads every evaluation clip once to check the extracted frames
    Verify(VerifyArgs),
}

/// Inputs that describe one dataset split.
#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// JSON table mapping video names to frame counts
    #[arg(long = "frame-counts", required = true, value_name = "JSON")]
    pub frame_counts: PathBuf,

    /// Split manifest (`<video path> [<label>]` per line)
    #[arg(long, required = true, value_name = "MANIFEST")]
    pub split: PathBuf,

    /// Optional: Class index (`<index> <ClassName>` per line) for label-less manifests
    #[arg(long = "class-index", value_name = "CLASS_INDEX")]
    pub class_index: Option<PathBuf>,
}

/// Flags that override values from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Optional: JSON file with core configuration values
    #[arg(long, value_name = "CONFIG_JSON")]
    pub config: Option<PathBuf>,

    /// Frames per clip
    #[arg(long, value_name = "FRAMES")]
    pub window: Option<u32>,

    /// Evaluation clips per video
    #[arg(long = "num-samples", value_name = "COUNT")]
    pub num_samples: Option<u32>,

    /// Input modality (rgb or flow)
    #[arg(long, value_name = "MODALITY")]
    pub modality: Option<String>,

    /// Clips per batch
    #[arg(long = "batch-size", value_name = "SIZE")]
    pub batch_size: Option<usize>,

    /// Worker threads used to load clips
    #[arg(long, value_name = "THREADS")]
    pub workers: Option<usize>,

    /// Rank cut-off for the second accuracy figure
    #[arg(long = "top-k", value_name = "K")]
    pub top_k: Option<usize>,

    /// Number of classes every score vector covers
    #[arg(long = "num-classes", value_name = "CLASSES")]
    pub num_classes: Option<usize>,
}

#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub split: SplitArgs,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Optional: Write the evaluation clip keys to this JSON file
    #[arg(short, long, value_name = "OUTPUT_JSON")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AggregateArgs {
    /// JSON-lines file of per-clip scores (`{"video_id": .., "scores": [..]}`)
    #[arg(long, required = true, value_name = "SCORES")]
    pub scores: PathBuf,

    #[command(flatten)]
    pub split: SplitArgs,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Optional: Export the accumulated video score table as JSON
    #[arg(long, value_name = "EXPORT_JSON")]
    pub export: Option<PathBuf>,

    /// Optional: Append the video-level result to this JSON-lines run record
    #[arg(long, value_name = "RECORD")]
    pub record: Option<PathBuf>,

    /// Epoch number stored in the run record
    #[arg(long, default_value_t = 0)]
    pub epoch: u64,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub split: SplitArgs,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Root directory of the extracted frames.
    /// Can also be set via the TWOSTREAM_FRAME_ROOT environment variable.
    #[arg(long = "frame-root", required = true, value_name = "DIR", env = "TWOSTREAM_FRAME_ROOT")]
    pub frame_root: PathBuf,

    /// Frame file extension
    #[arg(long, default_value = "jpg", value_name = "EXT")]
    pub extension: String,

    /// Show a progress bar
    #[arg(long, default_value_t = false)]
    pub progress: bool,
}
