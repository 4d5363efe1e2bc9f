//! Progress bars for training and evaluation passes.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a batch progress bar for a pass, or a hidden one when `visible`
/// is false (tests, non-interactive runs).
pub fn pass_progress(total_batches: usize, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total_batches as u64);
    let style = ProgressStyle::default_bar()
        .template("{prefix} [{bar:40}] {pos}/{len} batches ({elapsed} / {eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_prefix(label.to_string());
    pb
}
