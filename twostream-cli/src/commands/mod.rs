// twostream-cli/src/commands/mod.rs
//
// Command implementations for the CLI.
//
// Each submodule contains the implementation of a specific command.

use anyhow::{Context, Result};
use twostream_core::MetadataStore;

use crate::cli::SplitArgs;

/// Builds the train and evaluation indexes and reports their sizes.
pub mod index;

/// Turns per-clip score lines into video-level accuracy.
pub mod aggregate;

/// Reads every evaluation clip from disk once.
pub mod verify;

/// Loads the split described by the command's metadata flags.
pub(crate) fn load_store(split: &SplitArgs) -> Result<MetadataStore> {
    MetadataStore::load(&split.frame_counts, &split.split, split.class_index.as_deref())
        .with_context(|| format!("Failed to load split '{}'", split.split.display()))
}
