//! Temporal sampling: clip indexing and frame stacking.
//!
//! - `indexer`: train ranges, the evaluation grid and per-draw offset resolution
//! - `assembler`: loading a resolved window into an input tensor

pub mod assembler;
pub mod indexer;

pub use assembler::FrameBatchAssembler;
pub use indexer::{
    EvalClipKey, TrainClipKey, build_eval_index, build_train_index, resolve_train_offset,
};
