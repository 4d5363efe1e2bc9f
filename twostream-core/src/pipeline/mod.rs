//! Batched sample production and the passes that consume it.

pub mod loader;
pub mod passes;

pub use loader::{Batch, BatchLoader, LoadOutcome};
pub use passes::{
    EpochStats, EvalOutcome, PassOptions, ScoreModel, StepOutput, TrainStep, evaluate_pass,
    train_epoch,
};
