// twostream-cli/src/lib.rs
//
// Library portion of the twostream CLI application.
// Contains argument definitions and command logic.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

// Re-export items needed by the binary or integration tests
pub use cli::{AggregateArgs, Cli, Commands, IndexArgs, VerifyArgs};
pub use commands::aggregate::run_aggregate;
pub use commands::index::run_index;
pub use commands::verify::run_verify;
