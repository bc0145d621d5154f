//! Command implementations
//!
//! This module contains implementations for all CLI subcommands. Each command
//! receives the shared [`CommandContext`] built once by the dispatcher.

use branchbox_core::config::Config;
use branchbox_core::docker::CliRuntime;
use branchbox_core::logging::Logger;

pub mod attach;
pub mod create;
pub mod lifecycle;
pub mod list;
pub mod remove;
pub mod sync;

/// Engine, configuration and logging handle shared by all commands
pub struct CommandContext {
    pub docker: CliRuntime,
    pub config: Config,
    pub logger: Logger,
}
