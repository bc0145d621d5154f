//! Logging and observability
//!
//! This module installs the process-wide `tracing` subscriber and hands back a
//! [`Logger`] handle. The handle is passed explicitly into every component that
//! surfaces output (provisioner, installer, orchestrator, gateway) instead of being
//! looked up from a global, and it is the only source of line sinks for streamed
//! command output.
//!
//! All logging output is directed to stderr to preserve stdout for command output.

use crate::stream::LineSink;
use anyhow::Result;
use std::{io, sync::Once};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Settings chosen once at process start
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Enable debug-level output (`-v/--verbose`)
    pub verbose: bool,
    /// Output format: `None`/`"text"` for human-readable, `"json"` for structured
    pub format: Option<String>,
}

/// Explicit logging handle threaded through component constructors
#[derive(Debug, Clone, Default)]
pub struct Logger {
    verbose: bool,
}

impl Logger {
    /// Create a handle without installing a subscriber (used by tests and embedders)
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether debug-level output was requested
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Sink that surfaces each transcoded output line as an indented info event
    pub fn line_sink(&self) -> LogLineSink {
        LogLineSink { emitted: 0 }
    }
}

/// [`LineSink`] that forwards lines to the tracing subscriber
#[derive(Debug)]
pub struct LogLineSink {
    emitted: usize,
}

impl LogLineSink {
    /// Number of lines surfaced so far
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl LineSink for LogLineSink {
    fn emit(&mut self, line: &str) {
        self.emitted += 1;
        info!("  {}", line);
    }
}

/// Initialize the logging system and return the handle for this process
///
/// ## Environment Variables
///
/// * `BRANCHBOX_LOG_FORMAT` - `json` for JSON output, anything else for text
/// * `BRANCHBOX_LOG` - filter directive, takes precedence over the verbosity flag
/// * `RUST_LOG` - standard fallback filter directive
///
/// Calling this more than once is safe; only the first call installs a subscriber.
pub fn init(settings: &LogSettings) -> Result<Logger> {
    INIT.call_once(|| {
        let filter = create_env_filter(settings.verbose);

        let env_format = std::env::var("BRANCHBOX_LOG_FORMAT").ok();
        let effective_format = settings
            .format
            .as_deref()
            .or(env_format.as_deref())
            .unwrap_or("text");

        let installed = match effective_format {
            "json" => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_writer(io::stderr),
                )
                .with(filter)
                .try_init(),
            _ => tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .without_time()
                        .with_target(settings.verbose)
                        .with_level(settings.verbose)
                        .with_writer(io::stderr),
                )
                .with(filter)
                .try_init(),
        };

        if installed.is_ok() {
            tracing::debug!("Logging initialized with format: {}", effective_format);
        }
    });

    Ok(Logger::new(settings.verbose))
}

/// Build the filter: `BRANCHBOX_LOG`, then `RUST_LOG`, then the verbosity flag
fn create_env_filter(verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    let default_directive = format!("branchbox={level},branchbox_core={level}");

    if let Ok(spec) = std::env::var("BRANCHBOX_LOG") {
        return EnvFilter::try_new(&spec).unwrap_or_else(|_| EnvFilter::new(&default_directive));
    }

    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_directive))
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
