//! Core library for branchbox
//!
//! This crate contains the logic behind per-branch development workspaces: workspace
//! identity, base image provisioning, container engine integration, output
//! transcoding, dependency installation, lifecycle orchestration, git sync, logging,
//! configuration and error handling.

pub mod attach;
pub mod config;
pub mod container;
pub mod docker;
pub mod errors;
pub mod git;
pub mod identity;
pub mod image;
pub mod install;
pub mod logging;
pub mod mount;
pub mod runtime;
pub mod stream;
pub mod sync;
pub mod workspace;

/// Get the version of the core library
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let version = version();
        assert!(!version.is_empty());
        assert!(version.contains('.'));
    }
}
