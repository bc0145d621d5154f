//! Error types and handling
//!
//! This module provides domain-specific error types for workspace provisioning.
//! Each domain (configuration, container engine, version control, dependency
//! installation) has its own enum, and all of them are wrapped in the main
//! [`BranchboxError`] enum for unified handling at the command dispatcher.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file parsing error
    #[error("Failed to parse configuration file: {message}")]
    Parsing { message: String },

    /// Configuration validation error
    #[error("Configuration validation error: {message}")]
    Validation { message: String },

    /// Configuration file I/O error
    #[error("Failed to read configuration file")]
    Io(#[from] std::io::Error),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: String },

    /// The caller's home directory could not be determined
    #[error("Could not determine the home directory. Make sure HOME is set.")]
    HomeNotFound,
}

/// Container engine errors
#[derive(Error, Debug)]
pub enum DockerError {
    /// Engine binary missing or daemon unreachable
    #[error("Could not connect to the container engine. Make sure Docker is running.")]
    NotInstalled,

    /// Engine CLI command error
    #[error("Docker CLI error: {0}")]
    CLIError(String),

    /// Workspace container not found
    #[error("Workspace {name} not found.")]
    ContainerNotFound { name: String },

    /// Base image build failed
    #[error("Build failed: {message}")]
    BuildFailed { message: String },

    /// Build recipe missing on disk
    #[error("Dockerfile not found at {path}")]
    RecipeNotFound { path: String },
}

/// Version-control errors
#[derive(Error, Debug)]
pub enum GitError {
    /// Repository clone failed
    #[error("Error cloning repository: {0}")]
    CloneFailed(String),

    /// Branch checkout failed
    #[error("Error checking out branch: {0}")]
    CheckoutFailed(String),

    /// Local repository path does not exist on the host
    #[error("Repository not found: {path}")]
    RepositoryNotFound { path: String },

    /// A git step inside the workspace exited non-zero
    #[error("Error {step}: {output}")]
    CommandFailed { step: String, output: String },
}

/// Dependency installation errors
#[derive(Error, Debug)]
pub enum InstallError {
    /// The install command triggered by a manifest exited non-zero
    #[error("Dependency installation failed ({manifest}, exit code {exit_code})")]
    Failed { manifest: String, exit_code: i32 },
}

/// Main error enum wrapping all domain-specific errors
#[derive(Error, Debug)]
pub enum BranchboxError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Container engine errors
    #[error("Docker error: {0}")]
    Docker(#[from] DockerError),

    /// Version-control errors
    #[error("Git error: {0}")]
    Git(#[from] GitError),

    /// Dependency installation errors
    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    /// The user interrupted the operation
    #[error("Operation cancelled.")]
    Cancelled,

    /// Failure of the tool itself, such as a background task that panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BranchboxError {
    /// Process exit code for this error. Cancellation is a clean termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 0,
            _ => 1,
        }
    }

    /// Whether this is the "workspace does not exist" condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Docker(DockerError::ContainerNotFound { .. }))
    }
}

/// Convenience type alias for Results with BranchboxError
pub type Result<T> = std::result::Result<T, BranchboxError>;
