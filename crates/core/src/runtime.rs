//! Container runtime selection
//!
//! Docker and Podman share a compatible CLI, so both are driven by
//! [`CliRuntime`]; this module only decides which binary to invoke.

use crate::docker::CliRuntime;
use crate::errors::{BranchboxError, ConfigError};

/// Environment variable selecting the runtime when no flag is given
pub const RUNTIME_ENV_VAR: &str = "BRANCHBOX_RUNTIME";

/// Runtime selection options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// Docker runtime
    Docker,
    /// Podman runtime
    Podman,
}

impl RuntimeKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::str::FromStr for RuntimeKind {
    type Err = BranchboxError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            _ => Err(ConfigError::Validation {
                message: format!("Unknown runtime: {}. Supported runtimes: docker, podman", s),
            }
            .into()),
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Runtime factory for creating container runtime instances
pub struct RuntimeFactory;

impl RuntimeFactory {
    /// Detect runtime from CLI flag, environment variable, or default
    ///
    /// Precedence: CLI flag > BRANCHBOX_RUNTIME env var > default (docker)
    pub fn detect_runtime(cli_runtime: Option<RuntimeKind>) -> RuntimeKind {
        if let Some(runtime) = cli_runtime {
            return runtime;
        }

        if let Ok(env_runtime) = std::env::var(RUNTIME_ENV_VAR) {
            if let Ok(runtime) = env_runtime.parse() {
                return runtime;
            }
            tracing::warn!(
                "Ignoring unknown {} value '{}', using docker",
                RUNTIME_ENV_VAR,
                env_runtime
            );
        }

        RuntimeKind::Docker
    }

    /// Create the CLI runtime for a kind, optionally overriding the binary path
    pub fn create_runtime(kind: RuntimeKind, binary_path: Option<String>) -> CliRuntime {
        match (binary_path, kind) {
            (Some(path), _) => CliRuntime::with_runtime_path(path),
            (None, RuntimeKind::Docker) => CliRuntime::docker(),
            (None, RuntimeKind::Podman) => CliRuntime::podman(),
        }
    }
}
