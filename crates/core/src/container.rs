//! Workspace container model
//!
//! Defines the labels attached to workspace containers, the run-state mapping from
//! engine states, the creation spec, and the [`ContainerOps`] lifecycle trait.
//! Labels are written once at creation and never rewritten; they are the only
//! place workspace metadata is stored.

use crate::errors::Result;
use crate::mount::BindMount;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Label suffixes, namespaced under the configured prefix (`branchbox.repo_url`, ...)
pub const LABEL_REPO_URL: &str = "repo_url";
pub const LABEL_BRANCH_NAME: &str = "branch_name";
pub const LABEL_REPO_NAME: &str = "repo_name";
pub const LABEL_IS_REMOTE: &str = "is_remote";

/// Value shown for a label missing from a container
pub const UNKNOWN_LABEL_VALUE: &str = "unknown";

/// Full label key for a suffix
pub fn label_key(prefix: &str, suffix: &str) -> String {
    format!("{}.{}", prefix, suffix)
}

/// Run state of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceStatus {
    /// Created but never started
    Created,
    Running,
    Stopped,
}

impl WorkspaceStatus {
    /// Map an engine state string (`running`, `exited`, `created`, ...)
    pub fn from_engine_state(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "running" | "restarting" => Self::Running,
            "created" => Self::Created,
            _ => Self::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for WorkspaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Immutable metadata carried by a workspace container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMetadata {
    /// Repository URL or local path as given at creation
    pub repo_url: String,
    pub branch_name: String,
    pub repo_name: String,
    pub is_remote: bool,
}

impl WorkspaceMetadata {
    /// Labels to attach at creation
    pub fn to_labels(&self, prefix: &str) -> BTreeMap<String, String> {
        BTreeMap::from([
            (label_key(prefix, LABEL_REPO_URL), self.repo_url.clone()),
            (label_key(prefix, LABEL_BRANCH_NAME), self.branch_name.clone()),
            (label_key(prefix, LABEL_REPO_NAME), self.repo_name.clone()),
            (label_key(prefix, LABEL_IS_REMOTE), self.is_remote.to_string()),
        ])
    }

    /// Read metadata back from container labels; missing labels become `unknown`
    pub fn from_labels(prefix: &str, labels: &HashMap<String, String>) -> Self {
        let get = |suffix: &str| {
            labels
                .get(&label_key(prefix, suffix))
                .cloned()
                .unwrap_or_else(|| UNKNOWN_LABEL_VALUE.to_string())
        };

        Self {
            repo_url: get(LABEL_REPO_URL),
            branch_name: get(LABEL_BRANCH_NAME),
            repo_name: get(LABEL_REPO_NAME),
            // older containers recorded the flag capitalized
            is_remote: get(LABEL_IS_REMOTE).eq_ignore_ascii_case("true"),
        }
    }
}

/// Everything needed to create a workspace container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub mounts: Vec<BindMount>,
    pub env: BTreeMap<String, String>,
    pub working_dir: String,
    pub labels: BTreeMap<String, String>,
    /// Allocate a TTY and keep stdin open so the image's shell keeps the container alive
    pub interactive_tty: bool,
}

impl ContainerSpec {
    /// Engine CLI arguments for `create`
    pub fn to_create_args(&self) -> Vec<String> {
        let mut args = vec!["create".to_string(), "--name".to_string(), self.name.clone()];

        for (key, value) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }

        for mount in &self.mounts {
            args.extend(mount.to_docker_args());
        }

        for (key, value) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args.push("-w".to_string());
        args.push(self.working_dir.clone());

        if self.interactive_tty {
            args.push("-t".to_string());
            args.push("-i".to_string());
        }

        args.push(self.image.clone());
        args
    }
}

/// Container lifecycle operations beyond the query/exec surface of [`crate::docker::Docker`]
#[allow(async_fn_in_trait)]
pub trait ContainerOps {
    /// Create a container from a spec, returning its ID
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a created or stopped container
    async fn start_container(&self, container_id: &str) -> Result<()>;

    /// Remove a container (forcefully)
    async fn remove_container(&self, container_id: &str) -> Result<()>;
}
