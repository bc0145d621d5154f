//! Host bind mounts for workspaces
//!
//! A workspace gets the caller's SSH keys and git identity read-only, the agent
//! configuration directory read-write, and, for local repositories, the source
//! repository itself read-write at a fixed container path. Host paths that do not
//! exist are skipped.

use crate::config::Config;
use std::fmt;
use std::path::{Path, PathBuf};

/// Mount access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => write!(f, "ro"),
            Self::ReadWrite => write!(f, "rw"),
        }
    }
}

/// A host path bound into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    /// Absolute host path
    pub source: PathBuf,
    /// Absolute container path
    pub target: String,
    pub mode: MountMode,
}

impl BindMount {
    pub fn new(source: impl Into<PathBuf>, target: impl Into<String>, mode: MountMode) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            mode,
        }
    }

    /// Engine CLI arguments for this mount
    pub fn to_docker_args(&self) -> Vec<String> {
        let mut fields = vec![
            "type=bind".to_string(),
            mount_field("source", &self.source.display().to_string()),
            mount_field("target", &self.target),
        ];
        if self.mode == MountMode::ReadOnly {
            fields.push("readonly".to_string());
        }
        vec!["--mount".to_string(), fields.join(",")]
    }
}

/// `key=value` as one CSV field of a `--mount` spec, quoted when it holds `,` or `"`
fn mount_field(key: &str, value: &str) -> String {
    let field = format!("{}={}", key, value);
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

/// Compute the mounts for a new workspace
///
/// `home` is the caller's home directory; `local_repo` is the resolved host path of a
/// local repository reference (`None` for remote references).
pub fn plan_mounts(config: &Config, home: &Path, local_repo: Option<&Path>) -> Vec<BindMount> {
    let container_home = config.container_home.trim_end_matches('/');
    let candidates = [
        (".ssh", MountMode::ReadOnly),
        (".gitconfig", MountMode::ReadOnly),
        (".claude", MountMode::ReadWrite),
    ];

    let mut mounts: Vec<BindMount> = candidates
        .iter()
        .filter_map(|(name, mode)| {
            let source = home.join(name);
            source
                .exists()
                .then(|| BindMount::new(source, format!("{}/{}", container_home, name), *mode))
        })
        .collect();

    if let Some(repo) = local_repo {
        mounts.push(BindMount::new(
            repo,
            config.host_repo_mount.clone(),
            MountMode::ReadWrite,
        ));
    }

    mounts
}
