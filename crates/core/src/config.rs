//! User configuration
//!
//! Settings are read from a TOML file. Lookup order:
//!
//! 1. `--config <path>` (must exist)
//! 2. `BRANCHBOX_CONFIG` environment variable (must exist)
//! 3. `<platform config dir>/branchbox/config.toml` (optional)
//! 4. Built-in defaults
//!
//! Every key is optional; missing keys take the default value.

use crate::errors::{ConfigError, Result};
use directories_next::ProjectDirs;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming an explicit configuration file
pub const CONFIG_ENV_VAR: &str = "BRANCHBOX_CONFIG";

static PREFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_.-]*$").expect("Valid regex pattern"));

static ENV_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Valid regex pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Prefix of canonical workspace names and of the label namespace
    pub prefix: String,
    /// Tag of the shared base image
    pub base_image: String,
    /// Build recipe on the host; the bundled recipe is used when unset
    pub dockerfile: Option<PathBuf>,
    /// Root directory inside the workspace; the repository lives at `<workspace_dir>/repo`
    pub workspace_dir: String,
    /// Unprivileged user inside the workspace
    pub container_user: String,
    /// Home directory of `container_user`
    pub container_home: String,
    /// Mount point of a local source repository
    pub host_repo_mount: String,
    /// Branch used for remote references when none is given
    pub default_branch: String,
    /// Host environment variables copied into new workspaces when set
    pub forward_env: Vec<String>,
    /// Host editor binary used to attach to a workspace
    pub editor_command: String,
    /// Agent command started inside the workspace
    pub agent_command: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: crate::identity::DEFAULT_PREFIX.to_string(),
            base_image: "branchbox-base:latest".to_string(),
            dockerfile: None,
            workspace_dir: "/workspace".to_string(),
            container_user: "developer".to_string(),
            container_home: "/home/developer".to_string(),
            host_repo_mount: "/host-repo".to_string(),
            default_branch: "main".to_string(),
            forward_env: vec!["ANTHROPIC_API_KEY".to_string()],
            editor_command: "code".to_string(),
            agent_command: "claude".to_string(),
        }
    }
}

impl Config {
    /// Resolve and load the configuration, then validate it
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);

        let config = match explicit.map(Path::to_path_buf).or(env_path) {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No configuration file found, using defaults");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Read one configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ConfigError::Parsing {
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Check values that would otherwise fail later inside the engine
    pub fn validate(&self) -> Result<()> {
        if !PREFIX_PATTERN.is_match(&self.prefix) {
            return Err(invalid(format!(
                "prefix '{}' must be lowercase alphanumeric and may contain '-', '_' or '.'",
                self.prefix
            )));
        }

        for (key, value) in [
            ("workspace_dir", &self.workspace_dir),
            ("container_home", &self.container_home),
            ("host_repo_mount", &self.host_repo_mount),
        ] {
            if !value.starts_with('/') {
                return Err(invalid(format!(
                    "{} must be an absolute container path, got '{}'",
                    key, value
                )));
            }
        }

        for (key, value) in [
            ("base_image", &self.base_image),
            ("container_user", &self.container_user),
            ("default_branch", &self.default_branch),
            ("editor_command", &self.editor_command),
            ("agent_command", &self.agent_command),
        ] {
            if value.trim().is_empty() {
                return Err(invalid(format!("{} must not be empty", key)));
            }
        }

        if let Some(name) = self
            .forward_env
            .iter()
            .find(|name| !ENV_NAME_PATTERN.is_match(name))
        {
            return Err(invalid(format!(
                "forward_env entry '{}' is not a valid variable name",
                name
            )));
        }

        Ok(())
    }

    /// Repository checkout location inside the workspace
    pub fn repo_dir(&self) -> String {
        format!("{}/repo", self.workspace_dir.trim_end_matches('/'))
    }

    /// Fully-qualified label key in this configuration's namespace
    pub fn label_key(&self, key: &str) -> String {
        crate::container::label_key(&self.prefix, key)
    }
}

fn invalid(message: String) -> crate::errors::BranchboxError {
    ConfigError::Validation { message }.into()
}

/// Per-user configuration file location
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("dev", "branchbox", "branchbox")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
