//! Editor and agent attachment
//!
//! Launch failures are reported to the caller, which logs them as warnings; an
//! editor that cannot be started never fails a workspace operation.

use crate::config::Config;
use std::io;
use std::process::{Command, Stdio};
use tracing::debug;

/// Opens an editor attached to a workspace container
pub trait EditorLauncher {
    /// Start the editor on `folder` inside `container_name` without waiting for it
    fn launch(&self, container_name: &str, folder: &str) -> io::Result<()>;
}

/// Launches VS Code through its attached-container remote URI
#[derive(Debug, Clone)]
pub struct VsCodeLauncher {
    command: String,
}

impl VsCodeLauncher {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.editor_command.clone())
    }
}

impl Default for VsCodeLauncher {
    fn default() -> Self {
        Self::new("code")
    }
}

impl EditorLauncher for VsCodeLauncher {
    fn launch(&self, container_name: &str, folder: &str) -> io::Result<()> {
        let uri = folder_uri(container_name, folder);
        debug!("Launching {} --folder-uri {}", self.command, uri);

        Command::new(&self.command)
            .args(["--folder-uri", &uri])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_child| ())
    }
}

/// `vscode-remote://attached-container+<hex(name)><folder>`
pub fn folder_uri(container_name: &str, folder: &str) -> String {
    let hex: String = container_name
        .bytes()
        .map(|b| format!("{:02x}", b))
        .collect();
    format!("vscode-remote://attached-container+{}{}", hex, folder)
}

/// Command that starts the agent inside a workspace through a login shell
pub fn agent_command(config: &Config) -> Vec<String> {
    vec![
        "bash".to_string(),
        "-lc".to_string(),
        config.agent_command.clone(),
    ]
}
