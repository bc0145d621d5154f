//! Shared test helpers for core integration tests.

#![allow(dead_code)]

use branchbox_core::attach::EditorLauncher;
use branchbox_core::config::Config;
use branchbox_core::container::WorkspaceMetadata;
use branchbox_core::docker::mock::{MockContainer, MockDocker};
use branchbox_core::git::BranchResolver;
use branchbox_core::logging::Logger;
use branchbox_core::workspace::{HostContext, WorkspaceManager};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const REMOTE_REPO: &str = "https://github.com/acme/api.git";

/// Editor double recording `(container, folder)` launches
#[derive(Debug, Clone, Default)]
pub struct RecordingEditor {
    pub launches: Arc<Mutex<Vec<(String, String)>>>,
    pub fail: bool,
}

impl RecordingEditor {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn launches(&self) -> Vec<(String, String)> {
        self.launches.lock().unwrap().clone()
    }
}

impl EditorLauncher for RecordingEditor {
    fn launch(&self, container_name: &str, folder: &str) -> io::Result<()> {
        self.launches
            .lock()
            .unwrap()
            .push((container_name.to_string(), folder.to_string()));
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "code: not found"));
        }
        Ok(())
    }
}

/// Branch resolver returning a fixed branch
pub struct FixedBranch(pub Option<&'static str>);

impl BranchResolver for FixedBranch {
    fn current_branch(&self, _repo: &Path) -> Option<String> {
        self.0.map(str::to_string)
    }
}

/// Host context rooted in a temporary home with the given environment
pub fn host_in(home: &TempDir, env: &[(&str, &str)]) -> HostContext {
    HostContext {
        home: home.path().to_path_buf(),
        env: env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>(),
    }
}

/// Manager wired with test doubles for the host side
pub fn manager<'a>(
    docker: &'a MockDocker,
    config: &'a Config,
    home: &TempDir,
    editor: &RecordingEditor,
) -> WorkspaceManager<'a, MockDocker> {
    WorkspaceManager::new(docker, config, Logger::new(false))
        .with_host(host_in(home, &[]))
        .with_editor(editor.clone())
        .with_branch_resolver(FixedBranch(None))
}

/// A workspace container as `create` would have left it
pub fn workspace_container(config: &Config, name: &str, branch: &str, state: &str) -> MockContainer {
    let metadata = WorkspaceMetadata {
        repo_url: REMOTE_REPO.to_string(),
        branch_name: branch.to_string(),
        repo_name: "api".to_string(),
        is_remote: true,
    };
    MockContainer::new(name, &config.base_image)
        .with_labels(metadata.to_labels(&config.prefix).into_iter().collect())
        .with_state(state)
}
