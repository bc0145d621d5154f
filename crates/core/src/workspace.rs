//! Workspace lifecycle orchestration
//!
//! [`WorkspaceManager`] drives the state machine `Absent -> Running <-> Stopped ->
//! Absent`. Creation is idempotent: when a workspace with the canonical name already
//! exists it is started if needed and the editor is attached, nothing else.
//!
//! A fresh workspace is provisioned in order:
//!
//! 1. base image build-or-reuse ([`ImageProvisioner`])
//! 2. container creation with mounts, forwarded environment and metadata labels
//! 3. repository materialization (clone, branch checkout)
//! 4. dependency installation ([`DependencyInstaller`])
//! 5. editor attach
//!
//! A failure after step 2 leaves the container in place for inspection; it is not
//! rolled back. Every lookup re-queries the engine.

use crate::attach::{agent_command, EditorLauncher, VsCodeLauncher};
use crate::config::Config;
use crate::container::{
    ContainerOps, ContainerSpec, WorkspaceMetadata, WorkspaceStatus, LABEL_REPO_NAME,
};
use crate::docker::{ContainerInfo, Docker, ExecConfig, ExecResult};
use crate::errors::{BranchboxError, ConfigError, DockerError, GitError, Result};
use crate::git::{self, BranchResolver, HostGit};
use crate::identity::{absolutize, WorkspaceIdentity, WorkspaceRef};
use crate::image::ImageProvisioner;
use crate::install::DependencyInstaller;
use crate::logging::Logger;
use crate::mount::plan_mounts;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Caller-side facts a workspace is wired from
#[derive(Debug, Clone)]
pub struct HostContext {
    /// Home directory holding `.ssh`, `.gitconfig` and `.claude`
    pub home: PathBuf,
    /// Environment of the calling process
    pub env: BTreeMap<String, String>,
}

impl HostContext {
    /// Snapshot of the current process
    pub fn from_process() -> Result<Self> {
        let home = directories_next::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
        Self::from_parts(home, std::env::vars().collect())
    }

    /// Fails with [`ConfigError::HomeNotFound`] when `home` is unknown
    pub fn from_parts(home: Option<PathBuf>, env: BTreeMap<String, String>) -> Result<Self> {
        let home = home.ok_or(ConfigError::HomeNotFound)?;
        Ok(Self { home, env })
    }

    /// Values of the named variables that are set
    pub fn forwarded_env(&self, names: &[String]) -> BTreeMap<String, String> {
        names
            .iter()
            .filter_map(|name| self.env.get(name).map(|value| (name.clone(), value.clone())))
            .collect()
    }
}

/// Yes/no question put to the user before destructive operations
///
/// Implementations may block on terminal input; callers run them off the async
/// executor so an interrupt can still be observed while the question is pending.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers yes without asking
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Prompt shown before removing a workspace
pub const REMOVE_PROMPT: &str = "Do you want to remove this workspace? [y/N]: ";

/// What `create` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A workspace with this name already existed
    Reused { name: String, was_started: bool },
    /// A new workspace was provisioned
    Created {
        name: String,
        installed: Vec<&'static str>,
    },
}

impl CreateOutcome {
    pub fn name(&self) -> &str {
        match self {
            Self::Reused { name, .. } | Self::Created { name, .. } => name,
        }
    }
}

/// One row of `list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceSummary {
    pub name: String,
    pub repository: String,
    pub branch: String,
    pub status: WorkspaceStatus,
}

/// Fixed-width listing table
pub fn render_table(rows: &[WorkspaceSummary]) -> String {
    let mut out = format!(
        "{:<35} {:<25} {:<20} {:<10}",
        "Name", "Repository", "Branch", "Status"
    )
    .trim_end()
    .to_string();
    out.push('\n');
    out.push_str(&"-".repeat(90));
    out.push('\n');

    for row in rows {
        let line = format!(
            "{:<35} {:<25} {:<20} {:<10}",
            row.name,
            row.repository,
            row.branch,
            row.status.to_string()
        );
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// The workspace lifecycle orchestrator
pub struct WorkspaceManager<'a, D: Docker + ContainerOps> {
    docker: &'a D,
    config: &'a Config,
    logger: Logger,
    /// Taken from the process on first use unless set with [`with_host`](Self::with_host)
    host: Option<HostContext>,
    editor: Box<dyn EditorLauncher + 'a>,
    branches: Box<dyn BranchResolver + 'a>,
}

impl<'a, D: Docker + ContainerOps> WorkspaceManager<'a, D> {
    pub fn new(docker: &'a D, config: &'a Config, logger: Logger) -> Self {
        Self {
            docker,
            config,
            logger,
            host: None,
            editor: Box::new(VsCodeLauncher::from_config(config)),
            branches: Box::new(HostGit),
        }
    }

    pub fn with_host(mut self, host: HostContext) -> Self {
        self.host = Some(host);
        self
    }

    pub fn with_editor(mut self, editor: impl EditorLauncher + 'a) -> Self {
        self.editor = Box::new(editor);
        self
    }

    pub fn with_branch_resolver(mut self, branches: impl BranchResolver + 'a) -> Self {
        self.branches = Box::new(branches);
        self
    }

    /// Canonical identity for a user-supplied short or full name
    pub fn resolve(&self, name: &str) -> WorkspaceIdentity {
        WorkspaceIdentity::from_user_input(&self.config.prefix, name)
    }

    /// Branch a create call will use: explicit, default for remotes, or the host's current branch
    pub fn effective_branch(&self, reference: &WorkspaceRef, local_path: Option<&Path>) -> String {
        if let Some(branch) = &reference.branch {
            return branch.clone();
        }
        match local_path {
            Some(path) => git::current_branch_or(self.branches.as_ref(), path, &self.config.default_branch),
            None => self.config.default_branch.clone(),
        }
    }

    async fn find(&self, name: &str) -> Result<Option<ContainerInfo>> {
        self.docker.inspect_container(name).await
    }

    async fn get(&self, name: &str) -> Result<ContainerInfo> {
        self.find(name).await?.ok_or_else(|| {
            DockerError::ContainerNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Create a workspace, or reuse the existing one with the same canonical name
    #[instrument(skip(self), fields(repo = %reference.repo))]
    pub async fn create(&self, reference: &WorkspaceRef) -> Result<CreateOutcome> {
        let is_remote = reference.is_remote();
        let repo_name = reference.repo_name();

        let local_path = if is_remote {
            None
        } else {
            let path = absolutize(Path::new(&reference.repo));
            if !path.exists() {
                return Err(GitError::RepositoryNotFound {
                    path: path.display().to_string(),
                }
                .into());
            }
            Some(path)
        };

        let branch = self.effective_branch(reference, local_path.as_deref());
        let identity = WorkspaceIdentity::new(&self.config.prefix, &repo_name, &branch);
        let name = identity.canonical_name().to_string();

        if let Some(existing) = self.find(&name).await? {
            info!("Workspace {} already exists!", name);
            let was_started = self.ensure_started(&existing).await?;
            self.open_editor(&name);
            return Ok(CreateOutcome::Reused { name, was_started });
        }

        info!("Creating workspace {}.", name);
        debug!("Repository: {}", reference.repo);
        debug!("Branch: {}", branch);

        let host = match &self.host {
            Some(host) => host.clone(),
            None => HostContext::from_process()?,
        };

        let image = ImageProvisioner::new(self.docker, self.config, self.logger.clone())
            .ensure_image()
            .await?;

        let metadata = WorkspaceMetadata {
            repo_url: match &local_path {
                Some(path) => path.display().to_string(),
                None => reference.repo.clone(),
            },
            branch_name: branch.clone(),
            repo_name,
            is_remote,
        };

        let spec = ContainerSpec {
            name: name.clone(),
            image,
            mounts: plan_mounts(self.config, &host.home, local_path.as_deref()),
            env: host.forwarded_env(&self.config.forward_env),
            working_dir: self.config.workspace_dir.clone(),
            labels: metadata.to_labels(&self.config.prefix),
            interactive_tty: true,
        };

        let container_id = self.docker.create_container(&spec).await?;
        self.docker.start_container(&container_id).await?;
        debug!("Workspace {} created successfully!", name);

        self.materialize(&name, reference, &branch, is_remote).await?;

        let installed = DependencyInstaller::new(self.docker, self.config, self.logger.clone())
            .install_dependencies(&name, &self.config.repo_dir())
            .await?;

        self.open_editor(&name);
        Ok(CreateOutcome::Created { name, installed })
    }

    async fn exec_as_user(
        &self,
        container: &str,
        command: Vec<String>,
        in_repo: bool,
    ) -> Result<ExecResult> {
        let repo_dir = self.config.repo_dir();
        let working_dir = in_repo.then_some(repo_dir.as_str());
        self.docker
            .exec(
                container,
                &command,
                ExecConfig::as_user(&self.config.container_user, working_dir),
            )
            .await
    }

    /// Clone the repository into the workspace and check out the branch
    async fn materialize(
        &self,
        container: &str,
        reference: &WorkspaceRef,
        branch: &str,
        is_remote: bool,
    ) -> Result<()> {
        let repo_dir = self.config.repo_dir();
        info!("Cloning repository...");

        if is_remote {
            let clone = self
                .exec_as_user(container, git::clone(&reference.repo, &repo_dir), false)
                .await?;
            if !clone.success {
                return Err(GitError::CloneFailed(clone.combined_output()).into());
            }

            if branch != self.config.default_branch {
                debug!("Switching to branch: {}", branch);
                let create = self
                    .exec_as_user(container, git::checkout_new_branch(branch), true)
                    .await?;
                if !create.success {
                    // the branch already exists on the remote
                    let existing = self.exec_as_user(container, git::checkout(branch), true).await?;
                    if !existing.success {
                        return Err(GitError::CheckoutFailed(existing.combined_output()).into());
                    }
                }
            }
        } else {
            let trust = self
                .exec_as_user(container, git::trust_all_directories(), false)
                .await?;
            if !trust.success {
                debug!("Could not mark directories as safe: {}", trust.combined_output());
            }

            let clone = self
                .exec_as_user(
                    container,
                    git::clone(&self.config.host_repo_mount, &repo_dir),
                    false,
                )
                .await?;
            if !clone.success {
                return Err(GitError::CloneFailed(clone.combined_output()).into());
            }

            debug!("Creating branch: {}", branch);
            let create = self
                .exec_as_user(container, git::checkout_new_branch(branch), true)
                .await?;
            if !create.success {
                warn!(
                    "Could not create branch {}: {}",
                    branch,
                    create.combined_output()
                );
            }
        }

        Ok(())
    }

    /// Start a stopped container; returns whether a transition happened
    async fn ensure_started(&self, container: &ContainerInfo) -> Result<bool> {
        if container.workspace_status().is_running() {
            return Ok(false);
        }
        info!("Starting workspace {}...", container.name());
        self.docker.start_container(container.name()).await?;
        Ok(true)
    }

    fn open_editor(&self, name: &str) {
        debug!("Launching editor...");
        if let Err(e) = self.editor.launch(name, &self.config.repo_dir()) {
            warn!("Could not open the editor automatically: {}", e);
        }
    }

    /// Start a workspace; returns `false` if it was already running
    #[instrument(skip(self))]
    pub async fn start(&self, name: &str) -> Result<bool> {
        let identity = self.resolve(name);
        let container = self.get(identity.canonical_name()).await?;

        if container.workspace_status().is_running() {
            info!("Workspace {} is already running", identity);
            return Ok(false);
        }

        self.docker.start_container(identity.canonical_name()).await?;
        info!("Workspace {} started", identity);
        Ok(true)
    }

    /// Stop a workspace; returns `false` if it was not running
    #[instrument(skip(self))]
    pub async fn stop(&self, name: &str) -> Result<bool> {
        let identity = self.resolve(name);
        let container = self.get(identity.canonical_name()).await?;

        if !container.workspace_status().is_running() {
            info!("Workspace {} is not running", identity);
            return Ok(false);
        }

        self.docker
            .stop_container(identity.canonical_name(), None)
            .await?;
        info!("Workspace {} stopped", identity);
        Ok(true)
    }

    /// Remove a workspace after confirmation; returns `false` if the user declined
    #[instrument(skip(self, confirm))]
    pub async fn remove<C>(&self, name: &str, confirm: C) -> Result<bool>
    where
        C: Confirm + Send + 'static,
    {
        let identity = self.resolve(name);
        let container = self.get(identity.canonical_name()).await?;
        let metadata = WorkspaceMetadata::from_labels(&self.config.prefix, &container.labels);

        info!("Workspace: {}", identity);
        info!("Repository: {}", metadata.repo_url);
        info!("Branch: {}", metadata.branch_name);

        let approved = tokio::task::spawn_blocking(move || confirm.confirm(REMOVE_PROMPT))
            .await
            .map_err(|e| BranchboxError::Internal(format!("Confirmation prompt failed: {}", e)))?;
        if !approved {
            info!("Cancelled.");
            return Ok(false);
        }

        if container.workspace_status().is_running() {
            self.docker
                .stop_container(identity.canonical_name(), None)
                .await?;
        }
        self.docker.remove_container(identity.canonical_name()).await?;

        info!("Workspace {} removed successfully.", identity);
        Ok(true)
    }

    /// All workspaces carrying this system's labels, in any state, sorted by name
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<WorkspaceSummary>> {
        let selector = self.config.label_key(LABEL_REPO_NAME);
        let containers = self.docker.list_containers(Some(&selector)).await?;

        let mut rows: Vec<WorkspaceSummary> = containers
            .iter()
            .map(|container| {
                let metadata = WorkspaceMetadata::from_labels(&self.config.prefix, &container.labels);
                WorkspaceSummary {
                    name: container.name().to_string(),
                    repository: metadata.repo_name,
                    branch: metadata.branch_name,
                    status: container.workspace_status(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        if rows.is_empty() {
            debug!("No branchbox workspaces found.");
        }
        Ok(rows)
    }

    /// Start the workspace if needed and run the agent attached to the caller's terminal
    #[instrument(skip(self))]
    pub async fn attach_agent(&self, name: &str) -> Result<i32> {
        let identity = self.resolve(name);
        let container = self.get(identity.canonical_name()).await?;
        self.ensure_started(&container).await?;

        debug!("Launching {}...", self.config.agent_command);
        let result = self
            .docker
            .exec(
                identity.canonical_name(),
                &agent_command(self.config),
                ExecConfig::as_user(&self.config.container_user, Some(&self.config.repo_dir()))
                    .interactive(),
            )
            .await?;

        debug!("Detached from {} (exit code {})", identity, result.exit_code);
        Ok(result.exit_code)
    }

    /// Start the workspace if needed and open the editor on it
    #[instrument(skip(self))]
    pub async fn attach_editor(&self, name: &str) -> Result<()> {
        let identity = self.resolve(name);
        let container = self.get(identity.canonical_name()).await?;
        self.ensure_started(&container).await?;
        self.open_editor(identity.canonical_name());
        Ok(())
    }
}
