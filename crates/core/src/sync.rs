//! Sync gateway: push workspace commits and pass-through git
//!
//! Operations that need a running container go through [`RunningGuard`]. A workspace
//! that was stopped before the call is started for its duration and stopped again
//! on every exit path, including user interruption.

use crate::config::Config;
use crate::container::ContainerOps;
use crate::docker::{Docker, ExecConfig, ExecResult};
use crate::errors::{BranchboxError, DockerError, GitError, Result};
use crate::git;
use crate::identity::WorkspaceIdentity;
use crate::logging::Logger;
use std::future::Future;
use tracing::{debug, info, instrument, warn};

/// Keeps a workspace running while held and restores its prior state on release
pub struct RunningGuard<'a, D: Docker + ContainerOps> {
    docker: &'a D,
    name: String,
    was_stopped: bool,
    released: bool,
}

impl<'a, D: Docker + ContainerOps> RunningGuard<'a, D> {
    /// Start the workspace if it is not running
    pub async fn acquire(docker: &'a D, name: &str) -> Result<Self> {
        let guard = Self::prepare(docker, name).await?;
        guard.ensure_running().await?;
        Ok(guard)
    }

    /// Record the workspace's current state without changing it
    ///
    /// Once prepared, [`release`](Self::release) restores that state even if
    /// [`ensure_running`](Self::ensure_running) was interrupted part way.
    pub async fn prepare(docker: &'a D, name: &str) -> Result<Self> {
        let container = docker
            .inspect_container(name)
            .await?
            .ok_or_else(|| DockerError::ContainerNotFound {
                name: name.to_string(),
            })?;

        Ok(Self {
            docker,
            name: name.to_string(),
            was_stopped: !container.workspace_status().is_running(),
            released: false,
        })
    }

    pub async fn ensure_running(&self) -> Result<()> {
        if self.was_stopped {
            info!("Starting workspace {}...", self.name);
            self.docker.start_container(&self.name).await?;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn was_stopped(&self) -> bool {
        self.was_stopped
    }

    /// Stop the workspace again if acquisition started it
    pub async fn release(mut self) -> Result<()> {
        self.released = true;
        if self.was_stopped {
            debug!("Stopping workspace {} to restore its state", self.name);
            self.docker.stop_container(&self.name, None).await?;
        }
        Ok(())
    }
}

impl<D: Docker + ContainerOps> Drop for RunningGuard<'_, D> {
    fn drop(&mut self) {
        if !self.released && self.was_stopped {
            warn!("Workspace {} was left running", self.name);
        }
    }
}

/// Run `body` with the workspace running until it finishes or `cancel` resolves
///
/// Starting the workspace is part of the cancellable scope. The guard is released
/// on success, failure and cancellation alike, and a `cancel` that is already
/// ready wins over the body. Cancellation yields [`BranchboxError::Cancelled`]. A
/// body error takes precedence over a release error.
pub async fn with_running_until<'a, D, C, F, Fut, T>(
    docker: &'a D,
    name: &str,
    cancel: C,
    body: F,
) -> Result<T>
where
    D: Docker + ContainerOps,
    C: Future<Output = ()>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    tokio::pin!(cancel);
    let guard = RunningGuard::prepare(docker, name).await?;

    let outcome = tokio::select! {
        biased;
        _ = &mut cancel => {
            info!("Interrupted.");
            Err(BranchboxError::Cancelled)
        }
        result = async {
            guard.ensure_running().await?;
            body().await
        } => result,
    };

    let released = guard.release().await;
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(release_error)) => {
            warn!("Could not stop workspace {}: {}", name, release_error);
            Err(e)
        }
    }
}

/// Resolves on Ctrl-C
///
/// The handler is installed when this is called, not when the future is first
/// polled, so an interrupt arriving in between is not lost.
#[cfg(unix)]
pub fn interrupt_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let listener = signal(SignalKind::interrupt());
    async move {
        match listener {
            Ok(mut listener) => {
                listener.recv().await;
            }
            Err(e) => {
                debug!("Could not listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Resolves on Ctrl-C
#[cfg(not(unix))]
pub fn interrupt_signal() -> impl Future<Output = ()> {
    let listener = tokio::signal::ctrl_c();
    async move {
        if let Err(e) = listener.await {
            debug!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

/// [`with_running_until`] cancelled by Ctrl-C
pub async fn with_running<'a, D, F, Fut, T>(docker: &'a D, name: &str, body: F) -> Result<T>
where
    D: Docker + ContainerOps,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    with_running_until(docker, name, interrupt_signal(), body).await
}

/// Commit message used by `push` for uncommitted changes
pub fn auto_commit_message(container_name: &str) -> String {
    format!("Auto-commit from branchbox container {}", container_name)
}

pub struct SyncGateway<'a, D: Docker + ContainerOps> {
    docker: &'a D,
    config: &'a Config,
    logger: Logger,
}

impl<'a, D: Docker + ContainerOps> SyncGateway<'a, D> {
    pub fn new(docker: &'a D, config: &'a Config, logger: Logger) -> Self {
        Self {
            docker,
            config,
            logger,
        }
    }

    fn resolve(&self, name: &str) -> WorkspaceIdentity {
        WorkspaceIdentity::from_user_input(&self.config.prefix, name)
    }

    /// Commit pending changes and push the current branch to `origin`
    pub async fn push(&self, name: &str) -> Result<String> {
        let identity = self.resolve(name);
        let container = identity.canonical_name();
        with_running(self.docker, container, || self.push_steps(container)).await
    }

    /// [`push`](Self::push) with an explicit cancellation future
    pub async fn push_until<C>(&self, name: &str, cancel: C) -> Result<String>
    where
        C: Future<Output = ()>,
    {
        let identity = self.resolve(name);
        let container = identity.canonical_name();
        with_running_until(self.docker, container, cancel, || self.push_steps(container)).await
    }

    async fn run_step(&self, container: &str, step: &str, command: Vec<String>) -> Result<ExecResult> {
        let result = self
            .docker
            .exec(
                container,
                &command,
                ExecConfig::as_user(&self.config.container_user, Some(&self.config.repo_dir())),
            )
            .await?;

        if !result.success {
            return Err(GitError::CommandFailed {
                step: step.to_string(),
                output: result.combined_output(),
            }
            .into());
        }
        Ok(result)
    }

    #[instrument(skip(self))]
    async fn push_steps(&self, container: &str) -> Result<String> {
        let branch = self
            .run_step(container, "getting current branch", git::show_current_branch())
            .await?
            .stdout
            .trim()
            .to_string();
        if branch.is_empty() {
            return Err(GitError::CommandFailed {
                step: "getting current branch".to_string(),
                output: "HEAD is detached".to_string(),
            }
            .into());
        }
        debug!("Current branch: {}", branch);

        self.run_step(container, "adding changes", git::add_all())
            .await?;

        let status = self
            .run_step(container, "checking status", git::status_porcelain())
            .await?;
        if status.stdout.trim().is_empty() {
            debug!("Working tree clean, nothing to commit");
        } else {
            info!("Committing changes...");
            self.run_step(
                container,
                "committing changes",
                git::commit(&auto_commit_message(container)),
            )
            .await?;
        }

        info!("Pushing branch {} to origin...", branch);
        let push = self
            .run_step(container, "pushing changes", git::push_origin(&branch))
            .await?;
        if self.logger.is_verbose() {
            let output = push.combined_output();
            if !output.trim().is_empty() {
                debug!("{}", output.trim());
            }
        }

        info!("Successfully pushed {} from {}", branch, container);
        Ok(branch)
    }

    /// Run git interactively in the workspace repository; returns git's exit code
    #[instrument(skip(self))]
    pub async fn git(&self, name: &str, args: &[String]) -> Result<i32> {
        let identity = self.resolve(name);
        let container = identity.canonical_name();
        let command = git::passthrough(args);

        with_running(self.docker, container, || async {
            let result = self
                .docker
                .exec(
                    container,
                    &command,
                    ExecConfig::as_user(&self.config.container_user, Some(&self.config.repo_dir()))
                        .interactive(),
                )
                .await?;
            if !result.success {
                info!("git exited with code {}", result.exit_code);
            }
            Ok(result.exit_code)
        })
        .await
    }
}
