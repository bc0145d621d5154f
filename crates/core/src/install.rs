//! Dependency detection and installation
//!
//! After the repository is materialized, each entry of [`INSTALLERS`] is checked in
//! order. Every manifest that exists triggers its own install command, run through a
//! login shell in the repository root with output streamed through the
//! [`StreamTranscoder`](crate::stream::StreamTranscoder).

use crate::config::Config;
use crate::docker::{Docker, ExecConfig};
use crate::errors::{InstallError, Result};
use crate::logging::Logger;
use crate::stream::{LineSink, StreamTranscoder};
use tracing::{debug, error, info, instrument};

/// A manifest file and the command that installs what it declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Installer {
    pub manifest: &'static str,
    pub command: &'static str,
}

/// Known manifests, in the order they are checked
pub const INSTALLERS: &[Installer] = &[
    Installer {
        manifest: "requirements.txt",
        command: "pip install -r requirements.txt",
    },
    Installer {
        manifest: "pyproject.toml",
        command: "uv sync",
    },
    Installer {
        manifest: "package-lock.json",
        command: "npm ci",
    },
    Installer {
        manifest: "yarn.lock",
        command: "yarn install --immutable",
    },
    Installer {
        manifest: "pnpm-lock.yaml",
        command: "pnpm install --frozen-lockfile",
    },
];

pub struct DependencyInstaller<'a, D: Docker> {
    docker: &'a D,
    config: &'a Config,
    logger: Logger,
}

impl<'a, D: Docker> DependencyInstaller<'a, D> {
    pub fn new(docker: &'a D, config: &'a Config, logger: Logger) -> Self {
        Self {
            docker,
            config,
            logger,
        }
    }

    /// Whether `manifest` exists in `repo_dir` inside the container
    pub async fn has_manifest(&self, container: &str, repo_dir: &str, manifest: &str) -> Result<bool> {
        let probe = vec![
            "test".to_string(),
            "-f".to_string(),
            format!("{}/{}", repo_dir, manifest),
        ];
        let result = self
            .docker
            .exec(
                container,
                &probe,
                ExecConfig::as_user(&self.config.container_user, None),
            )
            .await?;
        Ok(result.success)
    }

    /// Run every matching installer; returns the manifests that triggered an install
    ///
    /// The first installer that exits non-zero aborts the run with
    /// [`InstallError::Failed`] naming its manifest.
    #[instrument(skip(self))]
    pub async fn install_dependencies(
        &self,
        container: &str,
        repo_dir: &str,
    ) -> Result<Vec<&'static str>> {
        let mut sink = self.logger.line_sink();
        self.install_dependencies_into(container, repo_dir, &mut sink)
            .await
    }

    /// [`install_dependencies`](Self::install_dependencies) with installer output
    /// delivered to `sink` as clean lines
    #[instrument(skip(self, sink))]
    pub async fn install_dependencies_into(
        &self,
        container: &str,
        repo_dir: &str,
        sink: &mut dyn LineSink,
    ) -> Result<Vec<&'static str>> {
        info!("Installing dependencies...");
        let mut installed = Vec::new();

        for installer in INSTALLERS {
            debug!("Looking for {}...", installer.manifest);
            if !self
                .has_manifest(container, repo_dir, installer.manifest)
                .await?
            {
                debug!("{} not found.", installer.manifest);
                continue;
            }

            info!("{} found. Running {}.", installer.manifest, installer.command);
            let exit_code = self
                .run_streaming(container, repo_dir, installer.command, &mut *sink)
                .await?;

            if exit_code != 0 {
                error!(
                    "Dependency installation failed using {} (exit code: {})",
                    installer.manifest, exit_code
                );
                return Err(InstallError::Failed {
                    manifest: installer.manifest.to_string(),
                    exit_code,
                }
                .into());
            }

            debug!("Installed dependencies via {} successfully.", installer.manifest);
            installed.push(installer.manifest);
        }

        Ok(installed)
    }

    async fn run_streaming(
        &self,
        container: &str,
        repo_dir: &str,
        command: &str,
        sink: &mut dyn LineSink,
    ) -> Result<i32> {
        let argv = vec!["bash".to_string(), "-lc".to_string(), command.to_string()];
        let config = ExecConfig::as_user(&self.config.container_user, Some(repo_dir));

        let mut transcoder = StreamTranscoder::new();
        let result = self
            .docker
            .exec_streaming(container, &argv, config, &mut |chunk: &[u8]| {
                transcoder.feed(chunk, &mut *sink)
            })
            .await?;
        transcoder.finish(sink);

        Ok(result.exit_code)
    }
}
