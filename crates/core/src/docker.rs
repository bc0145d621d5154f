//! Container engine integration
//!
//! This module defines the engine abstraction used by every component, a CLI-backed
//! implementation that shells out to `docker` (or a compatible binary such as
//! `podman`), and an in-memory [`mock::MockDocker`] for tests.

use crate::container::{ContainerOps, ContainerSpec, WorkspaceStatus};
use crate::errors::{DockerError, Result};
use crate::stream::{clean_build_line, LineSink};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::io::IsTerminal;
use std::process::{Command, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, instrument};

/// Container information returned by engine queries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerInfo {
    /// Container ID
    pub id: String,
    /// Container names
    pub names: Vec<String>,
    /// Container image
    pub image: String,
    /// Human-readable status (`Up 5 minutes`)
    pub status: String,
    /// Machine state (`running`, `exited`, `created`)
    pub state: String,
    /// Container labels
    pub labels: HashMap<String, String>,
}

impl ContainerInfo {
    /// Primary name, falling back to the ID
    pub fn name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or(&self.id)
    }

    pub fn workspace_status(&self) -> WorkspaceStatus {
        WorkspaceStatus::from_engine_state(&self.state)
    }
}

/// Image information returned by engine queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Image ID
    pub id: String,
    /// Image labels (from Config.Labels)
    pub labels: HashMap<String, String>,
}

/// Configuration for executing commands in containers
#[derive(Debug, Clone, Default)]
pub struct ExecConfig {
    /// User to run command as
    pub user: Option<String>,
    /// Working directory
    pub working_dir: Option<String>,
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Whether to allocate a TTY
    pub tty: bool,
    /// Whether to attach the caller's terminal (stdin/stdout/stderr are inherited)
    pub interactive: bool,
}

impl ExecConfig {
    /// Run as `user` in `working_dir`, capturing output
    pub fn as_user(user: &str, working_dir: Option<&str>) -> Self {
        Self {
            user: Some(user.to_string()),
            working_dir: working_dir.map(str::to_string),
            ..Default::default()
        }
    }

    /// Attach the caller's terminal, with a TTY when stdin is one
    pub fn interactive(mut self) -> Self {
        self.tty = std::io::stdin().is_terminal();
        self.interactive = true;
        self
    }

    fn to_args(&self) -> Vec<String> {
        let mut args = vec!["exec".to_string()];

        if self.tty {
            args.push("-t".to_string());
        }
        if self.interactive {
            args.push("-i".to_string());
        }
        if let Some(ref user) = self.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }
        if let Some(ref workdir) = self.working_dir {
            args.push("-w".to_string());
            args.push(workdir.clone());
        }

        let env: BTreeMap<_, _> = self.env.iter().collect();
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        args
    }
}

/// Result of executing a command in a container
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Exit code of the command
    pub exit_code: i32,
    /// Whether the command completed successfully (exit code 0)
    pub success: bool,
    /// Standard output (empty for interactive and streaming execs)
    pub stdout: String,
    /// Standard error (empty for interactive and streaming execs)
    pub stderr: String,
}

impl ExecResult {
    /// Captured stdout and stderr joined, trimmed, for error reports
    pub fn combined_output(&self) -> String {
        let mut output = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !output.is_empty() {
                output.push('\n');
            }
            output.push_str(stderr);
        }
        output
    }
}

/// Container engine abstraction trait
#[allow(async_fn_in_trait)]
pub trait Docker {
    /// Health check for engine availability
    async fn ping(&self) -> Result<()>;

    /// List containers (all states) with optional `key` / `key=value` label selector
    async fn list_containers(&self, label_selector: Option<&str>) -> Result<Vec<ContainerInfo>>;

    /// Inspect a container by ID or name
    async fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>>;

    /// Inspect an image by reference
    async fn inspect_image(&self, image_ref: &str) -> Result<Option<ImageInfo>>;

    /// Build an image from recipe text, surfacing each build output line
    async fn build_image(
        &self,
        tag: &str,
        recipe: &str,
        labels: &BTreeMap<String, String>,
        output: &mut dyn LineSink,
    ) -> Result<()>;

    /// Execute a command in a running container
    async fn exec(
        &self,
        container_id: &str,
        command: &[String],
        config: ExecConfig,
    ) -> Result<ExecResult>;

    /// Execute a command, handing raw output chunks to `output` as they arrive
    async fn exec_streaming(
        &self,
        container_id: &str,
        command: &[String],
        config: ExecConfig,
        output: &mut dyn FnMut(&[u8]),
    ) -> Result<ExecResult>;

    /// Stop a container with optional timeout
    async fn stop_container(&self, container_id: &str, timeout: Option<u32>) -> Result<()>;
}

/// Generic CLI-based container runtime implementation
///
/// This can be used for both Docker and Podman runtimes since they share
/// a compatible CLI interface.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    /// Container runtime CLI binary path (e.g., "docker" or "podman")
    runtime_path: String,
}

impl CliRuntime {
    /// Create a new CliRuntime for Docker
    pub fn docker() -> Self {
        Self {
            runtime_path: "docker".to_string(),
        }
    }

    /// Create a new CliRuntime for Podman
    pub fn podman() -> Self {
        Self {
            runtime_path: "podman".to_string(),
        }
    }

    /// Create a new CliRuntime with custom runtime binary path
    pub fn with_runtime_path(runtime_path: String) -> Self {
        Self { runtime_path }
    }

    pub fn runtime_path(&self) -> &str {
        &self.runtime_path
    }

    /// Run one engine command to completion off the async runtime
    async fn run_captured(
        &self,
        args: Vec<String>,
        what: &'static str,
    ) -> std::result::Result<std::process::Output, DockerError> {
        let runtime_path = self.runtime_path.clone();
        tokio::task::spawn_blocking(move || {
            Command::new(&runtime_path)
                .args(&args)
                .output()
                .map_err(|e| DockerError::CLIError(format!("Failed to {}: {}", what, e)))
        })
        .await
        .map_err(|e| DockerError::CLIError(format!("Task join error: {}", e)))?
    }

    /// Labels as reported by `inspect` under `Config.Labels`; `null` when there are none
    fn parse_labels(value: Option<&serde_json::Value>) -> HashMap<String, String> {
        match value {
            Some(serde_json::Value::Object(obj)) => obj
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => HashMap::new(),
        }
    }

    /// One element of `inspect --type container` output
    fn container_from_inspect(container: &serde_json::Value) -> ContainerInfo {
        let state = container
            .get("State")
            .and_then(|state| state.get("Status"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();

        ContainerInfo {
            id: Self::str_field(container, "Id"),
            names: container
                .get("Name")
                .and_then(|v| v.as_str())
                .map(|name| vec![name.trim_start_matches('/').to_string()])
                .unwrap_or_default(),
            image: container
                .get("Config")
                .and_then(|config| config.get("Image"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string(),
            status: state.clone(),
            state,
            labels: Self::parse_labels(container.get("Config").and_then(|c| c.get("Labels"))),
        }
    }

    fn str_field(value: &serde_json::Value, key: &str) -> String {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string()
    }

    fn is_not_found(stderr: &str) -> bool {
        let lower = stderr.to_lowercase();
        lower.contains("no such object")
            || lower.contains("no such container")
            || lower.contains("no such image")
            || lower.contains("not known")
    }

    fn spawn_piped(&self, args: &[String], stdin: Stdio) -> Result<tokio::process::Child> {
        tokio::process::Command::new(&self.runtime_path)
            .args(args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                debug!("Failed to spawn {}: {}", self.runtime_path, e);
                DockerError::NotInstalled.into()
            })
    }
}

impl Default for CliRuntime {
    fn default() -> Self {
        Self::docker()
    }
}

impl Docker for CliRuntime {
    #[instrument(skip(self))]
    async fn ping(&self) -> Result<()> {
        debug!("Pinging container runtime daemon");

        let output = self
            .run_captured(
                vec!["version".to_string(), "--format".to_string(), "json".to_string()],
                "ping runtime",
            )
            .await
            .map_err(|e| {
                debug!("Runtime ping failed: {}", e);
                DockerError::NotInstalled
            })?;

        if output.status.success() {
            debug!("Container runtime daemon is available");
            Ok(())
        } else {
            debug!(
                "Runtime ping failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            Err(DockerError::NotInstalled.into())
        }
    }

    #[instrument(skip(self))]
    async fn list_containers(&self, label_selector: Option<&str>) -> Result<Vec<ContainerInfo>> {
        debug!(
            "Listing containers with label selector: {:?}",
            label_selector
        );

        // `ps` only selects; label values come from `inspect`, whose JSON keeps them intact
        let mut args: Vec<String> = ["ps", "--all", "--no-trunc", "--quiet"]
            .into_iter()
            .map(str::to_string)
            .collect();

        // one --filter per label
        if let Some(selector) = label_selector {
            for part in selector.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                args.push("--filter".to_string());
                args.push(format!("label={}", part));
            }
        }

        let output = self.run_captured(args, "list containers").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockerError::CLIError(format!("Container list failed: {}", stderr)).into());
        }

        let ids: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            debug!("Found 0 containers");
            return Ok(Vec::new());
        }

        let mut args = vec!["inspect".to_string(), "--type".to_string(), "container".to_string()];
        args.extend(ids);
        let output = self.run_captured(args, "inspect containers").await?;

        // a container removed since `ps` fails the command but the others are still printed
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !Self::is_not_found(&stderr) {
                return Err(
                    DockerError::CLIError(format!("Inspect command failed: {}", stderr)).into(),
                );
            }
        }

        let containers: Vec<ContainerInfo> = if output.stdout.iter().all(u8::is_ascii_whitespace) {
            Vec::new()
        } else {
            serde_json::from_slice::<Vec<serde_json::Value>>(&output.stdout)
                .map_err(|e| DockerError::CLIError(format!("Failed to parse inspect JSON: {}", e)))?
                .iter()
                .map(Self::container_from_inspect)
                .collect()
        };

        debug!("Found {} containers", containers.len());
        Ok(containers)
    }

    #[instrument(skip(self))]
    async fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>> {
        debug!("Inspecting container: {}", id);

        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            id.to_string(),
        ];
        let output = self.run_captured(args, "inspect container").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if Self::is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(DockerError::CLIError(format!("Inspect command failed: {}", stderr)).into());
        }

        let containers: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout)
            .map_err(|e| DockerError::CLIError(format!("Failed to parse inspect JSON: {}", e)))?;

        Ok(containers.first().map(Self::container_from_inspect))
    }

    #[instrument(skip(self))]
    async fn inspect_image(&self, image_ref: &str) -> Result<Option<ImageInfo>> {
        debug!("Inspecting image: {}", image_ref);

        let args = vec![
            "image".to_string(),
            "inspect".to_string(),
            image_ref.to_string(),
        ];
        let output = self.run_captured(args, "inspect image").await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if Self::is_not_found(&stderr) {
                return Ok(None);
            }
            return Err(
                DockerError::CLIError(format!("Image inspect failed: {}", stderr)).into(),
            );
        }

        let images: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).map_err(|e| {
            DockerError::CLIError(format!("Failed to parse image inspect output: {}", e))
        })?;

        Ok(images.first().map(|image| ImageInfo {
            id: image
                .get("Id")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            labels: Self::parse_labels(image.get("Config").and_then(|c| c.get("Labels"))),
        }))
    }

    #[instrument(skip(self, recipe, output))]
    async fn build_image(
        &self,
        tag: &str,
        recipe: &str,
        labels: &BTreeMap<String, String>,
        output: &mut dyn LineSink,
    ) -> Result<()> {
        let mut args = vec!["build".to_string(), "-t".to_string(), tag.to_string()];
        for (key, value) in labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", key, value));
        }
        // recipe on stdin, no build context
        args.push("-".to_string());

        debug!("Runtime build args: {:?}", args);
        let mut child = self.spawn_piped(&args, Stdio::piped())?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(recipe.as_bytes()).await.map_err(|e| {
                DockerError::CLIError(format!("Failed to send build recipe: {}", e))
            })?;
        }

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(DockerError::CLIError("Failed to capture build output".to_string()).into());
        };
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_open, mut err_open) = (true, true);
        let mut last_line = String::new();

        while out_open || err_open {
            let (from_stdout, line) = tokio::select! {
                line = out_lines.next_line(), if out_open => (true, line),
                line = err_lines.next_line(), if err_open => (false, line),
            };
            match line {
                Ok(Some(line)) => {
                    if let Some(cleaned) = clean_build_line(&line) {
                        output.emit(cleaned);
                        last_line = cleaned.to_string();
                    }
                }
                Ok(None) if from_stdout => out_open = false,
                Ok(None) => err_open = false,
                Err(e) => {
                    return Err(DockerError::CLIError(format!("Failed to read build output: {}", e)).into())
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DockerError::CLIError(format!("Failed to wait for build: {}", e)))?;

        if status.success() {
            debug!("Built image {}", tag);
            Ok(())
        } else {
            let message = if last_line.is_empty() {
                format!("exit code {}", status.code().unwrap_or(-1))
            } else {
                last_line
            };
            Err(DockerError::BuildFailed { message }.into())
        }
    }

    #[instrument(skip(self))]
    async fn exec(
        &self,
        container_id: &str,
        command: &[String],
        config: ExecConfig,
    ) -> Result<ExecResult> {
        let mut args = config.to_args();
        args.push(container_id.to_string());
        args.extend(command.iter().cloned());
        debug!("Runtime exec: {}", shell_words::join(&args));

        let runtime_path = self.runtime_path.clone();
        let interactive = config.interactive;

        tokio::task::spawn_blocking(move || -> std::result::Result<ExecResult, DockerError> {
            let mut cmd = Command::new(&runtime_path);
            cmd.args(&args);

            if interactive {
                // caller's terminal is attached; output cannot be captured
                let status = cmd
                    .status()
                    .map_err(|e| DockerError::CLIError(format!("Failed to run exec: {}", e)))?;
                return Ok(ExecResult {
                    exit_code: status.code().unwrap_or(-1),
                    success: status.success(),
                    stdout: String::new(),
                    stderr: String::new(),
                });
            }

            let output = cmd
                .stdin(Stdio::null())
                .output()
                .map_err(|e| DockerError::CLIError(format!("Failed to execute runtime exec: {}", e)))?;

            Ok(ExecResult {
                exit_code: output.status.code().unwrap_or(-1),
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            })
        })
        .await
        .map_err(|e| DockerError::CLIError(format!("Task join error: {}", e)))?
        .map_err(Into::into)
    }

    #[instrument(skip(self, output))]
    async fn exec_streaming(
        &self,
        container_id: &str,
        command: &[String],
        config: ExecConfig,
        output: &mut dyn FnMut(&[u8]),
    ) -> Result<ExecResult> {
        let mut args = config.to_args();
        args.push(container_id.to_string());
        args.extend(command.iter().cloned());
        debug!("Runtime streaming exec: {}", shell_words::join(&args));

        let mut child = self.spawn_piped(&args, Stdio::null())?;
        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(DockerError::CLIError("Failed to capture exec output".to_string()).into());
        };

        let mut out_buf = vec![0u8; 8192];
        let mut err_buf = vec![0u8; 8192];
        let (mut out_open, mut err_open) = (true, true);

        while out_open || err_open {
            tokio::select! {
                read = stdout.read(&mut out_buf), if out_open => match read {
                    Ok(0) => out_open = false,
                    Ok(n) => output(&out_buf[..n]),
                    Err(e) => return Err(DockerError::CLIError(format!("Failed to read exec output: {}", e)).into()),
                },
                read = stderr.read(&mut err_buf), if err_open => match read {
                    Ok(0) => err_open = false,
                    Ok(n) => output(&err_buf[..n]),
                    Err(e) => return Err(DockerError::CLIError(format!("Failed to read exec output: {}", e)).into()),
                },
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DockerError::CLIError(format!("Failed to wait for runtime exec: {}", e)))?;

        Ok(ExecResult {
            exit_code: status.code().unwrap_or(-1),
            success: status.success(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, container_id: &str, timeout: Option<u32>) -> Result<()> {
        debug!("Stopping container: {}", container_id);

        let mut args = vec!["stop".to_string()];
        if let Some(timeout) = timeout {
            args.push("-t".to_string());
            args.push(timeout.to_string());
        }
        args.push(container_id.to_string());

        let output = self.run_captured(args, "run stop command").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(
                DockerError::CLIError(format!("Runtime stop command failed: {}", stderr)).into(),
            );
        }

        debug!("Container {} stopped successfully", container_id);
        Ok(())
    }
}

impl ContainerOps for CliRuntime {
    #[instrument(skip(self, spec), fields(name = %spec.name))]
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let args = spec.to_create_args();
        debug!("Runtime create: {}", shell_words::join(&args));

        let output = self.run_captured(args, "create container").await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockerError::CLIError(format!("Container create failed: {}", stderr)).into());
        }

        let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("Created container with ID: {}", container_id);
        Ok(container_id)
    }

    #[instrument(skip(self))]
    async fn start_container(&self, container_id: &str) -> Result<()> {
        debug!("Starting container: {}", container_id);

        let output = self
            .run_captured(
                vec!["start".to_string(), container_id.to_string()],
                "start container",
            )
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockerError::CLIError(format!("Start command failed: {}", stderr)).into());
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, container_id: &str) -> Result<()> {
        debug!("Removing container: {}", container_id);

        let output = self
            .run_captured(
                vec!["rm".to_string(), "-f".to_string(), container_id.to_string()],
                "remove container",
            )
            .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DockerError::CLIError(format!("Remove command failed: {}", stderr)).into());
        }
        Ok(())
    }
}

pub mod mock {
    //! Mock container engine for testing provisioning and lifecycle flows
    //!
    //! Containers, images and command responses live in memory. Exec calls, builds
    //! and lifecycle transitions are recorded for verification.

    use crate::container::{ContainerOps, ContainerSpec};
    use crate::docker::{ContainerInfo, Docker, ExecConfig, ExecResult, ImageInfo};
    use crate::errors::{DockerError, Result};
    use crate::stream::LineSink;
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tracing::{debug, instrument};

    /// Configured response for an exec command
    #[derive(Debug, Clone, Default)]
    pub struct MockExecResponse {
        /// Exit code to return
        pub exit_code: i32,
        /// Optional delay to simulate command execution time
        pub delay: Option<Duration>,
        /// Captured stdout, also delivered as the raw stream for streaming execs
        pub stdout: Option<String>,
        /// Captured stderr
        pub stderr: Option<String>,
        /// Raw bytes delivered to streaming execs instead of `stdout`
        pub stream: Option<Vec<u8>>,
    }

    impl MockExecResponse {
        /// Response with the given exit code and no output
        pub fn exit(exit_code: i32) -> Self {
            Self {
                exit_code,
                ..Default::default()
            }
        }

        pub fn with_stdout(mut self, stdout: &str) -> Self {
            self.stdout = Some(stdout.to_string());
            self
        }

        pub fn with_stderr(mut self, stderr: &str) -> Self {
            self.stderr = Some(stderr.to_string());
            self
        }

        pub fn with_stream(mut self, bytes: &[u8]) -> Self {
            self.stream = Some(bytes.to_vec());
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    /// Mock container state for simulation
    #[derive(Debug, Clone)]
    pub struct MockContainer {
        /// Container ID
        pub id: String,
        /// Container name
        pub name: String,
        /// Container image
        pub image: String,
        /// Container state (`running`, `exited`, `created`)
        pub state: String,
        /// Labels on the container
        pub labels: HashMap<String, String>,
        /// Environment variables on the container
        pub env: HashMap<String, String>,
    }

    impl MockContainer {
        /// Create a new running mock container
        pub fn new(name: &str, image: &str) -> Self {
            Self {
                id: format!("mock-{:012x}", fastrand::u64(..) & 0xffff_ffff_ffff),
                name: name.to_string(),
                image: image.to_string(),
                state: "running".to_string(),
                labels: HashMap::new(),
                env: HashMap::new(),
            }
        }

        /// Set container labels
        pub fn with_labels(mut self, labels: HashMap<String, String>) -> Self {
            self.labels = labels;
            self
        }

        /// Set container state
        pub fn with_state(mut self, state: &str) -> Self {
            self.state = state.to_string();
            self
        }

        fn matches(&self, id: &str) -> bool {
            self.id == id || self.name == id
        }
    }

    /// Configuration for the MockDocker runtime
    #[derive(Debug, Clone)]
    pub struct MockDockerConfig {
        /// Whether ping should succeed
        pub ping_success: bool,
        /// Default exec response for commands
        pub default_exec_response: MockExecResponse,
        /// Command-specific exec responses (space-joined command -> response)
        pub exec_responses: HashMap<String, MockExecResponse>,
        /// Paths answered with exit 0 by `test -f <path>` probes
        pub existing_files: HashSet<String>,
        /// Lines emitted by every build
        pub build_output: Vec<String>,
        /// Make builds fail with this message
        pub build_failure: Option<String>,
        /// Chunk size used to deliver streaming exec output
        pub stream_chunk_size: usize,
        /// Simulate engine daemon unavailable
        pub daemon_unavailable: bool,
        /// Time `start_container` takes to return after the container is running
        pub start_delay: Option<Duration>,
    }

    impl Default for MockDockerConfig {
        fn default() -> Self {
            Self {
                ping_success: true,
                default_exec_response: MockExecResponse::default(),
                exec_responses: HashMap::new(),
                existing_files: HashSet::new(),
                build_output: vec!["Step 1/1 : FROM ubuntu:22.04".to_string()],
                build_failure: None,
                stream_chunk_size: 16,
                daemon_unavailable: false,
                start_delay: None,
            }
        }
    }

    /// Record of an exec call for verification in tests
    #[derive(Debug, Clone)]
    pub struct MockExecCall {
        /// Container ID or name where exec was called
        pub container_id: String,
        /// Command that was executed
        pub command: Vec<String>,
        /// Exec configuration used
        pub config: ExecConfig,
        /// Whether output was streamed
        pub streaming: bool,
        /// Running state of the target container at call time
        pub container_running: bool,
    }

    /// Record of an image build
    #[derive(Debug, Clone)]
    pub struct MockBuild {
        pub tag: String,
        pub recipe: String,
        pub labels: BTreeMap<String, String>,
    }

    /// Container lifecycle transitions, in call order
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum MockLifecycleEvent {
        Created(String),
        Started(String),
        Stopped(String),
        Removed(String),
    }

    /// Mock container engine implementation
    #[derive(Debug, Default)]
    pub struct MockDocker {
        config: Arc<Mutex<MockDockerConfig>>,
        containers: Arc<Mutex<Vec<MockContainer>>>,
        images: Arc<Mutex<HashMap<String, ImageInfo>>>,
        exec_history: Arc<Mutex<Vec<MockExecCall>>>,
        builds: Arc<Mutex<Vec<MockBuild>>>,
        lifecycle: Arc<Mutex<Vec<MockLifecycleEvent>>>,
    }

    impl MockDocker {
        /// Create a new MockDocker instance with default configuration
        pub fn new() -> Self {
            Self::with_config(MockDockerConfig::default())
        }

        /// Create a new MockDocker instance with custom configuration
        pub fn with_config(config: MockDockerConfig) -> Self {
            Self {
                config: Arc::new(Mutex::new(config)),
                ..Default::default()
            }
        }

        /// Add a mock container to the system
        pub fn add_container(&self, container: MockContainer) {
            self.containers.lock().unwrap().push(container);
        }

        /// Add an image with labels
        pub fn add_image(&self, tag: &str, labels: HashMap<String, String>) {
            self.images.lock().unwrap().insert(
                tag.to_string(),
                ImageInfo {
                    id: format!("sha256:mock_{}", tag.replace(':', "_")),
                    labels,
                },
            );
        }

        /// Mark a file as present for `test -f` probes
        pub fn add_file(&self, path: &str) {
            self.config
                .lock()
                .unwrap()
                .existing_files
                .insert(path.to_string());
        }

        /// Current state of a container by ID or name
        pub fn container_state(&self, id: &str) -> Option<String> {
            self.containers
                .lock()
                .unwrap()
                .iter()
                .find(|c| c.matches(id))
                .map(|c| c.state.clone())
        }

        /// Snapshot of all containers
        pub fn containers(&self) -> Vec<MockContainer> {
            self.containers.lock().unwrap().clone()
        }

        /// Get history of exec calls made
        pub fn get_exec_history(&self) -> Vec<MockExecCall> {
            self.exec_history.lock().unwrap().clone()
        }

        /// Space-joined commands of all exec calls, in order
        pub fn exec_commands(&self) -> Vec<String> {
            self.exec_history
                .lock()
                .unwrap()
                .iter()
                .map(|call| call.command.join(" "))
                .collect()
        }

        /// Builds performed so far
        pub fn get_builds(&self) -> Vec<MockBuild> {
            self.builds.lock().unwrap().clone()
        }

        /// Lifecycle transitions so far
        pub fn get_lifecycle_events(&self) -> Vec<MockLifecycleEvent> {
            self.lifecycle.lock().unwrap().clone()
        }

        /// Update mock configuration
        pub fn update_config<F>(&self, f: F)
        where
            F: FnOnce(&mut MockDockerConfig),
        {
            let mut config = self.config.lock().unwrap();
            f(&mut config);
        }

        /// Set specific exec response for a space-joined command
        pub fn set_exec_response(&self, command: &str, response: MockExecResponse) {
            self.config
                .lock()
                .unwrap()
                .exec_responses
                .insert(command.to_string(), response);
        }

        fn check_available(&self) -> Result<()> {
            if self.config.lock().unwrap().daemon_unavailable {
                return Err(DockerError::NotInstalled.into());
            }
            Ok(())
        }

        fn container_to_info(container: &MockContainer) -> ContainerInfo {
            ContainerInfo {
                id: container.id.clone(),
                names: vec![container.name.clone()],
                image: container.image.clone(),
                status: container.state.clone(),
                state: container.state.clone(),
                labels: container.labels.clone(),
            }
        }

        /// Supports `key=value` or `key`, comma-separated
        fn matches_label_selector(container: &MockContainer, selector: &str) -> bool {
            selector
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .all(|part| match part.split_once('=') {
                    Some((key, value)) => container.labels.get(key).map(String::as_str) == Some(value),
                    None => container.labels.contains_key(part),
                })
        }

        fn response_for(&self, command: &[String]) -> MockExecResponse {
            let config = self.config.lock().unwrap();
            let command_str = command.join(" ");
            if let Some(response) = config.exec_responses.get(&command_str) {
                return response.clone();
            }
            if let [test, flag, path] = command {
                if test == "test" && flag == "-f" {
                    let exists = config.existing_files.contains(path);
                    return MockExecResponse::exit(if exists { 0 } else { 1 });
                }
            }
            config.default_exec_response.clone()
        }

        fn record_exec(
            &self,
            container_id: &str,
            command: &[String],
            config: ExecConfig,
            streaming: bool,
        ) -> Result<()> {
            self.check_available()?;

            let running = match self.container_state(container_id) {
                Some(state) => state == "running",
                None => {
                    return Err(DockerError::ContainerNotFound {
                        name: container_id.to_string(),
                    }
                    .into())
                }
            };

            self.exec_history.lock().unwrap().push(MockExecCall {
                container_id: container_id.to_string(),
                command: command.to_vec(),
                config,
                streaming,
                container_running: running,
            });
            Ok(())
        }

        fn set_state(&self, id: &str, state: &str) -> Option<String> {
            let mut containers = self.containers.lock().unwrap();
            let container = containers.iter_mut().find(|c| c.matches(id))?;
            container.state = state.to_string();
            Some(container.name.clone())
        }
    }

    impl Docker for MockDocker {
        #[instrument(skip(self))]
        async fn ping(&self) -> Result<()> {
            debug!("MockDocker ping called");
            self.check_available()?;

            if self.config.lock().unwrap().ping_success {
                Ok(())
            } else {
                Err(DockerError::CLIError("Mock ping failure".to_string()).into())
            }
        }

        #[instrument(skip(self))]
        async fn list_containers(
            &self,
            label_selector: Option<&str>,
        ) -> Result<Vec<ContainerInfo>> {
            self.check_available()?;

            let containers = self.containers.lock().unwrap();
            let result: Vec<ContainerInfo> = containers
                .iter()
                .filter(|c| {
                    label_selector
                        .map(|selector| Self::matches_label_selector(c, selector))
                        .unwrap_or(true)
                })
                .map(Self::container_to_info)
                .collect();

            debug!("MockDocker returning {} containers", result.len());
            Ok(result)
        }

        #[instrument(skip(self))]
        async fn inspect_container(&self, id: &str) -> Result<Option<ContainerInfo>> {
            self.check_available()?;

            let containers = self.containers.lock().unwrap();
            Ok(containers
                .iter()
                .find(|c| c.matches(id))
                .map(Self::container_to_info))
        }

        #[instrument(skip(self))]
        async fn inspect_image(&self, image_ref: &str) -> Result<Option<ImageInfo>> {
            self.check_available()?;
            Ok(self.images.lock().unwrap().get(image_ref).cloned())
        }

        #[instrument(skip(self, recipe, output))]
        async fn build_image(
            &self,
            tag: &str,
            recipe: &str,
            labels: &BTreeMap<String, String>,
            output: &mut dyn LineSink,
        ) -> Result<()> {
            self.check_available()?;

            let (lines, failure) = {
                let config = self.config.lock().unwrap();
                (config.build_output.clone(), config.build_failure.clone())
            };
            for line in &lines {
                output.emit(line);
            }

            self.builds.lock().unwrap().push(MockBuild {
                tag: tag.to_string(),
                recipe: recipe.to_string(),
                labels: labels.clone(),
            });

            if let Some(message) = failure {
                return Err(DockerError::BuildFailed { message }.into());
            }

            self.add_image(tag, labels.clone().into_iter().collect());
            Ok(())
        }

        #[instrument(skip(self, config))]
        async fn exec(
            &self,
            container_id: &str,
            command: &[String],
            config: ExecConfig,
        ) -> Result<ExecResult> {
            self.record_exec(container_id, command, config, false)?;
            let response = self.response_for(command);

            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }

            Ok(ExecResult {
                exit_code: response.exit_code,
                success: response.exit_code == 0,
                stdout: response.stdout.unwrap_or_default(),
                stderr: response.stderr.unwrap_or_default(),
            })
        }

        #[instrument(skip(self, config, output))]
        async fn exec_streaming(
            &self,
            container_id: &str,
            command: &[String],
            config: ExecConfig,
            output: &mut dyn FnMut(&[u8]),
        ) -> Result<ExecResult> {
            self.record_exec(container_id, command, config, true)?;
            let response = self.response_for(command);
            let chunk_size = self.config.lock().unwrap().stream_chunk_size.max(1);

            let bytes = response
                .stream
                .clone()
                .or_else(|| response.stdout.clone().map(String::into_bytes))
                .unwrap_or_default();
            for chunk in bytes.chunks(chunk_size) {
                output(chunk);
            }

            if let Some(delay) = response.delay {
                tokio::time::sleep(delay).await;
            }

            Ok(ExecResult {
                exit_code: response.exit_code,
                success: response.exit_code == 0,
                stdout: String::new(),
                stderr: String::new(),
            })
        }

        #[instrument(skip(self))]
        async fn stop_container(&self, container_id: &str, _timeout: Option<u32>) -> Result<()> {
            self.check_available()?;

            match self.set_state(container_id, "exited") {
                Some(name) => {
                    self.lifecycle
                        .lock()
                        .unwrap()
                        .push(MockLifecycleEvent::Stopped(name));
                    Ok(())
                }
                None => Err(DockerError::CLIError(format!(
                    "Container {} not found",
                    container_id
                ))
                .into()),
            }
        }
    }

    impl ContainerOps for MockDocker {
        #[instrument(skip(self, spec))]
        async fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
            self.check_available()?;

            let mut containers = self.containers.lock().unwrap();
            if containers.iter().any(|c| c.name == spec.name) {
                return Err(DockerError::CLIError(format!(
                    "Conflict. The container name \"/{}\" is already in use",
                    spec.name
                ))
                .into());
            }

            let mut container = MockContainer::new(&spec.name, &spec.image)
                .with_labels(spec.labels.clone().into_iter().collect())
                .with_state("created");
            container.env = spec.env.clone().into_iter().collect();
            let id = container.id.clone();
            containers.push(container);

            self.lifecycle
                .lock()
                .unwrap()
                .push(MockLifecycleEvent::Created(spec.name.clone()));
            Ok(id)
        }

        #[instrument(skip(self))]
        async fn start_container(&self, container_id: &str) -> Result<()> {
            self.check_available()?;

            match self.set_state(container_id, "running") {
                Some(name) => {
                    self.lifecycle
                        .lock()
                        .unwrap()
                        .push(MockLifecycleEvent::Started(name));
                    let delay = self.config.lock().unwrap().start_delay;
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(())
                }
                None => Err(DockerError::CLIError(format!(
                    "Container {} not found",
                    container_id
                ))
                .into()),
            }
        }

        #[instrument(skip(self))]
        async fn remove_container(&self, container_id: &str) -> Result<()> {
            self.check_available()?;

            let mut containers = self.containers.lock().unwrap();
            let Some(index) = containers.iter().position(|c| c.matches(container_id)) else {
                return Err(DockerError::CLIError(format!(
                    "Container {} not found",
                    container_id
                ))
                .into());
            };
            let removed = containers.remove(index);

            self.lifecycle
                .lock()
                .unwrap()
                .push(MockLifecycleEvent::Removed(removed.name));
            Ok(())
        }
    }
}
