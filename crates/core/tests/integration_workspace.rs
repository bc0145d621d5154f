//! Integration tests for workspace lifecycle orchestration without Docker
//!
//! These tests drive the WorkspaceManager against the MockDocker runtime and verify
//! the engine calls, repository materialization and state transitions it produces.

mod common;

use anyhow::Result;
use branchbox_core::config::Config;
use branchbox_core::container::{WorkspaceStatus, LABEL_BRANCH_NAME, LABEL_IS_REMOTE, LABEL_REPO_URL};
use branchbox_core::docker::mock::{
    MockContainer, MockDocker, MockExecResponse, MockLifecycleEvent,
};
use branchbox_core::errors::{BranchboxError, DockerError, GitError};
use branchbox_core::identity::{absolutize, WorkspaceRef};
use branchbox_core::logging::Logger;
use branchbox_core::workspace::{
    render_table, AssumeYes, Confirm, CreateOutcome, WorkspaceManager,
};
use common::{host_in, manager, workspace_container, FixedBranch, RecordingEditor, REMOTE_REPO};
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// Answers yes only after a long wait, like a user who has not typed yet
struct SlowConfirm(Duration);

impl Confirm for SlowConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        std::thread::sleep(self.0);
        true
    }
}

struct BrokenConfirm;

impl Confirm for BrokenConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        panic!("terminal went away");
    }
}

fn remote(branch: Option<&str>) -> WorkspaceRef {
    WorkspaceRef::new(REMOTE_REPO, branch.map(str::to_string))
}

#[tokio::test]
async fn test_create_remote_provisions_workspace() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    std::fs::create_dir(home.path().join(".ssh"))?;
    let editor = RecordingEditor::default();

    let manager = WorkspaceManager::new(&docker, &config, Logger::new(false))
        .with_host(host_in(
            &home,
            &[("ANTHROPIC_API_KEY", "sk-test"), ("PATH", "/usr/bin")],
        ))
        .with_editor(editor.clone())
        .with_branch_resolver(FixedBranch(None));

    let outcome = manager.create(&remote(Some("feature/login"))).await?;
    assert_eq!(
        outcome,
        CreateOutcome::Created {
            name: "branchbox-api-feature-login".to_string(),
            installed: vec![],
        }
    );

    assert_eq!(docker.get_builds().len(), 1);
    assert_eq!(
        docker.get_lifecycle_events(),
        vec![
            MockLifecycleEvent::Created("branchbox-api-feature-login".to_string()),
            MockLifecycleEvent::Started("branchbox-api-feature-login".to_string()),
        ]
    );

    let commands = docker.exec_commands();
    assert_eq!(
        commands[0],
        "git clone https://github.com/acme/api.git /workspace/repo"
    );
    assert_eq!(commands[1], "git checkout -b feature/login");

    let container = &docker.containers()[0];
    assert_eq!(container.image, config.base_image);
    assert_eq!(
        container.labels.get(&config.label_key(LABEL_REPO_URL)).map(String::as_str),
        Some(REMOTE_REPO)
    );
    assert_eq!(
        container.labels.get(&config.label_key(LABEL_BRANCH_NAME)).map(String::as_str),
        Some("feature/login")
    );
    assert_eq!(container.env.get("ANTHROPIC_API_KEY").map(String::as_str), Some("sk-test"));
    assert!(!container.env.contains_key("PATH"));

    for call in docker.get_exec_history() {
        assert_eq!(call.config.user.as_deref(), Some("developer"));
        assert!(call.container_running);
    }

    assert_eq!(
        editor.launches(),
        vec![(
            "branchbox-api-feature-login".to_string(),
            "/workspace/repo".to_string()
        )]
    );
    Ok(())
}

#[tokio::test]
async fn test_create_is_idempotent() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    let manager = manager(&docker, &config, &home, &editor);

    let first = manager.create(&remote(Some("feature/login"))).await?;
    let execs_after_first = docker.get_exec_history().len();
    let second = manager.create(&remote(Some("feature/login"))).await?;

    assert_eq!(first.name(), second.name());
    assert_eq!(
        second,
        CreateOutcome::Reused {
            name: "branchbox-api-feature-login".to_string(),
            was_started: false,
        }
    );

    let created = docker
        .get_lifecycle_events()
        .into_iter()
        .filter(|event| matches!(event, MockLifecycleEvent::Created(_)))
        .count();
    assert_eq!(created, 1);
    assert_eq!(docker.get_exec_history().len(), execs_after_first);
    assert_eq!(docker.get_builds().len(), 1);
    assert_eq!(editor.launches().len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_create_starts_stopped_workspace() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(
        &config,
        "branchbox-api-main",
        "main",
        "exited",
    ));

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await?;

    assert_eq!(
        outcome,
        CreateOutcome::Reused {
            name: "branchbox-api-main".to_string(),
            was_started: true,
        }
    );
    assert_eq!(docker.container_state("branchbox-api-main").as_deref(), Some("running"));
    assert!(docker.get_builds().is_empty());
    assert!(docker.get_exec_history().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_remote_default_branch_skips_checkout() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await?;

    assert_eq!(outcome.name(), "branchbox-api-main");
    assert!(!docker
        .exec_commands()
        .iter()
        .any(|command| command.starts_with("git checkout")));
    Ok(())
}

#[tokio::test]
async fn test_remote_existing_branch_falls_back_to_checkout() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.set_exec_response(
        "git checkout -b feature/login",
        MockExecResponse::exit(128)
            .with_stderr("fatal: a branch named 'feature/login' already exists"),
    );

    manager(&docker, &config, &home, &editor)
        .create(&remote(Some("feature/login")))
        .await?;

    let commands = docker.exec_commands();
    assert!(commands.contains(&"git checkout -b feature/login".to_string()));
    assert!(commands.contains(&"git checkout feature/login".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_remote_checkout_failure_is_fatal() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.set_exec_response("git checkout -b feature/login", MockExecResponse::exit(128));
    docker.set_exec_response(
        "git checkout feature/login",
        MockExecResponse::exit(1).with_stderr("error: pathspec 'feature/login' did not match"),
    );

    let err = manager(&docker, &config, &home, &editor)
        .create(&remote(Some("feature/login")))
        .await
        .unwrap_err();

    match err {
        BranchboxError::Git(GitError::CheckoutFailed(output)) => {
            assert!(output.contains("did not match"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_clone_failure_leaves_container_for_inspection() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.set_exec_response(
        "git clone https://github.com/acme/api.git /workspace/repo",
        MockExecResponse::exit(128).with_stderr("fatal: repository not found"),
    );

    let err = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await
        .unwrap_err();

    assert!(matches!(err, BranchboxError::Git(GitError::CloneFailed(ref out)) if out.contains("repository not found")));
    assert_eq!(docker.containers().len(), 1);
    assert!(editor.launches().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_build_failure_aborts_before_container_creation() -> Result<()> {
    let docker = MockDocker::new();
    docker.update_config(|c| c.build_failure = Some("apt-get returned 100".to_string()));
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();

    let err = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await
        .unwrap_err();

    assert!(matches!(err, BranchboxError::Docker(DockerError::BuildFailed { .. })));
    assert!(docker.containers().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_create_local_repository() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let repos = TempDir::new()?;
    let repo = repos.path().join("myrepo");
    std::fs::create_dir(&repo)?;
    let editor = RecordingEditor::default();

    let manager = WorkspaceManager::new(&docker, &config, Logger::new(false))
        .with_host(host_in(&home, &[]))
        .with_editor(editor.clone())
        .with_branch_resolver(FixedBranch(Some("feature/x")));

    let outcome = manager
        .create(&WorkspaceRef::new(repo.to_string_lossy(), None))
        .await?;
    assert_eq!(outcome.name(), "branchbox-myrepo-feature-x");

    assert_eq!(
        docker.exec_commands()[..3],
        [
            "sudo git config --system --add safe.directory *".to_string(),
            "git clone /host-repo /workspace/repo".to_string(),
            "git checkout -b feature/x".to_string(),
        ]
    );

    let container = &docker.containers()[0];
    let expected_url = absolutize(&repo).display().to_string();
    assert_eq!(
        container.labels.get(&config.label_key(LABEL_REPO_URL)),
        Some(&expected_url)
    );
    assert_eq!(
        container.labels.get(&config.label_key(LABEL_IS_REMOTE)).map(String::as_str),
        Some("false")
    );
    Ok(())
}

#[tokio::test]
async fn test_local_branch_falls_back_to_default() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let repo = TempDir::new()?;
    let editor = RecordingEditor::default();

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&WorkspaceRef::new(repo.path().to_string_lossy(), None))
        .await?;

    assert!(outcome.name().ends_with("-main"));
    Ok(())
}

#[tokio::test]
async fn test_local_checkout_failure_is_a_warning() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let repo = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.set_exec_response(
        "git checkout -b develop",
        MockExecResponse::exit(128).with_stderr("fatal: a branch named 'develop' already exists"),
    );

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&WorkspaceRef::new(
            repo.path().to_string_lossy(),
            Some("develop".to_string()),
        ))
        .await?;

    assert!(matches!(outcome, CreateOutcome::Created { .. }));
    assert_eq!(editor.launches().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_local_repository_must_exist() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    let missing = home.path().join("does-not-exist");

    let err = manager(&docker, &config, &home, &editor)
        .create(&WorkspaceRef::new(missing.to_string_lossy(), None))
        .await
        .unwrap_err();

    assert!(matches!(err, BranchboxError::Git(GitError::RepositoryNotFound { .. })));
    assert!(docker.containers().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_editor_failure_does_not_fail_create() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::failing();

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await?;

    assert!(matches!(outcome, CreateOutcome::Created { .. }));
    assert_eq!(editor.launches().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_create_installs_detected_dependencies() -> Result<()> {
    let docker = MockDocker::new();
    docker.add_file("/workspace/repo/pyproject.toml");
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();

    let outcome = manager(&docker, &config, &home, &editor)
        .create(&remote(None))
        .await?;

    assert_eq!(
        outcome,
        CreateOutcome::Created {
            name: "branchbox-api-main".to_string(),
            installed: vec!["pyproject.toml"],
        }
    );
    Ok(())
}

#[tokio::test]
async fn test_start_and_stop_transitions() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "running"));
    let manager = manager(&docker, &config, &home, &editor);

    assert!(!manager.start("api-main").await?);
    assert!(manager.stop("api-main").await?);
    assert_eq!(docker.container_state("branchbox-api-main").as_deref(), Some("exited"));
    assert!(!manager.stop("branchbox-api-main").await?);
    assert!(manager.start("branchbox-api-main").await?);
    assert_eq!(docker.container_state("branchbox-api-main").as_deref(), Some("running"));
    Ok(())
}

#[tokio::test]
async fn test_operations_on_missing_workspace() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    let manager = manager(&docker, &config, &home, &editor);

    assert!(manager.start("api-nope").await.unwrap_err().is_not_found());
    assert!(manager.stop("api-nope").await.unwrap_err().is_not_found());
    assert!(manager.remove("api-nope", AssumeYes).await.unwrap_err().is_not_found());
    assert!(manager.attach_editor("api-nope").await.unwrap_err().is_not_found());

    let err = manager.attach_agent("api-nope").await.unwrap_err();
    assert_eq!(err.to_string(), "Docker error: Workspace branchbox-api-nope not found.");
    Ok(())
}

#[tokio::test]
async fn test_remove_declined_keeps_workspace() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "running"));

    let removed = manager(&docker, &config, &home, &editor)
        .remove("api-main", Decline)
        .await?;

    assert!(!removed);
    assert_eq!(docker.containers().len(), 1);
    assert!(docker.get_lifecycle_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_interrupt_during_remove_prompt() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "running"));
    let manager = manager(&docker, &config, &home, &editor);

    let started = Instant::now();
    let interrupted = tokio::select! {
        _ = manager.remove("api-main", SlowConfirm(Duration::from_millis(1500))) => false,
        _ = tokio::time::sleep(Duration::from_millis(20)) => true,
    };

    assert!(interrupted);
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert_eq!(docker.containers().len(), 1);
    assert!(docker.get_lifecycle_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_remove_prompt_is_internal_error() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "running"));

    let err = manager(&docker, &config, &home, &editor)
        .remove("api-main", BrokenConfirm)
        .await
        .unwrap_err();

    assert!(matches!(err, BranchboxError::Internal(_)));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(docker.containers().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_remove_stops_running_workspace_first() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "running"));

    let removed = manager(&docker, &config, &home, &editor)
        .remove("api-main", AssumeYes)
        .await?;

    assert!(removed);
    assert!(docker.containers().is_empty());
    assert_eq!(
        docker.get_lifecycle_events(),
        vec![
            MockLifecycleEvent::Stopped("branchbox-api-main".to_string()),
            MockLifecycleEvent::Removed("branchbox-api-main".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_list_reports_labeled_workspaces_sorted() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-zeta", "zeta", "exited"));
    docker.add_container(workspace_container(&config, "branchbox-api-alpha", "alpha", "running"));
    docker.add_container(MockContainer::new("postgres", "postgres:16"));

    let rows = manager(&docker, &config, &home, &editor).list().await?;

    let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
    assert_eq!(names, vec!["branchbox-api-alpha", "branchbox-api-zeta"]);
    assert_eq!(rows[0].status, WorkspaceStatus::Running);
    assert_eq!(rows[1].status, WorkspaceStatus::Stopped);
    assert_eq!(rows[1].branch, "zeta");
    assert_eq!(rows[1].repository, "api");

    let table = render_table(&rows);
    assert_eq!(table.lines().count(), 4);
    assert!(table.lines().nth(3).unwrap().contains("stopped"));
    Ok(())
}

#[tokio::test]
async fn test_attach_agent_starts_workspace_and_runs_interactively() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "exited"));

    let exit_code = manager(&docker, &config, &home, &editor)
        .attach_agent("api-main")
        .await?;

    assert_eq!(exit_code, 0);
    let history = docker.get_exec_history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].command, vec!["bash", "-lc", "claude"]);
    assert!(history[0].config.interactive);
    assert!(history[0].container_running);
    assert_eq!(history[0].config.working_dir.as_deref(), Some("/workspace/repo"));
    Ok(())
}

#[tokio::test]
async fn test_attach_editor_opens_repository_folder() -> Result<()> {
    let docker = MockDocker::new();
    let config = Config::default();
    let home = TempDir::new()?;
    let editor = RecordingEditor::default();
    docker.add_container(workspace_container(&config, "branchbox-api-main", "main", "exited"));

    manager(&docker, &config, &home, &editor)
        .attach_editor("api-main")
        .await?;

    assert_eq!(docker.container_state("branchbox-api-main").as_deref(), Some("running"));
    assert_eq!(
        editor.launches(),
        vec![("branchbox-api-main".to_string(), "/workspace/repo".to_string())]
    );
    Ok(())
}
