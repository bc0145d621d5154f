//! Version-control collaborator
//!
//! Git is always invoked as an external process, never reimplemented. On the host
//! it is only asked for the current branch of a local repository; inside a
//! workspace the commands below are executed through the engine.

use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Resolves the checked-out branch of a host repository
pub trait BranchResolver {
    /// `None` when the branch cannot be determined (not a repository, detached HEAD)
    fn current_branch(&self, repo: &Path) -> Option<String>;
}

/// [`BranchResolver`] backed by the host `git` binary
#[derive(Debug, Clone, Default)]
pub struct HostGit;

impl BranchResolver for HostGit {
    fn current_branch(&self, repo: &Path) -> Option<String> {
        let output = Command::new("git")
            .args(["branch", "--show-current"])
            .current_dir(repo)
            .output();

        match output {
            Ok(output) if output.status.success() => {
                let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
                (!branch.is_empty()).then_some(branch)
            }
            Ok(output) => {
                debug!(
                    "git branch --show-current failed in {}: {}",
                    repo.display(),
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                None
            }
            Err(e) => {
                debug!("Could not run git: {}", e);
                None
            }
        }
    }
}

/// Current branch of `repo`, or `default_branch` when it cannot be determined
pub fn current_branch_or(resolver: &dyn BranchResolver, repo: &Path, default_branch: &str) -> String {
    resolver
        .current_branch(repo)
        .unwrap_or_else(|| default_branch.to_string())
}

fn git(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

pub fn clone(source: &str, destination: &str) -> Vec<String> {
    git(&["clone", source, destination])
}

pub fn checkout_new_branch(branch: &str) -> Vec<String> {
    git(&["checkout", "-b", branch])
}

pub fn checkout(branch: &str) -> Vec<String> {
    git(&["checkout", branch])
}

/// Allow git to operate on repositories owned by another uid (the bind-mounted host repo)
pub fn trust_all_directories() -> Vec<String> {
    ["sudo", "git", "config", "--system", "--add", "safe.directory", "*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn show_current_branch() -> Vec<String> {
    git(&["branch", "--show-current"])
}

pub fn add_all() -> Vec<String> {
    git(&["add", "."])
}

pub fn status_porcelain() -> Vec<String> {
    git(&["status", "--porcelain"])
}

pub fn commit(message: &str) -> Vec<String> {
    git(&["commit", "-m", message])
}

pub fn push_origin(branch: &str) -> Vec<String> {
    git(&["push", "origin", branch])
}

/// Pass-through arguments, defaulting to `git status`
pub fn passthrough(args: &[String]) -> Vec<String> {
    if args.is_empty() {
        return git(&["status"]);
    }
    std::iter::once("git".to_string())
        .chain(args.iter().cloned())
        .collect()
}
