//! Workspace naming and repository reference resolution
//!
//! A workspace is identified by a canonical name derived from the repository
//! display name and branch: `<prefix>-<slug(repo)>-<slug(branch)>`. The same pair
//! always yields the same name. Distinct pairs usually yield distinct names, but
//! slugging is lossy (`a/b` and `a-b` map to the same slug), so uniqueness is
//! best-effort only.

use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Prefix used for canonical names and the label namespace unless configured otherwise
pub const DEFAULT_PREFIX: &str = "branchbox";

/// Repository reference and optional branch as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceRef {
    /// Remote URL or local path
    pub repo: String,
    /// Requested branch, if any
    pub branch: Option<String>,
}

impl WorkspaceRef {
    pub fn new(repo: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            repo: repo.into(),
            branch: branch.filter(|b| !b.trim().is_empty()),
        }
    }

    /// Whether the reference points at a remote repository
    pub fn is_remote(&self) -> bool {
        is_remote(&self.repo)
    }

    /// Display name of the repository
    pub fn repo_name(&self) -> String {
        repo_name(&self.repo)
    }
}

/// Canonical, engine-visible workspace name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkspaceIdentity {
    canonical_name: String,
}

impl WorkspaceIdentity {
    /// Derive the identity for a repository/branch pair
    pub fn new(prefix: &str, repo_name: &str, branch: &str) -> Self {
        Self {
            canonical_name: canonical_name(prefix, repo_name, branch),
        }
    }

    /// Wrap a name the user typed, adding the prefix when it is missing
    pub fn from_user_input(prefix: &str, input: &str) -> Self {
        Self {
            canonical_name: resolve_short_name(prefix, input),
        }
    }

    pub fn canonical_name(&self) -> &str {
        &self.canonical_name
    }
}

impl fmt::Display for WorkspaceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name)
    }
}

/// Lower-case; anything outside `[a-z0-9_.-]` becomes a hyphen
///
/// The result only holds characters the engine accepts in container names.
pub fn slug(input: &str) -> String {
    input
        .trim()
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            c @ ('a'..='z' | '0'..='9' | '_' | '.' | '-') => c,
            _ => '-',
        })
        .collect()
}

/// `<prefix>-<slug(repo)>-<slug(branch)>`
pub fn canonical_name(prefix: &str, repo_name: &str, branch: &str) -> String {
    format!("{}-{}-{}", prefix, slug(repo_name), slug(branch))
}

/// Accept either a full canonical name or the part after `<prefix>-`
pub fn resolve_short_name(prefix: &str, input: &str) -> String {
    if input.starts_with(prefix) {
        input.to_string()
    } else {
        format!("{}-{}", prefix, input)
    }
}

/// `http(s)://`, `ssh://` and scp-style `git@host:path` references are remote
pub fn is_remote(reference: &str) -> bool {
    ["http://", "https://", "ssh://", "git@"]
        .iter()
        .any(|scheme| reference.starts_with(scheme))
}

/// Display name of a repository reference
///
/// Remote references use their last path segment without a `.git` suffix; local
/// paths use the final component of the absolutized path.
pub fn repo_name(reference: &str) -> String {
    if is_remote(reference) {
        let without_scheme = reference
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(reference);
        let path = without_scheme
            .split(['?', '#'])
            .next()
            .unwrap_or(without_scheme)
            .trim_end_matches('/');
        let last = path.rsplit(['/', ':']).next().unwrap_or(path);
        last.strip_suffix(".git").unwrap_or(last).to_string()
    } else {
        absolutize(Path::new(reference))
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "repo".to_string())
    }
}

/// Absolute form of a host path, resolving symlinks when the path exists
pub fn absolutize(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
