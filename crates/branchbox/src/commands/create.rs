//! Create command implementation
//!
//! `branchbox <repo> [branch]` provisions a workspace, or reuses the existing one
//! with the same canonical name.

use super::CommandContext;
use anyhow::Result;
use branchbox_core::identity::WorkspaceRef;
use branchbox_core::workspace::{CreateOutcome, WorkspaceManager};
use tracing::{info, instrument};

#[instrument(skip(ctx))]
pub async fn execute_create(ctx: &CommandContext, repo: String, branch: Option<String>) -> Result<()> {
    let manager = WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone());
    let outcome = manager.create(&WorkspaceRef::new(repo, branch)).await?;

    if let CreateOutcome::Created { name, .. } = &outcome {
        info!("Workspace {} is ready.", name);
        info!("Run `branchbox claude {}` to start the agent.", short_name(&ctx.config.prefix, name));
    }
    Ok(())
}

/// Name without the `<prefix>-` part, as accepted by every other subcommand
fn short_name<'a>(prefix: &str, name: &'a str) -> &'a str {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(name)
}
