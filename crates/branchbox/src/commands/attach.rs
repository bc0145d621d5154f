//! `claude` and `code` command implementations

use super::CommandContext;
use anyhow::Result;
use branchbox_core::workspace::WorkspaceManager;
use tracing::{debug, instrument};

/// Attach the agent to the caller's terminal
#[instrument(skip(ctx))]
pub async fn execute_claude(ctx: &CommandContext, name: &str) -> Result<()> {
    let manager = WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone());
    debug!("Use /exit to quit and detach from the workspace.");
    manager.attach_agent(name).await?;
    Ok(())
}

/// Open the editor on the workspace repository
#[instrument(skip(ctx))]
pub async fn execute_code(ctx: &CommandContext, name: &str) -> Result<()> {
    let manager = WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone());
    manager.attach_editor(name).await?;
    Ok(())
}
