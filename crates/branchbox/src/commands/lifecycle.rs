//! `start` and `stop` command implementations

use super::CommandContext;
use anyhow::Result;
use branchbox_core::workspace::WorkspaceManager;
use tracing::instrument;

#[instrument(skip(ctx))]
pub async fn execute_start(ctx: &CommandContext, name: &str) -> Result<()> {
    WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone())
        .start(name)
        .await?;
    Ok(())
}

#[instrument(skip(ctx))]
pub async fn execute_stop(ctx: &CommandContext, name: &str) -> Result<()> {
    WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone())
        .stop(name)
        .await?;
    Ok(())
}
