//! `push` and `git` command implementations
//!
//! Both run under the gateway's running guard, which handles Ctrl-C itself.

use super::CommandContext;
use anyhow::Result;
use branchbox_core::sync::SyncGateway;
use tracing::instrument;

#[instrument(skip(ctx))]
pub async fn execute_push(ctx: &CommandContext, name: &str) -> Result<()> {
    SyncGateway::new(&ctx.docker, &ctx.config, ctx.logger.clone())
        .push(name)
        .await?;
    Ok(())
}

/// Run git in the workspace; a non-zero git exit is not a command failure
#[instrument(skip(ctx))]
pub async fn execute_git(ctx: &CommandContext, name: &str, args: &[String]) -> Result<()> {
    SyncGateway::new(&ctx.docker, &ctx.config, ctx.logger.clone())
        .git(name, args)
        .await?;
    Ok(())
}
