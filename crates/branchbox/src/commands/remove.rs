//! Remove command implementation

use super::CommandContext;
use crate::ui::prompt::TerminalConfirm;
use anyhow::Result;
use branchbox_core::workspace::{AssumeYes, WorkspaceManager};
use tracing::instrument;

/// Remove a workspace, asking first unless `yes` is set
#[instrument(skip(ctx))]
pub async fn execute_remove(ctx: &CommandContext, name: &str, yes: bool) -> Result<()> {
    let manager = WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone());
    if yes {
        manager.remove(name, AssumeYes).await?;
    } else {
        manager.remove(name, TerminalConfirm).await?;
    }
    Ok(())
}
