//! List command implementation
//!
//! The table (or JSON with `--json`) goes to stdout; logs stay on stderr.

use super::CommandContext;
use anyhow::Result;
use branchbox_core::workspace::{render_table, WorkspaceManager};
use tracing::instrument;

#[instrument(skip(ctx))]
pub async fn execute_list(ctx: &CommandContext, json: bool) -> Result<()> {
    let manager = WorkspaceManager::new(&ctx.docker, &ctx.config, ctx.logger.clone());
    let rows = manager.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else if !rows.is_empty() {
        print!("{}", render_table(&rows));
    }
    Ok(())
}
