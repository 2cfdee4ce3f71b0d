use anyhow::Result;
use clap::Args;

use crate::{context::OperatorContext, output::Output};

#[derive(Args)]
pub struct UnlockArgs {}

pub async fn handle_unlock(_args: UnlockArgs, ctx: &OperatorContext, output: &Output) -> Result<()> {
    let target = ctx.connect().await?;
    match target.force_unlock().await? {
        Some(token) => {
            output.ok(&format!("released lock held by {token}"));
            output.warn("a runner that still believes it holds the lock is no longer protected");
        }
        None => output.note("lock was already free"),
    }
    Ok(())
}
