use anyhow::Result;
use clap::Args;
use lockledger::MigrationTarget;

use crate::{context::OperatorContext, output::Output};

#[derive(Args)]
pub struct InitArgs {}

pub async fn handle_init(_args: InitArgs, ctx: &OperatorContext, output: &Output) -> Result<()> {
    let target = ctx.connect().await?;
    target.create().await?;

    output.ok(&format!("ledger '{}' is ready under prefix '{}'", ctx.target.collection, ctx.prefix));
    output.note(&format!(
        "the lock document in '{}' is created by the first runner that locks",
        ctx.target.lock_collection()
    ));
    Ok(())
}
