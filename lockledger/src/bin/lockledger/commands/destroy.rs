use anyhow::{Result, bail};
use clap::Args;
use lockledger::MigrationTarget;

use crate::{context::OperatorContext, output::Output};

#[derive(Args)]
pub struct DestroyArgs {
    /// Confirm dropping every ledger entry
    #[arg(long)]
    pub yes: bool,
}

pub async fn handle_destroy(args: DestroyArgs, ctx: &OperatorContext, output: &Output) -> Result<()> {
    if !args.yes {
        bail!(
            "refusing to drop ledger '{}' without --yes; every migration would look pending",
            ctx.target.collection
        );
    }

    let target = ctx.connect().await?;
    target.destroy().await?;
    output.ok(&format!("dropped ledger '{}'", ctx.target.collection));
    Ok(())
}
