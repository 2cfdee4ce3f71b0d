use anyhow::{Result, bail};
use clap::Args;
use lockledger::MigrationTarget;

use crate::{context::OperatorContext, output::Output};

#[derive(Args)]
pub struct ResolveArgs {
    /// Migration id to resolve
    pub id: String,

    /// The migration was completed by hand: clear its dirty flag
    #[arg(long, conflicts_with = "removed", required_unless_present = "removed")]
    pub finished: bool,

    /// The migration was rolled back: delete its entry so it runs again
    #[arg(long)]
    pub removed: bool,
}

pub async fn handle_resolve(args: ResolveArgs, ctx: &OperatorContext, output: &Output) -> Result<()> {
    let id = args.id.as_str();
    let target = ctx.connect().await?;
    let Some(entry) = target.ledger().entry(id).await? else {
        bail!("migration '{id}' is not in ledger '{}'", ctx.target.collection);
    };

    if args.removed {
        target.remove(id).await?;
        output.ok(&format!("removed '{id}'; the next run applies it again"));
    } else if entry.dirty {
        target.finish_migration(id).await?;
        output.ok(&format!("marked '{id}' as finished"));
    } else {
        output.note(&format!("'{id}' is not dirty; nothing to do"));
    }
    Ok(())
}
