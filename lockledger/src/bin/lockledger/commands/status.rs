use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use comfy_table::{Cell, Color, Table};
use lockledger::LedgerEntry;
use serde::Serialize;

use crate::{
    context::OperatorContext,
    output::{Output, OutputFormat, Report, report_table},
};

#[derive(Args)]
pub struct StatusArgs {
    /// Only list entries left dirty by an interrupted run
    #[arg(long)]
    dirty_only: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub collection: String,
    pub lock_holder: Option<String>,
    pub entries: Vec<LedgerEntry>,
}

impl StatusReport {
    fn dirty_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.dirty).count()
    }
}

fn timestamp(value: Option<DateTime<Utc>>) -> String {
    value.map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M:%S").to_string())
}

impl Report for StatusReport {
    fn table(&self, color: bool) -> Table {
        let mut table = report_table(color, &["Migration", "State", "Started", "Finished"]);
        for entry in &self.entries {
            let state = match (entry.dirty, color) {
                (true, true) => Cell::new("dirty").fg(Color::Yellow),
                (true, false) => Cell::new("dirty"),
                (false, _) => Cell::new("applied"),
            };
            table.add_row(vec![
                Cell::new(&entry.id),
                state,
                Cell::new(timestamp(entry.started_at)),
                Cell::new(timestamp(entry.finished_at)),
            ]);
        }
        table
    }

    fn summary(&self) -> String {
        format!(
            "collection={} entries={} dirty={} lock={}",
            self.collection,
            self.entries.len(),
            self.dirty_count(),
            self.lock_holder.as_deref().unwrap_or("free")
        )
    }
}

pub async fn handle_status(args: StatusArgs, ctx: &OperatorContext, output: &Output) -> Result<()> {
    let target = ctx.connect().await?;
    let mut entries = target.entries().await?;
    if args.dirty_only {
        entries.retain(|entry| entry.dirty);
    }
    let report = StatusReport {
        collection: ctx.target.collection.clone(),
        lock_holder: target.lock_holder().await?,
        entries,
    };

    output.title(&format!("ledger {}", report.collection));
    if report.entries.is_empty() {
        output.note("no migrations recorded");
    }
    if !report.entries.is_empty() || output.format != OutputFormat::Table {
        output.report(&report)?;
    }
    output.field("lock", report.lock_holder.as_deref().unwrap_or("free"));

    let dirty = report.dirty_count();
    if dirty > 0 {
        output.warn(&format!(
            "{dirty} migration(s) were interrupted; check the data, then run `lockledger resolve <id>`"
        ));
    }
    Ok(())
}
