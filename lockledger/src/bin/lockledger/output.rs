use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Table, presets};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Pretty-printed JSON for scripts
    Json,
    /// One summary line
    Compact,
}

/// Something a command reports in every output format.
pub trait Report: Serialize {
    fn table(&self, color: bool) -> Table;
    fn summary(&self) -> String;
}

/// Table with a bold header row; plain ASCII borders when color is off.
pub fn report_table(color: bool, headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(if color { presets::UTF8_FULL_CONDENSED } else { presets::ASCII_FULL });
    table.set_header(headers.iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// Writes command progress to the terminal and the final report in the chosen format.
pub struct Output {
    pub format: OutputFormat,
    pub quiet: bool,
    pub color: bool,
}

impl Output {
    /// Status lines only make sense next to a table; JSON and compact stay parseable.
    fn chatty(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Table
    }

    fn line(&self, marker: &str, message: &str, color: Color) {
        if !self.chatty() {
            return;
        }
        if self.color {
            println!("{} {message}", marker.color(color).bold());
        } else {
            println!("{marker} {message}");
        }
    }

    pub fn ok(&self, message: &str) {
        self.line("ok", message, Color::Green);
    }

    pub fn warn(&self, message: &str) {
        self.line("warning:", message, Color::Yellow);
    }

    pub fn note(&self, message: &str) {
        self.line("-", message, Color::BrightBlack);
    }

    pub fn title(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.color {
            println!("{}", text.bold().underline());
        } else {
            println!("{text}");
        }
    }

    pub fn field(&self, key: &str, value: &str) {
        if !self.chatty() {
            return;
        }
        if self.color {
            println!("{:>12}: {value}", key.cyan());
        } else {
            println!("{key:>12}: {value}");
        }
    }

    pub fn report<R: Report>(&self, report: &R) -> Result<()> {
        if self.quiet {
            return Ok(());
        }
        match self.format {
            OutputFormat::Table => println!("{}", report.table(self.color)),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Compact => println!("{}", report.summary()),
        }
        Ok(())
    }
}
