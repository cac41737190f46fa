//! Command-line plumbing for the migration binary.

use crate::config::{default_home, load_config, Config};
use crate::error::Result;
use crate::migration::{MigrationReport, Migrator};
use crate::persistence::BackendType;
use clap::Parser;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color as TableColor, ContentArrangement, Table};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(
    name = "rollup-migration",
    about = "Migrate the data from the consensus chain to the rollup store"
)]
pub struct MigrateArgs {
    /// Node home directory (defaults to ~/.chaind)
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,

    /// Home directory for the rollup store (defaults to the node home)
    #[arg(long, value_name = "DIR")]
    pub target_home: Option<PathBuf>,

    /// Override the configured database backend (sqlite, memdb)
    #[arg(long, value_name = "BACKEND")]
    pub db_backend: Option<BackendType>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,
}

impl MigrateArgs {
    /// Node configuration with command-line overrides applied.
    pub fn config(&self) -> Result<Config> {
        let home = self.home.clone().unwrap_or_else(default_home);
        let mut config = load_config(&home)?;

        if let Some(target_home) = &self.target_home {
            config.migration.target_root_dir = Some(target_home.clone());
        }
        if let Some(backend) = self.db_backend {
            config.db_backend = backend;
        }

        config.validate()?;
        Ok(config)
    }
}

pub fn progress_bar() -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} heights ({eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");
    ProgressBar::new(0).with_style(style)
}

/// Opens the stores described by `config` and migrates them.
pub fn run_migration(config: &Config, progress: &ProgressBar) -> Result<MigrationReport> {
    let mut migrator = Migrator::open(config)?;
    let report = migrator.run_with_progress(progress);
    progress.finish_and_clear();
    report
}

pub fn summary_table(report: &MigrationReport) -> Table {
    let elapsed = Duration::from_millis(report.elapsed.as_millis() as u64);
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Migration").add_attribute(Attribute::Bold),
            Cell::new("Value").add_attribute(Attribute::Bold),
        ]);

    table.add_row(vec![Cell::new("Chain ID"), Cell::new(&report.chain_id)]);
    table.add_row(vec![
        Cell::new("Initial height"),
        Cell::new(report.migration_height),
    ]);
    table.add_row(vec![
        Cell::new("Blocks migrated"),
        Cell::new(report.blocks_migrated),
    ]);
    table.add_row(vec![
        Cell::new("Extended commits"),
        Cell::new(report.extended_commits_written),
    ]);

    let failures = report.extended_commit_failures.len();
    table.add_row(vec![
        Cell::new("Extended commit failures"),
        Cell::new(failures).fg(if failures > 0 {
            TableColor::Red
        } else {
            TableColor::Green
        }),
    ]);

    let missing = report.missing_proposer_signatures.len();
    table.add_row(vec![
        Cell::new("Empty proposer signatures"),
        Cell::new(missing).fg(if missing > 0 {
            TableColor::Yellow
        } else {
            TableColor::Green
        }),
    ]);
    table.add_row(vec![
        Cell::new("Elapsed"),
        Cell::new(humantime::format_duration(elapsed)),
    ]);
    table
}
