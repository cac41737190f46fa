#![forbid(unsafe_code)]
//! Migrate a consensus node's block and state stores into a rollup store.

use chainport::cli::{progress_bar, run_migration, summary_table, MigrateArgs};
use clap::Parser;
use colored::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = MigrateArgs::parse();
    let config = args.config()?;

    let progress = if args.json {
        indicatif::ProgressBar::hidden()
    } else {
        progress_bar()
    };

    let report = match run_migration(&config, &progress) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{} {}", "Migration failed:".red().bold(), e);
            std::process::exit(1);
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", summary_table(&report));
        println!("{}", "Migration completed successfully".bright_green().bold());
    }

    Ok(())
}
