use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "stationpack",
    version,
    about = "Pack per-station SAC recordings and topology connectivity into one archive per station"
)]
struct Cli {
    /// Print the command report as JSON on stdout.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the archive for one station.
    Build {
        #[arg(long)]
        station: String,
        /// Output archive path (default: <output_dir>/<station_key>.<ext>).
        #[arg(long)]
        output: Option<PathBuf>,
        /// Replace an existing archive at the output path.
        #[arg(long)]
        overwrite: bool,
        /// Log per-file ingestion at debug level only.
        #[arg(long)]
        quiet: bool,
        #[arg(long)]
        graph: Option<PathBuf>,
        #[arg(long)]
        sac_root: Option<PathBuf>,
    },
    /// Build one archive per station in the graph on a worker pool.
    BuildAll {
        #[arg(long)]
        overwrite: bool,
        #[arg(long)]
        quiet: bool,
        /// Worker threads (0 = one per CPU).
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        graph: Option<PathBuf>,
        #[arg(long)]
        sac_root: Option<PathBuf>,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Show resolved paths, configuration and graph size.
    Status,
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let state = if report.ok { "ok" } else { "failed" };
    println!("{}: {state}", report.command);
    for detail in &report.details {
        println!("  {detail}");
    }
    if !report.issues.is_empty() {
        println!("issues:");
        for issue in &report.issues {
            println!("  - {issue}");
        }
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let report = match cli.command {
        Command::Build {
            station,
            output,
            overwrite,
            quiet,
            graph,
            sac_root,
        } => commands::build::run(&commands::build::BuildOptions {
            station,
            output,
            overwrite,
            quiet,
            graph,
            sac_root,
        })?,
        Command::BuildAll {
            overwrite,
            quiet,
            workers,
            graph,
            sac_root,
            output_dir,
        } => commands::build_all::run(&commands::build_all::BuildAllOptions {
            overwrite,
            quiet,
            workers,
            graph,
            sac_root,
            output_dir,
        })?,
        Command::Status => commands::status::run()?,
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
