use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};
use crate::commands::analyze::AnalyzeCommandOptions;

#[derive(Debug, Parser)]
#[command(
    name = "facetlens",
    version,
    about = "Extract per-session facets from coding assistant transcripts and synthesize a usage report"
)]
pub struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Select sessions, extract facets and write the synthesized report.
    Analyze(AnalyzeArgs),
    /// Remove every cached facet.
    ClearCache,
    /// Show resolved paths, cache size and provider configuration.
    Status,
}

#[derive(Debug, Args)]
struct AnalyzeArgs {
    /// Report output path (default ./facetlens-report.json).
    #[arg(long, short = 'o')]
    output: Option<String>,
    /// Only analyze projects whose name contains this text.
    #[arg(long, short = 'p')]
    project: Option<String>,
    /// Only analyze sessions created within the last N days.
    #[arg(long, short = 'd')]
    days: Option<u32>,
    /// Upper bound on sessions sent for extraction.
    #[arg(long)]
    max_sessions: Option<usize>,
    /// Maximum simultaneous extraction requests.
    #[arg(long)]
    concurrency: Option<usize>,
    /// Drop cached facets before selecting sessions.
    #[arg(long)]
    clear_cache: bool,
}

impl From<AnalyzeArgs> for AnalyzeCommandOptions {
    fn from(args: AnalyzeArgs) -> Self {
        Self {
            output: args.output,
            project: args.project,
            days: args.days,
            max_sessions: args.max_sessions,
            concurrency: args.concurrency,
            clear_cache: args.clear_cache,
        }
    }
}

fn emit(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{}", report.render_text());
    }
    if !report.ok {
        bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = match cli.command {
        Command::Analyze(args) => commands::analyze::run(&args.into()).await?,
        Command::ClearCache => commands::clear_cache::run().await?,
        Command::Status => commands::status::run().await?,
    };
    emit(&report, cli.json)
}
