use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{env_report, generate};

/// Turn a group-chat export into prediction-market ideas.
#[derive(Parser, Debug)]
#[command(name = "chat-markets")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate market ideas and print them as JSON
    Generate(GenerateArgs),
    /// List recognized configuration keys and whether each is set
    Env(EnvArgs),
}

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Transcript file, or `-` for stdin
    #[arg(long, short, default_value = "-")]
    pub input: String,

    /// Skip the backend and build the local heuristic ideas only
    #[arg(long)]
    pub heuristic_only: bool,

    /// Fail instead of falling back to heuristic ideas
    #[arg(long, conflicts_with = "heuristic_only")]
    pub no_fallback: bool,

    /// Print the sizing plan without calling the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Emit pipeline events on stderr
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Generate(args) => generate::run(&args),
        Command::Env(args) => {
            let report = env_report::run();
            env_report::print(&report, args.json)
        }
    }
}
