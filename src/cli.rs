//! Command-line interface for flakebench.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use flakebench::overlay::FlakeStrategy;

/// flakebench - a deterministic flake-injection bench
///
/// Injects seeded latency into a mock backend, drives repeated scripted UI
/// flows against it, classifies the failures, and aggregates flake
/// statistics.
#[derive(Parser, Debug)]
#[command(name = "flakebench")]
#[command(version)]
#[command(about = "Reproduce, classify, and measure end-to-end test flakiness", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the mock service with latency injection
    Serve(ServeArgs),

    /// Run the trial loop against a live instance
    Run(RunArgs),

    /// Drive the approve flow once and report the outcome
    Smoke(SmokeArgs),

    /// Re-aggregate an existing trial log
    Report(ReportArgs),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind the service to
    #[arg(long, env = "FLAKE_BIND", default_value = "127.0.0.1:8004")]
    pub bind: SocketAddr,

    /// Directory for the request log
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of trials (overrides FLAKE_RUNS)
    #[arg(long)]
    pub runs: Option<u32>,

    /// Target instance (overrides BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Overlay-fault strategy (overrides FLAKE_STRATEGY)
    #[arg(long, value_enum)]
    pub strategy: Option<FlakeStrategy>,

    /// Directory for the trial log and failure traces
    #[arg(long, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct SmokeArgs {
    /// Target instance (overrides BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Trial log to aggregate
    #[arg(default_value = "artifacts/trial_runs.jsonl")]
    pub log: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn run_has_no_required_arguments() {
        let cli = Cli::try_parse_from(["flakebench", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.runs, None);
                assert_eq!(args.base_url, None);
                assert_eq!(args.artifacts_dir, PathBuf::from("artifacts"));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn run_accepts_strategy_and_runs() {
        let cli =
            Cli::try_parse_from(["flakebench", "run", "--strategy", "naive", "--runs", "10"])
                .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.strategy, Some(FlakeStrategy::Naive));
                assert_eq!(args.runs, Some(10));
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn serve_parses_bind_address() {
        let cli = Cli::try_parse_from(["flakebench", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve(args) => assert_eq!(args.bind.port(), 9000),
            _ => panic!("expected serve subcommand"),
        }
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["flakebench", "-vv", "report"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Cli::try_parse_from(["flakebench", "run", "--strategy", "always"]).is_err());
    }
}
