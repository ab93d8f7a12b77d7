//! flakebench - deterministic flake-injection bench
//!
//! This is the main entry point for the flakebench CLI.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, ReportArgs, RunArgs, ServeArgs, SmokeArgs};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use flakebench::classify::classify;
use flakebench::error::Result;
use flakebench::jsonl::read_records;
use flakebench::overlay::FlakeStrategy;
use flakebench::report::AggregateReport;
use flakebench::server::{MockService, ServiceConfig};
use flakebench::settings::Settings;
use flakebench::trial::{TrialRecord, TrialRunner};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match execute(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3))
        .with(env_filter)
        .init();
}

async fn execute(cli: Cli) -> Result<i32> {
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::Run(args) => run_trials(args).await,
        Commands::Smoke(args) => smoke(args).await,
        Commands::Report(args) => report(&args),
    }
}

async fn serve(args: ServeArgs) -> Result<i32> {
    let settings = Settings::from_env()?;
    let service = MockService::new(ServiceConfig {
        bind_address: args.bind,
        artifacts_dir: args.artifacts_dir,
        settings,
    })?;
    service.run().await?;
    Ok(0)
}

async fn run_trials(args: RunArgs) -> Result<i32> {
    let mut settings = Settings::from_env()?;
    if let Some(runs) = args.runs {
        settings.runs = runs;
    }
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }

    let mut runner = TrialRunner::new(&settings, &args.artifacts_dir)?;

    // Unreachable target is the only failure that is fatal before trials.
    runner.assert_server_up().await?;

    let records = runner.run().await?;
    AggregateReport::from_records(&records).print();

    // Trial failures are data, not process errors.
    Ok(0)
}

async fn smoke(args: SmokeArgs) -> Result<i32> {
    let mut settings = Settings::from_env()?;
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    settings.strategy = FlakeStrategy::Off;
    settings.runs = 1;

    let mut runner = TrialRunner::new(&settings, "artifacts")?;
    runner.assert_server_up().await?;

    match runner.smoke().await {
        Ok(()) => {
            println!("smoke: ok");
            Ok(0)
        }
        Err(err) => {
            println!("smoke: failed ({}): {err}", classify(&err));
            Ok(1)
        }
    }
}

fn report(args: &ReportArgs) -> Result<i32> {
    let records: Vec<TrialRecord> = read_records(&args.log)?;
    AggregateReport::from_records(&records).print();
    Ok(0)
}
