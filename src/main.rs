use anyhow::Context;
use brew_bottler::BottleError;
use brew_bottler::config::{Cli, Settings};
use brew_bottler::pipeline;
use clap::Parser;
use colored::Colorize;

/// `--verbose` turns on this crate's debug output only; HTTP internals stay quiet.
const VERBOSE_DIRECTIVES: &str = "brew_bottler=debug,bottler=debug,warn";

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let filter = if verbose {
        tracing_subscriber::EnvFilter::new(VERBOSE_DIRECTIVES)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
        .context("Failed to initialize logging")
}

fn report_error(err: &BottleError) -> i32 {
    eprintln!("{} {}", "error:".red().bold(), err);
    err.exit_code()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables win over its values
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let settings = match Settings::from_cli(cli) {
        Ok(settings) => settings,
        Err(e) => std::process::exit(report_error(&e)),
    };

    // Dropping the run future kills any running brew process and aborts uploads
    let result = tokio::select! {
        result = pipeline::run(&settings) => result,
        _ = tokio::signal::ctrl_c() => Err(BottleError::Cancelled),
    };

    let code = match result {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => report_error(&e),
    };
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
