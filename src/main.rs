use anyhow::Result;
use clap::Parser;
use phonalyzer::pronunciation::cli::{run_compare, run_trend, Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let output = match &cli.command {
        Command::Compare(args) => run_compare(args)?,
        Command::Trend(args) => run_trend(args)?,
    };
    println!("{output}");
    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable; `RUST_LOG` overrides the `warn` default.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
