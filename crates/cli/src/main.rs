use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use cli::config::LogFormat;
use cli::{Config, ConsolePrompter, Mode};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Buy postage, register shipments and print labels.
#[derive(Debug, Parser)]
#[command(name = "shippy", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(long, short, value_name = "FILE", default_value = "shippy.toml")]
    config: PathBuf,

    /// How destinations are entered.
    #[arg(value_enum)]
    mode: Mode,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("shippy: {e}");
            return ExitCode::from(2);
        }
    };

    // stdout is reserved for prompts
    let registry = tracing_subscriber::registry().with(
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
    );
    match config.log_format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    let mut prompter = ConsolePrompter::stdio();
    match cli::run(&config, cli.mode, &mut prompter).await {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "session aborted");
            eprintln!("shippy: {e}");
            ExitCode::FAILURE
        }
    }
}
