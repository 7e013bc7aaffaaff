//! Mean reversion scanner - main entry point
//!
//! This binary provides two subcommands:
//! - scan: Evaluate every configured symbol once and print the results
//! - watch: Re-run the scan on a fixed interval until Ctrl+C

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reversion_scanner::present::OutputFormat;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "reversion-scanner")]
#[command(about = "Hourly Bollinger/RSI mean-reversion signal scanner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate all symbols once
    Scan {
        /// Path to configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Symbols to scan (comma-separated), overriding the config
        #[arg(short, long)]
        symbols: Option<String>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Do not send alerts for fired signals
        #[arg(long)]
        no_alerts: bool,
    },

    /// Scan repeatedly on a fixed interval
    Watch {
        /// Path to configuration file (defaults are used when omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Cycle interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    // Console goes to stderr so rendered results on stdout stay clean
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Scan { .. } => "scan",
        Commands::Watch { .. } => "watch",
    };

    setup_logging(cli.verbose, command_name)?;

    // Credentials may come from .env
    dotenv::dotenv().ok();

    match cli.command {
        Commands::Scan {
            config,
            symbols,
            format,
            no_alerts,
        } => commands::scan::run(config, symbols, format, !no_alerts),

        Commands::Watch { config, interval } => commands::watch::run(config, interval),
    }
}
