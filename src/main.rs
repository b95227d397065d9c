use clap::Parser;
use colored::*;
use kestrel::cli::commands::{self, load_settings};
use kestrel::cli::{Cli, Commands};
use kestrel::KestrelError;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins, then KESTREL_LOG, then the verbosity flag
    let log_level = std::env::var("KESTREL_LOG").unwrap_or_else(|_| {
        if cli.verbose > 0 {
            "debug".to_string()
        } else {
            "info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        let exit_code = match e.downcast_ref::<KestrelError>() {
            Some(KestrelError::Config(_)) => 2,
            Some(KestrelError::Io(_)) => 3,
            Some(KestrelError::Parse(_)) | Some(KestrelError::Csv(_)) => 4,
            Some(KestrelError::Corpus(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    // 0 leaves rayon's default pool in place
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .map_err(|e| KestrelError::Config(format!("Failed to initialize thread pool: {}", e)))?;
        tracing::debug!(threads = cli.threads, "Configured thread pool");
    }

    match cli.command {
        Commands::Search(args) => {
            let config = load_settings(cli.config.as_deref())?;
            commands::search::run(args, config)
        }
        Commands::Merge(args) => commands::merge::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::FormatCorpus(args) => commands::corpus::run(args),
        Commands::InitConfig(args) => commands::config::run(args),
    }
}
