pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "kestrel",
    version,
    about = "Resolve common species names to consensus taxonomies",
    long_about = "Kestrel resolves vernacular species names to a seven-rank taxonomy \
                  (Kingdom to Species) by querying several taxonomy sources, reconciling \
                  their answers, and caching known names in a local reference corpus."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of threads for corpus matching (0 = all available)
    #[arg(short = 'j', long, default_value = "0", global = true)]
    pub threads: usize,

    /// Configuration file (defaults to ~/.kestrel/config.toml if present)
    #[arg(long, global = true, env = "KESTREL_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the names in a column of a table to taxonomies
    Search(commands::search::SearchArgs),

    /// Merge search results back into the source table
    Merge(commands::merge::MergeArgs),

    /// Split search results into passed and failed files for curation
    Check(commands::check::CheckArgs),

    /// Normalize a raw corpus file and keep only complete taxa
    FormatCorpus(commands::corpus::FormatCorpusArgs),

    /// Write a default configuration file
    InitConfig(commands::config::InitConfigArgs),
}
