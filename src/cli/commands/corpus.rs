use clap::Args;
use std::path::PathBuf;

use crate::bio::corpus::format_corpus;
use crate::cli::output::{format_number, success, warning};
use crate::core::paths::default_corpus_path;

#[derive(Args)]
pub struct FormatCorpusArgs {
    /// Raw corpus table (SearchTerm, Kingdom..Species, Source)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Formatted corpus (defaults to ~/.kestrel/corpus.csv.gz)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn run(args: FormatCorpusArgs) -> anyhow::Result<()> {
    let output = args.output.unwrap_or_else(default_corpus_path);
    let stats = format_corpus(&args.input, &output)?;

    success(&format!(
        "Wrote {} of {} taxa to {}",
        format_number(stats.written),
        format_number(stats.read),
        output.display()
    ));
    if stats.incomplete > 0 {
        warning(&format!("Dropped {} incomplete taxa", format_number(stats.incomplete)));
    }
    Ok(())
}
