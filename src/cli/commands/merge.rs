use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{format_number, success};
use crate::report::{merge_results, MergeOptions};

#[derive(Args)]
pub struct MergeArgs {
    /// Original input table
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Search results to merge in
    #[arg(short, long, value_name = "FILE")]
    pub results: PathBuf,

    /// Merged output table
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Zero-based column of the input holding the searched names
    #[arg(short, long, default_value = "0")]
    pub column: usize,

    /// Put the taxonomy columns before the input columns
    #[arg(long)]
    pub prepend: bool,
}

pub fn run(args: MergeArgs) -> anyhow::Result<()> {
    let options = MergeOptions {
        column: args.column,
        prepend: args.prepend,
    };
    let stats = merge_results(&args.input, &args.results, &args.output, options)?;
    success(&format!(
        "Merged taxonomies into {} of {} rows: {}",
        format_number(stats.matched),
        format_number(stats.rows),
        args.output.display()
    ));
    Ok(())
}
