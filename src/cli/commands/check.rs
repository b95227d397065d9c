use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{format_number, section_header, tree_section};
use crate::report::{check_results, outfile_names};

#[derive(Args)]
pub struct CheckArgs {
    /// Search results to check
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Base name for the .passed.csv and .failed.csv files (defaults to the input)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Curated taxonomies (SearchTerm plus rank columns) that override results
    #[arg(long, value_name = "FILE")]
    pub curated: Option<PathBuf>,
}

pub fn run(args: CheckArgs) -> anyhow::Result<()> {
    let output = args.output.clone().unwrap_or_else(|| args.input.clone());
    let stats = check_results(&args.input, &output, args.curated.as_deref())?;
    let (passed, failed) = outfile_names(&output);

    section_header("Check Results");
    tree_section(&[
        ("Passed", format!("{} ({})", format_number(stats.passed), passed.display())),
        ("Failed", format!("{} ({})", format_number(stats.failed), failed.display())),
        ("Curated", format_number(stats.curated)),
        ("Filled from hierarchy", format_number(stats.filled)),
    ]);
    Ok(())
}
