use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bio::corpus::Corpus;
use crate::bio::scorer::Scorer;
use crate::cli::output::{format_number, info as print_info, section_header, success, tree_section, warning};
use crate::core::config::Config;
use crate::download::HttpFetcher;
use crate::search::output::sibling;
use crate::search::{DispatchOptions, DispatchSummary, Dispatcher, Resolver, ResultWriter, WebSearch, REJECTED_FILE};
use crate::sources::{build_registry, build_speller};
use crate::terms::extract_terms;

#[derive(Args)]
pub struct SearchArgs {
    /// Input table with a header row
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Matches file; misses and rejections are written next to it
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,

    /// Zero-based column holding the names to search
    #[arg(short, long, default_value = "0")]
    pub column: usize,

    /// Query the sources for every term instead of resolving known names from
    /// the corpus (the corpus is still loaded for gap filling)
    #[arg(long)]
    pub no_corpus: bool,

    /// Fall back to a web search when every source misses
    #[arg(long)]
    pub web_search: bool,

    /// Maximum number of terms resolving at once
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl SearchArgs {
    fn apply(&self, config: &mut Config) {
        if self.no_corpus {
            config.search.use_corpus = false;
        }
        if self.web_search {
            config.web_search.enabled = true;
        }
        if let Some(n) = self.max_in_flight {
            config.search.max_in_flight = n;
        }
        if let Some(secs) = self.timeout {
            config.search.request_timeout_secs = secs;
        }
    }
}

pub fn run(args: SearchArgs, mut config: Config) -> anyhow::Result<()> {
    args.apply(&mut config);
    config.validate()?;

    let extraction = extract_terms(&args.input, args.column)?;
    let rejected = sibling(&args.output, REJECTED_FILE);
    extraction.write_rejected(&rejected)?;
    info!(path = %rejected.display(), rejected = extraction.rejected.len(), "Wrote rejected queries");

    // Reference data must load before anything is dispatched
    let corpus = Arc::new(Corpus::load(&config.corpus.files, config.scoring.fuzzy_ratio)?);

    let fetcher = HttpFetcher::new(config.search.request_timeout())?;
    let mut resolver = Resolver::new(build_registry(&config, &fetcher))
        .with_corpus(corpus)
        .with_corpus_lookup(config.search.use_corpus)
        .with_scorer(Scorer::new(config.scoring.consensus_threshold))
        .with_timeout(config.search.request_timeout());
    if let Some(speller) = build_speller(&config, &fetcher) {
        resolver = resolver.with_speller(speller);
    }
    if config.web_search.enabled {
        resolver = resolver.with_web_search(Arc::new(WebSearch::new(
            fetcher.clone(),
            &config.web_search.url_template,
        )));
    }

    let writer = ResultWriter::open(&args.output)?;
    let mut options = DispatchOptions::from(&config.search);
    options.show_progress = !args.no_progress;
    let dispatcher = Dispatcher::new(resolver, writer, options);

    let rejected_count = extraction.rejected.len();
    let terms = extraction.terms;
    let runtime = tokio::runtime::Runtime::new()?;
    let summary = runtime.block_on(async {
        let cancel = dispatcher.cancel_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping after in-flight terms");
                cancel.cancel();
            }
        });
        dispatcher.run(terms.into_values()).await
    })?;

    print_summary(&summary, rejected_count);
    Ok(())
}

fn print_summary(summary: &DispatchSummary, rejected: usize) {
    section_header("Search Summary");
    tree_section(&[
        ("Terms", format_number(summary.terms)),
        ("Already done", format_number(summary.skipped)),
        ("Matched", format_number(summary.matched)),
        ("Missed", format_number(summary.missed)),
        ("Rejected queries", format_number(rejected)),
    ]);
    println!();

    success(&format!(
        "Found matches for {} queries",
        format_number(summary.rows.match_rows)
    ));
    if summary.rows.miss_rows > 0 {
        print_info(&format!(
            "No match for {} queries",
            format_number(summary.rows.miss_rows)
        ));
    }
    if summary.cancelled > 0 {
        warning(&format!(
            "{} terms were not searched; rerun the same command to resume",
            format_number(summary.cancelled)
        ));
    }
    if summary.failed > 0 {
        warning(&format!("{} terms failed; see the log", format_number(summary.failed)));
    }
}
