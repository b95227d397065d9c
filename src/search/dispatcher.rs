/// Bounded, throttled fan-out of terms to the resolver
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::output::{ResultWriter, WriteSummary};
use super::resolver::{Outcome, Resolver};
use crate::core::config::SearchConfig;
use crate::terms::Term;
use crate::utils::progress::create_progress_bar;
use crate::{KestrelError, Result};

#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Maximum number of terms resolving at once
    pub max_in_flight: usize,
    /// Sleep for `pause` after every `pause_every` dispatches (0 = never)
    pub pause_every: usize,
    pub pause: Duration,
    /// Wait for every in-flight term after this many dispatches (0 = never)
    pub barrier_every: usize,
    pub show_progress: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

impl From<&SearchConfig> for DispatchOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            max_in_flight: config.max_in_flight.max(1),
            pause_every: config.pause_every,
            pause: Duration::from_millis(config.pause_millis),
            barrier_every: config.barrier_every,
            show_progress: true,
        }
    }
}

/// Term counts for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Terms handed to the dispatcher
    pub terms: usize,
    /// Terms already present in earlier output
    pub skipped: usize,
    pub matched: usize,
    pub missed: usize,
    /// Terms left unresolved by a shutdown request
    pub cancelled: usize,
    /// Terms whose task panicked or whose rows could not be written
    pub failed: usize,
    pub rows: WriteSummary,
}

type TaskResult = std::result::Result<(Outcome, Result<()>), JoinError>;

pub struct Dispatcher {
    resolver: Arc<Resolver>,
    writer: Arc<ResultWriter>,
    options: DispatchOptions,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(resolver: Resolver, writer: ResultWriter, options: DispatchOptions) -> Self {
        Self {
            resolver: Arc::new(resolver),
            writer: Arc::new(writer),
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops dispatch when cancelled. In-flight terms stop at
    /// their next step and are left for the next run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn writer(&self) -> &ResultWriter {
        &self.writer
    }

    /// Resolve every term not already recorded and write its rows
    pub async fn run(&self, terms: impl IntoIterator<Item = Term>) -> Result<DispatchSummary> {
        let mut summary = DispatchSummary::default();
        let mut pending = Vec::new();
        for term in terms {
            summary.terms += 1;
            if self.writer.is_done(&term) {
                summary.skipped += 1;
            } else {
                pending.push(term);
            }
        }
        if summary.skipped > 0 {
            info!(skipped = summary.skipped, "Skipping terms found in previous output");
        }

        let total = pending.len();
        info!(terms = total, max_in_flight = self.options.max_in_flight, "Dispatching terms");
        let pb = create_progress_bar(total as u64, "Dispatching", self.options.show_progress && total > 0);

        let semaphore = Arc::new(Semaphore::new(self.options.max_in_flight));
        let mut tasks: JoinSet<(Outcome, Result<()>)> = JoinSet::new();

        for (idx, term) in pending.into_iter().enumerate() {
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => Some(
                    permit.map_err(|e| KestrelError::Other(format!("dispatch semaphore closed: {}", e)))?,
                ),
            };
            let Some(permit) = permit else {
                summary.cancelled += total - idx;
                break;
            };

            let resolver = self.resolver.clone();
            let writer = self.writer.clone();
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let mut term = term;
                let outcome = resolver.resolve(&mut term, &cancel).await;
                let written = match outcome {
                    Outcome::Matched => writer.write_match(&term),
                    Outcome::Missed => writer.write_miss(&term),
                    Outcome::Cancelled => Ok(()),
                };
                (outcome, written)
            });

            let dispatched = idx + 1;
            pb.set_position(dispatched as u64);
            while let Some(result) = tasks.try_join_next() {
                record(&mut summary, result);
            }

            if self.options.barrier_every > 0 && dispatched % self.options.barrier_every == 0 {
                debug!(dispatched, "Waiting for in-flight terms");
                while let Some(result) = tasks.join_next().await {
                    record(&mut summary, result);
                }
            }
            if self.options.pause_every > 0 && dispatched % self.options.pause_every == 0 {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.options.pause) => {}
                }
            }
        }

        pb.set_message("Waiting for results");
        while let Some(result) = tasks.join_next().await {
            record(&mut summary, result);
        }
        pb.finish_and_clear();

        summary.rows = self.writer.finish()?;
        if summary.cancelled > 0 {
            warn!(remaining = summary.cancelled, "Search interrupted; rerun to resume");
        }
        info!(
            matched = summary.matched,
            missed = summary.missed,
            match_rows = summary.rows.match_rows,
            miss_rows = summary.rows.miss_rows,
            "Search complete"
        );
        Ok(summary)
    }
}

fn record(summary: &mut DispatchSummary, result: TaskResult) {
    match result {
        Ok((outcome, Ok(()))) => match outcome {
            Outcome::Matched => summary.matched += 1,
            Outcome::Missed => summary.missed += 1,
            Outcome::Cancelled => summary.cancelled += 1,
        },
        Ok((_, Err(e))) => {
            error!(error = %e, "Failed to write results");
            summary.failed += 1;
        }
        Err(e) => {
            error!(error = %e, "Search task failed");
            summary.failed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = SearchConfig {
            max_in_flight: 0,
            pause_millis: 250,
            ..SearchConfig::default()
        };
        let options = DispatchOptions::from(&config);
        assert_eq!(options.max_in_flight, 1);
        assert_eq!(options.pause, Duration::from_millis(250));
        assert_eq!(options.pause_every, 10);
        assert_eq!(options.barrier_every, 200);
    }

    #[test]
    fn test_record_counts_outcomes() {
        let mut summary = DispatchSummary::default();
        record(&mut summary, Ok((Outcome::Matched, Ok(()))));
        record(&mut summary, Ok((Outcome::Missed, Ok(()))));
        record(&mut summary, Ok((Outcome::Cancelled, Ok(()))));
        record(&mut summary, Ok((Outcome::Matched, Err(KestrelError::Other("disk full".into())))));
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.missed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.failed, 1);
    }
}
