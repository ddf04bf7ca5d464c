use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;

use crate::collectors::pipeline::CompanyPipeline;
use crate::error::AppError;
use crate::models::checkpoint::{BatchCheckpoint, BatchTally};
use crate::models::company::{Company, FailureReason, Outcome};
use crate::storage::{CheckpointStore, RosterStore};

/// Handoff from the scraping stage to the report and validation stages.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub total_companies: usize,
    /// First roster index processed in this session when resuming.
    pub resumed_from: Option<usize>,
    pub batches_run: usize,
    /// Companies processed in this session only.
    pub session: BatchTally,
    /// Everything the checkpoint has recorded, earlier sessions included.
    pub overall: BatchTally,
}

/// Drives the company pipeline over the roster in fixed-size batches,
/// persisting the dataset and the checkpoint after every batch.
pub struct BatchRunner {
    pipeline: Arc<CompanyPipeline>,
    roster: Arc<dyn RosterStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    batch_size: usize,
}

impl BatchRunner {
    pub fn new(
        pipeline: Arc<CompanyPipeline>,
        roster: Arc<dyn RosterStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        batch_size: usize,
    ) -> Self {
        Self {
            pipeline,
            roster,
            checkpoints,
            batch_size: batch_size.max(1),
        }
    }

    /// Process every company the checkpoint has not seen yet, in roster order.
    ///
    /// Only persistence failures escape; per-company problems, panics
    /// included, are recorded on the company.
    pub async fn run(&self, companies: &mut [Company]) -> Result<ScrapeSummary, AppError> {
        let mut checkpoint = self.resume_point(companies).await?;
        let done = checkpoint.processed_indices();

        let pending: Vec<usize> = companies
            .iter()
            .enumerate()
            .filter(|(_, c)| !done.contains(&c.index))
            .map(|(pos, _)| pos)
            .collect();

        let resumed_from = if done.is_empty() {
            None
        } else {
            checkpoint.next_unprocessed(companies.len())
        };
        match (done.is_empty(), resumed_from) {
            (true, _) => tracing::info!(
                "Scraping {} companies in batches of {}",
                pending.len(),
                self.batch_size
            ),
            (false, Some(index)) => tracing::info!(
                "Resuming at company #{index}: {} already processed, {} remaining",
                done.len(),
                pending.len()
            ),
            (false, None) => tracing::info!(
                "All {} companies already processed, nothing to scrape",
                companies.len()
            ),
        }

        let mut session = BatchTally::default();
        let mut batches_run = 0;
        for chunk in pending.chunks(self.batch_size) {
            let mut tally = BatchTally::default();
            for &pos in chunk {
                let processed = self.process_one(companies[pos].clone()).await;
                log_outcome(&processed);
                tally.record(&processed);
                companies[pos] = processed;
            }

            self.roster.save(companies).await?;
            let finished: Vec<&Company> = chunk.iter().map(|&pos| &companies[pos]).collect();
            checkpoint.record_batch(&finished, tally);
            self.checkpoints.save(&checkpoint).await?;

            batches_run += 1;
            session.absorb(&tally);
            let total = checkpoint.processed_indices().len();
            tracing::info!(
                "Batch {} done ({total}/{}): processed {}, succeeded {}, failed {}, jobs found {}",
                checkpoint.batches.len(),
                companies.len(),
                tally.processed,
                tally.succeeded,
                tally.failed,
                tally.jobs_found
            );
        }

        Ok(ScrapeSummary {
            total_companies: companies.len(),
            resumed_from,
            batches_run,
            session,
            overall: checkpoint.total_tally(),
        })
    }

    /// Load the checkpoint if it belongs to this roster and the loaded
    /// dataset still holds the results it recorded, else start fresh.
    async fn resume_point(&self, companies: &[Company]) -> Result<BatchCheckpoint, AppError> {
        let fingerprint = BatchCheckpoint::fingerprint(companies);
        match self.checkpoints.load().await? {
            Some(existing) if existing.matches(companies) => {
                let settled: HashSet<usize> = companies
                    .iter()
                    .filter(|c| c.status.is_terminal())
                    .map(|c| c.index)
                    .collect();
                let missing = existing
                    .entries
                    .iter()
                    .filter(|e| !settled.contains(&e.index))
                    .count();
                if missing > 0 {
                    tracing::warn!(
                        "Ignoring checkpoint from run {}: {missing} checkpointed companies \
                         have no scrape result in the dataset",
                        existing.run_id
                    );
                    return Ok(BatchCheckpoint::new(fingerprint));
                }
                tracing::info!(
                    "Found checkpoint from run {} with {} processed companies",
                    existing.run_id,
                    existing.entries.len()
                );
                Ok(existing)
            }
            Some(stale) => {
                tracing::warn!(
                    "Ignoring checkpoint from run {}: it was written for a different roster",
                    stale.run_id
                );
                Ok(BatchCheckpoint::new(fingerprint))
            }
            None => Ok(BatchCheckpoint::new(fingerprint)),
        }
    }

    /// Run one company in its own task so a panic is contained to it.
    async fn process_one(&self, company: Company) -> Company {
        let pipeline = Arc::clone(&self.pipeline);
        let mut fallback = company.clone();
        match tokio::spawn(async move { pipeline.process(company).await }).await {
            Ok(processed) => processed,
            Err(e) => {
                tracing::error!("Company #{} ({}) crashed: {e}", fallback.index, fallback.name);
                fallback.mark_failed(FailureReason::Internal {
                    detail: e.to_string(),
                });
                fallback
            }
        }
    }
}

fn log_outcome(company: &Company) {
    let who = format!("#{} {}", company.index, company.name);
    match company.outcome() {
        Outcome::ScrapedWithJobs => tracing::info!(
            "{who}: scraped {} job(s) from {} page",
            company.jobs.len(),
            company.platform.map(|p| p.as_str()).unwrap_or("unknown")
        ),
        Outcome::ScrapedNoJobs => tracing::info!("{who}: scraped, zero jobs"),
        Outcome::NoCareersPage => tracing::info!("{who}: no careers page"),
        Outcome::FetchFailed | Outcome::InternalError | Outcome::Unprocessed => {
            let reason = company
                .failure
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "unknown failure".into());
            tracing::info!("{who}: {reason}");
        }
    }
}
