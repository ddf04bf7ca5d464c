use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::company::{Company, CompanyStatus, Outcome};

/// Batch-scoped counters. Aggregated into run totals by the batch runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTally {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub jobs_found: usize,
    pub no_careers_page: usize,
    pub fetch_failed: usize,
    pub zero_jobs: usize,
}

impl BatchTally {
    pub fn record(&mut self, company: &Company) {
        self.processed += 1;
        match company.outcome() {
            Outcome::ScrapedWithJobs => {
                self.succeeded += 1;
                self.jobs_found += company.jobs.len();
            }
            Outcome::ScrapedNoJobs => {
                self.succeeded += 1;
                self.zero_jobs += 1;
            }
            Outcome::NoCareersPage => {
                self.failed += 1;
                self.no_careers_page += 1;
            }
            Outcome::FetchFailed => {
                self.failed += 1;
                self.fetch_failed += 1;
            }
            Outcome::InternalError | Outcome::Unprocessed => self.failed += 1,
        }
    }

    pub fn absorb(&mut self, other: &BatchTally) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.jobs_found += other.jobs_found;
        self.no_careers_page += other.no_careers_page;
        self.fetch_failed += other.fetch_failed;
        self.zero_jobs += other.zero_jobs;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEntry {
    pub index: usize,
    pub name: String,
    pub status: CompanyStatus,
    pub reason: Option<String>,
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch: usize,
    pub first_index: usize,
    pub last_index: usize,
    pub tally: BatchTally,
    pub completed_at: DateTime<Utc>,
}

/// Durable record of scraping progress, rewritten after every batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    pub run_id: Uuid,
    pub roster_fingerprint: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<CheckpointEntry>,
    pub batches: Vec<BatchRecord>,
}

impl BatchCheckpoint {
    pub fn new(roster_fingerprint: String) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            roster_fingerprint,
            started_at: now,
            updated_at: now,
            entries: Vec::new(),
            batches: Vec::new(),
        }
    }

    /// SHA-256 over the ordered company names. A checkpoint only applies to
    /// the roster it was written for.
    pub fn fingerprint(companies: &[Company]) -> String {
        let mut hasher = Sha256::new();
        for company in companies {
            hasher.update(company.name.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    pub fn matches(&self, companies: &[Company]) -> bool {
        self.roster_fingerprint == Self::fingerprint(companies)
    }

    pub fn processed_indices(&self) -> HashSet<usize> {
        self.entries.iter().map(|e| e.index).collect()
    }

    /// First roster index without a checkpoint entry.
    pub fn next_unprocessed(&self, total: usize) -> Option<usize> {
        let done = self.processed_indices();
        (0..total).find(|i| !done.contains(i))
    }

    pub fn total_tally(&self) -> BatchTally {
        let mut total = BatchTally::default();
        for batch in &self.batches {
            total.absorb(&batch.tally);
        }
        total
    }

    /// Append a finished batch. Entries must be in roster order.
    pub fn record_batch(&mut self, companies: &[&Company], tally: BatchTally) {
        let (Some(first), Some(last)) = (companies.first(), companies.last()) else {
            return;
        };
        let (first_index, last_index) = (first.index, last.index);

        let done = self.processed_indices();
        for company in companies {
            if done.contains(&company.index) {
                continue;
            }
            self.entries.push(CheckpointEntry {
                index: company.index,
                name: company.name.clone(),
                status: company.status,
                reason: company.failure.as_ref().map(ToString::to_string),
                jobs: company.jobs.len(),
            });
        }

        let now = Utc::now();
        self.batches.push(BatchRecord {
            batch: self.batches.len() + 1,
            first_index,
            last_index,
            tally,
            completed_at: now,
        });
        self.updated_at = now;
    }
}
