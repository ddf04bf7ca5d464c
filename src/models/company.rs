use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::fetch::{FailureClass, FetchError};
use crate::models::job::{JobRecord, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Pending,
    Enriched,
    Scraped,
    Failed,
}

impl CompanyStatus {
    /// Scraping has run for the company, whatever the result.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CompanyStatus::Scraped | CompanyStatus::Failed)
    }
}

impl fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompanyStatus::Pending => "pending",
            CompanyStatus::Enriched => "enriched",
            CompanyStatus::Scraped => "scraped",
            CompanyStatus::Failed => "failed",
        })
    }
}

/// Upper bound on postings kept per company, whatever the configured cap.
pub const MAX_JOBS_PER_COMPANY: usize = 3;

/// Why a company ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    NoCareersPage,
    FetchFailed { class: FailureClass, detail: String },
    Internal { detail: String },
}

impl From<&FetchError> for FailureReason {
    fn from(e: &FetchError) -> Self {
        FailureReason::FetchFailed {
            class: e.class(),
            detail: e.to_string(),
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NoCareersPage => f.write_str("no careers page"),
            FailureReason::FetchFailed { class, detail } => {
                write!(f, "fetch failed ({class}): {detail}")
            }
            FailureReason::Internal { detail } => write!(f, "internal error: {detail}"),
        }
    }
}

/// Terminal states the report distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Unprocessed,
    NoCareersPage,
    FetchFailed,
    InternalError,
    ScrapedNoJobs,
    ScrapedWithJobs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub index: usize,
    pub name: String,
    pub website_url: Option<String>,
    pub linkedin_url: Option<String>,
    pub careers_url: Option<String>,
    pub job_listings_url: Option<String>,
    pub platform: Option<Platform>,
    pub jobs: Vec<JobRecord>,
    pub status: CompanyStatus,
    pub failure: Option<FailureReason>,
}

impl Company {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            website_url: None,
            linkedin_url: None,
            careers_url: None,
            job_listings_url: None,
            platform: None,
            jobs: Vec::new(),
            status: CompanyStatus::Pending,
            failure: None,
        }
    }

    pub fn mark_enriched(&mut self) {
        if self.status == CompanyStatus::Pending {
            self.status = CompanyStatus::Enriched;
        }
    }

    /// Replace the company's jobs with a fresh harvest, dropping duplicate
    /// URLs and anything past `cap` (never more than `MAX_JOBS_PER_COMPANY`).
    /// Zero jobs is still a successful scrape.
    pub fn mark_scraped(&mut self, jobs: Vec<JobRecord>, cap: usize) {
        let cap = cap.min(MAX_JOBS_PER_COMPANY);
        self.jobs.clear();
        let mut seen = HashSet::new();
        for job in jobs {
            if self.jobs.len() >= cap {
                break;
            }
            if seen.insert(job.url.clone()) {
                self.jobs.push(job);
            }
        }
        self.status = CompanyStatus::Scraped;
        self.failure = None;
    }

    pub fn mark_failed(&mut self, reason: FailureReason) {
        self.jobs.clear();
        self.status = CompanyStatus::Failed;
        self.failure = Some(reason);
    }

    pub fn outcome(&self) -> Outcome {
        match (&self.status, &self.failure) {
            (CompanyStatus::Scraped, _) if self.jobs.is_empty() => Outcome::ScrapedNoJobs,
            (CompanyStatus::Scraped, _) => Outcome::ScrapedWithJobs,
            (CompanyStatus::Failed, Some(FailureReason::NoCareersPage)) => Outcome::NoCareersPage,
            (CompanyStatus::Failed, Some(FailureReason::FetchFailed { .. })) => {
                Outcome::FetchFailed
            }
            (CompanyStatus::Failed, _) => Outcome::InternalError,
            _ => Outcome::Unprocessed,
        }
    }
}
