use std::sync::Arc;

use url::Url;

use crate::collectors::{classify, extract_jobs};
use crate::fetch::Fetcher;
use crate::models::company::{Company, FailureReason};
use crate::models::job::{JobRecord, Platform};

/// Sibling paths tried when the careers page itself lists nothing.
const ALTERNATE_PATHS: &[&str] = &[
    "/jobs",
    "/openings",
    "/positions",
    "/current-openings",
    "/join-us",
    "/work-with-us",
];

#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    pub job_cap: usize,
    pub probe_alternate_paths: bool,
}

/// Scrapes a single company: fetch the careers page, classify it, extract
/// up to `job_cap` postings and record the terminal outcome on the company.
pub struct CompanyPipeline {
    fetcher: Arc<Fetcher>,
    settings: PipelineSettings,
}

impl CompanyPipeline {
    pub fn new(fetcher: Arc<Fetcher>, settings: PipelineSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Every per-company problem ends up on the returned company; nothing
    /// here fails the caller.
    pub async fn process(&self, mut company: Company) -> Company {
        let Some(careers_url) = company
            .careers_url
            .clone()
            .filter(|u| !u.trim().is_empty())
        else {
            company.mark_failed(FailureReason::NoCareersPage);
            return company;
        };

        let page = match self.fetcher.get(&careers_url).await {
            Ok(page) => page,
            Err(e) => {
                company.mark_failed(FailureReason::from(&e));
                return company;
            }
        };

        tracing::debug!("Fetched {} (HTTP {}) for {}", page.url, page.status, company.name);

        let platform = match classify(&careers_url, Some(&page.body)) {
            // A vanity URL may redirect onto a hosted board.
            Platform::Generic => classify(page.url.as_str(), None),
            detected => detected,
        };
        company.platform = Some(platform);

        let cap = self.settings.job_cap;
        let mut listing = page.url.clone();
        let mut jobs = extract_jobs(platform, &page.body, &page.url, cap);
        if jobs.is_empty() && platform != Platform::Generic {
            tracing::debug!(
                "{platform} strategy found nothing for {}, trying generic extraction",
                company.name
            );
            jobs = extract_jobs(Platform::Generic, &page.body, &page.url, cap);
        }
        if jobs.is_empty() && self.settings.probe_alternate_paths {
            if let Some((found_at, found)) = self.probe_alternates(&page.url).await {
                listing = found_at;
                jobs = found;
            }
        }

        if !jobs.is_empty() {
            company.job_listings_url = Some(listing.to_string());
        }
        company.mark_scraped(jobs, cap);
        company
    }

    /// First sibling path whose page yields postings. Probe failures are
    /// not company failures.
    async fn probe_alternates(&self, careers: &Url) -> Option<(Url, Vec<JobRecord>)> {
        let timeout = self.fetcher.settings().timeout;
        for candidate in alternate_urls(careers) {
            match self.fetcher.fetch(candidate.as_str(), timeout, 1).await {
                Ok(page) => {
                    let jobs = extract_jobs(
                        Platform::Generic,
                        &page.body,
                        &page.url,
                        self.settings.job_cap,
                    );
                    if !jobs.is_empty() {
                        tracing::debug!("Found {} job(s) at alternate path {}", jobs.len(), page.url);
                        return Some((page.url, jobs));
                    }
                }
                Err(e) => tracing::debug!("Alternate path {candidate} unavailable: {e}"),
            }
        }
        None
    }
}

/// Each sibling path below the careers page first, then at the site root.
fn alternate_urls(careers: &Url) -> Vec<Url> {
    let base = careers.path().trim_end_matches('/');
    let mut urls: Vec<Url> = Vec::new();
    for path in ALTERNATE_PATHS {
        for candidate_path in [format!("{base}{path}"), (*path).to_string()] {
            let mut candidate = careers.clone();
            candidate.set_path(&candidate_path);
            candidate.set_query(None);
            candidate.set_fragment(None);
            if candidate.path() != careers.path() && !urls.contains(&candidate) {
                urls.push(candidate);
            }
        }
    }
    urls
}
