//! Post-scrape validation of the persisted dataset: URL repair, record
//! consistency and (optionally) reachability of every stored link.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::fetch::{Fetcher, parse_http_url};
use crate::models::company::{Company, CompanyStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub index: usize,
    pub company: String,
    pub problem: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkCounts {
    pub checked: usize,
    pub reachable: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub companies_checked: usize,
    pub urls_repaired: usize,
    pub issues: Vec<Issue>,
    /// Per link kind (`website`, `linkedin`, `careers`, `job`); empty when
    /// link checking was skipped.
    pub reachability: BTreeMap<&'static str, LinkCounts>,
    pub unreachable: Vec<Issue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Add a missing `https://` to a bare domain. `None` when nothing changes.
pub fn repair_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains("://") {
        return (trimmed != raw && !trimmed.is_empty()).then(|| trimmed.to_string());
    }
    let host = trimmed.split('/').next().unwrap_or_default();
    if host.contains('.') && !host.contains(' ') {
        Some(format!("https://{trimmed}"))
    } else {
        None
    }
}

/// Everything that is wrong with a single company record.
pub fn consistency_problems(company: &Company, job_cap: usize) -> Vec<String> {
    let mut problems = Vec::new();

    if company.jobs.len() > job_cap {
        problems.push(format!(
            "{} jobs attached, more than the cap of {job_cap}",
            company.jobs.len()
        ));
    }
    let mut seen = HashSet::new();
    for job in &company.jobs {
        if !seen.insert(job.url.as_str()) {
            problems.push(format!("duplicate job URL {}", job.url));
        }
        if !job.has_valid_url() {
            problems.push(format!("invalid job URL {:?}", job.url));
        }
        if job.title.trim().is_empty() {
            problems.push(format!("job {} has no title", job.url));
        }
    }

    match company.status {
        CompanyStatus::Failed if company.failure.is_none() => {
            problems.push("failed without a recorded reason".into());
        }
        CompanyStatus::Failed if !company.jobs.is_empty() => {
            problems.push("failed but still has jobs attached".into());
        }
        CompanyStatus::Scraped if company.failure.is_some() => {
            problems.push("scraped but carries a failure reason".into());
        }
        CompanyStatus::Pending | CompanyStatus::Enriched if !company.jobs.is_empty() => {
            problems.push(format!("has jobs while still {}", company.status));
        }
        _ => {}
    }

    for (field, value) in url_fields(company) {
        if let Err(e) = parse_http_url(value) {
            problems.push(format!("{field} URL {value:?} is unusable: {e}"));
        }
    }

    problems
}

fn url_fields(company: &Company) -> Vec<(&'static str, &str)> {
    [
        ("website", company.website_url.as_deref()),
        ("linkedin", company.linkedin_url.as_deref()),
        ("careers", company.careers_url.as_deref()),
    ]
    .into_iter()
    .filter_map(|(field, value)| value.map(|v| (field, v)))
    .collect()
}

pub struct Validator {
    /// `None` skips reachability checks.
    fetcher: Option<Arc<Fetcher>>,
    job_cap: usize,
}

impl Validator {
    pub fn new(fetcher: Option<Arc<Fetcher>>, job_cap: usize) -> Self {
        Self { fetcher, job_cap }
    }

    pub async fn validate(&self, companies: &mut [Company]) -> ValidationReport {
        let mut report = ValidationReport {
            companies_checked: companies.len(),
            ..Default::default()
        };

        for company in companies.iter_mut() {
            report.urls_repaired += repair_company_urls(company);
            for problem in consistency_problems(company, self.job_cap) {
                tracing::warn!("#{} {}: {problem}", company.index, company.name);
                report.issues.push(Issue {
                    index: company.index,
                    company: company.name.clone(),
                    problem,
                });
            }
        }

        match &self.fetcher {
            Some(fetcher) => {
                for company in companies.iter() {
                    self.check_links(fetcher, company, &mut report).await;
                }
            }
            None => tracing::info!("Skipping link reachability checks"),
        }

        tracing::info!(
            "Validated {} companies: {} URLs repaired, {} consistency issues, {} unreachable links",
            report.companies_checked,
            report.urls_repaired,
            report.issues.len(),
            report.unreachable.len()
        );
        report
    }

    async fn check_links(&self, fetcher: &Fetcher, company: &Company, report: &mut ValidationReport) {
        let mut links: Vec<(&'static str, &str)> = url_fields(company);
        links.extend(company.jobs.iter().map(|j| ("job", j.url.as_str())));

        let timeout = fetcher.settings().timeout;
        for (kind, url) in links {
            let counts = report.reachability.entry(kind).or_default();
            counts.checked += 1;
            match fetcher.fetch(url, timeout, 1).await {
                Ok(_) => counts.reachable += 1,
                Err(e) => {
                    tracing::debug!("#{} {kind} link {url} unreachable: {e}", company.index);
                    report.unreachable.push(Issue {
                        index: company.index,
                        company: company.name.clone(),
                        problem: format!("{kind} {url}: {e}"),
                    });
                }
            }
        }
    }
}

fn repair_company_urls(company: &mut Company) -> usize {
    let mut repaired = 0;
    for slot in [
        &mut company.website_url,
        &mut company.linkedin_url,
        &mut company.careers_url,
        &mut company.job_listings_url,
    ] {
        let Some(value) = slot.as_deref() else {
            continue;
        };
        if let Some(fixed) = repair_url(value) {
            tracing::debug!("Repaired URL {value:?} -> {fixed} for {}", company.name);
            *slot = Some(fixed);
            repaired += 1;
        }
    }
    repaired
}
