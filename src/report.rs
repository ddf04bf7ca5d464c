use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::collectors::runner::ScrapeSummary;
use crate::enrich::EnrichSummary;
use crate::error::AppError;
use crate::models::company::{Company, Outcome};
use crate::storage::write_atomic;
use crate::validate::ValidationReport;

/// Reporting thresholds. They never change what the pipeline does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Targets {
    pub jobs: usize,
    pub companies: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeBreakdown {
    pub no_careers_page: usize,
    pub fetch_failed: usize,
    pub internal_error: usize,
    pub scraped_zero_jobs: usize,
    pub scraped_with_jobs: usize,
    pub unprocessed: usize,
}

/// End-of-run totals, written as JSON and rendered as the final report.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: DateTime<Utc>,
    pub total_companies: usize,
    pub processed: usize,
    pub with_website: usize,
    pub with_linkedin: usize,
    pub with_careers_page: usize,
    pub with_job_listings: usize,
    pub companies_with_jobs: usize,
    pub total_jobs: usize,
    pub outcomes: OutcomeBreakdown,
    pub platforms: BTreeMap<String, usize>,
    /// Share of processed companies with at least one job, in percent.
    pub success_rate: f64,
    pub targets: Targets,
    pub jobs_target_met: bool,
    pub companies_target_met: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<EnrichSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrape: Option<ScrapeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl RunSummary {
    pub fn from_companies(companies: &[Company], targets: Targets) -> Self {
        let mut outcomes = OutcomeBreakdown::default();
        let mut platforms: BTreeMap<String, usize> = BTreeMap::new();
        for company in companies {
            match company.outcome() {
                Outcome::Unprocessed => outcomes.unprocessed += 1,
                Outcome::NoCareersPage => outcomes.no_careers_page += 1,
                Outcome::FetchFailed => outcomes.fetch_failed += 1,
                Outcome::InternalError => outcomes.internal_error += 1,
                Outcome::ScrapedNoJobs => outcomes.scraped_zero_jobs += 1,
                Outcome::ScrapedWithJobs => outcomes.scraped_with_jobs += 1,
            }
            if let Some(platform) = company.platform {
                *platforms.entry(platform.to_string()).or_default() += 1;
            }
        }

        let count = |pred: fn(&Company) -> bool| companies.iter().filter(|c| pred(c)).count();
        let total_jobs = companies.iter().map(|c| c.jobs.len()).sum();
        let companies_with_jobs = outcomes.scraped_with_jobs;
        let processed = companies.len() - outcomes.unprocessed;

        RunSummary {
            generated_at: Utc::now(),
            total_companies: companies.len(),
            processed,
            with_website: count(|c| c.website_url.is_some()),
            with_linkedin: count(|c| c.linkedin_url.is_some()),
            with_careers_page: count(|c| c.careers_url.is_some()),
            with_job_listings: count(|c| c.job_listings_url.is_some()),
            companies_with_jobs,
            total_jobs,
            outcomes,
            platforms,
            success_rate: percent(companies_with_jobs, processed),
            targets,
            jobs_target_met: total_jobs >= targets.jobs,
            companies_target_met: companies_with_jobs >= targets.companies,
            enrichment: None,
            scrape: None,
            validation: None,
        }
    }

    pub fn render(&self) -> String {
        let total = self.total_companies;
        let share = |n: usize| format!("{n} ({:.1}%)", percent(n, total));
        let status = |met: bool| if met { "TARGET ACHIEVED" } else { "TARGET NOT MET" };

        let mut out = String::new();
        let _ = writeln!(out, "FINAL REPORT");
        let _ = writeln!(out, "============");
        let _ = writeln!(out, "Generated: {}", self.generated_at.to_rfc3339());
        let _ = writeln!(out);
        let _ = writeln!(out, "Enrichment:");
        let _ = writeln!(out, "- Companies in roster: {total}");
        let _ = writeln!(out, "- With website: {}", share(self.with_website));
        let _ = writeln!(out, "- With LinkedIn: {}", share(self.with_linkedin));
        let _ = writeln!(out, "- With careers page: {}", share(self.with_careers_page));
        let _ = writeln!(out, "- With job listings page: {}", share(self.with_job_listings));
        let _ = writeln!(out);
        let _ = writeln!(out, "Scraping:");
        let _ = writeln!(out, "- Companies processed: {}", self.processed);
        let _ = writeln!(out, "- Scraped with jobs: {}", self.outcomes.scraped_with_jobs);
        let _ = writeln!(out, "- Scraped, zero jobs: {}", self.outcomes.scraped_zero_jobs);
        let _ = writeln!(out, "- No careers page: {}", self.outcomes.no_careers_page);
        let _ = writeln!(out, "- Fetch failed: {}", self.outcomes.fetch_failed);
        if self.outcomes.internal_error > 0 {
            let _ = writeln!(out, "- Internal errors: {}", self.outcomes.internal_error);
        }
        if self.outcomes.unprocessed > 0 {
            let _ = writeln!(out, "- Not yet processed: {}", self.outcomes.unprocessed);
        }
        if !self.platforms.is_empty() {
            let breakdown: Vec<String> = self
                .platforms
                .iter()
                .map(|(platform, n)| format!("{platform} {n}"))
                .collect();
            let _ = writeln!(out, "- Platforms: {}", breakdown.join(", "));
        }
        let _ = writeln!(out, "- Total job postings: {}", self.total_jobs);
        let _ = writeln!(out, "- Success rate: {:.1}%", self.success_rate);
        let _ = writeln!(out);
        let _ = writeln!(out, "Targets:");
        let _ = writeln!(
            out,
            "- {} job postings: {}",
            self.targets.jobs,
            status(self.jobs_target_met)
        );
        let _ = writeln!(
            out,
            "- {} companies with jobs: {}",
            self.targets.companies,
            status(self.companies_target_met)
        );

        if let Some(validation) = &self.validation {
            let _ = writeln!(out);
            let _ = writeln!(out, "Validation:");
            let _ = writeln!(out, "- URLs repaired: {}", validation.urls_repaired);
            let _ = writeln!(out, "- Consistency issues: {}", validation.issues.len());
            for (kind, counts) in &validation.reachability {
                let _ = writeln!(
                    out,
                    "- Reachable {kind} links: {}/{}",
                    counts.reachable, counts.checked
                );
            }
        }
        out
    }
}

/// Write the plain-text report and the JSON summary.
pub async fn write_report(
    summary: &RunSummary,
    report_path: &Path,
    summary_path: &Path,
) -> Result<(), AppError> {
    write_atomic(report_path, summary.render().as_bytes()).await?;
    let json = serde_json::to_vec_pretty(summary)?;
    write_atomic(summary_path, &json).await?;
    tracing::info!(
        "Report written to {} and {}",
        report_path.display(),
        summary_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchError;
    use crate::models::company::FailureReason;
    use crate::models::job::{JobRecord, Platform};
    use url::Url;

    const TARGETS: Targets = Targets {
        jobs: 3,
        companies: 2,
    };

    fn job(n: usize) -> JobRecord {
        let url = Url::parse(&format!("https://jobs.lever.co/acme/{n}")).expect("valid url");
        JobRecord::new(&url, format!("Role {n}"), None, Platform::Lever).expect("valid job")
    }

    fn sample() -> Vec<Company> {
        let mut with_jobs = Company::new(0, "Acme");
        with_jobs.website_url = Some("https://acme.org".into());
        with_jobs.careers_url = Some("https://jobs.lever.co/acme".into());
        with_jobs.platform = Some(Platform::Lever);
        with_jobs.mark_scraped(vec![job(1), job(2), job(3)], 3);

        let mut zero = Company::new(1, "Globex");
        zero.platform = Some(Platform::Generic);
        zero.mark_scraped(vec![], 3);

        let mut no_page = Company::new(2, "Initech");
        no_page.mark_failed(FailureReason::NoCareersPage);

        let mut fetch_failed = Company::new(3, "Umbrella");
        fetch_failed.mark_failed(FailureReason::from(&FetchError::Status(503)));

        vec![with_jobs, zero, no_page, fetch_failed, Company::new(4, "Pending Co")]
    }

    #[test]
    fn totals_distinguish_every_outcome() {
        let summary = RunSummary::from_companies(&sample(), TARGETS);

        assert_eq!(summary.total_companies, 5);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.total_jobs, 3);
        assert_eq!(summary.companies_with_jobs, 1);
        assert_eq!(
            summary.outcomes,
            OutcomeBreakdown {
                no_careers_page: 1,
                fetch_failed: 1,
                internal_error: 0,
                scraped_zero_jobs: 1,
                scraped_with_jobs: 1,
                unprocessed: 1,
            }
        );
        assert_eq!(summary.success_rate, 25.0);
        assert!(summary.jobs_target_met);
        assert!(!summary.companies_target_met);
        assert_eq!(summary.platforms.get("lever"), Some(&1));
        assert_eq!(summary.with_website, 1);
    }

    #[test]
    fn empty_roster_has_zero_success_rate() {
        let summary = RunSummary::from_companies(&[], TARGETS);
        assert_eq!(summary.success_rate, 0.0);
        assert!(!summary.jobs_target_met);
    }

    #[test]
    fn rendered_report_lists_outcomes_and_targets() {
        let text = RunSummary::from_companies(&sample(), TARGETS).render();

        assert!(text.contains("- With website: 1 (20.0%)"));
        assert!(text.contains("- Scraped, zero jobs: 1"));
        assert!(text.contains("- No careers page: 1"));
        assert!(text.contains("- Fetch failed: 1"));
        assert!(text.contains("- Success rate: 25.0%"));
        assert!(text.contains("- 3 job postings: TARGET ACHIEVED"));
        assert!(text.contains("- 2 companies with jobs: TARGET NOT MET"));
        assert!(text.contains("- Platforms: generic 1, lever 1"));
    }

    #[tokio::test]
    async fn writes_text_and_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let report = dir.path().join("final_report.txt");
        let json = dir.path().join("summary.json");
        let mut summary = RunSummary::from_companies(&sample(), TARGETS);
        summary.validation = Some(ValidationReport::default());

        write_report(&summary, &report, &json)
            .await
            .expect("report written");

        let text = std::fs::read_to_string(&report).expect("report exists");
        assert!(text.starts_with("FINAL REPORT"));
        assert!(text.contains("Validation:"));
        let parsed: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&json).expect("summary exists"))
                .expect("summary is json");
        assert_eq!(parsed["total_jobs"], 3);
        assert_eq!(parsed["outcomes"]["fetch_failed"], 1);
        assert!(parsed.get("scrape").is_none());
    }
}
