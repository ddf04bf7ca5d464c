//! Persistence for the company roster and the batch checkpoint.
//!
//! The roster is a JSON array of flat rows, one per company, with up to three
//! `job{n}_*` column groups. Files are replaced atomically (write to a
//! sibling temp file, then rename) so an interrupted run never leaves a
//! half-written dataset or checkpoint behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::AppError;
use crate::models::checkpoint::BatchCheckpoint;
use crate::models::company::{Company, CompanyStatus, FailureReason, MAX_JOBS_PER_COMPANY};
use crate::models::job::{JobRecord, Platform};

/// Tabular source and sink for the company collection.
#[async_trait]
pub trait RosterStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Company>, AppError>;
    async fn save(&self, companies: &[Company]) -> Result<(), AppError>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// `None` when no checkpoint has been written yet.
    async fn load(&self) -> Result<Option<BatchCheckpoint>, AppError>;
    async fn save(&self, checkpoint: &BatchCheckpoint) -> Result<(), AppError>;
}

/// One company as a spreadsheet-style row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    #[serde(alias = "company", alias = "Company Name", alias = "companyName")]
    pub name: String,
    #[serde(
        default,
        alias = "website",
        alias = "websiteUrl",
        alias = "Website URL",
        skip_serializing_if = "Option::is_none"
    )]
    pub website_url: Option<String>,
    #[serde(
        default,
        alias = "linkedin",
        alias = "linkedinUrl",
        alias = "Linkedin URL",
        alias = "LinkedIn URL",
        skip_serializing_if = "Option::is_none"
    )]
    pub linkedin_url: Option<String>,
    #[serde(
        default,
        alias = "careers",
        alias = "careersUrl",
        alias = "Careers Page URL",
        skip_serializing_if = "Option::is_none"
    )]
    pub careers_url: Option<String>,
    #[serde(
        default,
        alias = "jobListingsUrl",
        alias = "Job listings page URL",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_listings_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CompanyStatus>,
    #[serde(
        default,
        rename = "failure_reason",
        alias = "failureReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub failure: Option<FailureReason>,

    #[serde(default, alias = "job1Url", alias = "job post1 URL", skip_serializing_if = "Option::is_none")]
    pub job1_url: Option<String>,
    #[serde(default, alias = "job1Title", alias = "job post1 title", skip_serializing_if = "Option::is_none")]
    pub job1_title: Option<String>,
    #[serde(default, alias = "job1Location", skip_serializing_if = "Option::is_none")]
    pub job1_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job1_platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job1_extracted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "job2Url", alias = "job post2 URL", skip_serializing_if = "Option::is_none")]
    pub job2_url: Option<String>,
    #[serde(default, alias = "job2Title", alias = "job post2 title", skip_serializing_if = "Option::is_none")]
    pub job2_title: Option<String>,
    #[serde(default, alias = "job2Location", skip_serializing_if = "Option::is_none")]
    pub job2_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job2_platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job2_extracted_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "job3Url", alias = "job post3 URL", skip_serializing_if = "Option::is_none")]
    pub job3_url: Option<String>,
    #[serde(default, alias = "job3Title", alias = "job post3 title", skip_serializing_if = "Option::is_none")]
    pub job3_title: Option<String>,
    #[serde(default, alias = "job3Location", skip_serializing_if = "Option::is_none")]
    pub job3_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job3_platform: Option<Platform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job3_extracted_at: Option<DateTime<Utc>>,

    /// Latest harvest time on the row. Job groups without their own
    /// timestamp fall back to it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_at: Option<DateTime<Utc>>,
}

/// Borrowed view of one `job{n}_*` column group.
struct JobColumns<'a> {
    url: &'a mut Option<String>,
    title: &'a mut Option<String>,
    location: &'a mut Option<String>,
    platform: &'a mut Option<Platform>,
    extracted_at: &'a mut Option<DateTime<Utc>>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RosterRow {
    pub fn from_company(company: &Company) -> Self {
        let mut row = RosterRow {
            name: company.name.clone(),
            website_url: company.website_url.clone(),
            linkedin_url: company.linkedin_url.clone(),
            careers_url: company.careers_url.clone(),
            job_listings_url: company.job_listings_url.clone(),
            platform: company.platform,
            status: Some(company.status),
            failure: company.failure.clone(),
            extracted_at: company.jobs.iter().map(|j| j.extracted_at).max(),
            ..Default::default()
        };

        for (columns, job) in row.job_columns().into_iter().zip(&company.jobs) {
            *columns.url = Some(job.url.clone());
            *columns.title = Some(job.title.clone());
            *columns.location = job.location.clone();
            *columns.platform = Some(job.platform);
            *columns.extracted_at = Some(job.extracted_at);
        }
        row
    }

    fn job_columns(&mut self) -> [JobColumns<'_>; MAX_JOBS_PER_COMPANY] {
        [
            JobColumns {
                url: &mut self.job1_url,
                title: &mut self.job1_title,
                location: &mut self.job1_location,
                platform: &mut self.job1_platform,
                extracted_at: &mut self.job1_extracted_at,
            },
            JobColumns {
                url: &mut self.job2_url,
                title: &mut self.job2_title,
                location: &mut self.job2_location,
                platform: &mut self.job2_platform,
                extracted_at: &mut self.job2_extracted_at,
            },
            JobColumns {
                url: &mut self.job3_url,
                title: &mut self.job3_title,
                location: &mut self.job3_location,
                platform: &mut self.job3_platform,
                extracted_at: &mut self.job3_extracted_at,
            },
        ]
    }

    /// Rebuild the company at roster position `index`. Job columns that do
    /// not form a valid posting are dropped.
    pub fn into_company(mut self, index: usize) -> Company {
        let mut company = Company::new(index, self.name.trim());
        company.website_url = blank_to_none(self.website_url.take());
        company.linkedin_url = blank_to_none(self.linkedin_url.take());
        company.careers_url = blank_to_none(self.careers_url.take());
        company.job_listings_url = blank_to_none(self.job_listings_url.take());
        company.platform = self.platform;
        company.status = self.status.unwrap_or(CompanyStatus::Pending);
        company.failure = self.failure.take();

        let row_platform = self.platform.unwrap_or(Platform::Generic);
        let row_extracted_at = self.extracted_at.unwrap_or_else(Utc::now);
        for columns in self.job_columns() {
            let (Some(url), Some(title)) =
                (blank_to_none(columns.url.take()), blank_to_none(columns.title.take()))
            else {
                continue;
            };
            let Ok(url) = Url::parse(&url) else {
                tracing::warn!("Dropping unparseable job URL {url:?} for {}", company.name);
                continue;
            };
            let platform = columns.platform.unwrap_or(row_platform);
            let location = blank_to_none(columns.location.take());
            if let Some(mut job) = JobRecord::new(&url, title, location, platform) {
                job.extracted_at = columns.extracted_at.unwrap_or(row_extracted_at);
                company.jobs.push(job);
            }
        }
        company
    }
}

/// Write `bytes` to `path` via a temp file in the same directory.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::write(parent, e))?;
    }
    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| AppError::write(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| AppError::write(path, e))
}

/// Roster read from one file and written to another (they may be the same).
pub struct JsonRosterStore {
    source: PathBuf,
    sink: PathBuf,
}

impl JsonRosterStore {
    pub fn new(source: impl Into<PathBuf>, sink: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            sink: sink.into(),
        }
    }

    /// Resume from the sink when an earlier run already wrote it.
    pub fn resuming(self) -> Self {
        if self.sink.exists() {
            Self {
                source: self.sink.clone(),
                sink: self.sink,
            }
        } else {
            self
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn sink(&self) -> &Path {
        &self.sink
    }
}

#[async_trait]
impl RosterStore for JsonRosterStore {
    async fn load(&self) -> Result<Vec<Company>, AppError> {
        let raw = tokio::fs::read_to_string(&self.source)
            .await
            .map_err(|e| AppError::read(&self.source, e))?;
        let rows: Vec<RosterRow> =
            serde_json::from_str(&raw).map_err(|e| AppError::parse(&self.source, e))?;

        let companies: Vec<Company> = rows
            .into_iter()
            .enumerate()
            .map(|(index, row)| row.into_company(index))
            .collect();
        tracing::info!(
            "Loaded {} companies from {}",
            companies.len(),
            self.source.display()
        );
        Ok(companies)
    }

    async fn save(&self, companies: &[Company]) -> Result<(), AppError> {
        let rows: Vec<RosterRow> = companies.iter().map(RosterRow::from_company).collect();
        let json = serde_json::to_vec_pretty(&rows)?;
        write_atomic(&self.sink, &json).await?;
        tracing::debug!("Saved {} companies to {}", rows.len(), self.sink.display());
        Ok(())
    }
}

pub struct JsonCheckpointStore {
    path: PathBuf,
}

impl JsonCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CheckpointStore for JsonCheckpointStore {
    async fn load(&self) -> Result<Option<BatchCheckpoint>, AppError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AppError::read(&self.path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| AppError::parse(&self.path, e))
    }

    async fn save(&self, checkpoint: &BatchCheckpoint) -> Result<(), AppError> {
        let json = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&self.path, &json).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FailureClass;

    fn job(url: &str, title: &str, location: Option<&str>) -> JobRecord {
        tagged(url, title, location, Platform::Lever)
    }

    fn tagged(url: &str, title: &str, location: Option<&str>, platform: Platform) -> JobRecord {
        let url = Url::parse(url).expect("valid url");
        JobRecord::new(&url, title, location.map(String::from), platform).expect("valid job")
    }

    #[tokio::test]
    async fn reads_minimal_camel_case_roster() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("roster.json");
        std::fs::write(
            &input,
            r#"[
                {"name": "Acme", "website": "https://acme.org", "careersUrl": "https://jobs.lever.co/acme"},
                {"name": " Globex ", "linkedin": "", "careersUrl": null}
            ]"#,
        )
        .expect("write roster");

        let companies = JsonRosterStore::new(&input, dir.path().join("out.json"))
            .load()
            .await
            .expect("roster loads");

        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].index, 0);
        assert_eq!(companies[0].website_url.as_deref(), Some("https://acme.org"));
        assert_eq!(
            companies[0].careers_url.as_deref(),
            Some("https://jobs.lever.co/acme")
        );
        assert_eq!(companies[0].status, CompanyStatus::Pending);
        assert_eq!(companies[1].index, 1);
        assert_eq!(companies[1].name, "Globex");
        assert_eq!(companies[1].linkedin_url, None);
    }

    #[tokio::test]
    async fn saved_dataset_reloads_with_jobs_and_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("dataset.json");
        let store = JsonRosterStore::new(&path, &path);

        let mut scraped = Company::new(0, "Acme");
        scraped.platform = Some(Platform::Lever);
        scraped.mark_scraped(
            vec![
                job("https://jobs.lever.co/acme/1", "Analyst", Some("Berlin")),
                job("https://jobs.lever.co/acme/2", "Engineer", None),
            ],
            3,
        );
        let mut failed = Company::new(1, "Globex");
        failed.mark_failed(FailureReason::FetchFailed {
            class: FailureClass::TransientNetwork,
            detail: "HTTP 503".into(),
        });
        let mut fallback = Company::new(2, "Initech");
        fallback.platform = Some(Platform::Greenhouse);
        let mut older = tagged("https://initech.com/jobs/7", "Planner", None, Platform::Generic);
        older.extracted_at -= chrono::Duration::days(2);
        fallback.mark_scraped(vec![older.clone()], 3);

        store
            .save(&[scraped.clone(), failed.clone(), fallback.clone()])
            .await
            .expect("dataset saves");
        let raw = std::fs::read_to_string(&path).expect("dataset written");
        assert!(raw.contains("\"job1_title\": \"Analyst\""));
        assert!(raw.contains("\"job2_url\": \"https://jobs.lever.co/acme/2\""));
        assert!(!raw.contains("job3_url"));

        let reloaded = store.load().await.expect("dataset reloads");
        assert_eq!(reloaded[0].status, CompanyStatus::Scraped);
        assert_eq!(reloaded[0].jobs.len(), 2);
        assert_eq!(reloaded[0].jobs[0].location.as_deref(), Some("Berlin"));
        assert_eq!(reloaded[0].jobs[1].platform, Platform::Lever);
        assert_eq!(reloaded[1].failure, failed.failure);
        assert!(reloaded[1].jobs.is_empty());
        assert_eq!(reloaded[2].platform, Some(Platform::Greenhouse));
        assert_eq!(reloaded[2].jobs[0].platform, Platform::Generic);
        assert_eq!(reloaded[2].jobs[0].extracted_at, older.extracted_at);
    }

    #[tokio::test]
    async fn reads_spreadsheet_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("roster.json");
        std::fs::write(
            &input,
            r#"[{
                "Company Name": "Acme",
                "Website URL": "https://acme.org",
                "Linkedin URL": "https://www.linkedin.com/company/acme",
                "Careers Page URL": "https://acme.org/careers",
                "Job listings page URL": "https://acme.org/careers/open",
                "job post1 URL": "https://acme.org/careers/1",
                "job post1 title": "Analyst",
                "platform": "generic"
            }]"#,
        )
        .expect("write roster");

        let companies = JsonRosterStore::new(&input, dir.path().join("out.json"))
            .load()
            .await
            .expect("roster loads");

        let acme = &companies[0];
        assert_eq!(acme.website_url.as_deref(), Some("https://acme.org"));
        assert_eq!(
            acme.linkedin_url.as_deref(),
            Some("https://www.linkedin.com/company/acme")
        );
        assert_eq!(acme.careers_url.as_deref(), Some("https://acme.org/careers"));
        assert_eq!(
            acme.job_listings_url.as_deref(),
            Some("https://acme.org/careers/open")
        );
        assert_eq!(acme.jobs.len(), 1);
        assert_eq!(acme.jobs[0].title, "Analyst");
    }

    #[tokio::test]
    async fn unreadable_or_malformed_roster_is_a_setup_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = JsonRosterStore::new(dir.path().join("missing.json"), dir.path().join("o.json"));
        assert!(matches!(missing.load().await, Err(AppError::Read { .. })));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").expect("write");
        let malformed = JsonRosterStore::new(&bad, dir.path().join("o.json"));
        assert!(matches!(malformed.load().await, Err(AppError::Parse { .. })));
    }

    #[tokio::test]
    async fn resuming_prefers_an_existing_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");

        let fresh = JsonRosterStore::new(&input, &output).resuming();
        assert_eq!(fresh.source(), input.as_path());

        std::fs::write(&output, "[]").expect("write");
        let resumed = JsonRosterStore::new(&input, &output).resuming();
        assert_eq!(resumed.source(), output.as_path());
        assert_eq!(resumed.sink(), output.as_path());
    }

    #[tokio::test]
    async fn checkpoint_round_trips_and_absent_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonCheckpointStore::new(dir.path().join("checkpoint.json"));
        assert!(store.load().await.expect("load").is_none());

        let checkpoint = BatchCheckpoint::new("abc123".into());
        store.save(&checkpoint).await.expect("save");
        let loaded = store.load().await.expect("load").expect("present");
        assert_eq!(loaded, checkpoint);
        assert!(!dir.path().join("checkpoint.json.tmp").exists());
    }
}
