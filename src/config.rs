use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::AppError;
use crate::fetch::FetchSettings;
use crate::models::company::MAX_JOBS_PER_COMPANY;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "careerscout",
    about = "Enrich a company roster and harvest job postings from careers pages"
)]
pub struct Config {
    /// Roster file (JSON array of company rows)
    #[arg(long, env = "CAREERSCOUT_INPUT")]
    pub input: PathBuf,

    /// Enriched dataset path (defaults to <input>.enriched.json)
    #[arg(long, env = "CAREERSCOUT_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Batch checkpoint file used to resume interrupted runs
    #[arg(long, env = "CAREERSCOUT_CHECKPOINT", default_value = "careerscout.checkpoint.json")]
    pub checkpoint: PathBuf,

    /// Human-readable final report
    #[arg(long, env = "CAREERSCOUT_REPORT", default_value = "final_report.txt")]
    pub report: PathBuf,

    /// Machine-readable run summary
    #[arg(long, env = "CAREERSCOUT_SUMMARY", default_value = "summary.json")]
    pub summary: PathBuf,

    /// Per-company outcome log
    #[arg(long, env = "CAREERSCOUT_LOG_FILE", default_value = "careerscout.log")]
    pub log_file: PathBuf,

    /// Emit console logs as JSON
    #[arg(long, env = "CAREERSCOUT_LOG_JSON")]
    pub log_json: bool,

    /// Companies processed between checkpoints
    #[arg(long, env = "CAREERSCOUT_BATCH_SIZE", default_value = "15")]
    pub batch_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, env = "CAREERSCOUT_REQUEST_TIMEOUT_SECS", default_value = "10")]
    pub timeout_secs: u64,

    /// Maximum attempts per request, the first one included
    #[arg(long, env = "CAREERSCOUT_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Base delay between attempts in milliseconds (doubles each retry)
    #[arg(long, env = "CAREERSCOUT_RETRY_DELAY_MS", default_value = "500")]
    pub retry_delay_ms: u64,

    /// Minimum delay between two requests to the same host, in milliseconds
    #[arg(long, env = "CAREERSCOUT_REQUEST_DELAY_MS", default_value = "2000")]
    pub request_delay_ms: u64,

    /// Maximum job postings kept per company
    #[arg(long, env = "CAREERSCOUT_JOB_CAP", default_value = "3")]
    pub job_cap: usize,

    /// Total job postings the report measures against
    #[arg(long, env = "CAREERSCOUT_TARGET_JOBS", default_value = "200")]
    pub target_jobs: usize,

    /// Companies with postings the report measures against
    #[arg(long, env = "CAREERSCOUT_TARGET_COMPANIES", default_value = "150")]
    pub target_companies: usize,

    /// Try common sibling paths when a careers page yields no jobs
    #[arg(long, env = "CAREERSCOUT_PROBE_ALTERNATE_PATHS")]
    pub probe_alternate_paths: bool,

    /// Skip website/LinkedIn/careers discovery in `run`
    #[arg(long, env = "CAREERSCOUT_SKIP_ENRICHMENT")]
    pub skip_enrichment: bool,

    /// Skip the validation pass in `run`
    #[arg(long, env = "CAREERSCOUT_SKIP_VALIDATION")]
    pub skip_validation: bool,

    /// Validate record consistency only, without network reachability checks
    #[arg(long, env = "CAREERSCOUT_SKIP_LINK_CHECK")]
    pub skip_link_check: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Enrich, scrape, validate and report (default when no subcommand given)
    Run,
    /// Discover websites, LinkedIn profiles and careers pages
    Enrich,
    /// Harvest job postings from careers pages
    Scrape,
    /// Repair and verify the persisted dataset
    Validate,
    /// Rebuild the summary report from the persisted dataset
    Report,
}

impl Config {
    /// Resolve the command, defaulting to Run if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.unwrap_or(Command::Run)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.batch_size == 0 {
            return Err(AppError::InvalidConfig("batch size must be at least 1".into()));
        }
        if self.job_cap == 0 || self.job_cap > MAX_JOBS_PER_COMPANY {
            return Err(AppError::InvalidConfig(format!(
                "job cap must be between 1 and {MAX_JOBS_PER_COMPANY}"
            )));
        }
        if self.max_retries == 0 {
            return Err(AppError::InvalidConfig(
                "max retries must allow at least one attempt".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(AppError::InvalidConfig("timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input.with_extension("enriched.json"))
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            min_host_interval: Duration::from_millis(self.request_delay_ms),
        }
    }
}
