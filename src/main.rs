mod collectors;
mod config;
mod enrich;
mod error;
mod fetch;
mod models;
mod report;
mod storage;
#[cfg(test)]
mod test_support;
mod validate;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use crate::collectors::pipeline::{CompanyPipeline, PipelineSettings};
use crate::collectors::runner::BatchRunner;
use crate::config::{Command, Config};
use crate::enrich::Enricher;
use crate::error::AppError;
use crate::fetch::{Fetcher, RateLimiter, ReqwestTransport, SystemClock};
use crate::models::company::Company;
use crate::report::{RunSummary, Targets};
use crate::storage::{JsonCheckpointStore, JsonRosterStore, RosterStore};
use crate::validate::Validator;

/// Console output (plain or JSON) plus a plain-text copy in the log file.
fn init_tracing(config: &Config) -> anyhow::Result<()> {
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)
        .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;

    let console = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("careerscout=info")),
        )
        .with(console)
        .with(file)
        .init();
    Ok(())
}

fn build_fetcher(config: &Config) -> Result<Fetcher, AppError> {
    let settings = config.fetch_settings();
    let transport = Arc::new(ReqwestTransport::new()?);
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(SystemClock),
        settings.min_host_interval,
    ));
    Ok(Fetcher::new(transport, limiter, settings))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;
    init_tracing(&config)?;

    let command = config.resolved_command();
    let output = config.output_path();
    let roster = Arc::new(JsonRosterStore::new(&config.input, &output).resuming());
    tracing::info!(
        "Starting {command:?}: roster {}, dataset {}",
        roster.source().display(),
        roster.sink().display()
    );

    let mut companies = roster.load().await?;
    if companies.is_empty() {
        tracing::warn!("Roster is empty, nothing to do");
    }
    let fetcher = Arc::new(build_fetcher(&config)?);
    let (mut enrichment, mut scrape, mut validation) = (None, None, None);

    if matches!(command, Command::Run | Command::Enrich) && !config.skip_enrichment {
        let enricher = Enricher::new(Arc::clone(&fetcher));
        enrichment = Some(
            enricher
                .enrich_roster(&mut companies, &*roster, config.batch_size)
                .await?,
        );
    }

    if matches!(command, Command::Run | Command::Scrape) {
        let pipeline = CompanyPipeline::new(
            Arc::clone(&fetcher),
            PipelineSettings {
                job_cap: config.job_cap,
                probe_alternate_paths: config.probe_alternate_paths,
            },
        );
        let runner = BatchRunner::new(
            Arc::new(pipeline),
            roster.clone(),
            Arc::new(JsonCheckpointStore::new(&config.checkpoint)),
            config.batch_size,
        );
        let scraped = runner.run(&mut companies).await?;
        tracing::info!(
            "Scraping finished: {} processed this session, {} succeeded, {} failed, {} jobs found",
            scraped.session.processed,
            scraped.session.succeeded,
            scraped.session.failed,
            scraped.session.jobs_found
        );
        scrape = Some(scraped);
    }

    if matches!(command, Command::Run | Command::Validate) && !config.skip_validation {
        let link_checker = (!config.skip_link_check).then(|| Arc::clone(&fetcher));
        let checked = Validator::new(link_checker, config.job_cap)
            .validate(&mut companies)
            .await;
        if !checked.is_clean() {
            tracing::warn!(
                "Dataset has {} consistency issue(s), see the log for details",
                checked.issues.len()
            );
        }
        roster.save(&companies).await?;
        validation = Some(checked);
    }

    if matches!(command, Command::Run | Command::Report) {
        let mut summary = summary_for(&companies, &config);
        summary.enrichment = enrichment;
        summary.scrape = scrape;
        summary.validation = validation;
        report::write_report(&summary, &config.report, &config.summary).await?;
        tracing::info!(
            "{} jobs from {} companies, success rate {:.1}%",
            summary.total_jobs,
            summary.companies_with_jobs,
            summary.success_rate
        );
    }

    Ok(())
}

fn summary_for(companies: &[Company], config: &Config) -> RunSummary {
    RunSummary::from_companies(
        companies,
        Targets {
            jobs: config.target_jobs,
            companies: config.target_companies,
        },
    )
}
