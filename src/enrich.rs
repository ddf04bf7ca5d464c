//! Web-presence discovery: company website, LinkedIn profile and careers page.
//!
//! Everything here is best effort. A probe that fails or looks wrong simply
//! leaves the field empty; nothing is recorded as a company failure.

use std::sync::{Arc, LazyLock};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::collectors::classify;
use crate::error::AppError;
use crate::fetch::{Fetcher, Page};
use crate::models::company::{Company, CompanyStatus};
use crate::models::job::Platform;
use crate::storage::RosterStore;

/// LinkedIn vanity slugs keep hyphens and underscores; everything else
/// outside ASCII alphanumerics is escaped.
const SLUG_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

const CAREERS_PATHS: &[&str] = &[
    "/careers",
    "/jobs",
    "/work-with-us",
    "/join-us",
    "/career",
    "/employment",
    "/opportunities",
    "/openings",
    "/vacancies",
    "/positions",
    "/current-openings",
    "/job-openings",
    "/join-our-team",
];

const CAREERS_KEYWORDS: &[&str] = &[
    "career",
    "job",
    "employment",
    "hiring",
    "opening",
    "vacanc",
    "position",
    "join our team",
    "work with us",
    "open positions",
];

const NAV_LINK_TOKENS: &[&str] = &["career", "job", "join", "hiring", "employment", "vacanc", "opening"];

/// Homepage links followed before falling back to well-known paths.
const MAX_NAV_LINKS: usize = 5;

static JOB_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)job|career|position|opening|vacanc").expect("valid regex")
});

/// What one enrichment pass newly filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Discovered {
    pub website: bool,
    pub linkedin: bool,
    pub careers: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub considered: usize,
    pub websites_found: usize,
    pub linkedin_found: usize,
    pub careers_found: usize,
}

impl EnrichSummary {
    fn record(&mut self, found: Discovered) {
        self.considered += 1;
        self.websites_found += usize::from(found.website);
        self.linkedin_found += usize::from(found.linkedin);
        self.careers_found += usize::from(found.careers);
    }
}

pub struct Enricher {
    fetcher: Arc<Fetcher>,
}

impl Enricher {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Enrich every Pending company, persisting the roster after each batch.
    pub async fn enrich_roster(
        &self,
        companies: &mut [Company],
        roster: &dyn RosterStore,
        batch_size: usize,
    ) -> Result<EnrichSummary, AppError> {
        let pending: Vec<usize> = companies
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status == CompanyStatus::Pending)
            .map(|(pos, _)| pos)
            .collect();
        tracing::info!("Enriching {} pending companies", pending.len());

        let mut summary = EnrichSummary::default();
        for chunk in pending.chunks(batch_size.max(1)) {
            for &pos in chunk {
                let found = self.enrich(&mut companies[pos]).await;
                summary.record(found);
            }
            roster.save(companies).await?;
            tracing::info!(
                "Enriched {}/{}: {} websites, {} LinkedIn profiles, {} careers pages found so far",
                summary.considered,
                pending.len(),
                summary.websites_found,
                summary.linkedin_found,
                summary.careers_found
            );
        }
        Ok(summary)
    }

    /// Fill whichever of website, LinkedIn and careers page are missing.
    pub async fn enrich(&self, company: &mut Company) -> Discovered {
        let mut found = Discovered::default();

        if company.website_url.is_none() {
            company.website_url = self.discover_website(&company.name).await;
            found.website = company.website_url.is_some();
        }
        if company.linkedin_url.is_none() {
            company.linkedin_url = self.discover_linkedin(&company.name).await;
            found.linkedin = company.linkedin_url.is_some();
        }
        if company.careers_url.is_none() {
            if let Some(website) = company.website_url.clone() {
                company.careers_url = self.discover_careers(&website).await;
                found.careers = company.careers_url.is_some();
            }
        }

        tracing::debug!(
            "#{} {}: website {}, linkedin {}, careers {}",
            company.index,
            company.name,
            company.website_url.as_deref().unwrap_or("-"),
            company.linkedin_url.as_deref().unwrap_or("-"),
            company.careers_url.as_deref().unwrap_or("-"),
        );
        company.mark_enriched();
        found
    }

    pub async fn discover_website(&self, name: &str) -> Option<String> {
        for candidate in website_candidates(name) {
            let Some(page) = self.probe(&candidate).await else {
                continue;
            };
            if mentions_company(&page.body, name) {
                tracing::info!("Found website for {name}: {candidate}");
                return Some(candidate);
            }
            tracing::debug!("{candidate} does not look like {name}'s site");
        }
        None
    }

    pub async fn discover_linkedin(&self, name: &str) -> Option<String> {
        for candidate in linkedin_candidates(name) {
            if self.probe(&candidate).await.is_some() {
                tracing::info!("Found LinkedIn for {name}: {candidate}");
                return Some(candidate);
            }
        }
        None
    }

    /// Look for a careers link on the homepage first, then try well-known paths.
    pub async fn discover_careers(&self, website: &str) -> Option<String> {
        let Ok(base) = Url::parse(website) else {
            return None;
        };

        if let Some(home) = self.probe(base.as_str()).await {
            for link in careers_links(&home.body, &home.url) {
                if classify(link.as_str(), None) != Platform::Generic {
                    tracing::info!("Found hosted job board via navigation: {link}");
                    return Some(link.to_string());
                }
                if let Some(page) = self.probe(link.as_str()).await {
                    if is_careers_page(&page.body) {
                        tracing::info!("Found careers page via navigation: {link}");
                        return Some(link.to_string());
                    }
                }
            }
        }

        for path in CAREERS_PATHS {
            let Ok(candidate) = base.join(path) else {
                continue;
            };
            if let Some(page) = self.probe(candidate.as_str()).await {
                if is_careers_page(&page.body) {
                    tracing::info!("Found careers page: {candidate}");
                    return Some(candidate.to_string());
                }
            }
        }
        None
    }

    /// Single-attempt GET; any failure is just "not found".
    async fn probe(&self, url: &str) -> Option<Page> {
        let timeout = self.fetcher.settings().timeout;
        match self.fetcher.fetch(url, timeout, 1).await {
            Ok(page) => Some(page),
            Err(e) => {
                tracing::trace!("Probe {url} failed: {e}");
                None
            }
        }
    }
}

/// Lowercased name words with punctuation removed.
fn name_words(name: &str) -> Vec<String> {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .map(String::from)
        .collect()
}

fn website_candidates(name: &str) -> Vec<String> {
    let words = name_words(name);
    let ascii: Vec<String> = words
        .iter()
        .map(|w| w.chars().filter(char::is_ascii_alphanumeric).collect::<String>())
        .filter(|w| !w.is_empty())
        .collect();
    if ascii.is_empty() {
        return Vec::new();
    }

    let compact = ascii.concat();
    let hyphenated = ascii.join("-");
    let mut candidates = vec![
        format!("https://{compact}.com"),
        format!("https://{compact}.org"),
        format!("https://www.{compact}.com"),
        format!("https://www.{compact}.org"),
    ];
    if hyphenated != compact {
        candidates.push(format!("https://{hyphenated}.com"));
        candidates.push(format!("https://{hyphenated}.org"));
    }
    candidates
}

fn linkedin_slug(words: &[String], separator: &str) -> String {
    utf8_percent_encode(&words.join(separator), SLUG_SET).to_string()
}

fn linkedin_candidates(name: &str) -> Vec<String> {
    let words = name_words(name);
    if words.is_empty() {
        return Vec::new();
    }
    let mut slugs = vec![linkedin_slug(&words, "-")];
    if words.len() > 1 {
        slugs.push(linkedin_slug(&words, ""));
    }
    slugs
        .into_iter()
        .map(|slug| format!("https://www.linkedin.com/company/{slug}"))
        .collect()
}

/// At least half of the name's words appear in the page text.
fn mentions_company(html: &str, name: &str) -> bool {
    let words = name_words(name);
    if words.is_empty() {
        return false;
    }
    let document = Html::parse_document(html);
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let matches = words.iter().filter(|w| text.contains(w.as_str())).count();
    matches * 2 >= words.len()
}

/// Same-site or absolute links whose text or href suggests a careers page.
fn careers_links(html: &str, base: &Url) -> Vec<Url> {
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let mut links: Vec<Url> = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let text = anchor.text().collect::<String>().to_lowercase();
        let href_lower = href.to_lowercase();
        if !NAV_LINK_TOKENS
            .iter()
            .any(|t| text.contains(t) || href_lower.contains(t))
        {
            continue;
        }
        let Ok(mut url) = base.join(href.trim()) else {
            continue;
        };
        url.set_fragment(None);
        if matches!(url.scheme(), "http" | "https") && url != *base && !links.contains(&url) {
            links.push(url);
        }
        if links.len() == MAX_NAV_LINKS {
            break;
        }
    }
    links
}

/// Two careers keywords, or any element or link that looks job-related.
fn is_careers_page(html: &str) -> bool {
    let lower = html.to_lowercase();
    let keywords = CAREERS_KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    if keywords >= 2 {
        return true;
    }

    let document = Html::parse_document(html);
    let containers = Selector::parse("div[class], li[class], article[class]").ok();
    let anchors = Selector::parse("a[href]").ok();
    let job_container = containers.is_some_and(|sel| {
        document
            .select(&sel)
            .filter_map(|el| el.value().attr("class"))
            .any(|class| JOB_MARKER.is_match(class))
    });
    let job_link = anchors.is_some_and(|sel| {
        document
            .select(&sel)
            .filter_map(|el| el.value().attr("href"))
            .any(|href| JOB_MARKER.is_match(href))
    });
    job_container || job_link
}
