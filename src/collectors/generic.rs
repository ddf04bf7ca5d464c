//! Heuristic extraction for self-hosted careers pages.
//!
//! First looks for repeated job-like containers (class names mentioning
//! job/career/position/opening); when none produce a posting, falls back to
//! scanning every anchor whose text or path carries a job-indicative token.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use crate::collectors::listing::{
    JobSink, clean_title, element_text, first_text, resolve_link, selector,
};
use crate::models::job::{JobRecord, Platform};

const CONTAINER_SELECTORS: &[&str] = &[
    "div.job",
    "div.job-listing",
    "div.job-card",
    "div.job-item",
    "div.job-post",
    "div.job-opening",
    "div.career-item",
    "div.position",
    "div.opportunity",
    "li.job",
    "li.job-listing",
    "li.career-item",
    "li.position",
    "article.job",
    "article.job-listing",
    "article.career-item",
    "div[class*=\"job\"]",
    "li[class*=\"job\"]",
    "tr[class*=\"job\"]",
    "div[class*=\"career\"]",
    "li[class*=\"career\"]",
    "div[class*=\"position\"]",
    "li[class*=\"position\"]",
    "div[class*=\"opening\"]",
    "li[class*=\"opening\"]",
    "div[class*=\"vacanc\"]",
    "li[class*=\"vacanc\"]",
];

const TITLE_SELECTORS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "[class*=\"title\"]"];
const LOCATION_SELECTORS: &[&str] = &["[class*=\"location\"]"];

const TEXT_TOKENS: &[&str] = &[
    "job", "career", "position", "opening", "vacanc", "role", "apply", "hiring",
];
const PATH_TOKENS: &[&str] = &["job", "career", "position", "opening", "vacanc", "role"];

/// Link labels that point at listings or actions rather than one posting.
const NAVIGATION_LABELS: &[&str] = &[
    "careers",
    "career",
    "jobs",
    "job",
    "apply",
    "apply now",
    "apply here",
    "join us",
    "open positions",
    "open roles",
    "positions",
    "openings",
    "current openings",
    "job openings",
    "all jobs",
    "view all jobs",
    "see all jobs",
    "see open roles",
    "work with us",
];

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^location\s*:?\s*(.+)$",
        r"(?i)\b(remote|hybrid|on-site|onsite)\b",
        r"\b([A-Z][A-Za-z.]+(?: [A-Z][A-Za-z.]+)*, ?[A-Z]{2})\b",
        r"\b([A-Z][a-z]+(?: [A-Z][a-z]+)*, [A-Z][a-z]+(?: [A-Z][a-z]+)*)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

pub fn extract(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    let from_containers = extract_from_containers(document, base, cap);
    if !from_containers.is_empty() {
        return from_containers;
    }
    extract_from_anchors(document, base, cap)
}

fn extract_from_containers(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    let mut sink = JobSink::new(Platform::Generic, cap);
    let link_sel = selector("a[href]");

    for css in CONTAINER_SELECTORS {
        let Some(sel) = selector(css) else { continue };

        // Innermost matches only: a `jobs-list` wrapper around `job-card`s is not a posting.
        let containers: Vec<_> = document
            .select(&sel)
            .filter(|el| el.select(&sel).next().is_none())
            .filter(|el| looks_like_posting(el))
            .collect();
        if containers.is_empty() {
            continue;
        }
        tracing::debug!(
            "Found {} candidate job containers on {base} with {css}",
            containers.len()
        );

        for container in &containers {
            if sink.is_full() {
                break;
            }
            let Some(link) = link_sel.as_ref().and_then(|s| container.select(s).next()) else {
                continue;
            };
            let Some(url) = link.value().attr("href").and_then(|h| resolve_link(base, h)) else {
                continue;
            };
            if same_page(&url, base) {
                continue;
            }
            let raw_title =
                first_text(container, TITLE_SELECTORS).unwrap_or_else(|| element_text(&link));
            let Some(title) = clean_title(&raw_title).filter(|t| !is_navigation_label(t)) else {
                continue;
            };
            let location = first_text(container, LOCATION_SELECTORS)
                .or_else(|| infer_location(container, &title));
            sink.push(&url, title, location);
        }

        if !sink.is_empty() {
            break;
        }
    }

    sink.into_jobs()
}

fn extract_from_anchors(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    let mut sink = JobSink::new(Platform::Generic, cap);
    let Some(anchors) = selector("a[href]") else {
        return Vec::new();
    };

    for anchor in document.select(&anchors) {
        if sink.is_full() {
            break;
        }
        let Some(url) = anchor.value().attr("href").and_then(|h| resolve_link(base, h)) else {
            continue;
        };
        if same_page(&url, base) {
            continue;
        }

        let text = element_text(&anchor);
        let text_lower = text.to_lowercase();
        let path_lower = url.path().to_lowercase();
        let job_like = TEXT_TOKENS.iter().any(|t| text_lower.contains(t))
            || PATH_TOKENS.iter().any(|t| path_lower.contains(t));
        if !job_like {
            continue;
        }

        let Some(title) = clean_title(&text).filter(|t| !is_navigation_label(t)) else {
            continue;
        };
        let location = infer_location(&anchor, &title);
        sink.push(&url, title, location);
    }

    sink.into_jobs()
}

fn looks_like_posting(el: &ElementRef) -> bool {
    let text = element_text(el).to_lowercase();
    if TEXT_TOKENS.iter().any(|t| text.contains(t)) {
        return true;
    }
    selector("a[href]")
        .and_then(|s| el.select(&s).next())
        .and_then(|a| a.value().attr("href"))
        .map(|href| {
            let href = href.to_lowercase();
            PATH_TOKENS.iter().any(|t| href.contains(t))
        })
        .unwrap_or(false)
}

fn is_navigation_label(title: &str) -> bool {
    let lower = title.to_lowercase();
    NAVIGATION_LABELS.contains(&lower.as_str())
}

fn same_page(url: &Url, base: &Url) -> bool {
    url.host_str() == base.host_str()
        && url.path().trim_end_matches('/') == base.path().trim_end_matches('/')
        && url.query() == base.query()
}

/// Best-effort location from the element's text nodes, excluding the title.
fn infer_location(el: &ElementRef, title: &str) -> Option<String> {
    let nodes: Vec<&str> = el
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != title)
        .collect();

    LOCATION_PATTERNS.iter().find_map(|pattern| {
        nodes.iter().find_map(|node| {
            pattern
                .captures(node)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|m| !m.is_empty())
        })
    })
}
