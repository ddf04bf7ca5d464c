//! Shared building blocks for the extraction strategies: selector handling,
//! text cleanup and the capped, de-duplicating job accumulator.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::job::{JobRecord, Platform};

/// Titles shorter than this are navigation noise, not postings.
const MIN_TITLE_LEN: usize = 3;

static TITLE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(job|career|position|opening|vacancy|role)\s*:\s*").expect("valid regex")
});
static TITLE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(job|career|position|opening|vacancy|role)$").expect("valid regex")
});

/// Structural markers for a platform whose postings sit in repeated containers.
pub(crate) struct ListingLayout {
    /// Container selectors, tried in order; the first that matches anything wins.
    pub containers: &'static [&'static str],
    /// Anchor selectors inside a container, tried in order.
    pub links: &'static [&'static str],
    /// Structured title fields; the anchor text is used when none match.
    pub titles: &'static [&'static str],
    pub locations: &'static [&'static str],
}

pub(crate) fn selector(css: &str) -> Option<Selector> {
    match Selector::parse(css) {
        Ok(sel) => Some(sel),
        Err(e) => {
            tracing::debug!("Skipping unparseable selector {css:?}: {e}");
            None
        }
    }
}

pub(crate) fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first non-empty match among `selectors` inside `el`.
pub(crate) fn first_text(el: &ElementRef, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| {
            el.select(&sel)
                .map(|found| element_text(&found))
                .find(|text| !text.is_empty())
        })
}

/// Strip generic "Job:" / "... Position" decoration from a heuristically
/// found title and reject ones too short to be a posting.
pub(crate) fn clean_title(raw: &str) -> Option<String> {
    let title = normalize_whitespace(raw);
    let title = TITLE_PREFIX.replace(&title, "");
    let title = TITLE_SUFFIX.replace(&title, "").trim().to_string();
    (title.chars().count() >= MIN_TITLE_LEN).then_some(title)
}

/// Resolve an href against the page URL. Fragment-only, mailto and
/// javascript links are not postings.
pub(crate) fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Accumulates jobs in page order, skipping repeated URLs, until the cap.
pub(crate) struct JobSink {
    cap: usize,
    platform: Platform,
    seen: HashSet<String>,
    jobs: Vec<JobRecord>,
}

impl JobSink {
    pub fn new(platform: Platform, cap: usize) -> Self {
        Self {
            cap,
            platform,
            seen: HashSet::new(),
            jobs: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.jobs.len() >= self.cap
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Returns whether the posting was kept.
    pub fn push(&mut self, url: &Url, title: String, location: Option<String>) -> bool {
        if self.is_full() || self.seen.contains(url.as_str()) {
            return false;
        }
        match JobRecord::new(url, title, location, self.platform) {
            Some(job) => {
                self.seen.insert(job.url.clone());
                self.jobs.push(job);
                true
            }
            None => false,
        }
    }

    pub fn into_jobs(self) -> Vec<JobRecord> {
        self.jobs
    }
}

/// Extract postings following a platform layout. Entries without a usable
/// link or title are skipped; a missing marker simply yields no jobs.
pub(crate) fn extract_with_layout(
    layout: &ListingLayout,
    document: &Html,
    base: &Url,
    platform: Platform,
    cap: usize,
) -> Vec<JobRecord> {
    let mut sink = JobSink::new(platform, cap);

    let Some(containers) = layout
        .containers
        .iter()
        .filter_map(|css| selector(css))
        .map(|sel| document.select(&sel).collect::<Vec<_>>())
        .find(|found| !found.is_empty())
    else {
        tracing::debug!("No {platform} listing containers on {base}");
        return Vec::new();
    };

    for (position, container) in containers.iter().enumerate() {
        if sink.is_full() {
            break;
        }

        let Some(link) = layout
            .links
            .iter()
            .filter_map(|css| selector(css))
            .find_map(|sel| container.select(&sel).next())
        else {
            tracing::debug!("{platform} entry {position} on {base} has no link, skipping");
            continue;
        };

        let Some(url) = link.value().attr("href").and_then(|h| resolve_link(base, h)) else {
            tracing::debug!("{platform} entry {position} on {base} has an unusable href, skipping");
            continue;
        };

        let raw_title =
            first_text(container, layout.titles).unwrap_or_else(|| element_text(&link));
        let Some(title) = clean_title(&raw_title) else {
            tracing::debug!("{platform} entry {position} on {base} has no usable title, skipping");
            continue;
        };

        let location = first_text(container, layout.locations);
        sink.push(&url, title, location);
    }

    sink.into_jobs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://acme.com/careers/").expect("valid url")
    }

    #[test]
    fn titles_are_cleaned() {
        assert_eq!(clean_title("  Job:   Backend   Engineer "), Some("Backend Engineer".into()));
        assert_eq!(clean_title("Data Analyst Position"), Some("Data Analyst".into()));
        assert_eq!(clean_title("QA"), None);
    }

    #[test]
    fn links_resolve_against_the_page() {
        assert_eq!(
            resolve_link(&base(), "openings/42#apply").map(|u| u.to_string()),
            Some("https://acme.com/careers/openings/42".into())
        );
        assert_eq!(
            resolve_link(&base(), "/jobs/7").map(|u| u.to_string()),
            Some("https://acme.com/jobs/7".into())
        );
        assert!(resolve_link(&base(), "#top").is_none());
        assert!(resolve_link(&base(), "mailto:jobs@acme.com").is_none());
        assert!(resolve_link(&base(), "javascript:void(0)").is_none());
    }

    #[test]
    fn sink_deduplicates_and_caps() {
        let mut sink = JobSink::new(Platform::Generic, 2);
        let a = Url::parse("https://acme.com/jobs/1").expect("valid url");
        let b = Url::parse("https://acme.com/jobs/2").expect("valid url");
        let c = Url::parse("https://acme.com/jobs/3").expect("valid url");

        assert!(sink.push(&a, "One".into(), None));
        assert!(!sink.push(&a, "One again".into(), None));
        assert!(sink.push(&b, "Two".into(), None));
        assert!(!sink.push(&c, "Three".into(), None));
        assert_eq!(sink.into_jobs().len(), 2);
    }

    #[test]
    fn layout_falls_back_to_link_text_and_skips_broken_entries() {
        const LAYOUT: ListingLayout = ListingLayout {
            containers: &["div.missing", "li.role"],
            links: &["a.title", "a[href]"],
            titles: &["h3"],
            locations: &[".where"],
        };
        let html = Html::parse_document(
            r#"<ul>
                <li class="role"><a href="/jobs/1">Platform Engineer</a><span class="where">Oslo</span></li>
                <li class="role"><span>No link here</span></li>
                <li class="role"><a class="title" href="/jobs/3"><h3>Designer</h3></a></li>
            </ul>"#,
        );

        let jobs = extract_with_layout(&LAYOUT, &html, &base(), Platform::Generic, 3);

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].title, "Platform Engineer");
        assert_eq!(jobs[0].location.as_deref(), Some("Oslo"));
        assert_eq!(jobs[1].title, "Designer");
        assert_eq!(jobs[1].location, None);
        assert_eq!(jobs[1].url, "https://acme.com/jobs/3");
    }

    #[test]
    fn layout_titles_are_cleaned_and_short_ones_skipped() {
        const LAYOUT: ListingLayout = ListingLayout {
            containers: &["li.role"],
            links: &["a[href]"],
            titles: &["h3"],
            locations: &[],
        };
        let html = Html::parse_document(
            r#"<ul>
                <li class="role"><a href="/jobs/1"><h3>QA</h3></a></li>
                <li class="role"><a href="/jobs/2"><h3>Job:  Backend   Engineer</h3></a></li>
                <li class="role"><a href="/jobs/3">Office Manager Position</a></li>
            </ul>"#,
        );

        let jobs = extract_with_layout(&LAYOUT, &html, &base(), Platform::Lever, 3);

        let titles: Vec<_> = jobs.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["Backend Engineer", "Office Manager"]);
        assert_eq!(jobs[0].url, "https://acme.com/jobs/2");
    }
}
