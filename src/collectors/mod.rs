// Collectors: careers-page platform detection and per-platform job extraction,
// plus the per-company pipeline and the batch runner that drive them.

mod generic;
mod greenhouse;
mod lever;
mod listing;
pub mod pipeline;
pub mod platform;
pub mod runner;
mod zoho;

use scraper::Html;
use url::Url;

use crate::models::job::{JobRecord, Platform};

pub use platform::classify;

/// Run the extraction strategy for `platform` over a fetched page.
///
/// Returns at most `cap` records in page order. Malformed or unexpected
/// markup degrades to fewer (or zero) jobs, never to an error.
pub fn extract_jobs(platform: Platform, html: &str, base: &Url, cap: usize) -> Vec<JobRecord> {
    let document = Html::parse_document(html);
    let jobs = match platform {
        Platform::Lever => lever::extract(&document, base, cap),
        Platform::ZohoRecruit => zoho::extract(&document, base, cap),
        Platform::Greenhouse => greenhouse::extract(&document, base, cap),
        Platform::Generic => generic::extract(&document, base, cap),
    };
    tracing::debug!("{platform} strategy found {} job(s) on {base}", jobs.len());
    jobs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_tags_records_with_the_strategy_platform() {
        let base = Url::parse("https://boards.greenhouse.io/acme").expect("valid url");
        let html = r#"<div class="opening"><a href="/acme/jobs/1">Analyst</a></div>"#;

        let jobs = extract_jobs(Platform::Greenhouse, html, &base, 3);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].platform, Platform::Greenhouse);
    }

    #[test]
    fn garbage_markup_yields_no_jobs() {
        let base = Url::parse("https://acme.org/careers").expect("valid url");
        for platform in [
            Platform::Lever,
            Platform::ZohoRecruit,
            Platform::Greenhouse,
            Platform::Generic,
        ] {
            assert!(extract_jobs(platform, "<<<div class=", &base, 3).is_empty());
            assert!(extract_jobs(platform, "", &base, 3).is_empty());
        }
    }

    #[test]
    fn cap_is_respected_by_every_strategy() {
        let base = Url::parse("https://jobs.lever.co/acme").expect("valid url");
        let html = crate::test_support::lever_board(&[
            "Posting A",
            "Posting B",
            "Posting C",
            "Posting D",
        ]);
        assert_eq!(extract_jobs(Platform::Lever, &html, &base, 2).len(), 2);
        assert_eq!(extract_jobs(Platform::Lever, &html, &base, 1).len(), 1);
    }
}
