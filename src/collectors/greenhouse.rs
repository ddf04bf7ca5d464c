use scraper::Html;
use url::Url;

use crate::collectors::listing::{ListingLayout, extract_with_layout};
use crate::models::job::{JobRecord, Platform};

/// Greenhouse job boards: the classic `div.opening` markup and the newer
/// table-based `tr.job-post` board.
const LAYOUT: ListingLayout = ListingLayout {
    containers: &[
        "div.opening",
        "tr.job-post",
        "div[data-qa=\"opening\"]",
        "div.job",
        "div.job-listing",
    ],
    links: &["a[href]"],
    titles: &["p.body--medium", ".opening-title"],
    locations: &["span.location", "p.body--metadata", "div.location"],
};

pub fn extract(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    extract_with_layout(&LAYOUT, document, base, Platform::Greenhouse, cap)
}
