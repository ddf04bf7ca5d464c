use scraper::Html;
use url::Url;

use crate::collectors::listing::{ListingLayout, extract_with_layout};
use crate::models::job::{JobRecord, Platform};

/// Hosted Lever boards (jobs.lever.co) and embedded Lever widgets.
const LAYOUT: ListingLayout = ListingLayout {
    containers: &[
        "div.posting",
        "div[data-qa=\"posting\"]",
        "div.job-posting",
        "div.posting-item",
    ],
    // The apply button precedes the title link inside a posting.
    links: &["a.posting-title", "a[href]"],
    titles: &["h5[data-qa=\"posting-name\"]", "[data-qa=\"posting-name\"]", "h5"],
    locations: &[
        "span.sort-by-location",
        ".posting-categories .location",
        "div.location",
    ],
};

pub fn extract(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    extract_with_layout(&LAYOUT, document, base, Platform::Lever, cap)
}
