use scraper::Html;
use url::Url;

use crate::collectors::listing::{ListingLayout, extract_with_layout};
use crate::models::job::{JobRecord, Platform};

/// Zoho Recruit career sites (*.zohorecruit.com and regional domains).
const LAYOUT: ListingLayout = ListingLayout {
    containers: &[
        "div.job-item",
        "div.job-listing",
        "div[data-job-id]",
        "div.job-card",
        "li.jobDetailRow",
    ],
    links: &["a.job-title", "a.jobdetail", "a[href]"],
    titles: &[".job-title", ".jobTitle"],
    locations: &["span.job-location", ".job-location", "div.location", ".location"],
};

pub fn extract(document: &Html, base: &Url, cap: usize) -> Vec<JobRecord> {
    extract_with_layout(&LAYOUT, document, base, Platform::ZohoRecruit, cap)
}
