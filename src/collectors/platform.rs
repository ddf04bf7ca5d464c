use url::Url;

use crate::models::job::Platform;

/// Markup/script fragments that identify an embedded job board.
const CONTENT_SIGNATURES: &[(Platform, &[&str])] = &[
    (
        Platform::Lever,
        &["jobs.lever.co", "api.lever.co", "lever-jobs-container"],
    ),
    (
        Platform::ZohoRecruit,
        &["zohorecruit.", "zrsite", "zoho recruit"],
    ),
    (
        Platform::Greenhouse,
        &["boards.greenhouse.io", "job-boards.greenhouse.io", "grnhse_app", "greenhouse.io/embed"],
    ),
];

/// Decide which extraction strategy applies to a careers page.
///
/// Host signatures win over page content; anything unrecognized is
/// `Generic`. Never fails, whatever the input.
pub fn classify(careers_url: &str, content: Option<&str>) -> Platform {
    if let Some(platform) = Url::parse(careers_url.trim())
        .ok()
        .and_then(|url| from_host(&url))
    {
        return platform;
    }

    content.and_then(from_content).unwrap_or(Platform::Generic)
}

fn from_host(url: &Url) -> Option<Platform> {
    let host = url.host_str()?.to_lowercase();
    let on = |domain: &str| host == domain || host.ends_with(&format!(".{domain}"));

    if on("lever.co") {
        Some(Platform::Lever)
    } else if host.split('.').any(|label| label == "zohorecruit") {
        // zohorecruit.com, zohorecruit.in, zohorecruit.eu, ...
        Some(Platform::ZohoRecruit)
    } else if on("greenhouse.io") {
        Some(Platform::Greenhouse)
    } else {
        None
    }
}

fn from_content(content: &str) -> Option<Platform> {
    let lower = content.to_lowercase();
    CONTENT_SIGNATURES
        .iter()
        .find(|(_, markers)| markers.iter().any(|m| lower.contains(m)))
        .map(|(platform, _)| *platform)
}
