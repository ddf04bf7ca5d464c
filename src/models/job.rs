use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Job-board software family hosting a careers page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Lever,
    ZohoRecruit,
    Greenhouse,
    Generic,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Lever => "lever",
            Platform::ZohoRecruit => "zoho_recruit",
            Platform::Greenhouse => "greenhouse",
            Platform::Generic => "generic",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single job posting harvested from a careers page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub url: String,
    pub title: String,
    pub location: Option<String>,
    pub platform: Platform,
    pub extracted_at: DateTime<Utc>,
}

impl JobRecord {
    /// Build a record from an already-resolved posting URL.
    /// Only absolute http(s) URLs are accepted.
    pub fn new(
        url: &Url,
        title: impl Into<String>,
        location: Option<String>,
        platform: Platform,
    ) -> Option<JobRecord> {
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return None;
        }
        let title = title.into();
        if title.trim().is_empty() {
            return None;
        }
        Some(JobRecord {
            url: url.to_string(),
            title,
            location: location.filter(|l| !l.trim().is_empty()),
            platform,
            extracted_at: Utc::now(),
        })
    }

    /// Whether the stored URL still parses as an absolute http(s) URL.
    pub fn has_valid_url(&self) -> bool {
        Url::parse(&self.url)
            .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
            .unwrap_or(false)
    }
}
