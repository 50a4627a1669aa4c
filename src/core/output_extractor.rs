//! # Output Extractor
//!
//! Scrapes deployment metadata out of the console report printed by
//! `serverless deploy -v`:
//!
//! ```text
//! Service Information
//! api keys:
//!   None
//! endpoints:
//!   GET - https://abc.execute-api.us-east-1.amazonaws.com/dev/users
//! functions:
//!   ...
//! ServiceEndpoint: https://abc.execute-api.us-east-1.amazonaws.com/dev
//! ```
//!
//! The marker strings are a text contract with that tool. Swapping the backend
//! tool means re-deriving them in `constants`.
use crate::{
    constants::{
        API_KEYS_MARKER, ENDPOINTS_MARKER, FUNCTIONS_MARKER, SERVICE_ENDPOINT_MARKER,
    },
    models::ExtractedDeployInfo,
};

/// Returns the trimmed text strictly between the first `marker1` and the first
/// `marker2` found after it, or `None` when either marker is missing.
fn text_between<'a>(text: &'a str, marker1: &str, marker2: &str) -> Option<&'a str> {
    let start = text.find(marker1)? + marker1.len();
    let rest = text.get(start..)?;
    let end = rest.find(marker2)?;
    rest.get(..end).map(str::trim)
}

/// Extracts the lines between two markers.
///
/// A missing marker, an empty section, or a section that reads `None` all
/// yield an empty list. Lines are trimmed and blank lines dropped.
pub fn extract_between_markers(text: &str, marker1: &str, marker2: &str) -> Vec<String> {
    match text_between(text, marker1, marker2) {
        None | Some("") | Some("None") => Vec::new(),
        Some(section) => section
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    }
}

pub fn extract_api_keys(text: &str) -> Vec<String> {
    extract_between_markers(text, API_KEYS_MARKER, ENDPOINTS_MARKER)
}

pub fn extract_endpoints(text: &str) -> Vec<String> {
    extract_between_markers(text, ENDPOINTS_MARKER, FUNCTIONS_MARKER)
}

/// The service base URL, found on the `ServiceEndpoint:` line.
pub fn extract_service_endpoint(text: &str) -> String {
    text_between(text, SERVICE_ENDPOINT_MARKER, "\n")
        .unwrap_or_default()
        .to_string()
}

pub fn extract_deploy_info(text: &str) -> ExtractedDeployInfo {
    ExtractedDeployInfo {
        base_url: extract_service_endpoint(text),
        api_keys: extract_api_keys(text),
        endpoints: extract_endpoints(text),
    }
}
