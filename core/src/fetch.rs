//! Fetching radar data from an alternate URL

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::plugin::PluginGlobalData;
use crate::radar::RadarData;
use crate::schema::normalize_integers;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Failed to parse radar data: {0}")]
    Parse(String),
    #[error("Invalid radar data format")]
    InvalidFormat,
}

const USER_AGENT: &str = concat!("techradar-core/", env!("CARGO_PKG_VERSION"));
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level keys a fetched document must carry
const REQUIRED_SECTIONS: [&str; 3] = ["quadrants", "rings", "entries"];

/// Parse a fetched response body into radar data.
///
/// Only the presence of the top-level sections is checked, matching what
/// presentation code needs to draw a chart.
pub fn parse_radar_response(body: &str) -> Result<RadarData, FetchError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| FetchError::Parse(e.to_string()))?;

    let complete = REQUIRED_SECTIONS
        .iter()
        .all(|key| value.get(key).is_some_and(|v| !v.is_null()));
    if !complete {
        return Err(FetchError::InvalidFormat);
    }

    serde_json::from_value(normalize_integers(value)).map_err(|e| FetchError::Parse(e.to_string()))
}

/// Fetch radar data from `url` (blocking)
pub fn fetch_radar_data(url: &str) -> Result<RadarData, FetchError> {
    debug!(url, "fetching radar data");
    let response = ureq::get(url)
        .set("User-Agent", USER_AGENT)
        .set("Accept", "application/json")
        .timeout(FETCH_TIMEOUT)
        .call();

    match response {
        Ok(resp) => {
            let body = resp
                .into_string()
                .map_err(|e| FetchError::Parse(e.to_string()))?;
            parse_radar_response(&body)
        }
        Err(ureq::Error::Status(code, _)) => {
            warn!(url, status = code, "radar source returned an error status");
            Err(FetchError::Status(code))
        }
        Err(e) => Err(FetchError::Network(e.to_string())),
    }
}

/// Radar data a chart should display: the alternate `source` when one is
/// given, otherwise what the build published.
pub fn resolve_radar_data(
    source: Option<&str>,
    published: &PluginGlobalData,
) -> Result<RadarData, FetchError> {
    match source {
        Some(url) => fetch_radar_data(url),
        None => Ok(published.radar_data.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complete_body() {
        let body = r##"{"quadrants":[{"name":"Q1"},{"name":"Q2"},{"name":"Q3"},{"name":"Q4"}],
            "rings":[{"name":"ADOPT","color":"#5ba300"}],"entries":[]}"##;
        let data = parse_radar_response(body).unwrap();
        assert_eq!(data.quadrants.len(), 4);
    }

    #[test]
    fn test_parse_missing_section() {
        let body = r#"{"quadrants":[],"rings":[]}"#;
        let err = parse_radar_response(body).unwrap_err();
        assert!(matches!(err, FetchError::InvalidFormat));
        assert_eq!(err.to_string(), "Invalid radar data format");
    }

    #[test]
    fn test_parse_null_section() {
        let body = r#"{"quadrants":[],"rings":[],"entries":null}"#;
        assert!(matches!(parse_radar_response(body), Err(FetchError::InvalidFormat)));
    }

    #[test]
    fn test_parse_malformed_json() {
        let err = parse_radar_response("<html>not json</html>").unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn test_parse_wrong_entry_types() {
        let body = r#"{"quadrants":[],"rings":[],"entries":[{"label":"X","quadrant":"zero","ring":0,"moved":0}]}"#;
        assert!(matches!(parse_radar_response(body), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_status_message() {
        assert_eq!(FetchError::Status(404).to_string(), "HTTP error! status: 404");
    }

    #[test]
    fn test_resolve_without_source_uses_published() {
        let published = PluginGlobalData::placeholder();
        let data = resolve_radar_data(None, &published).unwrap();
        assert_eq!(data, published.radar_data);
    }

    #[test]
    fn test_unreachable_source_is_network_error() {
        let published = PluginGlobalData::placeholder();
        let err = resolve_radar_data(Some("http://127.0.0.1:1/radar.json"), &published).unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}
