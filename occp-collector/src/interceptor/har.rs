//! HAR archive reader
//!
//! Loads a browser HTTP Archive (HAR 1.2) export and yields its completed
//! exchanges for replay through the interceptor. Entries without a response
//! body are skipped; base64-encoded bodies are decoded.

use axum::body::Bytes;
use base64::{engine::general_purpose, Engine as _};
use occp_common::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// One completed request/response pair
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedExchange {
    pub url: String,
    pub status: Option<u16>,
    pub body: Bytes,
}

#[derive(Debug, Deserialize)]
struct HarFile {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    response: HarResponse,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    /// 0 for aborted requests in some browsers
    #[serde(default)]
    status: i64,
    #[serde(default)]
    content: HarContent,
}

#[derive(Debug, Default, Deserialize)]
struct HarContent {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

/// Read and parse a HAR file
pub fn load_har(path: &Path) -> Result<Vec<CapturedExchange>> {
    let text = std::fs::read_to_string(path)?;
    parse_har(&text)
}

/// Parse HAR JSON text into exchanges, in archive order
pub fn parse_har(text: &str) -> Result<Vec<CapturedExchange>> {
    let har: HarFile = serde_json::from_str(text)
        .map_err(|e| Error::InvalidInput(format!("Not a HAR archive: {}", e)))?;

    let total = har.log.entries.len();
    let exchanges: Vec<CapturedExchange> = har
        .log
        .entries
        .into_iter()
        .filter_map(into_exchange)
        .collect();

    debug!(
        total,
        with_body = exchanges.len(),
        "Parsed HAR archive"
    );
    Ok(exchanges)
}

fn into_exchange(entry: HarEntry) -> Option<CapturedExchange> {
    let text = entry.response.content.text?;
    let body = match entry.response.content.encoding.as_deref() {
        Some("base64") => match general_purpose::STANDARD.decode(text.trim()) {
            Ok(decoded) => Bytes::from(decoded),
            Err(e) => {
                debug!(url = %entry.request.url, error = %e, "Undecodable HAR body, skipping");
                return None;
            }
        },
        _ => Bytes::from(text),
    };

    Some(CapturedExchange {
        url: entry.request.url,
        status: u16::try_from(entry.response.status).ok().filter(|s| *s > 0),
        body,
    })
}
