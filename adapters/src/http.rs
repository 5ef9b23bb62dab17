//! Low-level HTTP helpers shared by the provider implementations.

use crate::errors::{AdapterError, AdapterResult};
use crate::models::GeneratedImage;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 500;

pub(crate) fn build_client(provider: &'static str, timeout: Duration) -> AdapterResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| AdapterError::Configuration(format!("{provider}: {err}")))
}

/// Sends a request and decodes a JSON body, mapping non-2xx statuses to `AdapterError::Status`.
pub(crate) async fn send_json(provider: &'static str, request: RequestBuilder) -> AdapterResult<Value> {
    let response = request
        .send()
        .await
        .map_err(|err| AdapterError::transport(provider, err))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Status {
            provider,
            status: status.as_u16(),
            body: truncate(&body, MAX_ERROR_BODY_CHARS),
        });
    }

    response
        .json::<Value>()
        .await
        .map_err(|err| AdapterError::invalid(provider, err.to_string()))
}

/// Fetches a remote image, e.g. a reference picture linked from a slide description.
pub async fn download_image(url: &str) -> AdapterResult<GeneratedImage> {
    let client = build_client("download", DOWNLOAD_TIMEOUT)?;
    debug!("Downloading image from URL: {url}");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|err| AdapterError::transport("download", err))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Status {
            provider: "download",
            status: status.as_u16(),
            body: url.to_string(),
        });
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|err| AdapterError::transport("download", err))?;

    Ok(GeneratedImage {
        bytes: bytes.to_vec(),
        mime_type,
    })
}

pub(crate) fn truncate(value: &str, max_chars: usize) -> String {
    let mut truncated: String = value.chars().take(max_chars).collect();
    if value.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

pub(crate) fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

/// The configured base URL, or `default` when it is unset or blank.
pub(crate) fn api_base<'a>(configured: Option<&'a str>, default: &'a str) -> &'a str {
    let base = configured
        .map(str::trim)
        .filter(|base| !base.is_empty())
        .unwrap_or(default);
    trim_base(base)
}

#[cfg(test)]
mod tests {
    use super::{api_base, trim_base, truncate};

    #[test]
    fn truncate_marks_cut_text() {
        assert_eq!(truncate("abcdef", 3), "abc...");
        assert_eq!(truncate("abc", 3), "abc");
    }

    #[test]
    fn trim_base_drops_trailing_slashes() {
        assert_eq!(trim_base("https://example.com/v1//"), "https://example.com/v1");
    }

    #[test]
    fn blank_api_base_falls_back_to_default() {
        let default = "https://api.example.com/v1";
        assert_eq!(api_base(None, default), default);
        assert_eq!(api_base(Some(""), default), default);
        assert_eq!(api_base(Some("   "), default), default);
        assert_eq!(api_base(Some(" https://proxy.test/v1/ "), default), "https://proxy.test/v1");
    }
}
