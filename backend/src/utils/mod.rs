//! Small helpers shared across the backend.
//!
//! Serde adapters for partial-update payloads, timestamp and id helpers, and
//! the mapping from upload-relative paths to public `/files` URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Public URL for a path relative to the upload folder.
pub fn file_url(relative_path: &str) -> String {
    format!("/files/{}", relative_path.replace('\\', "/").trim_start_matches('/'))
}

/// Distinguishes an explicit `null` from an absent key: absent stays `None`
/// (via `#[serde(default)]`), `null` becomes `Some(None)`.
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims a string and turns an empty result into `None`.
pub fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::{deserialize_some, file_url, non_blank};
    use serde::Deserialize;

    #[derive(Deserialize, Default)]
    #[serde(default)]
    struct Patch {
        #[serde(deserialize_with = "deserialize_some")]
        value: Option<Option<String>>,
    }

    #[test]
    fn distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.value, None);
        let null: Patch = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert_eq!(null.value, Some(None));
        let set: Patch = serde_json::from_str(r#"{"value": "x"}"#).unwrap();
        assert_eq!(set.value, Some(Some("x".to_string())));
    }

    #[test]
    fn file_urls_use_forward_slashes() {
        assert_eq!(file_url("p1\\pages\\a.png"), "/files/p1/pages/a.png");
        assert_eq!(non_blank(Some("  ")), None);
    }
}
