//! Hub API payload types shared by search and metrics lookups.

use crate::HublinkError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One search hit from the Hub.
///
/// Field names follow the Hub payload so candidate files can be written and
/// read back without translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// `namespace/name`; empty when the payload omits it.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub id: String,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(rename = "downloadsAllTime", default)]
    pub downloads_all_time: Option<u64>,
}

impl Candidate {
    /// Ranking key: downloads, then likes, then all-time downloads; missing
    /// counters count as zero.
    pub fn rank_key(&self) -> (u64, u64, u64) {
        (
            self.downloads.unwrap_or(0),
            self.likes.unwrap_or(0),
            self.downloads_all_time.unwrap_or(0),
        )
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Model info payload from `GET /models/{id}`; only the counters are used.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HfModelInfo {
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(rename = "downloadsAllTime", default)]
    pub downloads_all_time: Option<u64>,
}

/// Outcome of a metrics fetch: `ok`, or the HTTP status code that came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FetchStatus {
    Ok,
    Http(u16),
}

impl FetchStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, FetchStatus::Ok)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStatus::Ok => write!(f, "ok"),
            FetchStatus::Http(code) => write!(f, "http_{}", code),
        }
    }
}

impl From<FetchStatus> for String {
    fn from(status: FetchStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for FetchStatus {
    type Error = HublinkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == "ok" {
            return Ok(FetchStatus::Ok);
        }
        value
            .strip_prefix("http_")
            .and_then(|code| code.parse::<u16>().ok())
            .map(FetchStatus::Http)
            .ok_or_else(|| HublinkError::Validation {
                field: "hf_status".to_string(),
                message: format!("unrecognized fetch status '{}'", value),
            })
    }
}

/// Popularity counters for one identifier as returned by the metrics source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMetrics {
    pub status: FetchStatus,
    pub likes: Option<u64>,
    pub downloads: Option<u64>,
    pub downloads_all_time: Option<u64>,
}

impl FetchedMetrics {
    /// A non-success response: status code only, no counters.
    pub fn failed(code: u16) -> Self {
        Self {
            status: FetchStatus::Http(code),
            likes: None,
            downloads: None,
            downloads_all_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_status_strings() {
        assert_eq!(FetchStatus::Ok.to_string(), "ok");
        assert_eq!(FetchStatus::Http(404).to_string(), "http_404");
        assert_eq!(FetchStatus::try_from("http_503".to_string()).unwrap(), FetchStatus::Http(503));
        assert!(FetchStatus::try_from("http_abc".to_string()).is_err());
        assert!(FetchStatus::try_from("fine".to_string()).is_err());
    }

    #[test]
    fn test_candidate_payload_parsing() {
        let json = r#"[
            {"id": "meta-llama/Llama-3-8B", "likes": 12, "downloads": 500, "downloadsAllTime": 9000, "_id": "abc"},
            {"id": null, "downloads": 3},
            {"likes": 1}
        ]"#;
        let parsed: Vec<Candidate> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed[0].id, "meta-llama/Llama-3-8B");
        assert_eq!(parsed[0].downloads_all_time, Some(9000));
        assert_eq!(parsed[1].id, "");
        assert_eq!(parsed[1].likes, None);
        assert_eq!(parsed[2].id, "");
        assert_eq!(parsed[2].rank_key(), (0, 1, 0));
    }
}
