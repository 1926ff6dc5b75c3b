//! HTTP client for the Hugging Face Hub API.

use super::types::{Candidate, FetchStatus, FetchedMetrics, HfModelInfo};
use super::{CandidateSource, MetricsSource};
use crate::config::NetworkConfig;
use crate::error::{HublinkError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Connection settings for [`HubClient`].
#[derive(Debug, Clone)]
pub struct HubClientConfig {
    /// API root, e.g. `https://huggingface.co/api`.
    pub base_url: String,
    /// Total per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HubClientConfig {
    fn default() -> Self {
        Self {
            base_url: NetworkConfig::HUB_API_BASE.to_string(),
            timeout: NetworkConfig::REQUEST_TIMEOUT,
            user_agent: NetworkConfig::USER_AGENT.to_string(),
        }
    }
}

/// Client for Hub search and model info lookups.
pub struct HubClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for HubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HubClient {
    /// Create a client against the public Hub.
    pub fn new() -> Result<Self> {
        Self::with_config(HubClientConfig::default())
    }

    /// Create a client with custom settings.
    pub fn with_config(config: HubClientConfig) -> Result<Self> {
        let parsed = Url::parse(&config.base_url).map_err(|e| HublinkError::Config {
            message: format!("Invalid Hub base URL '{}': {}", config.base_url, e),
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| HublinkError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    /// API root this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search models, most downloaded first.
    ///
    /// Any non-success status is an error: search failures abort the
    /// collection stage.
    pub async fn search_models(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        let url = format!("{}/models", self.base_url);
        let limit = limit.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", query),
                ("limit", limit.as_str()),
                ("sort", "downloads"),
                ("direction", "-1"),
                ("expand[]", "downloads"),
                ("expand[]", "downloadsAllTime"),
                ("expand[]", "likes"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HublinkError::Network {
                message: format!("Hub search for '{}' returned {}", query, response.status()),
                cause: None,
            });
        }

        let candidates: Vec<Candidate> =
            response.json().await.map_err(|e| HublinkError::Json {
                message: format!("Failed to parse Hub search response for '{}': {}", query, e),
                source: None,
            })?;

        debug!("Search '{}' returned {} candidates", query, candidates.len());
        Ok(candidates)
    }

    /// Fetch popularity counters for one repository.
    ///
    /// A non-200 response is not an error; it comes back as
    /// [`FetchStatus::Http`] with no counters. Transport and parse failures
    /// are errors.
    pub async fn model_metrics(&self, repo_id: &str) -> Result<FetchedMetrics> {
        // repo_id is "owner/model" -- the slash is part of the URL path,
        // so the whole string must not be encoded.
        let url = format!("{}/models/{}", self.base_url, repo_id);

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            warn!("Hub returned {} for {}", status, repo_id);
            return Ok(FetchedMetrics::failed(status.as_u16()));
        }

        let info: HfModelInfo = response.json().await.map_err(|e| HublinkError::Json {
            message: format!("Failed to parse Hub model info for {}: {}", repo_id, e),
            source: None,
        })?;

        info!("Fetched metrics for {}", repo_id);
        Ok(FetchedMetrics {
            status: FetchStatus::Ok,
            likes: info.likes,
            downloads: info.downloads,
            downloads_all_time: info.downloads_all_time,
        })
    }
}

#[async_trait]
impl CandidateSource for HubClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>> {
        self.search_models(query, limit).await
    }
}

#[async_trait]
impl MetricsSource for HubClient {
    async fn fetch_metrics(&self, repo_id: &str) -> Result<FetchedMetrics> {
        self.model_metrics(repo_id).await
    }
}
