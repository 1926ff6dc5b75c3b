//! Hugging Face Hub access.
//!
//! The pipeline only needs two things from the Hub, each behind a trait so
//! stages can be driven by in-memory sources in tests:
//! - [`CandidateSource`] - ranked repository search
//! - [`MetricsSource`] - popularity counters for one repository
//!
//! [`HubClient`] implements both against the live API.

mod client;
mod pacing;
mod types;

pub use client::{HubClient, HubClientConfig};
pub use pacing::Pacer;
pub use types::{Candidate, FetchStatus, FetchedMetrics};

use crate::error::Result;
use async_trait::async_trait;

/// Registry search returning candidates in best-effort relevance order.
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>>;
}

/// Popularity metrics lookup for a canonical identifier.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn fetch_metrics(&self, repo_id: &str) -> Result<FetchedMetrics>;
}
