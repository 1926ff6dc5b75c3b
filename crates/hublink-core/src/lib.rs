//! Hublink Core - links LLM benchmark rows to Hugging Face Hub repositories.
//!
//! The pipeline turns a benchmark comparison table into Hub-enriched tables:
//! each `(model name, provider)` row is resolved to at most one canonical
//! repository id, popularity metrics are fetched once per id through a
//! persistent cache, and rows sharing an id are rolled up into one summary
//! record. Results land in CSV files and a SQLite database.
//!
//! # Example
//!
//! ```rust,ignore
//! use hublink_core::{HubClient, Pipeline, PipelinePaths, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> hublink_core::Result<()> {
//!     let pipeline = Pipeline::new(PipelinePaths::new("data"), ResolverConfig::default());
//!     let hub = HubClient::new()?;
//!
//!     let summary = pipeline.run_all(&hub, &hub).await?;
//!     println!("{} repos", summary.integrate.repos);
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod candidates;
pub mod config;
pub mod enrich;
pub mod error;
pub mod metrics_cache;
pub mod persist;
pub mod pipeline;
pub mod records;
pub mod registry;
pub mod resolve;
pub mod store;

// Re-export commonly used types
pub use aggregate::{aggregate, AggregateRecord};
pub use candidates::{CandidateFile, CandidateRecord, CollectorConfig};
pub use config::{NetworkConfig, PathsConfig, QueryConfig};
pub use enrich::EnrichedRecord;
pub use error::{HublinkError, Result};
pub use metrics_cache::{MetricsCache, MetricsCacheEntry};
pub use pipeline::{Pipeline, PipelinePaths, RunSummary};
pub use records::SourceRecord;
pub use registry::{
    Candidate, CandidateSource, FetchStatus, FetchedMetrics, HubClient, HubClientConfig,
    MetricsSource,
};
pub use resolve::{Resolution, ResolverConfig, RuleSet, UnresolvedReason};
pub use store::{ProviderSummary, RepoDetail, RowFilter, RowSummary, Store};
