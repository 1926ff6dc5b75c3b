//! Centralized configuration constants for hublink.
//!
//! Network parameters, artifact file names and query limits live here so the
//! pipeline stages and the query service agree on them.

use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const HUB_API_BASE: &'static str = "https://huggingface.co/api";
    pub const USER_AGENT: &'static str = "hublink/0.1";
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
    /// Maximum candidates requested per search.
    pub const SEARCH_LIMIT: usize = 50;
    /// Pause after each live search request.
    pub const SEARCH_SPACING: Duration = Duration::from_millis(150);
    /// Pause after each live metrics fetch.
    pub const METRICS_FETCH_SPACING: Duration = Duration::from_millis(200);
}

/// Artifact directory and file names, relative to the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const RAW_DIR_NAME: &'static str = "raw";
    pub const PROCESSED_DIR_NAME: &'static str = "processed";
    pub const SOURCE_CSV: &'static str = "llm_comparison_dataset.csv";
    pub const CLEAN_CSV: &'static str = "source_clean.csv";
    pub const CANDIDATES_JSON: &'static str = "hf_candidates_by_row.json";
    pub const METRICS_CACHE_JSON: &'static str = "hf_metrics_by_repo.json";
    pub const RESOLUTION_MAP_CSV: &'static str = "resolution_map.csv";
    pub const ROW_LEVEL_CSV: &'static str = "merged_row_level.csv";
    pub const REPO_LEVEL_CSV: &'static str = "merged_repo_level.csv";
    pub const DATABASE_FILE: &'static str = "llm_context.db";
}

/// Limits for read queries against the store.
pub struct QueryConfig;

impl QueryConfig {
    pub const DEFAULT_LIMIT: i64 = 200;
    pub const MAX_LIMIT: i64 = 2000;

    /// Normalize a requested row limit.
    ///
    /// Missing or non-positive limits fall back to the default; large ones
    /// are capped.
    pub fn clamp_limit(requested: Option<i64>) -> i64 {
        match requested {
            Some(n) if n > 0 => n.min(Self::MAX_LIMIT),
            _ => Self::DEFAULT_LIMIT,
        }
    }
}
