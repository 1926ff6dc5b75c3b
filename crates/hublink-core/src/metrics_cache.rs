//! Fetch-once cache of Hub popularity metrics, keyed by repository id.
//!
//! The cache file is a JSON object mapping repository id to
//! [`MetricsCacheEntry`]. It is read in full on open and rewritten in full
//! (atomically) after every new entry, so a run that dies after N fetches
//! keeps entries 1..N and a rerun picks up where it stopped.
//!
//! Entries are never overwritten. That includes failed fetches: an
//! `http_<code>` entry is terminal and is only refetched after it has been
//! removed with [`MetricsCache::forget`].

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::persist::{atomic_read_json, atomic_write_json};
use crate::registry::{FetchStatus, FetchedMetrics, MetricsSource, Pacer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Persisted metrics for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsCacheEntry {
    #[serde(rename = "hf_repo_id")]
    pub repo_id: String,
    #[serde(rename = "hf_status")]
    pub status: FetchStatus,
    #[serde(rename = "hf_likes")]
    pub likes: Option<u64>,
    #[serde(rename = "hf_downloads")]
    pub downloads: Option<u64>,
    #[serde(rename = "hf_downloads_all_time")]
    pub downloads_all_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl MetricsCacheEntry {
    fn from_fetch(repo_id: &str, fetched: FetchedMetrics) -> Self {
        let ok = fetched.status.is_ok();
        Self {
            repo_id: repo_id.to_string(),
            status: fetched.status,
            // Counters are only meaningful on success.
            likes: fetched.likes.filter(|_| ok),
            downloads: fetched.downloads.filter(|_| ok),
            downloads_all_time: fetched.downloads_all_time.filter(|_| ok),
            fetched_at: Some(Utc::now()),
        }
    }

    /// Successful fetch with a download count; the only entries that feed
    /// enrichment.
    pub fn is_usable(&self) -> bool {
        self.status.is_ok() && self.downloads.is_some()
    }
}

/// Fetch-once metrics cache backed by a JSON file.
pub struct MetricsCache {
    path: PathBuf,
    entries: BTreeMap<String, MetricsCacheEntry>,
    pacer: Pacer,
    live_fetches: usize,
}

impl std::fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCache")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("fetch_spacing", &self.pacer.spacing())
            .finish()
    }
}

impl MetricsCache {
    /// Open the cache, loading every persisted entry.
    ///
    /// A missing file is an empty cache; a malformed one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries: BTreeMap<String, MetricsCacheEntry> =
            atomic_read_json(&path)?.unwrap_or_default();

        debug!("Loaded {} cached metrics from {}", entries.len(), path.display());

        Ok(Self {
            path,
            entries,
            pacer: Pacer::new(NetworkConfig::METRICS_FETCH_SPACING),
            live_fetches: 0,
        })
    }

    /// Minimum interval between two live fetches.
    pub fn with_fetch_spacing(mut self, spacing: Duration) -> Self {
        self.pacer = Pacer::new(spacing);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, repo_id: &str) -> Option<&MetricsCacheEntry> {
        self.entries.get(repo_id)
    }

    pub fn contains(&self, repo_id: &str) -> bool {
        self.entries.contains_key(repo_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in repository id order.
    pub fn entries(&self) -> impl Iterator<Item = &MetricsCacheEntry> {
        self.entries.values()
    }

    /// Number of live fetches performed through this handle.
    pub fn live_fetches(&self) -> usize {
        self.live_fetches
    }

    /// Return the cached entry, fetching and persisting it first if absent.
    ///
    /// Cached entries (successful or not) are returned unchanged without
    /// touching the network or waiting. Live fetches are spaced at least
    /// `fetch_spacing` apart. The new entry is on disk before this returns.
    pub async fn get_or_fetch(
        &mut self,
        repo_id: &str,
        source: &dyn MetricsSource,
    ) -> Result<MetricsCacheEntry> {
        if let Some(entry) = self.entries.get(repo_id) {
            debug!("Metrics cache hit for {} ({})", repo_id, entry.status);
            return Ok(entry.clone());
        }

        self.pacer.wait().await;
        let fetched = source.fetch_metrics(repo_id).await;
        self.pacer.mark();
        let fetched = fetched?;
        self.live_fetches += 1;

        let entry = MetricsCacheEntry::from_fetch(repo_id, fetched);
        if !entry.status.is_ok() {
            warn!(
                "Caching failed fetch for {} as {}; remove the entry to retry",
                repo_id, entry.status
            );
        }

        self.entries.insert(repo_id.to_string(), entry.clone());
        self.persist()?;

        Ok(entry)
    }

    /// Remove an entry so the next run fetches it again.
    ///
    /// Returns whether an entry was removed.
    pub fn forget(&mut self, repo_id: &str) -> Result<bool> {
        if self.entries.remove(repo_id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        info!("Removed cached metrics for {}", repo_id);
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        atomic_write_json(&self.path, &self.entries)
    }
}
