//! Row-level enrichment: resolve every row, fetch metrics for the
//! identifiers actually referenced, join.

use crate::candidates::{candidates_for, CandidateFile};
use crate::error::Result;
use crate::metrics_cache::{MetricsCache, MetricsCacheEntry};
use crate::records::SourceRecord;
use crate::registry::{FetchStatus, MetricsSource};
use crate::resolve::{resolve, Resolution, ResolutionRecord, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;

/// A source row joined with its identifier and Hub metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub row_id: u64,
    pub model_name: String,
    pub provider: String,
    pub context_window: Option<f64>,
    pub speed_tokens_per_sec: Option<f64>,
    pub latency_sec: Option<f64>,
    pub benchmark_mmlu: Option<f64>,
    pub benchmark_chatbot_arena: Option<f64>,
    pub open_source: Option<f64>,
    pub price_per_million_tokens: Option<f64>,
    pub training_dataset_size: Option<f64>,
    pub compute_power: Option<f64>,
    pub energy_efficiency: Option<f64>,
    pub quality_rating: Option<f64>,
    pub speed_rating: Option<f64>,
    pub price_rating: Option<f64>,
    pub hf_repo_id: String,
    pub hf_status: FetchStatus,
    pub hf_likes: Option<u64>,
    pub hf_downloads: Option<u64>,
    pub hf_downloads_all_time: Option<u64>,
}

impl EnrichedRecord {
    pub fn new(record: &SourceRecord, entry: &MetricsCacheEntry) -> Self {
        Self {
            row_id: record.row_id,
            model_name: record.model_name.clone(),
            provider: record.provider.clone(),
            context_window: record.context_window,
            speed_tokens_per_sec: record.speed_tokens_per_sec,
            latency_sec: record.latency_sec,
            benchmark_mmlu: record.benchmark_mmlu,
            benchmark_chatbot_arena: record.benchmark_chatbot_arena,
            open_source: record.open_source,
            price_per_million_tokens: record.price_per_million_tokens,
            training_dataset_size: record.training_dataset_size,
            compute_power: record.compute_power,
            energy_efficiency: record.energy_efficiency,
            quality_rating: record.quality_rating,
            speed_rating: record.speed_rating,
            price_rating: record.price_rating,
            hf_repo_id: entry.repo_id.clone(),
            hf_status: entry.status,
            hf_likes: entry.likes,
            hf_downloads: entry.downloads,
            hf_downloads_all_time: entry.downloads_all_time,
        }
    }
}

/// Resolve every record against its collected candidates.
///
/// The result is aligned with `records`: exactly one resolution per row.
pub fn resolve_records(
    records: &[SourceRecord],
    candidates: &CandidateFile,
    rules: &ResolverConfig,
) -> Vec<Resolution> {
    records
        .iter()
        .map(|r| resolve(r, candidates_for(candidates, r.row_id), rules))
        .collect()
}

/// Persistable resolution map rows.
pub fn resolution_map(records: &[SourceRecord], resolutions: &[Resolution]) -> Vec<ResolutionRecord> {
    records
        .iter()
        .zip(resolutions)
        .map(|(record, resolution)| ResolutionRecord::new(record, resolution))
        .collect()
}

/// Distinct identifiers referenced by at least one resolved row, sorted.
pub fn referenced_repo_ids(resolutions: &[Resolution]) -> Vec<String> {
    resolutions
        .iter()
        .filter_map(|r| r.repo_id())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Counts from one cache fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    pub referenced: usize,
    pub fetched: usize,
    pub failed: usize,
}

/// Make sure every referenced identifier has a cache entry.
pub async fn fill_cache(
    repo_ids: &[String],
    cache: &mut MetricsCache,
    source: &dyn MetricsSource,
) -> Result<FillSummary> {
    let before = cache.live_fetches();
    let mut failed = 0;

    for repo_id in repo_ids {
        let entry = cache.get_or_fetch(repo_id, source).await?;
        if !entry.status.is_ok() {
            failed += 1;
        }
    }

    let summary = FillSummary {
        referenced: repo_ids.len(),
        fetched: cache.live_fetches() - before,
        failed,
    };
    info!(
        "Metrics cache: {} referenced, {} fetched, {} failed",
        summary.referenced, summary.fetched, summary.failed
    );
    Ok(summary)
}

/// Join rows with their cache entries, keeping only rows whose identifier
/// had a successful fetch with a download count.
pub fn join_enriched(
    records: &[SourceRecord],
    resolutions: &[Resolution],
    cache: &MetricsCache,
) -> Vec<EnrichedRecord> {
    records
        .iter()
        .zip(resolutions)
        .filter_map(|(record, resolution)| {
            let entry = cache.get(resolution.repo_id()?)?;
            entry
                .is_usable()
                .then(|| EnrichedRecord::new(record, entry))
        })
        .collect()
}
