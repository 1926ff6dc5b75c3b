//! Per-repository rollup of the enriched row table.
//!
//! Rows are folded in a single pass into one accumulator per identifier;
//! output is ordered by identifier. Null values are skipped by every
//! reducer and a column with no values stays null.

use crate::enrich::EnrichedRecord;
use crate::registry::FetchStatus;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary of every enriched row sharing one Hub identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub hf_repo_id: String,
    /// Most frequent provider; earliest row wins ties.
    pub provider: Option<String>,
    pub n_rows: u64,
    pub context_window: Option<f64>,
    pub speed_tokens_per_sec: Option<f64>,
    pub latency_sec: Option<f64>,
    pub benchmark_mmlu: Option<f64>,
    pub benchmark_chatbot_arena: Option<f64>,
    pub price_per_million_tokens: Option<f64>,
    pub training_dataset_size: Option<f64>,
    pub compute_power: Option<f64>,
    pub energy_efficiency: Option<f64>,
    pub quality_rating: Option<f64>,
    pub speed_rating: Option<f64>,
    pub price_rating: Option<f64>,
    pub open_source: Option<f64>,
    pub hf_status: FetchStatus,
    pub hf_likes: Option<u64>,
    pub hf_downloads: Option<u64>,
    pub hf_downloads_all_time: Option<u64>,
}

const MEDIAN_COLUMNS: usize = 11;

/// Median-reduced attributes, in `AggregateRecord` field order.
fn median_inputs(row: &EnrichedRecord) -> [Option<f64>; MEDIAN_COLUMNS] {
    [
        row.speed_tokens_per_sec,
        row.latency_sec,
        row.benchmark_mmlu,
        row.benchmark_chatbot_arena,
        row.price_per_million_tokens,
        row.training_dataset_size,
        row.compute_power,
        row.energy_efficiency,
        row.quality_rating,
        row.speed_rating,
        row.price_rating,
    ]
}

struct Accumulator {
    /// Providers in first-seen order with their counts.
    providers: Vec<(String, u64)>,
    n_rows: u64,
    context_window: Option<f64>,
    medians: [Vec<f64>; MEDIAN_COLUMNS],
    open_source: Option<f64>,
    hf_status: FetchStatus,
    hf_likes: Option<u64>,
    hf_downloads: Option<u64>,
    hf_downloads_all_time: Option<u64>,
}

impl Accumulator {
    fn new(first: &EnrichedRecord) -> Self {
        Self {
            providers: Vec::new(),
            n_rows: 0,
            context_window: None,
            medians: Default::default(),
            open_source: None,
            hf_status: first.hf_status,
            hf_likes: None,
            hf_downloads: None,
            hf_downloads_all_time: None,
        }
    }

    fn push(&mut self, row: &EnrichedRecord) {
        self.n_rows += 1;

        let provider = row.provider.trim();
        if !provider.is_empty() {
            match self.providers.iter_mut().find(|(p, _)| p == provider) {
                Some((_, count)) => *count += 1,
                None => self.providers.push((provider.to_string(), 1)),
            }
        }

        self.context_window = max_f64(self.context_window, row.context_window);
        self.open_source = max_f64(self.open_source, row.open_source);
        for (values, value) in self.medians.iter_mut().zip(median_inputs(row)) {
            values.extend(value.filter(|v| !v.is_nan()));
        }

        self.hf_likes = self.hf_likes.max(row.hf_likes);
        self.hf_downloads = self.hf_downloads.max(row.hf_downloads);
        self.hf_downloads_all_time = self.hf_downloads_all_time.max(row.hf_downloads_all_time);
    }

    fn finish(self, hf_repo_id: String) -> AggregateRecord {
        let [speed, latency, mmlu, arena, price, dataset, compute, energy, quality, speed_rating, price_rating] =
            self.medians.map(median);

        AggregateRecord {
            hf_repo_id,
            provider: mode(self.providers),
            n_rows: self.n_rows,
            context_window: self.context_window,
            speed_tokens_per_sec: speed,
            latency_sec: latency,
            benchmark_mmlu: mmlu,
            benchmark_chatbot_arena: arena,
            price_per_million_tokens: price,
            training_dataset_size: dataset,
            compute_power: compute,
            energy_efficiency: energy,
            quality_rating: quality,
            speed_rating,
            price_rating,
            open_source: self.open_source,
            hf_status: self.hf_status,
            hf_likes: self.hf_likes,
            hf_downloads: self.hf_downloads,
            hf_downloads_all_time: self.hf_downloads_all_time,
        }
    }
}

// `Option::max` would treat `None` as smallest, which is what we want for
// counters; floats need the NaN-aware version.
fn max_f64(current: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (current, value.filter(|v| !v.is_nan())) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn mode(counts: Vec<(String, u64)>) -> Option<String> {
    let mut best: Option<(String, u64)> = None;
    for (value, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count > *top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// Roll enriched rows up into one record per identifier, sorted by id.
pub fn aggregate(rows: &[EnrichedRecord]) -> Vec<AggregateRecord> {
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.hf_repo_id.as_str())
            .or_insert_with(|| Accumulator::new(row))
            .push(row);
    }

    groups
        .into_iter()
        .map(|(id, acc)| acc.finish(id.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics_cache::MetricsCacheEntry;
    use crate::records::SourceRecord;

    fn row(row_id: u64, repo: &str, provider: &str) -> EnrichedRecord {
        let entry = MetricsCacheEntry {
            repo_id: repo.to_string(),
            status: FetchStatus::Ok,
            likes: Some(row_id),
            downloads: Some(100 + row_id),
            downloads_all_time: None,
            fetched_at: None,
        };
        EnrichedRecord::new(&SourceRecord::new(row_id, "m", provider), &entry)
    }

    #[test]
    fn test_context_window_is_max_and_latency_is_median() {
        let mut rows = Vec::new();
        for (i, (cw, lat)) in [(1000.0, 1.0), (4000.0, 9.0), (2000.0, 2.0)]
            .into_iter()
            .enumerate()
        {
            let mut r = row(i as u64, "org/x", "Meta");
            r.context_window = Some(cw);
            r.latency_sec = Some(lat);
            rows.push(r);
        }

        let out = aggregate(&rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].n_rows, 3);
        assert_eq!(out[0].context_window, Some(4000.0));
        assert_eq!(out[0].latency_sec, Some(2.0));
        assert_eq!(out[0].hf_downloads, Some(102));
        assert_eq!(out[0].hf_likes, Some(2));
    }

    #[test]
    fn test_even_count_median_is_midpoint() {
        let mut a = row(0, "org/x", "Meta");
        let mut b = row(1, "org/x", "Meta");
        a.benchmark_mmlu = Some(70.0);
        b.benchmark_mmlu = Some(80.0);
        assert_eq!(aggregate(&[a, b])[0].benchmark_mmlu, Some(75.0));
    }

    #[test]
    fn test_nulls_are_skipped() {
        let mut a = row(0, "org/x", "Meta");
        let b = row(1, "org/x", "Meta");
        a.speed_tokens_per_sec = Some(42.0);

        let out = aggregate(&[a, b]);
        assert_eq!(out[0].speed_tokens_per_sec, Some(42.0));
        assert_eq!(out[0].context_window, None);
        assert_eq!(out[0].price_rating, None);
        assert_eq!(out[0].hf_downloads_all_time, None);
    }

    #[test]
    fn test_provider_mode_prefers_earliest_on_tie() {
        let rows = vec![
            row(0, "org/x", "Beta"),
            row(1, "org/x", "Alpha"),
            row(2, "org/y", "Beta"),
            row(3, "org/y", "Alpha"),
            row(4, "org/y", "Alpha"),
        ];
        let out = aggregate(&rows);
        assert_eq!(out[0].provider.as_deref(), Some("Beta"));
        assert_eq!(out[1].provider.as_deref(), Some("Alpha"));
    }

    #[test]
    fn test_output_sorted_by_identifier() {
        let rows = vec![row(0, "org/b", "P"), row(1, "org/a", "P")];
        let ids: Vec<_> = aggregate(&rows).into_iter().map(|a| a.hf_repo_id).collect();
        assert_eq!(ids, vec!["org/a", "org/b"]);
    }
}
