//! Candidate collection: one Hub search per benchmark row.
//!
//! The collected lists are persisted so resolution can be rerun (with
//! different rules, say) without hitting the search endpoint again.

use crate::config::NetworkConfig;
use crate::error::Result;
use crate::records::SourceRecord;
use crate::registry::{Candidate, CandidateSource, Pacer};
use crate::resolve::{allowed_by_prefixes, build_query, ResolverConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Note stored for rows whose provider is closed-source.
pub const CLOSED_SOURCE_NOTE: &str = "closed_source_provider_skipped";

/// Persisted search result for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub row_id: u64,
    pub model_name: String,
    pub provider: String,
    /// `None` when no search was made.
    pub query: Option<String>,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Candidate lists keyed by row id (as a string, matching the JSON file).
pub type CandidateFile = BTreeMap<String, CandidateRecord>;

/// Candidates recorded for a row; empty if the row has no entry.
pub fn candidates_for(file: &CandidateFile, row_id: u64) -> &[Candidate] {
    file.get(&row_id.to_string())
        .map(|r| r.candidates.as_slice())
        .unwrap_or(&[])
}

/// Knobs for the collection stage.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Result limit passed to the search and applied after prefix filtering.
    pub limit: usize,
    /// Minimum interval between two searches.
    pub spacing: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            limit: NetworkConfig::SEARCH_LIMIT,
            spacing: NetworkConfig::SEARCH_SPACING,
        }
    }
}

/// Search the registry for every row.
///
/// Closed-source rows are recorded without searching. Search errors abort
/// the whole collection.
pub async fn collect_candidates(
    records: &[SourceRecord],
    source: &dyn CandidateSource,
    rules: &ResolverConfig,
    config: &CollectorConfig,
) -> Result<CandidateFile> {
    let mut out = CandidateFile::new();
    let mut pacer = Pacer::new(config.spacing);
    let mut searches = 0usize;

    for record in records {
        if rules.is_closed(&record.provider) {
            debug!(row_id = record.row_id, "Skipping closed-source provider");
            out.insert(
                record.row_id.to_string(),
                CandidateRecord {
                    row_id: record.row_id,
                    model_name: record.model_name.clone(),
                    provider: record.provider.clone(),
                    query: None,
                    candidates: Vec::new(),
                    note: Some(CLOSED_SOURCE_NOTE.to_string()),
                },
            );
            continue;
        }

        let query = build_query(&record.model_name, &record.provider, rules);

        pacer.wait().await;
        let found = source.search(&query, config.limit).await;
        pacer.mark();
        let found = found?;
        searches += 1;

        let prefixes = rules.prefixes_for(&record.provider);
        let candidates: Vec<Candidate> = found
            .into_iter()
            .filter(|c| allowed_by_prefixes(&c.id, prefixes))
            .take(config.limit)
            .collect();

        debug!(
            row_id = record.row_id,
            query = %query,
            kept = candidates.len(),
            "Collected candidates"
        );

        out.insert(
            record.row_id.to_string(),
            CandidateRecord {
                row_id: record.row_id,
                model_name: record.model_name.clone(),
                provider: record.provider.clone(),
                query: Some(query),
                candidates,
                note: None,
            },
        );
    }

    info!(
        "Collected candidates for {} rows ({} searches)",
        out.len(),
        searches
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HublinkError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every query and answers with a fixed list.
    struct RecordingSource {
        queries: Mutex<Vec<String>>,
        answer: Vec<Candidate>,
    }

    #[async_trait]
    impl CandidateSource for RecordingSource {
        async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Candidate>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.answer.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl CandidateSource for FailingSource {
        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Candidate>> {
            Err(HublinkError::Network {
                message: "connection refused".to_string(),
                cause: None,
            })
        }
    }

    fn hit(id: &str, downloads: u64) -> Candidate {
        Candidate {
            id: id.to_string(),
            likes: None,
            downloads: Some(downloads),
            downloads_all_time: None,
        }
    }

    fn no_spacing() -> CollectorConfig {
        CollectorConfig {
            limit: 50,
            spacing: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_closed_rows_are_not_searched() {
        let source = RecordingSource {
            queries: Mutex::new(Vec::new()),
            answer: vec![hit("org/x", 1)],
        };
        let records = vec![
            SourceRecord::new(0, "GPT-4", "OpenAI"),
            SourceRecord::new(1, "Llama-3", "Meta"),
        ];

        let file = collect_candidates(&records, &source, &ResolverConfig::default(), &no_spacing())
            .await
            .unwrap();

        assert_eq!(*source.queries.lock().unwrap(), vec!["llama-3".to_string()]);
        let skipped = &file["0"];
        assert_eq!(skipped.query, None);
        assert_eq!(skipped.note.as_deref(), Some(CLOSED_SOURCE_NOTE));
        assert!(skipped.candidates.is_empty());
    }

    #[tokio::test]
    async fn test_prefix_prefilter_and_limit() {
        let source = RecordingSource {
            queries: Mutex::new(Vec::new()),
            answer: vec![
                hit("other-org/llama-3-clone", 5000),
                hit("meta-llama/Llama-3-8B", 500),
                hit("meta-llama/Llama-3-70B", 900),
                hit("meta-llama/Llama-3-405B", 100),
            ],
        };
        let records = vec![SourceRecord::new(4, "Llama-3", "Meta")];
        let config = CollectorConfig {
            limit: 2,
            spacing: Duration::ZERO,
        };

        let file = collect_candidates(&records, &source, &ResolverConfig::default(), &config)
            .await
            .unwrap();

        let ids: Vec<&str> = candidates_for(&file, 4).iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["meta-llama/Llama-3-8B", "meta-llama/Llama-3-70B"]);
        assert!(candidates_for(&file, 99).is_empty());
    }

    #[tokio::test]
    async fn test_search_error_aborts() {
        let records = vec![SourceRecord::new(0, "Mixtral", "Mistral")];
        let result =
            collect_candidates(&records, &FailingSource, &ResolverConfig::default(), &no_spacing())
                .await;
        assert!(matches!(result, Err(HublinkError::Network { .. })));
    }

    #[test]
    fn test_candidate_file_json_shape() {
        let json = r#"{
  "0": {"row_id": 0, "model_name": "GPT-4", "provider": "OpenAI", "query": null,
        "candidates": [], "note": "closed_source_provider_skipped"},
  "1": {"row_id": 1, "model_name": "Llama-3", "provider": "Meta", "query": "llama-3",
        "candidates": [{"id": "meta-llama/Llama-3-8B", "likes": 1, "downloads": 2, "downloadsAllTime": 3}]}
}"#;
        let file: CandidateFile = serde_json::from_str(json).unwrap();
        assert_eq!(candidates_for(&file, 1)[0].downloads_all_time, Some(3));
        assert_eq!(file["1"].note, None);
    }
}
