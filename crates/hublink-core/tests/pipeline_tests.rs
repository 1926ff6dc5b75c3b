//! End-to-end runs of the pipeline with in-memory Hub sources.

use async_trait::async_trait;
use hublink_core::{
    Candidate, CandidateSource, CollectorConfig, FetchStatus, FetchedMetrics, HublinkError,
    MetricsSource, Pipeline, PipelinePaths, ResolverConfig, Result, RowFilter, Store,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;

const RAW_CSV: &str = "\
Model,Provider,Context Window,Speed (tokens/sec),Latency (sec),Benchmark (MMLU),\
Benchmark (Chatbot Arena),Open-Source,Price / Million Tokens,Training Dataset Size,\
Compute Power,Energy Efficiency,Quality Rating,Speed Rating,Price Rating
GPT-4,OpenAI,8000,50,1.5,86,1250,0,30,,,,9,5,2
Llama-3,Meta,8000,120,1.0,79,1200,1,0.5,15,100,0.8,8,7,9
Llama-3,Meta,128000,90,3.0,82,1210,1,0.9,15,120,0.7,8,6,8
Mixtral,Mistral,32000,110,0.8,70,1100,1,0.6,,,,7,8,9
Obscure Model,Acme,4000,,,,,,,,,,,,
";

/// Answers searches from a fixed table and records every query.
#[derive(Default)]
struct SpySearch {
    queries: Mutex<Vec<String>>,
}

fn hit(id: &str, downloads: u64, likes: u64) -> Candidate {
    Candidate {
        id: id.to_string(),
        likes: Some(likes),
        downloads: Some(downloads),
        downloads_all_time: None,
    }
}

#[async_trait]
impl CandidateSource for SpySearch {
    async fn search(&self, query: &str, _limit: usize) -> Result<Vec<Candidate>> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(match query {
            "llama-3" => vec![
                hit("community/llama-3-gguf", 99_999, 10),
                hit("meta-llama/Llama-3-8B", 500, 40),
                hit("meta-llama/Llama-3-70B", 900, 20),
            ],
            "Mixtral Mistral" => vec![hit("mistralai/Mixtral-8x7B", 700, 5)],
            _ => Vec::new(),
        })
    }
}

/// Counts live fetches; ids without a table entry come back as 404.
struct SpyMetrics {
    calls: AtomicUsize,
    answers: HashMap<&'static str, FetchedMetrics>,
}

impl SpyMetrics {
    fn new() -> Self {
        let mut answers = HashMap::new();
        answers.insert(
            "meta-llama/Llama-3-70B",
            FetchedMetrics {
                status: FetchStatus::Ok,
                likes: Some(2000),
                downloads: Some(90_000),
                downloads_all_time: Some(1_000_000),
            },
        );
        Self {
            calls: AtomicUsize::new(0),
            answers,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for SpyMetrics {
    async fn fetch_metrics(&self, repo_id: &str) -> Result<FetchedMetrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .answers
            .get(repo_id)
            .cloned()
            .unwrap_or_else(|| FetchedMetrics::failed(404)))
    }
}

fn create_test_pipeline() -> (Pipeline, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let paths = PipelinePaths::new(temp_dir.path());
    std::fs::create_dir_all(paths.source_csv.parent().unwrap()).unwrap();
    std::fs::write(&paths.source_csv, RAW_CSV).unwrap();

    let pipeline = Pipeline::new(paths, ResolverConfig::default())
        .with_collector(CollectorConfig {
            limit: 50,
            spacing: Duration::ZERO,
        })
        .with_metrics_spacing(Duration::ZERO);
    (pipeline, temp_dir)
}

#[tokio::test]
async fn test_full_run() {
    let (pipeline, _temp) = create_test_pipeline();
    let search = SpySearch::default();
    let metrics = SpyMetrics::new();

    let summary = pipeline.run_all(&search, &metrics).await.unwrap();

    assert_eq!(summary.clean.rows, 5);

    // OpenAI is never searched.
    assert_eq!(summary.candidates.skipped_closed, 1);
    assert_eq!(
        *search.queries.lock().unwrap(),
        vec!["llama-3", "llama-3", "Mixtral Mistral", "Obscure Model Acme"]
    );

    let integrate = summary.integrate;
    assert_eq!(integrate.rows, 5);
    assert_eq!(integrate.resolved, 3);
    assert_eq!(integrate.closed_source, 1);
    assert_eq!(integrate.no_match, 1);
    assert_eq!(integrate.repos_referenced, 2);
    assert_eq!(integrate.live_fetches, 2);
    assert_eq!(integrate.failed_fetches, 1);
    assert_eq!(integrate.enriched_rows, 2);
    assert_eq!(integrate.repos, 1);

    assert_eq!(summary.store.rows, 2);
    assert_eq!(summary.store.repos, 1);

    let map = std::fs::read_to_string(&pipeline.paths().resolution_map_csv).unwrap();
    assert!(map.contains("1,Llama-3,Meta,meta-llama/Llama-3-70B,resolved"));
    assert!(map.contains("0,GPT-4,OpenAI,,closed_source_skipped"));
    assert!(map.contains("4,Obscure Model,Acme,,no_match"));

    let store = Store::open_existing(&pipeline.paths().database).unwrap();
    let detail = store.repo_detail("meta-llama/Llama-3-70B").unwrap().unwrap();
    assert_eq!(detail.repo.n_rows, 2);
    assert_eq!(detail.repo.provider.as_deref(), Some("Meta"));
    assert_eq!(detail.repo.context_window, Some(128000.0));
    assert_eq!(detail.repo.latency_sec, Some(2.0));
    assert_eq!(detail.repo.hf_downloads, Some(90_000));

    // The failed Mixtral fetch keeps its row out of the tables.
    assert!(store.repo_detail("mistralai/Mixtral-8x7B").unwrap().is_none());
    let mistral = store
        .list_rows(&RowFilter {
            provider: Some("Mistral".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert!(mistral.is_empty());
}

#[tokio::test]
async fn test_integrate_rerun_uses_cache() {
    let (pipeline, _temp) = create_test_pipeline();
    let search = SpySearch::default();
    let metrics = SpyMetrics::new();

    pipeline.run_all(&search, &metrics).await.unwrap();
    assert_eq!(metrics.calls(), 2);

    let again = pipeline.integrate(&metrics).await.unwrap();
    assert_eq!(again.live_fetches, 0);
    assert_eq!(metrics.calls(), 2);

    // Forgetting the failed entry makes the next run ask again.
    let mut cache = pipeline.open_metrics_cache().unwrap();
    assert_eq!(
        cache.get("mistralai/Mixtral-8x7B").map(|e| e.status),
        Some(FetchStatus::Http(404))
    );
    assert!(cache.forget("mistralai/Mixtral-8x7B").unwrap());

    let third = pipeline.integrate(&metrics).await.unwrap();
    assert_eq!(third.live_fetches, 1);
    assert_eq!(metrics.calls(), 3);
}

#[tokio::test]
async fn test_missing_inputs_fail_before_network() {
    let temp_dir = TempDir::new().unwrap();
    let pipeline = Pipeline::new(PipelinePaths::new(temp_dir.path()), ResolverConfig::default());
    let search = SpySearch::default();
    let metrics = SpyMetrics::new();

    let result = pipeline.collect_candidates(&search).await;
    match result {
        Err(HublinkError::MissingArtifact { path, hint }) => {
            assert!(path.ends_with("source_clean.csv"));
            assert!(hint.contains("hublink clean"));
        }
        other => panic!("expected MissingArtifact, got {:?}", other),
    }

    let result = pipeline.integrate(&metrics).await;
    assert!(matches!(result, Err(HublinkError::MissingArtifact { .. })));

    let result = pipeline.run_all(&search, &metrics).await;
    assert!(matches!(result, Err(HublinkError::MissingArtifact { .. })));

    assert!(search.queries.lock().unwrap().is_empty());
    assert_eq!(metrics.calls(), 0);
}
