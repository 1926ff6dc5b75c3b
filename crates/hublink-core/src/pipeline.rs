//! Stage orchestration.
//!
//! Every stage reads its inputs from the data directory, checks they exist
//! before doing any work, writes its outputs atomically and returns a small
//! summary. Stages can be rerun independently; the metrics cache makes
//! `integrate` resumable after an interrupted run.

use crate::aggregate::{aggregate, AggregateRecord};
use crate::candidates::{collect_candidates, CandidateFile, CollectorConfig};
use crate::config::{NetworkConfig, PathsConfig};
use crate::enrich::{
    fill_cache, join_enriched, referenced_repo_ids, resolution_map, resolve_records,
    EnrichedRecord,
};
use crate::error::{HublinkError, Result};
use crate::metrics_cache::MetricsCache;
use crate::persist::{atomic_read_json, atomic_write_json, read_csv, require_input, write_csv};
use crate::records::{clean_source, load_records};
use crate::registry::{CandidateSource, MetricsSource};
use crate::resolve::{Resolution, ResolverConfig, UnresolvedReason};
use crate::store::Store;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Every artifact location, derived from one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub data_dir: PathBuf,
    pub source_csv: PathBuf,
    pub clean_csv: PathBuf,
    pub candidates_json: PathBuf,
    pub resolution_map_csv: PathBuf,
    pub metrics_cache_json: PathBuf,
    pub row_level_csv: PathBuf,
    pub repo_level_csv: PathBuf,
    pub database: PathBuf,
}

impl PipelinePaths {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let raw = data_dir.join(PathsConfig::RAW_DIR_NAME);
        let processed = data_dir.join(PathsConfig::PROCESSED_DIR_NAME);

        Self {
            source_csv: raw.join(PathsConfig::SOURCE_CSV),
            candidates_json: raw.join(PathsConfig::CANDIDATES_JSON),
            metrics_cache_json: raw.join(PathsConfig::METRICS_CACHE_JSON),
            clean_csv: processed.join(PathsConfig::CLEAN_CSV),
            resolution_map_csv: processed.join(PathsConfig::RESOLUTION_MAP_CSV),
            row_level_csv: processed.join(PathsConfig::ROW_LEVEL_CSV),
            repo_level_csv: processed.join(PathsConfig::REPO_LEVEL_CSV),
            database: processed.join(PathsConfig::DATABASE_FILE),
            data_dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanSummary {
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidatesSummary {
    pub rows: usize,
    pub searched: usize,
    pub skipped_closed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrateSummary {
    pub rows: usize,
    pub resolved: usize,
    pub closed_source: usize,
    pub no_match: usize,
    pub repos_referenced: usize,
    pub live_fetches: usize,
    pub failed_fetches: usize,
    pub enriched_rows: usize,
    pub repos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSummary {
    pub rows: usize,
    pub repos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub clean: CleanSummary,
    pub candidates: CandidatesSummary,
    pub integrate: IntegrateSummary,
    pub store: StoreSummary,
}

/// The four pipeline stages over one data directory.
#[derive(Debug, Clone)]
pub struct Pipeline {
    paths: PipelinePaths,
    rules: ResolverConfig,
    collector: CollectorConfig,
    metrics_spacing: Duration,
}

impl Pipeline {
    pub fn new(paths: PipelinePaths, rules: ResolverConfig) -> Self {
        Self {
            paths,
            rules,
            collector: CollectorConfig::default(),
            metrics_spacing: NetworkConfig::METRICS_FETCH_SPACING,
        }
    }

    pub fn with_collector(mut self, collector: CollectorConfig) -> Self {
        self.collector = collector;
        self
    }

    pub fn with_metrics_spacing(mut self, spacing: Duration) -> Self {
        self.metrics_spacing = spacing;
        self
    }

    pub fn paths(&self) -> &PipelinePaths {
        &self.paths
    }

    /// Open the metrics cache this pipeline uses.
    pub fn open_metrics_cache(&self) -> Result<MetricsCache> {
        Ok(MetricsCache::open(&self.paths.metrics_cache_json)?.with_fetch_spacing(self.metrics_spacing))
    }

    /// Raw dataset -> cleaned source table.
    pub fn clean(&self) -> Result<CleanSummary> {
        require_input(&self.paths.source_csv, "clean --input <csv>")?;

        let records = clean_source(&self.paths.source_csv)?;
        write_csv(&self.paths.clean_csv, &records)?;

        let summary = CleanSummary {
            rows: records.len(),
        };
        info!("clean: {} rows -> {}", summary.rows, self.paths.clean_csv.display());
        Ok(summary)
    }

    /// Cleaned source table -> candidates file.
    pub async fn collect_candidates(&self, source: &dyn CandidateSource) -> Result<CandidatesSummary> {
        require_input(&self.paths.clean_csv, "clean")?;

        let records = load_records(&self.paths.clean_csv)?;
        let file = collect_candidates(&records, source, &self.rules, &self.collector).await?;
        atomic_write_json(&self.paths.candidates_json, &file)?;

        let skipped_closed = file.values().filter(|r| r.query.is_none()).count();
        let summary = CandidatesSummary {
            rows: file.len(),
            searched: file.len() - skipped_closed,
            skipped_closed,
        };
        info!(
            "candidates: {} rows, {} searched, {} closed-source skipped",
            summary.rows, summary.searched, summary.skipped_closed
        );
        Ok(summary)
    }

    /// Resolve, fill the metrics cache, enrich and aggregate.
    pub async fn integrate(&self, metrics: &dyn MetricsSource) -> Result<IntegrateSummary> {
        require_input(&self.paths.clean_csv, "clean")?;
        require_input(&self.paths.candidates_json, "candidates")?;

        let records = load_records(&self.paths.clean_csv)?;
        let candidates: CandidateFile = atomic_read_json(&self.paths.candidates_json)?
            .ok_or_else(|| HublinkError::missing_artifact(&self.paths.candidates_json, "candidates"))?;

        let resolutions = resolve_records(&records, &candidates, &self.rules);
        write_csv(&self.paths.resolution_map_csv, &resolution_map(&records, &resolutions))?;

        let repo_ids = referenced_repo_ids(&resolutions);
        let mut cache = self.open_metrics_cache()?;
        let fill = fill_cache(&repo_ids, &mut cache, metrics).await?;

        let enriched = join_enriched(&records, &resolutions, &cache);
        let repos = aggregate(&enriched);
        write_csv(&self.paths.row_level_csv, &enriched)?;
        write_csv(&self.paths.repo_level_csv, &repos)?;

        let count = |reason: UnresolvedReason| {
            resolutions
                .iter()
                .filter(|r| **r == Resolution::Unresolved(reason))
                .count()
        };
        let summary = IntegrateSummary {
            rows: records.len(),
            resolved: repo_ids_resolved(&resolutions),
            closed_source: count(UnresolvedReason::ClosedSource),
            no_match: count(UnresolvedReason::NoMatch),
            repos_referenced: fill.referenced,
            live_fetches: fill.fetched,
            failed_fetches: fill.failed,
            enriched_rows: enriched.len(),
            repos: repos.len(),
        };
        info!(
            "integrate: {}/{} rows resolved ({} closed-source, {} no match), {} enriched rows, {} repos",
            summary.resolved,
            summary.rows,
            summary.closed_source,
            summary.no_match,
            summary.enriched_rows,
            summary.repos
        );
        Ok(summary)
    }

    /// Row and repo tables -> SQLite.
    pub fn store(&self) -> Result<StoreSummary> {
        require_input(&self.paths.row_level_csv, "integrate")?;
        require_input(&self.paths.repo_level_csv, "integrate")?;

        let rows: Vec<EnrichedRecord> = read_csv(&self.paths.row_level_csv)?;
        let repos: Vec<AggregateRecord> = read_csv(&self.paths.repo_level_csv)?;

        Store::open(&self.paths.database)?.replace_tables(&rows, &repos)?;

        let summary = StoreSummary {
            rows: rows.len(),
            repos: repos.len(),
        };
        info!(
            "store: {} rows, {} repos -> {}",
            summary.rows,
            summary.repos,
            self.paths.database.display()
        );
        Ok(summary)
    }

    /// Run every stage in order.
    pub async fn run_all(
        &self,
        search: &dyn CandidateSource,
        metrics: &dyn MetricsSource,
    ) -> Result<RunSummary> {
        let clean = self.clean()?;
        let candidates = self.collect_candidates(search).await?;
        let integrate = self.integrate(metrics).await?;
        let store = self.store()?;
        Ok(RunSummary {
            clean,
            candidates,
            integrate,
            store,
        })
    }
}

fn repo_ids_resolved(resolutions: &[Resolution]) -> usize {
    resolutions.iter().filter(|r| r.repo_id().is_some()).count()
}

/// Copy a raw dataset into place so `clean` can find it.
pub fn import_source(paths: &PipelinePaths, input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(HublinkError::Validation {
            field: "input".to_string(),
            message: format!("{} is not a file", input.display()),
        });
    }
    let bytes = std::fs::read(input).map_err(|e| HublinkError::io_with_path(e, input))?;
    crate::persist::atomic_write_bytes(&paths.source_csv, &bytes)?;
    info!("Imported {} -> {}", input.display(), paths.source_csv.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_layout() {
        let paths = PipelinePaths::new("/data");
        assert_eq!(paths.source_csv, Path::new("/data/raw/llm_comparison_dataset.csv"));
        assert_eq!(paths.candidates_json, Path::new("/data/raw/hf_candidates_by_row.json"));
        assert_eq!(paths.metrics_cache_json, Path::new("/data/raw/hf_metrics_by_repo.json"));
        assert_eq!(paths.clean_csv, Path::new("/data/processed/source_clean.csv"));
        assert_eq!(paths.resolution_map_csv, Path::new("/data/processed/resolution_map.csv"));
        assert_eq!(paths.row_level_csv, Path::new("/data/processed/merged_row_level.csv"));
        assert_eq!(paths.repo_level_csv, Path::new("/data/processed/merged_repo_level.csv"));
        assert_eq!(paths.database, Path::new("/data/processed/llm_context.db"));
    }

    #[test]
    fn test_store_requires_integrate_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = Pipeline::new(PipelinePaths::new(temp_dir.path()), ResolverConfig::default());

        match pipeline.store() {
            Err(HublinkError::MissingArtifact { path, hint }) => {
                assert!(path.ends_with("merged_row_level.csv"));
                assert!(hint.contains("hublink integrate"));
            }
            other => panic!("expected MissingArtifact, got {:?}", other),
        }
    }

    #[test]
    fn test_import_source() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("download.csv");
        std::fs::write(&input, "Model,Provider\nA,B\n").unwrap();

        let paths = PipelinePaths::new(temp_dir.path().join("data"));
        import_source(&paths, &input).unwrap();
        assert_eq!(
            std::fs::read_to_string(&paths.source_csv).unwrap(),
            "Model,Provider\nA,B\n"
        );

        let missing = import_source(&paths, &temp_dir.path().join("nope.csv"));
        assert!(matches!(missing, Err(HublinkError::Validation { .. })));
    }
}
