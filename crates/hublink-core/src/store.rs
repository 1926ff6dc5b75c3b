//! SQLite persistence for the enriched and aggregated tables.
//!
//! Tables are replaced wholesale on every write inside one transaction, so
//! readers see either the previous or the new contents. Reads back the
//! query service.

use crate::aggregate::AggregateRecord;
use crate::config::QueryConfig;
use crate::enrich::EnrichedRecord;
use crate::error::{HublinkError, Result};
use crate::registry::FetchStatus;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

const SCHEMA: &str = "
    DROP TABLE IF EXISTS llm_row;
    DROP TABLE IF EXISTS llm_repo;

    CREATE TABLE llm_row (
        row_id INTEGER NOT NULL,
        model_name TEXT NOT NULL,
        provider TEXT NOT NULL,
        context_window REAL,
        speed_tokens_per_sec REAL,
        latency_sec REAL,
        benchmark_mmlu REAL,
        benchmark_chatbot_arena REAL,
        open_source REAL,
        price_per_million_tokens REAL,
        training_dataset_size REAL,
        compute_power REAL,
        energy_efficiency REAL,
        quality_rating REAL,
        speed_rating REAL,
        price_rating REAL,
        hf_repo_id TEXT NOT NULL,
        hf_status TEXT NOT NULL,
        hf_likes INTEGER,
        hf_downloads INTEGER,
        hf_downloads_all_time INTEGER
    );

    CREATE TABLE llm_repo (
        hf_repo_id TEXT NOT NULL,
        provider TEXT,
        n_rows INTEGER NOT NULL,
        context_window REAL,
        speed_tokens_per_sec REAL,
        latency_sec REAL,
        benchmark_mmlu REAL,
        benchmark_chatbot_arena REAL,
        price_per_million_tokens REAL,
        training_dataset_size REAL,
        compute_power REAL,
        energy_efficiency REAL,
        quality_rating REAL,
        speed_rating REAL,
        price_rating REAL,
        open_source REAL,
        hf_status TEXT NOT NULL,
        hf_likes INTEGER,
        hf_downloads INTEGER,
        hf_downloads_all_time INTEGER
    );
";

const INDEXES: &str = "
    CREATE UNIQUE INDEX idx_llm_row_row_id ON llm_row(row_id);
    CREATE INDEX idx_llm_row_provider ON llm_row(provider);
    CREATE INDEX idx_llm_row_context_window ON llm_row(context_window);
    CREATE INDEX idx_llm_row_hf_repo_id ON llm_row(hf_repo_id);

    CREATE UNIQUE INDEX idx_llm_repo_hf_repo_id ON llm_repo(hf_repo_id);
    CREATE INDEX idx_llm_repo_provider ON llm_repo(provider);
    CREATE INDEX idx_llm_repo_context_window ON llm_repo(context_window);
";

const ROW_SUMMARY_COLUMNS: &str = "row_id, model_name, provider, context_window, latency_sec,
    speed_tokens_per_sec, benchmark_mmlu, benchmark_chatbot_arena,
    hf_repo_id, hf_status, hf_likes, hf_downloads, hf_downloads_all_time";

const REPO_COLUMNS: &str = "hf_repo_id, provider, n_rows, context_window,
    speed_tokens_per_sec, latency_sec, benchmark_mmlu, benchmark_chatbot_arena,
    price_per_million_tokens, training_dataset_size, compute_power,
    energy_efficiency, quality_rating, speed_rating, price_rating, open_source,
    hf_status, hf_likes, hf_downloads, hf_downloads_all_time";

/// Row-level listing entry returned by [`Store::list_rows`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSummary {
    pub row_id: u64,
    pub model_name: String,
    pub provider: String,
    pub context_window: Option<f64>,
    pub latency_sec: Option<f64>,
    pub speed_tokens_per_sec: Option<f64>,
    pub benchmark_mmlu: Option<f64>,
    pub benchmark_chatbot_arena: Option<f64>,
    pub hf_repo_id: String,
    pub hf_status: FetchStatus,
    pub hf_likes: Option<u64>,
    pub hf_downloads: Option<u64>,
    pub hf_downloads_all_time: Option<u64>,
}

/// One aggregate together with the rows it was built from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepoDetail {
    #[serde(flatten)]
    pub repo: AggregateRecord,
    pub rows: Vec<RowSummary>,
}

/// Per-provider averages over the row-level table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSummary {
    pub provider: String,
    pub n_rows: u64,
    pub avg_context_window: Option<f64>,
    pub avg_latency_sec: Option<f64>,
    pub avg_speed_tokens_per_sec: Option<f64>,
    pub avg_benchmark_mmlu: Option<f64>,
}

/// Filters for [`Store::list_rows`]. Empty provider means no filter.
#[derive(Debug, Clone, Default)]
pub struct RowFilter {
    pub provider: Option<String>,
    pub min_context_window: Option<f64>,
    pub max_context_window: Option<f64>,
    pub limit: Option<i64>,
}

/// SQLite database holding `llm_row` and `llm_repo`.
#[derive(Clone)]
pub struct Store {
    db_path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create or open a database at the given path.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| HublinkError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(&db_path)?;
        conn.execute_batch(
            "
            PRAGMA busy_timeout=30000;
            PRAGMA temp_store=MEMORY;
            ",
        )?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a database that a previous `store` stage must have written.
    pub fn open_existing(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if !db_path.is_file() {
            return Err(HublinkError::missing_artifact(db_path, "store"));
        }
        Self::open(db_path)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| HublinkError::Database {
            message: "Failed to acquire connection lock".to_string(),
            source: None,
        })
    }

    /// Replace both tables with the given contents in one transaction.
    pub fn replace_tables(&self, rows: &[EnrichedRecord], repos: &[AggregateRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute_batch(SCHEMA)?;

        {
            let mut insert = tx.prepare(
                "INSERT INTO llm_row VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                  ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)",
            )?;
            for r in rows {
                insert.execute(params![
                    r.row_id,
                    r.model_name,
                    r.provider,
                    r.context_window,
                    r.speed_tokens_per_sec,
                    r.latency_sec,
                    r.benchmark_mmlu,
                    r.benchmark_chatbot_arena,
                    r.open_source,
                    r.price_per_million_tokens,
                    r.training_dataset_size,
                    r.compute_power,
                    r.energy_efficiency,
                    r.quality_rating,
                    r.speed_rating,
                    r.price_rating,
                    r.hf_repo_id,
                    r.hf_status.to_string(),
                    r.hf_likes,
                    r.hf_downloads,
                    r.hf_downloads_all_time,
                ])?;
            }

            let mut insert = tx.prepare(
                "INSERT INTO llm_repo VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                  ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
            )?;
            for a in repos {
                insert.execute(params![
                    a.hf_repo_id,
                    a.provider,
                    a.n_rows,
                    a.context_window,
                    a.speed_tokens_per_sec,
                    a.latency_sec,
                    a.benchmark_mmlu,
                    a.benchmark_chatbot_arena,
                    a.price_per_million_tokens,
                    a.training_dataset_size,
                    a.compute_power,
                    a.energy_efficiency,
                    a.quality_rating,
                    a.speed_rating,
                    a.price_rating,
                    a.open_source,
                    a.hf_status.to_string(),
                    a.hf_likes,
                    a.hf_downloads,
                    a.hf_downloads_all_time,
                ])?;
            }
        }

        tx.execute_batch(INDEXES)?;
        tx.commit()?;

        info!(
            "Stored {} rows and {} repos in {}",
            rows.len(),
            repos.len(),
            self.db_path.display()
        );
        Ok(())
    }

    /// Row-level listing ordered by context window, largest first.
    pub fn list_rows(&self, filter: &RowFilter) -> Result<Vec<RowSummary>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(provider) = non_blank(filter.provider.as_deref()) {
            clauses.push("provider = ?");
            values.push(Value::Text(provider.to_string()));
        }
        if let Some(min) = filter.min_context_window {
            clauses.push("context_window >= ?");
            values.push(Value::Real(min));
        }
        if let Some(max) = filter.max_context_window {
            clauses.push("context_window <= ?");
            values.push(Value::Real(max));
        }
        values.push(Value::Integer(QueryConfig::clamp_limit(filter.limit)));

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {} FROM llm_row{} ORDER BY context_window DESC LIMIT ?",
            ROW_SUMMARY_COLUMNS, where_sql
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values), row_to_summary)?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("list_rows returned {} rows", rows.len());
        Ok(rows)
    }

    /// Aggregate plus contributing rows, or `None` for an unknown id.
    pub fn repo_detail(&self, hf_repo_id: &str) -> Result<Option<RepoDetail>> {
        let hf_repo_id = hf_repo_id.trim();
        let conn = self.lock()?;

        let repo = conn
            .query_row(
                &format!("SELECT {} FROM llm_repo WHERE hf_repo_id = ?1", REPO_COLUMNS),
                params![hf_repo_id],
                row_to_aggregate,
            )
            .optional()?;

        let Some(repo) = repo else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM llm_row WHERE hf_repo_id = ?1 ORDER BY context_window DESC",
            ROW_SUMMARY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![hf_repo_id], row_to_summary)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(RepoDetail { repo, rows }))
    }

    /// Per-provider row counts and averages, most rows first.
    pub fn provider_summary(&self) -> Result<Vec<ProviderSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT
                provider,
                COUNT(*) AS n_rows,
                AVG(context_window),
                AVG(latency_sec),
                AVG(speed_tokens_per_sec),
                AVG(benchmark_mmlu)
             FROM llm_row
             GROUP BY provider
             ORDER BY n_rows DESC, provider",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProviderSummary {
                    provider: row.get(0)?,
                    n_rows: row.get(1)?,
                    avg_context_window: row.get(2)?,
                    avg_latency_sec: row.get(3)?,
                    avg_speed_tokens_per_sec: row.get(4)?,
                    avg_benchmark_mmlu: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Aggregates ordered by downloads, optionally for one provider.
    pub fn list_repos(&self, provider: Option<&str>, limit: Option<i64>) -> Result<Vec<AggregateRecord>> {
        let limit = QueryConfig::clamp_limit(limit);
        let conn = self.lock()?;

        let repos = match non_blank(provider) {
            Some(provider) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM llm_repo WHERE provider = ?1
                     ORDER BY hf_downloads DESC LIMIT ?2",
                    REPO_COLUMNS
                ))?;
                let rows = stmt.query_map(params![provider, limit], row_to_aggregate)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM llm_repo ORDER BY hf_downloads DESC LIMIT ?1",
                    REPO_COLUMNS
                ))?;
                let rows = stmt.query_map(params![limit], row_to_aggregate)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(repos)
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn status_at(row: &Row, idx: usize) -> rusqlite::Result<FetchStatus> {
    let raw: String = row.get(idx)?;
    FetchStatus::try_from(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_summary(row: &Row) -> rusqlite::Result<RowSummary> {
    Ok(RowSummary {
        row_id: row.get(0)?,
        model_name: row.get(1)?,
        provider: row.get(2)?,
        context_window: row.get(3)?,
        latency_sec: row.get(4)?,
        speed_tokens_per_sec: row.get(5)?,
        benchmark_mmlu: row.get(6)?,
        benchmark_chatbot_arena: row.get(7)?,
        hf_repo_id: row.get(8)?,
        hf_status: status_at(row, 9)?,
        hf_likes: row.get(10)?,
        hf_downloads: row.get(11)?,
        hf_downloads_all_time: row.get(12)?,
    })
}

fn row_to_aggregate(row: &Row) -> rusqlite::Result<AggregateRecord> {
    Ok(AggregateRecord {
        hf_repo_id: row.get(0)?,
        provider: row.get(1)?,
        n_rows: row.get(2)?,
        context_window: row.get(3)?,
        speed_tokens_per_sec: row.get(4)?,
        latency_sec: row.get(5)?,
        benchmark_mmlu: row.get(6)?,
        benchmark_chatbot_arena: row.get(7)?,
        price_per_million_tokens: row.get(8)?,
        training_dataset_size: row.get(9)?,
        compute_power: row.get(10)?,
        energy_efficiency: row.get(11)?,
        quality_rating: row.get(12)?,
        speed_rating: row.get(13)?,
        price_rating: row.get(14)?,
        open_source: row.get(15)?,
        hf_status: status_at(row, 16)?,
        hf_likes: row.get(17)?,
        hf_downloads: row.get(18)?,
        hf_downloads_all_time: row.get(19)?,
    })
}
