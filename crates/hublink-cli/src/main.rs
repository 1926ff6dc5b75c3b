//! hublink - benchmark to Hugging Face Hub linking pipeline.
//!
//! Each pipeline stage is a subcommand; `run` chains them. `serve` exposes
//! the stored tables over a small read-only HTTP API.

mod handler;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hublink_core::pipeline::import_source;
use hublink_core::{
    HubClient, HubClientConfig, Pipeline, PipelinePaths, ResolverConfig, RuleSet, Store,
};
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "hublink")]
#[command(about = "Link LLM benchmark rows to Hugging Face Hub repositories")]
struct Args {
    /// Data directory holding raw/ and processed/
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    /// Hub API base URL
    #[arg(long, global = true)]
    hub_url: Option<String>,

    /// JSON rule set overriding the built-in resolver rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean the raw benchmark dataset
    Clean {
        /// Copy this CSV into the data directory first
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Search the Hub for candidates for every row
    Candidates,
    /// Resolve rows, fetch metrics and build the row/repo tables
    Integrate,
    /// Load the row/repo tables into SQLite
    Store,
    /// Run every stage in order
    Run {
        /// Copy this CSV into the data directory first
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Serve the stored tables over HTTP
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on (0 = auto-assign)
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },
    /// Inspect or edit the metrics cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
    /// List cached entries
    List,
    /// Drop one entry so the next `integrate` fetches it again
    Forget { repo_id: String },
}

fn load_rules(path: Option<&Path>) -> Result<ResolverConfig> {
    match path {
        Some(path) => {
            let rules = RuleSet::load(path)
                .with_context(|| format!("Failed to load rules from {}", path.display()))?;
            Ok(ResolverConfig::from_rules(&rules)?)
        }
        None => Ok(ResolverConfig::default()),
    }
}

fn hub_client(hub_url: Option<&str>) -> Result<HubClient> {
    let mut config = HubClientConfig::default();
    if let Some(url) = hub_url {
        config.base_url = url.to_string();
    }
    Ok(HubClient::with_config(config)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let paths = PipelinePaths::new(&args.data_dir);
    info!("Data directory: {}", paths.data_dir.display());

    let rules = load_rules(args.rules.as_deref())?;
    let pipeline = Pipeline::new(paths.clone(), rules);

    match args.command {
        Command::Clean { input } => {
            if let Some(input) = input {
                import_source(&paths, &input)?;
            }
            pipeline.clean()?;
        }
        Command::Candidates => {
            let hub = hub_client(args.hub_url.as_deref())?;
            pipeline.collect_candidates(&hub).await?;
        }
        Command::Integrate => {
            let hub = hub_client(args.hub_url.as_deref())?;
            pipeline.integrate(&hub).await?;
        }
        Command::Store => {
            pipeline.store()?;
        }
        Command::Run { input } => {
            if let Some(input) = input {
                import_source(&paths, &input)?;
            }
            let hub = hub_client(args.hub_url.as_deref())?;
            let summary = pipeline.run_all(&hub, &hub).await?;
            info!(
                "Pipeline finished: {} rows, {} enriched, {} repos",
                summary.clean.rows, summary.integrate.enriched_rows, summary.integrate.repos
            );
        }
        Command::Serve { host, port } => {
            let store = Store::open_existing(&paths.database)?;
            let addr = server::start_server(store, &host, port).await?;
            info!("Query server running on http://{}", addr);

            tokio::signal::ctrl_c().await?;
            info!("Shutdown signal received, exiting");
        }
        Command::Cache { action } => {
            let mut cache = pipeline.open_metrics_cache()?;
            match action {
                CacheCommand::List => {
                    // Intentional stdout: the listing is the command's output.
                    for entry in cache.entries() {
                        println!(
                            "{}\t{}\t{}",
                            entry.repo_id,
                            entry.status,
                            entry
                                .downloads
                                .map(|d| d.to_string())
                                .unwrap_or_else(|| "-".to_string())
                        );
                    }
                    info!("{} cached entries in {}", cache.len(), cache.path().display());
                }
                CacheCommand::Forget { repo_id } => {
                    if !cache.forget(&repo_id)? {
                        info!("No cached entry for {}", repo_id);
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "hublink",
            "cache",
            "forget",
            "meta-llama/Llama-3-8B",
            "--data-dir",
            "/tmp/hub",
        ])
        .unwrap();
        assert_eq!(args.data_dir, PathBuf::from("/tmp/hub"));
        match args.command {
            Command::Cache {
                action: CacheCommand::Forget { repo_id },
            } => assert_eq!(repo_id, "meta-llama/Llama-3-8B"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_load_rules_rejects_bad_pattern() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("rules.json");
        std::fs::write(
            &path,
            r#"{"family_rules": [{"pattern": "(unclosed", "template": "$1"}]}"#,
        )
        .unwrap();
        assert!(load_rules(Some(&path)).is_err());
        assert!(load_rules(None).is_ok());
    }

    #[test]
    fn test_hub_client_url_override() {
        let hub = hub_client(Some("http://127.0.0.1:9/api/")).unwrap();
        assert_eq!(hub.base_url(), "http://127.0.0.1:9/api");
    }
}
