//! Candidate filtering and ranking.
//!
//! [`resolve`] is a pure function of the record, its candidate list and the
//! rule tables. It never fails: a row that cannot be linked ends up as
//! [`Resolution::Unresolved`] with the reason attached.

use super::rules::ResolverConfig;
use crate::records::SourceRecord;
use crate::registry::Candidate;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use tracing::debug;

/// Why a row has no canonical identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// Provider is on the closed-source list; candidates were not consulted.
    ClosedSource,
    /// No candidate survived filtering.
    NoMatch,
}

/// Outcome of resolving one source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(String),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    /// The canonical identifier, if resolved.
    pub fn repo_id(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(id) => Some(id),
            Resolution::Unresolved(_) => None,
        }
    }

    /// Label stored in the resolution map.
    pub fn status_label(&self) -> &'static str {
        match self {
            Resolution::Resolved(_) => "resolved",
            Resolution::Unresolved(UnresolvedReason::ClosedSource) => "closed_source_skipped",
            Resolution::Unresolved(UnresolvedReason::NoMatch) => "no_match",
        }
    }
}

/// One row of the persisted resolution map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub row_id: u64,
    pub model_name: String,
    pub provider: String,
    /// Empty when unresolved.
    pub repo_id: String,
    pub status: String,
}

impl ResolutionRecord {
    pub fn new(record: &SourceRecord, resolution: &Resolution) -> Self {
        Self {
            row_id: record.row_id,
            model_name: record.model_name.clone(),
            provider: record.provider.clone(),
            repo_id: resolution.repo_id().unwrap_or_default().to_string(),
            status: resolution.status_label().to_string(),
        }
    }
}

/// Whether an identifier passes the provider prefix allowlist.
pub(crate) fn allowed_by_prefixes(repo_id: &str, prefixes: &[String]) -> bool {
    prefixes.is_empty() || prefixes.iter().any(|p| repo_id.starts_with(p.as_str()))
}

/// Resolve a source row to at most one canonical identifier.
pub fn resolve(
    record: &SourceRecord,
    candidates: &[Candidate],
    config: &ResolverConfig,
) -> Resolution {
    if config.is_closed(&record.provider) {
        debug!(row_id = record.row_id, "Closed-source provider, skipping");
        return Resolution::Unresolved(UnresolvedReason::ClosedSource);
    }

    let prefixes = config.prefixes_for(&record.provider);
    let token = config.family_token(&record.model_name);

    let mut survivors: Vec<&Candidate> = candidates
        .iter()
        .filter(|c| {
            let id = c.id.trim();
            if id.is_empty() || !allowed_by_prefixes(id, prefixes) {
                return false;
            }
            match &token {
                Some(token) => id.to_lowercase().contains(token.as_str()),
                None => true,
            }
        })
        .collect();

    // Stable sort: equal keys keep the search order.
    survivors.sort_by_key(|c| Reverse(c.rank_key()));

    match survivors.first().map(|c| c.id.trim()) {
        Some(id) if !id.is_empty() => {
            debug!(row_id = record.row_id, repo_id = id, "Resolved");
            Resolution::Resolved(id.to_string())
        }
        _ => {
            debug!(
                row_id = record.row_id,
                candidates = candidates.len(),
                "No candidate passed filtering"
            );
            Resolution::Unresolved(UnresolvedReason::NoMatch)
        }
    }
}
