//! Resolution of benchmark rows to canonical Hub identifiers.
//!
//! - [`rules`] - Closed providers, prefix allowlists and family patterns
//! - [`query`] - Search query construction
//! - [`resolver`] - Candidate filtering and ranking

pub mod query;
pub mod resolver;
pub mod rules;

pub use query::build_query;
pub use resolver::{resolve, Resolution, ResolutionRecord, UnresolvedReason};
pub use rules::{FamilyRule, PrefixRule, ResolverConfig, RuleSet};

pub(crate) use resolver::allowed_by_prefixes;
