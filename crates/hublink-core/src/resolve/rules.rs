//! Lookup tables that drive query building and candidate filtering.
//!
//! [`RuleSet`] is the serializable form (defaults compiled in, optionally
//! loaded from JSON). [`ResolverConfig`] is the compiled form handed to the
//! query builder and the resolver.

use crate::persist::atomic_read_json;
use crate::{HublinkError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maps a substring of the provider name to accepted identifier prefixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRule {
    /// Lowercase substring looked for in the normalized provider name.
    pub provider_contains: String,
    /// Identifier prefixes accepted for that provider (case-sensitive).
    pub prefixes: Vec<String>,
}

/// A product-line shorthand such as `llama-3`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRule {
    /// Regex that must match the whole normalized model name.
    pub pattern: String,
    /// Token template; `$1`, `$2`… expand capture groups.
    pub template: String,
}

/// Serializable rule tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub closed_providers: Vec<String>,
    pub prefix_rules: Vec<PrefixRule>,
    pub family_rules: Vec<FamilyRule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let prefix = |needle: &str, prefixes: &[&str]| PrefixRule {
            provider_contains: needle.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        };

        Self {
            closed_providers: ["openai", "google", "anthropic", "aws"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            prefix_rules: vec![
                prefix("meta", &["meta-llama/"]),
                prefix("deepseek", &["deepseek-ai/"]),
                prefix("mistral", &["mistralai/"]),
                prefix("cohere", &["CohereLabs/", "CohereForAI/", "Cohere/"]),
            ],
            family_rules: vec![FamilyRule {
                pattern: r"(llama)-(\d+)".to_string(),
                template: "$1-$2".to_string(),
            }],
        }
    }
}

impl RuleSet {
    /// Load a rule set from a JSON file. Missing sections fall back to the
    /// defaults.
    pub fn load(path: &Path) -> Result<Self> {
        atomic_read_json(path)?.ok_or_else(|| HublinkError::Config {
            message: format!("Rules file not found: {}", path.display()),
        })
    }
}

#[derive(Debug, Clone)]
struct CompiledFamilyRule {
    regex: Regex,
    template: String,
}

/// Compiled resolver configuration.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    closed_providers: Vec<String>,
    prefix_rules: Vec<PrefixRule>,
    family_rules: Vec<CompiledFamilyRule>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        // The built-in patterns are literals and always compile.
        Self::from_rules(&RuleSet::default()).unwrap_or_else(|_| Self {
            closed_providers: Vec::new(),
            prefix_rules: Vec::new(),
            family_rules: Vec::new(),
        })
    }
}

impl ResolverConfig {
    /// Compile a rule set. Family patterns are anchored on both ends.
    pub fn from_rules(rules: &RuleSet) -> Result<Self> {
        let family_rules = rules
            .family_rules
            .iter()
            .map(|rule| {
                let anchored = format!("^(?:{})$", rule.pattern);
                Regex::new(&anchored)
                    .map(|regex| CompiledFamilyRule {
                        regex,
                        template: rule.template.clone(),
                    })
                    .map_err(|e| HublinkError::Config {
                        message: format!("Invalid family pattern '{}': {}", rule.pattern, e),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            closed_providers: rules
                .closed_providers
                .iter()
                .map(|p| normalize(p))
                .collect(),
            prefix_rules: rules
                .prefix_rules
                .iter()
                .map(|r| PrefixRule {
                    provider_contains: normalize(&r.provider_contains),
                    prefixes: r.prefixes.clone(),
                })
                .collect(),
            family_rules,
        })
    }

    /// Whether the provider is a closed-source vendor.
    pub fn is_closed(&self, provider: &str) -> bool {
        let provider = normalize(provider);
        self.closed_providers.iter().any(|p| *p == provider)
    }

    /// Accepted identifier prefixes for a provider. Empty means unrestricted.
    pub fn prefixes_for(&self, provider: &str) -> &[String] {
        let provider = normalize(provider);
        self.prefix_rules
            .iter()
            .find(|rule| provider.contains(&rule.provider_contains))
            .map(|rule| rule.prefixes.as_slice())
            .unwrap_or(&[])
    }

    /// Family token for a model name, if any family rule matches.
    pub fn family_token(&self, model_name: &str) -> Option<String> {
        let name = normalize(model_name);
        self.family_rules.iter().find_map(|rule| {
            rule.regex.captures(&name).map(|caps| {
                let mut token = String::new();
                caps.expand(&rule.template, &mut token);
                token
            })
        })
    }
}

/// Trimmed lowercase form used for every comparison.
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_providers_case_insensitive() {
        let config = ResolverConfig::default();
        assert!(config.is_closed("OpenAI"));
        assert!(config.is_closed("  google "));
        assert!(config.is_closed("AWS"));
        assert!(!config.is_closed("Meta"));
        assert!(!config.is_closed("Google DeepMind"));
    }

    #[test]
    fn test_prefixes_by_provider_substring() {
        let config = ResolverConfig::default();
        assert_eq!(config.prefixes_for("Meta AI"), ["meta-llama/"]);
        assert_eq!(config.prefixes_for("DeepSeek"), ["deepseek-ai/"]);
        assert_eq!(
            config.prefixes_for("Cohere"),
            ["CohereLabs/", "CohereForAI/", "Cohere/"]
        );
        assert!(config.prefixes_for("Alibaba").is_empty());
    }

    #[test]
    fn test_family_token_default_rule() {
        let config = ResolverConfig::default();
        assert_eq!(config.family_token("Llama-3"), Some("llama-3".to_string()));
        assert_eq!(config.family_token("  LLAMA-31 "), Some("llama-31".to_string()));
        assert_eq!(config.family_token("Llama-3-70B"), None);
        assert_eq!(config.family_token("Mistral-7"), None);
    }

    #[test]
    fn test_family_rules_are_extensible() {
        let mut rules = RuleSet::default();
        rules.family_rules.push(FamilyRule {
            pattern: r"(qwen)\s*(\d+)".to_string(),
            template: "$1$2".to_string(),
        });
        let config = ResolverConfig::from_rules(&rules).unwrap();
        assert_eq!(config.family_token("Qwen 2"), Some("qwen2".to_string()));
        assert_eq!(config.family_token("Llama-2"), Some("llama-2".to_string()));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let rules = RuleSet {
            family_rules: vec![FamilyRule {
                pattern: "(unclosed".to_string(),
                template: "$1".to_string(),
            }],
            ..RuleSet::default()
        };
        assert!(matches!(
            ResolverConfig::from_rules(&rules),
            Err(HublinkError::Config { .. })
        ));
    }

    #[test]
    fn test_rule_set_partial_json_uses_defaults() {
        let rules: RuleSet = serde_json::from_str(r#"{"closed_providers": ["xai"]}"#).unwrap();
        assert_eq!(rules.closed_providers, vec!["xai".to_string()]);
        assert_eq!(rules.prefix_rules, RuleSet::default().prefix_rules);
    }
}
