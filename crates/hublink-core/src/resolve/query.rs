//! Search query construction for a benchmark row.

use super::rules::ResolverConfig;

/// Build the registry search query for a model/provider pair.
///
/// A recognized family shorthand (e.g. `Llama-3`) is searched as its family
/// token alone; anything else is searched as `"<model> <provider>"`. The
/// lowercase form is only used for matching, the fallback query keeps the
/// original casing.
pub fn build_query(model_name: &str, provider: &str, config: &ResolverConfig) -> String {
    if let Some(token) = config.family_token(model_name) {
        return token;
    }
    format!("{} {}", model_name.trim(), provider.trim())
        .trim()
        .to_string()
}
