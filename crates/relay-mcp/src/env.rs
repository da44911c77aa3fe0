//! Environment substitution for stdio server `env` entries
//!
//! A value of the form `$VAR` or `${VAR}` is replaced by the host's `VAR`.
//! Unresolved references keep their literal text and log a warning.

use std::collections::BTreeMap;
use tracing::warn;

/// Resolve `env` against the process environment
pub fn resolve_env(env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    resolve_env_with(env, |name| std::env::var(name).ok())
}

/// Resolve `env` with a custom variable lookup
pub fn resolve_env_with<F>(env: &BTreeMap<String, String>, lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<String>,
{
    env.iter()
        .map(|(key, value)| {
            let resolved = match reference_name(value) {
                Some(name) => lookup(name).unwrap_or_else(|| {
                    warn!(
                        variable = name,
                        key = %key,
                        "Environment variable {name} not found for {key}, using literal value"
                    );
                    value.clone()
                }),
                None => value.clone(),
            };
            (key.clone(), resolved)
        })
        .collect()
}

/// Variable name referenced by `value`, if it is a reference at all
fn reference_name(value: &str) -> Option<&str> {
    if let Some(name) = value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
    {
        return Some(name);
    }
    value.strip_prefix('$')
}
