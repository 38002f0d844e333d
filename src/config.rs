//! Loading `SolverOptions` from a JSON configuration file.
//!
//! ```json
//! {
//!   "extends": "./base.json",
//!   "maxFlowDepth": 200,
//!   "sentinelChecks": "false"
//! }
//! ```
//!
//! Every field is optional; unset fields inherit from the `extends` chain
//! and then from `SolverOptions::default()`. Boolean fields accept `true`
//! as well as `"true"`.

use anyhow::{Context, Result, anyhow, bail};
use flowsolve_solver::SolverOptions;
use serde::{Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Boolean options may be written as a bool or a string.
fn deserialize_bool_or_string<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(Error::custom(format!(
                "invalid boolean value: '{s}'. Expected true, false, 'true', or 'false'"
            ))),
        },
    }
}

/// A configuration file as written, before defaults are applied.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SolverConfig {
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub max_flow_depth: Option<u32>,
    #[serde(default)]
    pub max_resolution_depth: Option<u32>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub sentinel_checks: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_bool_or_string")]
    pub quick_subset: Option<bool>,
    #[serde(default)]
    pub const_fold_repeats: Option<u32>,
}

impl SolverConfig {
    /// Fields set in `child` win over `base`.
    fn merge(base: SolverConfig, child: SolverConfig) -> SolverConfig {
        SolverConfig {
            extends: None,
            max_flow_depth: child.max_flow_depth.or(base.max_flow_depth),
            max_resolution_depth: child.max_resolution_depth.or(base.max_resolution_depth),
            sentinel_checks: child.sentinel_checks.or(base.sentinel_checks),
            quick_subset: child.quick_subset.or(base.quick_subset),
            const_fold_repeats: child.const_fold_repeats.or(base.const_fold_repeats),
        }
    }

    /// Apply defaults and validate.
    pub fn resolve(&self) -> Result<SolverOptions> {
        let defaults = SolverOptions::default();
        let options = SolverOptions {
            max_flow_depth: self.max_flow_depth.unwrap_or(defaults.max_flow_depth),
            max_resolution_depth: self
                .max_resolution_depth
                .unwrap_or(defaults.max_resolution_depth),
            sentinel_checks: self.sentinel_checks.unwrap_or(defaults.sentinel_checks),
            quick_subset: self.quick_subset.unwrap_or(defaults.quick_subset),
            const_fold_repeats: self.const_fold_repeats.unwrap_or(defaults.const_fold_repeats),
        };
        if options.max_flow_depth == 0 {
            bail!("maxFlowDepth must be at least 1");
        }
        if options.max_resolution_depth == 0 {
            bail!("maxResolutionDepth must be at least 1");
        }
        Ok(options)
    }
}

pub fn parse_config(source: &str) -> Result<SolverConfig> {
    serde_json::from_str(source).context("failed to parse solver config JSON")
}

/// Read `path` and its `extends` chain.
pub fn load_config(path: &Path) -> Result<SolverConfig> {
    let mut visited = HashSet::new();
    load_config_inner(path, &mut visited)
}

fn load_config_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<SolverConfig> {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical.clone()) {
        bail!("config extends cycle detected at {}", canonical.display());
    }

    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read solver config: {}", path.display()))?;
    let mut config = parse_config(&source)
        .with_context(|| format!("failed to parse solver config: {}", path.display()))?;

    if let Some(extends) = config.extends.take() {
        let base_path = resolve_extends_path(path, &extends)?;
        let base = load_config_inner(&base_path, visited)?;
        config = SolverConfig::merge(base, config);
    }

    visited.remove(&canonical);
    Ok(config)
}

fn resolve_extends_path(current_path: &Path, extends: &str) -> Result<PathBuf> {
    let base_dir = current_path
        .parent()
        .ok_or_else(|| anyhow!("solver config has no parent directory"))?;
    let mut candidate = PathBuf::from(extends);
    if candidate.extension().is_none() {
        candidate.set_extension("json");
    }
    if candidate.is_absolute() {
        Ok(candidate)
    } else {
        Ok(base_dir.join(candidate))
    }
}

/// Load, merge and validate the options in `path`.
pub fn load_options(path: &Path) -> Result<SolverOptions> {
    let config = load_config(path)?;
    config
        .resolve()
        .with_context(|| format!("invalid solver config: {}", path.display()))
}
