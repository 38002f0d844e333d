//! Per-session solver options.

use flowsolve_common::limits;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SolverOptions {
    /// Longest propagation chain before a path is abandoned.
    pub max_flow_depth: u32,
    /// Nesting limit when substituting fully resolved types.
    pub max_resolution_depth: u32,
    /// Skip union alternatives whose sentinel property disagrees.
    pub sentinel_checks: bool,
    /// Try union subset / membership before speculating.
    pub quick_subset: bool,
    /// Folding evaluations allowed per constant-fold site.
    pub const_fold_repeats: u32,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            max_flow_depth: limits::MAX_FLOW_DEPTH,
            max_resolution_depth: limits::MAX_RESOLUTION_DEPTH,
            sentinel_checks: true,
            quick_subset: true,
            const_fold_repeats: limits::CONST_FOLD_REPEATS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let options: SolverOptions = serde_json::from_str(r#"{ "maxFlowDepth": 12 }"#).unwrap();
        assert_eq!(options.max_flow_depth, 12);
        assert_eq!(options.const_fold_repeats, limits::CONST_FOLD_REPEATS);
        assert!(options.quick_subset);
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_string(&SolverOptions::default()).unwrap();
        assert!(json.contains("\"sentinelChecks\":true"));
    }
}
