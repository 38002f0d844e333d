//! Centralized limits and thresholds for the constraint solver.
//!
//! These are the defaults behind `SolverOptions`. A host can override any of
//! them per session; the values here are tuned for checking units of a few
//! thousand constraints.

// =============================================================================
// Recursion Depth Limits
// =============================================================================

/// Maximum length of a propagation chain.
///
/// Every nested `flow` call (through a rule, a bound propagation or a choice
/// trial) steps the trace depth by one. Past this depth the solver reports a
/// recursion-limit diagnostic and abandons just that path.
///
/// ```text
/// // A self-referential object that keeps unfolding:
/// type List = { next: List | null };
/// // flowed into a structurally distinct but equally recursive shape
/// ```
pub const MAX_FLOW_DEPTH: u32 = 1000;

/// Maximum nesting when substituting a fully resolved type.
///
/// The resolution engine walks resolved variables into their concrete types;
/// a variable that resolves to a type containing itself would otherwise never
/// finish.
pub const MAX_RESOLUTION_DEPTH: u32 = 100;

/// Maximum nesting of generic definition expansions before the loop guard
/// stops looking at the expansion stack and widens outright.
pub const MAX_EXPANSION_DEPTH: u32 = 50;

// =============================================================================
// Operation Count Limits
// =============================================================================

/// Number of times a constant-folding site may fold a literal result.
///
/// The first evaluation at a site produces the exact literal; any further
/// evaluation at the same site widens to the base primitive.
pub const CONST_FOLD_REPEATS: u32 = 1;

/// Maximum number of alternatives considered for sentinel hints.
///
/// Unions wider than this skip the sentinel pre-filter.
pub const MAX_SENTINEL_UNION_MEMBERS: usize = 64;

// =============================================================================
// Capacity Limits
// =============================================================================

/// Initial capacity of the variable arena.
pub const INITIAL_VAR_CAPACITY: usize = 256;

/// Initial capacity of the pair cache.
pub const INITIAL_PAIR_CACHE_CAPACITY: usize = 1024;
