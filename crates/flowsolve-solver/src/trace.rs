//! Propagation-chain depth token.
//!
//! Every nested flow (through a rule, a bound propagation or a speculative
//! trial) receives `trace.step()`. The dispatcher compares the depth against
//! `SolverOptions::max_flow_depth` and abandons the path past it.

/// Depth of the current propagation chain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trace {
    depth: u32,
}

impl Trace {
    /// A fresh chain, as started by a public entry point.
    #[inline]
    pub const fn root() -> Self {
        Trace { depth: 0 }
    }

    /// One link deeper.
    #[inline]
    #[must_use]
    pub fn step(self) -> Self {
        Trace {
            depth: self.depth.saturating_add(1),
        }
    }

    #[inline]
    pub fn depth(self) -> u32 {
        self.depth
    }
}
