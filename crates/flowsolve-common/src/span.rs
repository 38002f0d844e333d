//! Source spans used as blame locations.
//!
//! The solver never interprets spans; it only carries them from the rule
//! table to diagnostics and uses them as keys (e.g. constant-fold sites).

use serde::Serialize;

/// A byte range in a source file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Span {
    pub file: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[inline]
    pub const fn new(file: u32, start: u32, end: u32) -> Self {
        Span { file, start, end }
    }

    /// A span for synthesized types with no source position.
    #[inline]
    pub const fn dummy() -> Self {
        Span {
            file: u32::MAX,
            start: 0,
            end: 0,
        }
    }

    #[inline]
    pub fn is_dummy(&self) -> bool {
        self.file == u32::MAX
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Smallest span covering both, if they are in the same file.
    pub fn merge(self, other: Span) -> Span {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() || self.file != other.file {
            return self;
        }
        Span {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_dummy() {
            write!(f, "<synthetic>")
        } else {
            write!(f, "{}:{}-{}", self.file, self.start, self.end)
        }
    }
}
