//! Memory classes tracked independently.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The class of memory an allocation is charged to.
///
/// Both classes count against the same limit; they are kept apart so that
/// usage can be reported separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Off-heap allocations.
    Native,
    /// On-heap allocations, estimated by the caller.
    Heap,
}

impl MemoryKind {
    /// Returns the lowercase name used in errors and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            MemoryKind::Native => "native",
            MemoryKind::Heap => "heap",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
