//! Core type definitions for Memquota.
//!
//! - Limit types ([`MemoryLimit`], [`GrabSize`])
//! - Memory classes ([`MemoryKind`])

mod kind;
mod limit;

pub use kind::MemoryKind;
pub use limit::{GrabSize, MemoryLimit};
