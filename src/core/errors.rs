/*!
# Error types for the graph storage engine

Contract violations and capacity exhaustion reported by the symbol table and
the source graph. Recoverable lexical/syntax problems are not errors: they
are collected as [`Diagnostic`](crate::diagnostics::Diagnostic) values.
*/

use std::fmt;
use thiserror::Error;

/// Which index space an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Node,
    Edge,
    Symbol,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Node => write!(f, "node"),
            IndexKind::Edge => write!(f, "edge"),
            IndexKind::Symbol => write!(f, "symbol"),
        }
    }
}

/// Errors raised by [`SymbolTable`](crate::graph::SymbolTable) and
/// [`SourceGraph`](crate::graph::SourceGraph) operations.
///
/// `InvalidIndex`, `StaleHandle` and `DoubleFree` are programmer errors:
/// the operation is rejected and the storage is left untouched.
/// `CapacityExceeded` ends the current parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[must_use = "errors must not be silently ignored"]
pub enum GraphError {
    /// Index outside the allocated part of the slab or table.
    #[error("{kind} index {index} is out of range ({len} allocated)")]
    InvalidIndex {
        kind: IndexKind,
        index: usize,
        len: usize,
    },

    /// Edge handle whose slot has been recycled since the handle was issued.
    #[error("edge handle {slot}@{generation} is stale (slot is at generation {current})")]
    StaleHandle {
        slot: usize,
        generation: u32,
        current: u32,
    },

    /// Removing an edge slot that is already on the free list.
    #[error("edge slot {slot} is already free")]
    DoubleFree { slot: usize },

    /// The fixed-width index space is exhausted.
    #[error("{kind} capacity of {capacity} exhausted")]
    CapacityExceeded { kind: IndexKind, capacity: usize },
}

impl GraphError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, GraphError::CapacityExceeded { .. })
    }
}
