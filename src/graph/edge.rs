//! Edge slab slots.
//!
//! A slot is either occupied by an edge or threaded onto the free list. The
//! two states are enum variants, so the fields of an edge cannot be read from
//! a free slot. The generation survives both states and is bumped whenever a
//! slot is released.

use serde::{Deserialize, Serialize};

use super::symbols::Symbol;
use super::{NodeIndex, RawIndex};

/// Direction of an edge from the point of view of the node whose adjacency
/// chain holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::In => "<-",
            Direction::Out => "->",
        }
    }
}

/// Fields of an occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeData {
    /// Node whose adjacency chain holds this edge.
    pub owner: NodeIndex,
    pub target: NodeIndex,
    pub label: Symbol,
    pub dir: Direction,
    /// Neighbours in the owner's adjacency chain.
    pub prev: Option<RawIndex>,
    pub next: Option<RawIndex>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotState {
    Occupied(EdgeData),
    Free { next_free: Option<RawIndex> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EdgeSlot {
    pub generation: u32,
    pub state: SlotState,
}

impl EdgeSlot {
    pub fn vacant() -> Self {
        Self {
            generation: 0,
            state: SlotState::Free { next_free: None },
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self.state, SlotState::Free { .. })
    }

    pub fn data(&self) -> Option<&EdgeData> {
        match &self.state {
            SlotState::Occupied(data) => Some(data),
            SlotState::Free { .. } => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut EdgeData> {
        match &mut self.state {
            SlotState::Occupied(data) => Some(data),
            SlotState::Free { .. } => None,
        }
    }

    /// Puts the slot on the free list with `next_free` as successor.
    pub fn release(&mut self, next_free: Option<RawIndex>) {
        self.state = SlotState::Free { next_free };
        self.generation = self.generation.wrapping_add(1);
    }
}
