/*!
# Source Graph

Slab storage for the structure discovered while parsing.

Nodes live in an append-only slab and are addressed by [`NodeIndex`]. Edges
live in a second slab whose slots are recycled through an intrusive free list
kept inside the freed slots themselves; both allocation and release are O(1).
Each node owns a doubly linked adjacency chain threaded through the edge
slots it holds.

Edge handles ([`EdgeIndex`]) carry the generation of their slot. Releasing a
slot bumps its generation, so a handle kept past `remove_edge` is rejected as
stale instead of aliasing whatever edge reuses the slot.

Every node and edge is stamped with a source [`Span`] kept in tables parallel
to the slabs.
*/

pub mod display;
pub mod edge;
pub mod symbols;

pub use display::GraphDisplay;
pub use edge::Direction;
pub use symbols::{KeywordSeed, Symbol, SymbolTable, CONTAINS_LABEL, DEFAULT_KEYWORDS};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::{GraphError, IndexKind, Span};
use edge::{EdgeData, EdgeSlot, SlotState};

/// Integer width of node, edge and symbol indices.
#[cfg(not(feature = "wide-index"))]
pub type RawIndex = u16;
/// Integer width of node, edge and symbol indices.
#[cfg(feature = "wide-index")]
pub type RawIndex = u32;

/// Number of distinct indices of width [`RawIndex`].
pub const INDEX_CAPACITY: usize = RawIndex::MAX as usize + 1;

pub(crate) fn to_raw(index: usize) -> Option<RawIndex> {
    RawIndex::try_from(index).ok()
}

/// Stable index of a node. Nodes are never freed within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(RawIndex);

impl NodeIndex {
    pub(crate) fn from_raw(raw: RawIndex) -> Self {
        Self(raw)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Generation-tagged handle of an edge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeIndex {
    slot: RawIndex,
    generation: u32,
}

impl EdgeIndex {
    pub fn slot(self) -> usize {
        self.slot as usize
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Display for EdgeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}@{}", self.slot, self.generation)
    }
}

/// What created a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// `name:` declaration; opens a scope.
    Label,
    /// `.extern name` declaration; referable, never a scope.
    Extern,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Label => write!(f, "label"),
            NodeKind::Extern => write!(f, "extern"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    name: Symbol,
    kind: NodeKind,
    head: Option<RawIndex>,
}

impl Node {
    pub fn name(&self) -> Symbol {
        self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

/// Snapshot of an occupied edge slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub index: EdgeIndex,
    /// Node whose adjacency chain holds the edge.
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub label: Symbol,
    pub direction: Direction,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub live_edges: usize,
    pub free_slots: usize,
    pub edge_slots: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SourceGraph {
    nodes: Vec<Node>,
    node_spans: Vec<Span>,
    edges: Vec<EdgeSlot>,
    edge_spans: Vec<Span>,
    free_head: Option<RawIndex>,
    live_edges: usize,
}

impl SourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a node; amortized O(1).
    pub fn create_node(
        &mut self,
        name: Symbol,
        kind: NodeKind,
        span: Span,
    ) -> Result<NodeIndex, GraphError> {
        let raw = to_raw(self.nodes.len()).ok_or(GraphError::CapacityExceeded {
            kind: IndexKind::Node,
            capacity: INDEX_CAPACITY,
        })?;
        self.nodes.push(Node {
            name,
            kind,
            head: None,
        });
        self.node_spans.push(span);
        let index = NodeIndex(raw);
        tracing::trace!(node = %index, %kind, "node created");
        Ok(index)
    }

    /// Links a new edge into the adjacency chain of `from`.
    ///
    /// The slot comes from the free-list head when one is available, otherwise
    /// the slab grows by one. Every field of a reused slot is overwritten.
    pub fn add_edge(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        label: Symbol,
        dir: Direction,
        span: Span,
    ) -> Result<EdgeIndex, GraphError> {
        self.check_node(from)?;
        self.check_node(to)?;
        let slot = self.allocate_slot()?;
        let next = self.nodes[from.index()].head;
        if let Some(next) = next {
            self.occupied_mut(next).prev = Some(slot);
        }

        let entry = &mut self.edges[slot as usize];
        entry.state = SlotState::Occupied(EdgeData {
            owner: from,
            target: to,
            label,
            dir,
            prev: None,
            next,
        });
        let index = EdgeIndex {
            slot,
            generation: entry.generation,
        };
        self.edge_spans[slot as usize] = span;
        self.nodes[from.index()].head = Some(slot);
        self.live_edges += 1;
        tracing::trace!(edge = %index, %from, %to, ?dir, "edge added");
        Ok(index)
    }

    /// Unlinks the edge from its owner's chain and pushes its slot onto the
    /// free list.
    pub fn remove_edge(&mut self, idx: EdgeIndex) -> Result<(), GraphError> {
        let data = *self.live_data(idx)?;
        match data.prev {
            Some(prev) => self.occupied_mut(prev).next = data.next,
            None => self.nodes[data.owner.index()].head = data.next,
        }
        if let Some(next) = data.next {
            self.occupied_mut(next).prev = data.prev;
        }

        self.edges[idx.slot()].release(self.free_head);
        self.edge_spans[idx.slot()] = Span::zero();
        self.free_head = Some(idx.slot);
        self.live_edges -= 1;
        tracing::trace!(edge = %idx, "edge removed");
        Ok(())
    }

    /// Walks the adjacency chain of `node`, yielding edges with direction `dir`.
    ///
    /// Each call starts again from the node's current chain head.
    pub fn edges_of(&self, node: NodeIndex, dir: Direction) -> Result<EdgesOf<'_>, GraphError> {
        self.check_node(node)?;
        Ok(EdgesOf {
            graph: self,
            cursor: self.nodes[node.index()].head,
            dir,
        })
    }

    pub fn node(&self, idx: NodeIndex) -> Result<&Node, GraphError> {
        self.check_node(idx)?;
        Ok(&self.nodes[idx.index()])
    }

    pub fn node_span(&self, idx: NodeIndex) -> Result<Span, GraphError> {
        self.check_node(idx)?;
        Ok(self.node_spans[idx.index()])
    }

    pub fn edge(&self, idx: EdgeIndex) -> Result<Edge, GraphError> {
        let data = self.live_data(idx)?;
        Ok(Edge {
            index: idx,
            source: data.owner,
            target: data.target,
            label: data.label,
            direction: data.dir,
            span: self.edge_spans[idx.slot()],
        })
    }

    /// True when `idx` still names a live edge.
    pub fn contains_edge(&self, idx: EdgeIndex) -> bool {
        self.live_data(idx).is_ok()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, node)| to_raw(i).map(|raw| (NodeIndex(raw), node)))
    }

    /// All live edges in slot order.
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().enumerate().filter_map(move |(i, slot)| {
            let raw = to_raw(i)?;
            let index = EdgeIndex {
                slot: raw,
                generation: slot.generation,
            };
            self.edge(index).ok()
        })
    }

    /// First node declared with `name`.
    pub fn find_node(&self, name: Symbol) -> Option<NodeIndex> {
        self.nodes().find(|(_, node)| node.name == name).map(|(idx, _)| idx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of occupied edge slots.
    pub fn edge_count(&self) -> usize {
        self.live_edges
    }

    /// Occupied plus free edge slots.
    pub fn edge_slot_count(&self) -> usize {
        self.edges.len()
    }

    pub fn free_slot_count(&self) -> usize {
        self.edges.len() - self.live_edges
    }

    /// Whether edge slot `slot` is on the free list; `None` past the slab end.
    pub fn is_slot_free(&self, slot: usize) -> Option<bool> {
        self.edges.get(slot).map(EdgeSlot::is_free)
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            nodes: self.node_count(),
            live_edges: self.edge_count(),
            free_slots: self.free_slot_count(),
            edge_slots: self.edge_slot_count(),
        }
    }

    /// Verifies the slab invariants: every occupied slot sits in its owner's
    /// chain exactly once with consistent back links, and the free list
    /// visits every free slot exactly once.
    ///
    /// Returns the first violation found as `InvalidIndex` on the offending
    /// slot.
    pub fn check_invariants(&self) -> Result<(), GraphError> {
        let corrupt = |slot: usize| GraphError::InvalidIndex {
            kind: IndexKind::Edge,
            index: slot,
            len: self.edges.len(),
        };
        let mut seen = vec![false; self.edges.len()];

        for (node_idx, node) in self.nodes() {
            let mut prev = None;
            let mut cursor = node.head;
            while let Some(slot) = cursor {
                let i = slot as usize;
                let data = self.edges.get(i).and_then(EdgeSlot::data).ok_or_else(|| corrupt(i))?;
                if seen[i] || data.owner != node_idx || data.prev != prev {
                    return Err(corrupt(i));
                }
                seen[i] = true;
                prev = Some(slot);
                cursor = data.next;
            }
        }

        let mut free = 0usize;
        let mut cursor = self.free_head;
        while let Some(slot) = cursor {
            let i = slot as usize;
            match self.edges.get(i).map(|s| s.state) {
                Some(SlotState::Free { next_free }) if !seen[i] => {
                    seen[i] = true;
                    free += 1;
                    cursor = next_free;
                }
                _ => return Err(corrupt(i)),
            }
        }

        if let Some(orphan) = seen.iter().position(|visited| !visited) {
            return Err(corrupt(orphan));
        }
        if free + self.live_edges != self.edges.len() {
            return Err(corrupt(self.edges.len()));
        }
        Ok(())
    }

    fn check_node(&self, idx: NodeIndex) -> Result<(), GraphError> {
        if idx.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::InvalidIndex {
                kind: IndexKind::Node,
                index: idx.index(),
                len: self.nodes.len(),
            })
        }
    }

    fn live_data(&self, idx: EdgeIndex) -> Result<&EdgeData, GraphError> {
        let slot = self.edges.get(idx.slot()).ok_or(GraphError::InvalidIndex {
            kind: IndexKind::Edge,
            index: idx.slot(),
            len: self.edges.len(),
        })?;
        match slot.data() {
            None => Err(GraphError::DoubleFree { slot: idx.slot() }),
            Some(_) if slot.generation != idx.generation => Err(GraphError::StaleHandle {
                slot: idx.slot(),
                generation: idx.generation,
                current: slot.generation,
            }),
            Some(data) => Ok(data),
        }
    }

    fn allocate_slot(&mut self) -> Result<RawIndex, GraphError> {
        if let Some(head) = self.free_head {
            match self.edges[head as usize].state {
                SlotState::Free { next_free } => self.free_head = next_free,
                SlotState::Occupied(_) => unreachable!("free list head {head} is occupied"),
            }
            return Ok(head);
        }
        let raw = to_raw(self.edges.len()).ok_or(GraphError::CapacityExceeded {
            kind: IndexKind::Edge,
            capacity: INDEX_CAPACITY,
        })?;
        self.edges.push(EdgeSlot::vacant());
        self.edge_spans.push(Span::zero());
        Ok(raw)
    }

    /// Chain links only ever point at occupied slots.
    fn occupied_mut(&mut self, slot: RawIndex) -> &mut EdgeData {
        match self.edges[slot as usize].data_mut() {
            Some(data) => data,
            None => unreachable!("adjacency chain reaches free slot {slot}"),
        }
    }
}

/// Lazy walk over one node's adjacency chain.
#[derive(Debug, Clone)]
pub struct EdgesOf<'g> {
    graph: &'g SourceGraph,
    cursor: Option<RawIndex>,
    dir: Direction,
}

impl Iterator for EdgesOf<'_> {
    type Item = EdgeIndex;

    fn next(&mut self) -> Option<EdgeIndex> {
        while let Some(slot) = self.cursor {
            let entry = &self.graph.edges[slot as usize];
            let data = entry.data()?;
            self.cursor = data.next;
            if data.dir == self.dir {
                return Some(EdgeIndex {
                    slot,
                    generation: entry.generation,
                });
            }
        }
        None
    }
}
