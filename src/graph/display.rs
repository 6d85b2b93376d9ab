//! Plain-text rendering of a source graph with resolved symbol names.

use std::fmt;

use super::{Direction, SourceGraph, SymbolTable};

/// Renders one block per node:
///
/// ```text
/// #0 start (label) @1:1
///   -> start [start] @2:7
/// ```
pub struct GraphDisplay<'a> {
    graph: &'a SourceGraph,
    symbols: &'a SymbolTable,
}

impl<'a> GraphDisplay<'a> {
    pub fn new(graph: &'a SourceGraph, symbols: &'a SymbolTable) -> Self {
        Self { graph, symbols }
    }

    fn name(&self, sym: super::Symbol) -> &'a str {
        self.symbols.resolve(sym).unwrap_or("<?>")
    }
}

impl fmt::Display for GraphDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, node) in self.graph.nodes() {
            let span = self.graph.node_span(idx).map_err(|_| fmt::Error)?;
            writeln!(f, "{} {} ({}) @{}", idx, self.name(node.name()), node.kind(), span.start)?;
            for dir in [Direction::Out, Direction::In] {
                let walk = self.graph.edges_of(idx, dir).map_err(|_| fmt::Error)?;
                for edge_idx in walk {
                    let edge = self.graph.edge(edge_idx).map_err(|_| fmt::Error)?;
                    let target = self.graph.node(edge.target).map_err(|_| fmt::Error)?;
                    writeln!(
                        f,
                        "  {} {} [{}] @{}",
                        dir.arrow(),
                        self.name(target.name()),
                        self.name(edge.label),
                        edge.span.start
                    )?;
                }
            }
        }
        Ok(())
    }
}
