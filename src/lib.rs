/*!
# awasm Parser

Front end of the awasm assembler: a scanner-driven parser that builds a
compact, symbol-interned source graph of labels and the references between
them, with exact source spans for every node, edge and diagnostic.

## Architecture

```text
awasm-parser
├── Core         - Positions, spans, storage errors, file loading
├── Graph        - Symbol table, node/edge slabs with free-list recycling
├── Parser       - Scanner, parse context state machine, line grammar
├── Diagnostics  - Position-tagged errors and warnings with stable codes
└── Config       - TOML/YAML parse settings
```

## Usage

```rust
use awasm_parser::{parse, ParseState};

let result = parse(b"A:\n  jmp A\n");
assert_eq!(result.state(), ParseState::Succeeded);

let graph = result.graph();
let a = graph.find_node(result.symbols().get("A").unwrap()).unwrap();
let edge = graph.edges().next().unwrap();
assert_eq!((edge.source, edge.target), (a, a));
assert_eq!(edge.span.start.line, 2);
```

Node, edge and symbol indices are 16 bits wide unless the `wide-index`
feature is enabled; running out of indices fails the parse with a
capacity diagnostic instead of wrapping around.
*/

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod graph;
pub mod parser;

pub use config::ParseConfig;
pub use crate::core::{GraphError, Position, Span};
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use graph::{
    Direction, EdgeIndex, GraphStats, KeywordSeed, NodeIndex, NodeKind, SourceGraph, Symbol,
    SymbolTable,
};
pub use parser::{AwasmParser, ParseContext, ParseResult, ParseState};

/// Parses `source` with the default configuration
pub fn parse(source: &[u8]) -> ParseResult {
    ParseContext::new(source, ParseConfig::default()).parse()
}
