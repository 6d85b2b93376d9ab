/*!
# awasm Parser

Streaming parser for the awasm assembler text format. Builds a
[`SourceGraph`] of labels and the references between them while the
scanner walks the input once.

## Features

- **Byte-level scanning** with a `logos` lexer; invalid UTF-8 is a
  recoverable lexical error
- **Error recovery** at line and block boundaries
- **Forward references** resolved at end of input
- **Position tracking**: every node, edge and diagnostic carries its span

## Usage

```rust
use awasm_parser::parser::{AwasmParser, ParseState};

let result = AwasmParser::new().parse_bytes(b"start:\n  jmp start\n");
assert_eq!(result.state(), ParseState::Succeeded);
assert_eq!(result.graph().edge_count(), 1);
```
*/

pub mod context;
mod grammar;
pub mod scanner;

pub use context::{ParseContext, ParseState, PreviousSpan};
pub use scanner::{Scanner, Token, TokenKind};

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::ParseConfig;
use crate::core::read_source_file;
use crate::diagnostics::Diagnostic;
use crate::graph::display::GraphDisplay;
use crate::graph::{GraphStats, SourceGraph, SymbolTable};

/// Main awasm parser
#[derive(Debug, Clone, Default)]
pub struct AwasmParser {
    config: ParseConfig,
}

impl AwasmParser {
    /// Creates a parser with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ParseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Parses raw source bytes to a terminal state
    pub fn parse_bytes(&self, source: &[u8]) -> ParseResult {
        ParseContext::new(source, self.config.clone()).parse()
    }

    /// Parses a source file (UTF-8 BOM stripped)
    pub fn parse_file<P: AsRef<Path>>(&self, file_path: P) -> Result<ParseResult> {
        let path = file_path.as_ref();
        let source = read_source_file(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let result = self.parse_bytes(&source);
        tracing::debug!(file = %path.display(), state = ?result.state(), "parsed");
        Ok(result)
    }
}

/// Finished parse: terminal state, the graph with the symbol table needed to
/// resolve its labels, and the diagnostics in the order they were reported.
/// A failed parse keeps the partial graph.
#[derive(Debug, Clone)]
pub struct ParseResult {
    state: ParseState,
    graph: SourceGraph,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
}

impl ParseResult {
    pub(crate) fn new(
        state: ParseState,
        graph: SourceGraph,
        symbols: SymbolTable,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            state,
            graph,
            symbols,
            diagnostics,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn graph(&self) -> &SourceGraph {
        &self.graph
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn stats(&self) -> GraphStats {
        self.graph.stats()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics.iter().filter(|d| d.is_error()).count()
    }

    /// Reached end of input with no error-severity diagnostics
    pub fn is_success(&self) -> bool {
        self.state == ParseState::Succeeded && !self.has_errors()
    }

    /// Plain-text dump of the graph
    pub fn display(&self) -> GraphDisplay<'_> {
        GraphDisplay::new(&self.graph, &self.symbols)
    }
}
