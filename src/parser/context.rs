/*!
# Parse Context

Single entry and exit point of a parse job. Owns the scanner, the source
graph, the symbol table and the diagnostics list for the duration of one
parse, and drives the state machine

```text
Fresh -> Parsing -> Succeeded
                 \-> Failed
```

Each [`ParseContext::step`] handles one source line. Dropping the context
between steps is always safe: every graph mutation completes before control
returns to the caller.
*/

use std::collections::HashMap;

use super::scanner::{Scanner, Token, TokenKind};
use super::ParseResult;
use crate::config::ParseConfig;
use crate::core::{GraphError, Position, Span};
use crate::diagnostics::{codes, Diagnostic};
use crate::graph::{Direction, EdgeIndex, NodeIndex, NodeKind, SourceGraph, Symbol, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseState {
    Fresh,
    Parsing,
    Succeeded,
    Failed,
}

impl ParseState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ParseState::Succeeded | ParseState::Failed)
    }
}

/// Span of the most recently consumed token, threaded through the parse loop
/// in place of shared "last position" fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviousSpan(pub Span);

impl PreviousSpan {
    /// Start of the last consumed token (`last_pos`, `last_line`, `last_col`).
    pub fn last(&self) -> Position {
        self.0.start
    }

    /// End of the last consumed token (`pos`, `line`, `col`).
    pub fn current(&self) -> Position {
        self.0.end
    }
}

/// Conditions that end the parse in [`ParseState::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Fatal {
    Corrupt(Span),
    Graph(GraphError, Span),
    /// Span of the innermost `{` still open at end of input
    UnclosedBlock(Span),
    TooManyDiagnostics(Span),
}

#[derive(Debug, Clone, Copy)]
pub(super) struct OpenBlock {
    /// Scope when the block opened; restored when it closes
    pub owner: Option<NodeIndex>,
    pub span: Span,
}

/// Reference to a label not declared yet, resolved at end of input.
#[derive(Debug, Clone, Copy)]
pub(super) struct PendingReference {
    pub scope: NodeIndex,
    pub name: Symbol,
    pub dir: Direction,
    pub span: Span,
}

pub struct ParseContext<'src> {
    scanner: Scanner<'src>,
    graph: SourceGraph,
    symbols: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    pub(super) config: ParseConfig,
    state: ParseState,
    lookahead: Option<Token<'src>>,
    previous: PreviousSpan,
    /// Seeding failure, reported when the parse starts
    startup: Option<GraphError>,
    /// Label that receives references
    pub(super) scope: Option<NodeIndex>,
    pub(super) blocks: Vec<OpenBlock>,
    pub(super) labels: HashMap<Symbol, NodeIndex>,
    pub(super) pending: Vec<PendingReference>,
}

impl<'src> ParseContext<'src> {
    /// Fresh context whose symbol table is seeded from `config`'s keywords.
    pub fn new(source: &'src [u8], config: ParseConfig) -> Self {
        match SymbolTable::seeded(&config.keyword_seed()) {
            Ok(symbols) => Self::with_symbols(source, config, symbols),
            Err(err) => {
                let mut ctx = Self::with_symbols(source, config, SymbolTable::new());
                ctx.startup = Some(err);
                ctx
            }
        }
    }

    /// Fresh context continuing from an existing table, e.g. a clone of one
    /// seeded once per process so keyword handles match across documents.
    pub fn with_symbols(source: &'src [u8], config: ParseConfig, symbols: SymbolTable) -> Self {
        Self {
            scanner: Scanner::new(source),
            graph: SourceGraph::new(),
            symbols,
            diagnostics: Vec::new(),
            config,
            state: ParseState::Fresh,
            lookahead: None,
            previous: PreviousSpan(Span::zero()),
            startup: None,
            scope: None,
            blocks: Vec::new(),
            labels: HashMap::new(),
            pending: Vec::new(),
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

    /// Span of the most recently consumed token.
    pub fn previous_span(&self) -> PreviousSpan {
        self.previous
    }

    /// Runs the state machine to a terminal state.
    pub fn parse(mut self) -> ParseResult {
        while !self.step().is_terminal() {}
        ParseResult::new(self.state, self.graph, self.symbols, self.diagnostics)
    }

    /// Advances by one source line (or finalizes at end of input).
    pub fn step(&mut self) -> ParseState {
        match self.state {
            ParseState::Succeeded | ParseState::Failed => return self.state,
            ParseState::Fresh => {
                self.state = ParseState::Parsing;
                tracing::debug!(bytes = self.scanner.source().len(), "parse started");
                if let Some(err) = self.startup.take() {
                    self.fail(Fatal::Graph(err, Span::zero()));
                    return self.state;
                }
            }
            ParseState::Parsing => {}
        }

        let outcome = match self.parse_line() {
            Ok(true) => Ok(()),
            Ok(false) => self.finish(),
            Err(fatal) => Err(fatal),
        };
        if let Err(fatal) = outcome {
            self.fail(fatal);
        }
        self.state
    }

    fn finish(&mut self) -> Result<(), Fatal> {
        self.resolve_pending()?;
        if let Some(open) = self.blocks.last() {
            return Err(Fatal::UnclosedBlock(open.span));
        }
        self.state = ParseState::Succeeded;
        tracing::debug!(
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            diagnostics = self.diagnostics.len(),
            "parse succeeded"
        );
        Ok(())
    }

    fn fail(&mut self, fatal: Fatal) {
        let diagnostic = match fatal {
            Fatal::Corrupt(span) => Diagnostic::error(
                span,
                codes::CORRUPT_INPUT,
                "NUL byte in input; scanning cannot resume",
            ),
            Fatal::Graph(err, span) if err.is_capacity() => {
                Diagnostic::error(span, codes::CAPACITY_EXCEEDED, err.to_string())
            }
            Fatal::Graph(err, span) => Diagnostic::error(
                span,
                codes::INTERNAL_ERROR,
                format!("internal graph error: {err}"),
            ),
            Fatal::UnclosedBlock(span) => Diagnostic::error(
                span,
                codes::UNCLOSED_BLOCK,
                "end of input inside a block",
            )
            .with_expected("`}`"),
            Fatal::TooManyDiagnostics(span) => Diagnostic::error(
                span,
                codes::TOO_MANY_DIAGNOSTICS,
                format!(
                    "too many diagnostics (limit {})",
                    self.config.max_diagnostics.unwrap_or_default()
                ),
            ),
        };
        tracing::warn!(
            code = %diagnostic.code,
            at = %diagnostic.span.start,
            "parse failed: {}",
            diagnostic.message
        );
        self.diagnostics.push(diagnostic);
        self.state = ParseState::Failed;
    }

    // Token stream

    /// Looks at the next token without consuming it. A corrupt token is
    /// never handed to productions.
    pub(super) fn peek(&mut self) -> Result<Token<'src>, Fatal> {
        let token = match self.lookahead {
            Some(token) => token,
            None => {
                let token = self.scanner.next_token();
                self.lookahead = Some(token);
                token
            }
        };
        if token.is(TokenKind::Corrupt) {
            return Err(Fatal::Corrupt(token.span));
        }
        Ok(token)
    }

    pub(super) fn at(&mut self, kind: TokenKind) -> Result<bool, Fatal> {
        Ok(self.peek()?.is(kind))
    }

    /// Consumes the next token and moves the position cursors onto it.
    pub(super) fn bump(&mut self) -> Token<'src> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.scanner.next_token(),
        };
        debug_assert!(token.span.start.offset >= self.previous.current().offset);
        self.previous = PreviousSpan(token.span);
        tracing::trace!(kind = ?token.kind, at = %token.span.start, "token");
        token
    }

    /// Skips to the next line or block boundary. A newline is consumed,
    /// braces and end of input are left for the caller.
    pub(super) fn recover(&mut self) -> Result<(), Fatal> {
        loop {
            match self.peek()?.kind {
                TokenKind::Newline => {
                    self.bump();
                    return Ok(());
                }
                TokenKind::LeftBrace | TokenKind::RightBrace | TokenKind::Eof => return Ok(()),
                _ => {
                    self.bump();
                }
            }
        }
    }

    /// Raw bytes covered by `span`.
    pub(super) fn source_bytes(&self, span: Span) -> &'src [u8] {
        let source = self.scanner.source();
        source.get(span.start.offset..span.end.offset).unwrap_or_default()
    }

    // Diagnostics

    pub(super) fn report(&mut self, diagnostic: Diagnostic) -> Result<(), Fatal> {
        tracing::debug!(
            code = %diagnostic.code,
            at = %diagnostic.span.start,
            "{}",
            diagnostic.message
        );
        let span = diagnostic.span;
        self.diagnostics.push(diagnostic);
        match self.config.max_diagnostics {
            Some(limit) if self.diagnostics.len() >= limit as usize => {
                Err(Fatal::TooManyDiagnostics(span))
            }
            _ => Ok(()),
        }
    }

    // Graph construction

    pub(super) fn intern(&mut self, text: &str, span: Span) -> Result<Symbol, Fatal> {
        self.symbols.intern(text).map_err(|err| Fatal::Graph(err, span))
    }

    pub(super) fn create_node(
        &mut self,
        name: Symbol,
        kind: NodeKind,
        span: Span,
    ) -> Result<NodeIndex, Fatal> {
        self.graph.create_node(name, kind, span).map_err(|err| Fatal::Graph(err, span))
    }

    pub(super) fn link(
        &mut self,
        from: NodeIndex,
        to: NodeIndex,
        label: Symbol,
        dir: Direction,
        span: Span,
    ) -> Result<EdgeIndex, Fatal> {
        self.graph.add_edge(from, to, label, dir, span).map_err(|err| Fatal::Graph(err, span))
    }

    pub(super) fn node_span(&self, node: NodeIndex) -> Span {
        self.graph.node_span(node).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_does_not_touch_input() {
        let ctx = ParseContext::new(b"a:\n", ParseConfig::default());
        assert_eq!(ctx.state(), ParseState::Fresh);
        assert_eq!(ctx.graph().node_count(), 0);
        assert!(ctx.symbols().get("jmp").is_some());
    }

    #[test]
    fn steps_line_by_line() {
        let mut ctx = ParseContext::new(b"a:\nb:\n", ParseConfig::default());
        assert_eq!(ctx.step(), ParseState::Parsing);
        assert_eq!(ctx.graph().node_count(), 1);
        assert_eq!(ctx.step(), ParseState::Parsing);
        assert_eq!(ctx.graph().node_count(), 2);
        assert_eq!(ctx.step(), ParseState::Succeeded);
        assert_eq!(ctx.step(), ParseState::Succeeded);
    }

    #[test]
    fn previous_span_follows_consumed_tokens() {
        let mut ctx = ParseContext::new(b"start:\n  jmp start\n", ParseConfig::default());
        ctx.step();
        let after_first_line = ctx.previous_span();
        assert_eq!(after_first_line.last(), Position::new(1, 7, 6));
        assert_eq!(after_first_line.current(), Position::new(2, 1, 7));
        ctx.step();
        let after_second = ctx.previous_span();
        assert!(after_second.last().offset >= after_first_line.current().offset);
        assert!(after_second.last().offset <= after_second.current().offset);
    }

    #[test]
    fn abandoned_context_leaves_consistent_graph() {
        let mut ctx = ParseContext::new(b"a:\n jmp a\n jmp b\nb:\n", ParseConfig::default());
        ctx.step();
        ctx.step();
        ctx.graph().check_invariants().unwrap();
        assert_eq!(ctx.graph().edge_count(), 1);
        drop(ctx);
    }

    #[test]
    fn diagnostic_limit_fails_the_parse() {
        let config = ParseConfig {
            max_diagnostics: Some(2),
            ..Default::default()
        };
        let result = ParseContext::new(b"@\n@\n@\n", config).parse();
        assert_eq!(result.state(), ParseState::Failed);
        let last = result.diagnostics().last().unwrap();
        assert_eq!(last.code, codes::TOO_MANY_DIAGNOSTICS);
        assert_eq!(result.diagnostics().len(), 3);
    }

    #[cfg(not(feature = "wide-index"))]
    #[test]
    fn seeding_capacity_failure_surfaces_on_first_step() {
        let config = ParseConfig {
            keywords: (0..crate::graph::INDEX_CAPACITY).map(|i| format!("k{i}")).collect(),
            ..Default::default()
        };
        let result = ParseContext::new(b"", config).parse();
        assert_eq!(result.state(), ParseState::Failed);
        assert_eq!(result.diagnostics()[0].code, codes::CAPACITY_EXCEEDED);
    }
}
