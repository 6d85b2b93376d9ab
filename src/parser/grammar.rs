//! Line grammar. Every production builds its part of the source graph as it
//! is recognized; references to labels not declared yet are queued and
//! linked once the whole input has been read.

use super::context::{Fatal, OpenBlock, ParseContext, PendingReference};
use super::scanner::{Token, TokenKind};
use crate::diagnostics::{codes, Diagnostic};
use crate::graph::{Direction, NodeKind, CONTAINS_LABEL};

/// How a production ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Complete; only a line end may follow
    Done,
    /// Diagnostic reported and input resynchronized
    Recovered,
}

/// Directives whose operands are plain names rather than expressions.
const EXTERN_DIRECTIVE: &str = ".extern";
const NAME_DIRECTIVES: &[&str] = &[".global", ".section"];

impl<'src> ParseContext<'src> {
    /// Parses one source line. Returns `false` at end of input.
    pub(super) fn parse_line(&mut self) -> Result<bool, Fatal> {
        loop {
            let token = self.peek()?;
            let flow = match token.kind {
                TokenKind::Eof => return Ok(false),
                TokenKind::Newline => {
                    self.bump();
                    return Ok(true);
                }
                TokenKind::LeftBrace => {
                    self.open_block()?;
                    continue;
                }
                TokenKind::RightBrace => {
                    self.close_block()?;
                    continue;
                }
                TokenKind::Identifier => {
                    let ident = self.bump();
                    if self.at(TokenKind::Colon)? {
                        let colon = self.bump();
                        self.declare_label(ident, colon)?;
                        continue;
                    }
                    self.parse_instruction(ident)?
                }
                TokenKind::Directive => self.parse_directive()?,
                _ => self.syntax_error(token, "label, instruction or directive")?,
            };

            if flow == Flow::Done {
                self.expect_line_end()?;
            }
            return Ok(true);
        }
    }

    fn parse_instruction(&mut self, mnemonic: Token<'src>) -> Result<Flow, Fatal> {
        self.intern(mnemonic.text, mnemonic.span)?;
        self.parse_operands()
    }

    fn parse_directive(&mut self) -> Result<Flow, Fatal> {
        let directive = self.bump();
        self.intern(directive.text, directive.span)?;

        if directive.text == EXTERN_DIRECTIVE {
            self.parse_names(true)
        } else if NAME_DIRECTIVES.contains(&directive.text) {
            self.parse_names(false)
        } else {
            self.parse_operands()
        }
    }

    /// `name (',' name)*`; with `declare` every name becomes an extern node.
    fn parse_names(&mut self, declare: bool) -> Result<Flow, Fatal> {
        loop {
            let token = self.peek()?;
            if !matches!(token.kind, TokenKind::Identifier | TokenKind::Directive) {
                return self.syntax_error(token, "name");
            }
            self.bump();
            if declare {
                self.declare_extern(token)?;
            } else {
                self.intern(token.text, token.span)?;
            }

            if !self.at(TokenKind::Comma)? {
                return Ok(Flow::Done);
            }
            self.bump();
        }
    }

    fn parse_operands(&mut self) -> Result<Flow, Fatal> {
        if self.peek()?.kind.is_boundary() {
            return Ok(Flow::Done);
        }
        loop {
            if self.parse_operand()? == Flow::Recovered {
                return Ok(Flow::Recovered);
            }
            if !self.at(TokenKind::Comma)? {
                return Ok(Flow::Done);
            }
            self.bump();
        }
    }

    fn parse_operand(&mut self) -> Result<Flow, Fatal> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Identifier => {
                self.bump();
                self.reference(token, Direction::Out)?;
                Ok(Flow::Done)
            }
            TokenKind::LeftBracket => self.parse_memory_operand(),
            TokenKind::Register | TokenKind::Number | TokenKind::StringLiteral => {
                self.bump();
                Ok(Flow::Done)
            }
            TokenKind::Minus => {
                self.bump();
                let number = self.peek()?;
                if !number.is(TokenKind::Number) {
                    return self.syntax_error(number, "number");
                }
                self.bump();
                Ok(Flow::Done)
            }
            _ => self.syntax_error(token, "operand"),
        }
    }

    /// `'[' base (('+' | '-') offset)* ']'`; a label base is an inbound reference.
    fn parse_memory_operand(&mut self) -> Result<Flow, Fatal> {
        self.bump();

        let base = self.peek()?;
        match base.kind {
            TokenKind::Identifier => {
                self.bump();
                self.reference(base, Direction::In)?;
            }
            TokenKind::Register | TokenKind::Number => {
                self.bump();
            }
            _ => return self.syntax_error(base, "label, register or number"),
        }

        while matches!(self.peek()?.kind, TokenKind::Plus | TokenKind::Minus) {
            self.bump();
            let offset = self.peek()?;
            if !matches!(offset.kind, TokenKind::Number | TokenKind::Register) {
                return self.syntax_error(offset, "number or register");
            }
            self.bump();
        }

        let close = self.peek()?;
        if !close.is(TokenKind::RightBracket) {
            return self.syntax_error(close, "`]`");
        }
        self.bump();
        Ok(Flow::Done)
    }

    fn declare_label(&mut self, ident: Token<'src>, colon: Token<'src>) -> Result<(), Fatal> {
        let span = ident.span.to(colon.span);
        let name = self.intern(ident.text, ident.span)?;

        if let Some(&existing) = self.labels.get(&name) {
            let first = self.node_span(existing);
            self.report(
                Diagnostic::error(
                    span,
                    codes::DUPLICATE_LABEL,
                    format!("`{}` is already declared", ident.text),
                )
                .with_found(ident.text)
                .with_info(format!("first declared at {}", first.start)),
            )?;
            let is_label = self.graph().node(existing).map(|n| n.kind() == NodeKind::Label);
            if is_label == Ok(true) {
                self.scope = Some(existing);
            }
            return Ok(());
        }

        let node = self.create_node(name, NodeKind::Label, span)?;
        self.labels.insert(name, node);
        if let Some(owner) = self.blocks.last().and_then(|block| block.owner) {
            let contains = self.intern(CONTAINS_LABEL, span)?;
            self.link(owner, node, contains, Direction::Out, span)?;
        }
        tracing::trace!(label = ident.text, %node, "label declared");
        self.scope = Some(node);
        Ok(())
    }

    fn declare_extern(&mut self, ident: Token<'src>) -> Result<(), Fatal> {
        let name = self.intern(ident.text, ident.span)?;
        if let Some(&existing) = self.labels.get(&name) {
            let first = self.node_span(existing);
            return self.report(
                Diagnostic::error(
                    ident.span,
                    codes::DUPLICATE_LABEL,
                    format!("`{}` is already declared", ident.text),
                )
                .with_found(ident.text)
                .with_info(format!("first declared at {}", first.start)),
            );
        }
        let node = self.create_node(name, NodeKind::Extern, ident.span)?;
        self.labels.insert(name, node);
        Ok(())
    }

    /// Links the current scope to the named label, or queues the reference
    /// when the label is not declared yet.
    fn reference(&mut self, ident: Token<'src>, dir: Direction) -> Result<(), Fatal> {
        let name = self.intern(ident.text, ident.span)?;
        let Some(scope) = self.scope else {
            return self.report(
                Diagnostic::error(
                    ident.span,
                    codes::SYNTAX_ERROR,
                    format!("reference to `{}` outside any label", ident.text),
                )
                .with_found(ident.text)
                .with_expected("a label declaration first"),
            );
        };

        match self.labels.get(&name).copied() {
            Some(target) => {
                let edge = self.link(scope, target, name, dir, ident.span)?;
                tracing::trace!(%edge, target = ident.text, "reference linked");
            }
            None => self.pending.push(PendingReference {
                scope,
                name,
                dir,
                span: ident.span,
            }),
        }
        Ok(())
    }

    fn open_block(&mut self) -> Result<(), Fatal> {
        let brace = self.bump();
        let depth = self.blocks.len();
        if depth >= self.config.max_block_depth as usize {
            self.report(
                Diagnostic::error(
                    brace.span,
                    codes::UNBALANCED_BLOCK,
                    format!("blocks nested deeper than {}", self.config.max_block_depth),
                )
                .with_found("{"),
            )?;
        }
        self.blocks.push(OpenBlock {
            owner: self.scope,
            span: brace.span,
        });
        Ok(())
    }

    fn close_block(&mut self) -> Result<(), Fatal> {
        let brace = self.bump();
        match self.blocks.pop() {
            Some(block) => {
                self.scope = block.owner;
                Ok(())
            }
            None => self.report(
                Diagnostic::error(brace.span, codes::UNBALANCED_BLOCK, "`}` without matching `{`")
                    .with_found("}"),
            ),
        }
    }

    /// A statement ends at a newline (consumed) or at a brace or end of
    /// input (left for the next line).
    fn expect_line_end(&mut self) -> Result<(), Fatal> {
        let token = self.peek()?;
        match token.kind {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof | TokenKind::LeftBrace | TokenKind::RightBrace => Ok(()),
            _ => self.syntax_error(token, "end of line").map(|_| ()),
        }
    }

    /// Reports `token` as unexpected and resynchronizes.
    fn syntax_error(&mut self, token: Token<'src>, expected: &str) -> Result<Flow, Fatal> {
        let diagnostic = if token.is(TokenKind::Error) {
            let found = if token.text.is_empty() {
                self.source_bytes(token.span)
                    .iter()
                    .map(|b| format!("\\x{b:02X}"))
                    .collect::<String>()
            } else {
                token.text.to_string()
            };
            Diagnostic::error(token.span, codes::LEXICAL_ERROR, "malformed input").with_found(found)
        } else {
            let diagnostic = Diagnostic::error(
                token.span,
                codes::SYNTAX_ERROR,
                format!("unexpected {}", token.kind),
            )
            .with_expected(expected);
            if token.text.is_empty() || token.is(TokenKind::Newline) {
                diagnostic
            } else {
                diagnostic.with_found(token.text)
            }
        };
        self.report(diagnostic)?;
        self.recover()?;
        Ok(Flow::Recovered)
    }

    /// Links every queued forward reference; the rest are reported.
    pub(super) fn resolve_pending(&mut self) -> Result<(), Fatal> {
        let pending = std::mem::take(&mut self.pending);
        let severity = self.config.unresolved_reference_severity;
        let total = pending.len();
        let mut unresolved = 0usize;

        for reference in pending {
            match self.labels.get(&reference.name).copied() {
                Some(target) => {
                    self.link(
                        reference.scope,
                        target,
                        reference.name,
                        reference.dir,
                        reference.span,
                    )?;
                }
                None => {
                    unresolved += 1;
                    let name = self.symbols().resolve(reference.name).unwrap_or("<?>").to_string();
                    self.report(
                        Diagnostic::new(
                            severity,
                            reference.span,
                            codes::UNRESOLVED_REFERENCE,
                            format!("undefined label `{name}`"),
                        )
                        .with_found(name),
                    )?;
                }
            }
        }

        if total > 0 {
            tracing::debug!(total, unresolved, "forward references resolved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ParseConfig;
    use crate::core::Position;
    use crate::diagnostics::{codes, DiagnosticSeverity};
    use crate::graph::{Direction, NodeKind, CONTAINS_LABEL};
    use crate::parser::{ParseContext, ParseResult, ParseState};
    use pretty_assertions::assert_eq;

    fn parse(source: &str) -> ParseResult {
        ParseContext::new(source.as_bytes(), ParseConfig::default()).parse()
    }

    fn codes_of(result: &ParseResult) -> Vec<&str> {
        result.diagnostics().iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn label_then_self_reference() {
        let result = parse("A:\n  jmp A\n");
        assert_eq!(result.state(), ParseState::Succeeded);
        assert!(result.diagnostics().is_empty());

        let graph = result.graph();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);

        let a = graph.find_node(result.symbols().get("A").unwrap()).unwrap();
        let edges: Vec<_> = graph.edges_of(a, Direction::Out).unwrap().collect();
        assert_eq!(edges.len(), 1);
        let edge = graph.edge(edges[0]).unwrap();
        assert_eq!(edge.source, a);
        assert_eq!(edge.target, a);
        assert_eq!(result.symbols().resolve(edge.label).unwrap(), "A");
        assert_eq!(edge.span.start, Position::new(2, 7, 9));
        assert_eq!(edge.span.end, Position::new(2, 8, 10));
    }

    #[test]
    fn label_span_covers_name_and_colon() {
        let result = parse("outer: {\n  start: nop\n}\n");
        let graph = result.graph();
        let start = graph.find_node(result.symbols().get("start").unwrap()).unwrap();
        let span = graph.node_span(start).unwrap();
        assert_eq!(span.start, Position::new(2, 3, 11));
        assert_eq!(span.end, Position::new(2, 9, 17));

        let contains = graph.edges().next().unwrap();
        assert_eq!(result.symbols().resolve(contains.label).unwrap(), CONTAINS_LABEL);
        assert_eq!(contains.span, span);
    }

    #[test]
    fn forward_reference_resolved_at_end() {
        let result = parse("a:\n  jmp b\nb:\n  ret\n");
        assert_eq!(result.state(), ParseState::Succeeded);
        assert!(result.diagnostics().is_empty());

        let symbols = result.symbols();
        let graph = result.graph();
        let a = graph.find_node(symbols.get("a").unwrap()).unwrap();
        let b = graph.find_node(symbols.get("b").unwrap()).unwrap();
        let edge = graph.edges().next().unwrap();
        assert_eq!((edge.source, edge.target), (a, b));
        assert_eq!(edge.span.start.line, 2);
    }

    #[test]
    fn memory_operand_is_inbound_reference() {
        let result = parse("buf:\n  .byte 0\nmain:\n  lea %rax, [buf+8]\n");
        assert!(result.diagnostics().is_empty());
        let graph = result.graph();
        let main = graph.find_node(result.symbols().get("main").unwrap()).unwrap();
        assert_eq!(graph.edges_of(main, Direction::In).unwrap().count(), 1);
        assert_eq!(graph.edges_of(main, Direction::Out).unwrap().count(), 0);
    }

    #[test]
    fn directive_operands_reference_labels() {
        let result = parse("table:\n  .quad handler, 0\nhandler:\n  ret\n");
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn nested_labels_are_contained_and_scope_is_restored() {
        let result = parse("outer: {\n  inner:\n    nop\n}\n  jmp inner\n");
        assert_eq!(result.state(), ParseState::Succeeded);
        assert!(result.diagnostics().is_empty());

        let symbols = result.symbols();
        let graph = result.graph();
        let outer = graph.find_node(symbols.get("outer").unwrap()).unwrap();
        let inner = graph.find_node(symbols.get("inner").unwrap()).unwrap();
        let labels: Vec<_> = graph
            .edges_of(outer, Direction::Out)
            .unwrap()
            .map(|e| {
                let edge = graph.edge(e).unwrap();
                (edge.target, symbols.resolve(edge.label).unwrap().to_string())
            })
            .collect();
        assert_eq!(
            labels,
            vec![(inner, "inner".to_string()), (inner, CONTAINS_LABEL.to_string())]
        );
    }

    #[test]
    fn extern_declares_nodes() {
        let result = parse(".extern printf, puts\nmain:\n  call printf\n");
        assert!(result.diagnostics().is_empty());
        let graph = result.graph();
        assert_eq!(graph.node_count(), 3);
        let printf = graph.find_node(result.symbols().get("printf").unwrap()).unwrap();
        assert_eq!(graph.node(printf).unwrap().kind(), NodeKind::Extern);
        assert_eq!(graph.edges().next().unwrap().target, printf);
    }

    #[test]
    fn name_directives_do_not_reference() {
        let result = parse(".section .text\n.global main\nmain:\n  ret\n");
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.graph().edge_count(), 0);
    }

    #[test]
    fn unresolved_reference_is_reported() {
        let result = parse("a:\n  jmp nowhere\n");
        assert_eq!(result.state(), ParseState::Succeeded);
        assert_eq!(codes_of(&result), vec![codes::UNRESOLVED_REFERENCE]);
        let diag = &result.diagnostics()[0];
        assert_eq!(diag.span.start.line, 2);
        assert_eq!(diag.details.found.as_deref(), Some("nowhere"));
        assert!(result.has_errors());
    }

    #[test]
    fn unresolved_reference_severity_is_configurable() {
        let config = ParseConfig {
            unresolved_reference_severity: DiagnosticSeverity::Warning,
            ..Default::default()
        };
        let result = ParseContext::new(b"a:\n  jmp nowhere\n", config).parse();
        assert_eq!(result.diagnostics()[0].severity, DiagnosticSeverity::Warning);
        assert!(!result.has_errors());
    }

    #[test]
    fn duplicate_label_keeps_original() {
        let result = parse("a:\n  nop\na:\n  jmp a\n");
        assert_eq!(codes_of(&result), vec![codes::DUPLICATE_LABEL]);
        let graph = result.graph();
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.edge_count(), 1);
        let a = graph.find_node(result.symbols().get("a").unwrap()).unwrap();
        assert_eq!(graph.node_span(a).unwrap().start.line, 1);
    }

    #[test]
    fn reference_outside_label_is_syntax_error() {
        let result = parse("jmp a\na:\n");
        assert_eq!(codes_of(&result), vec![codes::SYNTAX_ERROR]);
        assert_eq!(result.graph().edge_count(), 0);
        assert_eq!(result.state(), ParseState::Succeeded);
    }

    #[test]
    fn recovers_at_next_line() {
        let result = parse("a:\n  mov , %rax\n  jmp a\n");
        assert_eq!(codes_of(&result), vec![codes::SYNTAX_ERROR]);
        assert_eq!(result.diagnostics()[0].details.expected.as_deref(), Some("operand"));
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn trailing_tokens_are_reported() {
        let result = parse("a:\n  push %rax %rbx\n  jmp a\n");
        assert_eq!(codes_of(&result), vec![codes::SYNTAX_ERROR]);
        assert_eq!(result.diagnostics()[0].details.expected.as_deref(), Some("end of line"));
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn invalid_utf8_is_lexical_error() {
        let source = b"a:\n  \xFF\xFE\n  jmp a\n";
        let result = ParseContext::new(source, ParseConfig::default()).parse();
        assert_eq!(result.state(), ParseState::Succeeded);
        assert_eq!(codes_of(&result), vec![codes::LEXICAL_ERROR]);
        assert_eq!(result.diagnostics()[0].details.found.as_deref(), Some("\\xFF\\xFE"));
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn invalid_bytes_inside_comment_stay_trivia() {
        let source = b"a: ; caf\xE9 { note\n  jmp a\n";
        let result = ParseContext::new(source, ParseConfig::default()).parse();
        assert_eq!(result.state(), ParseState::Succeeded);
        assert_eq!(codes_of(&result), vec![codes::LEXICAL_ERROR]);
        assert_eq!(result.diagnostics()[0].span.start, Position::new(1, 9, 8));
        assert_eq!(result.graph().node_count(), 1);
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn unbalanced_close_brace_is_recoverable() {
        let result = parse("a:\n}\n  jmp a\n");
        assert_eq!(result.state(), ParseState::Succeeded);
        assert_eq!(codes_of(&result), vec![codes::UNBALANCED_BLOCK]);
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn block_depth_limit() {
        let config = ParseConfig {
            max_block_depth: 1,
            ..Default::default()
        };
        let result = ParseContext::new(b"a: {\n{\n}\n}\n", config).parse();
        assert_eq!(result.state(), ParseState::Succeeded);
        assert_eq!(codes_of(&result), vec![codes::UNBALANCED_BLOCK]);
    }

    #[test]
    fn unclosed_block_fails_and_keeps_graph() {
        let result = parse("a: {\n  b:\n");
        assert_eq!(result.state(), ParseState::Failed);
        assert_eq!(codes_of(&result), vec![codes::UNCLOSED_BLOCK]);
        assert_eq!(result.diagnostics()[0].span.start, Position::new(1, 4, 3));
        assert_eq!(result.graph().node_count(), 2);
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn nul_byte_fails_the_parse() {
        let result = ParseContext::new(b"a:\n  jmp a\n\0\nb:\n", ParseConfig::default()).parse();
        assert_eq!(result.state(), ParseState::Failed);
        assert_eq!(codes_of(&result), vec![codes::CORRUPT_INPUT]);
        assert_eq!(result.graph().node_count(), 1);
        assert_eq!(result.graph().edge_count(), 1);
        result.graph().check_invariants().unwrap();
    }

    #[test]
    fn same_line_label_and_instruction() {
        let result = parse("loop: dec %rcx\n  jne loop\n");
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.graph().edge_count(), 1);
    }

    #[test]
    fn negative_immediates_and_comments() {
        let result = parse("a: ; entry\n  add %rsp, -16 # adjust\n  mov [%rbp-8], 0x10\n");
        assert!(result.diagnostics().is_empty());
        assert_eq!(result.graph().node_count(), 1);
    }
}
