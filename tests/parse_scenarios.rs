/*!
End-to-end parses through the public API
*/

use awasm_parser::core::Span;
use awasm_parser::diagnostics::codes;
use awasm_parser::graph::{Direction, NodeKind, SourceGraph, SymbolTable};
use awasm_parser::{parse, AwasmParser, ParseConfig, ParseState};
use pretty_assertions::assert_eq;

const PROGRAM: &str = "\
.extern puts
.section .text
main: {
    lea %rdi, [msg]
    call puts
  loop:
    dec %rcx
    jne loop
}
    ret
msg:
    .ascii \"hi\"
";

#[test]
fn test_two_line_scenario() {
    let result = parse(b"A:\n  jmp A\n");
    assert_eq!(result.state(), ParseState::Succeeded);

    let graph = result.graph();
    let symbols = result.symbols();
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 1);

    let edge = graph.edges().next().unwrap();
    assert_eq!(symbols.resolve(edge.label).unwrap(), "A");
    assert_eq!(edge.direction, Direction::Out);
    assert_eq!(edge.span.start.line, 2);
}

#[test]
fn test_program_graph_shape() {
    let result = parse(PROGRAM.as_bytes());
    assert!(result.is_success(), "{:?}", result.diagnostics());

    let graph = result.graph();
    let symbols = result.symbols();
    let node = |name: &str| graph.find_node(symbols.get(name).unwrap()).unwrap();
    let (puts, main, lp, msg) = (node("puts"), node("main"), node("loop"), node("msg"));

    assert_eq!(graph.node(puts).unwrap().kind(), NodeKind::Extern);
    assert_eq!(graph.node_count(), 4);

    let targets = |from, dir| -> Vec<_> {
        graph
            .edges_of(from, dir)
            .unwrap()
            .map(|e| {
                let edge = graph.edge(e).unwrap();
                (edge.target, symbols.resolve(edge.label).unwrap().to_string())
            })
            .collect()
    };

    // newest first; `msg` is a forward reference linked at end of input
    assert_eq!(
        targets(main, Direction::In),
        vec![(msg, "msg".to_string())]
    );
    assert_eq!(
        targets(main, Direction::Out),
        vec![(lp, "<contains>".to_string()), (puts, "puts".to_string())]
    );
    assert_eq!(targets(lp, Direction::Out), vec![(lp, "loop".to_string())]);
    assert_eq!(graph.edge_count(), 4);
    graph.check_invariants().unwrap();
}

#[test]
fn test_failed_parse_keeps_diagnostics_in_order() {
    let result = parse(b"a:\n  mov ,\n  jmp nowhere\n  jmp a\n}\n{\n");
    assert_eq!(result.state(), ParseState::Failed);
    let found: Vec<_> = result.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(
        found,
        vec![
            codes::SYNTAX_ERROR,
            codes::UNBALANCED_BLOCK,
            codes::UNRESOLVED_REFERENCE,
            codes::UNCLOSED_BLOCK,
        ]
    );
    assert_eq!(result.graph().edge_count(), 1);
    assert!(!result.is_success());
}

#[test]
fn test_comment_after_invalid_bytes_adds_nothing() {
    let result = parse(b"a:\n  ret ; r\xE9sum\xE9 { jmp b } [c] {\n  jmp a\n");
    assert_eq!(result.state(), ParseState::Succeeded);
    let found: Vec<_> = result.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(found, vec![codes::LEXICAL_ERROR]);
    assert_eq!(result.diagnostics()[0].span.start.line, 2);
    assert_eq!(result.diagnostics()[0].span.start.column, 10);

    let graph = result.graph();
    assert_eq!(graph.node_count(), 1);
    assert_eq!(graph.edge_count(), 1);
    assert!(result.symbols().get("b").is_none());
    assert!(result.symbols().get("c").is_none());
}

#[test]
fn test_comment_with_only_invalid_bytes_is_clean() {
    let result = parse(b"a: {\n  ; \xFF { }\n  jmp a\n}\n");
    assert_eq!(result.state(), ParseState::Succeeded);
    let found: Vec<_> = result.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(found, vec![codes::LEXICAL_ERROR]);
    assert_eq!(result.graph().edge_count(), 1);
}

#[test]
fn test_string_after_invalid_bytes_adds_nothing() {
    let result = parse(b"a:\n  .ascii \"caf\xE9 } b\", c\n  jmp a\n");
    assert_eq!(result.state(), ParseState::Succeeded);
    let found: Vec<_> = result.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(found, vec![codes::LEXICAL_ERROR]);
    assert_eq!(result.graph().edge_count(), 1);
}

#[test]
fn test_step_can_be_abandoned() {
    let source = b"a:\n  jmp b\nb:\n  jmp a\n";
    let mut ctx = awasm_parser::ParseContext::new(source, ParseConfig::default());
    assert_eq!(ctx.state(), ParseState::Fresh);
    ctx.step();
    ctx.step();
    assert_eq!(ctx.state(), ParseState::Parsing);
    // the forward reference to `b` is still pending
    assert_eq!(ctx.graph().edge_count(), 0);
    ctx.graph().check_invariants().unwrap();
    drop(ctx);
}

#[test]
fn test_zero_diagnostic_limit() {
    let config = ParseConfig {
        max_diagnostics: Some(0),
        ..Default::default()
    };
    let result = AwasmParser::with_config(config).parse_bytes(b"a:\n  jmp a\n  @\n");
    assert_eq!(result.state(), ParseState::Failed);
    let found: Vec<_> = result.diagnostics().iter().map(|d| d.code.as_str()).collect();
    assert_eq!(found, vec![codes::LEXICAL_ERROR, codes::TOO_MANY_DIAGNOSTICS]);
}

#[test]
fn test_unlimited_diagnostics() {
    let config = ParseConfig {
        max_diagnostics: None,
        ..Default::default()
    };
    let source = "a:\n".to_string() + &"  @\n".repeat(500);
    let result = AwasmParser::with_config(config).parse_bytes(source.as_bytes());
    assert_eq!(result.state(), ParseState::Succeeded);
    assert_eq!(result.error_count(), 500);
}

#[cfg(not(feature = "wide-index"))]
#[test]
fn test_capacity_exceeded_fails_parse() {
    let mut source = String::new();
    for i in 0..70_000 {
        source.push_str(&format!("l{i}:\n"));
    }
    let result = parse(source.as_bytes());
    assert_eq!(result.state(), ParseState::Failed);
    let last = result.diagnostics().last().unwrap();
    assert_eq!(last.code, codes::CAPACITY_EXCEEDED);
    assert!(result.graph().node_count() <= awasm_parser::graph::INDEX_CAPACITY);
    result.graph().check_invariants().unwrap();
}

#[test]
fn test_interning_scenario() {
    let mut symbols = SymbolTable::new();
    let handles: Vec<_> =
        ["foo", "bar", "foo"].iter().map(|s| symbols.intern(s).unwrap()).collect();
    assert_eq!(handles[0], handles[2]);
    assert_ne!(handles[0], handles[1]);
    assert_eq!(symbols.resolve(handles[1]).unwrap(), "bar");
}

#[test]
fn test_removing_only_edge() {
    let mut symbols = SymbolTable::new();
    let mut graph = SourceGraph::new();
    let name = symbols.intern("a").unwrap();
    let node = graph.create_node(name, NodeKind::Label, Span::zero()).unwrap();
    let edge = graph.add_edge(node, node, name, Direction::Out, Span::zero()).unwrap();

    graph.remove_edge(edge).unwrap();
    assert_eq!(graph.edges_of(node, Direction::Out).unwrap().count(), 0);
    assert_eq!(graph.free_slot_count(), 1);
    assert_eq!(graph.is_slot_free(edge.slot()), Some(true));

    let again = graph.add_edge(node, node, name, Direction::In, Span::zero()).unwrap();
    assert_eq!(again.slot(), edge.slot());
    assert_ne!(again.generation(), edge.generation());
    assert_eq!(graph.is_slot_free(again.slot()), Some(false));
    assert!(graph.edge(edge).is_err());
}
