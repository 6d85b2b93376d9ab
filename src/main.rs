/*!
# awasm-parse CLI

Parses one awasm source file and reports diagnostics, graph statistics or a
full graph dump.
*/

use anyhow::{Context, Result};
use awasm_parser::{AwasmParser, Diagnostic, DiagnosticSeverity, ParseConfig, ParseResult};
use clap::{Parser, ValueEnum};
use console::{style, Term};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "awasm-parse",
    version = env!("CARGO_PKG_VERSION"),
    about = "Parse an awasm source file into a source graph"
)]
struct Cli {
    /// Source file to parse
    file: PathBuf,

    /// Parse configuration (TOML, or YAML by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Print every node with its edges
    #[arg(long)]
    dump: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    file: String,
    state: awasm_parser::ParseState,
    stats: awasm_parser::GraphStats,
    diagnostics: &'a [Diagnostic],
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("awasm_parser={log_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = match &cli.config {
        Some(path) => ParseConfig::load_from_file(path)?,
        None => ParseConfig::default(),
    };

    let parser = AwasmParser::with_config(config);
    let result = parser.parse_file(&cli.file)?;

    match cli.format {
        OutputFormat::Text => print_text(&cli, &result)?,
        OutputFormat::Json => {
            let report = JsonReport {
                file: cli.file.display().to_string(),
                state: result.state(),
                stats: result.stats(),
                diagnostics: result.diagnostics(),
            };
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{json}");
        }
    }

    if !result.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_text(cli: &Cli, result: &ParseResult) -> Result<()> {
    let term = Term::stdout();
    let file = cli.file.display();

    for diagnostic in result.diagnostics() {
        let severity = match diagnostic.severity {
            DiagnosticSeverity::Error => style(diagnostic.severity.to_string()).red().bold(),
            DiagnosticSeverity::Warning => style(diagnostic.severity.to_string()).yellow().bold(),
            DiagnosticSeverity::Info | DiagnosticSeverity::Hint => {
                style(diagnostic.severity.to_string()).cyan()
            }
        };
        let mut line = format!(
            "{}:{}: {}[{}]: {}",
            file,
            diagnostic.span.start,
            severity,
            diagnostic.code,
            diagnostic.message
        );
        if let Some(expected) = &diagnostic.details.expected {
            line.push_str(&format!(" (expected {expected})"));
        }
        term.write_line(&line)?;
        if let Some(info) = &diagnostic.details.info {
            term.write_line(&format!("  {}: {}", style("note").dim(), info))?;
        }
    }

    if cli.dump {
        term.write_str(&result.display().to_string())?;
    }

    let stats = result.stats();
    let status = if result.is_success() {
        style("ok").green().bold()
    } else {
        style("failed").red().bold()
    };
    term.write_line(&format!(
        "{}: {} ({} nodes, {} edges, {} errors, {} diagnostics)",
        file,
        status,
        stats.nodes,
        stats.live_edges,
        result.error_count(),
        result.diagnostics().len()
    ))?;
    Ok(())
}
