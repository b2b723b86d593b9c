use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use teal_analyzer::prelude::*;

#[derive(Parser)]
#[command(version, about = "Static analyzer for TEAL smart-contract programs")]
struct Cli {
    /// Attach group information from a TOML file
    #[arg(long, global = true, value_name = "FILE")]
    group_config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the applicable detectors over the given programs
    Detect {
        /// Program source files, one program per file
        #[arg(long, required = true, num_args = 1..)]
        contracts: Vec<PathBuf>,

        /// Only run these detectors (comma separated)
        #[arg(long, value_delimiter = ',')]
        detectors: Vec<String>,

        /// Skip these detectors (comma separated)
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },
    /// Run a single printer over the given programs
    Print {
        /// Printer identifier (cfg-dot, call-graph-dot, human-summary)
        printer: String,

        /// Program source files, one program per file
        #[arg(long, required = true, num_args = 1..)]
        contracts: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match cli.group_config.as_deref().map(GroupConfig::load) {
        None => None,
        Some(Ok(config)) => Some(config),
        Some(Err(error)) => {
            eprintln!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let ok = match cli.command {
        Command::Detect {
            contracts,
            detectors,
            exclude,
        } => detect(&contracts, config.as_ref(), &detectors, &exclude),
        Command::Print { printer, contracts } => print(&printer, &contracts, config.as_ref()),
    };
    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parse and analyze one program file.
fn analyze_file(path: &Path, config: Option<&GroupConfig>) -> Result<Analysis, AnalysisError> {
    let display = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| AnalysisError::Io {
        path: display.clone(),
        source,
    })?;
    let program = Program::parse(&text).map_err(|source| AnalysisError::Parse {
        path: display.clone(),
        source,
    })?;
    let seed = config
        .and_then(|c| c.contract_for_source(path))
        .map(|decl| decl.name.clone())
        .and_then(|name| config.and_then(|c| c.entry_state(&name)));
    Analysis::build(program, seed).map_err(|source| AnalysisError::Cfg {
        path: display,
        source,
    })
}

/// Run detectors over every program. Failures are reported per program
/// and analysis continues with the next one.
fn detect(
    contracts: &[PathBuf],
    config: Option<&GroupConfig>,
    include: &[String],
    exclude: &[String],
) -> bool {
    let registry = DetectorRegistry::with_defaults();
    let detectors = registry.select(include, exclude);
    let mut ok = true;

    for path in contracts {
        let analysis = match analyze_file(path, config) {
            Ok(analysis) => analysis,
            Err(error) => {
                eprintln!("{error}");
                ok = false;
                continue;
            }
        };
        let findings = run_detectors(&analysis, &detectors);
        report(path, &findings);
    }
    ok
}

fn report(path: &Path, findings: &[Finding]) {
    println!("{}: {} finding(s)", path.display(), findings.len());
    if findings.is_empty() {
        return;
    }
    println!(
        "  {:<22} {:<14} {:<11} description",
        "detector", "severity", "confidence"
    );
    for finding in findings {
        println!(
            "  {:<22} {:<14} {:<11} {}",
            finding.detector, finding.severity, finding.confidence, finding.description
        );
        let blocks: Vec<String> = finding
            .path
            .iter()
            .map(|id| format!("b{id}"))
            .collect();
        let lines: Vec<String> = finding.lines.iter().map(u32::to_string).collect();
        println!(
            "      path: {} (lines {})",
            blocks.join(" -> "),
            lines.join(", ")
        );
    }
}

/// Run one printer over every program.
fn print(printer: &str, contracts: &[PathBuf], config: Option<&GroupConfig>) -> bool {
    let registry = PrinterRegistry::with_defaults();
    let Some(printer) = registry.build(printer) else {
        let known: Vec<&str> = registry.ids().collect();
        eprintln!("unknown printer `{printer}`; known printers: {}", known.join(", "));
        return false;
    };

    let mut ok = true;
    for path in contracts {
        match analyze_file(path, config) {
            Ok(analysis) => {
                let mut stdout = std::io::stdout().lock();
                if let Err(error) = printer.print(&analysis, &mut stdout) {
                    eprintln!("{}: {error}", path.display());
                    ok = false;
                }
            }
            Err(error) => {
                eprintln!("{error}");
                ok = false;
            }
        }
    }
    ok
}
