use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, Subcommand};
use jobflow::{ConsoleOutput, Output, Verbosity, Workflow};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobflow")]
#[command(version, about = "Run declarative job/step workflows", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow file
    ///
    /// Examples:
    ///     jobflow run --flow ./flows/report.yaml
    ///     jobflow run -f ./flows/report.yaml -vv
    #[command(verbatim_doc_comment)]
    Run {
        /// Path to the workflow YAML file
        #[arg(short, long, value_name = "FILE")]
        flow: PathBuf,

        /// Only report errors
        #[arg(short, long, conflicts_with = "verbose")]
        quiet: bool,

        /// Increase verbosity (-v, -vv, -vvv)
        #[arg(short, long, action = ArgAction::Count)]
        verbose: u8,
    },
}

fn verbosity(quiet: bool, verbose: u8) -> Option<Verbosity> {
    match (quiet, verbose) {
        (true, _) => Some(Verbosity::Quiet),
        (false, 0) => None,
        (false, 1) => Some(Verbosity::Verbose),
        (false, 2) => Some(Verbosity::VeryVerbose),
        (false, _) => Some(Verbosity::Debug),
    }
}

fn init_tracing() {
    // the workflow logger does the level filtering; RUST_LOG can still narrow it
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(flow: PathBuf, verbosity: Option<Verbosity>) -> Result<()> {
    let output = ConsoleOutput::new();
    if !flow.is_file() {
        anyhow::bail!("Workflow file not found: {}", flow.display());
    }

    output.writeln("<info>Parsing workflow...</info>");
    let definition = jobflow::load_file(&flow)?;

    let mut workflow = Workflow::from_definition(definition);
    if let Some(verbosity) = verbosity {
        workflow.set_verbosity(verbosity);
    }

    let result = workflow
        .run()
        .with_context(|| format!("Workflow '{}' failed", workflow.name()))?;

    tracing::debug!(
        run_id = %result.run_id,
        steps = result.steps.len(),
        total_ms = result.total_ms,
        "Run finished"
    );
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            flow,
            quiet,
            verbose,
        } => run(flow, verbosity(quiet, verbose)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_flags() {
        assert_eq!(verbosity(false, 0), None);
        assert_eq!(verbosity(true, 0), Some(Verbosity::Quiet));
        assert_eq!(verbosity(false, 1), Some(Verbosity::Verbose));
        assert_eq!(verbosity(false, 2), Some(Verbosity::VeryVerbose));
        assert_eq!(verbosity(false, 5), Some(Verbosity::Debug));
    }

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from(["jobflow", "run", "--flow", "w.yaml", "-vv"]).unwrap();
        let Commands::Run { flow, quiet, verbose } = cli.command;
        assert_eq!(flow, PathBuf::from("w.yaml"));
        assert!(!quiet);
        assert_eq!(verbose, 2);
    }

    #[test]
    fn test_missing_flow_file() {
        let err = run(PathBuf::from("/definitely/not/here.yaml"), None).unwrap_err();
        assert!(err.to_string().contains("Workflow file not found"));
    }
}
