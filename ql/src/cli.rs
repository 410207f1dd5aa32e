//! CLI definitions for the `ql` demo binary

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ExecutorKind;

/// ql - cooperative, quantized line processing
#[derive(Parser)]
#[command(
    name = "ql",
    about = "Stream a file through a quantized iterator that yields between quanta",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Logs are written to: ~/.local/share/quantloop/logs/ql.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Echo every line of a file, a quantum at a time
    Run {
        /// File to read
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Max lines per quantum
        #[arg(short, long, conflicts_with = "budget_ms")]
        step: Option<usize>,

        /// Max milliseconds per quantum
        #[arg(short, long)]
        budget_ms: Option<u64>,

        /// Executor that resumes the iterator between quanta
        #[arg(short, long)]
        executor: Option<ExecutorKind>,

        /// Cancel from a separate task after this many milliseconds
        #[arg(long)]
        cancel_after_ms: Option<u64>,

        /// Output format for the summary
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the run summary
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from(["ql", "run", "input.txt", "--step", "4", "--format", "json"]).unwrap();
        let Command::Run {
            input, step, format, ..
        } = cli.command;
        assert_eq!(input, PathBuf::from("input.txt"));
        assert_eq!(step, Some(4));
        assert_eq!(format, OutputFormat::Json);
    }

    #[test]
    fn test_step_and_budget_conflict() {
        let result = Cli::try_parse_from(["ql", "run", "input.txt", "--step", "4", "--budget-ms", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_executor_flag() {
        let cli = Cli::try_parse_from(["ql", "--log-level", "debug", "run", "f", "-e", "serial"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Run { executor, .. } = cli.command;
        assert_eq!(executor, Some(ExecutorKind::Serial));
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("PLAIN".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
