//! Membist CLI — runs the memory exerciser against a simulated device.
//!
//! Provides `membist write` to fill memory from the configured pattern,
//! `membist verify` to check memory against it, and `membist test` to do
//! both in one session. Settings come from `membist.toml`.

#![warn(missing_docs)]

mod setup;
mod test;
mod verify;
mod write;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

/// Membist — a pattern-driven memory write and verify tool.
#[derive(Parser, Debug)]
#[command(name = "membist", version, about = "Pattern-driven memory exerciser")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (debug-level) output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a `membist.toml` file or the directory containing it.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fill memory with the configured pattern.
    Write(RunArgs),
    /// Check memory against the configured pattern.
    Verify(RunArgs),
    /// Fill memory, then check it.
    Test(RunArgs),
}

/// Arguments shared by the run commands.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Step limit per run, overriding `run.max_cycles`.
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Count mismatches without recording them.
    #[arg(long)]
    pub skip_fifo: bool,

    /// Record a VCD trace of the engines to this file.
    #[arg(long)]
    pub trace: Option<String>,

    /// Output format for the run report.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Run report output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose/debug information.
    pub verbose: bool,
    /// Optional path to a config file or directory.
    pub config: Option<String>,
}

impl GlobalArgs {
    /// Log level implied by the verbosity flags.
    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Error
        } else {
            LevelFilter::Info
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        config: cli.config,
    };

    // RUST_LOG, when set, takes precedence over the flags.
    env_logger::Builder::new()
        .filter_level(global.log_level())
        .format_timestamp(None)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Command::Write(ref args) => write::run(args, &global),
        Command::Verify(ref args) => verify::run(args, &global),
        Command::Test(ref args) => test::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parse_write_default() {
        let cli = Cli::parse_from(["membist", "write"]);
        match cli.command {
            Command::Write(ref args) => {
                assert!(args.max_cycles.is_none());
                assert!(!args.skip_fifo);
                assert!(args.trace.is_none());
                assert_eq!(args.format, ReportFormat::Text);
            }
            _ => panic!("expected Write command"),
        }
    }

    #[test]
    fn parse_verify_with_args() {
        let cli = Cli::parse_from([
            "membist",
            "verify",
            "--max-cycles",
            "5000",
            "--skip-fifo",
            "--trace",
            "run.vcd",
            "--format",
            "json",
        ]);
        match cli.command {
            Command::Verify(ref args) => {
                assert_eq!(args.max_cycles, Some(5000));
                assert!(args.skip_fifo);
                assert_eq!(args.trace.as_deref(), Some("run.vcd"));
                assert_eq!(args.format, ReportFormat::Json);
            }
            _ => panic!("expected Verify command"),
        }
    }

    #[test]
    fn parse_test_short_format() {
        let cli = Cli::parse_from(["membist", "test", "-f", "json"]);
        match cli.command {
            Command::Test(ref args) => assert_eq!(args.format, ReportFormat::Json),
            _ => panic!("expected Test command"),
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from(["membist", "--quiet", "test"]);
        assert!(cli.quiet);
        assert!(!cli.verbose);
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["membist", "write", "-v", "--config", "/tmp/membist.toml"]);
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("/tmp/membist.toml"));
    }

    #[test]
    fn parse_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["membist", "write", "--format", "xml"]).is_err());
    }

    #[test]
    fn log_level_from_flags() {
        let mut global = GlobalArgs {
            quiet: false,
            verbose: false,
            config: None,
        };
        assert_eq!(global.log_level(), LevelFilter::Info);
        global.quiet = true;
        assert_eq!(global.log_level(), LevelFilter::Error);
        global.verbose = true;
        assert_eq!(global.log_level(), LevelFilter::Debug);
    }
}
