//! Shared plumbing for the run commands: configuration lookup, session
//! setup, and report rendering.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use membist_config::{load_config, load_config_file, resolve, ResolvedSetup, RunPlan};
use membist_engine::{vcd_file, Bist, MemoryStats, MemtestReport, RunSummary, SimMemory};
use serde::Serialize;

use crate::{GlobalArgs, ReportFormat, RunArgs};

/// A resolved configuration together with the tester it built.
pub struct Session {
    /// Resolved settings, with command line overrides applied.
    pub setup: ResolvedSetup,
    /// Tester over a fresh simulated memory.
    pub bist: Bist<SimMemory>,
}

/// Report printed by the run commands.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    /// Writer run, if one happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<&'a RunSummary>,
    /// Reader run, if one happened.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<&'a MemtestReport>,
    /// Device request counters.
    pub memory: MemoryStats,
}

/// Finds the configuration file named by `--config`, or `membist.toml` in
/// the current directory.
pub fn config_location(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    match global.config {
        Some(ref path) => Ok(PathBuf::from(path)),
        None => Ok(std::env::current_dir()?),
    }
}

/// Loads and resolves the configuration, then applies the run overrides.
pub fn load_setup(
    args: &RunArgs,
    global: &GlobalArgs,
) -> Result<ResolvedSetup, Box<dyn std::error::Error>> {
    let location = config_location(global)?;
    let config = if location.is_file() {
        load_config_file(&location)?
    } else {
        load_config(&location)?
    };
    let mut setup = resolve(&config)?;
    if args.max_cycles.is_some() {
        setup.max_cycles = args.max_cycles;
    }
    if args.skip_fifo {
        setup.skip_fifo = true;
    }
    Ok(setup)
}

/// Loads the configuration and builds a tester, attaching a trace if asked.
pub fn open(args: &RunArgs, global: &GlobalArgs) -> Result<Session, Box<dyn std::error::Error>> {
    let setup = load_setup(args, global)?;
    let mut bist = setup.build()?;
    if let Some(ref trace) = args.trace {
        bist.set_recorder(vcd_file(Path::new(trace))?)?;
        log::debug!("tracing to {trace}");
    }
    Ok(Session { setup, bist })
}

/// One-line description of what a run covers, for status output.
pub fn describe(plan: &RunPlan) -> String {
    match plan {
        RunPlan::Region { base, words, .. } => format!("{words} words at {base:#x}"),
        RunPlan::Registers { entries, count, .. } => {
            format!("{count} transfers over {} pattern entries", entries.len())
        }
    }
}

/// Renders a report in the requested format.
pub fn render(output: &RunOutput<'_>, format: ReportFormat, data_width: u32) -> String {
    match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string())
        }
        ReportFormat::Text => render_text(output, data_width),
    }
}

fn render_text(output: &RunOutput<'_>, data_width: u32) -> String {
    let digits = data_width.div_ceil(4) as usize;
    let mut text = String::new();
    if let Some(write) = output.write {
        let _ = writeln!(
            text,
            "wrote {} words in {} cycles",
            write.transfers, write.cycles
        );
    }
    if let Some(verify) = output.verify {
        let _ = writeln!(
            text,
            "verified {} words in {} cycles: {} mismatches",
            verify.transfers, verify.cycles, verify.error_count
        );
        for error in &verify.errors {
            let _ = writeln!(
                text,
                "  mismatch at {:#010x}: read {:#0w$x}, expected {:#0w$x}",
                error.offset,
                error.data,
                error.expected,
                w = digits + 2
            );
        }
        let unrecorded = (verify.error_count as usize).saturating_sub(verify.errors.len());
        if unrecorded > 0 {
            let _ = writeln!(text, "  ({unrecorded} mismatches counted but not recorded)");
        }
    }
    let _ = write!(
        text,
        "memory: {} writes, {} reads",
        output.memory.writes, output.memory.reads
    );
    text
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use membist_engine::ErrorRecord;
    use tempfile::TempDir;

    pub(crate) const REGION_CONFIG: &str = r#"
[engine]
data_width = 16

[pattern]
data = ["0x5555", "0xaaaa"]

[region]
base = "0x40"
words = 16

[run]
max_cycles = 10000
"#;

    pub(crate) fn global_for(dir: &TempDir, toml: &str) -> GlobalArgs {
        let path = dir.path().join("membist.toml");
        std::fs::write(&path, toml).unwrap();
        GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(path.to_str().unwrap().to_string()),
        }
    }

    pub(crate) fn args() -> RunArgs {
        RunArgs {
            max_cycles: None,
            skip_fifo: false,
            trace: None,
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn config_from_directory() {
        let dir = TempDir::new().unwrap();
        let mut global = global_for(&dir, REGION_CONFIG);
        global.config = Some(dir.path().to_str().unwrap().to_string());
        let setup = load_setup(&args(), &global).unwrap();
        assert_eq!(setup.params.data_width, 16);
    }

    #[test]
    fn overrides_applied() {
        let dir = TempDir::new().unwrap();
        let global = global_for(&dir, REGION_CONFIG);
        let mut run_args = args();
        run_args.max_cycles = Some(7);
        run_args.skip_fifo = true;
        let setup = load_setup(&run_args, &global).unwrap();
        assert_eq!(setup.max_cycles, Some(7));
        assert!(setup.skip_fifo);
    }

    #[test]
    fn missing_config_errors() {
        let dir = TempDir::new().unwrap();
        let global = GlobalArgs {
            quiet: true,
            verbose: false,
            config: Some(dir.path().to_str().unwrap().to_string()),
        };
        assert!(load_setup(&args(), &global).is_err());
    }

    #[test]
    fn open_attaches_trace() {
        let dir = TempDir::new().unwrap();
        let global = global_for(&dir, REGION_CONFIG);
        let trace = dir.path().join("run.vcd");
        let mut run_args = args();
        run_args.trace = Some(trace.to_str().unwrap().to_string());
        let mut session = open(&run_args, &global).unwrap();
        session.bist.finish_trace().unwrap();
        let text = std::fs::read_to_string(&trace).unwrap();
        assert!(text.contains("$scope module bist $end"));
    }

    #[test]
    fn describe_plans() {
        let region = RunPlan::Region {
            base: 0x40,
            words: 16,
            pattern: vec![1],
        };
        assert_eq!(describe(&region), "16 words at 0x40");
        let registers = RunPlan::Registers {
            entries: Vec::new(),
            count: 4,
            mem_mask: 0,
            data_mask: 0,
        };
        assert_eq!(describe(&registers), "4 transfers over 0 pattern entries");
    }

    #[test]
    fn text_report_lists_mismatches() {
        let report = MemtestReport {
            transfers: 4,
            error_count: 3,
            errors: vec![ErrorRecord {
                offset: 0x20,
                data: 0xff,
                expected: 0x55,
            }],
            cycles: 12,
        };
        let output = RunOutput {
            write: None,
            verify: Some(&report),
            memory: MemoryStats::default(),
        };
        let text = render(&output, ReportFormat::Text, 8);
        assert!(text.contains("verified 4 words in 12 cycles: 3 mismatches"));
        assert!(text.contains("mismatch at 0x00000020: read 0xff, expected 0x55"));
        assert!(text.contains("(2 mismatches counted but not recorded)"));
    }

    #[test]
    fn json_report_is_structured() {
        let summary = RunSummary {
            transfers: 16,
            cycles: 20,
        };
        let output = RunOutput {
            write: Some(&summary),
            verify: None,
            memory: MemoryStats {
                writes: 16,
                reads: 0,
                faulted_reads: 0,
            },
        };
        let json = render(&output, ReportFormat::Json, 32);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["write"]["transfers"], 16);
        assert_eq!(value["memory"]["writes"], 16);
        assert!(value.get("verify").is_none());
    }
}
