//! `membist test` — fill memory, then check it, in one session.

use crate::setup::{describe, open, render, RunOutput};
use crate::{GlobalArgs, RunArgs};

/// Runs the `membist test` command.
///
/// Writes the pattern and then verifies it against the same simulated
/// memory, so any mismatch comes from an injected fault.
/// Returns exit code 0 if every read matched, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut session = open(args, global)?;
    let what = describe(&session.setup.plan);

    if !global.quiet {
        eprintln!("     Writing {what}");
    }
    let summary = session.setup.write(&mut session.bist)?;

    if !global.quiet {
        eprintln!("   Verifying {what}");
    }
    let report = session.setup.verify(&mut session.bist)?;
    session.bist.finish_trace()?;

    let output = RunOutput {
        write: Some(&summary),
        verify: Some(&report),
        memory: session.bist.transport().stats(),
    };
    println!(
        "{}",
        render(&output, args.format, session.setup.params.data_width)
    );

    if !global.quiet {
        if report.passed() {
            eprintln!("      Passed {} words", report.transfers);
        } else {
            eprintln!("      Failed with {} mismatches", report.error_count);
        }
    }
    Ok(if report.passed() { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::tests::{args, global_for, REGION_CONFIG};
    use crate::ReportFormat;
    use tempfile::TempDir;

    const FAULTY_CONFIG: &str = r#"
[[memory.faults]]
address = "0x44"
kind = "stuck"
value = 0

[pattern]
data = ["0x5555", "0xaaaa"]

[region]
base = "0x40"
words = 16
"#;

    #[test]
    fn clean_memory_passes() {
        let dir = TempDir::new().unwrap();
        let global = global_for(&dir, REGION_CONFIG);
        assert_eq!(run(&args(), &global).unwrap(), 0);
    }

    #[test]
    fn injected_fault_fails() {
        let dir = TempDir::new().unwrap();
        let global = global_for(&dir, FAULTY_CONFIG);
        assert_eq!(run(&args(), &global).unwrap(), 1);
    }

    #[test]
    fn skip_fifo_still_fails() {
        let dir = TempDir::new().unwrap();
        let global = global_for(&dir, FAULTY_CONFIG);
        let mut run_args = args();
        run_args.skip_fifo = true;
        run_args.format = ReportFormat::Json;
        assert_eq!(run(&run_args, &global).unwrap(), 1);
    }

    #[test]
    fn register_plan_with_trace() {
        let dir = TempDir::new().unwrap();
        let global = global_for(
            &dir,
            r#"
[engine]
depth = 2

[[pattern.entries]]
address = "0x10"
data = "0xaa"

[[pattern.entries]]
address = "0x20"
data = "0x55"

[run]
count = 4
data_mask = 1
"#,
        );
        let trace = dir.path().join("test.vcd");
        let mut run_args = args();
        run_args.trace = Some(trace.to_str().unwrap().to_string());
        assert_eq!(run(&run_args, &global).unwrap(), 0);
        let text = std::fs::read_to_string(&trace).unwrap();
        assert!(text.contains("$enddefinitions $end"));
        assert!(text.contains("error_count"));
    }
}
