//! `membist verify` — check memory against the configured pattern.
//!
//! Each invocation builds a fresh simulated memory, so on its own this only
//! passes when `memory.fill` already matches the pattern. Use `membist test`
//! to write and verify in one session.

use crate::setup::{describe, open, render, RunOutput};
use crate::{GlobalArgs, RunArgs};

/// Runs the `membist verify` command.
///
/// Returns exit code 0 if every read matched, 1 otherwise.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut session = open(args, global)?;

    if !global.quiet {
        eprintln!("   Verifying {}", describe(&session.setup.plan));
    }

    let report = session.setup.verify(&mut session.bist)?;
    session.bist.finish_trace()?;

    let output = RunOutput {
        write: None,
        verify: Some(&report),
        memory: session.bist.transport().stats(),
    };
    println!(
        "{}",
        render(&output, args.format, session.setup.params.data_width)
    );
    Ok(if report.passed() { 0 } else { 1 })
}
