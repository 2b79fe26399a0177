//! `membist write` — fill memory with the configured pattern.

use crate::setup::{describe, open, render, RunOutput};
use crate::{GlobalArgs, RunArgs};

/// Runs the `membist write` command.
///
/// Builds a tester from the configuration and runs the write engine over
/// the planned region or registers. Returns exit code 0 once the run
/// completes.
pub fn run(args: &RunArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let mut session = open(args, global)?;

    if !global.quiet {
        eprintln!("     Writing {}", describe(&session.setup.plan));
    }

    let summary = session.setup.write(&mut session.bist)?;
    session.bist.finish_trace()?;

    let output = RunOutput {
        write: Some(&summary),
        verify: None,
        memory: session.bist.transport().stats(),
    };
    println!(
        "{}",
        render(&output, args.format, session.setup.params.data_width)
    );
    Ok(0)
}
