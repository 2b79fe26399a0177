//! Host-side drivers for whole-region fills and checks.
//!
//! [`memset`] and [`memtest`] program the pattern table and the run
//! registers for a contiguous region, strobe `start`, and step the system
//! until the run completes. A region of `words` transfers starting at `base`
//! maps onto the engine as one pattern entry per pattern word, all at
//! `base`, with `mem_mask = words - 1` supplying the offset and
//! `data_mask = pattern.len() - 1` cycling through the data words.
//!
//! [`write_run`] and [`verify_run`] do the same stepping for registers a
//! caller has programmed by hand.

use serde::Serialize;

use crate::error::BistError;
use crate::pattern::{DataWord, PatternEntry};
use crate::read::ErrorRecord;
use crate::system::Bist;
use crate::transport::Transport;

/// Outcome of a [`memset`] run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Writes completed.
    pub transfers: u32,
    /// Steps the run took.
    pub cycles: u64,
}

/// Options for [`memtest`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemtestOptions {
    /// Count mismatches without queueing them.
    pub skip_fifo: bool,
    /// Fail with [`BistError::CycleLimitExceeded`] after this many steps.
    pub max_cycles: Option<u64>,
}

/// Outcome of a [`memtest`] run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemtestReport {
    /// Reads verified.
    pub transfers: u32,
    /// Mismatches counted by the reader.
    pub error_count: u32,
    /// Mismatch records drained from the error queue, in detection order.
    /// Empty when the run used `skip_fifo`.
    pub errors: Vec<ErrorRecord>,
    /// Steps the run took.
    pub cycles: u64,
}

impl MemtestReport {
    /// Returns true if every read matched.
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }
}

/// Checks a region against the engine geometry and returns its masks.
fn region_masks(
    base: u32,
    words: u32,
    pattern: &[DataWord],
    depth: usize,
) -> Result<(u32, u32), BistError> {
    let invalid = |reason: String| Err(BistError::InvalidRegion { reason });
    if !words.is_power_of_two() {
        return invalid(format!("region of {words} words is not a power of two"));
    }
    if base.checked_add(words - 1).is_none() {
        return invalid(format!(
            "region of {words} words at {base:#x} overflows the address space"
        ));
    }
    if !pattern.len().is_power_of_two() {
        return invalid(format!(
            "pattern of {} words is not a power of two",
            pattern.len()
        ));
    }
    if pattern.len() > depth {
        return invalid(format!(
            "pattern of {} words exceeds the pattern table depth of {depth}",
            pattern.len()
        ));
    }
    Ok((words - 1, pattern.len() as u32 - 1))
}

fn load_pattern<T: Transport>(
    bist: &mut Bist<T>,
    base: u32,
    pattern: &[DataWord],
) -> Result<(), BistError> {
    let table = bist.pattern_mut();
    for (index, &data) in pattern.iter().enumerate() {
        table.set(index, PatternEntry::new(base, data))?;
    }
    Ok(())
}

/// Fills `words` transport words starting at `base` by repeating `pattern`.
///
/// The row inverter applies with whatever mask registers the writer holds.
pub fn memset<T: Transport>(
    bist: &mut Bist<T>,
    base: u32,
    words: u32,
    pattern: &[DataWord],
    max_cycles: Option<u64>,
) -> Result<RunSummary, BistError> {
    if !bist.writer().ready() {
        return Err(BistError::NotReady("writer"));
    }
    let (mem_mask, data_mask) = region_masks(base, words, pattern, bist.pattern().depth())?;
    load_pattern(bist, base, pattern)?;

    let regs = bist.writer_mut().regs_mut();
    regs.count = words;
    regs.mem_mask = mem_mask;
    regs.data_mask = data_mask;

    log::info!("memset: {words} words at {base:#x}, pattern of {}", pattern.len());
    write_run(bist, max_cycles)
}

/// Runs the writer with the registers as currently programmed.
pub fn write_run<T: Transport>(
    bist: &mut Bist<T>,
    max_cycles: Option<u64>,
) -> Result<RunSummary, BistError> {
    let cycles = bist.run_writer(max_cycles)?;
    Ok(RunSummary {
        transfers: bist.writer().done(),
        cycles,
    })
}

/// Verifies `words` transport words starting at `base` against `pattern`.
///
/// Every mismatch record is popped with `error_continue` as soon as it
/// reaches the head of the error queue, so the verify engine never stays
/// blocked. With `skip_fifo` the records are not queued and only the count
/// is reported.
pub fn memtest<T: Transport>(
    bist: &mut Bist<T>,
    base: u32,
    words: u32,
    pattern: &[DataWord],
    options: MemtestOptions,
) -> Result<MemtestReport, BistError> {
    if !bist.reader().ready() {
        return Err(BistError::NotReady("reader"));
    }
    let (mem_mask, data_mask) = region_masks(base, words, pattern, bist.pattern().depth())?;
    load_pattern(bist, base, pattern)?;

    let regs = bist.reader_mut().regs_mut();
    regs.count = words;
    regs.mem_mask = mem_mask;
    regs.data_mask = data_mask;

    log::info!("memtest: {words} words at {base:#x}, pattern of {}", pattern.len());
    verify_run(bist, options)
}

/// Runs the reader with the registers as currently programmed, draining
/// every mismatch record as it reaches the head of the error queue.
pub fn verify_run<T: Transport>(
    bist: &mut Bist<T>,
    options: MemtestOptions,
) -> Result<MemtestReport, BistError> {
    if !bist.reader().ready() {
        return Err(BistError::NotReady("reader"));
    }
    bist.reader_mut().set_skip_fifo(options.skip_fifo);
    bist.reader_mut().start();

    let mut errors = Vec::new();
    let mut cycles = 0;
    loop {
        if let Some(limit) = options.max_cycles {
            if cycles >= limit {
                return Err(BistError::CycleLimitExceeded { limit });
            }
        }
        bist.step()?;
        cycles += 1;
        if let Some(record) = bist.reader().error() {
            errors.push(record);
            bist.reader_mut().error_continue();
        } else if bist.reader().ready() {
            break;
        }
    }

    let report = MemtestReport {
        transfers: bist.reader().done(),
        error_count: bist.reader().error_count(),
        errors,
        cycles,
    };
    if report.passed() {
        log::info!("verify: {} words checked", report.transfers);
    } else {
        log::warn!(
            "verify: {} mismatches in {} words",
            report.error_count,
            report.transfers
        );
    }
    Ok(report)
}
