//! Resolution of a validated configuration into engine settings.
//!
//! Numeric fields are range-checked against their register widths here, the
//! random pattern is expanded, and the result can build a ready-to-run
//! [`Bist`] over a [`SimMemory`].

use membist_engine::inverter::word_mask;
use membist_engine::{
    memset, memtest, verify_run, write_run, Bist, BistError, BistRegisters, DataWord,
    EngineParams, FaultKind, MemtestOptions, MemtestReport, PatternEntry, PatternTable,
    RunSummary, SimMemory, SimMemoryConfig,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;
use crate::types::{FaultMode, MembistConfig, RandomPattern, Word};

/// What a run covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    /// A contiguous region filled or checked with repeating data words.
    Region {
        /// First address.
        base: u32,
        /// Number of words.
        words: u32,
        /// Data words, repeated over the region.
        pattern: Vec<DataWord>,
    },
    /// Explicit pattern entries run with hand-set registers.
    Registers {
        /// Pattern table contents, starting at index 0.
        entries: Vec<PatternEntry>,
        /// Transfers per run.
        count: u32,
        /// Address offset mask.
        mem_mask: u32,
        /// Pattern index mask.
        data_mask: u32,
    },
}

/// A configuration resolved into engine-level settings.
#[derive(Debug, Clone)]
pub struct ResolvedSetup {
    /// Engine geometry.
    pub params: EngineParams,
    /// Pattern table depth.
    pub depth: usize,
    /// Simulated memory device.
    pub memory: SimMemoryConfig,
    /// Read faults to inject.
    pub faults: Vec<(u32, FaultKind)>,
    /// Row inversion divisor mask.
    pub divisor_mask: u32,
    /// Row inversion selection bitmap.
    pub selection_mask: u64,
    /// Count mismatches without queueing them.
    pub skip_fifo: bool,
    /// Step limit per run.
    pub max_cycles: Option<u64>,
    /// What the runs cover.
    pub plan: RunPlan,
}

fn fit_u32(value: Word, field: &str) -> Result<u32, ConfigError> {
    u32::try_from(value.0).map_err(|_| {
        ConfigError::ValidationError(format!(
            "{field} value {:#x} does not fit in 32 bits",
            value.0
        ))
    })
}

fn fit_u64(value: Word, field: &str) -> Result<u64, ConfigError> {
    u64::try_from(value.0).map_err(|_| {
        ConfigError::ValidationError(format!(
            "{field} value {:#x} does not fit in 64 bits",
            value.0
        ))
    })
}

/// Expands a seeded random pattern, masked to the data width.
pub fn random_words(random: &RandomPattern, data_width: u32) -> Result<Vec<DataWord>, BistError> {
    let mask = word_mask(data_width)?;
    let mut rng = StdRng::seed_from_u64(random.seed);
    Ok((0..random.length)
        .map(|_| rng.gen::<DataWord>() & mask)
        .collect())
}

/// Resolves a validated configuration.
pub fn resolve(config: &MembistConfig) -> Result<ResolvedSetup, ConfigError> {
    let params = EngineParams {
        data_width: config.engine.data_width,
        row_bits: config.engine.row_bits,
        row_shift: config.engine.row_shift,
    };
    let memory = SimMemoryConfig {
        data_width: config.engine.data_width,
        fifo_depth: config.memory.fifo_depth,
        latency: config.memory.latency,
        throttle: config.memory.throttle,
        fill: config.memory.fill.0,
    };
    let faults = config
        .memory
        .faults
        .iter()
        .map(|f| {
            let address = fit_u32(f.address, "memory.faults.address")?;
            let kind = match f.kind {
                FaultMode::Xor => FaultKind::Xor(f.value.0),
                FaultMode::Stuck => FaultKind::Stuck(f.value.0),
            };
            Ok((address, kind))
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    let run = &config.run;
    let plan = if config.pattern.entries.is_empty() {
        let region = config
            .region
            .as_ref()
            .ok_or_else(|| ConfigError::MissingField("region.words".to_string()))?;
        let pattern = match &config.pattern.random {
            Some(random) => random_words(random, params.data_width)?,
            None => config.pattern.data.iter().map(|w| w.0).collect(),
        };
        RunPlan::Region {
            base: fit_u32(region.base, "region.base")?,
            words: fit_u32(region.words, "region.words")?,
            pattern,
        }
    } else {
        let entries = config
            .pattern
            .entries
            .iter()
            .map(|e| {
                Ok(PatternEntry::new(
                    fit_u32(e.address, "pattern.entries.address")?,
                    e.data.0,
                ))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;
        let count = run
            .count
            .ok_or_else(|| ConfigError::MissingField("run.count".to_string()))?;
        RunPlan::Registers {
            entries,
            count: fit_u32(count, "run.count")?,
            mem_mask: fit_u32(run.mem_mask, "run.mem_mask")?,
            data_mask: fit_u32(run.data_mask, "run.data_mask")?,
        }
    };

    Ok(ResolvedSetup {
        params,
        depth: config.engine.depth,
        memory,
        faults,
        divisor_mask: fit_u32(run.divisor_mask, "run.divisor_mask")?,
        selection_mask: fit_u64(run.selection_mask, "run.selection_mask")?,
        skip_fifo: run.skip_fifo,
        max_cycles: run.max_cycles,
        plan,
    })
}

impl ResolvedSetup {
    /// Builds an idle tester over a fresh simulated memory, with faults
    /// injected and every register programmed.
    pub fn build(&self) -> Result<Bist<SimMemory>, BistError> {
        let mut table = PatternTable::zeroed(self.depth)?;
        if let RunPlan::Registers { entries, .. } = &self.plan {
            for (index, entry) in entries.iter().enumerate() {
                table.set(index, *entry)?;
            }
        }
        let mut memory = SimMemory::new(self.memory)?;
        for &(address, kind) in &self.faults {
            memory.inject_fault(address, kind);
        }
        let mut bist = Bist::new(self.params, table, memory)?;

        self.program(bist.writer_mut().regs_mut());
        self.program(bist.reader_mut().regs_mut());
        bist.reader_mut().set_skip_fifo(self.skip_fifo);
        Ok(bist)
    }

    fn program(&self, regs: &mut BistRegisters) {
        regs.set_divisor_mask(self.divisor_mask);
        regs.set_selection_mask(self.selection_mask);
        if let RunPlan::Registers {
            count,
            mem_mask,
            data_mask,
            ..
        } = self.plan
        {
            regs.count = count;
            regs.mem_mask = mem_mask;
            regs.data_mask = data_mask;
        }
    }

    /// Runs the writer over the planned region or registers.
    pub fn write(&self, bist: &mut Bist<SimMemory>) -> Result<RunSummary, BistError> {
        match &self.plan {
            RunPlan::Region {
                base,
                words,
                pattern,
            } => memset(bist, *base, *words, pattern, self.max_cycles),
            RunPlan::Registers { .. } => write_run(bist, self.max_cycles),
        }
    }

    /// Runs the reader over the planned region or registers.
    pub fn verify(&self, bist: &mut Bist<SimMemory>) -> Result<MemtestReport, BistError> {
        let options = MemtestOptions {
            skip_fifo: self.skip_fifo,
            max_cycles: self.max_cycles,
        };
        match &self.plan {
            RunPlan::Region {
                base,
                words,
                pattern,
            } => memtest(bist, *base, *words, pattern, options),
            RunPlan::Registers { .. } => verify_run(bist, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use membist_engine::Csr;

    fn setup(toml: &str) -> ResolvedSetup {
        resolve(&load_config_from_str(toml).unwrap()).unwrap()
    }

    #[test]
    fn resolve_region_plan() {
        let s = setup(
            r#"
[memory]
latency = 5
fill = "0xdead"

[pattern]
data = ["0x55", "0xaa"]

[region]
base = "0x100"
words = 16

[run]
divisor_mask = "0b111"
selection_mask = "0b10"
"#,
        );
        assert_eq!(s.memory.latency, 5);
        assert_eq!(s.memory.fill, 0xdead);
        assert_eq!(s.divisor_mask, 0b111);
        assert_eq!(
            s.plan,
            RunPlan::Region {
                base: 0x100,
                words: 16,
                pattern: vec![0x55, 0xaa],
            }
        );
    }

    #[test]
    fn random_pattern_is_reproducible_and_masked() {
        let random = RandomPattern { seed: 42, length: 8 };
        let a = random_words(&random, 8).unwrap();
        let b = random_words(&random, 8).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.iter().all(|&w| w <= 0xff));
        let other = random_words(&RandomPattern { seed: 43, length: 8 }, 8).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn oversized_register_rejected() {
        let config = load_config_from_str(
            r#"
[[pattern.entries]]
address = 0
data = 1

[run]
count = 1
mem_mask = "0x1_0000_0000"
"#,
        )
        .unwrap();
        let err = resolve(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(msg) if msg.contains("run.mem_mask")));
    }

    #[test]
    fn build_programs_registers_and_faults() {
        let s = setup(
            r#"
[engine]
depth = 2

[[memory.faults]]
address = "0x20"
kind = "stuck"
value = "0xff"

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
        let mut bist = s.build().unwrap();
        assert_eq!(bist.writer_read_csr(Csr::Count).unwrap(), 4);
        assert_eq!(bist.reader_read_csr(Csr::DataMask).unwrap(), 1);

        let summary = s.write(&mut bist).unwrap();
        assert_eq!(summary.transfers, 4);
        let report = s.verify(&mut bist).unwrap();
        assert_eq!(report.error_count, 2);
        assert!(report
            .errors
            .iter()
            .all(|e| e.offset == 0x20 && e.data == 0xff && e.expected == 0x55));
    }

    #[test]
    fn region_run_with_inversion_passes() {
        let s = setup(
            r#"
[pattern]
random = { seed = 3, length = 4 }

[region]
words = 64

[run]
divisor_mask = "0b011"
selection_mask = "0b0101"
max_cycles = 10000
"#,
        );
        let mut bist = s.build().unwrap();
        s.write(&mut bist).unwrap();
        let report = s.verify(&mut bist).unwrap();
        assert!(report.passed());
        assert_eq!(report.transfers, 64);
    }
}
