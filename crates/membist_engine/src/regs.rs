//! Engine geometry, the shared register block, and the per-run snapshot.
//!
//! [`EngineParams`] is fixed at construction. [`BistRegisters`] holds the
//! control-plane registers both engines have in common. When a run starts
//! the registers and the pattern table are frozen into a [`RunConfig`],
//! which the engine consults for the whole run; register writes made while
//! a run is in flight only affect the next run.

use std::sync::Arc;

use crate::error::BistError;
use crate::inverter::{InverterConfig, RowInverter};
use crate::pattern::{DataWord, PatternEntry, PatternTable};
use crate::selector::SelectorConfig;
use crate::transport::WriteRequest;

/// Construction-time engine geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineParams {
    /// Width of a transport data word in bits (1..=128).
    pub data_width: u32,
    /// Width of the row field fed to the inversion selector (0..=6).
    pub row_bits: u32,
    /// Position of the row field within the transport address.
    pub row_shift: u32,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            data_width: 32,
            row_bits: 3,
            row_shift: 0,
        }
    }
}

impl EngineParams {
    /// Builds a row inverter with both mask registers cleared.
    ///
    /// Fails if the row field or the data width is out of range.
    pub fn inverter(&self) -> Result<RowInverter, BistError> {
        let selector = SelectorConfig::disabled(self.row_bits)?;
        RowInverter::new(
            InverterConfig {
                selector,
                row_shift: self.row_shift,
            },
            self.data_width,
        )
    }
}

/// Registers shared by the writer and the reader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BistRegisters {
    /// Number of transfers to perform in the next run.
    pub count: u32,
    /// Mask applied to the transfer counter before it is added to the pattern address.
    pub mem_mask: u32,
    /// Mask applied to the transfer counter to index the pattern table.
    pub data_mask: u32,
    inverter: RowInverter,
}

impl BistRegisters {
    /// Creates a zeroed register block for the given geometry.
    pub fn new(params: &EngineParams) -> Result<Self, BistError> {
        Ok(Self {
            count: 0,
            mem_mask: 0,
            data_mask: 0,
            inverter: params.inverter()?,
        })
    }

    /// Returns the row inverter as currently configured.
    pub fn inverter(&self) -> &RowInverter {
        &self.inverter
    }

    /// Current `divisor_mask` register value.
    pub fn divisor_mask(&self) -> u32 {
        self.inverter.config().selector.divisor_mask()
    }

    /// Current `selection_mask` register value.
    pub fn selection_mask(&self) -> u64 {
        self.inverter.config().selector.selection_mask()
    }

    /// Writes `divisor_mask`, truncated to the row field width.
    pub fn set_divisor_mask(&mut self, mask: u32) {
        self.inverter.selector_mut().set_divisor_mask(mask);
    }

    /// Writes `selection_mask`, truncated to the bitmap width.
    pub fn set_selection_mask(&mut self, mask: u64) {
        self.inverter.selector_mut().set_selection_mask(mask);
    }

    /// Freezes the registers and the pattern table for a run.
    pub fn snapshot(&self, pattern: &Arc<PatternTable>) -> RunConfig {
        RunConfig {
            pattern: Arc::clone(pattern),
            count: self.count,
            mem_mask: self.mem_mask,
            data_mask: self.data_mask,
            inverter: self.inverter,
        }
    }
}

/// Immutable configuration of a single run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunConfig {
    /// Pattern table captured at run start.
    pub pattern: Arc<PatternTable>,
    /// Number of transfers in the run.
    pub count: u32,
    /// Transport address mask.
    pub mem_mask: u32,
    /// Pattern index mask.
    pub data_mask: u32,
    /// Row inverter captured at run start.
    pub inverter: RowInverter,
}

impl RunConfig {
    /// A placeholder run with `count = 0`, used before the first start.
    pub fn idle(inverter: RowInverter) -> Self {
        Self {
            pattern: Arc::new(PatternTable::placeholder()),
            count: 0,
            mem_mask: 0,
            data_mask: 0,
            inverter,
        }
    }

    /// Pattern entry for transfer number `counter`.
    pub fn entry(&self, counter: u32) -> PatternEntry {
        self.pattern.lookup(counter, self.data_mask)
    }

    /// Transport address for transfer number `counter`.
    pub fn address(&self, counter: u32) -> u32 {
        self.entry(counter)
            .address
            .wrapping_add(counter & self.mem_mask)
    }

    /// Write request issued for transfer number `counter`.
    pub fn write_request(&self, counter: u32) -> WriteRequest {
        let entry = self.entry(counter);
        let address = entry.address.wrapping_add(counter & self.mem_mask);
        WriteRequest {
            address,
            data: self.inverter.apply(address, entry.data),
        }
    }

    /// Data expected back for transfer number `counter` read from `address`.
    pub fn expected(&self, counter: u32, address: u32) -> DataWord {
        self.inverter.apply(address, self.entry(counter).data)
    }
}
