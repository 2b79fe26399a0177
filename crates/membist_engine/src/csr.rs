//! Control-plane register map.
//!
//! Every register of the writer and reader is named by a [`Csr`]. Values are
//! carried as [`DataWord`] so the wide `error_data`/`error_expected` fields
//! fit; writes to narrower registers are truncated to the register width.

use std::fmt;
use std::str::FromStr;

use crate::error::BistError;
use crate::pattern::DataWord;
use crate::regs::BistRegisters;

/// How a register may be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Storage register, readable and writable.
    ReadWrite,
    /// Status register.
    ReadOnly,
    /// Writing triggers a one-step strobe; the value is ignored.
    WriteStrobe,
}

/// A control-plane register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Csr {
    /// Begin a run if idle.
    Start,
    /// 1 when no run is in progress.
    Ready,
    /// Number of transfers in the next run.
    Count,
    /// Transfers completed so far.
    Done,
    /// Transport address mask.
    MemMask,
    /// Pattern index mask.
    DataMask,
    /// Row selector divisor mask.
    DivisorMask,
    /// Row selector bitmap.
    SelectionMask,
    /// Mismatches in the current run.
    ErrorCount,
    /// Disable error queue backpressure.
    SkipFifo,
    /// Address of the head error record.
    ErrorOffset,
    /// Data read for the head error record.
    ErrorData,
    /// Data expected for the head error record.
    ErrorExpected,
    /// 1 when a head error record is present.
    ErrorReady,
    /// Pop the head error record.
    ErrorContinue,
}

impl Csr {
    /// Every register, in map order.
    pub const ALL: [Csr; 15] = [
        Csr::Start,
        Csr::Ready,
        Csr::Count,
        Csr::Done,
        Csr::MemMask,
        Csr::DataMask,
        Csr::DivisorMask,
        Csr::SelectionMask,
        Csr::ErrorCount,
        Csr::SkipFifo,
        Csr::ErrorOffset,
        Csr::ErrorData,
        Csr::ErrorExpected,
        Csr::ErrorReady,
        Csr::ErrorContinue,
    ];

    /// Register name as used on the control plane.
    pub fn name(self) -> &'static str {
        match self {
            Csr::Start => "start",
            Csr::Ready => "ready",
            Csr::Count => "count",
            Csr::Done => "done",
            Csr::MemMask => "mem_mask",
            Csr::DataMask => "data_mask",
            Csr::DivisorMask => "divisor_mask",
            Csr::SelectionMask => "selection_mask",
            Csr::ErrorCount => "error_count",
            Csr::SkipFifo => "skip_fifo",
            Csr::ErrorOffset => "error_offset",
            Csr::ErrorData => "error_data",
            Csr::ErrorExpected => "error_expected",
            Csr::ErrorReady => "error_ready",
            Csr::ErrorContinue => "error_continue",
        }
    }

    /// Access mode.
    pub fn access(self) -> Access {
        match self {
            Csr::Start | Csr::ErrorContinue => Access::WriteStrobe,
            Csr::Ready
            | Csr::Done
            | Csr::ErrorCount
            | Csr::ErrorOffset
            | Csr::ErrorData
            | Csr::ErrorExpected
            | Csr::ErrorReady => Access::ReadOnly,
            Csr::Count
            | Csr::MemMask
            | Csr::DataMask
            | Csr::DivisorMask
            | Csr::SelectionMask
            | Csr::SkipFifo => Access::ReadWrite,
        }
    }

    /// Returns true for registers that only exist on the reader.
    pub fn is_reader_only(self) -> bool {
        matches!(
            self,
            Csr::ErrorCount
                | Csr::SkipFifo
                | Csr::ErrorOffset
                | Csr::ErrorData
                | Csr::ErrorExpected
                | Csr::ErrorReady
                | Csr::ErrorContinue
        )
    }

    /// Reads a storage register held in the shared block.
    pub(crate) fn read_common(self, regs: &BistRegisters) -> Result<DataWord, BistError> {
        match self {
            Csr::Count => Ok(regs.count as DataWord),
            Csr::MemMask => Ok(regs.mem_mask as DataWord),
            Csr::DataMask => Ok(regs.data_mask as DataWord),
            Csr::DivisorMask => Ok(regs.divisor_mask() as DataWord),
            Csr::SelectionMask => Ok(regs.selection_mask() as DataWord),
            _ if self.access() == Access::WriteStrobe => Err(BistError::WriteOnlyRegister(self.name())),
            _ => Err(BistError::UnsupportedRegister {
                name: self.name(),
                component: "shared register block",
            }),
        }
    }

    /// Writes a storage register held in the shared block.
    pub(crate) fn write_common(
        self,
        regs: &mut BistRegisters,
        value: DataWord,
    ) -> Result<(), BistError> {
        match self {
            Csr::Count => regs.count = value as u32,
            Csr::MemMask => regs.mem_mask = value as u32,
            Csr::DataMask => regs.data_mask = value as u32,
            Csr::DivisorMask => regs.set_divisor_mask(value as u32),
            Csr::SelectionMask => regs.set_selection_mask(value as u64),
            _ if self.access() == Access::ReadOnly => {
                return Err(BistError::ReadOnlyRegister(self.name()))
            }
            _ => {
                return Err(BistError::UnsupportedRegister {
                    name: self.name(),
                    component: "shared register block",
                })
            }
        }
        Ok(())
    }
}

impl fmt::Display for Csr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Csr {
    type Err = BistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Csr::ALL
            .into_iter()
            .find(|csr| csr.name() == s)
            .ok_or_else(|| BistError::UnknownRegister(s.to_string()))
    }
}
