//! Pattern-driven memory write and verify engines.
//!
//! This crate models a built-in self-test block for bulk memory: a
//! [`Writer`] streams `(address, data)` pairs from a shared
//! [`PatternTable`] to a memory transport, and a [`Reader`] streams reads
//! over the same address sequence, compares every response against the
//! pattern, and queues mismatches for the host. A [`RowInverter`] can
//! complement the data of selected rows on both paths.
//!
//! # Architecture
//!
//! Everything advances in discrete steps. Each component computes its next
//! snapshot from its previous one, the live control inputs, and the port
//! status sampled from the [`Transport`] before the step; snapshots are
//! installed and handshakes applied only once every component is done, so
//! the result never depends on evaluation order. [`Bist`] wires a writer, a
//! reader, and a transport together, and the [`host`] drivers run whole
//! fills and checks on top of it.
//!
//! # Usage
//!
//! ```ignore
//! use membist_engine::{host, Bist, EngineParams, PatternTable, SimMemory, SimMemoryConfig};
//!
//! let memory = SimMemory::new(SimMemoryConfig::default())?;
//! let mut bist = Bist::new(EngineParams::default(), PatternTable::zeroed(4)?, memory)?;
//! host::memset(&mut bist, 0, 1024, &[0x5555_5555], None)?;
//! let report = host::memtest(&mut bist, 0, 1024, &[0x5555_5555], Default::default())?;
//! assert!(report.passed());
//! ```
//!
//! # Modules
//!
//! - `error` — Engine error types
//! - `pattern` — Pattern table and data words
//! - `selector` — Bitmap row selection
//! - `inverter` — Row-selective data inversion
//! - `queue` — Bounded step-synchronous FIFO
//! - `transport` — Transport contract
//! - `regs` — Engine geometry, register block, run snapshot
//! - `csr` — Control-plane register map
//! - `write` — Write engine
//! - `read` — Address, verify, and error-queue engines
//! - `memory` — Simulated memory device
//! - `system` — Global stepping of writer, reader, and transport
//! - `host` — Region fill and check drivers
//! - `trace` — Trace recording (VCD format)

#![warn(missing_docs)]

pub mod csr;
pub mod error;
pub mod host;
pub mod inverter;
pub mod memory;
pub mod pattern;
pub mod queue;
pub mod read;
pub mod regs;
pub mod selector;
pub mod system;
pub mod trace;
pub mod transport;
pub mod write;

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub use csr::{Access, Csr};
pub use error::BistError;
pub use host::{
    memset, memtest, verify_run, write_run, MemtestOptions, MemtestReport, RunSummary,
};
pub use inverter::{InverterConfig, RowInverter};
pub use memory::{FaultKind, MemoryStats, SimMemory, SimMemoryConfig};
pub use pattern::{DataWord, PatternEntry, PatternTable};
pub use queue::BoundedQueue;
pub use read::{AddressState, ErrorRecord, Reader, VerifyState};
pub use regs::{BistRegisters, EngineParams, RunConfig};
pub use selector::{is_selected, SelectorConfig};
pub use system::Bist;
pub use trace::{TraceRecorder, TraceSignal, VcdRecorder};
pub use transport::{PortActions, PortStatus, Transport, WriteRequest};
pub use write::{WriteState, Writer};

/// Creates a VCD recorder writing to a new file at `path`.
pub fn vcd_file(path: &Path) -> Result<Box<dyn TraceRecorder>, BistError> {
    let file = File::create(path)?;
    Ok(Box::new(VcdRecorder::new(BufWriter::new(file))))
}
