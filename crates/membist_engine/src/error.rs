//! Error types for engine construction, register access, and host-driven runs.
//!
//! Verification mismatches and flow-control stalls are not errors: they are
//! reported through the error queue and the `ready`/`done` registers. Every
//! variant of [`BistError`] is either a configuration problem caught before a
//! run starts, a misuse of the control plane, or a host-side limit.

use std::io;

/// Errors that can occur while configuring, driving, or tracing the engines.
#[derive(Debug, thiserror::Error)]
pub enum BistError {
    /// The row selector was configured wider than the supported bitmap.
    #[error("row selector width of {bits} bits exceeds the maximum of {max} bits")]
    RowBitsTooLarge {
        /// The requested selector width.
        bits: u32,
        /// The maximum supported selector width.
        max: u32,
    },

    /// The data word width is outside `1..=128`.
    #[error("invalid data width {width}: must be between 1 and 128 bits")]
    InvalidDataWidth {
        /// The requested width in bits.
        width: u32,
    },

    /// A pattern table must hold at least one entry.
    #[error("pattern table must contain at least one entry")]
    EmptyPattern,

    /// A pattern table write addressed an entry past the table depth.
    #[error("pattern index {index} out of range for table of depth {depth}")]
    PatternIndexOutOfRange {
        /// The requested entry index.
        index: usize,
        /// The table depth.
        depth: usize,
    },

    /// The register name is not part of the control-plane map.
    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    /// The register exists but this component does not implement it.
    #[error("register '{name}' is not available on the {component}")]
    UnsupportedRegister {
        /// The register name.
        name: &'static str,
        /// The component that was addressed.
        component: &'static str,
    },

    /// A status register was written.
    #[error("register '{0}' is read-only")]
    ReadOnlyRegister(&'static str),

    /// A strobe register was read.
    #[error("register '{0}' is a write strobe and cannot be read")]
    WriteOnlyRegister(&'static str),

    /// A host driver asked for a run while the engine was still busy.
    #[error("{0} is busy with a run in progress")]
    NotReady(&'static str),

    /// A host driver was given a memory region it cannot express with masks.
    #[error("invalid region: {reason}")]
    InvalidRegion {
        /// Why the region was rejected.
        reason: String,
    },

    /// A host-driven run did not finish within the allotted number of steps.
    #[error("cycle limit exceeded: run not complete after {limit} steps")]
    CycleLimitExceeded {
        /// The step limit that was hit.
        limit: u64,
    },

    /// An I/O error occurred while writing trace output.
    #[error("trace I/O error: {0}")]
    TraceIo(#[from] io::Error),
}
