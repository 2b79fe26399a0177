//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use membist_engine::{
    Bist, EngineParams, PatternTable, PortActions, PortStatus, SimMemory, SimMemoryConfig,
    Transport, WriteRequest,
};

/// A [`SimMemory`] that also logs every accepted request.
pub struct Recording {
    pub memory: SimMemory,
    pub writes: Vec<WriteRequest>,
    pub reads: Vec<u32>,
}

impl Recording {
    pub fn new(config: SimMemoryConfig) -> Self {
        Self {
            memory: SimMemory::new(config).unwrap(),
            writes: Vec::new(),
            reads: Vec::new(),
        }
    }
}

impl Transport for Recording {
    fn status(&self) -> PortStatus {
        self.memory.status()
    }

    fn step(&mut self, actions: &PortActions) {
        self.writes.extend(actions.write);
        self.reads.extend(actions.read);
        self.memory.step(actions);
    }
}

/// A tester over a recording memory with default geometry.
pub fn recording_bist(pattern: PatternTable, config: SimMemoryConfig) -> Bist<Recording> {
    Bist::new(EngineParams::default(), pattern, Recording::new(config)).unwrap()
}

/// Writes the same run registers to both engines through the register map.
pub fn program_both<T: Transport>(bist: &mut Bist<T>, count: u32, mem_mask: u32, data_mask: u32) {
    use membist_engine::Csr;
    for (csr, value) in [
        (Csr::Count, count),
        (Csr::MemMask, mem_mask),
        (Csr::DataMask, data_mask),
    ] {
        bist.writer_write_csr(csr, value.into()).unwrap();
        bist.reader_write_csr(csr, value.into()).unwrap();
    }
}
