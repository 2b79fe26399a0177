//! In-process memory device implementing [`Transport`].
//!
//! [`SimMemory`] stands in for the bulk memory behind the engines in tests
//! and on the command line. Writes land in sparse storage when accepted.
//! Reads are sampled when accepted and come back, in order, after a fixed
//! latency; at most `fifo_depth` reads may be outstanding, which is where
//! read backpressure comes from. A throttle and an explicit stall switch
//! make the device refuse requests on demand, and faults can be injected on
//! the read path.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::BistError;
use crate::inverter::word_mask;
use crate::pattern::DataWord;
use crate::transport::{PortActions, PortStatus, Transport};

/// How a faulty address corrupts the data read from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum FaultKind {
    /// XOR the stored word with a mask (bit flips).
    Xor(DataWord),
    /// Always read this value.
    Stuck(DataWord),
}

impl FaultKind {
    /// Applies the fault to a stored word.
    pub fn apply(self, stored: DataWord) -> DataWord {
        match self {
            FaultKind::Xor(mask) => stored ^ mask,
            FaultKind::Stuck(value) => value,
        }
    }
}

/// Device timing and sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimMemoryConfig {
    /// Width of a stored word in bits.
    pub data_width: u32,
    /// Maximum outstanding reads.
    pub fifo_depth: usize,
    /// Extra steps between accepting a read and presenting its response.
    pub latency: u32,
    /// Accept requests only on every `throttle`-th step (1 = every step).
    pub throttle: u32,
    /// Value read from addresses that were never written.
    pub fill: DataWord,
}

impl Default for SimMemoryConfig {
    fn default() -> Self {
        Self {
            data_width: 32,
            fifo_depth: 4,
            latency: 2,
            throttle: 1,
            fill: 0,
        }
    }
}

/// Request counters kept by the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    /// Write requests accepted.
    pub writes: u64,
    /// Read requests accepted.
    pub reads: u64,
    /// Reads that hit an injected fault.
    pub faulted_reads: u64,
}

#[derive(Clone, Copy, Debug)]
struct InFlight {
    due: u64,
    data: DataWord,
}

/// A simulated memory device.
#[derive(Debug)]
pub struct SimMemory {
    config: SimMemoryConfig,
    word_mask: DataWord,
    storage: HashMap<u32, DataWord>,
    faults: HashMap<u32, FaultKind>,
    in_flight: VecDeque<InFlight>,
    stalled: bool,
    cycle: u64,
    stats: MemoryStats,
}

impl SimMemory {
    /// Creates an empty device.
    pub fn new(config: SimMemoryConfig) -> Result<Self, BistError> {
        let word_mask = word_mask(config.data_width)?;
        Ok(Self {
            config: SimMemoryConfig {
                fifo_depth: config.fifo_depth.max(1),
                throttle: config.throttle.max(1),
                fill: config.fill & word_mask,
                ..config
            },
            word_mask,
            storage: HashMap::new(),
            faults: HashMap::new(),
            in_flight: VecDeque::new(),
            stalled: false,
            cycle: 0,
            stats: MemoryStats::default(),
        })
    }

    /// Device configuration.
    pub fn config(&self) -> &SimMemoryConfig {
        &self.config
    }

    /// Request counters.
    pub fn stats(&self) -> MemoryStats {
        self.stats
    }

    /// Steps taken so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Returns the stored word at `address`, ignoring faults.
    pub fn peek(&self, address: u32) -> DataWord {
        self.storage
            .get(&address)
            .copied()
            .unwrap_or(self.config.fill)
    }

    /// Stores a word directly, bypassing the transport.
    pub fn poke(&mut self, address: u32, data: DataWord) {
        self.storage.insert(address, data & self.word_mask);
    }

    /// Injects a read fault at `address`, replacing any previous one.
    pub fn inject_fault(&mut self, address: u32, kind: FaultKind) {
        self.faults.insert(address, kind);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    /// Refuses (`true`) or resumes (`false`) accepting requests.
    pub fn set_stalled(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Number of reads accepted but not yet consumed.
    pub fn outstanding_reads(&self) -> usize {
        self.in_flight.len()
    }

    fn accepting(&self) -> bool {
        !self.stalled && self.cycle % u64::from(self.config.throttle) == 0
    }

    fn sample(&mut self, address: u32) -> DataWord {
        let stored = self.peek(address);
        match self.faults.get(&address) {
            Some(fault) => {
                self.stats.faulted_reads += 1;
                fault.apply(stored) & self.word_mask
            }
            None => stored,
        }
    }
}

impl Transport for SimMemory {
    fn status(&self) -> PortStatus {
        let response = self
            .in_flight
            .front()
            .filter(|r| r.due <= self.cycle)
            .map(|r| r.data);
        PortStatus {
            write_ready: self.accepting(),
            read_ready: self.accepting() && self.in_flight.len() < self.config.fifo_depth,
            response,
        }
    }

    fn step(&mut self, actions: &PortActions) {
        if actions.take_response {
            self.in_flight.pop_front();
        }
        if let Some(write) = actions.write {
            self.stats.writes += 1;
            self.poke(write.address, write.data);
        }
        if let Some(address) = actions.read {
            self.stats.reads += 1;
            let data = self.sample(address);
            self.in_flight.push_back(InFlight {
                due: self.cycle + 1 + u64::from(self.config.latency),
                data,
            });
        }
        self.cycle += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::WriteRequest;

    fn memory(latency: u32) -> SimMemory {
        SimMemory::new(SimMemoryConfig {
            latency,
            ..SimMemoryConfig::default()
        })
        .unwrap()
    }

    fn read(address: u32) -> PortActions {
        PortActions {
            read: Some(address),
            ..PortActions::default()
        }
    }

    #[test]
    fn write_then_peek() {
        let mut m = memory(0);
        m.step(&PortActions {
            write: Some(WriteRequest {
                address: 4,
                data: 0x1_2345_6789,
            }),
            ..PortActions::default()
        });
        assert_eq!(m.peek(4), 0x2345_6789);
        assert_eq!(m.peek(5), 0);
        assert_eq!(m.stats().writes, 1);
    }

    #[test]
    fn read_latency() {
        let mut m = memory(2);
        m.poke(8, 0xaa);
        m.step(&read(8));
        assert_eq!(m.status().response, None);
        m.step(&PortActions::default());
        assert_eq!(m.status().response, None);
        m.step(&PortActions::default());
        assert_eq!(m.status().response, Some(0xaa));
    }

    #[test]
    fn responses_in_order() {
        let mut m = memory(0);
        m.poke(1, 0x11);
        m.poke(2, 0x22);
        m.step(&read(1));
        m.step(&read(2));
        assert_eq!(m.status().response, Some(0x11));
        m.step(&PortActions {
            take_response: true,
            ..PortActions::default()
        });
        assert_eq!(m.status().response, Some(0x22));
    }

    #[test]
    fn outstanding_reads_bounded() {
        let mut m = memory(10);
        for a in 0..4 {
            assert!(m.status().read_ready);
            m.step(&read(a));
        }
        assert!(!m.status().read_ready);
        assert!(m.status().write_ready);
        assert_eq!(m.outstanding_reads(), 4);
    }

    #[test]
    fn throttle_and_stall() {
        let mut m = SimMemory::new(SimMemoryConfig {
            throttle: 3,
            ..SimMemoryConfig::default()
        })
        .unwrap();
        let ready: Vec<bool> = (0..6)
            .map(|_| {
                let r = m.status().write_ready;
                m.step(&PortActions::default());
                r
            })
            .collect();
        assert_eq!(ready, vec![true, false, false, true, false, false]);
        m.set_stalled(true);
        assert!(!m.status().write_ready);
        assert!(!m.status().read_ready);
    }

    #[test]
    fn faults_corrupt_reads_only() {
        let mut m = memory(0);
        m.poke(3, 0x55);
        m.poke(4, 0x55);
        m.inject_fault(3, FaultKind::Xor(0xff));
        m.inject_fault(4, FaultKind::Stuck(0));
        m.step(&read(3));
        assert_eq!(m.status().response, Some(0xaa));
        m.step(&PortActions {
            take_response: true,
            read: Some(4),
            ..PortActions::default()
        });
        assert_eq!(m.status().response, Some(0));
        assert_eq!(m.peek(3), 0x55);
        assert_eq!(m.stats().faulted_reads, 2);
        m.clear_faults();
    }

    #[test]
    fn fill_value_for_unwritten() {
        let m = SimMemory::new(SimMemoryConfig {
            data_width: 8,
            fill: 0x1ff,
            ..SimMemoryConfig::default()
        })
        .unwrap();
        assert_eq!(m.peek(100), 0xff);
    }

    #[test]
    fn fault_kind_serde() {
        let json = serde_json::to_string(&FaultKind::Xor(1)).unwrap();
        assert_eq!(json, r#"{"kind":"xor","value":1}"#);
    }
}
