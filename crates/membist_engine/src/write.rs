//! Write engine: streams pattern entries to the transport's write direction.
//!
//! ```text
//!   READY --start--> WAIT --counter < count--> RUN --accepted--> WAIT
//!     ^                |                        |
//!     +--counter>=count+                        +--(stall while not accepted)
//! ```
//!
//! `done` always reads the live counter, so it reports progress while a run
//! is in flight as well as the final total.

use std::sync::Arc;

use crate::csr::Csr;
use crate::error::BistError;
use crate::pattern::{DataWord, PatternTable};
use crate::regs::{BistRegisters, EngineParams, RunConfig};
use crate::transport::{PortActions, PortStatus, WriteRequest};

/// Write engine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteState {
    /// Idle; accepts a start strobe.
    Ready,
    /// Checks the counter against `count`.
    Wait,
    /// Presents a write request until the transport accepts it.
    Run,
}

impl WriteState {
    /// Numeric encoding used in traces.
    pub fn encoding(self) -> u32 {
        match self {
            WriteState::Ready => 0,
            WriteState::Wait => 1,
            WriteState::Run => 2,
        }
    }
}

/// Snapshot of the write engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteEngine {
    state: WriteState,
    counter: u32,
    run: Arc<RunConfig>,
}

impl WriteEngine {
    /// Creates an idle engine.
    pub fn new(idle: RunConfig) -> Self {
        Self {
            state: WriteState::Ready,
            counter: 0,
            run: Arc::new(idle),
        }
    }

    /// Current state.
    pub fn state(&self) -> WriteState {
        self.state
    }

    /// Transfers accepted so far in the current or most recent run.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Configuration of the current or most recent run.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    /// Returns true while idle.
    pub fn is_ready(&self) -> bool {
        self.state == WriteState::Ready
    }

    /// The write request presented this step, if any.
    pub fn request(&self) -> Option<WriteRequest> {
        match self.state {
            WriteState::Run => Some(self.run.write_request(self.counter)),
            _ => None,
        }
    }

    /// Computes the next snapshot.
    ///
    /// `start` carries the frozen configuration when the start strobe is
    /// asserted; it is ignored unless the engine is idle. `accepted` is the
    /// transport's write-ready flag sampled for this step.
    pub fn next(&self, start: Option<Arc<RunConfig>>, accepted: bool) -> WriteEngine {
        let mut next = self.clone();
        match self.state {
            WriteState::Ready => {
                if let Some(run) = start {
                    next.run = run;
                    next.counter = 0;
                    next.state = WriteState::Wait;
                }
            }
            WriteState::Wait => {
                next.state = if self.counter >= self.run.count {
                    WriteState::Ready
                } else {
                    WriteState::Run
                };
            }
            WriteState::Run => {
                if accepted {
                    next.counter = self.counter.wrapping_add(1);
                    next.state = WriteState::Wait;
                }
            }
        }
        next
    }

    /// Computes the next snapshot together with the handshake that fired.
    pub fn step(
        &self,
        start: Option<Arc<RunConfig>>,
        status: &PortStatus,
    ) -> (WriteEngine, PortActions) {
        let write = self.request().filter(|_| status.write_ready);
        let next = self.next(start, write.is_some());
        (
            next,
            PortActions {
                write,
                ..PortActions::default()
            },
        )
    }
}

/// The writer component: register block, strobes, and the engine snapshot.
#[derive(Clone, Debug)]
pub struct Writer {
    regs: BistRegisters,
    engine: WriteEngine,
    start_pending: bool,
}

impl Writer {
    /// Creates an idle writer with cleared registers.
    pub fn new(params: &EngineParams) -> Result<Self, BistError> {
        let regs = BistRegisters::new(params)?;
        let engine = WriteEngine::new(RunConfig::idle(*regs.inverter()));
        Ok(Self {
            regs,
            engine,
            start_pending: false,
        })
    }

    /// Shared register block.
    pub fn regs(&self) -> &BistRegisters {
        &self.regs
    }

    /// Mutable register block. Writes take effect at the next start.
    pub fn regs_mut(&mut self) -> &mut BistRegisters {
        &mut self.regs
    }

    /// Current engine snapshot.
    pub fn engine(&self) -> &WriteEngine {
        &self.engine
    }

    /// Asserts the start strobe for the next step.
    pub fn start(&mut self) {
        self.start_pending = true;
    }

    /// `ready` register: 1 when no run is in progress.
    pub fn ready(&self) -> bool {
        self.engine.is_ready()
    }

    /// `done` register: transfers accepted so far.
    pub fn done(&self) -> u32 {
        self.engine.counter()
    }

    /// Computes the next engine snapshot from the current one.
    pub fn next_state(
        &self,
        pattern: &Arc<PatternTable>,
        status: &PortStatus,
    ) -> (WriteEngine, PortActions) {
        let start = (self.start_pending && self.engine.is_ready())
            .then(|| Arc::new(self.regs.snapshot(pattern)));
        self.engine.step(start, status)
    }

    /// Installs the snapshot computed by [`next_state`](Self::next_state)
    /// and clears the strobes consumed by that step.
    pub fn commit(&mut self, next: WriteEngine) {
        if self.start_pending && !self.engine.is_ready() {
            log::warn!("writer: start ignored, run in progress");
        }
        if self.engine.state() != next.state() {
            log::trace!(
                "writer: {:?} -> {:?} (counter {})",
                self.engine.state(),
                next.state(),
                next.counter()
            );
            if next.state() == WriteState::Ready {
                log::debug!("writer: run complete, done = {}", next.counter());
            } else if self.engine.is_ready() {
                log::debug!("writer: run started, count = {}", next.run().count);
            }
        }
        self.engine = next;
        self.start_pending = false;
    }

    /// Reads a control-plane register.
    pub fn read_csr(&self, csr: Csr) -> Result<DataWord, BistError> {
        match csr {
            Csr::Ready => Ok(self.ready() as DataWord),
            Csr::Done => Ok(self.done() as DataWord),
            _ if csr.is_reader_only() => Err(BistError::UnsupportedRegister {
                name: csr.name(),
                component: "writer",
            }),
            _ => csr.read_common(&self.regs),
        }
    }

    /// Writes a control-plane register or fires a strobe.
    pub fn write_csr(&mut self, csr: Csr, value: DataWord) -> Result<(), BistError> {
        match csr {
            Csr::Start => {
                self.start();
                Ok(())
            }
            _ if csr.is_reader_only() => Err(BistError::UnsupportedRegister {
                name: csr.name(),
                component: "writer",
            }),
            _ => csr.write_common(&mut self.regs, value),
        }
    }
}
