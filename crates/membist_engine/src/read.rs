//! Read-and-verify engine.
//!
//! Two state machines cooperate through a bounded address queue:
//!
//! - the [`AddressEngine`] issues read requests and, one step later, queues
//!   the address of each accepted request;
//! - the [`VerifyEngine`] pairs every read response with the queued address
//!   of the same transfer, compares the data against the pattern, and stages
//!   mismatches into the bounded error queue.
//!
//! ```text
//! AddressEngine:  READY --start--> WAIT --(enqueue ok | counter == 0)--> SEND --accepted--> WAIT
//! VerifyEngine:   READY --start--> WAIT --> MATCH --(response & address)--> WAIT | STAGE_ERROR --> WAIT
//! ```
//!
//! The whole read side is one [`ReadSnapshot`]; [`ReadSnapshot::step`]
//! computes the next snapshot from the previous one only, so neither machine
//! ever sees the other's update from the same step.

use std::sync::Arc;

use serde::Serialize;

use crate::csr::Csr;
use crate::error::BistError;
use crate::pattern::{DataWord, PatternTable};
use crate::queue::BoundedQueue;
use crate::regs::{BistRegisters, EngineParams, RunConfig};
use crate::transport::{PortActions, PortStatus};

/// Capacity of the queue carrying request addresses to the verify engine.
pub const ADDRESS_QUEUE_DEPTH: usize = 4;

/// Capacity of the error queue.
pub const ERROR_QUEUE_DEPTH: usize = 2;

/// A verification mismatch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ErrorRecord {
    /// Transport address of the failing transfer.
    pub offset: u32,
    /// Data returned by the transport.
    pub data: DataWord,
    /// Data the pattern predicted.
    pub expected: DataWord,
}

/// Address engine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressState {
    /// Idle.
    Ready,
    /// Queues the last accepted address, then checks the counter.
    Wait,
    /// Presents a read request until the transport accepts it.
    Send,
}

impl AddressState {
    /// Numeric encoding used in traces.
    pub fn encoding(self) -> u32 {
        match self {
            AddressState::Ready => 0,
            AddressState::Wait => 1,
            AddressState::Send => 2,
        }
    }
}

/// Verify engine states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerifyState {
    /// Idle; this is what the `ready` register reports.
    Ready,
    /// Checks the counter against `count`.
    Wait,
    /// Waits for a response and a queued address in the same step.
    Match,
    /// Pushes the staged mismatch into the error queue.
    StageError,
}

impl VerifyState {
    /// Numeric encoding used in traces.
    pub fn encoding(self) -> u32 {
        match self {
            VerifyState::Ready => 0,
            VerifyState::Wait => 1,
            VerifyState::Match => 2,
            VerifyState::StageError => 3,
        }
    }
}

/// Request-issuing half of the reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressEngine {
    state: AddressState,
    counter: u32,
    latched: u32,
}

impl AddressEngine {
    fn idle() -> Self {
        Self {
            state: AddressState::Ready,
            counter: 0,
            latched: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> AddressState {
        self.state
    }

    /// Read requests accepted so far.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// The read request presented this step, if any.
    pub fn request(&self, run: &RunConfig) -> Option<u32> {
        match self.state {
            AddressState::Send => Some(run.address(self.counter)),
            _ => None,
        }
    }

    /// The address offered to the address queue this step, if any.
    ///
    /// Nothing is offered before the first request has been accepted.
    pub fn enqueue(&self) -> Option<u32> {
        match self.state {
            AddressState::Wait if self.counter != 0 => Some(self.latched),
            _ => None,
        }
    }

    /// Computes the next state.
    ///
    /// `sent` is the address of the read request accepted this step;
    /// `enqueued` tells whether the address queue took the offered address.
    pub fn next(&self, run: &RunConfig, start: bool, sent: Option<u32>, enqueued: bool) -> Self {
        let mut next = *self;
        match self.state {
            AddressState::Ready => {
                if start {
                    next.counter = 0;
                    next.state = AddressState::Wait;
                }
            }
            AddressState::Wait => {
                if enqueued || self.counter == 0 {
                    next.state = if self.counter >= run.count {
                        AddressState::Ready
                    } else {
                        AddressState::Send
                    };
                }
            }
            AddressState::Send => {
                if let Some(address) = sent {
                    next.latched = address;
                    next.counter = self.counter.wrapping_add(1);
                    next.state = AddressState::Wait;
                }
            }
        }
        next
    }
}

/// Response-checking half of the reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyEngine {
    state: VerifyState,
    counter: u32,
    error_count: u32,
    staged: ErrorRecord,
}

impl VerifyEngine {
    fn idle() -> Self {
        Self {
            state: VerifyState::Ready,
            counter: 0,
            error_count: 0,
            staged: ErrorRecord::default(),
        }
    }

    /// Current state.
    pub fn state(&self) -> VerifyState {
        self.state
    }

    /// Responses checked so far.
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Mismatches counted so far.
    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// The most recently staged mismatch.
    pub fn staged(&self) -> &ErrorRecord {
        &self.staged
    }

    /// Returns true if a response and an address are consumed this step.
    ///
    /// Both must be present; one side alone never fires.
    pub fn consumes(&self, response_valid: bool, address_valid: bool) -> bool {
        self.state == VerifyState::Match && response_valid && address_valid
    }

    /// The record offered to the error queue this step, if any.
    pub fn stage(&self, skip_fifo: bool) -> Option<ErrorRecord> {
        (self.state == VerifyState::StageError && !skip_fifo).then_some(self.staged)
    }

    /// Computes the next state.
    ///
    /// `matched` carries the `(address, response)` pair consumed this step.
    /// `pushed` tells whether the error queue took the staged record.
    pub fn next(
        &self,
        run: &RunConfig,
        start: bool,
        matched: Option<(u32, DataWord)>,
        pushed: bool,
        skip_fifo: bool,
    ) -> Self {
        let mut next = *self;
        match self.state {
            VerifyState::Ready => {
                if start {
                    next.counter = 0;
                    next.error_count = 0;
                    next.state = VerifyState::Wait;
                }
            }
            VerifyState::Wait => {
                next.state = if self.counter >= run.count {
                    VerifyState::Ready
                } else {
                    VerifyState::Match
                };
            }
            VerifyState::Match => {
                if let Some((address, response)) = matched {
                    let data = response & run.inverter.word_mask();
                    let expected = run.expected(self.counter, address);
                    next.counter = self.counter.wrapping_add(1);
                    if data == expected {
                        next.state = VerifyState::Wait;
                    } else {
                        next.error_count = self.error_count.wrapping_add(1);
                        next.staged = ErrorRecord {
                            offset: address,
                            data,
                            expected,
                        };
                        next.state = if skip_fifo {
                            VerifyState::Wait
                        } else {
                            VerifyState::StageError
                        };
                    }
                }
            }
            VerifyState::StageError => {
                if pushed || skip_fifo {
                    next.state = VerifyState::Wait;
                }
            }
        }
        next
    }
}

/// Live inputs to one read-side step.
#[derive(Clone, Debug, Default)]
pub struct ReadInputs {
    /// Frozen run configuration when the start strobe is asserted.
    pub start: Option<Arc<RunConfig>>,
    /// The `error_continue` strobe.
    pub error_continue: bool,
    /// The `skip_fifo` register.
    pub skip_fifo: bool,
}

/// Complete read-side state: both engines, both queues, and the active run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadSnapshot {
    address: AddressEngine,
    verify: VerifyEngine,
    address_queue: BoundedQueue<u32>,
    error_queue: BoundedQueue<ErrorRecord>,
    run: Arc<RunConfig>,
}

impl ReadSnapshot {
    /// Creates an idle read side.
    pub fn new(idle: RunConfig) -> Self {
        Self {
            address: AddressEngine::idle(),
            verify: VerifyEngine::idle(),
            address_queue: BoundedQueue::new(ADDRESS_QUEUE_DEPTH),
            error_queue: BoundedQueue::new(ERROR_QUEUE_DEPTH),
            run: Arc::new(idle),
        }
    }

    /// Address engine snapshot.
    pub fn address(&self) -> &AddressEngine {
        &self.address
    }

    /// Verify engine snapshot.
    pub fn verify(&self) -> &VerifyEngine {
        &self.verify
    }

    /// Address queue contents.
    pub fn address_queue(&self) -> &BoundedQueue<u32> {
        &self.address_queue
    }

    /// Error queue contents.
    pub fn error_queue(&self) -> &BoundedQueue<ErrorRecord> {
        &self.error_queue
    }

    /// Configuration of the current or most recent run.
    pub fn run(&self) -> &RunConfig {
        &self.run
    }

    /// Returns true while idle.
    pub fn is_ready(&self) -> bool {
        self.verify.state == VerifyState::Ready
    }

    /// Head of the error queue, if any.
    pub fn error_head(&self) -> Option<&ErrorRecord> {
        self.error_queue.front()
    }

    /// Computes the next read-side snapshot and the handshakes that fired.
    pub fn step(&self, inputs: &ReadInputs, status: &PortStatus) -> (ReadSnapshot, PortActions) {
        let run = &*self.run;
        let skip = inputs.skip_fifo;

        // Address engine handshakes, judged on this snapshot.
        let sent = self.address.request(run).filter(|_| status.read_ready);
        let enqueued = self
            .address
            .enqueue()
            .filter(|_| self.address_queue.can_push());

        // Verify engine rendezvous: response and queued address together.
        let head = self.address_queue.front().copied();
        let matched = if self.verify.consumes(status.response.is_some(), head.is_some()) {
            head.zip(status.response)
        } else {
            None
        };
        let staged = self
            .verify
            .stage(skip)
            .filter(|_| self.error_queue.can_push());
        let popped = !self.error_queue.is_empty() && (inputs.error_continue || skip);

        // A start is honored only when the verify engine reports ready.
        let start = inputs.start.clone().filter(|_| self.is_ready());
        let starting = start.is_some();

        let next = ReadSnapshot {
            address: self.address.next(run, starting, sent, enqueued.is_some()),
            verify: self
                .verify
                .next(run, starting, matched, staged.is_some(), skip),
            address_queue: self.address_queue.advance(matched.is_some(), enqueued),
            error_queue: if starting {
                BoundedQueue::new(ERROR_QUEUE_DEPTH)
            } else {
                self.error_queue.advance(popped, staged)
            },
            run: start.unwrap_or_else(|| Arc::clone(&self.run)),
        };
        let actions = PortActions {
            read: sent,
            take_response: matched.is_some(),
            ..PortActions::default()
        };
        (next, actions)
    }
}

/// The reader component: registers, strobes, `skip_fifo`, and the read-side snapshot.
#[derive(Clone, Debug)]
pub struct Reader {
    regs: BistRegisters,
    skip_fifo: bool,
    snapshot: ReadSnapshot,
    start_pending: bool,
    continue_pending: bool,
}

impl Reader {
    /// Creates an idle reader with cleared registers.
    pub fn new(params: &EngineParams) -> Result<Self, BistError> {
        let regs = BistRegisters::new(params)?;
        let snapshot = ReadSnapshot::new(RunConfig::idle(*regs.inverter()));
        Ok(Self {
            regs,
            skip_fifo: false,
            snapshot,
            start_pending: false,
            continue_pending: false,
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

    /// Current read-side snapshot.
    pub fn snapshot(&self) -> &ReadSnapshot {
        &self.snapshot
    }

    /// Asserts the start strobe for the next step.
    pub fn start(&mut self) {
        self.start_pending = true;
    }

    /// Asserts the `error_continue` strobe for the next step.
    pub fn error_continue(&mut self) {
        self.continue_pending = true;
    }

    /// `skip_fifo` register.
    pub fn skip_fifo(&self) -> bool {
        self.skip_fifo
    }

    /// Writes `skip_fifo`. Takes effect on the next step, even mid-run.
    pub fn set_skip_fifo(&mut self, skip: bool) {
        self.skip_fifo = skip;
    }

    /// `ready` register.
    pub fn ready(&self) -> bool {
        self.snapshot.is_ready()
    }

    /// `done` register: responses checked so far.
    pub fn done(&self) -> u32 {
        self.snapshot.verify.counter
    }

    /// `error_count` register.
    pub fn error_count(&self) -> u32 {
        self.snapshot.verify.error_count
    }

    /// `error_ready` register.
    pub fn error_ready(&self) -> bool {
        self.snapshot.error_head().is_some()
    }

    /// Head error record, if any.
    pub fn error(&self) -> Option<ErrorRecord> {
        self.snapshot.error_head().copied()
    }

    /// Computes the next read-side snapshot from the current one.
    pub fn next_state(
        &self,
        pattern: &Arc<PatternTable>,
        status: &PortStatus,
    ) -> (ReadSnapshot, PortActions) {
        let inputs = ReadInputs {
            start: (self.start_pending && self.snapshot.is_ready())
                .then(|| Arc::new(self.regs.snapshot(pattern))),
            error_continue: self.continue_pending,
            skip_fifo: self.skip_fifo,
        };
        self.snapshot.step(&inputs, status)
    }

    /// Installs the snapshot computed by [`next_state`](Self::next_state)
    /// and clears the strobes consumed by that step.
    pub fn commit(&mut self, next: ReadSnapshot) {
        if self.start_pending && !self.snapshot.is_ready() {
            log::warn!("reader: start ignored, run in progress");
        }
        let prev = &self.snapshot;
        if prev.address.state != next.address.state {
            log::trace!(
                "reader: address {:?} -> {:?} (counter {})",
                prev.address.state,
                next.address.state,
                next.address.counter
            );
        }
        if prev.verify.state != next.verify.state {
            log::trace!(
                "reader: verify {:?} -> {:?} (counter {})",
                prev.verify.state,
                next.verify.state,
                next.verify.counter
            );
            if next.verify.state == VerifyState::Ready {
                log::debug!(
                    "reader: run complete, done = {}, errors = {}",
                    next.verify.counter,
                    next.verify.error_count
                );
            } else if prev.verify.state == VerifyState::Ready {
                log::debug!("reader: run started, count = {}", next.run.count);
            }
        }
        if next.verify.error_count != prev.verify.error_count {
            let e = next.verify.staged;
            log::debug!(
                "reader: mismatch at {:#x}: read {:#x}, expected {:#x}",
                e.offset,
                e.data,
                e.expected
            );
        }
        self.snapshot = next;
        self.start_pending = false;
        self.continue_pending = false;
    }

    /// Reads a control-plane register.
    pub fn read_csr(&self, csr: Csr) -> Result<DataWord, BistError> {
        let head = self.error().unwrap_or_default();
        match csr {
            Csr::Ready => Ok(self.ready() as DataWord),
            Csr::Done => Ok(self.done() as DataWord),
            Csr::ErrorCount => Ok(self.error_count() as DataWord),
            Csr::SkipFifo => Ok(self.skip_fifo as DataWord),
            Csr::ErrorOffset => Ok(head.offset as DataWord),
            Csr::ErrorData => Ok(head.data),
            Csr::ErrorExpected => Ok(head.expected),
            Csr::ErrorReady => Ok(self.error_ready() as DataWord),
            _ => csr.read_common(&self.regs),
        }
    }

    /// Writes a control-plane register or fires a strobe.
    pub fn write_csr(&mut self, csr: Csr, value: DataWord) -> Result<(), BistError> {
        match csr {
            Csr::Start => self.start(),
            Csr::ErrorContinue => self.error_continue(),
            Csr::SkipFifo => self.set_skip_fifo(value & 1 != 0),
            _ => return csr.write_common(&mut self.regs, value),
        }
        Ok(())
    }
}
