//! The complete tester: shared pattern table, writer, reader, and transport.
//!
//! [`Bist::step`] advances everything by one global step. The transport's
//! port status is sampled first; the writer and the reader then compute
//! their next snapshots from their current ones, and only after both are
//! computed are the snapshots installed and the fired handshakes handed to
//! the transport. A caller drives a run by asserting strobes and stepping
//! until the `ready` register comes back.

use std::sync::Arc;

use crate::csr::Csr;
use crate::error::BistError;
use crate::pattern::{DataWord, PatternTable};
use crate::read::Reader;
use crate::regs::EngineParams;
use crate::trace::{TraceRecorder, TraceSignal};
use crate::transport::Transport;
use crate::write::Writer;

/// Trace recorder with the last recorded value of every signal.
struct Tracer {
    recorder: Box<dyn TraceRecorder>,
    last: Vec<(TraceSignal, u64)>,
}

/// A pattern table shared by a writer and a reader on one transport.
pub struct Bist<T: Transport> {
    params: EngineParams,
    pattern: Arc<PatternTable>,
    writer: Writer,
    reader: Reader,
    transport: T,
    cycle: u64,
    tracer: Option<Tracer>,
}

impl<T: Transport> Bist<T> {
    /// Creates an idle tester.
    ///
    /// Fails if the geometry in `params` is invalid.
    pub fn new(params: EngineParams, pattern: PatternTable, transport: T) -> Result<Self, BistError> {
        Ok(Self {
            params,
            pattern: Arc::new(pattern),
            writer: Writer::new(&params)?,
            reader: Reader::new(&params)?,
            transport,
            cycle: 0,
            tracer: None,
        })
    }

    /// Construction-time geometry.
    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    /// The pattern table as the control plane sees it.
    pub fn pattern(&self) -> &PatternTable {
        &self.pattern
    }

    /// Mutable access to the pattern table.
    ///
    /// A run in flight keeps the table it started with; edits only reach
    /// runs started afterwards.
    pub fn pattern_mut(&mut self) -> &mut PatternTable {
        Arc::make_mut(&mut self.pattern)
    }

    /// The writer component.
    pub fn writer(&self) -> &Writer {
        &self.writer
    }

    /// Mutable writer component, for register writes and strobes.
    pub fn writer_mut(&mut self) -> &mut Writer {
        &mut self.writer
    }

    /// The reader component.
    pub fn reader(&self) -> &Reader {
        &self.reader
    }

    /// Mutable reader component, for register writes and strobes.
    pub fn reader_mut(&mut self) -> &mut Reader {
        &mut self.reader
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Steps taken so far.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Reads a writer register.
    pub fn writer_read_csr(&self, csr: Csr) -> Result<DataWord, BistError> {
        self.writer.read_csr(csr)
    }

    /// Writes a writer register.
    pub fn writer_write_csr(&mut self, csr: Csr, value: DataWord) -> Result<(), BistError> {
        self.writer.write_csr(csr, value)
    }

    /// Reads a reader register.
    pub fn reader_read_csr(&self, csr: Csr) -> Result<DataWord, BistError> {
        self.reader.read_csr(csr)
    }

    /// Writes a reader register.
    pub fn reader_write_csr(&mut self, csr: Csr, value: DataWord) -> Result<(), BistError> {
        self.reader.write_csr(csr, value)
    }

    /// Attaches a trace recorder and writes the signal declarations.
    pub fn set_recorder(&mut self, mut recorder: Box<dyn TraceRecorder>) -> Result<(), BistError> {
        recorder.begin_scope("bist")?;
        for (scope, signals) in [
            ("writer", &TraceSignal::WRITER[..]),
            ("reader", &TraceSignal::READER[..]),
        ] {
            recorder.begin_scope(scope)?;
            for &signal in signals {
                recorder.register_signal(signal)?;
            }
            recorder.end_scope()?;
        }
        recorder.end_scope()?;
        self.tracer = Some(Tracer {
            recorder,
            last: Vec::new(),
        });
        self.record()
    }

    /// Flushes and detaches the trace recorder, if any.
    pub fn finish_trace(&mut self) -> Result<(), BistError> {
        if let Some(mut tracer) = self.tracer.take() {
            tracer.recorder.finalize()?;
        }
        Ok(())
    }

    /// Advances the writer, the reader, and the transport by one step.
    pub fn step(&mut self) -> Result<(), BistError> {
        let status = self.transport.status();
        let (writer_next, write_actions) = self.writer.next_state(&self.pattern, &status);
        let (reader_next, read_actions) = self.reader.next_state(&self.pattern, &status);

        self.writer.commit(writer_next);
        self.reader.commit(reader_next);
        self.transport.step(&write_actions.merge(read_actions));
        self.cycle += 1;
        self.record()
    }

    /// Steps until `done` returns true, checking before every step.
    ///
    /// With a `limit`, fails once that many steps have been taken without
    /// `done` holding. Without one, a permanently stalled transport makes
    /// this loop forever. Returns the number of steps taken.
    pub fn run_until<F>(&mut self, limit: Option<u64>, mut done: F) -> Result<u64, BistError>
    where
        F: FnMut(&Self) -> bool,
    {
        let mut steps = 0;
        while !done(self) {
            if let Some(limit) = limit {
                if steps >= limit {
                    return Err(BistError::CycleLimitExceeded { limit });
                }
            }
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Starts the writer and steps until it is idle again.
    pub fn run_writer(&mut self, limit: Option<u64>) -> Result<u64, BistError> {
        if !self.writer.ready() {
            return Err(BistError::NotReady("writer"));
        }
        self.writer.start();
        let begin = self.cycle;
        self.run_until(limit, |b| b.cycle > begin && b.writer.ready())
    }

    /// Starts the reader and steps until it is idle again.
    ///
    /// Queued error records are left in place; with `skip_fifo` clear and
    /// more mismatches than the error queue holds, the run only finishes if
    /// something pops records, so callers that want every record should use
    /// [`memtest`](crate::host::memtest).
    pub fn run_reader(&mut self, limit: Option<u64>) -> Result<u64, BistError> {
        if !self.reader.ready() {
            return Err(BistError::NotReady("reader"));
        }
        self.reader.start();
        let begin = self.cycle;
        self.run_until(limit, |b| b.cycle > begin && b.reader.ready())
    }

    fn record(&mut self) -> Result<(), BistError> {
        let Some(tracer) = self.tracer.as_mut() else {
            return Ok(());
        };
        let read = self.reader.snapshot();
        let values = [
            (
                TraceSignal::WriterState,
                u64::from(self.writer.engine().state().encoding()),
            ),
            (TraceSignal::WriterDone, u64::from(self.writer.done())),
            (
                TraceSignal::ReaderAddrState,
                u64::from(read.address().state().encoding()),
            ),
            (
                TraceSignal::ReaderVerifyState,
                u64::from(read.verify().state().encoding()),
            ),
            (TraceSignal::ReaderDone, u64::from(self.reader.done())),
            (
                TraceSignal::ReaderErrorCount,
                u64::from(self.reader.error_count()),
            ),
            (
                TraceSignal::ReaderErrorReady,
                u64::from(self.reader.error_ready()),
            ),
            (
                TraceSignal::ReaderAddrFifoLevel,
                read.address_queue().len() as u64,
            ),
        ];
        for (signal, value) in values {
            let changed = match tracer.last.iter_mut().find(|(s, _)| *s == signal) {
                Some((_, last)) if *last == value => false,
                Some((_, last)) => {
                    *last = value;
                    true
                }
                None => {
                    tracer.last.push((signal, value));
                    true
                }
            };
            if changed {
                tracer.recorder.record_change(self.cycle, signal, value)?;
            }
        }
        Ok(())
    }
}
