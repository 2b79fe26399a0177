//! Step-by-step trace recording.
//!
//! The [`TraceRecorder`] trait abstracts trace output. [`VcdRecorder`]
//! writes IEEE 1364 Value Change Dump text with one time unit per step, so
//! engine activity can be inspected in GTKWave, Surfer, or other viewers.

use std::io::Write;

use crate::error::BistError;

/// Signals recorded for each step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceSignal {
    /// Write engine state encoding.
    WriterState,
    /// Writer `done` register.
    WriterDone,
    /// Address engine state encoding.
    ReaderAddrState,
    /// Verify engine state encoding.
    ReaderVerifyState,
    /// Reader `done` register.
    ReaderDone,
    /// Reader `error_count` register.
    ReaderErrorCount,
    /// Reader `error_ready` register.
    ReaderErrorReady,
    /// Number of addresses waiting in the address queue.
    ReaderAddrFifoLevel,
}

impl TraceSignal {
    /// Signals under the `writer` scope.
    pub const WRITER: [TraceSignal; 2] = [TraceSignal::WriterState, TraceSignal::WriterDone];

    /// Signals under the `reader` scope.
    pub const READER: [TraceSignal; 6] = [
        TraceSignal::ReaderAddrState,
        TraceSignal::ReaderVerifyState,
        TraceSignal::ReaderDone,
        TraceSignal::ReaderErrorCount,
        TraceSignal::ReaderErrorReady,
        TraceSignal::ReaderAddrFifoLevel,
    ];

    /// Signal name within its scope.
    pub fn name(self) -> &'static str {
        match self {
            TraceSignal::WriterState => "state",
            TraceSignal::WriterDone => "done",
            TraceSignal::ReaderAddrState => "addr_state",
            TraceSignal::ReaderVerifyState => "verify_state",
            TraceSignal::ReaderDone => "done",
            TraceSignal::ReaderErrorCount => "error_count",
            TraceSignal::ReaderErrorReady => "error_ready",
            TraceSignal::ReaderAddrFifoLevel => "addr_fifo_level",
        }
    }

    /// Width in bits.
    pub fn width(self) -> u32 {
        match self {
            TraceSignal::WriterState
            | TraceSignal::ReaderAddrState
            | TraceSignal::ReaderVerifyState => 2,
            TraceSignal::ReaderErrorReady => 1,
            TraceSignal::ReaderAddrFifoLevel => 3,
            TraceSignal::WriterDone | TraceSignal::ReaderDone | TraceSignal::ReaderErrorCount => 32,
        }
    }
}

/// Trait for recording engine traces.
pub trait TraceRecorder {
    /// Registers a signal for recording.
    fn register_signal(&mut self, signal: TraceSignal) -> Result<(), BistError>;

    /// Opens a new scope in the trace hierarchy.
    fn begin_scope(&mut self, name: &str) -> Result<(), BistError>;

    /// Closes the current scope.
    fn end_scope(&mut self) -> Result<(), BistError>;

    /// Records a value change at the given step.
    fn record_change(&mut self, step: u64, signal: TraceSignal, value: u64)
        -> Result<(), BistError>;

    /// Finalizes the trace output (flush, write trailer, etc.).
    fn finalize(&mut self) -> Result<(), BistError>;
}

/// VCD (Value Change Dump) recorder following IEEE 1364.
///
/// Identifier codes use printable ASCII characters starting from `!` (0x21).
pub struct VcdRecorder<W: Write> {
    writer: W,
    id_map: Vec<(TraceSignal, String)>,
    header_written: bool,
    current_step: Option<u64>,
}

impl<W: Write> VcdRecorder<W> {
    /// Creates a new VCD recorder writing to the given output.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            id_map: Vec::new(),
            header_written: false,
            current_step: None,
        }
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_header(&mut self) -> Result<(), BistError> {
        if self.header_written {
            return Ok(());
        }
        writeln!(self.writer, "$version")?;
        writeln!(self.writer, "  membist engine trace")?;
        writeln!(self.writer, "$end")?;
        writeln!(self.writer, "$timescale")?;
        writeln!(self.writer, "  1ns")?;
        writeln!(self.writer, "$end")?;
        self.header_written = true;
        Ok(())
    }

    /// Generates a VCD identifier code from a sequential index.
    fn make_id_code(index: usize) -> String {
        let mut result = String::new();
        let mut idx = index;
        loop {
            result.push((b'!' + (idx % 94) as u8) as char);
            idx /= 94;
            if idx == 0 {
                break;
            }
            idx -= 1;
        }
        result
    }

    fn format_value(value: u64, width: u32) -> String {
        if width == 1 {
            let bit = if value & 1 == 1 { "1" } else { "0" };
            bit.to_string()
        } else {
            format!("b{value:b} ")
        }
    }
}

impl<W: Write> TraceRecorder for VcdRecorder<W> {
    fn register_signal(&mut self, signal: TraceSignal) -> Result<(), BistError> {
        let id_code = Self::make_id_code(self.id_map.len());
        writeln!(
            self.writer,
            "$var wire {} {id_code} {} $end",
            signal.width(),
            signal.name()
        )?;
        self.id_map.push((signal, id_code));
        Ok(())
    }

    fn begin_scope(&mut self, name: &str) -> Result<(), BistError> {
        self.write_header()?;
        writeln!(self.writer, "$scope module {name} $end")?;
        Ok(())
    }

    fn end_scope(&mut self) -> Result<(), BistError> {
        writeln!(self.writer, "$upscope $end")?;
        Ok(())
    }

    fn record_change(
        &mut self,
        step: u64,
        signal: TraceSignal,
        value: u64,
    ) -> Result<(), BistError> {
        self.write_header()?;
        if self.current_step != Some(step) {
            if self.current_step.is_none() {
                writeln!(self.writer, "$enddefinitions $end")?;
            }
            writeln!(self.writer, "#{step}")?;
            self.current_step = Some(step);
        }
        // Unregistered signals are not part of the dump.
        let Some((_, id_code)) = self.id_map.iter().find(|(s, _)| *s == signal) else {
            return Ok(());
        };
        let value = Self::format_value(value, signal.width());
        writeln!(self.writer, "{value}{id_code}")?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), BistError> {
        if self.current_step.is_none() {
            self.write_header()?;
            writeln!(self.writer, "$enddefinitions $end")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
