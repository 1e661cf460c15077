//! Report line formatting
//!
//! Every report item is exactly one line with a fixed field order so the
//! output stays greppable:
//!
//! ```text
//! diff: +100 bytes
//! module ./prog: +100 bytes
//! unhandled malloc line: ./prog: mmap(4096) = 0x7f00
//! unfreed: 0x1 100 bytes from ./prog
//! module ./prog has 100 outstanding bytes at exit
//! ```

use std::fmt;
use std::io::Write;

use crate::engine::{FlushDelta, LeakReport};
use crate::ledger::ModuleTotals;
use crate::TraceError;

/// Writes report lines to an output sink
#[derive(Debug)]
pub struct ReportWriter<W: Write> {
    out: W,
}

impl<W: Write> ReportWriter<W> {
    /// Wrap an output sink
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Total diff followed by per-caller diffs; silent when nothing changed.
    pub fn write_flush(&mut self, delta: &FlushDelta) -> Result<(), TraceError> {
        if delta.total_diff != 0 {
            self.line(format_args!("diff: {:+} bytes", delta.total_diff))?;
        }
        for module in &delta.modules {
            self.line(format_args!("module {}: {:+} bytes", module.owner, module.delta))?;
        }
        Ok(())
    }

    /// Full per-caller table.
    pub fn write_module_table(&mut self, modules: &ModuleTotals) -> Result<(), TraceError> {
        self.line(format_args!(">>>>> MODULES BEGIN >>>>>"))?;
        for (owner, total) in modules.iter() {
            self.line(format_args!("  module {owner} has {total} outstanding bytes"))?;
        }
        self.line(format_args!("<<<<<< MODULES END <<<<<"))
    }

    /// Program output, byte for byte as read, terminator included.
    ///
    /// A final line that arrived without a terminator gets a `\n`.
    pub fn write_passthrough(&mut self, raw: &[u8]) -> Result<(), TraceError> {
        self.out.write_all(raw).map_err(TraceError::Sink)?;
        if !raw.ends_with(b"\n") {
            self.out.write_all(b"\n").map_err(TraceError::Sink)?;
        }
        Ok(())
    }

    /// Trace line that matched no known call shape.
    pub fn write_unrecognized(&mut self, body: &str) -> Result<(), TraceError> {
        self.line(format_args!("unhandled malloc line: {body}"))
    }

    /// End-of-stream dump of unfreed allocations and final totals.
    pub fn write_leaks(&mut self, leaks: &LeakReport) -> Result<(), TraceError> {
        for (address, record) in &leaks.unfreed {
            self.line(format_args!(
                "unfreed: {} {} bytes from {}",
                address, record.size, record.owner
            ))?;
        }
        for (owner, total) in &leaks.end_totals {
            self.line(format_args!(
                "module {owner} has {total} outstanding bytes at exit"
            ))?;
        }
        Ok(())
    }

    /// Push buffered lines to the sink.
    pub fn flush(&mut self) -> Result<(), TraceError> {
        self.out.flush().map_err(TraceError::Sink)
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<(), TraceError> {
        self.out
            .write_fmt(args)
            .and_then(|()| self.out.write_all(b"\n"))
            .map_err(TraceError::Sink)
    }
}
