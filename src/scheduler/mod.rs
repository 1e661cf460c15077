//! Timeout-driven batching of trace lines
//!
//! A producer thread reads the input to completion and forwards every line,
//! then a terminal [`Feed::EndOfStream`], into one FIFO queue. The engine
//! consumes the queue with a bounded wait:
//!
//! - trace line: classify and apply, no flush
//! - program output: flush, then echo the line
//! - nothing within the polling window: flush
//! - end-of-stream: final flush, leak dump, done
//!
//! Only the engine touches the ledger, so no locking is involved.

mod producer;

pub use producer::spawn_producer;

use std::borrow::Cow;
use std::io::{BufRead, Write};

use flume::{Receiver, RecvTimeoutError};
use tracing::{info, warn};

use crate::classify::{classify, Line};
use crate::config::TrackerConfig;
use crate::engine::{EngineState, FlushDelta};
use crate::report::ReportWriter;
use crate::TraceError;

/// Item delivered from the producer to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// One raw input line, terminator included when present
    Line(Vec<u8>),
    /// Input exhausted (or failed)
    EndOfStream,
}

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Consuming input
    Running,
    /// Input closed, final report pending
    Draining,
    /// Final report written
    Done,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Lines received from the producer
    pub lines: u64,
    /// Lines carrying the sentinel prefix
    pub trace_lines: u64,
    /// Trace lines applied as allocator events
    pub events: u64,
    /// Trace lines matching no known shape
    pub unrecognized: u64,
    /// Program output lines echoed
    pub passthrough: u64,
    /// Flushes performed, including the final one
    pub flushes: u64,
    /// Flushes caused by an empty polling window
    pub timeouts: u64,
}

/// Engine loop owning the allocation state and the report sink
#[derive(Debug)]
pub struct BatchScheduler<W: Write> {
    config: TrackerConfig,
    state: EngineState,
    report: ReportWriter<W>,
    phase: Phase,
    stats: RunStats,
}

impl<W: Write> BatchScheduler<W> {
    /// Create a scheduler writing its report to `out`
    pub fn new(config: TrackerConfig, out: W) -> Self {
        Self {
            config,
            state: EngineState::new(),
            report: ReportWriter::new(out),
            phase: Phase::Running,
            stats: RunStats::default(),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Allocation state accumulated so far
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    /// Counters accumulated so far
    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Recover the report sink
    pub fn into_writer(self) -> W {
        self.report.into_inner()
    }

    /// Consume the queue until end-of-stream has been fully processed.
    pub fn run(&mut self, rx: &Receiver<Feed>) -> Result<RunStats, TraceError> {
        while self.phase == Phase::Running {
            match rx.recv_timeout(self.config.poll_interval) {
                Ok(Feed::Line(raw)) => self.handle_line(&raw)?,
                Ok(Feed::EndOfStream) => self.handle_end()?,
                Err(RecvTimeoutError::Timeout) => self.handle_timeout()?,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("input queue closed without end-of-stream");
                    self.handle_end()?;
                }
            }
        }
        Ok(self.stats)
    }

    /// Process one received line.
    ///
    /// Classification sees the line without its terminator, with invalid
    /// UTF-8 replaced; program output is echoed from `raw` untouched.
    pub fn handle_line(&mut self, raw: &[u8]) -> Result<(), TraceError> {
        self.stats.lines += 1;
        let text = line_text(raw);
        match classify(&text, &self.config.prefix) {
            Line::Event(event) => {
                self.stats.trace_lines += 1;
                match self.state.apply(&event) {
                    Ok(()) => self.stats.events += 1,
                    Err(err) => {
                        self.stats.unrecognized += 1;
                        let body = text.strip_prefix(self.config.prefix.as_str()).unwrap_or(&text);
                        warn!(line = body, error = %err, "trace line refused");
                        self.report.write_unrecognized(body)?;
                    }
                }
            }
            Line::Unrecognized(body) => {
                self.stats.trace_lines += 1;
                self.stats.unrecognized += 1;
                warn!(line = body, "unrecognized trace line");
                self.report.write_unrecognized(body)?;
            }
            Line::Passthrough(_) => {
                self.stats.passthrough += 1;
                self.flush_period()?;
                self.report.write_passthrough(raw)?;
                self.report.flush()?;
            }
        }
        Ok(())
    }

    /// Polling window elapsed with nothing received.
    pub fn handle_timeout(&mut self) -> Result<(), TraceError> {
        self.stats.timeouts += 1;
        self.flush_period()?;
        self.report.flush()
    }

    /// Input finished: final flush, leak dump, done.
    pub fn handle_end(&mut self) -> Result<(), TraceError> {
        if self.phase != Phase::Running {
            return Ok(());
        }
        self.phase = Phase::Draining;

        let (delta, leaks) = self.state.drain();
        self.write_period(&delta)?;
        self.report.write_leaks(&leaks)?;
        self.report.flush()?;

        info!(
            unfreed = leaks.unfreed.len(),
            outstanding = self.state.current_total(),
            "trace drained"
        );
        self.phase = Phase::Done;
        Ok(())
    }

    fn flush_period(&mut self) -> Result<(), TraceError> {
        let delta = self.state.flush();
        self.write_period(&delta)
    }

    fn write_period(&mut self, delta: &FlushDelta) -> Result<(), TraceError> {
        self.stats.flushes += 1;
        self.report.write_flush(delta)?;
        if self.config.module_table {
            self.report.write_module_table(self.state.modules())?;
        }
        Ok(())
    }
}

/// Text of a raw line for classification.
fn line_text(raw: &[u8]) -> Cow<'_, str> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw)
}

/// Track `reader` to completion, writing the report to `out`.
///
/// A read failure ends the input early; the final report is still written
/// before the failure is returned.
pub fn run<R, W>(reader: R, out: W, config: &TrackerConfig) -> Result<RunStats, TraceError>
where
    R: BufRead + Send + 'static,
    W: Write,
{
    config.validate()?;

    let (tx, rx) = flume::unbounded();
    let producer = spawn_producer(reader, tx).map_err(TraceError::Spawn)?;

    let mut scheduler = BatchScheduler::new(config.clone(), out);
    let stats = scheduler.run(&rx)?;

    match producer.join() {
        Ok(Ok(_)) => Ok(stats),
        Ok(Err(err)) => Err(TraceError::Source(err)),
        Err(_) => Err(TraceError::ProducerPanicked),
    }
}
