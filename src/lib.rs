//! # Allocation diffs from an interleaved malloc trace
//!
//! An instrumented process writes one sentinel-prefixed line per allocator
//! call, mixed in with its ordinary output. This library rebuilds the set of
//! outstanding allocations from those lines and, every time the program
//! prints something (or goes quiet for a polling window), reports how many
//! bytes changed hands since the previous report.
//!
//! ## Pipeline
//!
//! 1. **Classification**: each line becomes a typed [`Line`]
//! 2. **Ledger**: address → (size, owner), with a running byte total
//! 3. **Module totals**: owner → signed outstanding bytes
//! 4. **Batching**: a producer thread feeds a queue; the engine flushes on
//!    program output, timeout, or end-of-stream
//! 5. **Reporting**: total diff, per-caller diffs, and a final leak dump
//!
//! ## Usage Example
//!
//! ```no_run
//! use allocdiff::{run, TrackerConfig};
//! use std::io::{self, BufReader};
//!
//! let config = TrackerConfig::default();
//! let stats = run(BufReader::new(io::stdin()), io::stdout(), &config)?;
//! eprintln!("{} events applied", stats.events);
//! # Ok::<(), allocdiff::TraceError>(())
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::io;

use thiserror::Error;

// Core modules - one per stage of the pipeline
pub mod classify;   // Trace line classification
pub mod ledger;     // Address-keyed ledger and per-caller totals
pub mod engine;     // Engine state and flush bookkeeping
pub mod scheduler;  // Producer thread and timeout-driven batching
pub mod report;     // Report line formatting
pub mod config;     // Tracker configuration

// Re-exports for convenience
pub use classify::{classify, AllocEvent, Line};
pub use config::TrackerConfig;
pub use engine::{EngineState, FlushDelta, LeakReport};
pub use ledger::{AllocationRecord, Ledger, ModuleDiff, ModuleTotals, TotalOverflow};
pub use report::ReportWriter;
pub use scheduler::{run, BatchScheduler, Feed, Phase, RunStats};

/// Errors that can occur while tracking a trace stream
#[derive(Error, Debug)]
pub enum TraceError {
    /// Configuration rejected before the run started
    #[error("invalid tracker configuration: {0}")]
    InvalidConfiguration(String),

    /// Reading the input stream failed; the final report was still written
    #[error("failed to read trace input: {0}")]
    Source(#[source] io::Error),

    /// Writing the report failed
    #[error("failed to write report: {0}")]
    Sink(#[source] io::Error),

    /// The input thread could not be started
    #[error("failed to start input thread: {0}")]
    Spawn(#[source] io::Error),

    /// The input thread died without signalling end-of-stream
    #[error("input producer thread panicked")]
    ProducerPanicked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_failure() {
        let err = TraceError::InvalidConfiguration("prefix must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "invalid tracker configuration: prefix must not be empty"
        );

        let err = TraceError::Sink(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        assert!(err.to_string().starts_with("failed to write report"));
    }
}
