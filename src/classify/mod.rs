//! Trace line classification
//!
//! Stateless mapping from one line of combined program output to a typed
//! [`Line`]. Lines without the sentinel prefix are program output and are
//! never looked at further; prefixed lines either parse into an
//! [`AllocEvent`] or are reported back as unrecognized.

mod event;
mod shapes;

pub use event::{AllocEvent, CallKind};

/// One classified input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Trace line describing an allocator call
    Event(AllocEvent<'a>),

    /// Trace line matching no known call shape (text after the prefix)
    Unrecognized(&'a str),

    /// Ordinary program output, passed through untouched
    Passthrough(&'a str),
}

impl Line<'_> {
    /// Whether the line carried the sentinel prefix.
    pub fn is_trace(&self) -> bool {
        !matches!(self, Line::Passthrough(_))
    }
}

/// Classify a single line (without its line terminator).
pub fn classify<'a>(line: &'a str, prefix: &str) -> Line<'a> {
    let Some(body) = line.strip_prefix(prefix) else {
        return Line::Passthrough(line);
    };

    match shapes::parse_trace(body) {
        Some(event) => Line::Event(event),
        None => Line::Unrecognized(body),
    }
}
