//! Input producer thread

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use flume::Sender;
use tracing::{debug, error};

use super::Feed;

/// Start a thread forwarding every line of `reader` into `tx`.
///
/// The thread always finishes by sending [`Feed::EndOfStream`], also when
/// reading fails; the read error is returned through the join handle.
/// Returns the number of lines forwarded.
pub fn spawn_producer<R>(reader: R, tx: Sender<Feed>) -> io::Result<JoinHandle<io::Result<u64>>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("allocdiff-reader".to_string())
        .spawn(move || {
            let result = forward_lines(reader, &tx);
            match &result {
                Ok(lines) => debug!(lines, "trace input exhausted"),
                Err(err) => error!(error = %err, "reading trace input failed"),
            }
            // The engine may already be gone; nothing left to tell it then.
            let _ = tx.send(Feed::EndOfStream);
            result
        })
}

/// Lines travel as raw bytes, terminator included, so program output can be
/// echoed exactly as it was read.
fn forward_lines<R: BufRead>(mut reader: R, tx: &Sender<Feed>) -> io::Result<u64> {
    let mut forwarded = 0;
    loop {
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(forwarded);
        }
        if tx.send(Feed::Line(buf)).is_err() {
            return Ok(forwarded);
        }
        forwarded += 1;
    }
}
