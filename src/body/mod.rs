//! Response body plumbing: the byte-counting stream and the mode-guarded
//! wrapper handlers write through.

mod counting;
mod metered;

pub use counting::CountingStream;
pub use metered::{MeteredBody, OutputModeError, TextWriter};

use std::io;

/// The operations the measuring layer needs from a response byte channel.
///
/// Everything else about a response (status, headers) belongs to the HTTP
/// adapter; the wrapper only ever writes, flushes, and resets.
pub trait BodySink: io::Write {
    /// Discard everything buffered so far. Called when a handler resets the
    /// response before committing it.
    fn reset_buffer(&mut self);
}

impl BodySink for Vec<u8> {
    fn reset_buffer(&mut self) {
        self.clear();
    }
}
