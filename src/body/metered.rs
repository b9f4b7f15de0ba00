use std::io::{self, Write};

use thiserror::Error;

use super::{BodySink, CountingStream};

/// A response body may be written through the binary stream or the text
/// writer, never both. Mixing the two is a handler bug and fails loudly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutputModeError {
    #[error("writer() is unavailable: output_stream() was already used for this response")]
    StreamInUse,
    #[error("output_stream() is unavailable: writer() was already used for this response")]
    WriterInUse,
}

impl From<OutputModeError> for io::Error {
    fn from(err: OutputModeError) -> Self {
        io::Error::other(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Unset,
    Stream,
    Writer,
}

/// Wraps a response body sink, tracks how many bytes reach it, and enforces
/// that a handler commits to exactly one output API.
///
/// Repeated calls to the engaged accessor keep returning the same underlying
/// counted stream, so the size is cumulative no matter how the handler slices
/// its writes. [`reset`](Self::reset) returns the body to the untouched state
/// (count zeroed, sink buffer cleared, mode open again).
#[derive(Debug)]
pub struct MeteredBody<S: BodySink> {
    stream: CountingStream<S>,
    mode: OutputMode,
}

impl<S: BodySink> MeteredBody<S> {
    pub fn new(sink: S) -> Self {
        Self {
            stream: CountingStream::new(sink),
            mode: OutputMode::Unset,
        }
    }

    /// Binary output API.
    pub fn output_stream(&mut self) -> Result<&mut CountingStream<S>, OutputModeError> {
        match self.mode {
            OutputMode::Writer => Err(OutputModeError::WriterInUse),
            _ => {
                self.mode = OutputMode::Stream;
                Ok(&mut self.stream)
            }
        }
    }

    /// Text output API. The returned writer flushes through to the sink on
    /// every write, so the tracked size follows real-time output.
    pub fn writer(&mut self) -> Result<TextWriter<'_, S>, OutputModeError> {
        match self.mode {
            OutputMode::Stream => Err(OutputModeError::StreamInUse),
            _ => {
                self.mode = OutputMode::Writer;
                Ok(TextWriter {
                    stream: &mut self.stream,
                })
            }
        }
    }

    /// Bytes written so far through either API; 0 when neither was used.
    pub fn response_size(&self) -> u64 {
        self.stream.bytes_written()
    }

    /// Flush the active output. No-op when nothing was written yet.
    pub fn flush_buffer(&mut self) -> io::Result<()> {
        match self.mode {
            OutputMode::Unset => Ok(()),
            _ => self.stream.flush(),
        }
    }

    /// Discard buffered output and start over: the count returns to 0 and the
    /// handler may pick either output API again.
    pub fn reset(&mut self) {
        self.stream.reset_count();
        self.stream.get_mut().reset_buffer();
        self.mode = OutputMode::Unset;
    }

    /// Hand the sink back once handling is complete.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}

/// Auto-flushing UTF-8 text writer over a metered body.
///
/// Supports `write!`/`writeln!` via the inherent `write_fmt`; every call
/// pushes its bytes all the way through to the sink before returning. Sink
/// errors propagate unchanged.
#[derive(Debug)]
pub struct TextWriter<'a, S: BodySink> {
    stream: &'a mut CountingStream<S>,
}

impl<S: BodySink> TextWriter<'_, S> {
    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.stream.write_all(s.as_bytes())?;
        self.stream.flush()
    }

    pub fn write_char(&mut self, c: char) -> io::Result<()> {
        let mut buf = [0u8; 4];
        self.write_str(c.encode_utf8(&mut buf))
    }

    pub fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.stream.write_fmt(args)?;
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_after_stream_is_rejected() {
        let mut body = MeteredBody::new(Vec::new());
        body.output_stream().unwrap().write_all(b"raw").unwrap();
        assert_eq!(body.writer().unwrap_err(), OutputModeError::StreamInUse);
    }

    #[test]
    fn test_stream_after_writer_is_rejected() {
        let mut body = MeteredBody::new(Vec::new());
        body.writer().unwrap().write_str("text").unwrap();
        assert_eq!(
            body.output_stream().unwrap_err(),
            OutputModeError::WriterInUse
        );
    }

    #[test]
    fn test_repeating_the_engaged_accessor_accumulates() {
        let mut body = MeteredBody::new(Vec::new());
        body.output_stream().unwrap().write_all(b"ab").unwrap();
        body.output_stream().unwrap().write_all(b"cd").unwrap();
        assert_eq!(body.response_size(), 4);
    }

    #[test]
    fn test_reset_reopens_mode_choice() {
        let mut body = MeteredBody::new(Vec::new());
        body.output_stream().unwrap().write_all(b"binary").unwrap();
        body.reset();
        assert_eq!(body.response_size(), 0);
        let mut w = body.writer().unwrap();
        w.write_str("text").unwrap();
        assert_eq!(body.response_size(), 4);
        assert_eq!(body.into_inner(), b"text");
    }
}
