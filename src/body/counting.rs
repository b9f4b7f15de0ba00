use std::io::{self, Write};

/// `io::Write` adapter that counts the bytes its inner writer accepts.
///
/// Writes and flushes pass straight through; the counter only ever grows by
/// what the inner writer actually took, so short writes are never
/// over-counted. Errors from the inner writer propagate unchanged.
#[derive(Debug)]
pub struct CountingStream<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingStream<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Total bytes accepted by the inner writer since construction or the
    /// last [`reset_count`](Self::reset_count).
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Zero the counter without touching the inner writer.
    pub fn reset_count(&mut self) {
        self.written = 0;
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    // Crate-private: handing out `&mut W` would let callers write past the
    // counter.
    pub(crate) fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingStream<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_bytes_the_inner_writer_accepts() {
        let mut stream = CountingStream::new(Vec::new());
        stream.write_all(b"hello").unwrap();
        stream.write_all(b" world").unwrap();
        assert_eq!(stream.bytes_written(), 11);
        assert_eq!(stream.into_inner(), b"hello world");
    }

    #[test]
    fn test_fresh_stream_reports_zero() {
        let stream = CountingStream::new(Vec::new());
        assert_eq!(stream.bytes_written(), 0);
    }

    #[test]
    fn test_reset_count_zeroes_without_clearing_the_writer() {
        let mut stream = CountingStream::new(Vec::new());
        stream.write_all(b"abc").unwrap();
        stream.reset_count();
        assert_eq!(stream.bytes_written(), 0);
        assert_eq!(stream.get_ref().len(), 3);
    }

    #[test]
    fn test_write_errors_propagate_and_leave_the_count_alone() {
        struct Failing;
        impl Write for Failing {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut stream = CountingStream::new(Failing);
        let err = stream.write(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(stream.bytes_written(), 0);
    }
}
