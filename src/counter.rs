use std::io::{self, Write};

/// Pass-through sink that counts how many bytes the inner writer accepted.
///
/// Short writes are reported as-is; nothing is buffered here.
pub struct WriteCounter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> WriteCounter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Total bytes forwarded so far
    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for WriteCounter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
