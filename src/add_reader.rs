// add_reader.rs - diff stream + old file, added bytewise

use std::fmt;
use std::io::{self, Read};

use thiserror::Error;

/// Which input of a [`ByteAddReader`] a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Diff,
    Old,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Diff => "diff stream",
            Side::Old => "old file",
        })
    }
}

/// Failure of a [`ByteAddReader`]. Travels inside `io::Error` through the
/// `Read` impl and can be recovered with `io::Error::downcast`.
#[derive(Error, Debug)]
pub enum AddReadError {
    #[error("did not read equal number of bytes from both readers (diff {diff}, old {old})")]
    UnequalReads { diff: usize, old: usize },

    #[error("{side} read failed: {source}")]
    Source {
        side: Side,
        #[source]
        source: io::Error,
    },
}

impl From<AddReadError> for io::Error {
    fn from(err: AddReadError) -> Self {
        let kind = match &err {
            AddReadError::UnequalReads { .. } => io::ErrorKind::InvalidData,
            AddReadError::Source { source, .. } => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

/// Reads `diff` and `old` in lockstep and yields `diff[i] + old[i]` (mod 256).
///
/// Every chunk taken from `diff` must be matched by exactly as many bytes from
/// `old`, however many reads that takes. The stream only ends when both
/// inputs end together.
pub struct ByteAddReader<A, B> {
    diff: A,
    old: B,
    scratch: Box<[u8]>,
}

impl<A: Read, B: Read> ByteAddReader<A, B> {
    /// `chunk` bounds the scratch buffer used for diff bytes.
    pub fn new(diff: A, old: B, chunk: usize) -> Self {
        Self {
            diff,
            old,
            scratch: vec![0; chunk.max(1)].into_boxed_slice(),
        }
    }

    /// Access the old input, e.g. to seek it between reads
    pub fn old_mut(&mut self) -> &mut B {
        &mut self.old
    }

    pub fn into_parts(self) -> (A, B) {
        (self.diff, self.old)
    }

    fn fail(side: Side) -> impl FnOnce(io::Error) -> io::Error {
        move |source| AddReadError::Source { side, source }.into()
    }
}

impl<A: Read, B: Read> Read for ByteAddReader<A, B> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let want = (buf.len() - filled).min(self.scratch.len());
            let n = read_retrying(&mut self.diff, &mut self.scratch[..want])
                .map_err(Self::fail(Side::Diff))?;

            if n == 0 {
                // Hand out what we have; the end is checked on the next call
                if filled > 0 {
                    break;
                }
                // Diff is done; only a clean end if old is done too.
                let mut probe = [0u8; 1];
                let m = read_retrying(&mut self.old, &mut probe).map_err(Self::fail(Side::Old))?;
                if m != 0 {
                    return Err(AddReadError::UnequalReads { diff: 0, old: m }.into());
                }
                break;
            }

            let out = &mut buf[filled..filled + n];
            let got = read_full(&mut self.old, out).map_err(Self::fail(Side::Old))?;
            if got != n {
                return Err(AddReadError::UnequalReads { diff: n, old: got }.into());
            }
            for (o, d) in out.iter_mut().zip(&self.scratch[..n]) {
                *o = o.wrapping_add(*d);
            }
            filled += n;
        }
        Ok(filled)
    }
}

#[inline]
fn read_retrying<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match reader.read(buf) {
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
            res => return res,
        }
    }
}

/// Read until `buf` is full or the reader ends. Returns the count read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        match read_retrying(reader, &mut buf[n..])? {
            0 => break,
            k => n += k,
        }
    }
    Ok(n)
}
