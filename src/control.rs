use std::io::{self, Read};

use crate::error::{PatchError, PatchResult};
use crate::header::Segment;
use crate::varint::{self, INT_LEN};

/// One control-block record: add `add_len` bytes of diff to old, copy
/// `copy_len` bytes of extra, then move the old cursor by `seek_delta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlTriple {
    pub add_len: i64,
    pub copy_len: i64,
    pub seek_delta: i64,
}

impl ControlTriple {
    /// The add and copy lengths as byte counts, rejecting negative values
    pub fn lengths(&self) -> PatchResult<(u64, u64)> {
        let count = |field: &'static str, value: i64| {
            u64::try_from(value).map_err(|_| PatchError::NegativeControl { field, value })
        };
        Ok((count("add_len", self.add_len)?, count("copy_len", self.copy_len)?))
    }
}

/// Decodes triples from the decompressed control stream
pub struct ControlReader<R> {
    inner: R,
}

impl<R: Read> ControlReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next triple. The stream must hold a whole triple: running
    /// dry anywhere inside one, including before its first byte, is corrupt.
    pub fn next_triple(&mut self) -> PatchResult<ControlTriple> {
        Ok(ControlTriple {
            add_len: self.next_int()?,
            copy_len: self.next_int()?,
            seek_delta: self.next_int()?,
        })
    }

    fn next_int(&mut self) -> PatchResult<i64> {
        let mut buf = [0u8; INT_LEN];
        let mut got = 0;
        while got < INT_LEN {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(PatchError::truncated(
                        Segment::Control,
                        INT_LEN as u64,
                        got as u64,
                        Some(e),
                    ))
                }
            }
        }
        if got != INT_LEN {
            return Err(PatchError::truncated(
                Segment::Control,
                INT_LEN as u64,
                got as u64,
                None,
            ));
        }
        Ok(varint::decode(buf))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
