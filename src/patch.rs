/*-
 * Copyright 2003-2005 Colin Percival
 * Copyright 2012 Matthew Endsley
 * Modified 2017 Pieter-Jan Briers
 * Modified 2021 Kornel Lesinski
 * Modified 2025 - Streaming application and validation
 * All rights reserved
 *
 * Redistribution and use in source and binary forms, with or without
 * modification, are permitted providing that the following conditions
 * are met:
 * 1. Redistributions of source code must retain the above copyright
 *    notice, this list of conditions and the following disclaimer.
 * 2. Redistributions in binary form must reproduce the above copyright
 *    notice, this list of conditions and the following disclaimer in the
 *    documentation and/or other materials provided with the distribution.
 *
 * THIS SOFTWARE IS PROVIDED BY THE AUTHOR ``AS IS'' AND ANY EXPRESS OR
 * IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE IMPLIED
 * WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE
 * ARE DISCLAIMED.  IN NO EVENT SHALL THE AUTHOR BE LIABLE FOR ANY
 * DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
 * DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS
 * OR SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION)
 * HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT,
 * STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING
 * IN ANY WAY OUT OF THE USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE
 * POSSIBILITY OF SUCH DAMAGE.
 */

use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};

use bzip2::read::BzDecoder;

use crate::add_reader::{read_full, AddReadError, ByteAddReader, Side};
use crate::control::ControlReader;
use crate::counter::WriteCounter;
use crate::error::{PatchError, PatchResult};
use crate::header::{PatchHeader, Segment, SegmentLayout};

/// Default size of the copy buffer and of the diff scratch buffer.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

const MIN_BUFFER_SIZE: usize = 128;

// Cap on what the in-memory wrapper reserves up front from an untrusted header.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// Tuning knobs for [`Patcher`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchConfig {
    /// Copy buffer size, at least 128 bytes
    pub buffer_size: usize,
    /// Reject patches declaring a bigger new file than this
    pub size_limit: Option<u64>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            size_limit: None,
        }
    }
}

/// Apply a patch to an "old" file, writing the "new" file.
///
/// `old` is read and seeked, `patch` is the whole BSDIFF40 patch, `new`
/// receives exactly the header's declared size on success. Returns the number
/// of bytes written.
///
/// On error, whatever was already written to `new` stays there; callers
/// writing to a file should discard it.
pub fn apply<R, W>(old: R, patch: &[u8], new: W) -> PatchResult<u64>
where
    R: Read + Seek,
    W: Write,
{
    Patcher::new(patch)?.apply(old, new)
}

/// Apply a patch to an in-memory old file, returning the new file.
pub fn apply_bytes(old: &[u8], patch: &[u8]) -> PatchResult<Vec<u8>> {
    let patcher = Patcher::new(patch)?;
    let capacity = patcher.new_size().min(MAX_PREALLOC) as usize;
    let mut new = Vec::with_capacity(capacity);
    patcher.apply(Cursor::new(old), &mut new)?;
    Ok(new)
}

/// Read `old` and `patch` fully into memory, then apply.
pub fn apply_reader<R, P, W>(mut old: R, mut patch: P, new: W) -> PatchResult<u64>
where
    R: Read,
    P: Read,
    W: Write,
{
    let mut old_bytes = Vec::new();
    old.read_to_end(&mut old_bytes)
        .map_err(|e| PatchError::io("reading old file", e))?;
    let mut patch_bytes = Vec::new();
    patch
        .read_to_end(&mut patch_bytes)
        .map_err(|e| PatchError::io("reading patch", e))?;
    apply(Cursor::new(old_bytes), &patch_bytes, new)
}

/// A parsed patch, ready to be applied.
///
/// Parsing happens once in [`Patcher::new`]; every call to
/// [`Patcher::apply`] opens fresh decompression sessions, so the same patcher
/// can be applied to several old files.
///
/// ```
/// use std::io::Cursor;
/// use bspatch_stream::Patcher;
///
/// fn bspatch(old: &[u8], patch: &[u8]) -> Result<Vec<u8>, bspatch_stream::PatchError> {
///     let patcher = Patcher::new(patch)?.buffer_size(4096);
///     let mut new = Vec::with_capacity(patcher.new_size() as usize);
///     patcher.apply(Cursor::new(old), &mut new)?;
///     Ok(new)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Patcher<'p> {
    patch: &'p [u8],
    header: PatchHeader,
    config: PatchConfig,
}

impl<'p> Patcher<'p> {
    /// Parse the patch header. Fails on a short header, bad magic or
    /// negative lengths.
    pub fn new(patch: &'p [u8]) -> PatchResult<Self> {
        Self::with_config(patch, PatchConfig::default())
    }

    pub fn with_config(patch: &'p [u8], config: PatchConfig) -> PatchResult<Self> {
        let header = PatchHeader::parse(patch)?;
        Ok(Self {
            patch,
            header,
            config: PatchConfig {
                buffer_size: config.buffer_size.max(MIN_BUFFER_SIZE),
                ..config
            },
        })
    }

    /// Set the copy buffer size (floored at 128 bytes).
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config.buffer_size = size.max(MIN_BUFFER_SIZE);
        self
    }

    /// Refuse to produce more than `limit` bytes.
    pub fn size_limit(mut self, limit: u64) -> Self {
        self.config.size_limit = Some(limit);
        self
    }

    pub fn header(&self) -> &PatchHeader {
        &self.header
    }

    pub fn config(&self) -> &PatchConfig {
        &self.config
    }

    /// Size of the new file, as declared by the header
    pub fn new_size(&self) -> u64 {
        self.header.new_size
    }

    /// Reconstruct the new file from `old` into `new`.
    pub fn apply<R, W>(&self, old: R, new: W) -> PatchResult<u64>
    where
        R: Read + Seek,
        W: Write,
    {
        let new_size = self.header.new_size;
        if let Some(limit) = self.config.size_limit {
            if new_size > limit {
                return Err(PatchError::SizeLimit { new_size, limit });
            }
        }

        let layout = self.header.layout();
        let open = |segment| Session::open(self.patch, &layout, segment);
        let mut ctrl = ControlReader::new(open(Segment::Control));
        let mut adder = ByteAddReader::new(open(Segment::Diff), old, self.config.buffer_size);
        let mut extra = open(Segment::Extra);

        let mut new = WriteCounter::new(new);
        let mut buf = vec![0u8; self.config.buffer_size];

        while new.count() < new_size {
            let triple = ctrl.next_triple()?;
            let (add_len, copy_len) = triple.lengths()?;

            // Diff bytes added to old bytes
            check_block(Segment::Diff, new.count(), add_len, new_size)?;
            copy_block(&mut adder, &mut new, add_len, &mut buf, Segment::Diff)?;

            // Extra bytes copied verbatim
            check_block(Segment::Extra, new.count(), copy_len, new_size)?;
            copy_block(&mut extra, &mut new, copy_len, &mut buf, Segment::Extra)?;

            if triple.seek_delta != 0 {
                adder
                    .old_mut()
                    .seek(SeekFrom::Current(triple.seek_delta))
                    .map_err(|source| PatchError::Seek {
                        delta: triple.seek_delta,
                        source,
                    })?;
            }
        }

        let (diff, _old) = adder.into_parts();
        ctrl.into_inner().close()?;
        diff.close()?;
        extra.close()?;

        new.flush()
            .map_err(|e| PatchError::io("flushing new file", e))?;
        Ok(new.count())
    }
}

/// One bzip2 decompression session over a segment of the patch
struct Session<'p> {
    segment: Segment,
    compressed_len: usize,
    decoder: BzDecoder<&'p [u8]>,
}

impl<'p> Session<'p> {
    fn open(patch: &'p [u8], layout: &SegmentLayout, segment: Segment) -> Self {
        let data = layout.slice(patch, segment);
        Self {
            segment,
            compressed_len: data.len(),
            decoder: BzDecoder::new(data),
        }
    }

    /// Check the stream once the new file is complete.
    ///
    /// The control stream must end right after the last triple. Leftover diff
    /// or extra bytes are ignored, but a stream that was fully read must still
    /// end with a valid trailer.
    fn close(mut self) -> PatchResult<()> {
        // Nothing was stored and nothing was needed from it
        if self.compressed_len == 0 {
            return Ok(());
        }
        let mut probe = [0u8; 1];
        match read_full(&mut self.decoder, &mut probe) {
            Ok(0) => Ok(()),
            Ok(_) if self.segment == Segment::Control => Err(PatchError::TrailingData {
                segment: self.segment,
            }),
            Ok(_) => Ok(()),
            Err(source) => Err(PatchError::UncleanEnd {
                segment: self.segment,
                source,
            }),
        }
    }
}

impl Read for Session<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.decoder.read(buf)
    }
}

#[inline]
fn check_block(segment: Segment, written: u64, len: u64, new_size: u64) -> PatchResult<()> {
    if written.checked_add(len).map_or(true, |end| end > new_size) {
        return Err(PatchError::BlockOverflow {
            segment,
            written,
            len,
            new_size,
        });
    }
    Ok(())
}

/// Copy exactly `len` bytes from `src` to `dst`; anything less is corrupt.
fn copy_block<R: Read, W: Write>(
    src: &mut R,
    dst: &mut WriteCounter<W>,
    len: u64,
    buf: &mut [u8],
    segment: Segment,
) -> PatchResult<()> {
    let mut copied = 0u64;
    while copied < len {
        let want = usize::try_from(len - copied).map_or(buf.len(), |rest| rest.min(buf.len()));
        let n = match src.read(&mut buf[..want]) {
            Ok(0) => return Err(PatchError::truncated(segment, len, copied, None)),
            Ok(n) => n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_read_error(segment, len, copied, e)),
        };
        dst.write_all(&buf[..n])
            .map_err(|e| PatchError::io("writing new file", e))?;
        copied += n as u64;
    }
    Ok(())
}

fn classify_read_error(segment: Segment, expected: u64, actual: u64, err: io::Error) -> PatchError {
    match err.downcast::<AddReadError>() {
        Ok(AddReadError::UnequalReads { diff, old }) => PatchError::UnequalReads { diff, old },
        Ok(AddReadError::Source {
            side: Side::Old,
            source,
        }) => PatchError::io("reading old file", source),
        Ok(AddReadError::Source {
            side: Side::Diff,
            source,
        }) => PatchError::truncated(segment, expected, actual, Some(source)),
        Err(err) => PatchError::truncated(segment, expected, actual, Some(err)),
    }
}
