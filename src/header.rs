//! BSDIFF40 header parsing and segment layout
//!
//! ```text
//! offset  size  content
//! 0       8     "BSDIFF40"
//! 8       8     X = control_len
//! 16      8     Y = data_len
//! 24      8     sizeof(newfile)
//! 32      X     bzip2(control block)
//! 32+X    Y     bzip2(diff block)
//! 32+X+Y  ???   bzip2(extra block)
//! ```

use std::fmt;
use std::ops::Range;

use crate::error::{PatchError, PatchResult};
use crate::varint;

/// Fixed size of the patch header.
pub const HEADER_LEN: usize = 32;

/// Magic tag every BSDIFF4 patch starts with.
pub const BSDIFF_MAGIC: &[u8; 8] = b"BSDIFF40";

/// One of the three compressed sub-streams of a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// Control triples
    Control,
    /// Bytes added to the old file
    Diff,
    /// Bytes copied verbatim
    Extra,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Segment::Control => "control",
            Segment::Diff => "diff",
            Segment::Extra => "extra",
        })
    }
}

/// Decoded patch header. Lengths are validated non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchHeader {
    /// Compressed control segment length
    pub control_len: u64,
    /// Compressed diff segment length
    pub data_len: u64,
    /// Exact length of the reconstructed file
    pub new_size: u64,
}

/// Byte ranges of the three segments inside the patch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentLayout {
    pub control: Range<u64>,
    pub diff: Range<u64>,
    /// The extra segment runs to the end of the patch.
    pub extra_start: u64,
}

impl PatchHeader {
    /// Parse the first 32 bytes of `patch`.
    pub fn parse(patch: &[u8]) -> PatchResult<Self> {
        let header: &[u8; HEADER_LEN] = patch
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(PatchError::ShortHeader {
                actual: patch.len(),
            })?;

        let (magic, rest) = header.split_at(8);
        if magic != BSDIFF_MAGIC {
            let mut found = [0u8; 8];
            found.copy_from_slice(magic);
            return Err(PatchError::BadMagic { found });
        }

        let mut fields = rest.chunks_exact(varint::INT_LEN).map(|chunk| {
            let mut buf = [0u8; varint::INT_LEN];
            buf.copy_from_slice(chunk);
            varint::decode(buf)
        });
        let mut next = |field: &'static str| -> PatchResult<u64> {
            let value = fields.next().unwrap_or_default();
            u64::try_from(value).map_err(|_| PatchError::NegativeLength { field, value })
        };

        Ok(Self {
            control_len: next("control_len")?,
            data_len: next("data_len")?,
            new_size: next("new_size")?,
        })
    }

    /// Compute where each segment lives. Does not check the patch is long enough.
    pub fn layout(&self) -> SegmentLayout {
        // Saturate: a huge pair of lengths just points past the end of any patch.
        let control_start = HEADER_LEN as u64;
        let diff_start = control_start.saturating_add(self.control_len);
        let extra_start = diff_start.saturating_add(self.data_len);
        SegmentLayout {
            control: control_start..diff_start,
            diff: diff_start..extra_start,
            extra_start,
        }
    }
}

impl SegmentLayout {
    /// Slice `segment` out of `patch`, clamped to what the patch actually holds.
    pub fn slice<'p>(&self, patch: &'p [u8], segment: Segment) -> &'p [u8] {
        let range = match segment {
            Segment::Control => self.control.clone(),
            Segment::Diff => self.diff.clone(),
            Segment::Extra => self.extra_start..patch.len() as u64,
        };
        let clamp = |pos: u64| usize::try_from(pos).map_or(patch.len(), |p| p.min(patch.len()));
        let start = clamp(range.start);
        let end = clamp(range.end).max(start);
        &patch[start..end]
    }
}
