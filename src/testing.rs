// testing.rs - BSDIFF40 patch fixtures for unit tests

use std::io::Write;

use bzip2::write::BzEncoder;
use bzip2::Compression as BzCompression;

use crate::header::BSDIFF_MAGIC;
use crate::varint;

/// Old file of the documented bspatch vector
pub(crate) const VECTOR_OLD: [u8; 15] = [
    0x66, 0xFF, 0xD1, 0x55, 0x56, 0x10, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xD1,
];

/// Expected new file of the documented bspatch vector
pub(crate) const VECTOR_NEW: [u8; 19] = [
    0x66, 0xFF, 0xD1, 0x55, 0x56, 0x10, 0x30, 0x00, 0x44, 0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0xD1, 0xFF, 0xD1,
];

/// Patch of the documented bspatch vector
pub(crate) const VECTOR_PATCH: [u8; 158] = [
    0x42, 0x53, 0x44, 0x49, 0x46, 0x46, 0x34, 0x30, 0x29, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x2A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x13, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x42, 0x5A, 0x68, 0x39, 0x31, 0x41, 0x59, 0x26, 0x53, 0x59, 0xDA, 0xE4, 0x46, 0xF2, 0x00, 0x00,
    0x05, 0xC0, 0x00, 0x4A, 0x09, 0x20, 0x00, 0x22, 0x34, 0xD9, 0x06, 0x06, 0x4B, 0x21, 0xEE, 0x17,
    0x72, 0x45, 0x38, 0x50, 0x90, 0xDA, 0xE4, 0x46, 0xF2, 0x42, 0x5A, 0x68, 0x39, 0x31, 0x41, 0x59,
    0x26, 0x53, 0x59, 0x30, 0x88, 0x1C, 0x89, 0x00, 0x00, 0x02, 0xC4, 0x00, 0x44, 0x00, 0x06, 0x00,
    0x20, 0x00, 0x21, 0x21, 0xA0, 0xC3, 0x1B, 0x03, 0x3C, 0x5D, 0xC9, 0x14, 0xE1, 0x42, 0x40, 0xC2,
    0x20, 0x72, 0x24, 0x42, 0x5A, 0x68, 0x39, 0x31, 0x41, 0x59, 0x26, 0x53, 0x59, 0x65, 0x25, 0x30,
    0x43, 0x00, 0x00, 0x00, 0x40, 0x02, 0xC0, 0x00, 0x20, 0x00, 0x00, 0x00, 0xA0, 0x00, 0x22, 0x1F,
    0xA4, 0x19, 0x82, 0x58, 0x5D, 0xC9, 0x14, 0xE1, 0x42, 0x41, 0x94, 0x94, 0xC1, 0x0C,
];

pub(crate) fn bz(data: &[u8]) -> Vec<u8> {
    let mut encoder = BzEncoder::new(Vec::new(), BzCompression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Lay out a patch from already compressed segments
pub(crate) fn assemble(control: &[u8], diff: &[u8], extra: &[u8], new_size: i64) -> Vec<u8> {
    let mut patch = BSDIFF_MAGIC.to_vec();
    patch.extend_from_slice(&varint::encode(control.len() as i64));
    patch.extend_from_slice(&varint::encode(diff.len() as i64));
    patch.extend_from_slice(&varint::encode(new_size));
    patch.extend_from_slice(control);
    patch.extend_from_slice(diff);
    patch.extend_from_slice(extra);
    patch
}

/// Builds patches from explicit control triples
#[derive(Default)]
pub(crate) struct PatchBuilder {
    ctrl: Vec<u8>,
    diff: Vec<u8>,
    extra: Vec<u8>,
    written: i64,
    new_size: Option<i64>,
}

impl PatchBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn triple(mut self, add: i64, copy: i64, seek: i64) -> Self {
        for v in [add, copy, seek] {
            self.ctrl.extend_from_slice(&varint::encode(v));
        }
        self.written = self.written.wrapping_add(add).wrapping_add(copy);
        self
    }

    pub(crate) fn diff(mut self, bytes: &[u8]) -> Self {
        self.diff.extend_from_slice(bytes);
        self
    }

    pub(crate) fn extra(mut self, bytes: &[u8]) -> Self {
        self.extra.extend_from_slice(bytes);
        self
    }

    /// Override the header's new size (defaults to the sum of all blocks)
    pub(crate) fn new_size(mut self, size: i64) -> Self {
        self.new_size = Some(size);
        self
    }

    /// Compressed control, diff and extra segments
    pub(crate) fn segments(&self) -> [Vec<u8>; 3] {
        [bz(&self.ctrl), bz(&self.diff), bz(&self.extra)]
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let [ctrl, diff, extra] = self.segments();
        assemble(&ctrl, &diff, &extra, self.new_size.unwrap_or(self.written))
    }
}

/// Simplest conforming patch: add over the common prefix, copy the rest
pub(crate) fn naive_patch(old: &[u8], new: &[u8]) -> Vec<u8> {
    let add = old.len().min(new.len());
    let diff: Vec<u8> = new[..add]
        .iter()
        .zip(&old[..add])
        .map(|(n, o)| n.wrapping_sub(*o))
        .collect();
    // An empty new file takes no triples at all
    if new.is_empty() {
        return PatchBuilder::new().build();
    }
    PatchBuilder::new()
        .triple(add as i64, (new.len() - add) as i64, 0)
        .diff(&diff)
        .extra(&new[add..])
        .build()
}
