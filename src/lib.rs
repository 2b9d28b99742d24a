#![allow(clippy::needless_doctest_main)]
#![doc = include_str!("../README.md")]

mod add_reader;
mod control;
mod counter;
mod error;
mod file;
mod header;
mod patch;
pub mod varint;

#[cfg(test)]
mod testing;

pub use add_reader::{AddReadError, ByteAddReader, Side};
pub use control::{ControlReader, ControlTriple};
pub use counter::WriteCounter;
pub use error::{PatchError, PatchResult};
pub use file::apply_file;
pub use header::{PatchHeader, Segment, SegmentLayout, BSDIFF_MAGIC, HEADER_LEN};
pub use patch::{apply, apply_bytes, apply_reader, PatchConfig, Patcher, DEFAULT_BUFFER_SIZE};

pub use patch::apply as apply_patch;
