//! Error types for applying BSDIFF40 patches
//!
//! Every fault is terminal for the apply call that raised it. Variants carry
//! enough context (segment, expected and actual byte counts) to be reported
//! to an end user without re-reading the patch.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::header::Segment;

/// Errors raised while parsing or applying a patch
#[derive(Error, Debug)]
pub enum PatchError {
    /// Patch is shorter than its fixed header
    #[error("corrupt patch: short header read ({actual} < 32 bytes)")]
    ShortHeader {
        /// Bytes available
        actual: usize,
    },

    /// First 8 bytes are not `BSDIFF40`
    #[error("corrupt patch: incorrect magic {found:02x?} (expected BSDIFF40)")]
    BadMagic {
        /// Bytes found in the magic slot
        found: [u8; 8],
    },

    /// Header length field decoded to a negative value
    #[error("corrupt patch: negative {field} in header ({value})")]
    NegativeLength {
        /// Header field name
        field: &'static str,
        /// Decoded value
        value: i64,
    },

    /// Declared output size is above the configured limit
    #[error("new file size {new_size} exceeds limit of {limit} bytes")]
    SizeLimit {
        /// Size declared by the header
        new_size: u64,
        /// Configured limit
        limit: u64,
    },

    /// Control triple carries a negative add or copy length
    #[error("corrupt patch: negative {field} in control block ({value})")]
    NegativeControl {
        /// Triple field name
        field: &'static str,
        /// Decoded value
        value: i64,
    },

    /// A segment ended, or failed to decompress, before a declared count was read
    #[error("corrupt patch or bz stream ended: {segment} read ({actual}/{expected})")]
    TruncatedStream {
        /// Segment being read
        segment: Segment,
        /// Bytes required
        expected: u64,
        /// Bytes obtained before the stream stopped
        actual: u64,
        /// Decompressor failure, if the stream did not simply end
        #[source]
        source: Option<io::Error>,
    },

    /// The control stream still holds triples once the new file is complete
    #[error("corrupt patch: {segment} stream not fully consumed")]
    TrailingData {
        /// Segment with leftover data
        segment: Segment,
    },

    /// A segment failed to reach a clean end of stream when closed
    #[error("corrupt patch or bz stream ended: {segment} stream did not end cleanly: {source}")]
    UncleanEnd {
        /// Segment being closed
        segment: Segment,
        /// Decompressor failure
        #[source]
        source: io::Error,
    },

    /// A block would write past the declared new file size
    #[error(
        "corrupt patch: newfile pos {written} + {segment} block of {len} exceeds expected newfile size {new_size}"
    )]
    BlockOverflow {
        /// Segment supplying the block
        segment: Segment,
        /// Bytes already written
        written: u64,
        /// Block length from the control triple
        len: u64,
        /// Declared new file size
        new_size: u64,
    },

    /// Diff stream and old file disagreed on how many bytes they produced
    #[error("corrupt patch: unequal reads (diff stream {diff} bytes, old file {old} bytes)")]
    UnequalReads {
        /// Bytes produced by the diff stream
        diff: usize,
        /// Bytes produced by the old file
        old: usize,
    },

    /// Old file rejected a relative seek
    #[error("seek by {delta} in old file failed: {source}")]
    Seek {
        /// Relative offset from the control triple
        delta: i64,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Read or write failure on the old file or the output sink
    #[error("I/O error while {op}: {source}")]
    Io {
        /// What was being done
        op: &'static str,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// Failure opening, reading or creating a file in the path wrappers
    #[error("could not {action} '{}': {source}", .path.display())]
    File {
        /// What was being done
        action: &'static str,
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },
}

/// Result type for patch operations
pub type PatchResult<T> = Result<T, PatchError>;

impl PatchError {
    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        Self::Io { op, source }
    }

    pub(crate) fn file(action: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn truncated(
        segment: Segment,
        expected: u64,
        actual: u64,
        source: Option<io::Error>,
    ) -> Self {
        Self::TruncatedStream {
            segment,
            expected,
            actual,
            source,
        }
    }

    /// Check if this error means the patch itself is malformed
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            PatchError::ShortHeader { .. }
                | PatchError::BadMagic { .. }
                | PatchError::NegativeLength { .. }
                | PatchError::NegativeControl { .. }
                | PatchError::TruncatedStream { .. }
                | PatchError::TrailingData { .. }
                | PatchError::UncleanEnd { .. }
                | PatchError::BlockOverflow { .. }
                | PatchError::UnequalReads { .. }
        )
    }

    /// Check if this error came from the old file, the output or the filesystem
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            PatchError::Seek { .. } | PatchError::Io { .. } | PatchError::File { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let corrupt = [
            PatchError::ShortHeader { actual: 3 },
            PatchError::BadMagic { found: *b"BSDIFF41" },
            PatchError::NegativeLength {
                field: "new_size",
                value: -1,
            },
            PatchError::truncated(Segment::Extra, 5, 2, None),
            PatchError::UnequalReads { diff: 4, old: 1 },
        ];
        for error in &corrupt {
            assert!(error.is_corruption(), "{error:?}");
            assert!(!error.is_io(), "{error:?}");
        }

        let io_errors = [
            PatchError::io("writing new file", io::Error::other("disk full")),
            PatchError::Seek {
                delta: -3,
                source: io::ErrorKind::InvalidInput.into(),
            },
        ];
        for error in &io_errors {
            assert!(error.is_io(), "{error:?}");
            assert!(!error.is_corruption(), "{error:?}");
        }

        let limit = PatchError::SizeLimit {
            new_size: 10,
            limit: 5,
        };
        assert!(!limit.is_corruption() && !limit.is_io());
    }

    #[test]
    fn test_truncated_message_reports_counts() {
        let message = PatchError::truncated(Segment::Control, 8, 3, None).to_string();
        assert_eq!(
            message,
            "corrupt patch or bz stream ended: control read (3/8)"
        );
    }

    #[test]
    fn test_overflow_message() {
        let error = PatchError::BlockOverflow {
            segment: Segment::Diff,
            written: 10,
            len: 20,
            new_size: 19,
        };
        let message = error.to_string();
        assert!(message.contains("diff block of 20"));
        assert!(message.contains("19"));
    }

    #[test]
    fn test_source_is_exposed() {
        use std::error::Error as _;

        let error = PatchError::truncated(
            Segment::Diff,
            14,
            0,
            Some(io::Error::new(io::ErrorKind::UnexpectedEof, "bz eof")),
        );
        assert!(error.source().is_some());
        assert!(PatchError::truncated(Segment::Diff, 14, 0, None)
            .source()
            .is_none());
    }
}
