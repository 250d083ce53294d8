//! Error types for the protocol layer.
//!
//! Each crate in docsync defines its own error enum. When you see a
//! `ProtocolError`, the problem is in the bytes of a frame, not in
//! networking or room management.

/// Errors that can occur while decoding sync frames.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The buffer ended before a varint's terminating byte.
    #[error("varint truncated after {0} bytes")]
    TruncatedVarint(usize),

    /// The varint does not fit in 64 bits (more than 10 bytes, or a
    /// 10th byte carrying more than one bit).
    #[error("varint overflows 64 bits")]
    VarintOverflow,

    /// A length-prefixed field claims more bytes than the buffer holds.
    #[error("{field} needs {needed} bytes but only {available} remain")]
    Truncated {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// The leading tag is a valid varint but not a known message type.
    #[error("unknown message type {0}")]
    UnknownMessageType(u64),

    /// The sync sub-type is a valid varint but not a known sync step.
    #[error("unknown sync step {0}")]
    UnknownSyncStep(u64),

    /// A fixed marker in a seed frame did not have its expected value.
    #[error("bad {marker} marker: expected {expected:?}, got {actual:?}")]
    BadMarker {
        marker: &'static str,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },

    /// The frame is well formed but is not a seed update.
    #[error("not a seed frame: {0}")]
    NotSeed(&'static str),

    /// Bytes were left over after a complete seed body.
    #[error("{0} trailing bytes after seed body")]
    TrailingBytes(usize),

    /// The seed text is not valid UTF-8.
    #[error("seed text is not valid UTF-8")]
    InvalidUtf8,
}
