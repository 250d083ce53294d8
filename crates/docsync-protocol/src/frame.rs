//! Frame classification and decoding.
//!
//! A frame is one binary WebSocket message. Its first varint is the
//! message type; everything after that is the body. The server only needs
//! the type to route a frame, so the hot path is [`classify`], which reads
//! a single varint. [`SyncFrame::decode`] does the full parse and exists
//! for inspection and tests.
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ varint type  │ body                                         │
//! ├──────────────┼──────────────────────────────────────────────┤
//! │ 0 Sync       │ varint step │ varint len │ update bytes       │
//! │ 1 Awareness  │ opaque                                       │
//! │ 2 Auth       │ opaque                                       │
//! │ 3 QueryAw.   │ opaque (usually empty)                       │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::ProtocolError;
use crate::varint::{read_var_uint, write_var_uint};

// ---------------------------------------------------------------------------
// MessageType
// ---------------------------------------------------------------------------

/// The outer message type of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Document state or an update to it.
    Sync,
    /// Presence and cursor metadata. Never parsed by the server.
    Awareness,
    /// Permission messages.
    Auth,
    /// A peer asking everyone to re-announce their awareness state.
    QueryAwareness,
}

impl MessageType {
    /// Returns the wire tag for this type.
    pub fn tag(self) -> u64 {
        match self {
            Self::Sync => 0,
            Self::Awareness => 1,
            Self::Auth => 2,
            Self::QueryAwareness => 3,
        }
    }
}

impl TryFrom<u64> for MessageType {
    type Error = ProtocolError;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Sync),
            1 => Ok(Self::Awareness),
            2 => Ok(Self::Auth),
            3 => Ok(Self::QueryAwareness),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync => write!(f, "sync"),
            Self::Awareness => write!(f, "awareness"),
            Self::Auth => write!(f, "auth"),
            Self::QueryAwareness => write!(f, "query-awareness"),
        }
    }
}

// ---------------------------------------------------------------------------
// SyncStep
// ---------------------------------------------------------------------------

/// The sub-type carried by a Sync frame, right after the message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    /// A peer announcing its state vector.
    Step1,
    /// The diff answering a Step1.
    Step2,
    /// An incremental (or, for seeded rooms, full) document update.
    Update,
}

impl SyncStep {
    /// Returns the wire value for this step.
    pub fn tag(self) -> u64 {
        match self {
            Self::Step1 => 0,
            Self::Step2 => 1,
            Self::Update => 2,
        }
    }

    /// Decodes the step from the front of a Sync frame's body.
    pub fn peek(body: &[u8]) -> Result<Self, ProtocolError> {
        let (tag, _) = read_var_uint(body)?;
        Self::try_from(tag)
    }
}

impl TryFrom<u64> for SyncStep {
    type Error = ProtocolError;

    fn try_from(tag: u64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(Self::Step1),
            1 => Ok(Self::Step2),
            2 => Ok(Self::Update),
            other => Err(ProtocolError::UnknownSyncStep(other)),
        }
    }
}

// ---------------------------------------------------------------------------
// FrameHeader / classify
// ---------------------------------------------------------------------------

/// What the router learns from a frame's leading varint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// The raw tag value, kept even when it is not a known type.
    pub tag: u64,
    /// The known message type, or `None` for tags outside 0..=3.
    pub message_type: Option<MessageType>,
    /// Offset of the first body byte within the frame.
    pub body_offset: usize,
}

impl FrameHeader {
    /// Returns `true` if this is a Sync frame.
    pub fn is_sync(&self) -> bool {
        self.message_type == Some(MessageType::Sync)
    }
}

/// Reads only the leading message-type varint of `frame`.
///
/// An unknown tag value is not an error here: the frame can still be
/// relayed. Failing to read the varint at all is, because then nothing
/// about the frame can be trusted.
pub fn classify(frame: &[u8]) -> Result<FrameHeader, ProtocolError> {
    let (tag, body_offset) = read_var_uint(frame)?;
    Ok(FrameHeader {
        tag,
        message_type: MessageType::try_from(tag).ok(),
        body_offset,
    })
}

// ---------------------------------------------------------------------------
// SyncFrame
// ---------------------------------------------------------------------------

/// A fully decoded frame, borrowing its payload from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFrame<'a> {
    /// A Sync message: its step and the length-delimited update bytes.
    Sync { step: SyncStep, payload: &'a [u8] },
    /// An awareness body, left opaque.
    Awareness(&'a [u8]),
    /// An auth body, left opaque.
    Auth(&'a [u8]),
    /// A query-awareness body, left opaque.
    QueryAwareness(&'a [u8]),
}

impl<'a> SyncFrame<'a> {
    /// Decodes a whole frame.
    ///
    /// # Errors
    /// Any varint failure, an unknown message type or sync step, or a
    /// Sync payload length that runs past the end of the frame.
    pub fn decode(frame: &'a [u8]) -> Result<Self, ProtocolError> {
        let header = classify(frame)?;
        let body = &frame[header.body_offset..];
        let message_type = MessageType::try_from(header.tag)?;

        Ok(match message_type {
            MessageType::Sync => {
                let (step_tag, n) = read_var_uint(body)?;
                let step = SyncStep::try_from(step_tag)?;
                let payload = read_length_prefixed(&body[n..], "sync payload")?;
                Self::Sync { step, payload }
            }
            MessageType::Awareness => Self::Awareness(body),
            MessageType::Auth => Self::Auth(body),
            MessageType::QueryAwareness => Self::QueryAwareness(body),
        })
    }

    /// Returns the message type of this frame.
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Sync { .. } => MessageType::Sync,
            Self::Awareness(_) => MessageType::Awareness,
            Self::Auth(_) => MessageType::Auth,
            Self::QueryAwareness(_) => MessageType::QueryAwareness,
        }
    }
}

/// Builds a Sync frame: `[0, step, len, payload...]`.
pub fn encode_sync(step: SyncStep, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(payload.len() + 12);
    write_var_uint(&mut buf, MessageType::Sync.tag());
    write_var_uint(&mut buf, step.tag());
    write_var_uint(&mut buf, payload.len() as u64);
    buf.extend_from_slice(payload);
    buf
}

/// Reads a varint length followed by that many bytes. Extra bytes after
/// the field are ignored.
pub(crate) fn read_length_prefixed<'a>(
    data: &'a [u8],
    field: &'static str,
) -> Result<&'a [u8], ProtocolError> {
    let (len, n) = read_var_uint(data)?;
    let rest = &data[n..];
    let needed = usize::try_from(len).unwrap_or(usize::MAX);
    if needed > rest.len() {
        return Err(ProtocolError::Truncated {
            field,
            needed,
            available: rest.len(),
        });
    }
    Ok(&rest[..needed])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_types() {
        for (tag, expected) in [
            (0u8, MessageType::Sync),
            (1, MessageType::Awareness),
            (2, MessageType::Auth),
            (3, MessageType::QueryAwareness),
        ] {
            let header = classify(&[tag, 9, 9]).unwrap();
            assert_eq!(header.message_type, Some(expected));
            assert_eq!(header.body_offset, 1);
        }
    }

    #[test]
    fn test_classify_unknown_tag_is_not_an_error() {
        let header = classify(&[0x80, 0x01]).unwrap();
        assert_eq!(header.tag, 128);
        assert_eq!(header.message_type, None);
        assert!(!header.is_sync());
    }

    #[test]
    fn test_classify_rejects_empty_and_truncated() {
        assert!(classify(&[]).is_err());
        assert!(classify(&[0xff]).is_err());
    }

    #[test]
    fn test_decode_sync_frame() {
        let frame = encode_sync(SyncStep::Update, b"abc");
        assert_eq!(frame, vec![0, 2, 3, b'a', b'b', b'c']);
        let decoded = SyncFrame::decode(&frame).unwrap();
        assert_eq!(
            decoded,
            SyncFrame::Sync {
                step: SyncStep::Update,
                payload: b"abc",
            }
        );
        assert_eq!(decoded.message_type(), MessageType::Sync);
    }

    #[test]
    fn test_decode_sync_with_short_payload_fails() {
        let err = SyncFrame::decode(&[0, 1, 5, 1, 2]).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                field: "sync payload",
                needed: 5,
                available: 2,
            }
        );
    }

    #[test]
    fn test_decode_sync_with_unknown_step_fails() {
        assert_eq!(
            SyncFrame::decode(&[0, 7, 0]),
            Err(ProtocolError::UnknownSyncStep(7))
        );
    }

    #[test]
    fn test_decode_opaque_bodies() {
        assert_eq!(
            SyncFrame::decode(&[1, 4, 5]).unwrap(),
            SyncFrame::Awareness(&[4, 5])
        );
        assert_eq!(
            SyncFrame::decode(&[2, 0]).unwrap(),
            SyncFrame::Auth(&[0])
        );
        assert_eq!(
            SyncFrame::decode(&[3]).unwrap(),
            SyncFrame::QueryAwareness(&[])
        );
    }

    #[test]
    fn test_decode_unknown_type_fails() {
        assert_eq!(
            SyncFrame::decode(&[9]),
            Err(ProtocolError::UnknownMessageType(9))
        );
    }

    #[test]
    fn test_sync_step_peek() {
        assert_eq!(SyncStep::peek(&[1, 0]), Ok(SyncStep::Step2));
        assert!(SyncStep::peek(&[]).is_err());
    }
}
