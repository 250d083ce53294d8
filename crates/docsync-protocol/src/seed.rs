//! Seed frames: the Sync update a room starts from.
//!
//! When a room is created, the server has plaintext but no document
//! history. It synthesizes a single Update frame that the client-side
//! text library accepts as "insert this text into `shared-text`". The
//! byte layout is fixed; the client checks its structure, so every marker
//! below must be emitted exactly.
//!
//! ```text
//! 0 │ 2 │ body_len │ 1 1 │ C4 F8 E1 D5 │ 0A 00 │ 04 01 │ 0B "shared-text" │ len text │ 0A 00
//! ──┴───┴──────────┴─────┴─────────────┴───────┴───────┴──────────────────┴──────────┴──────
//! type step          ver   origin id     struct  content key                content     end
//! ```

use crate::ProtocolError;
use crate::frame::{MessageType, SyncStep, read_length_prefixed};
use crate::varint::{read_var_uint, var_uint_len, write_var_uint};

/// Format/version marker opening every seed body.
pub const VERSION_MARKER: [u8; 2] = [1, 1];

/// Synthetic origin id the seed update is attributed to. The client only
/// checks that it is present, so it stays a fixed constant.
pub const ORIGIN_ID: [u8; 4] = [196, 248, 225, 213];

/// Struct-table marker.
pub const STRUCT_MARKER: [u8; 2] = [10, 0];

/// Content-type marker (string content).
pub const CONTENT_TYPE_MARKER: [u8; 2] = [4, 1];

/// Name of the shared text field the seed content is written into.
pub const SHARED_TEXT_KEY: &[u8; 11] = b"shared-text";

/// Marker closing every seed body.
pub const END_MARKER: [u8; 2] = [10, 0];

/// Body bytes that do not depend on the text: every marker, the key and
/// its one-byte length.
pub const SEED_BODY_OVERHEAD: usize = VERSION_MARKER.len()
    + ORIGIN_ID.len()
    + STRUCT_MARKER.len()
    + CONTENT_TYPE_MARKER.len()
    + 1
    + SHARED_TEXT_KEY.len()
    + END_MARKER.len();

/// Encodes `text` as a seed Sync frame.
pub fn encode_seed(text: &str) -> Vec<u8> {
    let text_len = text.len() as u64;
    let body_len = seed_body_len(text);

    let mut buf = Vec::with_capacity(body_len + 2 * crate::MAX_VARINT_LEN);
    write_var_uint(&mut buf, MessageType::Sync.tag());
    write_var_uint(&mut buf, SyncStep::Update.tag());
    write_var_uint(&mut buf, body_len as u64);

    buf.extend_from_slice(&VERSION_MARKER);
    buf.extend_from_slice(&ORIGIN_ID);
    buf.extend_from_slice(&STRUCT_MARKER);
    buf.extend_from_slice(&CONTENT_TYPE_MARKER);
    buf.push(SHARED_TEXT_KEY.len() as u8);
    buf.extend_from_slice(SHARED_TEXT_KEY);
    write_var_uint(&mut buf, text_len);
    buf.extend_from_slice(text.as_bytes());
    buf.extend_from_slice(&END_MARKER);

    buf
}

/// Returns the body length [`encode_seed`] writes for `text`.
pub fn seed_body_len(text: &str) -> usize {
    SEED_BODY_OVERHEAD + var_uint_len(text.len() as u64) + text.len()
}

/// Decodes a seed frame back into its text, checking every marker.
///
/// Only frames produced by [`encode_seed`] (or byte-identical ones) are
/// accepted. Arbitrary client updates use the same outer framing but a
/// different body, and fail here with a marker error.
pub fn decode_seed(frame: &[u8]) -> Result<String, ProtocolError> {
    let (tag, n) = read_var_uint(frame)?;
    if tag != MessageType::Sync.tag() {
        return Err(ProtocolError::NotSeed("not a sync frame"));
    }
    let rest = &frame[n..];

    let (step, n) = read_var_uint(rest)?;
    if step != SyncStep::Update.tag() {
        return Err(ProtocolError::NotSeed("not a sync update"));
    }
    let rest = &rest[n..];

    let body = read_length_prefixed(rest, "seed body")?;
    let (_, len_bytes) = read_var_uint(rest)?;
    let trailing = rest.len() - len_bytes - body.len();
    if trailing != 0 {
        return Err(ProtocolError::TrailingBytes(trailing));
    }

    let mut reader = BodyReader { body };
    reader.expect("version", &VERSION_MARKER)?;
    reader.expect("origin id", &ORIGIN_ID)?;
    reader.expect("struct", &STRUCT_MARKER)?;
    reader.expect("content type", &CONTENT_TYPE_MARKER)?;
    reader.expect("key length", &[SHARED_TEXT_KEY.len() as u8])?;
    reader.expect("key", SHARED_TEXT_KEY)?;
    let text = reader.length_prefixed("seed text")?;
    reader.expect("end", &END_MARKER)?;
    if !reader.body.is_empty() {
        return Err(ProtocolError::TrailingBytes(reader.body.len()));
    }

    String::from_utf8(text.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

/// Cursor over a seed body.
struct BodyReader<'a> {
    body: &'a [u8],
}

impl<'a> BodyReader<'a> {
    fn expect(
        &mut self,
        marker: &'static str,
        expected: &[u8],
    ) -> Result<(), ProtocolError> {
        if self.body.len() < expected.len() {
            return Err(ProtocolError::Truncated {
                field: marker,
                needed: expected.len(),
                available: self.body.len(),
            });
        }
        let (actual, rest) = self.body.split_at(expected.len());
        if actual != expected {
            return Err(ProtocolError::BadMarker {
                marker,
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        self.body = rest;
        Ok(())
    }

    fn length_prefixed(
        &mut self,
        field: &'static str,
    ) -> Result<&'a [u8], ProtocolError> {
        let value = read_length_prefixed(self.body, field)?;
        let (_, n) = read_var_uint(self.body)?;
        self.body = &self.body[n + value.len()..];
        Ok(value)
    }
}
