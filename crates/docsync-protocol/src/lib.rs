//! Wire protocol for docsync.
//!
//! This crate defines the bytes that clients and the server exchange:
//!
//! - **Varints** ([`write_var_uint`], [`read_var_uint`]) — unsigned
//!   LEB128, used for every integer on the wire.
//! - **Frames** ([`classify`], [`SyncFrame`], [`MessageType`]) — the
//!   leading message-type tag and the typed view of a whole frame.
//! - **Seed frames** ([`encode_seed`], [`decode_seed`]) — the Sync update
//!   synthesized from plaintext when a room is first created.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and rooms
//! (fan-out). It doesn't know about connections or rooms; it only knows
//! how to read and write frames.
//!
//! ```text
//! Transport (bytes) → Protocol (FrameHeader) → Room (broadcast)
//! ```

mod error;
mod frame;
mod seed;
mod varint;

pub use error::ProtocolError;
pub use frame::{
    FrameHeader, MessageType, SyncFrame, SyncStep, classify, encode_sync,
};
pub use seed::{
    CONTENT_TYPE_MARKER, END_MARKER, ORIGIN_ID, SEED_BODY_OVERHEAD,
    SHARED_TEXT_KEY, STRUCT_MARKER, VERSION_MARKER, decode_seed,
    encode_seed, seed_body_len,
};
pub use varint::{MAX_VARINT_LEN, read_var_uint, var_uint_len, write_var_uint};
