//! # tessera-protocol
//!
//! Wire protocol implementation for the tessera store engine.
//!
//! This crate provides:
//! - A JSON value codec that keeps unsigned 64-bit integers exact and unwraps
//!   JSON text embedded inside reply strings
//! - The custom key hasher that maps human-chosen keys onto engine keys
//! - Envelope types and the query builder that produces request frames
//! - Newline-delimited framing

pub mod codec;
pub mod error;
pub mod frame;
pub mod hash;
pub mod message;
pub mod query;
pub mod value;

pub use codec::{decode, decode_bytes, encode, encode_serializable};
pub use error::{ConstructionError, DecodeError, ProtocolError};
pub use frame::{encode_frame, LineDecoder};
pub use hash::{canonical_key, hash};
pub use message::{AdminEnvelope, Credentials, Envelope, LimitOutput, Target};
pub use query::{build, build_admin, BulkSelection, CommandOptions, RequestContext};
pub use value::{
    Criterion, Document, FieldValue, Key, Pointer, Record, SearchCriteria, Timestamp,
    TimestampRange,
};

/// Default port of a tessera engine.
pub const DEFAULT_PORT: u16 = 6040;

/// Frame delimiter. Newline is the only delimiter; there is no length prefix.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Maximum size of a single frame (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
