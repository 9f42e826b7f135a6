//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing or encoding wire text.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire text that could not be turned back into a value.
///
/// `Incomplete` means the text ended early and more bytes may complete it.
/// `Malformed` means no amount of additional input will help.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("incomplete wire text (line {line}, column {column})")]
    Incomplete { line: usize, column: usize },

    #[error("malformed wire text: {0}")]
    Malformed(String),

    #[error("invalid UTF-8 in wire text")]
    InvalidUtf8,
}

impl DecodeError {
    /// Returns whether feeding more bytes could make the text decodable.
    pub fn is_incomplete(&self) -> bool {
        matches!(self, DecodeError::Incomplete { .. })
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_eof() {
            DecodeError::Incomplete {
                line: e.line(),
                column: e.column(),
            }
        } else {
            DecodeError::Malformed(e.to_string())
        }
    }
}

/// Request construction failures. These are raised before any network
/// activity and are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("invalid pointer into keyspace '{keyspace}': neither key nor custom key is set")]
    InvalidPointer { keyspace: String },

    #[error("missing key: {0}")]
    MissingKey(&'static str),

    #[error("schema mismatch: values are tagged both '{expected}' and '{found}'")]
    SchemaMismatch { expected: String, found: String },

    #[error("conflicting flags: with_pointers and pointers_metadata are mutually exclusive")]
    ConflictingFlags,

    #[error("empty bulk selection: no {0} given")]
    EmptyBulkSelection(&'static str),

    #[error("missing command")]
    MissingCommand,

    #[error("cannot encode {what}: {reason}")]
    Encode { what: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_from_json_eof() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\":").unwrap_err();
        let decode: DecodeError = err.into();
        assert!(decode.is_incomplete());
    }

    #[test]
    fn test_decode_error_from_json_syntax() {
        let err = serde_json::from_str::<serde_json::Value>("{\"a\" 1}").unwrap_err();
        let decode: DecodeError = err.into();
        assert!(matches!(decode, DecodeError::Malformed(_)));
        assert!(!decode.is_incomplete());
    }

    #[test]
    fn test_construction_error_display() {
        let err = ConstructionError::InvalidPointer {
            keyspace: "users".to_string(),
        };
        assert!(err.to_string().contains("users"));

        let err = ConstructionError::SchemaMismatch {
            expected: "user.v1".to_string(),
            found: "user.v2".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("user.v1") && msg.contains("user.v2"));

        let err = ConstructionError::EmptyBulkSelection("volumes");
        assert!(err.to_string().contains("volumes"));

        assert!(ConstructionError::ConflictingFlags
            .to_string()
            .contains("mutually exclusive"));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::Decode(DecodeError::InvalidUtf8);
        assert!(err.to_string().contains("UTF-8"));
    }
}
