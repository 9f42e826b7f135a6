//! Outcomes of a send.
//!
//! Transport trouble is an ordinary result here: a refused connection, a
//! timeout or a garbled reply all come back as [`Reply::Failure`], so a
//! long-lived subscriber never has to unwind per delivery.

use crate::subscription::SubscriptionHandle;
use serde_json::Value;
use thiserror::Error;

/// Post-connect failure, described in a short human-readable form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("request timed out")]
    Timeout,

    #[error("TLS handshake timed out")]
    TlsHandshakeTimeout,

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    #[error("incomplete or invalid response")]
    IncompleteResponse,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

impl Failure {
    /// Returns whether the failure came from a deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Failure::Timeout | Failure::TlsHandshakeTimeout)
    }
}

/// One decoded message, or why there is none.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Message(Value),
    Failure(Failure),
}

impl Reply {
    pub fn is_message(&self) -> bool {
        matches!(self, Reply::Message(_))
    }

    /// Returns the decoded payload, if any.
    pub fn message(&self) -> Option<&Value> {
        match self {
            Reply::Message(v) => Some(v),
            Reply::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Reply::Message(_) => None,
            Reply::Failure(f) => Some(f),
        }
    }

    /// Converts into a `Result` for callers that prefer `?`.
    pub fn into_result(self) -> Result<Value, Failure> {
        match self {
            Reply::Message(v) => Ok(v),
            Reply::Failure(f) => Err(f),
        }
    }
}

impl From<Failure> for Reply {
    fn from(failure: Failure) -> Self {
        Reply::Failure(failure)
    }
}

/// What a send produced: a single reply, or a running subscription.
#[derive(Debug)]
pub enum Delivery {
    Reply(Reply),
    Subscription(SubscriptionHandle),
}

impl Delivery {
    pub fn into_reply(self) -> Option<Reply> {
        match self {
            Delivery::Reply(r) => Some(r),
            Delivery::Subscription(_) => None,
        }
    }

    pub fn into_subscription(self) -> Option<SubscriptionHandle> {
        match self {
            Delivery::Reply(_) => None,
            Delivery::Subscription(h) => Some(h),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_display() {
        assert_eq!(Failure::Timeout.to_string(), "request timed out");
        assert_eq!(
            Failure::IncompleteResponse.to_string(),
            "incomplete or invalid response"
        );
        assert!(Failure::Connect("refused".to_string())
            .to_string()
            .contains("refused"));
        assert!(Failure::TlsHandshakeTimeout.is_timeout());
        assert!(!Failure::Io("reset".to_string()).is_timeout());
    }

    #[test]
    fn test_reply_accessors() {
        let reply = Reply::Message(json!({"a": 1}));
        assert!(reply.is_message());
        assert_eq!(reply.message(), Some(&json!({"a": 1})));
        assert!(reply.failure().is_none());
        assert_eq!(reply.into_result().unwrap(), json!({"a": 1}));

        let reply = Reply::from(Failure::Timeout);
        assert!(!reply.is_message());
        assert_eq!(reply.failure(), Some(&Failure::Timeout));
        assert_eq!(reply.into_result().unwrap_err(), Failure::Timeout);
    }
}
