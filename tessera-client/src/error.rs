//! Client error types.

use crate::config::ConfigError;
use tessera_protocol::ConstructionError;
use thiserror::Error;

/// Errors raised before a request reaches the network.
///
/// Anything that goes wrong after a connection attempt starts is reported as
/// a [`Failure`](crate::reply::Failure) value instead.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid request: {0}")]
    Construction(#[from] ConstructionError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClientError::from(ConstructionError::ConflictingFlags);
        assert!(err.to_string().starts_with("invalid request:"));

        let err = ClientError::TlsConfig("no private key found".to_string());
        assert_eq!(
            err.to_string(),
            "TLS configuration error: no private key found"
        );

        let err = ClientError::from(ConfigError::ValidationError("port is 0".to_string()));
        assert!(err.to_string().contains("port is 0"));
    }
}
