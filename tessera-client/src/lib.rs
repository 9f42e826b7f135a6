//! # tessera-client
//!
//! Client library for the tessera store engine.
//!
//! This crate provides:
//! - TCP and TLS transport with connect, handshake and idle deadlines
//! - One-shot request/response exchanges resolved on the first decodable line
//! - Push-style subscriptions delivered to a callback until stopped
//! - YAML and environment configuration
//!
//! Failures after a connection attempt starts are values ([`Reply::Failure`]),
//! not errors, so subscribers never unwind per message.

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod reply;
pub mod stream;
pub mod subscription;
pub mod tls;

pub use client::Client;
pub use config::{ClientConfig, ConfigError, ConnectionSettings};
pub use connection::{Transport, TransportConfig};
pub use error::ClientError;
pub use reply::{Delivery, Failure, Reply};
pub use subscription::{MessageCallback, SubscriptionHandle};
pub use tls::TlsClientConfig;
