//! Envelope types.
//!
//! One envelope is one wire frame. Credentials and target are grouped in Rust
//! but flattened on the wire, so the engine sees a single flat object.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Account the request runs as.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Store and keyspace a request addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub store: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub keyspace: String,
    /// Keyspace survives engine restarts (otherwise in-memory only).
    pub persistent: bool,
    /// Keyspace is spread across engine nodes.
    pub distributed: bool,
}

impl Target {
    /// Local, in-memory keyspace.
    pub fn new(store: impl Into<String>, keyspace: impl Into<String>) -> Self {
        Self {
            store: store.into(),
            namespace: None,
            keyspace: keyspace.into(),
            persistent: false,
            distributed: false,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = persistent;
        self
    }

    pub fn distributed(mut self, distributed: bool) -> Self {
        self.distributed = distributed;
        self
    }
}

/// Output window of a listing command. `stop == -1` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOutput {
    pub start: i64,
    pub stop: i64,
}

impl LimitOutput {
    pub fn all() -> Self {
        Self { start: 0, stop: -1 }
    }

    pub fn range(start: i64, stop: i64) -> Self {
        Self { start, stop }
    }
}

impl Default for LimitOutput {
    fn default() -> Self {
        Self::all()
    }
}

/// Request envelope for keyspace commands.
///
/// `value`, `bulk_values`, `bulk_keys_values` and `search_criteria` hold wire
/// text, not structured JSON: the engine stores and matches each embedded
/// document as its own JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(flatten)]
    pub credentials: Credentials,

    #[serde(flatten)]
    pub target: Target,

    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_values: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_keys: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_keys_values: Option<BTreeMap<String, String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_criteria: Option<String>,

    pub limit_output: LimitOutput,

    pub with_pointers: bool,

    pub pointers_metadata: bool,

    pub key_included: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Expiry in seconds; 0 keeps the record indefinitely.
    pub expire: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volumes: Option<Vec<String>>,

    pub latest_volume: bool,
}

impl Envelope {
    /// Creates an envelope with every optional part empty.
    pub fn new(credentials: Credentials, target: Target, command: impl Into<String>) -> Self {
        Self {
            credentials,
            target,
            command: command.into(),
            key: None,
            value: None,
            bulk_values: None,
            bulk_keys: None,
            bulk_keys_values: None,
            search_criteria: None,
            limit_output: LimitOutput::default(),
            with_pointers: false,
            pointers_metadata: false,
            key_included: false,
            schema: None,
            expire: 0,
            volumes: None,
            latest_volume: false,
        }
    }
}

/// Envelope for store, owner and permission administration.
///
/// The command is a flat positional token list, e.g.
/// `["create_store", "inventory"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminEnvelope {
    pub raw: Vec<String>,
    /// `[username, password]`.
    pub credentials: [String; 2],
}

impl AdminEnvelope {
    pub fn new(raw: Vec<String>, credentials: &Credentials) -> Self {
        Self {
            raw,
            credentials: [credentials.username.clone(), credentials.password.clone()],
        }
    }

    /// The command token, if any.
    pub fn command(&self) -> Option<&str> {
        self.raw.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_is_flat() {
        let env = Envelope::new(
            Credentials::new("admin", "secret"),
            Target::new("main", "users").persistent(true),
            "get",
        );
        let value = serde_json::to_value(&env).unwrap();

        assert_eq!(value["username"], "admin");
        assert_eq!(value["password"], "secret");
        assert_eq!(value["store"], "main");
        assert_eq!(value["keyspace"], "users");
        assert_eq!(value["persistent"], true);
        assert_eq!(value["distributed"], false);
        assert_eq!(value["command"], "get");
        assert_eq!(value["limit_output"], json!({"start": 0, "stop": -1}));
        assert_eq!(value["expire"], 0);
        assert!(value.get("credentials").is_none());
        assert!(value.get("target").is_none());
        assert!(value.get("namespace").is_none());
        assert!(value.get("key").is_none());
        assert!(value.get("schema").is_none());
        assert!(value.get("volumes").is_none());
    }

    #[test]
    fn test_target_namespace_serialized_when_set() {
        let env = Envelope::new(
            Credentials::default(),
            Target::new("main", "users").with_namespace("tenant-a"),
            "get",
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["namespace"], "tenant-a");
    }

    #[test]
    fn test_admin_envelope_serialization() {
        let env = AdminEnvelope::new(
            vec!["create_store".to_string(), "inventory".to_string()],
            &Credentials::new("root", "pw"),
        );
        assert_eq!(env.command(), Some("create_store"));
        let json = serde_json::to_string(&env).unwrap();
        assert_eq!(
            json,
            r#"{"raw":["create_store","inventory"],"credentials":["root","pw"]}"#
        );
    }

    #[test]
    fn test_limit_output_default() {
        assert_eq!(LimitOutput::default(), LimitOutput::range(0, -1));
    }
}
