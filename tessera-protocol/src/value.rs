//! Domain values carried inside requests.
//!
//! Records are maps of typed fields. A field is a plain JSON scalar, a nested
//! JSON structure, a [`Pointer`] to a record in another keyspace, or a
//! [`Timestamp`]. The query builder resolves pointers and timestamps into their
//! wire forms before anything is serialized.

use crate::error::ConstructionError;
use crate::hash;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Member name under which a raw JSON document may carry its schema tag.
pub const SCHEMA_FIELD: &str = "$schema";

/// A record key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// An engine key, sent as given.
    Engine(String),
    /// A human-chosen key, hashed into the engine key space.
    Custom(String),
}

impl Key {
    pub fn engine(key: impl Into<String>) -> Self {
        Key::Engine(key.into())
    }

    pub fn custom(key: impl Into<String>) -> Self {
        Key::Custom(key.into())
    }

    /// Returns the key as it goes on the wire.
    pub fn resolve(&self) -> Result<String, ConstructionError> {
        match self {
            Key::Engine(k) if k.is_empty() => Err(ConstructionError::MissingKey("empty engine key")),
            Key::Custom(k) if k.is_empty() => Err(ConstructionError::MissingKey("empty custom key")),
            Key::Engine(k) => Ok(k.clone()),
            Key::Custom(k) => Ok(hash::hash(k)),
        }
    }
}

impl From<u64> for Key {
    fn from(key: u64) -> Self {
        Key::Engine(key.to_string())
    }
}

/// Reference to a record in some keyspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pointer {
    pub keyspace: String,
    pub key: Option<String>,
    pub custom_key: Option<String>,
}

impl Pointer {
    /// Points at an engine key.
    pub fn new(keyspace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            key: Some(key.into()),
            custom_key: None,
        }
    }

    /// Points at a record addressed by its custom key.
    pub fn custom(keyspace: impl Into<String>, custom_key: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            key: None,
            custom_key: Some(custom_key.into()),
        }
    }

    /// Returns the engine key this pointer resolves to.
    ///
    /// An explicit key wins over a custom key.
    pub fn resolve_key(&self) -> Result<String, ConstructionError> {
        if let Some(key) = self.key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        if let Some(custom) = self.custom_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(hash::hash(custom));
        }
        Err(ConstructionError::InvalidPointer {
            keyspace: self.keyspace.clone(),
        })
    }

    /// Resolves to the wire pair `[keyspace, key]`.
    pub fn to_wire(&self) -> Result<Value, ConstructionError> {
        let key = self.resolve_key()?;
        Ok(json!([self.keyspace, key]))
    }
}

/// Client-local instant, carried as an opaque string tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// The current instant, as RFC 3339 UTC with millisecond precision.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    /// Wraps an existing tag.
    pub fn tag(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Time window used in search criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampRange {
    After(Timestamp),
    Before(Timestamp),
    Between(Timestamp, Timestamp),
}

impl TimestampRange {
    pub fn to_wire(&self) -> Value {
        match self {
            TimestampRange::After(t) => json!({ "after": t.as_str() }),
            TimestampRange::Before(t) => json!({ "before": t.as_str() }),
            TimestampRange::Between(from, to) => json!({ "between": [from.as_str(), to.as_str()] }),
        }
    }
}

/// A single field of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    Pointer(Pointer),
    Timestamp(Timestamp),
    Nested(Value),
}

impl FieldValue {
    /// Resolves the field into plain JSON.
    pub fn resolve(&self) -> Result<Value, ConstructionError> {
        match self {
            FieldValue::Scalar(v) | FieldValue::Nested(v) => Ok(v.clone()),
            FieldValue::Pointer(p) => p.to_wire(),
            FieldValue::Timestamp(t) => Ok(Value::String(t.as_str().to_string())),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(_) | Value::Object(_) => FieldValue::Nested(value),
            scalar => FieldValue::Scalar(scalar),
        }
    }
}

impl From<Pointer> for FieldValue {
    fn from(pointer: Pointer) -> Self {
        FieldValue::Pointer(pointer)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(timestamp: Timestamp) -> Self {
        FieldValue::Timestamp(timestamp)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Scalar(Value::String(s.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Scalar(Value::String(s))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Scalar(Value::Bool(b))
    }
}

impl From<u64> for FieldValue {
    fn from(n: u64) -> Self {
        FieldValue::Scalar(json!(n))
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Scalar(json!(n))
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Scalar(json!(n))
    }
}

/// A record: typed fields plus an optional schema tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    schema: Option<String>,
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    /// Typed record; pointers and timestamps are resolved.
    Record(Record),
    /// Arbitrary JSON sent as is. An object may carry its schema tag under
    /// [`SCHEMA_FIELD`].
    Raw(Value),
}

impl Document {
    /// Splits the document into its schema tag and resolved JSON payload.
    pub fn resolve(&self) -> Result<(Option<String>, Value), ConstructionError> {
        match self {
            Document::Record(record) => {
                let mut map = serde_json::Map::new();
                for (name, field) in record.fields() {
                    map.insert(name.clone(), field.resolve()?);
                }
                Ok((record.schema.clone(), Value::Object(map)))
            }
            Document::Raw(Value::Object(map)) => {
                let mut map = map.clone();
                let schema = match map.remove(SCHEMA_FIELD) {
                    Some(Value::String(tag)) => Some(tag),
                    Some(other) => {
                        map.insert(SCHEMA_FIELD.to_string(), other);
                        None
                    }
                    None => None,
                };
                Ok((schema, Value::Object(map)))
            }
            Document::Raw(other) => Ok((None, other.clone())),
        }
    }
}

impl From<Record> for Document {
    fn from(record: Record) -> Self {
        Document::Record(record)
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::Raw(value)
    }
}

/// One condition in a search.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Field(FieldValue),
    Range(TimestampRange),
}

/// Search criteria: field name to expected value or time window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    criteria: BTreeMap<String, Criterion>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.criteria
            .insert(name.into(), Criterion::Field(value.into()));
        self
    }

    pub fn with_range(mut self, name: impl Into<String>, range: TimestampRange) -> Self {
        self.criteria.insert(name.into(), Criterion::Range(range));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Criterion)> {
        self.criteria.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_key_resolve() {
        assert_eq!(Key::engine("42").resolve().unwrap(), "42");
        assert_eq!(Key::from(7u64).resolve().unwrap(), "7");
        assert_eq!(Key::custom("hello").resolve().unwrap(), "613153351");
        assert!(matches!(
            Key::custom("").resolve(),
            Err(ConstructionError::MissingKey(_))
        ));
    }

    #[test]
    fn test_pointer_resolution() {
        let p = Pointer::new("users", "17");
        assert_eq!(p.to_wire().unwrap(), json!(["users", "17"]));

        let p = Pointer::custom("users", "hello");
        assert_eq!(p.to_wire().unwrap(), json!(["users", "613153351"]));

        let p = Pointer {
            keyspace: "users".to_string(),
            key: Some("5".to_string()),
            custom_key: Some("hello".to_string()),
        };
        assert_eq!(p.resolve_key().unwrap(), "5");
    }

    #[test]
    fn test_pointer_unresolvable() {
        let p = Pointer {
            keyspace: "users".to_string(),
            key: None,
            custom_key: Some(String::new()),
        };
        assert_eq!(
            p.to_wire().unwrap_err(),
            ConstructionError::InvalidPointer {
                keyspace: "users".to_string()
            }
        );
    }

    #[test]
    fn test_timestamp_tag() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(Timestamp::from(instant).as_str(), "2024-03-01T12:30:00.000Z");
        assert_eq!(Timestamp::tag("t-1").as_str(), "t-1");
        assert!(Timestamp::now().as_str().ends_with('Z'));
    }

    #[test]
    fn test_timestamp_range_wire() {
        let a = Timestamp::tag("a");
        let b = Timestamp::tag("b");
        assert_eq!(TimestampRange::After(a.clone()).to_wire(), json!({"after": "a"}));
        assert_eq!(TimestampRange::Before(b.clone()).to_wire(), json!({"before": "b"}));
        assert_eq!(
            TimestampRange::Between(a, b).to_wire(),
            json!({"between": ["a", "b"]})
        );
    }

    #[test]
    fn test_field_value_from_json() {
        assert!(matches!(FieldValue::from(json!(1)), FieldValue::Scalar(_)));
        assert!(matches!(FieldValue::from(json!([1, 2])), FieldValue::Nested(_)));
        assert!(matches!(FieldValue::from(json!({"a": 1})), FieldValue::Nested(_)));
    }

    #[test]
    fn test_record_document_resolve() {
        let record = Record::new()
            .with_schema("user.v1")
            .with_field("name", "alice")
            .with_field("manager", Pointer::new("users", "3"))
            .with_field("joined", Timestamp::tag("2024-01-01T00:00:00.000Z"))
            .with_field("tags", json!(["a", "b"]));

        let (schema, payload) = Document::from(record).resolve().unwrap();
        assert_eq!(schema.as_deref(), Some("user.v1"));
        assert_eq!(
            payload,
            json!({
                "name": "alice",
                "manager": ["users", "3"],
                "joined": "2024-01-01T00:00:00.000Z",
                "tags": ["a", "b"],
            })
        );
    }

    #[test]
    fn test_raw_document_schema_stripped() {
        let doc = Document::from(json!({"$schema": "order.v2", "total": 10}));
        let (schema, payload) = doc.resolve().unwrap();
        assert_eq!(schema.as_deref(), Some("order.v2"));
        assert_eq!(payload, json!({"total": 10}));

        let (schema, payload) = Document::from(json!(5)).resolve().unwrap();
        assert!(schema.is_none());
        assert_eq!(payload, json!(5));
    }
}
