//! Query builder.
//!
//! Turns a [`RequestContext`] and [`CommandOptions`] into the wire text of one
//! envelope. All validation happens here, before any connection is opened.
//!
//! Serialization is two-level: embedded documents (`value`, each bulk entry,
//! `search_criteria`) are encoded to JSON text first, then the envelope that
//! carries those strings is encoded again. The engine depends on this shape.

use crate::codec;
use crate::error::ConstructionError;
use crate::hash::canonical_key;
use crate::message::{AdminEnvelope, Credentials, Envelope, LimitOutput, Target};
use crate::value::{Criterion, Document, FieldValue, Key, SearchCriteria};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Reserved search-criteria member holding pointer conditions.
pub const POINTERS_FIELD: &str = "pointers";

/// Returns whether a command opens a push subscription.
pub fn is_subscription(command: &str) -> bool {
    command.contains("subscribe")
}

/// Immutable identity of one call: who, where and what.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub credentials: Credentials,
    pub target: Target,
    pub command: String,
}

impl RequestContext {
    pub fn new(credentials: Credentials, target: Target, command: impl Into<String>) -> Self {
        Self {
            credentials,
            target,
            command: command.into(),
        }
    }

    pub fn is_subscription(&self) -> bool {
        is_subscription(&self.command)
    }
}

/// Which records a bulk retrieval reads. Exactly one source applies.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkSelection {
    Keys(Vec<Key>),
    Volumes(Vec<String>),
    LatestVolume,
}

/// Per-call options. Every field has an explicit default; empty collections
/// are left out of the envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOptions {
    pub key: Option<Key>,
    pub value: Option<Document>,
    pub bulk_values: Vec<Document>,
    pub bulk_keys_values: BTreeMap<String, Document>,
    pub search_criteria: Option<SearchCriteria>,
    pub bulk: Option<BulkSelection>,
    pub limit: LimitOutput,
    pub with_pointers: bool,
    pub pointers_metadata: bool,
    pub key_included: bool,
    /// Expiry in seconds; 0 disables expiry.
    pub expire: u64,
}

impl CommandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_value(mut self, value: impl Into<Document>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_bulk_values<I, D>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Document>,
    {
        self.bulk_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_bulk_entry(mut self, key: impl Into<String>, value: impl Into<Document>) -> Self {
        self.bulk_keys_values.insert(key.into(), value.into());
        self
    }

    pub fn with_search(mut self, criteria: SearchCriteria) -> Self {
        self.search_criteria = Some(criteria);
        self
    }

    pub fn with_bulk(mut self, selection: BulkSelection) -> Self {
        self.bulk = Some(selection);
        self
    }

    pub fn with_limit(mut self, limit: LimitOutput) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_pointers(mut self, enabled: bool) -> Self {
        self.with_pointers = enabled;
        self
    }

    pub fn with_pointers_metadata(mut self, enabled: bool) -> Self {
        self.pointers_metadata = enabled;
        self
    }

    pub fn with_key_included(mut self, enabled: bool) -> Self {
        self.key_included = enabled;
        self
    }

    pub fn with_expire(mut self, seconds: u64) -> Self {
        self.expire = seconds;
        self
    }
}

/// Builds the wire text of a keyspace command.
pub fn build(context: &RequestContext, options: &CommandOptions) -> Result<String, ConstructionError> {
    let envelope = build_envelope(context, options)?;
    encode_envelope(&envelope)
}

/// Builds the envelope of a keyspace command without encoding it.
pub fn build_envelope(
    context: &RequestContext,
    options: &CommandOptions,
) -> Result<Envelope, ConstructionError> {
    if context.command.trim().is_empty() {
        return Err(ConstructionError::MissingCommand);
    }
    if options.with_pointers && options.pointers_metadata {
        return Err(ConstructionError::ConflictingFlags);
    }

    let mut envelope = Envelope::new(
        context.credentials.clone(),
        context.target.clone(),
        context.command.clone(),
    );
    let mut schema = SchemaSlot::default();

    if let Some(key) = &options.key {
        envelope.key = Some(key.resolve()?);
    }

    if let Some(document) = &options.value {
        let (tag, payload) = document.resolve()?;
        schema.merge(tag)?;
        envelope.value = Some(encode_embedded(&payload, "value")?);
    }

    if !options.bulk_values.is_empty() {
        let mut encoded = Vec::with_capacity(options.bulk_values.len());
        for document in &options.bulk_values {
            let (tag, payload) = document.resolve()?;
            schema.merge(tag)?;
            encoded.push(encode_embedded(&payload, "bulk value")?);
        }
        envelope.bulk_values = Some(encoded);
    }

    if !options.bulk_keys_values.is_empty() {
        let mut encoded = BTreeMap::new();
        for (key, document) in &options.bulk_keys_values {
            if key.is_empty() {
                return Err(ConstructionError::MissingKey("empty key in bulk key/value map"));
            }
            let (tag, payload) = document.resolve()?;
            schema.merge(tag)?;
            encoded.insert(canonical_key(key), encode_embedded(&payload, "bulk entry")?);
        }
        envelope.bulk_keys_values = Some(encoded);
    }

    if let Some(criteria) = &options.search_criteria {
        let resolved = resolve_criteria(criteria)?;
        envelope.search_criteria = Some(encode_embedded(&resolved, "search criteria")?);
    }

    match &options.bulk {
        Some(BulkSelection::Keys(keys)) => {
            if keys.is_empty() {
                return Err(ConstructionError::EmptyBulkSelection("bulk keys"));
            }
            envelope.bulk_keys = Some(keys.iter().map(Key::resolve).collect::<Result<_, _>>()?);
        }
        Some(BulkSelection::Volumes(volumes)) => {
            if volumes.is_empty() {
                return Err(ConstructionError::EmptyBulkSelection("volumes"));
            }
            envelope.volumes = Some(volumes.clone());
        }
        Some(BulkSelection::LatestVolume) => envelope.latest_volume = true,
        None => {}
    }

    envelope.schema = schema.into_inner();
    envelope.limit_output = options.limit;
    envelope.with_pointers = options.with_pointers;
    envelope.pointers_metadata = options.pointers_metadata;
    envelope.key_included = options.key_included;
    envelope.expire = options.expire;

    tracing::trace!(
        command = %envelope.command,
        keyspace = %envelope.target.keyspace,
        "built envelope"
    );
    Ok(envelope)
}

/// Encodes a finished envelope.
pub fn encode_envelope(envelope: &Envelope) -> Result<String, ConstructionError> {
    codec::encode_serializable(envelope).map_err(|e| ConstructionError::Encode {
        what: "envelope",
        reason: e.to_string(),
    })
}

/// Builds the wire text of an administrative command.
pub fn build_admin<I, T>(tokens: I, credentials: &Credentials) -> Result<String, ConstructionError>
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let raw: Vec<String> = tokens.into_iter().map(Into::into).collect();
    if raw.first().map_or(true, |t| t.trim().is_empty()) {
        return Err(ConstructionError::MissingCommand);
    }
    let envelope = AdminEnvelope::new(raw, credentials);
    codec::encode_serializable(&envelope).map_err(|e| ConstructionError::Encode {
        what: "admin envelope",
        reason: e.to_string(),
    })
}

/// Resolves search criteria into the JSON object the engine matches against.
///
/// Pointer conditions are gathered under [`POINTERS_FIELD`], keyed by field
/// name; everything else stays at the top level.
fn resolve_criteria(criteria: &SearchCriteria) -> Result<Value, ConstructionError> {
    let mut resolved = Map::new();
    let mut pointers = Map::new();

    for (name, criterion) in criteria.iter() {
        match criterion {
            Criterion::Field(FieldValue::Pointer(pointer)) => {
                pointers.insert(name.clone(), pointer.to_wire()?);
            }
            Criterion::Field(field) => {
                resolved.insert(name.clone(), field.resolve()?);
            }
            Criterion::Range(range) => {
                resolved.insert(name.clone(), range.to_wire());
            }
        }
    }

    if !pointers.is_empty() {
        resolved.insert(POINTERS_FIELD.to_string(), Value::Object(pointers));
    }
    Ok(Value::Object(resolved))
}

fn encode_embedded(value: &Value, what: &'static str) -> Result<String, ConstructionError> {
    codec::encode(value).map_err(|e| ConstructionError::Encode {
        what,
        reason: e.to_string(),
    })
}

/// The single schema tag shared by every document of a request.
#[derive(Default)]
struct SchemaSlot(Option<String>);

impl SchemaSlot {
    fn merge(&mut self, tag: Option<String>) -> Result<(), ConstructionError> {
        match (&self.0, tag) {
            (_, None) => Ok(()),
            (None, Some(tag)) => {
                self.0 = Some(tag);
                Ok(())
            }
            (Some(current), Some(tag)) if *current == tag => Ok(()),
            (Some(current), Some(tag)) => Err(ConstructionError::SchemaMismatch {
                expected: current.clone(),
                found: tag,
            }),
        }
    }

    fn into_inner(self) -> Option<String> {
        self.0
    }
}
