//! Stored documents and their identifiers.
//!
//! A [`Document`] is one instance of a resource: a server-assigned
//! [`DocumentId`], the schema-validated field map, a creation timestamp and
//! an internal version marker that is bumped on every update.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::query::Projection;

/// Wire name of the document identifier.
pub const ID_FIELD: &str = "id";
/// Wire name of the creation timestamp.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Wire name of the internal version marker, hidden by the default projection.
pub const VERSION_FIELD: &str = "__v";

/// A value that could not be parsed as a document identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {path}: {value}.")]
pub struct InvalidIdentifier {
    pub path: String,
    pub value: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    #[inline]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[inline]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses a raw identifier, naming `path` in the error when it is malformed.
    pub fn parse(path: &str, raw: &str) -> Result<Self, InvalidIdentifier> {
        Uuid::parse_str(raw.trim())
            .map(Self)
            .map_err(|_| InvalidIdentifier {
                path: path.to_string(),
                value: raw.to_string(),
            })
    }

    #[inline]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for DocumentId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Canonical text form of a timestamp; fixed width so that string ordering
/// matches chronological ordering.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub created_at: DateTime<Utc>,
    pub version: i64,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            id: DocumentId::new(),
            created_at: Utc::now(),
            version: 0,
            fields,
        }
    }

    /// Looks up a field, resolving the `id`, `createdAt` and `__v` pseudo-fields.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => Some(self.id.to_value()),
            CREATED_AT_FIELD => Some(Value::String(format_timestamp(&self.created_at))),
            VERSION_FIELD => Some(Value::from(self.version)),
            _ => self.fields.get(field).cloned(),
        }
    }

    /// Reads a field holding a document reference.
    pub fn reference(&self, field: &str) -> Option<DocumentId> {
        self.fields
            .get(field)
            .and_then(Value::as_str)
            .and_then(|raw| DocumentId::parse(field, raw).ok())
    }

    /// Full wire representation, version marker included.
    pub fn to_value(&self) -> Value {
        let mut out = Map::with_capacity(self.fields.len() + 3);
        out.insert(ID_FIELD.to_string(), self.id.to_value());
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        out.insert(
            CREATED_AT_FIELD.to_string(),
            Value::String(format_timestamp(&self.created_at)),
        );
        out.insert(VERSION_FIELD.to_string(), Value::from(self.version));
        Value::Object(out)
    }

    /// Wire representation restricted by `projection`. The id is always kept.
    pub fn project(&self, projection: &Projection) -> Value {
        let Value::Object(full) = self.to_value() else {
            unreachable!("documents always render as objects")
        };

        let projected = match projection {
            Projection::Include(fields) => full
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
                .collect(),
            Projection::Exclude(fields) => full
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || !fields.iter().any(|f| f == key))
                .collect(),
        };

        Value::Object(projected)
    }
}
