//! Decoded state values
//!
//! A [`Value`] is one node of a decoded state tree. Besides the plain JSON
//! shapes it can hold live handles produced by reference resolution:
//! another state object, a participant, or a reference whose target could
//! not be found.
//!
//! Values serialize back to the wire format, so live handles turn into
//! `{"_id": key}` and `{"_pid": token}` markers again.

use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Number;

use crate::object::ObjectHandle;

/// Reserved keys used in the wire encoding
pub mod keys {
    /// Type tag of an object-shaped or scalar-shaped value
    pub const PROTO: &str = "_proto";
    /// Payload of a scalar-shaped value
    pub const VALUE: &str = "_value";
    /// Embedded object reference
    pub const ID: &str = "_id";
    /// Embedded participant reference
    pub const PID: &str = "_pid";

    /// Keys that never reach an object's update hook
    pub fn is_reserved(field: &str) -> bool {
        field == PROTO || field == VALUE
    }
}

/// Field map of an object-shaped state
pub type Fields = BTreeMap<String, Value>;

/// An encoded pointer embedded in state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Reference {
    /// Points at the object stored under a key
    Object(String),
    /// Points at a participant by identity token
    Participant(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Object(key) => write!(f, "object '{}'", key),
            Reference::Participant(token) => write!(f, "participant '{}'", token),
        }
    }
}

/// A participant in the shared document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Identity token, stable for the participant
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl Participant {
    /// Create a participant with only an identity token
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
            thumbnail_url: None,
        }
    }

    /// Set the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
}

/// One node of a decoded state tree
///
/// Equality is structural for plain data. Object references compare by the
/// key they point at, participants by their full descriptor, and unresolved
/// references by their target.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Value>),
    Map(Fields),
    /// Resolved object reference
    Object(ObjectHandle),
    /// Resolved participant reference
    Participant(Participant),
    /// Reference whose target was not available at decode time
    Unresolved(Reference),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            Value::Object(handle) => Some(handle),
            _ => None,
        }
    }

    pub fn as_participant(&self) -> Option<&Participant> {
        match self {
            Value::Participant(p) => Some(p),
            _ => None,
        }
    }

    /// The reference this value stands for, resolved or not
    pub fn reference(&self) -> Option<Reference> {
        match self {
            Value::Object(handle) => Some(Reference::Object(handle.id().to_string())),
            Value::Participant(p) => Some(Reference::Participant(p.id.clone())),
            Value::Unresolved(reference) => Some(reference.clone()),
            _ => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Number(n) => n.serialize(serializer),
            Value::String(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(fields) => fields.serialize(serializer),
            Value::Object(handle) => serialize_marker(serializer, keys::ID, handle.id()),
            Value::Participant(p) => serialize_marker(serializer, keys::PID, &p.id),
            Value::Unresolved(Reference::Object(key)) => serialize_marker(serializer, keys::ID, key),
            Value::Unresolved(Reference::Participant(token)) => {
                serialize_marker(serializer, keys::PID, token)
            }
        }
    }
}

fn serialize_marker<S: Serializer>(serializer: S, marker: &str, target: &str) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(1))?;
    map.serialize_entry(marker, target)?;
    map.end()
}

/// Plain conversion without reference resolution
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

/// Non-finite floats have no wire encoding and become `Null`
impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

impl From<ObjectHandle> for Value {
    fn from(handle: ObjectHandle) -> Self {
        Value::Object(handle)
    }
}

impl From<Participant> for Value {
    fn from(p: Participant) -> Self {
        Value::Participant(p)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
