//! Snapshot decoding and reference resolution

use serde_json::{Map, Value as Json};

use crate::error::{SyncError, SyncResult};
use crate::object::ObjectHandle;
use crate::value::{keys, Fields, Participant, Reference, Value};

/// Lookup of reference targets during decoding
pub trait Resolve {
    /// Find the live object stored under `key`
    fn resolve_object(&self, key: &str) -> Option<ObjectHandle>;

    /// Find the participant identified by `token`
    fn resolve_participant(&self, token: &str) -> Option<Participant>;
}

/// First decoding pass: the raw tree of one key, references not yet resolved
#[derive(Debug, Clone)]
pub struct Parsed {
    key: String,
    tree: Map<String, Json>,
    references: Vec<Reference>,
}

impl Parsed {
    /// Parse the encoded value stored under `key`
    ///
    /// The top level must be a JSON object; anything else is a decode error.
    pub fn parse(key: &str, raw: &str) -> SyncResult<Self> {
        let tree: Map<String, Json> =
            serde_json::from_str(raw).map_err(|source| SyncError::Decode {
                key: key.to_string(),
                source,
            })?;

        let mut references = Vec::new();
        for node in tree.values() {
            collect_references(node, &mut references);
        }

        Ok(Self {
            key: key.to_string(),
            tree,
            references,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `_proto` tag, if present and a string
    pub fn type_tag(&self) -> Option<&str> {
        self.tree.get(keys::PROTO).and_then(Json::as_str)
    }

    /// Whether the value is scalar-shaped
    pub fn is_scalar(&self) -> bool {
        self.tree.contains_key(keys::VALUE)
    }

    /// Reference placeholders found in the tree, in document order
    pub fn references(&self) -> &[Reference] {
        &self.references
    }

    /// Second decoding pass: substitute live targets for every placeholder
    pub fn resolve<R: Resolve + ?Sized>(self, resolver: &R) -> Decoded {
        let mut unresolved = Vec::new();
        let fields = self
            .tree
            .into_iter()
            .map(|(field, node)| (field, substitute(node, resolver, &mut unresolved)))
            .collect();

        Decoded {
            key: self.key,
            fields,
            unresolved,
        }
    }
}

/// A fully decoded value for one key
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub key: String,
    /// Decoded record, reserved fields included
    pub fields: Fields,
    /// References left as placeholders because their target was missing
    pub unresolved: Vec<Reference>,
}

impl Decoded {
    pub fn is_fully_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Parse and resolve one encoded value
pub fn decode<R: Resolve + ?Sized>(key: &str, raw: &str, resolver: &R) -> SyncResult<Decoded> {
    Ok(Parsed::parse(key, raw)?.resolve(resolver))
}

/// The reference a JSON object stands for, if it carries a marker
///
/// `_id` takes precedence over `_pid`. Markers must be strings.
fn marker(map: &Map<String, Json>) -> Option<Reference> {
    if let Some(id) = map.get(keys::ID) {
        return id.as_str().map(|key| Reference::Object(key.to_string()));
    }
    map.get(keys::PID)
        .and_then(Json::as_str)
        .map(|token| Reference::Participant(token.to_string()))
}

fn collect_references(node: &Json, out: &mut Vec<Reference>) {
    match node {
        Json::Object(map) => match marker(map) {
            Some(reference) => out.push(reference),
            None => map.values().for_each(|child| collect_references(child, out)),
        },
        Json::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

fn substitute<R: Resolve + ?Sized>(node: Json, resolver: &R, unresolved: &mut Vec<Reference>) -> Value {
    match node {
        Json::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute(item, resolver, unresolved))
                .collect(),
        ),
        Json::Object(map) => match marker(&map) {
            Some(Reference::Object(key)) => match resolver.resolve_object(&key) {
                Some(handle) => Value::Object(handle),
                None => miss(Reference::Object(key), unresolved),
            },
            Some(Reference::Participant(token)) => match resolver.resolve_participant(&token) {
                Some(participant) => Value::Participant(participant),
                None => miss(Reference::Participant(token), unresolved),
            },
            None => Value::Map(
                map.into_iter()
                    .map(|(field, child)| (field, substitute(child, resolver, unresolved)))
                    .collect(),
            ),
        },
        other => Value::from(other),
    }
}

fn miss(reference: Reference, unresolved: &mut Vec<Reference>) -> Value {
    unresolved.push(reference.clone());
    Value::Unresolved(reference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Stateful;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Targets {
        objects: HashMap<String, ObjectHandle>,
        participants: HashMap<String, Participant>,
    }

    impl Targets {
        fn with_object(mut self, key: &str) -> Self {
            self.objects
                .insert(key.to_string(), ObjectHandle::new(key, None, Box::new(Stateful)));
            self
        }

        fn with_participant(mut self, id: &str) -> Self {
            self.participants.insert(id.to_string(), Participant::new(id));
            self
        }
    }

    impl Resolve for Targets {
        fn resolve_object(&self, key: &str) -> Option<ObjectHandle> {
            self.objects.get(key).cloned()
        }

        fn resolve_participant(&self, token: &str) -> Option<Participant> {
            self.participants.get(token).cloned()
        }
    }

    #[test]
    fn test_parse_reads_type_tag() {
        let parsed = Parsed::parse("k1", r#"{"_proto":"Foo","x":1}"#).unwrap();
        assert_eq!(parsed.key(), "k1");
        assert_eq!(parsed.type_tag(), Some("Foo"));
        assert!(!parsed.is_scalar());
        assert!(parsed.references().is_empty());
    }

    #[test]
    fn test_parse_detects_scalar_shape() {
        let parsed = Parsed::parse("k1", r#"{"_proto":"Counter","_value":5}"#).unwrap();
        assert!(parsed.is_scalar());
    }

    #[test]
    fn test_parse_rejects_malformed_text() {
        let err = Parsed::parse("bad", "{not json").unwrap_err();
        assert!(matches!(err, SyncError::Decode { ref key, .. } if key == "bad"));
    }

    #[test]
    fn test_parse_rejects_non_object_top_level() {
        assert!(Parsed::parse("k1", "5").is_err());
        assert!(Parsed::parse("k1", r#"["a"]"#).is_err());
    }

    #[test]
    fn test_parse_collects_nested_references() {
        let raw = r#"{"owner":{"_pid":"alice"},"items":[{"_id":"k2"},{"n":{"_id":"k3"}}]}"#;
        let parsed = Parsed::parse("k1", raw).unwrap();

        let mut refs = parsed.references().to_vec();
        refs.sort();
        assert_eq!(
            refs,
            vec![
                Reference::Object("k2".to_string()),
                Reference::Object("k3".to_string()),
                Reference::Participant("alice".to_string()),
            ]
        );
    }

    #[test]
    fn test_resolve_substitutes_live_targets() {
        let targets = Targets::default().with_object("k2").with_participant("alice");
        let decoded = decode("k1", r#"{"next":{"_id":"k2"},"by":{"_pid":"alice"}}"#, &targets).unwrap();

        assert!(decoded.is_fully_resolved());
        assert_eq!(decoded.fields["next"].as_object().unwrap().id(), "k2");
        assert_eq!(decoded.fields["by"].as_participant().unwrap().id, "alice");
    }

    #[test]
    fn test_missing_targets_stay_unresolved() {
        let targets = Targets::default();
        let decoded = decode("k1", r#"{"next":{"_id":"k9"},"by":{"_pid":"ghost"}}"#, &targets).unwrap();

        assert!(!decoded.is_fully_resolved());
        assert_eq!(
            decoded.fields["next"],
            Value::Unresolved(Reference::Object("k9".to_string()))
        );
        assert_eq!(decoded.unresolved.len(), 2);
    }

    #[test]
    fn test_non_string_marker_is_plain_data() {
        let decoded = decode("k1", r#"{"weird":{"_id":7}}"#, &Targets::default()).unwrap();
        assert!(matches!(decoded.fields["weird"], Value::Map(_)));
        assert!(decoded.is_fully_resolved());
    }

    #[test]
    fn test_top_level_markers_are_fields() {
        let decoded = decode("k1", r#"{"_id":"k2","x":1}"#, &Targets::default().with_object("k2")).unwrap();
        assert_eq!(decoded.fields["_id"], Value::from("k2"));
        assert_eq!(decoded.fields["x"], Value::from(1));
    }
}
