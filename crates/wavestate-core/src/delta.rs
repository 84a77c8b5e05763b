//! Delta computation
//!
//! Compares the previous decoded state of a key with the new one and
//! produces the change set handed to the object's `update` hook.
//!
//! ## Shapes
//!
//! - **Object-shaped** state is a field map. The delta lists every field
//!   whose value changed, plus `None` for every field that disappeared.
//! - **Scalar-shaped** state carries a single `_value`. Delta and state are
//!   both that bare value; no field diffing happens.

use std::collections::BTreeMap;

use crate::value::{keys, Fields, Value};

/// Field changes: `None` marks a removed field
pub type FieldChanges = BTreeMap<String, Option<Value>>;

/// A change description for one key
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    Fields(FieldChanges),
    Scalar(Value),
}

impl Default for Delta {
    fn default() -> Self {
        Delta::Fields(FieldChanges::new())
    }
}

impl Delta {
    /// A delta that replaces the whole value
    pub fn scalar(value: impl Into<Value>) -> Self {
        Delta::Scalar(value.into())
    }

    /// Set a field, turning a scalar delta into a field delta
    pub fn with(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field.into(), Some(value.into()))
    }

    /// Remove a field, turning a scalar delta into a field delta
    pub fn without(self, field: impl Into<String>) -> Self {
        self.set(field.into(), None)
    }

    fn set(self, field: String, value: Option<Value>) -> Self {
        let mut changes = match self {
            Delta::Fields(changes) => changes,
            Delta::Scalar(_) => FieldChanges::new(),
        };
        changes.insert(field, value);
        Delta::Fields(changes)
    }

    /// Look up a field change
    ///
    /// Returns `Some(None)` when the field was removed.
    pub fn get(&self, field: &str) -> Option<Option<&Value>> {
        match self {
            Delta::Fields(changes) => changes.get(field).map(Option::as_ref),
            Delta::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Delta::Scalar(value) => Some(value),
            Delta::Fields(_) => None,
        }
    }

    /// True for a field delta without changes
    pub fn is_empty(&self) -> bool {
        matches!(self, Delta::Fields(changes) if changes.is_empty())
    }

    pub fn len(&self) -> usize {
        match self {
            Delta::Fields(changes) => changes.len(),
            Delta::Scalar(_) => 1,
        }
    }
}

/// The complete current state of a key as seen by its object
#[derive(Debug, Clone, PartialEq)]
pub enum State {
    Fields(Fields),
    Scalar(Value),
}

impl Default for State {
    fn default() -> Self {
        State::Fields(Fields::new())
    }
}

impl State {
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            State::Fields(fields) => fields.get(field),
            State::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            State::Scalar(value) => Some(value),
            State::Fields(_) => None,
        }
    }

    pub fn as_fields(&self) -> Option<&Fields> {
        match self {
            State::Fields(fields) => Some(fields),
            State::Scalar(_) => None,
        }
    }
}

/// Compute the delta between a key's previous decoded record and its new one
///
/// `old` is `None` when the key has no recorded state yet, in which case
/// every field of `new` is reported as changed.
pub fn compute(old: Option<&Fields>, new: &Fields) -> (Delta, State) {
    if let Some(value) = new.get(keys::VALUE) {
        return (Delta::Scalar(value.clone()), State::Scalar(value.clone()));
    }

    let mut changes = FieldChanges::new();

    if let Some(old) = old {
        for field in old.keys() {
            if !keys::is_reserved(field) && !new.contains_key(field) {
                changes.insert(field.clone(), None);
            }
        }
    }

    for (field, value) in new {
        if keys::is_reserved(field) {
            continue;
        }
        if old.and_then(|old| old.get(field)) != Some(value) {
            changes.insert(field.clone(), Some(value.clone()));
        }
    }

    let state = new
        .iter()
        .filter(|(field, _)| !keys::is_reserved(field))
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    (Delta::Fields(changes), State::Fields(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: serde_json::Value) -> Fields {
        match Value::from(value) {
            Value::Map(fields) => fields,
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[test]
    fn test_first_state_reports_every_field() {
        let new = fields(json!({"_proto": "Foo", "x": 1}));
        let (delta, state) = compute(None, &new);

        assert_eq!(delta, Delta::default().with("x", 1));
        assert_eq!(state, State::Fields(fields(json!({"x": 1}))));
    }

    #[test]
    fn test_identical_state_yields_empty_delta() {
        let old = fields(json!({"_proto": "Foo", "x": 1, "nested": {"a": [1, 2]}}));
        let (delta, _) = compute(Some(&old), &old.clone());
        assert!(delta.is_empty());
    }

    #[test]
    fn test_removed_field_is_marked() {
        let old = fields(json!({"_proto": "Foo", "x": 1, "y": 2}));
        let new = fields(json!({"_proto": "Foo", "x": 1}));
        let (delta, state) = compute(Some(&old), &new);

        assert_eq!(delta, Delta::default().without("y"));
        assert_eq!(delta.get("y"), Some(None));
        assert_eq!(delta.get("x"), None);
        assert_eq!(state.get("x"), Some(&Value::from(1)));
    }

    #[test]
    fn test_changed_and_added_fields() {
        let old = fields(json!({"x": 1, "y": "a"}));
        let new = fields(json!({"x": 2, "y": "a", "z": true}));
        let (delta, _) = compute(Some(&old), &new);

        assert_eq!(delta.len(), 2);
        assert_eq!(delta.get("x"), Some(Some(&Value::from(2))));
        assert_eq!(delta.get("z"), Some(Some(&Value::from(true))));
    }

    #[test]
    fn test_scalar_state_passes_bare_value() {
        let new = fields(json!({"_proto": "Counter", "_value": 5}));
        let (delta, state) = compute(None, &new);

        assert_eq!(delta, Delta::scalar(5));
        assert_eq!(state, State::Scalar(Value::from(5)));
    }

    #[test]
    fn test_scalar_to_object_drops_value_marker() {
        let old = fields(json!({"_proto": "Counter", "_value": 5}));
        let new = fields(json!({"_proto": "Counter", "n": 5}));
        let (delta, _) = compute(Some(&old), &new);

        assert_eq!(delta, Delta::default().with("n", 5));
    }

    #[test]
    fn test_proto_change_is_not_a_field_change() {
        let old = fields(json!({"_proto": "Foo", "x": 1}));
        let new = fields(json!({"_proto": "Bar", "x": 1}));
        let (delta, state) = compute(Some(&old), &new);

        assert!(delta.is_empty());
        assert_eq!(state.get("_proto"), None);
    }

    #[test]
    fn test_builder_converts_scalar_delta() {
        let delta = Delta::scalar("text").with("a", 1);
        assert_eq!(delta.as_scalar(), None);
        assert_eq!(delta.len(), 1);
    }
}
