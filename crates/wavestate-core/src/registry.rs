//! Object registry
//!
//! The authoritative map from key to live object, together with the last
//! decoded record of each key. Objects are created here, updated here and
//! removed here; the `update` and `remove` hooks are the only way their
//! lifecycle becomes visible.

use std::collections::HashMap;

use tracing::debug;

use crate::delta;
use crate::object::ObjectHandle;
use crate::types::TypeRegistry;
use crate::value::Fields;

/// Live objects and their last decoded state, by key
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    objects: HashMap<String, ObjectHandle>,
    states: HashMap<String, Fields>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the live object for a key
    pub fn get(&self, key: &str) -> Option<&ObjectHandle> {
        self.objects.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    /// Get the last decoded record for a key, reserved fields included
    pub fn state(&self, key: &str) -> Option<&Fields> {
        self.states.get(key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Keys of all live objects
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    /// Get the object for a key, creating it from `type_tag` if none exists
    pub fn get_or_create(&mut self, key: &str, type_tag: Option<&str>, types: &TypeRegistry) -> ObjectHandle {
        if let Some(handle) = self.objects.get(key) {
            return handle.clone();
        }

        let handle = types.instantiate(key, type_tag);
        debug!(key = %key, type_tag = ?handle.type_tag(), "Created object");
        self.objects.insert(key.to_string(), handle.clone());
        handle
    }

    /// Register an object created outside of reconciliation
    ///
    /// Returns `false` if an object is already live under the same key, in
    /// which case the registry is left unchanged.
    pub fn insert(&mut self, handle: ObjectHandle) -> bool {
        if self.objects.contains_key(handle.id()) {
            return false;
        }
        self.objects.insert(handle.id().to_string(), handle);
        true
    }

    /// Record a newly decoded state for an object and run its update hook
    ///
    /// The hook is invoked even when nothing changed.
    pub fn apply(&mut self, handle: &ObjectHandle, fields: Fields) {
        let (delta, state) = delta::compute(self.states.get(handle.id()), &fields);
        self.states.insert(handle.id().to_string(), fields);
        handle.update(&delta, &state);
    }

    /// Remove the object for a key, running its remove hook
    ///
    /// Returns `false` if no object was live under the key.
    pub fn remove(&mut self, key: &str) -> bool {
        let Some(handle) = self.objects.get(key).cloned() else {
            return false;
        };

        handle.remove();
        self.objects.remove(key);
        self.states.remove(key);
        debug!(key = %key, "Removed object");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{Delta, State};
    use crate::object::StateObject;
    use crate::value::Value;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Update(Delta, State),
        Remove,
    }

    struct Recorder(Rc<RefCell<Vec<Event>>>);

    impl StateObject for Recorder {
        fn update(&mut self, delta: &Delta, state: &State) {
            self.0.borrow_mut().push(Event::Update(delta.clone(), state.clone()));
        }

        fn remove(&mut self) {
            self.0.borrow_mut().push(Event::Remove);
        }
    }

    fn recording_types() -> (TypeRegistry, Rc<RefCell<Vec<Event>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut types = TypeRegistry::new();
        let shared = log.clone();
        types.register("Foo", move || Recorder(shared.clone()));
        (types, log)
    }

    fn fields(value: serde_json::Value) -> Fields {
        match Value::from(value) {
            Value::Map(fields) => fields,
            other => panic!("expected a map, got {:?}", other),
        }
    }

    #[test]
    fn test_get_or_create_reuses_live_object() {
        let (types, _) = recording_types();
        let mut registry = ObjectRegistry::new();

        let first = registry.get_or_create("k1", Some("Foo"), &types);
        let second = registry.get_or_create("k1", Some("Other"), &types);

        assert!(first.ptr_eq(&second));
        assert_eq!(second.type_tag(), Some("Foo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_apply_twice_reports_empty_delta() {
        let (types, log) = recording_types();
        let mut registry = ObjectRegistry::new();
        let handle = registry.get_or_create("k1", Some("Foo"), &types);

        registry.apply(&handle, fields(json!({"_proto": "Foo", "x": 1})));
        registry.apply(&handle, fields(json!({"_proto": "Foo", "x": 1})));

        let log = log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1],
            Event::Update(Delta::default(), State::Fields(fields(json!({"x": 1}))))
        );
    }

    #[test]
    fn test_remove_runs_hook_and_purges_state() {
        let (types, log) = recording_types();
        let mut registry = ObjectRegistry::new();
        let handle = registry.get_or_create("k1", Some("Foo"), &types);
        registry.apply(&handle, fields(json!({"x": 1})));

        assert!(registry.remove("k1"));
        assert!(!registry.remove("k1"));

        assert_eq!(log.borrow().last(), Some(&Event::Remove));
        assert!(registry.get("k1").is_none());
        assert!(registry.state("k1").is_none());
    }

    #[test]
    fn test_recreated_object_starts_from_empty_state() {
        let (types, log) = recording_types();
        let mut registry = ObjectRegistry::new();

        let handle = registry.get_or_create("k1", Some("Foo"), &types);
        registry.apply(&handle, fields(json!({"x": 1})));
        registry.remove("k1");

        let recreated = registry.get_or_create("k1", Some("Foo"), &types);
        assert!(!recreated.ptr_eq(&handle));
        registry.apply(&recreated, fields(json!({"x": 1})));

        assert_eq!(
            log.borrow().last(),
            Some(&Event::Update(
                Delta::default().with("x", 1),
                State::Fields(fields(json!({"x": 1})))
            ))
        );
    }

    #[test]
    fn test_insert_does_not_replace_live_object() {
        let (types, _) = recording_types();
        let mut registry = ObjectRegistry::new();

        let local = types.instantiate("k1", Some("Foo"));
        assert!(registry.insert(local.clone()));
        assert!(!registry.insert(types.instantiate("k1", Some("Foo"))));

        assert!(registry.get("k1").unwrap().ptr_eq(&local));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["k1"]);
    }
}
