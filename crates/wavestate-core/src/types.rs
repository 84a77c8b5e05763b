//! Type registry
//!
//! Maps a type tag to the factory that materializes objects of that type.
//! Tags are only consulted when an object is first created; registering a
//! type later never changes objects that already exist.
//!
//! Lookup order for a tag:
//! 1. the factory registered under the tag
//! 2. the factory registered under the empty tag `""`
//! 3. the built-in untyped [`Stateful`] object

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::object::{ObjectHandle, StateObject, Stateful};

/// Tag whose factory replaces the built-in untyped object
pub const DEFAULT_TAG: &str = "";

/// Constructor for a registered type
pub type Factory = Rc<dyn Fn() -> Box<dyn StateObject>>;

/// Wrap a closure as a [`Factory`]
pub fn factory<F, O>(make: F) -> Factory
where
    F: Fn() -> O + 'static,
    O: StateObject + 'static,
{
    Rc::new(move || Box::new(make()) as Box<dyn StateObject>)
}

/// Registry of object types by tag
#[derive(Default, Clone)]
pub struct TypeRegistry {
    factories: HashMap<String, Factory>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any factory with the same tag
    pub fn register<F, O>(&mut self, tag: impl Into<String>, make: F)
    where
        F: Fn() -> O + 'static,
        O: StateObject + 'static,
    {
        self.insert(tag.into(), factory(make));
    }

    /// Register several types at once
    pub fn add_types<I, T>(&mut self, types: I)
    where
        I: IntoIterator<Item = (T, Factory)>,
        T: Into<String>,
    {
        for (tag, make) in types {
            self.insert(tag.into(), make);
        }
    }

    fn insert(&mut self, tag: String, make: Factory) {
        if self.factories.insert(tag.clone(), make).is_some() {
            debug!(tag = %tag, "Replaced registered type");
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Create an object for `id` from the best factory for `tag`
    ///
    /// The handle remembers the tag of the factory that produced it. The
    /// built-in untyped object has no tag.
    pub fn instantiate(&self, id: impl Into<String>, tag: Option<&str>) -> ObjectHandle {
        let registered = tag
            .and_then(|tag| self.factories.get_key_value(tag))
            .or_else(|| self.factories.get_key_value(DEFAULT_TAG));

        match registered {
            Some((tag, make)) => ObjectHandle::new(id, Some(tag.clone()), make()),
            None => ObjectHandle::new(id, None, Box::new(Stateful)),
        }
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.factories.keys().collect();
        tags.sort();
        f.debug_struct("TypeRegistry").field("tags", &tags).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Foo;
    impl StateObject for Foo {}

    #[derive(Default)]
    struct Fallback;
    impl StateObject for Fallback {}

    #[test]
    fn test_registered_tag_is_used() {
        let mut types = TypeRegistry::new();
        types.register("Foo", Foo::default);

        let handle = types.instantiate("k1", Some("Foo"));
        assert_eq!(handle.id(), "k1");
        assert_eq!(handle.type_tag(), Some("Foo"));
    }

    #[test]
    fn test_unknown_tag_falls_back_to_untyped() {
        let types = TypeRegistry::new();

        assert_eq!(types.instantiate("k1", Some("Nope")).type_tag(), None);
        assert_eq!(types.instantiate("k2", None).type_tag(), None);
    }

    #[test]
    fn test_empty_tag_overrides_untyped_default() {
        let mut types = TypeRegistry::new();
        types.register(DEFAULT_TAG, Fallback::default);

        let handle = types.instantiate("k1", Some("Nope"));
        assert_eq!(handle.type_tag(), Some(DEFAULT_TAG));
    }

    #[test]
    fn test_add_types_overwrites_by_tag() {
        let mut types = TypeRegistry::new();
        types.add_types([("Foo", factory(Foo::default)), ("Bar", factory(Foo::default))]);
        types.add_types([("Foo", factory(Fallback::default))]);

        assert_eq!(types.len(), 2);
        assert!(types.contains("Foo"));
        assert!(types.contains("Bar"));
    }

    #[test]
    fn test_debug_lists_sorted_tags() {
        let mut types = TypeRegistry::new();
        types.register("b", Foo::default);
        types.register("a", Foo::default);
        assert_eq!(format!("{:?}", types), r#"TypeRegistry { tags: ["a", "b"] }"#);
    }
}
