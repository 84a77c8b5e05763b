//! Live state objects
//!
//! Every key in the shared state is materialized as one object implementing
//! [`StateObject`]. The engine only talks to objects through the `update`
//! and `remove` hooks. Application code reads a concrete object back
//! through [`ObjectHandle::with`].

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::delta::{Delta, State};

/// Access to the concrete type behind a trait object
///
/// Implemented for every `'static` type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Capabilities of an object bound to a shared key
pub trait StateObject: AsAny {
    /// Called once, when the object is bound to its key
    fn bind(&mut self, _id: &str) {}

    /// Called after every change to the object's key
    ///
    /// `delta` holds only what changed since the previous call (every field
    /// on the first call); `state` is the complete current state.
    fn update(&mut self, _delta: &Delta, _state: &State) {}

    /// Called once when the key disappears from the shared state
    fn remove(&mut self) {}
}

/// Untyped object used when no registered type matches
#[derive(Debug, Default, Clone, Copy)]
pub struct Stateful;

impl StateObject for Stateful {}

struct ObjectCell {
    id: String,
    type_tag: Option<String>,
    object: RefCell<Box<dyn StateObject>>,
}

/// Shared handle to a live object
///
/// Handles are cheap to clone. Two handles are equal when they are bound to
/// the same key.
#[derive(Clone)]
pub struct ObjectHandle(Rc<ObjectCell>);

impl ObjectHandle {
    /// Bind `object` to the key `id`
    pub fn new(id: impl Into<String>, type_tag: Option<String>, mut object: Box<dyn StateObject>) -> Self {
        let id = id.into();
        object.bind(&id);
        Self(Rc::new(ObjectCell {
            id,
            type_tag,
            object: RefCell::new(object),
        }))
    }

    /// The key this object is bound to
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// The type tag the object was created from, if it came from a
    /// registered type
    pub fn type_tag(&self) -> Option<&str> {
        self.0.type_tag.as_deref()
    }

    /// Whether both handles point at the same instance
    pub fn ptr_eq(&self, other: &ObjectHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Run `f` on the object if it is a `T`
    ///
    /// Returns `None` if the object has another type or is in the middle of
    /// one of its own hooks.
    pub fn with<T: StateObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let object = self.0.object.try_borrow().ok()?;
        (**object).as_any().downcast_ref::<T>().map(f)
    }

    pub(crate) fn update(&self, delta: &Delta, state: &State) {
        self.0.object.borrow_mut().update(delta, state);
    }

    pub(crate) fn remove(&self) {
        self.0.object.borrow_mut().remove();
    }
}

impl PartialEq for ObjectHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("id", &self.id())
            .field("type_tag", &self.type_tag())
            .finish()
    }
}
