//! Synchronization driver
//!
//! Ties the host to the object graph.
//!
//! ## Flow
//!
//! 1. The host reports a snapshot change
//! 2. Every key with a value is decoded and its references resolved
//! 3. The delta against the previous decoded state goes to the object
//! 4. Keys that disappeared since the last pass are removed
//!
//! Nothing is processed until the participant list is known; see
//! [`Gate`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut engine = Engine::load(host, EngineConfig::load()?)?;
//! engine.register_type("Note", Note::default);
//! engine.handle_participants_change(&participants);
//! ```

mod engine;
mod gate;

pub use engine::{Engine, ParticipantCallback};
pub use gate::Gate;
