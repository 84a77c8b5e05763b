//! wavestate core library
//!
//! Reconciles a shared, flat key-value store owned by a collaborative
//! document host with a graph of live, typed objects.
//!
//! # Architecture
//!
//! - **Host**: owns the shared state; the engine reads it and submits batches
//! - **Engine**: decodes every key, diffs it against its previous state and
//!   calls the bound object's hooks
//! - **Outbox**: merges local changes until they are sent as one batch
//!
//! # Quick Start
//!
//! ```text
//! let mut engine = Engine::load(host, EngineConfig::default())?;
//! engine.register_type("Task", Task::default);
//! engine.handle_participants_change(&participants);
//!
//! let task = engine.create_local("Task");
//! engine.submit_delta(&task, Delta::default().with("title", "Write docs"));
//! engine.send_updates()?;
//! ```
//!
//! # Modules
//!
//! - `sync`: Engine and readiness gate (main entry point)
//! - `codec`: Wire decoding, reference resolution and encoding
//! - `delta`: Delta computation
//! - `registry`: Live objects by key
//! - `types`: Object types by tag
//! - `outbox`: Pending local changes
//! - `host`: Host boundary and in-memory host
//! - `config`: Engine configuration

pub mod codec;
pub mod config;
pub mod delta;
pub mod error;
pub mod host;
pub mod object;
pub mod outbox;
pub mod registry;
pub mod sync;
pub mod types;
pub mod value;

pub use config::EngineConfig;
pub use delta::{Delta, State};
pub use error::{HostError, SyncError, SyncResult};
pub use host::{Host, MemoryHost, RawSnapshot};
pub use object::{ObjectHandle, StateObject, Stateful};
pub use sync::Engine;
pub use types::{factory, Factory, TypeRegistry};
pub use value::{Fields, Participant, Reference, Value};
