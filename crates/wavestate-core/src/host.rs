//! Host boundary
//!
//! The collaborative document host owns the shared key-value state. The
//! engine reads it, asks it to resolve participants and hands it batches
//! of writes. Change notifications flow the other way: whoever drives the
//! host calls [`Engine::handle_snapshot_change`] and
//! [`Engine::handle_participants_change`].
//!
//! [`MemoryHost`] keeps everything in memory and is used by tests and the
//! CLI replay command.
//!
//! [`Engine::handle_snapshot_change`]: crate::Engine::handle_snapshot_change
//! [`Engine::handle_participants_change`]: crate::Engine::handle_participants_change

use std::collections::BTreeMap;

use crate::error::HostError;
use crate::value::Participant;

/// Full key-value state of the shared document
pub type RawSnapshot = BTreeMap<String, String>;

/// Services provided by the document host
pub trait Host {
    /// Read the full current state, or `None` if the host has none
    fn read_snapshot(&self) -> Option<RawSnapshot>;

    /// The local participant, once known
    fn viewer(&self) -> Option<Participant>;

    /// Look up a participant by identity token
    fn resolve_participant(&self, token: &str) -> Option<Participant>;

    /// Atomically write a batch of keys
    ///
    /// The write is applied by the host asynchronously; its effect shows up
    /// in a later snapshot.
    fn submit_batch(&mut self, batch: RawSnapshot) -> Result<(), HostError>;
}

/// In-memory host
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    state: Option<RawSnapshot>,
    participants: Vec<Participant>,
    viewer_id: Option<String>,
    submitted: Vec<RawSnapshot>,
    reject_next: Option<HostError>,
}

impl MemoryHost {
    /// A host with an empty shared state
    pub fn new() -> Self {
        Self::with_state(RawSnapshot::new())
    }

    /// A host that has no state at all
    pub fn without_state() -> Self {
        Self::default()
    }

    pub fn with_state(state: RawSnapshot) -> Self {
        Self {
            state: Some(state),
            ..Self::default()
        }
    }

    /// Write a key directly, as a remote participant would
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.state
            .get_or_insert_with(RawSnapshot::new)
            .insert(key.into(), value.into());
    }

    /// Delete a key directly, as a remote participant would
    pub fn delete(&mut self, key: &str) {
        if let Some(state) = self.state.as_mut() {
            state.remove(key);
        }
    }

    /// Replace the whole state
    pub fn replace(&mut self, state: RawSnapshot) {
        self.state = Some(state);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.state.as_ref()?.get(key).map(String::as_str)
    }

    pub fn set_participants(&mut self, participants: Vec<Participant>) {
        self.participants = participants;
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn set_viewer(&mut self, id: impl Into<String>) {
        self.viewer_id = Some(id.into());
    }

    /// Every batch accepted so far, oldest first
    pub fn submitted(&self) -> &[RawSnapshot] {
        &self.submitted
    }

    /// Make the next submission fail with `error`
    pub fn fail_next_submit(&mut self, error: HostError) {
        self.reject_next = Some(error);
    }
}

impl Host for MemoryHost {
    fn read_snapshot(&self) -> Option<RawSnapshot> {
        self.state.clone()
    }

    fn viewer(&self) -> Option<Participant> {
        let id = self.viewer_id.as_deref()?;
        self.resolve_participant(id)
            .or_else(|| Some(Participant::new(id)))
    }

    fn resolve_participant(&self, token: &str) -> Option<Participant> {
        self.participants.iter().find(|p| p.id == token).cloned()
    }

    fn submit_batch(&mut self, batch: RawSnapshot) -> Result<(), HostError> {
        if let Some(error) = self.reject_next.take() {
            return Err(error);
        }

        let state = self.state.get_or_insert_with(RawSnapshot::new);
        for (key, value) in &batch {
            state.insert(key.clone(), value.clone());
        }
        self.submitted.push(batch);
        Ok(())
    }
}
