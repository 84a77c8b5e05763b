//! Synchronization engine
//!
//! Owns every registry of a session and drives reconciliation between the
//! host's shared state and the local objects.

use std::collections::BTreeSet;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::gate::Gate;
use crate::codec::{Parsed, Resolve};
use crate::config::EngineConfig;
use crate::delta::Delta;
use crate::error::{SyncError, SyncResult};
use crate::host::{Host, RawSnapshot};
use crate::object::{ObjectHandle, StateObject};
use crate::outbox::OutgoingBuffer;
use crate::registry::ObjectRegistry;
use crate::types::{Factory, TypeRegistry};
use crate::value::{Fields, Participant};

type LoadHandler<H> = Box<dyn FnOnce(&mut Engine<H>)>;

/// Handler invoked with the participant list
pub type ParticipantCallback = Box<dyn FnMut(&[Participant])>;

/// Resolves references against the live registry and the host
struct Resolver<'a, H> {
    objects: &'a ObjectRegistry,
    host: &'a H,
}

impl<H: Host> Resolve for Resolver<'_, H> {
    fn resolve_object(&self, key: &str) -> Option<ObjectHandle> {
        self.objects.get(key).cloned()
    }

    fn resolve_participant(&self, token: &str) -> Option<Participant> {
        self.host.resolve_participant(token)
    }
}

/// One synchronization session against a host
pub struct Engine<H: Host> {
    host: H,
    config: EngineConfig,
    types: TypeRegistry,
    objects: ObjectRegistry,
    outbox: OutgoingBuffer,
    gate: Gate,
    /// Keys with a value as of the last reconciliation
    known_keys: BTreeSet<String>,
    /// Completed reconciliation passes
    passes: u64,
    viewer: Option<Participant>,
    participants: Vec<Participant>,
    on_load: Option<LoadHandler<H>>,
    participant_callback: Option<ParticipantCallback>,
}

impl<H: Host> Engine<H> {
    /// Start a session
    ///
    /// Fails if the host has no state. The current state counts as a first
    /// snapshot notification and is reconciled once participants are known.
    pub fn load(host: H, config: EngineConfig) -> SyncResult<Self> {
        let Some(snapshot) = host.read_snapshot() else {
            return Err(SyncError::NoState);
        };
        info!(keys = snapshot.len(), "Engine loaded");

        let mut gate = Gate::new();
        gate.defer();

        Ok(Self {
            host,
            config,
            types: TypeRegistry::new(),
            objects: ObjectRegistry::new(),
            outbox: OutgoingBuffer::new(),
            gate,
            known_keys: BTreeSet::new(),
            passes: 0,
            viewer: None,
            participants: Vec::new(),
            on_load: None,
            participant_callback: None,
        })
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether participants are known and snapshots are processed
    pub fn is_ready(&self) -> bool {
        self.gate.is_open()
    }

    /// The local participant, available once ready
    pub fn viewer(&self) -> Option<&Participant> {
        self.viewer.as_ref()
    }

    /// The participant list last reported by the host
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// The live object for a key
    pub fn object(&self, key: &str) -> Option<ObjectHandle> {
        self.objects.get(key).cloned()
    }

    /// The last decoded record for a key, reserved fields included
    pub fn state(&self, key: &str) -> Option<&Fields> {
        self.objects.state(key)
    }

    pub fn objects(&self) -> &ObjectRegistry {
        &self.objects
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// The change pending for a key
    pub fn pending(&self, key: &str) -> Option<&Delta> {
        self.outbox.pending(key)
    }

    pub fn pending_count(&self) -> usize {
        self.outbox.len()
    }

    // ==================== Setup ====================

    /// Run `handler` once the session is ready
    ///
    /// The handler runs after the viewer is known and before the first
    /// snapshot is reconciled. If the session is already ready it runs
    /// immediately. A later registration replaces an earlier one that has
    /// not run yet.
    pub fn on_load<F>(&mut self, handler: F)
    where
        F: FnOnce(&mut Engine<H>) + 'static,
    {
        if self.is_ready() {
            handler(self);
        } else {
            self.on_load = Some(Box::new(handler));
        }
    }

    /// Register object types, replacing existing ones with the same tag
    pub fn add_types<I, T>(&mut self, types: I)
    where
        I: IntoIterator<Item = (T, Factory)>,
        T: Into<String>,
    {
        self.types.add_types(types);
    }

    /// Register a single object type
    pub fn register_type<F, O>(&mut self, tag: impl Into<String>, make: F)
    where
        F: Fn() -> O + 'static,
        O: StateObject + 'static,
    {
        self.types.register(tag, make);
    }

    /// Register the participants-changed handler
    ///
    /// Once ready, the handler is called with the current participant list
    /// and again on every membership change.
    pub fn set_participant_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&[Participant]) + 'static,
    {
        let mut callback: ParticipantCallback = Box::new(callback);
        if self.is_ready() {
            callback(&self.participants);
        }
        self.participant_callback = Some(callback);
    }

    // ==================== Host events ====================

    /// The host's shared state changed
    ///
    /// Deferred until participants are known; deferred notifications
    /// collapse into one replay.
    pub fn handle_snapshot_change(&mut self) {
        if self.gate.defer() {
            debug!("Deferring snapshot until participants are known");
            return;
        }
        self.reconcile();
    }

    /// The host's participant list changed
    ///
    /// The first call opens the gate: the viewer is resolved, the load
    /// handler runs and any deferred snapshot is reconciled.
    pub fn handle_participants_change(&mut self, participants: &[Participant]) {
        self.participants = participants.to_vec();

        if let Some(replay) = self.gate.open() {
            self.viewer = self.host.viewer();
            info!(
                participants = participants.len(),
                viewer = ?self.viewer.as_ref().map(|p| p.id.as_str()),
                "Participants loaded"
            );

            let passes = self.passes;
            if let Some(handler) = self.on_load.take() {
                handler(self);
            }
            // A pass run from the load handler already covers the replay
            if replay && self.passes == passes {
                self.reconcile();
            }
        }

        if let Some(callback) = self.participant_callback.as_mut() {
            callback(participants);
        }
    }

    // ==================== Local changes ====================

    /// Create an object for purely local use under a fresh key
    ///
    /// The object joins the registry with its first `submit_delta`. An
    /// unregistered `type_tag` falls back to the default object and no
    /// `_proto` is written for it.
    pub fn create_local(&self, type_tag: &str) -> ObjectHandle {
        if !self.types.contains(type_tag) {
            warn!(type_tag = %type_tag, "Creating local object of unregistered type");
        }
        self.types
            .instantiate(Uuid::new_v4().to_string(), Some(type_tag))
    }

    /// Queue a change to an object's key
    ///
    /// Registers the object if its key has no live object yet.
    pub fn submit_delta(&mut self, object: &ObjectHandle, delta: Delta) {
        self.outbox.submit(object.id(), delta);
        if self.objects.insert(object.clone()) {
            debug!(key = %object.id(), "Registered local object");
        }
    }

    /// Send all pending changes to the host as one batch
    ///
    /// Pending changes are cleared before submission; a rejected batch is
    /// reported and not retried. Returns the number of keys submitted.
    pub fn send_updates(&mut self) -> SyncResult<usize> {
        let batch = self.outbox.flush(&self.objects)?;
        if batch.is_empty() && self.config.skip_empty_flush {
            debug!("Nothing to send");
            return Ok(0);
        }

        let entries = batch.len();
        debug!(entries, "Submitting batch");
        self.host.submit_batch(batch).map_err(|source| {
            warn!(entries, error = %source, "Host rejected batch");
            SyncError::Submit { entries, source }
        })?;

        Ok(entries)
    }

    // ==================== Reconciliation ====================

    fn reconcile(&mut self) {
        let Some(snapshot) = self.host.read_snapshot() else {
            warn!("Host returned no state, skipping reconciliation");
            return;
        };

        let current: BTreeSet<String> = live_entries(&snapshot)
            .map(|(key, _)| key.to_string())
            .collect();
        debug!(keys = current.len(), "Reconciling snapshot");

        if self.config.resolve_forward_references {
            self.reconcile_batched(&snapshot);
        } else {
            self.reconcile_sequential(&snapshot);
        }

        let vanished: Vec<String> = self.known_keys.difference(&current).cloned().collect();
        for key in vanished {
            self.objects.remove(&key);
        }

        self.known_keys = current;
        self.passes += 1;
    }

    /// Create every new object first, then resolve and dispatch
    fn reconcile_batched(&mut self, snapshot: &RawSnapshot) {
        let mut parsed = Vec::new();
        for (key, raw) in live_entries(snapshot) {
            let Some(value) = parse_logged(key, raw) else {
                continue;
            };
            let handle = self
                .objects
                .get_or_create(key, value.type_tag(), &self.types);
            parsed.push((handle, value));
        }

        for (handle, value) in parsed {
            let fields = self.resolve(value);
            self.objects.apply(&handle, fields);
        }
    }

    /// Resolve and dispatch one key at a time
    fn reconcile_sequential(&mut self, snapshot: &RawSnapshot) {
        for (key, raw) in live_entries(snapshot) {
            let Some(value) = parse_logged(key, raw) else {
                continue;
            };
            let type_tag = value.type_tag().map(str::to_string);
            let fields = self.resolve(value);
            let handle = self
                .objects
                .get_or_create(key, type_tag.as_deref(), &self.types);
            self.objects.apply(&handle, fields);
        }
    }

    fn resolve(&self, value: Parsed) -> Fields {
        let resolver = Resolver {
            objects: &self.objects,
            host: &self.host,
        };
        let references = value.references().len();
        let decoded = value.resolve(&resolver);
        if !decoded.is_fully_resolved() {
            debug!(
                key = %decoded.key,
                references,
                unresolved = ?decoded.unresolved,
                "References left unresolved"
            );
        }
        decoded.fields
    }
}

/// Entries that carry a value; empty strings count as deleted
fn live_entries(snapshot: &RawSnapshot) -> impl Iterator<Item = (&str, &str)> {
    snapshot
        .iter()
        .filter(|(_, raw)| !raw.is_empty())
        .map(|(key, raw)| (key.as_str(), raw.as_str()))
}

fn parse_logged(key: &str, raw: &str) -> Option<Parsed> {
    match Parsed::parse(key, raw) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(key = %key, error = %e, "Skipping undecodable value");
            None
        }
    }
}
