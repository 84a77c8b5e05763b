//! Outgoing update buffer
//!
//! Collects locally originated changes until the next flush.
//!
//! ## Merge rules
//!
//! - Field deltas for the same key merge field by field; the later write of
//!   a field wins.
//! - A scalar delta replaces whatever is pending for the key.
//! - A field delta on top of a pending scalar replaces it as well.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use tracing::debug;

use crate::codec;
use crate::delta::Delta;
use crate::error::SyncResult;
use crate::host::RawSnapshot;
use crate::registry::ObjectRegistry;

/// Pending local changes by key
#[derive(Debug, Default)]
pub struct OutgoingBuffer {
    pending: BTreeMap<String, Delta>,
}

impl OutgoingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a change for `key`, merging with what is already pending
    pub fn submit(&mut self, key: &str, delta: Delta) {
        match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut entry) => match (entry.get_mut(), delta) {
                (Delta::Fields(existing), Delta::Fields(changes)) => existing.extend(changes),
                (slot, delta) => *slot = delta,
            },
            Entry::Vacant(entry) => {
                entry.insert(delta);
            }
        }
    }

    /// The change currently pending for a key
    pub fn pending(&self, key: &str) -> Option<&Delta> {
        self.pending.get(key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drain the buffer into an encoded batch
    ///
    /// Each key's full value is rebuilt from the registry's last decoded
    /// record (or the object's type tag if there is none). The buffer is
    /// empty afterwards, even if encoding fails.
    pub fn flush(&mut self, objects: &ObjectRegistry) -> SyncResult<RawSnapshot> {
        let pending = std::mem::take(&mut self.pending);
        let mut batch = RawSnapshot::new();

        for (key, delta) in pending {
            let type_tag = objects.get(&key).and_then(|handle| handle.type_tag());
            if !objects.contains(&key) {
                debug!(key = %key, "Flushing update for a key with no live object");
            }

            let fields = codec::rebuild(objects.state(&key), type_tag, delta);
            let encoded = codec::encode(&key, &fields)?;
            batch.insert(key, encoded);
        }

        Ok(batch)
    }
}
