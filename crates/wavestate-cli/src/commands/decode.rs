//! Decode command handler

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value as Json;

use wavestate_core::codec::{Parsed, Resolve};
use wavestate_core::{ObjectHandle, Participant, Stateful};

use crate::output::Output;

/// One key of a decoded snapshot
#[derive(Debug, Clone, Serialize)]
pub struct DecodedEntry {
    pub key: String,
    pub type_tag: Option<String>,
    /// "object" or "scalar"
    pub shape: &'static str,
    pub value: Json,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Resolves references against the keys of the snapshot being decoded
struct SnapshotTargets<'a> {
    snapshot: &'a BTreeMap<String, String>,
    participants: &'a [Participant],
}

impl Resolve for SnapshotTargets<'_> {
    fn resolve_object(&self, key: &str) -> Option<ObjectHandle> {
        self.snapshot
            .get(key)
            .filter(|raw| !raw.is_empty())
            .map(|_| ObjectHandle::new(key, None, Box::new(Stateful)))
    }

    fn resolve_participant(&self, token: &str) -> Option<Participant> {
        self.participants.iter().find(|p| p.id == token).cloned()
    }
}

/// Decode a snapshot file and print every key
pub fn run(snapshot: &Path, participants: Option<&Path>, output: &Output) -> Result<()> {
    let content = std::fs::read_to_string(snapshot)
        .with_context(|| format!("Failed to read snapshot: {:?}", snapshot))?;
    let snapshot = parse_snapshot(&content)
        .with_context(|| format!("Failed to parse snapshot: {:?}", snapshot))?;

    let participants = match participants {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read participants: {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse participants: {:?}", path))?
        }
        None => Vec::new(),
    };

    output.print_decoded(&decode_snapshot(&snapshot, &participants));
    Ok(())
}

/// Read a snapshot file: a JSON object of key to encoded string or record
pub fn parse_snapshot(content: &str) -> Result<BTreeMap<String, String>> {
    let entries: BTreeMap<String, Json> =
        serde_json::from_str(content).context("Snapshot must be a JSON object")?;
    Ok(entries
        .into_iter()
        .map(|(key, value)| {
            let raw = match value {
                Json::String(raw) => raw,
                other => other.to_string(),
            };
            (key, raw)
        })
        .collect())
}

/// Decode every live key of a snapshot
pub fn decode_snapshot(
    snapshot: &BTreeMap<String, String>,
    participants: &[Participant],
) -> Vec<DecodedEntry> {
    let targets = SnapshotTargets {
        snapshot,
        participants,
    };

    snapshot
        .iter()
        .filter(|(_, raw)| !raw.is_empty())
        .map(|(key, raw)| match Parsed::parse(key, raw) {
            Ok(parsed) => {
                let type_tag = parsed.type_tag().map(str::to_string);
                let shape = if parsed.is_scalar() { "scalar" } else { "object" };
                let decoded = parsed.resolve(&targets);
                DecodedEntry {
                    key: key.clone(),
                    type_tag,
                    shape,
                    value: serde_json::to_value(&decoded.fields).unwrap_or(Json::Null),
                    unresolved: decoded.unresolved.iter().map(ToString::to_string).collect(),
                    error: None,
                }
            }
            Err(e) => DecodedEntry {
                key: key.clone(),
                type_tag: None,
                shape: "object",
                value: Json::Null,
                unresolved: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect()
}
