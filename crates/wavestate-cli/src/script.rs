//! Replay scripts
//!
//! A script describes a session against an in-memory host: the initial
//! shared state, the participants, and a list of steps. Every object the
//! engine creates is a journal that records its hook calls, so the result
//! of a replay is the ordered list of what the application would have
//! observed.
//!
//! ```json
//! {
//!   "participants": [{"id": "me"}],
//!   "viewer": "me",
//!   "initial": {"k1": {"_proto": "Note", "text": "hi"}},
//!   "steps": [
//!     {"type": "participants"},
//!     {"type": "submit", "key": "k1", "set": {"text": "hello"}},
//!     {"type": "flush"}
//!   ]
//! }
//! ```
//!
//! Values may be given as JSON objects or as already-encoded strings.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::info;

use wavestate_core::types::DEFAULT_TAG;
use wavestate_core::value::keys;
use wavestate_core::{
    Delta, Engine, EngineConfig, Host, MemoryHost, Participant, RawSnapshot, State, StateObject,
    Value,
};

/// A replay script
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    #[serde(default)]
    pub participants: Vec<Participant>,
    /// Identity token of the local participant
    #[serde(default)]
    pub viewer: Option<String>,
    #[serde(default)]
    pub initial: BTreeMap<String, Json>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One step of a replay
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Replace the whole shared state and notify
    Snapshot { state: BTreeMap<String, Json> },
    /// Write one key remotely and notify
    Set { key: String, value: Json },
    /// Delete one key remotely and notify
    Delete { key: String },
    /// Report the participant list (the script's list if omitted)
    Participants {
        #[serde(default)]
        participants: Option<Vec<Participant>>,
    },
    /// Queue a local change to a key
    Submit {
        key: String,
        /// Type used if the key has no live object yet
        #[serde(default)]
        type_tag: Option<String>,
        #[serde(default)]
        set: Map<String, Json>,
        #[serde(default)]
        unset: Vec<String>,
        /// Replaces the whole value when present
        #[serde(default)]
        scalar: Option<Json>,
    },
    /// Send pending changes; the host echoes them as a snapshot change
    Flush,
}

/// Something the application observed during a replay
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Update {
        key: String,
        changed: Json,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        removed: Vec<String>,
        state: Json,
    },
    Remove {
        key: String,
    },
    Participants {
        count: usize,
    },
    Flushed {
        entries: usize,
    },
    FlushFailed {
        error: String,
    },
}

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct Replay {
    pub events: Vec<ReplayEvent>,
    pub ready: bool,
    pub viewer: Option<Participant>,
    pub objects: usize,
    pub final_state: RawSnapshot,
}

type Journal = Rc<RefCell<Vec<ReplayEvent>>>;

/// Object that records its hook calls into the replay journal
struct JournalObject {
    key: String,
    journal: Journal,
}

impl StateObject for JournalObject {
    fn bind(&mut self, id: &str) {
        self.key = id.to_string();
    }

    fn update(&mut self, delta: &Delta, state: &State) {
        let (changed, removed) = describe_delta(delta);
        let state = match state {
            State::Fields(fields) => to_json(fields),
            State::Scalar(value) => to_json(value),
        };
        self.journal.borrow_mut().push(ReplayEvent::Update {
            key: self.key.clone(),
            changed,
            removed,
            state,
        });
    }

    fn remove(&mut self) {
        self.journal
            .borrow_mut()
            .push(ReplayEvent::Remove { key: self.key.clone() });
    }
}

impl Script {
    /// Load a script from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse script: {:?}", path))
    }

    /// Every `_proto` tag mentioned anywhere in the script
    pub fn type_tags(&self) -> BTreeSet<String> {
        let mut tags: BTreeSet<String> = self.initial.values().filter_map(tag_of).collect();
        for step in &self.steps {
            match step {
                Step::Snapshot { state } => tags.extend(state.values().filter_map(tag_of)),
                Step::Set { value, .. } => tags.extend(tag_of(value)),
                Step::Submit {
                    type_tag: Some(tag),
                    ..
                } => {
                    tags.insert(tag.clone());
                }
                _ => {}
            }
        }
        tags
    }

    /// Run the script against a fresh engine
    pub fn run(self, config: EngineConfig) -> Result<Replay> {
        let tags = self.type_tags();
        let Script {
            participants,
            viewer,
            initial,
            steps,
        } = self;

        let mut host = MemoryHost::with_state(encode_state(initial));
        host.set_participants(participants.clone());
        if let Some(viewer) = viewer {
            host.set_viewer(viewer);
        }

        let journal: Journal = Rc::new(RefCell::new(Vec::new()));
        let mut engine = Engine::load(host, config).context("Failed to start engine")?;
        for tag in tags.iter().map(String::as_str).chain([DEFAULT_TAG]) {
            let shared = journal.clone();
            engine.register_type(tag, move || JournalObject {
                key: String::new(),
                journal: shared.clone(),
            });
        }

        let shared = journal.clone();
        engine.set_participant_callback(move |list| {
            shared
                .borrow_mut()
                .push(ReplayEvent::Participants { count: list.len() })
        });

        let step_count = steps.len();
        for step in steps {
            apply_step(&mut engine, step, &participants, &journal);
        }
        info!(steps = step_count, objects = engine.objects().len(), "Replay finished");

        let events = std::mem::take(&mut *journal.borrow_mut());
        Ok(Replay {
            events,
            ready: engine.is_ready(),
            viewer: engine.viewer().cloned(),
            objects: engine.objects().len(),
            final_state: engine.host().read_snapshot().unwrap_or_default(),
        })
    }
}

fn apply_step(
    engine: &mut Engine<MemoryHost>,
    step: Step,
    default_participants: &[Participant],
    journal: &Journal,
) {
    match step {
        Step::Snapshot { state } => {
            engine.host_mut().replace(encode_state(state));
            engine.handle_snapshot_change();
        }
        Step::Set { key, value } => {
            engine.host_mut().set(key, encode_value(value));
            engine.handle_snapshot_change();
        }
        Step::Delete { key } => {
            engine.host_mut().delete(&key);
            engine.handle_snapshot_change();
        }
        Step::Participants { participants } => {
            let list = participants.unwrap_or_else(|| default_participants.to_vec());
            engine.host_mut().set_participants(list.clone());
            engine.handle_participants_change(&list);
        }
        Step::Submit {
            key,
            type_tag,
            set,
            unset,
            scalar,
        } => {
            let object = engine
                .object(&key)
                .unwrap_or_else(|| engine.types().instantiate(key.as_str(), type_tag.as_deref()));
            let delta = match scalar {
                Some(value) => Delta::Scalar(Value::from(value)),
                None => {
                    let delta = set
                        .into_iter()
                        .fold(Delta::default(), |delta, (field, value)| {
                            delta.with(field, Value::from(value))
                        });
                    unset
                        .into_iter()
                        .fold(delta, |delta, field| delta.without(field))
                }
            };
            engine.submit_delta(&object, delta);
        }
        Step::Flush => match engine.send_updates() {
            Ok(entries) => {
                journal.borrow_mut().push(ReplayEvent::Flushed { entries });
                if entries > 0 {
                    engine.handle_snapshot_change();
                }
            }
            Err(e) => journal
                .borrow_mut()
                .push(ReplayEvent::FlushFailed { error: e.to_string() }),
        },
    }
}

/// Strings are taken as already encoded, anything else is encoded
fn encode_value(value: Json) -> String {
    match value {
        Json::String(raw) => raw,
        other => other.to_string(),
    }
}

fn encode_state(state: BTreeMap<String, Json>) -> RawSnapshot {
    state
        .into_iter()
        .map(|(key, value)| (key, encode_value(value)))
        .collect()
}

fn tag_of(value: &Json) -> Option<String> {
    let parsed;
    let value = match value {
        Json::String(raw) => {
            parsed = serde_json::from_str::<Json>(raw).ok()?;
            &parsed
        }
        other => other,
    };
    value.get(keys::PROTO)?.as_str().map(str::to_string)
}

fn to_json<T: Serialize>(value: &T) -> Json {
    serde_json::to_value(value).unwrap_or(Json::Null)
}

fn describe_delta(delta: &Delta) -> (Json, Vec<String>) {
    match delta {
        Delta::Scalar(value) => (to_json(value), Vec::new()),
        Delta::Fields(changes) => {
            let mut changed = Map::new();
            let mut removed = Vec::new();
            for (field, change) in changes {
                match change {
                    Some(value) => {
                        changed.insert(field.clone(), to_json(value));
                    }
                    None => removed.push(field.clone()),
                }
            }
            (Json::Object(changed), removed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn script(value: Json) -> Script {
        serde_json::from_value(value).unwrap()
    }

    fn updates(replay: &Replay) -> Vec<&ReplayEvent> {
        replay
            .events
            .iter()
            .filter(|e| matches!(e, ReplayEvent::Update { .. }))
            .collect()
    }

    #[test]
    fn test_nothing_happens_before_participants() {
        let replay = script(json!({
            "initial": {"k1": {"_proto": "Foo", "x": 1}},
            "steps": [{"type": "set", "key": "k1", "value": {"_proto": "Foo", "x": 2}}]
        }))
        .run(EngineConfig::default())
        .unwrap();

        assert!(!replay.ready);
        assert!(replay.events.is_empty());
        assert_eq!(replay.objects, 0);
    }

    #[test]
    fn test_deferred_snapshots_replay_once() {
        let replay = script(json!({
            "participants": [{"id": "me"}],
            "viewer": "me",
            "initial": {"k1": {"_proto": "Foo", "x": 1}},
            "steps": [
                {"type": "set", "key": "k1", "value": {"_proto": "Foo", "x": 2}},
                {"type": "set", "key": "k1", "value": {"_proto": "Foo", "x": 3}},
                {"type": "participants"}
            ]
        }))
        .run(EngineConfig::default())
        .unwrap();

        assert!(replay.ready);
        assert_eq!(replay.viewer, Some(Participant::new("me")));
        assert_eq!(
            updates(&replay),
            vec![&ReplayEvent::Update {
                key: "k1".to_string(),
                changed: json!({"x": 3}),
                removed: vec![],
                state: json!({"x": 3}),
            }]
        );
        assert_eq!(
            replay.events.last(),
            Some(&ReplayEvent::Participants { count: 1 })
        );
    }

    #[test]
    fn test_flush_submits_and_echoes() {
        let replay = script(json!({
            "initial": {
                "a": {"_proto": "Foo", "x": 1},
                "b": "{\"_proto\":\"Foo\",\"x\":2}"
            },
            "steps": [
                {"type": "participants"},
                {"type": "submit", "key": "a", "set": {"x": 10}},
                {"type": "submit", "key": "b", "unset": ["x"], "set": {"y": true}},
                {"type": "flush"}
            ]
        }))
        .run(EngineConfig::default())
        .unwrap();

        assert!(replay
            .events
            .contains(&ReplayEvent::Flushed { entries: 2 }));
        assert_eq!(replay.final_state["a"], r#"{"_proto":"Foo","x":10}"#);
        assert_eq!(replay.final_state["b"], r#"{"_proto":"Foo","y":true}"#);

        assert_eq!(
            replay.events.last(),
            Some(&ReplayEvent::Update {
                key: "b".to_string(),
                changed: json!({"y": true}),
                removed: vec!["x".to_string()],
                state: json!({"y": true}),
            })
        );
    }

    #[test]
    fn test_local_key_gets_requested_type() {
        let replay = script(json!({
            "steps": [
                {"type": "participants"},
                {"type": "submit", "key": "new", "type_tag": "Counter", "scalar": 7},
                {"type": "flush"}
            ]
        }))
        .run(EngineConfig::default())
        .unwrap();

        assert_eq!(replay.final_state["new"], r#"{"_proto":"Counter","_value":7}"#);
        assert!(replay.events.contains(&ReplayEvent::Update {
            key: "new".to_string(),
            changed: json!(7),
            removed: vec![],
            state: json!(7),
        }));
    }

    #[test]
    fn test_delete_and_snapshot_steps_remove_objects() {
        let replay = script(json!({
            "initial": {"a": {"x": 1}, "b": {"x": 2}, "c": {"x": 3}},
            "steps": [
                {"type": "participants"},
                {"type": "delete", "key": "a"},
                {"type": "snapshot", "state": {"c": {"x": 3}}}
            ]
        }))
        .run(EngineConfig::default())
        .unwrap();

        let removed: Vec<_> = replay
            .events
            .iter()
            .filter_map(|e| match e {
                ReplayEvent::Remove { key } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(removed, vec!["a", "b"]);
        assert_eq!(replay.objects, 1);
    }

    #[test]
    fn test_type_tags_collected_from_every_source() {
        let script = script(json!({
            "initial": {"a": {"_proto": "A"}, "b": "{\"_proto\":\"B\"}"},
            "steps": [
                {"type": "snapshot", "state": {"c": {"_proto": "C"}}},
                {"type": "set", "key": "d", "value": {"_proto": "D"}},
                {"type": "submit", "key": "e", "type_tag": "E"}
            ]
        }));

        let tags: Vec<_> = script.type_tags().into_iter().collect();
        assert_eq!(tags, vec!["A", "B", "C", "D", "E"]);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("script.json");
        std::fs::write(&path, r#"{"steps": [{"type": "flush"}]}"#).unwrap();

        let script = Script::load(&path).unwrap();
        assert_eq!(script.steps.len(), 1);

        std::fs::write(&path, r#"{"unknown": 1}"#).unwrap();
        assert!(Script::load(&path).is_err());
    }
}
