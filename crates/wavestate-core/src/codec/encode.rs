//! Encoding of outgoing values

use crate::delta::Delta;
use crate::error::{SyncError, SyncResult};
use crate::value::{keys, Fields, Value};

/// Rebuild the full record for a key from its pending changes
///
/// A field delta is overlaid on the last decoded record, or on a fresh
/// record stamped with `type_tag` if the key was never decoded. Overlaying
/// fields makes the record object-shaped, so a previous `_value` is dropped.
/// A scalar delta always produces `{"_proto": tag, "_value": value}`. The
/// empty default tag is never written.
pub fn rebuild(previous: Option<&Fields>, type_tag: Option<&str>, pending: Delta) -> Fields {
    match pending {
        Delta::Fields(changes) => {
            let mut fields = match previous {
                Some(previous) => previous.clone(),
                None => tagged(type_tag),
            };
            fields.remove(keys::VALUE);

            for (field, change) in changes {
                match change {
                    Some(value) => {
                        fields.insert(field, value);
                    }
                    None => {
                        fields.remove(&field);
                    }
                }
            }
            fields
        }
        Delta::Scalar(value) => {
            let mut fields = tagged(type_tag);
            fields.insert(keys::VALUE.to_string(), value);
            fields
        }
    }
}

fn tagged(type_tag: Option<&str>) -> Fields {
    let mut fields = Fields::new();
    if let Some(tag) = type_tag.filter(|tag| !tag.is_empty()) {
        fields.insert(keys::PROTO.to_string(), Value::from(tag));
    }
    fields
}

/// Encode a record to its wire text
pub fn encode(key: &str, fields: &Fields) -> SyncResult<String> {
    serde_json::to_string(fields).map_err(|source| SyncError::Encode {
        key: key.to_string(),
        source,
    })
}
