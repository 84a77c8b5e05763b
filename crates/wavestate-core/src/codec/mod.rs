//! Wire codec
//!
//! Every key of the shared state holds one JSON document:
//!
//! - object-shaped: `{"_proto": <tag>, <field>: <value>, ...}`
//! - scalar-shaped: `{"_proto": <tag>, "_value": <scalar>}`
//!
//! Inside any value, `{"_id": <key>}` embeds a reference to another object
//! and `{"_pid": <token>}` a reference to a participant.
//!
//! Decoding happens in two passes: [`Parsed::parse`] builds the raw tree and
//! collects reference placeholders, [`Parsed::resolve`] substitutes live
//! targets and reports what could not be resolved.

mod decode;
mod encode;

pub use decode::{decode, Decoded, Parsed, Resolve};
pub use encode::{encode, rebuild};
