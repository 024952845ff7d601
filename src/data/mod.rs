//! Tagged data model
//!
//! Every editable field in the graph carries a [`Value`]: a closed,
//! recursively-defined union of scalars, lists, keyed records, and media
//! payloads, each with a stable identity token and a free-form metadata bag.

pub mod value;
pub mod wire;

pub use value::{DataClass, MediaEncoding, MediaPayload, Metadata, Payload, Value, ValueId};
