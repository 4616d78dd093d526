//! Value-tree and identity primitives for the Formwork control engine
//!
//! Provides the building blocks every other Formwork crate leans on:
//! - [`KeyPath`] / [`StructuralKey`]: where a control sits in the tree, and
//!   the content-stable hash of that position
//! - [`Uid`] / [`UidPool`]: short random instance identifiers with a
//!   collision-checked issuing scope
//! - metadata-key handling for round-trip identification of array entries
//! - the value existence predicate used by aggregation and reconciliation
//!
//! The value tree itself is plain JSON ([`serde_json::Value`] with insertion
//! order preserved), so everything a control computes can cross a storage or
//! network boundary unchanged.

pub mod exists;
pub mod key;
pub mod meta;
pub mod uid;

pub use exists::{child_slice, normalize_missing, value_exists};
pub use key::{KeyPath, Segment, StructuralKey};
pub use meta::{entry_name, entry_uid, inject_metadata, is_meta_key, strip_metadata};
pub use meta::{META_KEY, META_NAME, META_UID};
pub use uid::{Uid, UidPool};

/// The JSON value type flowing through control trees.
pub type Value = serde_json::Value;

/// Ordered JSON object map (insertion order preserved).
pub type Map = serde_json::Map<String, Value>;
