//! The blueprint: a compact, append-only index over a JSON document.
//!
//! - [`varint`]: variable-width integer cells readable forward and backward.
//! - [`keys`]: fixed- and dynamic-length key storages that widen on overflow.
//! - [`blueprint`]: the binary log of keys and key lists, with memory or temp-file backing.

pub mod blueprint;
pub mod keys;
mod store;
pub mod varint;

pub use blueprint::{BlueprintConfig, BlueprintReader, BlueprintSource, BlueprintWriter};
pub use keys::{DynamicKeys, FixedKeys, Key, KeyWidth, NULL_KEY};
pub use store::BackingKind;
