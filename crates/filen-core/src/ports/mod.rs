//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`IKeyValueStore`] - Persistence for trees, flags, trash sizes and locations
//! - [`IIssueSink`] - Fire-and-forget reporting of per-entry problems

pub mod issue_sink;
pub mod key_value_store;

pub use issue_sink::IIssueSink;
pub use key_value_store::{keys, IKeyValueStore, KeyValueStoreExt};
