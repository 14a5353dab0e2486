//! Key-value persistence port (driven/secondary port)
//!
//! The filesystem layer persists a handful of small JSON documents: the last
//! directory tree per location, the "local data changed" flag, the trash size
//! and the list of configured locations.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Values are `serde_json::Value`; typed access goes through
//!   [`KeyValueStoreExt`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// Minimal persistent key-value store
#[async_trait]
pub trait IKeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` when the key is absent
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>>;

    /// Inserts or replaces the value stored under `key`
    async fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()>;

    /// Removes `key`; removing an absent key is not an error
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Typed helpers over [`IKeyValueStore`]
#[async_trait]
pub trait KeyValueStoreExt: IKeyValueStore {
    /// Reads and deserializes the value under `key`
    async fn get_json<V>(&self, key: &str) -> anyhow::Result<Option<V>>
    where
        V: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serializes and stores `value` under `key`
    async fn set_json<V>(&self, key: &str, value: &V) -> anyhow::Result<()>
    where
        V: Serialize + Sync,
    {
        self.set(key, serde_json::to_value(value)?).await
    }
}

impl<T: IKeyValueStore + ?Sized> KeyValueStoreExt for T {}

/// Key layout shared by every component that touches the store
pub mod keys {
    use crate::domain::LocationId;

    /// List of configured [`SyncLocation`](crate::domain::SyncLocation)s
    pub const SYNC_LOCATIONS: &str = "syncLocations";

    /// User preference: exclude dot files and dot folders from snapshots
    pub const EXCLUDE_DOT: &str = "excludeDot";

    /// Last persisted directory tree of a location
    pub fn local_tree(location: &LocationId) -> String {
        format!("localTree:{location}")
    }

    /// Whether local data changed since the last persisted tree
    pub fn local_data_changed(location: &LocationId) -> String {
        format!("localDataChanged:{location}")
    }

    /// Bytes currently held in the location's trash directory
    pub fn local_trash_size(location: &LocationId) -> String {
        format!("localTrashSize:{location}")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;
    use crate::domain::LocationId;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, serde_json::Value>>);

    #[async_trait]
    impl IKeyValueStore for MapStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
            Ok(self.0.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
            self.0.lock().unwrap().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> anyhow::Result<()> {
            self.0.lock().unwrap().remove(key);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = MapStore::default();
        store.set_json("n", &42u64).await.unwrap();
        assert_eq!(store.get_json::<u64>("n").await.unwrap(), Some(42));
        assert_eq!(store.get_json::<u64>("missing").await.unwrap(), None);

        store.set_json("s", &"text").await.unwrap();
        assert!(store.get_json::<u64>("s").await.is_err());
    }

    #[tokio::test]
    async fn test_typed_helpers_through_trait_object() {
        let store: Box<dyn IKeyValueStore> = Box::new(MapStore::default());
        store.set_json("flag", &true).await.unwrap();
        assert_eq!(store.get_json::<bool>("flag").await.unwrap(), Some(true));
    }

    #[test]
    fn test_key_layout() {
        let id: LocationId = "6f1c2b1e-7d2a-4c1e-9a7b-2f3d4e5f6a7b".parse().unwrap();
        assert_eq!(
            keys::local_tree(&id),
            "localTree:6f1c2b1e-7d2a-4c1e-9a7b-2f3d4e5f6a7b"
        );
        assert!(keys::local_data_changed(&id).starts_with("localDataChanged:"));
        assert!(keys::local_trash_size(&id).starts_with("localTrashSize:"));
    }
}
