//! Inventory persistence.
//!
//! Stops are loaded when their first request arrives and written back on
//! explicit save or when the editor closes. Two backends exist: an in-memory
//! map for tests and ephemeral servers, and one JSON file per stop.
//!
//! ## Atomic Writes
//!
//! The file backend writes to `<stop>.json.tmp` first and renames it over the
//! target, so a crash never leaves a half-written inventory behind.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::error::Result;
use crate::model::ItemInstance;
use crate::types::RoomId;

/// Persisted form of a stop inventory.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoredInventory {
    #[serde(default)]
    pub items_by_room: BTreeMap<RoomId, Vec<ItemInstance>>,
    #[serde(default)]
    #[schema(value_type = Vec<u32>)]
    pub displayed_rooms: BTreeSet<RoomId>,
    /// Flat list of all rows, kept for clients that read it directly
    #[serde(default)]
    pub inventory_items: Vec<ItemInstance>,
}

/// Storage backend for stop inventories.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Loads a stop, `None` if it was never saved.
    async fn load_inventory(&self, stop_id: &str) -> Result<Option<StoredInventory>>;

    /// Saves a stop, replacing what was stored before.
    async fn save_inventory(&self, stop_id: &str, inventory: &StoredInventory) -> Result<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Keeps inventories in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inventories: RwLock<HashMap<String, StoredInventory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn load_inventory(&self, stop_id: &str) -> Result<Option<StoredInventory>> {
        Ok(self.inventories.read().await.get(stop_id).cloned())
    }

    async fn save_inventory(&self, stop_id: &str, inventory: &StoredInventory) -> Result<()> {
        self.inventories
            .write()
            .await
            .insert(stop_id.to_string(), inventory.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Stores each stop as `<dir>/<stop>.json`.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Creates the store. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path of a stop. Characters outside `[A-Za-z0-9_-]` become `_`.
    pub fn path_for(&self, stop_id: &str) -> PathBuf {
        let mut file_name: String = stop_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if file_name.is_empty() {
            file_name.push('_');
        }
        file_name.push_str(".json");
        self.dir.join(file_name)
    }
}

#[async_trait]
impl InventoryStore for JsonFileStore {
    async fn load_inventory(&self, stop_id: &str) -> Result<Option<StoredInventory>> {
        let path = self.path_for(stop_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let inventory = serde_json::from_str(&raw)?;
        tracing::debug!(stop = stop_id, path = %path.display(), "inventory loaded");
        Ok(Some(inventory))
    }

    async fn save_inventory(&self, stop_id: &str, inventory: &StoredInventory) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(stop_id);
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(inventory)?;

        tokio::fs::write(&tmp_path, body).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        tracing::debug!(stop = stop_id, path = %path.display(), "inventory saved");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json-file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::ItemConfig;

    fn sample() -> StoredInventory {
        let catalog = Catalog::builtin();
        let desk = catalog.by_name("Desk").expect("desk in catalog");
        let item = ItemInstance::from_catalog(desk, 4, ItemConfig::default(), 2);

        let mut items_by_room = BTreeMap::new();
        items_by_room.insert(4, vec![item.clone()]);
        StoredInventory {
            items_by_room,
            displayed_rooms: [4, 13].into_iter().collect(),
            inventory_items: vec![item],
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.load_inventory("stop-1").await.unwrap().is_none());

        let inventory = sample();
        store.save_inventory("stop-1", &inventory).await.unwrap();
        assert_eq!(store.load_inventory("stop-1").await.unwrap(), Some(inventory));
        assert!(store.load_inventory("stop-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_writes_camel_case_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("stops"));
        let inventory = sample();

        store.save_inventory("stop-1", &inventory).await.unwrap();

        let raw = std::fs::read_to_string(store.path_for("stop-1")).unwrap();
        assert!(raw.contains("\"itemsByRoom\""));
        assert!(raw.contains("\"displayedRooms\""));
        assert!(raw.contains("\"inventoryItems\""));
        assert!(raw.contains("\"groupingKey\""));

        let loaded = store.load_inventory("stop-1").await.unwrap();
        assert_eq!(loaded, Some(inventory));
        assert!(!store.path_for("stop-1").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_missing_stop_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_inventory("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn file_store_reports_corrupt_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path());
        std::fs::write(store.path_for("broken"), "{ nope").unwrap();
        assert!(store.load_inventory("broken").await.is_err());
    }

    #[test]
    fn stop_ids_are_sanitised() {
        let store = JsonFileStore::new("/data");
        assert_eq!(store.path_for("../etc/passwd"), PathBuf::from("/data/___etc_passwd.json"));
        assert_eq!(store.path_for("stop-42_a"), PathBuf::from("/data/stop-42_a.json"));
        assert_eq!(store.path_for(""), PathBuf::from("/data/_.json"));
    }
}
