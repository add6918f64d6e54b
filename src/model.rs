//! Data models for room-by-room inventory.
//!
//! This module defines the fundamental data structures:
//! - `ItemInstance`: One configured catalog item placed in a room, with a count
//! - `ItemConfig`: The user-editable configuration that feeds the grouping key
//! - `ItemPatch`: A partial edit applied to an existing instance
//!
//! Field names serialize in camelCase so stored inventories stay readable by
//! the web client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::{CatalogId, CatalogItem};
use crate::grouping::compute_grouping_key;
use crate::types::{RoomId, Weighted, parse_measure, validation};

/// Packing material tag -> quantity.
pub type PackingNeeds = BTreeMap<String, u32>;

/// Validation error for item data.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid measurement: {0}")]
    InvalidMeasure(String),
    #[error("Invalid link: {0}")]
    InvalidLink(String),
    #[error("Invalid count: {0}")]
    InvalidCount(String),
}

/// One concrete placement of a catalog item in a room.
///
/// Instances with equal `grouping_key` in the same room are merged into one
/// row whose `count` carries the quantity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemInstance {
    pub id: String,
    pub furniture_item_id: CatalogId,
    pub room_id: RoomId,
    pub name: String,
    #[serde(default)]
    pub image_name: String,
    #[serde(default)]
    pub letters: Vec<String>,
    #[serde(default)]
    pub search: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cuft: String,
    #[serde(default)]
    pub lbs: String,
    #[serde(default, alias = "packingNeeds")]
    #[schema(value_type = BTreeMap<String, u32>)]
    pub packing_needs_counts: PackingNeeds,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    #[serde(default)]
    pub camera_images: Vec<String>,
    #[serde(default)]
    pub auto_added: bool,
    #[serde(default)]
    pub grouping_key: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl ItemInstance {
    /// Creates a new instance from a catalog entry.
    ///
    /// Catalog fields (`name`, `imageName`, `letters`, `search`) are copied,
    /// a fresh id is assigned and the grouping key is computed.
    ///
    /// # Parameters
    /// * `item` - The catalog entry
    /// * `room_id` - Target room
    /// * `config` - Tags, notes, measurements, packing and images
    /// * `count` - Initial quantity
    pub fn from_catalog(
        item: &CatalogItem,
        room_id: RoomId,
        config: ItemConfig,
        count: u32,
    ) -> Self {
        let mut instance = Self {
            id: Uuid::new_v4().to_string(),
            furniture_item_id: item.id,
            room_id,
            name: item.name.clone(),
            image_name: item.image_name.clone(),
            letters: item.letters.clone(),
            search: item.search,
            tags: Vec::new(),
            notes: String::new(),
            cuft: String::new(),
            lbs: String::new(),
            packing_needs_counts: PackingNeeds::new(),
            link: None,
            uploaded_images: Vec::new(),
            camera_images: Vec::new(),
            auto_added: false,
            grouping_key: String::new(),
            count,
        };
        instance.apply_config(config);
        instance
    }

    /// Marks the instance as synthesized by the auto-box engine.
    pub fn auto_added(mut self) -> Self {
        self.auto_added = true;
        self
    }

    /// Recomputes `grouping_key` from the current configuration.
    pub fn refresh_grouping_key(&mut self) {
        self.grouping_key = compute_grouping_key(self);
    }

    /// Replaces every key-bearing field and recomputes the key.
    fn apply_config(&mut self, config: ItemConfig) {
        self.tags = config.tags.unwrap_or_default();
        self.notes = config.notes;
        self.cuft = config.cuft;
        self.lbs = config.lbs;
        self.packing_needs_counts = config.packing_needs;
        self.link = config.link;
        self.uploaded_images = config.uploaded_images;
        self.camera_images = config.camera_images;
        self.refresh_grouping_key();
    }

    /// Applies a partial edit and recomputes the grouping key.
    ///
    /// # Returns
    /// `true` if any field changed
    pub fn apply_patch(&mut self, patch: ItemPatch) -> bool {
        let before = self.clone();

        if let Some(room_id) = patch.room_id {
            self.room_id = room_id;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(notes) = patch.notes {
            self.notes = notes;
        }
        if let Some(cuft) = patch.cuft {
            self.cuft = cuft;
        }
        if let Some(lbs) = patch.lbs {
            self.lbs = lbs;
        }
        if let Some(packing) = patch.packing_needs {
            self.packing_needs_counts = packing;
        }
        if let Some(link) = patch.link {
            self.link = if link.trim().is_empty() { None } else { Some(link) };
        }
        if let Some(images) = patch.uploaded_images {
            self.uploaded_images = images;
        }
        if let Some(images) = patch.camera_images {
            self.camera_images = images;
        }
        self.refresh_grouping_key();

        *self != before
    }

    /// Parsed cubic feet (0 when unset or invalid).
    pub fn cuft_value(&self) -> f64 {
        parse_measure(&self.cuft)
    }
}

impl Weighted for ItemInstance {
    fn lbs(&self) -> f64 {
        parse_measure(&self.lbs)
    }

    fn room_id(&self) -> RoomId {
        self.room_id
    }
}

/// The configuration part of an item that feeds the grouping key.
///
/// `tags: None` means "not chosen", letting the caller fill in room defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "tags": ["blanket_wrapped", "disassembly"],
    "notes": "scratch on left arm",
    "lbs": "120",
    "packingNeeds": { "mattress_bag_king": 1 }
}))]
pub struct ItemConfig {
    #[serde(default)]
    #[schema(nullable = true)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub cuft: String,
    #[serde(default)]
    pub lbs: String,
    #[serde(default, alias = "packingNeedsCounts")]
    #[schema(value_type = BTreeMap<String, u32>)]
    pub packing_needs: PackingNeeds,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub uploaded_images: Vec<String>,
    #[serde(default)]
    pub camera_images: Vec<String>,
}

impl ItemConfig {
    /// Checks measurements and link.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_measures_and_link(&self.cuft, &self.lbs, self.link.as_deref())
    }
}

/// A partial edit of an item instance. Absent fields stay untouched.
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub cuft: Option<String>,
    #[serde(default)]
    pub lbs: Option<String>,
    #[serde(default, alias = "packingNeedsCounts")]
    #[schema(value_type = Option<BTreeMap<String, u32>>)]
    pub packing_needs: Option<PackingNeeds>,
    /// Empty string clears the link.
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub uploaded_images: Option<Vec<String>>,
    #[serde(default)]
    pub camera_images: Option<Vec<String>>,
}

impl ItemPatch {
    /// Checks the measurements and link that are present in the patch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_measures_and_link(
            self.cuft.as_deref().unwrap_or(""),
            self.lbs.as_deref().unwrap_or(""),
            self.link.as_deref(),
        )
    }
}

fn validate_measures_and_link(
    cuft: &str,
    lbs: &str,
    link: Option<&str>,
) -> Result<(), ValidationError> {
    validation::validate_measure(cuft, "Cuft").map_err(ValidationError::InvalidMeasure)?;
    validation::validate_measure(lbs, "Lbs").map_err(ValidationError::InvalidMeasure)?;
    if let Some(link) = link {
        validation::validate_link(link).map_err(ValidationError::InvalidLink)?;
    }
    Ok(())
}
