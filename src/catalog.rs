//! Furniture catalog.
//!
//! Item instances are created from catalog entries; the auto-box engine
//! resolves its box products here by name.

use std::path::Path;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::Result;
use crate::model::PackingNeeds;

/// Identifier of a catalog entry.
pub type CatalogId = u32;

/// A furniture or box product that can be placed in a room.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: CatalogId,
    pub name: String,
    #[serde(default)]
    pub image_name: String,
    /// Filter buckets shown in the item picker.
    #[serde(default)]
    pub letters: Vec<String>,
    #[serde(default = "default_search")]
    pub search: bool,
    /// Tags preselected when the item is added.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Packing materials preselected when the item is added.
    #[serde(default)]
    #[schema(value_type = std::collections::BTreeMap<String, u32>)]
    pub packing: PackingNeeds,
}

fn default_search() -> bool {
    true
}

impl CatalogItem {
    fn new(id: CatalogId, name: &str, image_name: &str, letters: &[&str], tags: &[&str]) -> Self {
        Self {
            id,
            name: name.to_string(),
            image_name: image_name.to_string(),
            letters: letters.iter().map(|l| l.to_string()).collect(),
            search: true,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            packing: PackingNeeds::new(),
        }
    }

    fn with_packing(mut self, material: &str, quantity: u32) -> Self {
        self.packing.insert(material.to_string(), quantity);
        self
    }
}

/// Lookup over the furniture catalog.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
}

impl Catalog {
    pub fn new(items: Vec<CatalogItem>) -> Self {
        Self { items }
    }

    /// Loads a catalog from a JSON array of items.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<CatalogItem> = serde_json::from_str(&raw)?;
        Ok(Self::new(items))
    }

    /// All catalog entries in catalog order.
    pub fn items(&self) -> &[CatalogItem] {
        &self.items
    }

    pub fn by_id(&self, id: CatalogId) -> Option<&CatalogItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Finds an entry by exact name, ignoring surrounding whitespace on both sides.
    pub fn by_name(&self, name: &str) -> Option<&CatalogItem> {
        let wanted = name.trim();
        self.items.iter().find(|item| item.name.trim() == wanted)
    }

    /// The catalog shipped with the service.
    pub fn builtin() -> Self {
        let items = vec![
            CatalogItem::new(1, "Sofa, 3 Cushion", "sofa_3_cushion.png", &["S"], &["blanket_wrapped"]),
            CatalogItem::new(2, "Loveseat", "loveseat.png", &["L"], &["blanket_wrapped"]),
            CatalogItem::new(3, "Armchair", "armchair.png", &["A", "C"], &["blanket_wrapped"]),
            CatalogItem::new(4, "Coffee Table", "coffee_table.png", &["C", "T"], &["blanket_wrapped"]),
            CatalogItem::new(5, "Dining Table", "dining_table.png", &["D", "T"], &["blanket_wrapped", "disassembly", "reassembly"]),
            CatalogItem::new(6, "Dining Chair", "dining_chair.png", &["D", "C"], &["blanket_wrapped"]),
            CatalogItem::new(7, "Bed, King", "bed_king.png", &["B"], &["disassembly", "reassembly"])
                .with_packing("mattress_bag_king", 1),
            CatalogItem::new(8, "Bed, Queen", "bed_queen.png", &["B"], &["disassembly", "reassembly"])
                .with_packing("mattress_bag_queen", 1),
            CatalogItem::new(9, "Dresser", "dresser.png", &["D"], &["blanket_wrapped"]),
            CatalogItem::new(10, "Nightstand", "nightstand.png", &["N"], &["blanket_wrapped"]),
            CatalogItem::new(11, "Bookcase", "bookcase.png", &["B"], &["blanket_wrapped"]),
            CatalogItem::new(12, "Desk", "desk.png", &["D"], &["blanket_wrapped"]),
            CatalogItem::new(13, "TV, Flat Screen", "tv_flat.png", &["T"], &["paper_blanket_wrapped"])
                .with_packing("tv_box", 1),
            CatalogItem::new(14, "Mirror", "mirror.png", &["M"], &["crating"])
                .with_packing("mirror_carton", 1),
            CatalogItem::new(15, "Piano, Upright", "piano_upright.png", &["P"], &["blanket_wrapped", "hoisting_origin"]),
            CatalogItem::new(16, "Refrigerator", "refrigerator.png", &["R", "A"], &["blanket_wrapped"]),
            CatalogItem::new(17, "Washer", "washer.png", &["W", "A"], &["blanket_wrapped"]),
            CatalogItem::new(18, "Dryer", "dryer.png", &["D", "A"], &["blanket_wrapped"]),
            CatalogItem::new(19, "Lamp, Floor", "lamp_floor.png", &["L"], &["paper_blanket_wrapped"]),
            CatalogItem::new(20, "Rug, Large", "rug_large.png", &["R"], &[]),
            CatalogItem::new(21, "Dishpack Box", "box_dishpack.png", &["B"], &["cp_packed_by_movers"]),
            CatalogItem::new(22, "Wardrobe Box", "box_wardrobe.png", &["B"], &["cp_packed_by_movers"]),
            CatalogItem::new(23, "Large Box", "box_large.png", &["B"], &["cp_packed_by_movers"]),
            CatalogItem::new(24, "Medium Box", "box_medium.png", &["B"], &["cp_packed_by_movers"]),
            CatalogItem::new(25, "Small Box", "box_small.png", &["B"], &["cp_packed_by_movers"]),
            CatalogItem::new(26, "Book Box", "box_book.png", &["B"], &["pbo_packed_by_owner"]),
            CatalogItem::new(27, "Mirror Carton", "box_mirror.png", &["B", "M"], &["cp_packed_by_movers"]),
        ];
        Self::new(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_matches_trimmed_names() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.by_name("Medium Box").map(|i| i.id), Some(24));
        assert_eq!(catalog.by_name("  Medium Box ").map(|i| i.id), Some(24));
        assert!(catalog.by_name("medium box").is_none());
        assert!(catalog.by_name("Medium").is_none());
    }

    #[test]
    fn by_name_trims_catalog_side_too() {
        let catalog = Catalog::new(vec![CatalogItem::new(1, " Small Box ", "", &[], &[])]);
        assert!(catalog.by_name("Small Box").is_some());
    }

    #[test]
    fn by_id_finds_items() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.by_id(7).map(|i| i.name.as_str()),
            Some("Bed, King")
        );
        assert!(catalog.by_id(9999).is_none());
    }

    #[test]
    fn builtin_ids_are_unique() {
        let catalog = Catalog::builtin();
        let mut ids: Vec<_> = catalog.items().iter().map(|i| i.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), catalog.items().len());
    }

    #[test]
    fn loads_catalog_from_json_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "name": "Chest", "packing": {"shrink_wrap": 1}}]"#,
        )
        .expect("write catalog");

        let catalog = Catalog::from_json_file(&path).expect("Should load catalog");
        let chest = catalog.by_name("Chest").expect("chest present");
        assert!(chest.search);
        assert_eq!(chest.packing.get("shrink_wrap"), Some(&1));
    }

    #[test]
    fn invalid_catalog_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "not json").expect("write catalog");
        assert!(Catalog::from_json_file(&path).is_err());
    }
}
