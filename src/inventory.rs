//! Per-stop inventory state.
//!
//! A [`StopInventory`] owns everything the editor mutates for one stop: the
//! item instances per room, the set of displayed rooms and the auto-box
//! bookkeeping. Every mutation keeps the per-room grouping invariant (one row
//! per grouping key) and, when auto-box mode is on, reconciles the boxes
//! room afterwards.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use utoipa::ToSchema;

use crate::autobox::{
    AutoBoxConfig, AutoBoxState, BoxEvent, reconcile_boxes_with_progress, restore_state,
    shipment_weight,
};
use crate::catalog::{Catalog, CatalogId};
use crate::error::{Error, Result};
use crate::model::{ItemConfig, ItemInstance, ItemPatch, ValidationError};
use crate::store::StoredInventory;
use crate::tags::TagRules;
use crate::types::{BOXES_ROOM_ID, RoomId};

/// Read-only collaborators shared by all stops.
#[derive(Clone, Debug)]
pub struct InventoryContext {
    pub catalog: Catalog,
    pub rules: TagRules,
    pub auto_box: AutoBoxConfig,
}

impl InventoryContext {
    pub fn new(catalog: Catalog, rules: TagRules, auto_box: AutoBoxConfig) -> Self {
        Self {
            catalog,
            rules,
            auto_box,
        }
    }
}

impl Default for InventoryContext {
    /// Built-in catalog, standard tag rules and default auto-box settings.
    fn default() -> Self {
        Self::new(
            Catalog::builtin(),
            TagRules::standard(),
            AutoBoxConfig::default(),
        )
    }
}

/// Result of a mutation.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    /// The row the mutation ended up in, `None` if it was removed
    pub item: Option<ItemInstance>,
    /// Whether the instance was folded into an existing row
    pub merged: bool,
    /// Boxes added by the auto-box run after the mutation
    pub boxes_added: usize,
}

/// Weight and volume totals of a stop.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTotals {
    /// Shipment weight as used for box thresholds
    pub total_lbs: f64,
    /// Sum of `cuft * count` over all rows
    pub total_cuft: f64,
    /// Sum of counts over all rows
    pub item_count: u64,
    /// Sum of counts in the boxes room
    pub box_count: u64,
}

/// Editable inventory of a single stop.
#[derive(Clone, Debug)]
pub struct StopInventory {
    stop_id: String,
    items_by_room: BTreeMap<RoomId, Vec<ItemInstance>>,
    displayed_rooms: BTreeSet<RoomId>,
    auto_box: AutoBoxState,
    auto_boxes_enabled: bool,
}

impl StopInventory {
    /// Creates an empty inventory.
    pub fn new(stop_id: impl Into<String>, auto_boxes_enabled: bool) -> Self {
        Self {
            stop_id: stop_id.into(),
            items_by_room: BTreeMap::new(),
            displayed_rooms: BTreeSet::new(),
            auto_box: AutoBoxState::default(),
            auto_boxes_enabled,
        }
    }

    /// Restores an inventory from its stored form.
    ///
    /// The auto-box bookkeeping is not stored. It is rebuilt from the
    /// auto-added boxes found in the boxes room: bands they cover do not
    /// produce boxes a second time, bands they do not cover still do.
    pub fn from_snapshot(
        stop_id: impl Into<String>,
        snapshot: StoredInventory,
        ctx: &InventoryContext,
        auto_boxes_enabled: bool,
    ) -> Self {
        let mut items_by_room: BTreeMap<RoomId, Vec<ItemInstance>> = BTreeMap::new();
        for (room_id, items) in snapshot.items_by_room {
            for mut item in items {
                // Stored rows may come from older clients: trust the map key
                // and rebuild the key from the fields.
                item.room_id = room_id;
                item.refresh_grouping_key();
                if item.count == 0 {
                    continue;
                }
                insert_merged(items_by_room.entry(room_id).or_default(), item);
            }
        }
        items_by_room.retain(|_, items| !items.is_empty());

        let mut inventory = Self {
            stop_id: stop_id.into(),
            items_by_room,
            displayed_rooms: snapshot.displayed_rooms,
            auto_box: AutoBoxState::default(),
            auto_boxes_enabled,
        };

        inventory.auto_box = restore_state(&inventory.all_items(), &ctx.auto_box);
        inventory
    }

    /// Stored form of the inventory.
    pub fn snapshot(&self) -> StoredInventory {
        StoredInventory {
            items_by_room: self.items_by_room.clone(),
            displayed_rooms: self.displayed_rooms.clone(),
            inventory_items: self.all_items(),
        }
    }

    pub fn stop_id(&self) -> &str {
        &self.stop_id
    }

    pub fn auto_boxes_enabled(&self) -> bool {
        self.auto_boxes_enabled
    }

    pub fn auto_box_state(&self) -> &AutoBoxState {
        &self.auto_box
    }

    pub fn items_by_room(&self) -> &BTreeMap<RoomId, Vec<ItemInstance>> {
        &self.items_by_room
    }

    pub fn displayed_rooms(&self) -> &BTreeSet<RoomId> {
        &self.displayed_rooms
    }

    /// Rows of one room, empty if the room has none.
    pub fn room_items(&self, room_id: RoomId) -> &[ItemInstance] {
        self.items_by_room
            .get(&room_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All rows across rooms, in room order.
    pub fn all_items(&self) -> Vec<ItemInstance> {
        self.items_by_room.values().flatten().cloned().collect()
    }

    pub fn item(&self, item_id: &str) -> Option<&ItemInstance> {
        self.items_by_room
            .values()
            .flatten()
            .find(|item| item.id == item_id)
    }

    pub fn totals(&self, ctx: &InventoryContext) -> InventoryTotals {
        let items = self.all_items();
        InventoryTotals {
            total_lbs: shipment_weight(&items, &ctx.auto_box),
            total_cuft: items
                .iter()
                .map(|item| item.cuft_value() * f64::from(item.count))
                .sum(),
            item_count: items.iter().map(|item| u64::from(item.count)).sum(),
            box_count: self
                .room_items(BOXES_ROOM_ID)
                .iter()
                .map(|item| u64::from(item.count))
                .sum(),
        }
    }

    /// Adds `count` units of a catalog item to a room.
    ///
    /// When the configuration carries no tags, the room defaults of the
    /// catalog item are used (and its default packing, if none is given).
    /// A row with the same grouping key in the room absorbs the new units.
    pub fn add_item(
        &mut self,
        ctx: &InventoryContext,
        catalog_id: CatalogId,
        room_id: RoomId,
        mut config: ItemConfig,
        count: u32,
    ) -> Result<MutationOutcome> {
        if count == 0 {
            return Err(ValidationError::InvalidCount("count must be at least 1".to_string()).into());
        }
        config.validate()?;

        let product = ctx
            .catalog
            .by_id(catalog_id)
            .ok_or_else(|| Error::UnknownCatalogItem(catalog_id.to_string()))?;

        match &config.tags {
            Some(tags) => ctx.rules.validate_tags(tags)?,
            None => {
                let defaults = ctx.rules.default_tags_for(product, room_id);
                config.tags = Some(defaults.tags);
                if config.packing_needs.is_empty() {
                    config.packing_needs = defaults.packing_needs;
                }
            }
        }

        let instance = ItemInstance::from_catalog(product, room_id, config, count);
        let room = self.items_by_room.entry(room_id).or_default();
        let (index, merged) = insert_merged(room, instance);
        let item = room[index].clone();
        self.displayed_rooms.insert(room_id);

        tracing::debug!(
            stop = %self.stop_id,
            room_id,
            item = %item.name,
            merged,
            count = item.count,
            "item added"
        );

        let boxes_added = self.after_mutation(ctx);
        Ok(MutationOutcome {
            item: self.item(&item.id).cloned(),
            merged,
            boxes_added,
        })
    }

    /// Edits an existing row and re-groups it.
    ///
    /// If the edit makes the row identical to another row of its (possibly
    /// new) room, both are merged into the other row.
    pub fn update_item(
        &mut self,
        ctx: &InventoryContext,
        item_id: &str,
        patch: ItemPatch,
    ) -> Result<MutationOutcome> {
        patch.validate()?;
        if let Some(tags) = &patch.tags {
            ctx.rules.validate_tags(tags)?;
        }

        let current = self
            .item(item_id)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        let mut candidate = current.clone();
        if !candidate.apply_patch(patch) {
            // Nothing changed: the row keeps its place.
            return Ok(MutationOutcome {
                item: Some(candidate),
                merged: false,
                boxes_added: 0,
            });
        }

        self.take_item(item_id)?;
        let room_id = candidate.room_id;
        let room = self.items_by_room.entry(room_id).or_default();
        let (index, merged) = insert_merged(room, candidate);
        let item = room[index].clone();
        self.displayed_rooms.insert(room_id);

        tracing::debug!(stop = %self.stop_id, item_id, merged, "item updated");
        let boxes_added = self.after_mutation(ctx);
        Ok(MutationOutcome {
            item: self.item(&item.id).cloned(),
            merged,
            boxes_added,
        })
    }

    /// Removes one unit of a row; the row disappears at zero.
    pub fn delete_item(&mut self, ctx: &InventoryContext, item_id: &str) -> Result<MutationOutcome> {
        let current = self
            .item(item_id)
            .map(|item| item.count)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        self.set_count(ctx, item_id, current.saturating_sub(1))
    }

    /// Sets the count of a row; zero removes the row.
    pub fn set_count(
        &mut self,
        ctx: &InventoryContext,
        item_id: &str,
        count: u32,
    ) -> Result<MutationOutcome> {
        let item = if count == 0 {
            self.take_item(item_id)?;
            tracing::debug!(stop = %self.stop_id, item_id, "item removed");
            None
        } else {
            let item = self
                .item_mut(item_id)
                .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
            item.count = count;
            Some(item.clone())
        };

        let boxes_added = self.after_mutation(ctx);
        Ok(MutationOutcome {
            item,
            merged: false,
            boxes_added,
        })
    }

    /// Shows or hides a room.
    ///
    /// # Returns
    /// Whether the room is displayed afterwards
    pub fn toggle_room(&mut self, room_id: RoomId) -> Result<bool> {
        if room_id == BOXES_ROOM_ID {
            return Err(Error::RoomNotToggleable(room_id));
        }
        if self.displayed_rooms.remove(&room_id) {
            Ok(false)
        } else {
            self.displayed_rooms.insert(room_id);
            Ok(true)
        }
    }

    /// Switches auto-box mode. Enabling runs a reconciliation right away.
    ///
    /// # Returns
    /// Number of boxes added by the immediate run
    pub fn set_auto_boxes(&mut self, ctx: &InventoryContext, enabled: bool) -> usize {
        self.auto_boxes_enabled = enabled;
        self.after_mutation(ctx)
    }

    /// Runs the auto-box engine if enabled and applies its result.
    fn after_mutation(&mut self, ctx: &InventoryContext) -> usize {
        if !self.auto_boxes_enabled {
            return 0;
        }

        let items = self.all_items();
        let stop = self.stop_id.as_str();
        let result = reconcile_boxes_with_progress(
            &items,
            &ctx.catalog,
            &ctx.rules,
            &self.auto_box,
            &ctx.auto_box,
            |event| log_box_event(stop, event),
        );

        let Some(result) = result else {
            return 0;
        };

        let added = result.added_count();
        self.auto_box = result.state;
        if result.updated_room_thirteen.is_empty() {
            self.items_by_room.remove(&BOXES_ROOM_ID);
        } else {
            self.items_by_room
                .insert(BOXES_ROOM_ID, result.updated_room_thirteen);
        }
        if added > 0 {
            self.displayed_rooms.insert(BOXES_ROOM_ID);
        }
        added
    }

    fn item_mut(&mut self, item_id: &str) -> Option<&mut ItemInstance> {
        self.items_by_room
            .values_mut()
            .flatten()
            .find(|item| item.id == item_id)
    }

    /// Removes a row and returns it. Rooms left empty are dropped.
    fn take_item(&mut self, item_id: &str) -> Result<ItemInstance> {
        let location = self.items_by_room.iter().find_map(|(room_id, items)| {
            items
                .iter()
                .position(|item| item.id == item_id)
                .map(|index| (*room_id, index))
        });
        let (room_id, index) = location.ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;

        let room = self
            .items_by_room
            .get_mut(&room_id)
            .ok_or_else(|| Error::ItemNotFound(item_id.to_string()))?;
        let item = room.remove(index);
        if room.is_empty() {
            self.items_by_room.remove(&room_id);
        }
        Ok(item)
    }
}

/// Inserts `instance` into `room`, folding it into a row with the same
/// grouping key and the same origin (manual or auto-added).
///
/// # Returns
/// Index of the row holding the units and whether a merge happened
fn insert_merged(room: &mut Vec<ItemInstance>, instance: ItemInstance) -> (usize, bool) {
    let existing = room.iter().position(|row| {
        row.grouping_key == instance.grouping_key && row.auto_added == instance.auto_added
    });

    match existing {
        // Synthesized boxes stay one row per box.
        Some(index) if !instance.auto_added => {
            room[index].count += instance.count;
            (index, true)
        }
        _ => {
            room.push(instance);
            (room.len() - 1, false)
        }
    }
}

fn log_box_event(stop: &str, event: &BoxEvent) {
    match event {
        BoxEvent::BoxesAdded {
            box_type, count, ..
        } => {
            tracing::info!(stop, box_type = box_type.code(), count, "auto boxes added");
        }
        BoxEvent::Finished {
            total_lbs,
            added,
            changed,
        } => {
            tracing::debug!(stop, total_lbs, added, changed, "auto box reconciliation finished");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOFA: CatalogId = 1;
    const DRESSER: CatalogId = 9;
    const BED_KING: CatalogId = 7;
    const MEDIUM_BOX: CatalogId = 24;

    fn ctx() -> InventoryContext {
        InventoryContext::default()
    }

    fn config(lbs: &str) -> ItemConfig {
        ItemConfig {
            tags: Some(vec!["blanket_wrapped".to_string()]),
            lbs: lbs.to_string(),
            ..ItemConfig::default()
        }
    }

    #[test]
    fn identical_adds_merge_into_one_row() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);

        let first = inv.add_item(&ctx, SOFA, 2, config("120"), 1).unwrap();
        let second = inv.add_item(&ctx, SOFA, 2, config("120"), 2).unwrap();

        assert!(!first.merged);
        assert!(second.merged);
        assert_eq!(inv.room_items(2).len(), 1);
        assert_eq!(inv.room_items(2)[0].count, 3);
        assert_eq!(second.item.unwrap().id, first.item.unwrap().id);
        assert!(inv.displayed_rooms().contains(&2));
    }

    #[test]
    fn different_configuration_creates_new_row() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);

        inv.add_item(&ctx, SOFA, 2, config("120"), 1).unwrap();
        inv.add_item(&ctx, SOFA, 2, config("130"), 1).unwrap();
        inv.add_item(&ctx, SOFA, 3, config("120"), 1).unwrap();

        assert_eq!(inv.room_items(2).len(), 2);
        assert_eq!(inv.room_items(3).len(), 1);
    }

    #[test]
    fn missing_tags_fall_back_to_room_defaults() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);

        let outcome = inv
            .add_item(&ctx, BED_KING, 4, ItemConfig::default(), 1)
            .unwrap();
        let bed = outcome.item.unwrap();
        assert_eq!(bed.tags, vec!["disassembly", "reassembly"]);
        assert_eq!(bed.packing_needs_counts.get("mattress_bag_king"), Some(&1));
    }

    #[test]
    fn add_rejects_bad_input() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);

        assert!(matches!(
            inv.add_item(&ctx, 4242, 2, config("1"), 1),
            Err(Error::UnknownCatalogItem(_))
        ));
        assert!(matches!(
            inv.add_item(&ctx, SOFA, 2, config("1"), 0),
            Err(Error::Validation(ValidationError::InvalidCount(_)))
        ));
        let conflicting = ItemConfig {
            tags: Some(vec!["blanket_wrapped".to_string(), "crating".to_string()]),
            ..ItemConfig::default()
        };
        assert!(matches!(
            inv.add_item(&ctx, SOFA, 2, conflicting, 1),
            Err(Error::InvalidTag(_))
        ));
        assert!(inv.all_items().is_empty());
    }

    #[test]
    fn update_into_existing_configuration_merges_rows() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);

        let a = inv.add_item(&ctx, SOFA, 2, config("120"), 2).unwrap().item.unwrap();
        let b = inv.add_item(&ctx, SOFA, 2, config("130"), 1).unwrap().item.unwrap();

        let outcome = inv
            .update_item(
                &ctx,
                &b.id,
                ItemPatch {
                    lbs: Some("120".to_string()),
                    ..ItemPatch::default()
                },
            )
            .unwrap();

        assert!(outcome.merged);
        assert_eq!(inv.room_items(2).len(), 1);
        let merged = &inv.room_items(2)[0];
        assert_eq!(merged.id, a.id);
        assert_eq!(merged.count, 3);
    }

    #[test]
    fn update_can_move_rows_between_rooms() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        let a = inv.add_item(&ctx, DRESSER, 2, config("90"), 1).unwrap().item.unwrap();

        inv.update_item(
            &ctx,
            &a.id,
            ItemPatch {
                room_id: Some(5),
                ..ItemPatch::default()
            },
        )
        .unwrap();

        assert!(inv.room_items(2).is_empty());
        assert!(!inv.items_by_room().contains_key(&2));
        assert_eq!(inv.room_items(5)[0].id, a.id);
    }

    #[test]
    fn no_op_update_keeps_row_order() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        let first = inv.add_item(&ctx, SOFA, 2, config("120"), 1).unwrap().item.unwrap();
        inv.add_item(&ctx, DRESSER, 2, config("90"), 1).unwrap();
        inv.add_item(&ctx, BED_KING, 2, config("80"), 1).unwrap();
        let before: Vec<String> = inv.room_items(2).iter().map(|i| i.id.clone()).collect();

        let outcome = inv
            .update_item(
                &ctx,
                &first.id,
                ItemPatch {
                    lbs: Some("120".to_string()),
                    room_id: Some(2),
                    ..ItemPatch::default()
                },
            )
            .unwrap();

        assert!(!outcome.merged);
        assert_eq!(outcome.item.unwrap().id, first.id);
        let after: Vec<String> = inv.room_items(2).iter().map(|i| i.id.clone()).collect();
        assert_eq!(after, before);

        // A real edit still moves the row to the end.
        inv.update_item(
            &ctx,
            &first.id,
            ItemPatch {
                notes: Some("scratched".to_string()),
                ..ItemPatch::default()
            },
        )
        .unwrap();
        assert_eq!(inv.room_items(2).last().unwrap().id, first.id);
    }

    #[test]
    fn update_unknown_item_fails() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        assert!(matches!(
            inv.update_item(&ctx, "nope", ItemPatch::default()),
            Err(Error::ItemNotFound(_))
        ));
    }

    #[test]
    fn delete_decrements_then_removes() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        let row = inv.add_item(&ctx, SOFA, 2, config("120"), 2).unwrap().item.unwrap();

        let outcome = inv.delete_item(&ctx, &row.id).unwrap();
        assert_eq!(outcome.item.map(|i| i.count), Some(1));

        let outcome = inv.delete_item(&ctx, &row.id).unwrap();
        assert!(outcome.item.is_none());
        assert!(inv.all_items().is_empty());
        assert!(matches!(
            inv.delete_item(&ctx, &row.id),
            Err(Error::ItemNotFound(_))
        ));
    }

    #[test]
    fn boxes_room_cannot_be_toggled() {
        let mut inv = StopInventory::new("stop-1", false);
        assert!(matches!(
            inv.toggle_room(BOXES_ROOM_ID),
            Err(Error::RoomNotToggleable(13))
        ));
        assert!(inv.toggle_room(4).unwrap());
        assert!(!inv.toggle_room(4).unwrap());
    }

    #[test]
    fn crossing_a_band_adds_boxes_when_enabled() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", true);

        let first = inv.add_item(&ctx, SOFA, 2, config("150"), 1).unwrap();
        assert_eq!(first.boxes_added, 0);

        let second = inv.add_item(&ctx, DRESSER, 3, config("60"), 1).unwrap();
        assert_eq!(second.boxes_added, 3);
        assert_eq!(inv.room_items(BOXES_ROOM_ID).len(), 3);
        assert!(inv.room_items(BOXES_ROOM_ID).iter().all(|b| b.auto_added));
        assert!(inv.displayed_rooms().contains(&BOXES_ROOM_ID));
        assert_eq!(inv.totals(&ctx).total_lbs, 210.0);
        assert_eq!(inv.totals(&ctx).box_count, 3);
    }

    #[test]
    fn lighter_inventory_keeps_auto_boxes() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", true);
        let heavy = inv.add_item(&ctx, SOFA, 2, config("450"), 1).unwrap();
        assert_eq!(heavy.boxes_added, 6);

        inv.set_count(&ctx, &heavy.item.unwrap().id, 0).unwrap();
        assert_eq!(inv.room_items(BOXES_ROOM_ID).len(), 6);
        assert_eq!(inv.auto_box_state().previous_total_lbs, Some(0.0));
    }

    #[test]
    fn manual_boxes_do_not_merge_with_auto_boxes() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", true);
        inv.add_item(&ctx, SOFA, 2, config("210"), 1).unwrap();

        let manual = inv
            .add_item(&ctx, MEDIUM_BOX, BOXES_ROOM_ID, ItemConfig::default(), 1)
            .unwrap();
        assert!(!manual.merged);
        let room = inv.room_items(BOXES_ROOM_ID);
        assert_eq!(room.len(), 4);
        assert!(!room.last().unwrap().auto_added);

        let again = inv
            .add_item(&ctx, MEDIUM_BOX, BOXES_ROOM_ID, ItemConfig::default(), 1)
            .unwrap();
        assert!(again.merged);
        assert_eq!(again.item.unwrap().count, 2);
    }

    #[test]
    fn disabled_mode_adds_nothing_until_enabled() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        inv.add_item(&ctx, SOFA, 2, config("250"), 1).unwrap();
        assert!(inv.room_items(BOXES_ROOM_ID).is_empty());

        assert_eq!(inv.set_auto_boxes(&ctx, true), 3);
        assert_eq!(inv.room_items(BOXES_ROOM_ID).len(), 3);
    }

    #[test]
    fn snapshot_round_trip_does_not_duplicate_boxes() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", true);
        inv.add_item(&ctx, SOFA, 2, config("450"), 1).unwrap();
        let snapshot = inv.snapshot();
        assert_eq!(snapshot.inventory_items.len(), 1 + 6);

        let mut restored = StopInventory::from_snapshot("stop-1", snapshot, &ctx, true);
        assert_eq!(restored.auto_box_state().processed_thresholds.len(), 2);

        restored.add_item(&ctx, DRESSER, 3, config("10"), 1).unwrap();
        assert_eq!(restored.room_items(BOXES_ROOM_ID).len(), 6);
    }

    #[test]
    fn reload_without_boxes_adds_them_when_enabled() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        inv.add_item(&ctx, SOFA, 2, config("450"), 1).unwrap();

        let mut restored = StopInventory::from_snapshot("stop-1", inv.snapshot(), &ctx, false);
        assert!(restored.auto_box_state().processed_thresholds.is_empty());

        assert_eq!(restored.set_auto_boxes(&ctx, true), 6);
        assert_eq!(restored.room_items(BOXES_ROOM_ID).len(), 6);
    }

    #[test]
    fn reload_with_partial_boxes_adds_the_missing_band() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", true);
        inv.add_item(&ctx, SOFA, 2, config("450"), 1).unwrap();

        let mut snapshot = inv.snapshot();
        snapshot
            .items_by_room
            .get_mut(&BOXES_ROOM_ID)
            .unwrap()
            .truncate(3);

        let mut restored = StopInventory::from_snapshot("stop-1", snapshot, &ctx, true);
        assert_eq!(
            restored.auto_box_state().processed_thresholds,
            [1].into_iter().collect()
        );

        restored.add_item(&ctx, DRESSER, 3, config("10"), 1).unwrap();
        assert_eq!(restored.room_items(BOXES_ROOM_ID).len(), 6);
    }

    #[test]
    fn snapshot_restore_merges_duplicate_rows() {
        let ctx = ctx();
        let mut inv = StopInventory::new("stop-1", false);
        inv.add_item(&ctx, SOFA, 2, config("120"), 1).unwrap();
        let mut snapshot = inv.snapshot();
        let mut duplicate = snapshot.items_by_room[&2][0].clone();
        duplicate.id = "dup".to_string();
        duplicate.count = 4;
        snapshot.items_by_room.get_mut(&2).unwrap().push(duplicate);

        let restored = StopInventory::from_snapshot("stop-1", snapshot, &ctx, false);
        assert_eq!(restored.room_items(2).len(), 1);
        assert_eq!(restored.room_items(2)[0].count, 5);
    }
}
