//! Grouping keys for item configurations.
//!
//! Two item instances in the same room that share a grouping key describe the
//! same configuration and are collapsed into one row with a count. The key is
//! built from every user-editable field; image payloads contribute only a
//! short hash so the key stays small.

use crate::model::ItemInstance;

/// Separator between key parts.
const PART_SEPARATOR: &str = "-";

/// Derives the identity string of an item configuration.
///
/// Parts, joined with `-`:
/// 1. catalog id
/// 2. tags, sorted and joined with `,` (tag order does not matter)
/// 3. notes
/// 4. cuft, verbatim
/// 5. lbs, verbatim
/// 6. packing needs as `key:value`, sorted by key, joined with `,`
/// 7. link (empty when unset)
/// 8. `{uploaded hash}-{camera hash}`
///
/// Instance id, name and the `autoAdded` flag do not take part. The function
/// is total: measurement strings are not parsed here.
///
/// # Examples
/// ```
/// use move_inventory::catalog::Catalog;
/// use move_inventory::grouping::compute_grouping_key;
/// use move_inventory::model::{ItemConfig, ItemInstance};
///
/// let catalog = Catalog::builtin();
/// let sofa = catalog.by_name("Sofa, 3 Cushion").unwrap();
/// let item = ItemInstance::from_catalog(sofa, 2, ItemConfig::default(), 1);
/// assert_eq!(compute_grouping_key(&item), "1-------0-0");
/// ```
pub fn compute_grouping_key(instance: &ItemInstance) -> String {
    let mut tags: Vec<&str> = instance.tags.iter().map(String::as_str).collect();
    tags.sort_unstable();

    // BTreeMap iterates in key order already.
    let packing = instance
        .packing_needs_counts
        .iter()
        .map(|(material, quantity)| format!("{}:{}", material, quantity))
        .collect::<Vec<_>>()
        .join(",");

    let images = format!(
        "{}-{}",
        image_hash(&instance.uploaded_images),
        image_hash(&instance.camera_images)
    );

    [
        instance.furniture_item_id.to_string(),
        tags.join(","),
        instance.notes.clone(),
        instance.cuft.clone(),
        instance.lbs.clone(),
        packing,
        instance.link.clone().unwrap_or_default(),
        images,
    ]
    .join(PART_SEPARATOR)
}

/// Order-sensitive 32-bit rolling hash over the concatenated payloads.
///
/// `hash = hash * 31 + unit` per UTF-16 code unit, wrapping as a signed
/// 32-bit integer. The empty concatenation hashes to 0.
pub fn image_hash<S: AsRef<str>>(payloads: &[S]) -> i32 {
    payloads
        .iter()
        .flat_map(|payload| payload.as_ref().encode_utf16())
        .fold(0i32, |hash, unit| {
            hash.wrapping_mul(31).wrapping_add(i32::from(unit))
        })
}
