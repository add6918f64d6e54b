//! Tag compatibility rules.
//!
//! One canonical table describes, per tag, which tags it excludes and which
//! tags it pulls in. Every caller that edits a tag selection goes through
//! [`TagRules`], so the rules cannot drift between call sites.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::CatalogItem;
use crate::error::{Error, Result};
use crate::model::PackingNeeds;
use crate::types::{BOXES_ROOM_ID, RoomId};

/// Tag carried by every box placed in the boxes room.
pub const PACKED_BY_MOVERS: &str = "cp_packed_by_movers";

// (tag, incompatible_with, requires)
const RULE_TABLE: &[(&str, &[&str], &[&str])] = &[
    (PACKED_BY_MOVERS, &["pbo_packed_by_owner"], &[]),
    ("pbo_packed_by_owner", &[PACKED_BY_MOVERS], &[]),
    ("blanket_wrapped", &["paper_blanket_wrapped", "crating"], &[]),
    ("paper_blanket_wrapped", &["blanket_wrapped", "crating"], &[]),
    ("crating", &["blanket_wrapped", "paper_blanket_wrapped"], &[]),
    ("keep_blanket_on", &[], &["blanket_wrapped"]),
    ("disassembly", &[], &[]),
    ("reassembly", &[], &["disassembly"]),
    ("hoisting_origin", &[], &[]),
    ("hoisting_destination", &[], &[]),
    ("may_not_be_shipped", &["item_for_company_storage", "included"], &[]),
    ("item_for_company_storage", &["may_not_be_shipped"], &[]),
    ("excluded", &["included"], &[]),
    ("included", &["excluded", "may_not_be_shipped"], &[]),
];

/// Rule entry for a single tag.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TagRule {
    pub incompatible_with: Vec<&'static str>,
    pub requires: Vec<&'static str>,
}

/// Tags and packing materials preselected for a new item.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DefaultTags {
    pub tags: Vec<String>,
    pub packing_needs: PackingNeeds,
}

/// The canonical tag rule table.
#[derive(Clone, Debug)]
pub struct TagRules {
    rules: BTreeMap<&'static str, TagRule>,
}

impl Default for TagRules {
    fn default() -> Self {
        Self::standard()
    }
}

impl TagRules {
    /// The rule set used by the moving crews.
    pub fn standard() -> Self {
        let rules = RULE_TABLE
            .iter()
            .map(|(tag, incompatible, requires)| {
                (
                    *tag,
                    TagRule {
                        incompatible_with: incompatible.to_vec(),
                        requires: requires.to_vec(),
                    },
                )
            })
            .collect();
        Self { rules }
    }

    /// The whole table, keyed by tag.
    pub fn rules(&self) -> &BTreeMap<&'static str, TagRule> {
        &self.rules
    }

    pub fn is_known(&self, tag: &str) -> bool {
        self.rules.contains_key(tag)
    }

    /// Whether `a` and `b` exclude each other. Rules are read in both directions.
    pub fn conflicts(&self, a: &str, b: &str) -> bool {
        let listed = |from: &str, to: &str| {
            self.rules
                .get(from)
                .is_some_and(|rule| rule.incompatible_with.iter().any(|t| *t == to))
        };
        listed(a, b) || listed(b, a)
    }

    /// Adds `tag`, dropping conflicting tags and adding required ones.
    ///
    /// Required tags are applied transitively with the same rules. Unknown
    /// tags are rejected. Applying an already present tag changes nothing.
    pub fn apply_tag(&self, tags: &mut Vec<String>, tag: &str) -> Result<()> {
        if !self.is_known(tag) {
            return Err(Error::InvalidTag(format!("unknown tag '{}'", tag)));
        }
        self.apply_known(tags, tag);
        Ok(())
    }

    fn apply_known(&self, tags: &mut Vec<String>, tag: &str) {
        if tags.iter().any(|t| t == tag) {
            return;
        }
        tags.retain(|existing| !self.conflicts(existing, tag));
        tags.push(tag.to_string());

        if let Some(rule) = self.rules.get(tag) {
            for required in &rule.requires {
                self.apply_known(tags, required);
            }
        }
    }

    /// Removes `tag` if present (plus every tag requiring it), otherwise applies it.
    pub fn toggle_tag(&self, tags: &mut Vec<String>, tag: &str) -> Result<()> {
        if tags.iter().any(|t| t == tag) {
            self.remove_tag(tags, tag);
            Ok(())
        } else {
            self.apply_tag(tags, tag)
        }
    }

    fn remove_tag(&self, tags: &mut Vec<String>, tag: &str) {
        tags.retain(|t| t != tag);
        let dependents: Vec<String> = tags
            .iter()
            .filter(|t| {
                self.rules
                    .get(t.as_str())
                    .is_some_and(|rule| rule.requires.iter().any(|r| *r == tag))
            })
            .cloned()
            .collect();
        for dependent in dependents {
            self.remove_tag(tags, &dependent);
        }
    }

    /// Checks that every tag is known and no pair conflicts.
    pub fn validate_tags(&self, tags: &[String]) -> Result<()> {
        if let Some(unknown) = tags.iter().find(|t| !self.is_known(t)) {
            return Err(Error::InvalidTag(format!("unknown tag '{}'", unknown)));
        }
        for (idx, a) in tags.iter().enumerate() {
            for b in &tags[idx + 1..] {
                if self.conflicts(a, b) {
                    return Err(Error::InvalidTag(format!(
                        "'{}' cannot be combined with '{}'",
                        a, b
                    )));
                }
            }
        }
        Ok(())
    }

    /// Tags and packing preselected for `item` placed in `room_id`.
    ///
    /// The catalog defaults are applied in catalog order, so a later default
    /// wins over an earlier conflicting one. Unknown catalog tags are dropped.
    /// Items in the boxes room are always packed by the movers.
    pub fn default_tags_for(&self, item: &CatalogItem, room_id: RoomId) -> DefaultTags {
        let mut tags = Vec::new();
        for tag in &item.tags {
            if self.is_known(tag) {
                self.apply_known(&mut tags, tag);
            } else {
                tracing::debug!(tag = %tag, item = %item.name, "dropping unknown catalog tag");
            }
        }
        if room_id == BOXES_ROOM_ID {
            self.apply_known(&mut tags, PACKED_BY_MOVERS);
        }

        DefaultTags {
            tags,
            packing_needs: item.packing.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn rules_are_symmetric_for_conflicts() {
        let rules = TagRules::standard();
        assert!(rules.conflicts("blanket_wrapped", "crating"));
        assert!(rules.conflicts("crating", "blanket_wrapped"));
        assert!(!rules.conflicts("disassembly", "blanket_wrapped"));
    }

    #[test]
    fn apply_tag_replaces_conflicting_tags() {
        let rules = TagRules::standard();
        let mut selection = tags(&["blanket_wrapped", "disassembly"]);
        rules.apply_tag(&mut selection, "crating").unwrap();
        assert_eq!(selection, tags(&["disassembly", "crating"]));
    }

    #[test]
    fn apply_tag_adds_required_tags() {
        let rules = TagRules::standard();
        let mut selection = Vec::new();
        rules.apply_tag(&mut selection, "reassembly").unwrap();
        assert_eq!(selection, tags(&["reassembly", "disassembly"]));
    }

    #[test]
    fn required_tag_conflicts_are_resolved() {
        let rules = TagRules::standard();
        let mut selection = tags(&["crating"]);
        rules.apply_tag(&mut selection, "keep_blanket_on").unwrap();
        assert_eq!(selection, tags(&["keep_blanket_on", "blanket_wrapped"]));
    }

    #[test]
    fn apply_tag_is_idempotent() {
        let rules = TagRules::standard();
        let mut selection = tags(&["blanket_wrapped"]);
        rules.apply_tag(&mut selection, "blanket_wrapped").unwrap();
        assert_eq!(selection, tags(&["blanket_wrapped"]));
    }

    #[test]
    fn apply_unknown_tag_fails() {
        let rules = TagRules::standard();
        let mut selection = Vec::new();
        assert!(matches!(
            rules.apply_tag(&mut selection, "glitter"),
            Err(Error::InvalidTag(_))
        ));
        assert!(selection.is_empty());
    }

    #[test]
    fn toggle_removes_dependents() {
        let rules = TagRules::standard();
        let mut selection = tags(&["disassembly", "reassembly"]);
        rules.toggle_tag(&mut selection, "disassembly").unwrap();
        assert!(selection.is_empty());

        rules.toggle_tag(&mut selection, "disassembly").unwrap();
        assert_eq!(selection, tags(&["disassembly"]));
    }

    #[test]
    fn validate_tags_reports_conflicts_and_unknowns() {
        let rules = TagRules::standard();
        assert!(rules.validate_tags(&tags(&["blanket_wrapped", "disassembly"])).is_ok());
        assert!(rules.validate_tags(&tags(&["excluded", "included"])).is_err());
        assert!(rules.validate_tags(&tags(&["sparkly"])).is_err());
        assert!(rules.validate_tags(&[]).is_ok());
    }

    #[test]
    fn default_tags_follow_catalog() {
        let rules = TagRules::standard();
        let catalog = Catalog::builtin();
        let bed = catalog.by_name("Bed, King").unwrap();

        let defaults = rules.default_tags_for(bed, 3);
        assert_eq!(defaults.tags, tags(&["disassembly", "reassembly"]));
        assert_eq!(defaults.packing_needs.get("mattress_bag_king"), Some(&1));
    }

    #[test]
    fn boxes_room_forces_packed_by_movers() {
        let rules = TagRules::standard();
        let catalog = Catalog::builtin();
        let book_box = catalog.by_name("Book Box").unwrap();

        let elsewhere = rules.default_tags_for(book_box, 4);
        assert_eq!(elsewhere.tags, tags(&["pbo_packed_by_owner"]));

        let in_boxes = rules.default_tags_for(book_box, BOXES_ROOM_ID);
        assert_eq!(in_boxes.tags, tags(&[PACKED_BY_MOVERS]));
    }
}
