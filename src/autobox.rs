//! Automatic packing boxes.
//!
//! As the shipment weight grows past each full weight band (200 lb by
//! default), a batch of boxes is added to the boxes room and spread across
//! five box products by fixed shares:
//! - Dishpack 10 %
//! - Wardrobe 5 %
//! - Large 20 %
//! - Medium 45 %
//! - Small 20 %
//!
//! Boxes are only ever added. A lighter inventory keeps the boxes it already
//! has, and each band is counted at most once per session.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::catalog::Catalog;
use crate::model::{ItemConfig, ItemInstance};
use crate::tags::TagRules;
use crate::types::{
    BOXES_ROOM_ID, DEFAULT_BOXES_PER_THRESHOLD, DEFAULT_LBS_PER_THRESHOLD, Weighted,
};

/// Box products the engine distributes new boxes across.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BoxType {
    Dishpack,
    Wardrobe,
    Large,
    Medium,
    Small,
}

impl BoxType {
    /// Distribution order.
    pub const ALL: [BoxType; 5] = [
        BoxType::Dishpack,
        BoxType::Wardrobe,
        BoxType::Large,
        BoxType::Medium,
        BoxType::Small,
    ];

    /// Exact catalog name of the box product.
    pub fn catalog_name(&self) -> &'static str {
        match self {
            BoxType::Dishpack => "Dishpack Box",
            BoxType::Wardrobe => "Wardrobe Box",
            BoxType::Large => "Large Box",
            BoxType::Medium => "Medium Box",
            BoxType::Small => "Small Box",
        }
    }

    /// Share of a batch that goes to this box type.
    pub fn share(&self) -> f64 {
        match self {
            BoxType::Dishpack => 0.10,
            BoxType::Wardrobe => 0.05,
            BoxType::Large => 0.20,
            BoxType::Medium => 0.45,
            BoxType::Small => 0.20,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            BoxType::Dishpack => "dishpack",
            BoxType::Wardrobe => "wardrobe",
            BoxType::Large => "large",
            BoxType::Medium => "medium",
            BoxType::Small => "small",
        }
    }
}

/// Product names that never count towards the shipment weight.
pub const EXCLUDED_FROM_WEIGHT: [&str; 7] = [
    "Dishpack Box",
    "Wardrobe Box",
    "Large Box",
    "Medium Box",
    "Small Box",
    "Book Box",
    "Mirror Carton",
];

/// Configuration for the auto-box engine.
#[derive(Clone, Debug)]
pub struct AutoBoxConfig {
    /// Size of one weight band in lb
    pub lbs_per_threshold: f64,
    /// Boxes added per crossed band
    pub boxes_per_threshold: u32,
    /// Item names excluded from the weight total (trimmed, exact match)
    pub excluded_names: Vec<String>,
}

impl AutoBoxConfig {
    pub const DEFAULT_LBS_PER_THRESHOLD: f64 = DEFAULT_LBS_PER_THRESHOLD;
    pub const DEFAULT_BOXES_PER_THRESHOLD: u32 = DEFAULT_BOXES_PER_THRESHOLD;
    /// Upper bound accepted for `boxes_per_threshold` from configuration.
    pub const MAX_BOXES_PER_THRESHOLD: u32 = 100;
    /// Bands handled by a single run. Bands beyond it are picked up by later runs.
    pub const MAX_BANDS_PER_RUN: u64 = 250;
    /// Boxes synthesized by a single run.
    pub const MAX_BOXES_PER_RUN: u32 = 1_000;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> AutoBoxConfigBuilder {
        AutoBoxConfigBuilder::default()
    }

    fn is_excluded(&self, name: &str) -> bool {
        let name = name.trim();
        self.excluded_names.iter().any(|n| n.trim() == name)
    }

    /// Band index of a weight. Non-positive and non-finite weights sit in band 0.
    fn threshold_index(&self, lbs: f64) -> u64 {
        if !lbs.is_finite() || lbs <= 0.0 || self.lbs_per_threshold <= 0.0 {
            return 0;
        }
        (lbs / self.lbs_per_threshold).floor() as u64
    }
}

impl Default for AutoBoxConfig {
    fn default() -> Self {
        Self {
            lbs_per_threshold: Self::DEFAULT_LBS_PER_THRESHOLD,
            boxes_per_threshold: Self::DEFAULT_BOXES_PER_THRESHOLD,
            excluded_names: EXCLUDED_FROM_WEIGHT.iter().map(|n| n.to_string()).collect(),
        }
    }
}

/// Builder for AutoBoxConfig.
#[derive(Clone, Debug, Default)]
pub struct AutoBoxConfigBuilder {
    config: AutoBoxConfig,
}

impl AutoBoxConfigBuilder {
    /// Sets the band size in lb.
    pub fn lbs_per_threshold(mut self, lbs: f64) -> Self {
        self.config.lbs_per_threshold = lbs;
        self
    }

    /// Sets the number of boxes added per band.
    pub fn boxes_per_threshold(mut self, boxes: u32) -> Self {
        self.config.boxes_per_threshold = boxes;
        self
    }

    /// Adds a name to the weight exclusion list.
    pub fn exclude_name(mut self, name: impl Into<String>) -> Self {
        self.config.excluded_names.push(name.into());
        self
    }

    /// Creates the final configuration.
    pub fn build(self) -> AutoBoxConfig {
        self.config
    }
}

/// Bookkeeping carried between reconciliations of one stop.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AutoBoxState {
    /// Weight seen by the last reconciliation; `None` before the first run
    #[serde(default)]
    pub previous_total_lbs: Option<f64>,
    /// Band indices that already produced boxes
    #[serde(default)]
    #[schema(value_type = Vec<u64>)]
    pub processed_thresholds: BTreeSet<u64>,
}

/// Outcome of a reconciliation that changed something.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BoxReconciliation {
    /// New content of the boxes room: auto-added boxes (old, then new), then manual ones
    pub updated_room_thirteen: Vec<ItemInstance>,
    /// Boxes created by this run
    pub auto_boxes: Vec<ItemInstance>,
    /// Boxes dropped by this run. Boxes are never retracted, so this stays empty.
    pub removed: Vec<ItemInstance>,
    pub total_lbs: f64,
    /// State to use for the next run
    pub state: AutoBoxState,
}

impl BoxReconciliation {
    pub fn added_count(&self) -> usize {
        self.auto_boxes.len()
    }
}

/// Events emitted during a reconciliation, for logging and live display.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum BoxEvent {
    /// Shipment weight has been summed up.
    WeightComputed {
        total_lbs: f64,
        previous_total_lbs: Option<f64>,
    },
    /// A new weight band was crossed for the first time.
    ThresholdCrossed { threshold: u64, lbs: f64 },
    /// Boxes of one type were created.
    BoxesAdded {
        box_type: BoxType,
        name: String,
        count: u32,
    },
    /// A box type could not be resolved in the catalog.
    BoxTypeSkipped {
        box_type: BoxType,
        name: String,
        count: u32,
    },
    /// Reconciliation finished.
    Finished {
        total_lbs: f64,
        added: usize,
        changed: bool,
    },
}

/// Sums the shipment weight of `items`.
///
/// Items in the boxes room and items whose name is on the exclusion list do
/// not count. Each instance contributes its parsed `lbs` once.
pub fn shipment_weight(items: &[ItemInstance], config: &AutoBoxConfig) -> f64 {
    items
        .iter()
        .filter(|item| !item.in_boxes_room() && !config.is_excluded(&item.name))
        .map(|item| item.lbs())
        .sum()
}

/// Splits a batch across the box types. Each share is rounded on its own,
/// so the parts need not add up to `total`.
pub fn distribute_boxes(total: u32) -> Vec<(BoxType, u32)> {
    BoxType::ALL
        .iter()
        .map(|box_type| {
            let count = (f64::from(total) * box_type.share()).round() as u32;
            (*box_type, count)
        })
        .collect()
}

/// Reconciles the boxes room with the default configuration and tag rules.
///
/// # Parameters
/// * `items` - All item instances of the stop, every room
/// * `catalog` - Catalog used to resolve the box products
/// * `state` - Bookkeeping from the previous run
///
/// # Returns
/// `None` when the weight is exactly the previously recorded one, otherwise
/// the new boxes room content
pub fn reconcile_boxes(
    items: &[ItemInstance],
    catalog: &Catalog,
    state: &AutoBoxState,
) -> Option<BoxReconciliation> {
    reconcile_boxes_with_config(
        items,
        catalog,
        &TagRules::standard(),
        state,
        &AutoBoxConfig::default(),
    )
}

/// Reconciliation with custom configuration.
pub fn reconcile_boxes_with_config(
    items: &[ItemInstance],
    catalog: &Catalog,
    rules: &TagRules,
    state: &AutoBoxState,
    config: &AutoBoxConfig,
) -> Option<BoxReconciliation> {
    reconcile_boxes_with_progress(items, catalog, rules, state, config, |_| {})
}

/// Reconciliation with custom configuration and a progress callback.
pub fn reconcile_boxes_with_progress(
    items: &[ItemInstance],
    catalog: &Catalog,
    rules: &TagRules,
    state: &AutoBoxState,
    config: &AutoBoxConfig,
    mut on_event: impl FnMut(&BoxEvent),
) -> Option<BoxReconciliation> {
    let total_lbs = shipment_weight(items, config);
    on_event(&BoxEvent::WeightComputed {
        total_lbs,
        previous_total_lbs: state.previous_total_lbs,
    });

    if state.previous_total_lbs == Some(total_lbs) {
        on_event(&BoxEvent::Finished {
            total_lbs,
            added: 0,
            changed: false,
        });
        return None;
    }

    let (existing_auto, manual): (Vec<ItemInstance>, Vec<ItemInstance>) = items
        .iter()
        .filter(|item| item.in_boxes_room())
        .cloned()
        .partition(|item| item.auto_added);

    let mut next_state = AutoBoxState {
        previous_total_lbs: Some(total_lbs),
        processed_thresholds: state.processed_thresholds.clone(),
    };

    let current_threshold = config.threshold_index(total_lbs);
    let previous_threshold = config.threshold_index(state.previous_total_lbs.unwrap_or(0.0));

    let mut units_crossed: u32 = 0;
    if current_threshold > previous_threshold {
        let last_threshold = current_threshold
            .min(previous_threshold.saturating_add(AutoBoxConfig::MAX_BANDS_PER_RUN));
        if last_threshold < current_threshold {
            tracing::warn!(
                previous_threshold,
                current_threshold,
                max_bands = AutoBoxConfig::MAX_BANDS_PER_RUN,
                "too many weight bands crossed at once, capping this run"
            );
            next_state.previous_total_lbs =
                Some(last_threshold as f64 * config.lbs_per_threshold);
        }
        for threshold in previous_threshold + 1..=last_threshold {
            if next_state.processed_thresholds.insert(threshold) {
                units_crossed += 1;
                tracing::info!(threshold, total_lbs, "weight band crossed");
                on_event(&BoxEvent::ThresholdCrossed {
                    threshold,
                    lbs: threshold as f64 * config.lbs_per_threshold,
                });
            }
        }
    }

    let new_boxes = if units_crossed > 0 {
        let requested = units_crossed.saturating_mul(config.boxes_per_threshold);
        if requested > AutoBoxConfig::MAX_BOXES_PER_RUN {
            tracing::warn!(
                requested,
                max_boxes = AutoBoxConfig::MAX_BOXES_PER_RUN,
                "box batch too large, capping this run"
            );
        }
        synthesize_boxes(
            requested.min(AutoBoxConfig::MAX_BOXES_PER_RUN),
            catalog,
            rules,
            &mut on_event,
        )
    } else {
        Vec::new()
    };

    let mut updated_room_thirteen =
        Vec::with_capacity(existing_auto.len() + new_boxes.len() + manual.len());
    updated_room_thirteen.extend(existing_auto);
    updated_room_thirteen.extend(new_boxes.iter().cloned());
    updated_room_thirteen.extend(manual);

    on_event(&BoxEvent::Finished {
        total_lbs,
        added: new_boxes.len(),
        changed: true,
    });

    Some(BoxReconciliation {
        updated_room_thirteen,
        auto_boxes: new_boxes,
        removed: Vec::new(),
        total_lbs,
        state: next_state,
    })
}

/// Rebuilds the bookkeeping for an inventory loaded from storage.
///
/// A band counts as processed only if the boxes room holds enough auto-added
/// boxes for it, one full batch per band. When every band of the current
/// weight is covered the weight is recorded as seen; otherwise the previous
/// total stays unset so the next run adds the missing bands.
pub fn restore_state(items: &[ItemInstance], config: &AutoBoxConfig) -> AutoBoxState {
    let total_lbs = shipment_weight(items, config);
    let band = config.threshold_index(total_lbs);

    let auto_boxes = items
        .iter()
        .filter(|item| item.in_boxes_room() && item.auto_added)
        .map(|item| u64::from(item.count))
        .sum::<u64>();
    let per_band: u64 = distribute_boxes(
        config
            .boxes_per_threshold
            .min(AutoBoxConfig::MAX_BOXES_PER_RUN),
    )
    .iter()
    .map(|(_, count)| u64::from(*count))
    .sum();

    let covered = if per_band == 0 {
        band
    } else {
        (auto_boxes / per_band).min(band)
    };

    AutoBoxState {
        previous_total_lbs: (covered == band).then_some(total_lbs),
        processed_thresholds: (1..=covered).collect(),
    }
}

/// Creates `total` boxes spread across the box types, one instance per box.
fn synthesize_boxes(
    total: u32,
    catalog: &Catalog,
    rules: &TagRules,
    on_event: &mut impl FnMut(&BoxEvent),
) -> Vec<ItemInstance> {
    let mut boxes = Vec::new();

    for (box_type, count) in distribute_boxes(total) {
        if count == 0 {
            continue;
        }

        let name = box_type.catalog_name();
        let Some(product) = catalog.by_name(name) else {
            tracing::warn!(
                box_type = box_type.code(),
                product = name,
                "box product missing from catalog, skipping"
            );
            on_event(&BoxEvent::BoxTypeSkipped {
                box_type,
                name: name.to_string(),
                count,
            });
            continue;
        };

        let defaults = rules.default_tags_for(product, BOXES_ROOM_ID);
        for _ in 0..count {
            let config = ItemConfig {
                tags: Some(defaults.tags.clone()),
                packing_needs: defaults.packing_needs.clone(),
                ..ItemConfig::default()
            };
            boxes.push(
                ItemInstance::from_catalog(product, BOXES_ROOM_ID, config, 1).auto_added(),
            );
        }

        on_event(&BoxEvent::BoxesAdded {
            box_type,
            name: product.name.clone(),
            count,
        });
    }

    boxes
}
