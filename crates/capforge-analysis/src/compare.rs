//! Structural and geometric comparison of two layouts.

use std::collections::BTreeSet;
use std::fmt;

use capforge_core::{BBox, Cell, LayerId, LayerOverlap, Layout, XorResult};
use serde::{Deserialize, Serialize};

pub type LayerSet = BTreeSet<LayerId>;

/// Result of [`diff_layers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDiff {
    pub common: LayerSet,
    pub only_in_a: LayerSet,
    pub only_in_b: LayerSet,
}

/// Outcome of a geometric comparison, overall or for one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Identical,
    PartialOverlap,
    Disjoint,
    /// The difference operator failed; carries its reason.
    Error(String),
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Identical => write!(f, "IDENTICAL"),
            Classification::PartialOverlap => write!(f, "PARTIAL_OVERLAP"),
            Classification::Disjoint => write!(f, "DISJOINT"),
            Classification::Error(reason) => write!(f, "ERROR ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerComparison {
    pub layer: LayerId,
    pub classification: Classification,
    pub common_area: f64,
    pub xor_area: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub name_a: String,
    pub name_b: String,
    pub bbox_a: Option<BBox>,
    pub bbox_b: Option<BBox>,
    pub common_layers: LayerSet,
    pub only_in_a: LayerSet,
    pub only_in_b: LayerSet,
    pub geometric_difference: Classification,
    pub per_layer: Vec<LayerComparison>,
    #[serde(skip)]
    difference: Option<XorResult>,
}

impl ComparisonReport {
    /// The XOR geometry, if the difference operator succeeded.
    pub fn difference_cell(&self) -> Option<Cell> {
        self.difference.as_ref().map(|d| d.to_cell())
    }

    pub fn is_error(&self) -> bool {
        matches!(self.geometric_difference, Classification::Error(_))
    }
}

/// The layer sets of both layouts.
pub fn layer_sets<L: Layout>(a: &L, b: &L) -> (LayerSet, LayerSet) {
    (a.layers(), b.layers())
}

pub fn diff_layers(set_a: &LayerSet, set_b: &LayerSet) -> LayerDiff {
    LayerDiff {
        common: set_a.intersection(set_b).copied().collect(),
        only_in_a: set_a.difference(set_b).copied().collect(),
        only_in_b: set_b.difference(set_a).copied().collect(),
    }
}

fn classify_layer(overlap: &LayerOverlap) -> Classification {
    if overlap.xor_area <= 0.0 {
        Classification::Identical
    } else if overlap.common_area <= 0.0 {
        Classification::Disjoint
    } else {
        Classification::PartialOverlap
    }
}

fn classify_overall(per_layer: &[LayerComparison]) -> Classification {
    let all = |c: Classification| per_layer.iter().all(|l| l.classification == c);
    if all(Classification::Identical) {
        Classification::Identical
    } else if all(Classification::Disjoint) {
        Classification::Disjoint
    } else {
        Classification::PartialOverlap
    }
}

/// Compare two layouts layer by layer.
///
/// A failing difference operator does not propagate: the report carries
/// [`Classification::Error`] and the layer-set comparison is still filled in.
pub fn geometric_compare<L: Layout>(a: &L, b: &L) -> ComparisonReport {
    let (set_a, set_b) = layer_sets(a, b);
    let diff = diff_layers(&set_a, &set_b);

    let (geometric_difference, per_layer, difference) = match a.xor(b) {
        Ok(result) => {
            let per_layer: Vec<LayerComparison> = result
                .layers
                .iter()
                .map(|o| LayerComparison {
                    layer: o.layer,
                    classification: classify_layer(o),
                    common_area: o.common_area,
                    xor_area: o.xor_area,
                })
                .collect();
            let overall = classify_overall(&per_layer);
            log::info!("Compared '{}' and '{}': {}", a.name(), b.name(), overall);
            (overall, per_layer, Some(result))
        }
        Err(e) => {
            log::warn!("Geometric comparison of '{}' and '{}' failed: {}", a.name(), b.name(), e);
            (Classification::Error(e.to_string()), Vec::new(), None)
        }
    };

    ComparisonReport {
        name_a: a.name().to_string(),
        name_b: b.name().to_string(),
        bbox_a: a.bbox(),
        bbox_b: b.bbox(),
        common_layers: diff.common,
        only_in_a: diff.only_in_a,
        only_in_b: diff.only_in_b,
        geometric_difference,
        per_layer,
        difference,
    }
}
