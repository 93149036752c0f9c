use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::boolean::{self, BooleanError, XorResult};
use crate::cell::Label;
use crate::geometry::{BBox, GeomPrimitive};
use crate::LayerId;

/// The introspection surface the analysis code relies on: a name, the set
/// of drawn layers, the extent, and a geometric difference operator.
pub trait Layout {
    fn name(&self) -> &str;

    fn layers(&self) -> BTreeSet<LayerId>;

    fn bbox(&self) -> Option<BBox>;

    /// Per-layer XOR against `other`.
    fn xor(&self, other: &Self) -> Result<XorResult, BooleanError>
    where
        Self: Sized;
}

/// A cell with its hierarchy resolved into top-level coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatLayout {
    name: String,
    shapes: Vec<GeomPrimitive>,
    labels: Vec<Label>,
}

impl FlatLayout {
    pub fn new(name: &str, shapes: Vec<GeomPrimitive>, labels: Vec<Label>) -> Self {
        Self {
            name: name.to_string(),
            shapes,
            labels,
        }
    }

    pub fn shapes(&self) -> &[GeomPrimitive] {
        &self.shapes
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn shapes_on(&self, layer: LayerId) -> impl Iterator<Item = &GeomPrimitive> {
        self.shapes.iter().filter(move |s| s.layer_id() == layer)
    }
}

impl Layout for FlatLayout {
    fn name(&self) -> &str {
        &self.name
    }

    fn layers(&self) -> BTreeSet<LayerId> {
        self.shapes.iter().map(|s| s.layer_id()).collect()
    }

    fn bbox(&self) -> Option<BBox> {
        BBox::union_all(self.shapes.iter().filter_map(|s| s.bbox()))
    }

    fn xor(&self, other: &Self) -> Result<XorResult, BooleanError> {
        boolean::xor(self, other)
    }
}
