use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{BBox, GeomPrimitive, Point};
use crate::LayerId;

/// Unique cell identifier.
pub type CellId = Uuid;

/// A transformation for placing subcell instances.
///
/// Applied in GDS order: magnify, mirror about X, rotate, translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Mirror about X axis.
    pub mirror_x: bool,
    /// Uniform scale factor (typically 1.0).
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    /// Number of counter-clockwise quarter turns, if the rotation is one.
    fn exact_quarter_turns(&self) -> Option<u8> {
        let turns = self.rotation / 90.0;
        if (turns - turns.round()).abs() < 1e-9 {
            Some((turns.round() as i64).rem_euclid(4) as u8)
        } else {
            None
        }
    }

    pub fn quarter_turns(&self) -> u8 {
        self.exact_quarter_turns().unwrap_or(0)
    }

    /// True if axis-aligned edges stay axis-aligned.
    pub fn is_manhattan(&self) -> bool {
        self.exact_quarter_turns().is_some()
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        p.x *= self.scale;
        p.y *= self.scale;

        if self.mirror_x {
            p.y = -p.y;
        }

        let (rx, ry) = match self.exact_quarter_turns() {
            Some(0) => (p.x, p.y),
            Some(1) => (-p.y, p.x),
            Some(2) => (-p.x, -p.y),
            Some(_) => (p.y, -p.x),
            None => {
                let rad = self.rotation.to_radians();
                let (sin_r, cos_r) = rad.sin_cos();
                (p.x * cos_r - p.y * sin_r, p.x * sin_r + p.y * cos_r)
            }
        };

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }

    /// The transform equivalent to applying `inner` first, then `self`.
    pub fn compose(&self, inner: &Transform) -> Transform {
        let offset = self.apply(&inner.offset);
        let inner_rotation = if self.mirror_x {
            -inner.rotation
        } else {
            inner.rotation
        };
        Transform {
            offset,
            rotation: (self.rotation + inner_rotation).rem_euclid(360.0),
            mirror_x: self.mirror_x ^ inner.mirror_x,
            scale: self.scale * inner.scale,
        }
    }
}

/// A reference to a subcell placed within a parent cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellInstance {
    pub id: Uuid,
    pub cell_id: CellId,
    pub instance_name: String,
    pub transform: Transform,
}

impl CellInstance {
    pub fn new(cell_id: CellId, instance_name: &str, transform: Transform) -> Self {
        Self {
            id: Uuid::new_v4(),
            cell_id,
            instance_name: instance_name.to_string(),
            transform,
        }
    }
}

/// A text annotation. Labels carry no geometry and do not count towards
/// bounding boxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    pub position: Point,
    pub layer_id: LayerId,
}

impl Label {
    pub fn new(text: &str, position: Point, layer_id: LayerId) -> Self {
        Self {
            text: text.to_string(),
            position,
            layer_id,
        }
    }
}

/// Pin / port definition on a cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub name: String,
    pub layer_id: LayerId,
    pub shape: GeomPrimitive,
    pub direction: PinDirection,
}

impl Pin {
    pub fn new(name: &str, shape: GeomPrimitive, direction: PinDirection) -> Self {
        Self {
            name: name.to_string(),
            layer_id: shape.layer_id(),
            shape,
            direction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PinDirection {
    Input,
    Output,
    InOut,
    Power,
    Ground,
}

/// A layout cell containing geometric primitives and subcell references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub name: String,
    pub geometries: Vec<GeomPrimitive>,
    pub instances: Vec<CellInstance>,
    pub labels: Vec<Label>,
    pub pins: Vec<Pin>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            geometries: Vec::new(),
            instances: Vec::new(),
            labels: Vec::new(),
            pins: Vec::new(),
        }
    }

    pub fn add_geometry(&mut self, geom: GeomPrimitive) {
        self.geometries.push(geom);
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    pub fn add_label(&mut self, text: &str, position: Point, layer_id: LayerId) {
        self.labels.push(Label::new(text, position, layer_id));
    }

    /// Add a pin. The pin shape is also drawn as regular geometry.
    pub fn add_pin(&mut self, pin: Pin) {
        self.geometries.push(pin.shape.clone());
        self.pins.push(pin);
    }

    pub fn port_names(&self) -> Vec<String> {
        self.pins.iter().map(|p| p.name.clone()).collect()
    }

    /// Compute the bounding box of all geometry in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        BBox::union_all(self.geometries.iter().filter_map(|g| g.bbox()))
    }

    /// Layers drawn directly in this cell.
    pub fn local_layers(&self) -> BTreeSet<LayerId> {
        self.geometries.iter().map(|g| g.layer_id()).collect()
    }

    /// Get all geometries on a specific layer.
    pub fn geometries_on_layer(&self, layer_id: LayerId) -> Vec<&GeomPrimitive> {
        self.geometries
            .iter()
            .filter(|g| g.layer_id() == layer_id)
            .collect()
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const L0: LayerId = LayerId::new(0, 0);
    const L1: LayerId = LayerId::new(1, 0);

    #[test]
    fn test_cell_add_geometry() {
        let mut cell = Cell::new("test_cell");
        let rect = GeomPrimitive::Rect(Rect::new(L0, 0.0, 0.0, 100.0, 50.0));
        cell.add_geometry(rect);
        assert_eq!(cell.geometry_count(), 1);
        assert_eq!(cell.local_layers().len(), 1);
    }

    #[test]
    fn test_cell_bbox() {
        let mut cell = Cell::new("test_cell");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(L0, 0.0, 0.0, 100.0, 50.0)));
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(L1, 50.0, 25.0, 200.0, 75.0)));
        cell.add_label("ignored", Point::new(500.0, 500.0), L1);
        let bb = cell.local_bbox().unwrap();
        assert!((bb.min.x - 0.0).abs() < 1e-10);
        assert!((bb.min.y - 0.0).abs() < 1e-10);
        assert!((bb.max.x - 200.0).abs() < 1e-10);
        assert!((bb.max.y - 75.0).abs() < 1e-10);
    }

    #[test]
    fn test_pins_are_drawn() {
        let mut cell = Cell::new("cap");
        let shape = GeomPrimitive::Rect(Rect::new(L1, 0.0, 0.0, 1.0, 1.0));
        cell.add_pin(Pin::new("PLUS", shape, PinDirection::InOut));
        assert_eq!(cell.port_names(), vec!["PLUS".to_string()]);
        assert_eq!(cell.geometry_count(), 1);
        assert_eq!(cell.pins[0].layer_id, L1);
    }

    #[test]
    fn test_transform_translate() {
        let t = Transform::translate(10.0, 20.0);
        let p = Point::new(5.0, 5.0);
        let result = t.apply(&p);
        assert!((result.x - 15.0).abs() < 1e-10);
        assert!((result.y - 25.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_quarter_turn_is_exact() {
        let t = Transform {
            rotation: 270.0,
            ..Default::default()
        };
        let p = t.apply(&Point::new(2.0, 1.0));
        assert_eq!(p, Point::new(1.0, -2.0));
        assert!(t.is_manhattan());
        assert_eq!(t.quarter_turns(), 3);
    }

    #[test]
    fn test_transform_compose() {
        let outer = Transform {
            offset: Point::new(10.0, 0.0),
            rotation: 90.0,
            ..Default::default()
        };
        let inner = Transform::translate(1.0, 0.0);
        let p = Point::new(1.0, 1.0);
        let direct = outer.apply(&inner.apply(&p));
        let composed = outer.compose(&inner).apply(&p);
        assert!((direct.x - composed.x).abs() < 1e-10);
        assert!((direct.y - composed.y).abs() < 1e-10);
    }

    #[test]
    fn test_transform_compose_mirrored() {
        let outer = Transform {
            offset: Point::new(0.0, 5.0),
            mirror_x: true,
            ..Default::default()
        };
        let inner = Transform {
            offset: Point::new(2.0, 3.0),
            rotation: 90.0,
            ..Default::default()
        };
        let p = Point::new(1.0, 2.0);
        let direct = outer.apply(&inner.apply(&p));
        let composed = outer.compose(&inner).apply(&p);
        assert!((direct.x - composed.x).abs() < 1e-10);
        assert!((direct.y - composed.y).abs() < 1e-10);
    }
}
