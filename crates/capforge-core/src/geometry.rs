use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cell::Transform;
use crate::LayerId;

/// A 2D point in layout coordinates (micrometers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    /// Bounding box of a sequence of optional boxes, `None` if all are empty.
    pub fn union_all<I: IntoIterator<Item = BBox>>(boxes: I) -> Option<Self> {
        boxes.into_iter().reduce(|acc, bb| acc.union(&bb))
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow (or shrink, for negative `margin`) the box on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            min: self.min.translate(-margin, -margin),
            max: self.max.translate(margin, margin),
        }
    }

    pub fn transformed(&self, transform: &Transform) -> Self {
        let pts: Vec<Point> = self.corners().iter().map(|p| transform.apply(p)).collect();
        // Four corners always yield a box.
        BBox::from_points(&pts).unwrap_or(*self)
    }
}

impl fmt::Display for BBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(({:.3}, {:.3}), ({:.3}, {:.3}))",
            self.min.x, self.min.y, self.max.x, self.max.y
        )
    }
}

/// A rectangle defined by lower-left and upper-right corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub layer_id: LayerId,
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rect {
    pub fn new(layer_id: LayerId, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            layer_id,
            lower_left: Point::new(x1.min(x2), y1.min(y2)),
            upper_right: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    pub fn from_bbox(layer_id: LayerId, bbox: &BBox) -> Self {
        Self::new(layer_id, bbox.min.x, bbox.min.y, bbox.max.x, bbox.max.y)
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.lower_left, self.upper_right)
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.bbox().contains_point(p)
    }
}

/// A polygon defined by a list of vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub layer_id: LayerId,
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(layer_id: LayerId, vertices: Vec<Point>) -> Self {
        Self { layer_id, vertices }
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// A path (wire) defined by a centerline and width. Ends are flush with the
/// first and last points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub layer_id: LayerId,
    pub points: Vec<Point>,
    pub width: f64,
}

impl Path {
    pub fn new(layer_id: LayerId, points: Vec<Point>, width: f64) -> Self {
        Self {
            layer_id,
            points,
            width,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        let half_w = self.width / 2.0;
        let expanded: Vec<Point> = self
            .points
            .iter()
            .flat_map(|p| {
                vec![
                    Point::new(p.x - half_w, p.y - half_w),
                    Point::new(p.x + half_w, p.y + half_w),
                ]
            })
            .collect();
        BBox::from_points(&expanded)
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }
}

/// A via connecting two layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub bottom_layer: LayerId,
    pub top_layer: LayerId,
    pub cut_layer: LayerId,
    pub position: Point,
    pub width: f64,
    pub height: f64,
}

impl Via {
    pub fn new(
        bottom_layer: LayerId,
        top_layer: LayerId,
        cut_layer: LayerId,
        position: Point,
        width: f64,
        height: f64,
    ) -> Self {
        Self {
            bottom_layer,
            top_layer,
            cut_layer,
            position,
            width,
            height,
        }
    }

    pub fn bbox(&self) -> BBox {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        BBox::new(
            Point::new(self.position.x - half_w, self.position.y - half_h),
            Point::new(self.position.x + half_w, self.position.y + half_h),
        )
    }

    /// The cut shape as a rectangle.
    pub fn cut_rect(&self) -> Rect {
        Rect::from_bbox(self.cut_layer, &self.bbox())
    }
}

/// A geometric primitive in the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeomPrimitive {
    Rect(Rect),
    Polygon(Polygon),
    Path(Path),
    Via(Via),
}

impl GeomPrimitive {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            GeomPrimitive::Rect(r) => Some(r.bbox()),
            GeomPrimitive::Polygon(p) => p.bbox(),
            GeomPrimitive::Path(p) => p.bbox(),
            GeomPrimitive::Via(v) => Some(v.bbox()),
        }
    }

    pub fn layer_id(&self) -> LayerId {
        match self {
            GeomPrimitive::Rect(r) => r.layer_id,
            GeomPrimitive::Polygon(p) => p.layer_id,
            GeomPrimitive::Path(p) => p.layer_id,
            GeomPrimitive::Via(v) => v.cut_layer,
        }
    }

    /// Map this primitive into a parent coordinate system.
    ///
    /// Rectangles stay rectangles under quarter-turn rotations and become
    /// polygons otherwise.
    pub fn transformed(&self, t: &Transform) -> GeomPrimitive {
        match self {
            GeomPrimitive::Rect(r) => {
                if t.is_manhattan() {
                    GeomPrimitive::Rect(Rect::from_bbox(r.layer_id, &r.bbox().transformed(t)))
                } else {
                    let vertices = r.bbox().corners().iter().map(|p| t.apply(p)).collect();
                    GeomPrimitive::Polygon(Polygon::new(r.layer_id, vertices))
                }
            }
            GeomPrimitive::Polygon(p) => GeomPrimitive::Polygon(Polygon::new(
                p.layer_id,
                p.vertices.iter().map(|v| t.apply(v)).collect(),
            )),
            GeomPrimitive::Path(p) => GeomPrimitive::Path(Path::new(
                p.layer_id,
                p.points.iter().map(|v| t.apply(v)).collect(),
                p.width * t.scale,
            )),
            GeomPrimitive::Via(v) => {
                let (w, h) = if t.quarter_turns() % 2 == 1 {
                    (v.height, v.width)
                } else {
                    (v.width, v.height)
                };
                GeomPrimitive::Via(Via::new(
                    v.bottom_layer,
                    v.top_layer,
                    v.cut_layer,
                    t.apply(&v.position),
                    w * t.scale,
                    h * t.scale,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const M1: LayerId = LayerId::new(8, 0);
    const M2: LayerId = LayerId::new(10, 0);

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_rect_area() {
        let r = Rect::new(M1, 0.0, 0.0, 10.0, 5.0);
        assert!((r.area() - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_bbox_intersection() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 20.0), Point::new(30.0, 30.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_bbox_expand_and_display() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(5.0, 5.0)).expand(0.6);
        assert!((a.width() - 6.2).abs() < 1e-10);
        assert_eq!(a.to_string(), "((-0.600, -0.600), (5.600, 5.600))");
    }

    #[test]
    fn test_rect_rotated_stays_rect() {
        let r = GeomPrimitive::Rect(Rect::new(M2, 0.0, 0.0, 4.0, 1.0));
        let t = Transform {
            rotation: 90.0,
            ..Default::default()
        };
        match r.transformed(&t) {
            GeomPrimitive::Rect(out) => {
                assert!((out.width() - 1.0).abs() < 1e-10);
                assert!((out.height() - 4.0).abs() < 1e-10);
                assert!((out.lower_left.x + 1.0).abs() < 1e-10);
            }
            other => panic!("expected rect, got {:?}", other),
        }
    }

    #[test]
    fn test_rect_odd_angle_becomes_polygon() {
        let r = GeomPrimitive::Rect(Rect::new(M2, 0.0, 0.0, 1.0, 1.0));
        let t = Transform {
            rotation: 45.0,
            ..Default::default()
        };
        assert!(matches!(r.transformed(&t), GeomPrimitive::Polygon(_)));
    }
}
