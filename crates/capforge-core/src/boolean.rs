//! Manhattan boolean operations.
//!
//! Shapes are snapped to the 1 nm database grid and decomposed over the
//! compressed grid of all edge coordinates on a layer. Each grid cell is
//! classified by testing its center against both operands, with an R-tree
//! over shape extents to keep the candidate set small. Coordinates are
//! doubled internally so cell centers stay integral.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cell::Cell;
use crate::geometry::{BBox, GeomPrimitive, Point, Rect};
use crate::layout::{FlatLayout, Layout};
use crate::spatial::{SpatialEntry, SpatialIndex};
use crate::LayerId;

/// Database units per micrometer (1 nm grid).
pub const DBU_PER_UM: f64 = 1000.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BooleanError {
    #[error("Non-Manhattan {kind} on layer {layer} in '{cell}'")]
    NonManhattan {
        cell: String,
        layer: LayerId,
        kind: &'static str,
    },
}

/// Area bookkeeping for one layer of an XOR, in square micrometers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerOverlap {
    pub layer: LayerId,
    pub area_a: f64,
    pub area_b: f64,
    pub common_area: f64,
    pub xor_area: f64,
}

/// Result of [`xor`]: per-layer areas and the difference geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XorResult {
    pub name: String,
    pub layers: Vec<LayerOverlap>,
    pub shapes: Vec<Rect>,
}

impl XorResult {
    /// True if both operands cover exactly the same area on every layer.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn total_xor_area(&self) -> f64 {
        self.layers.iter().map(|l| l.xor_area).sum()
    }

    /// The difference geometry as a standalone cell.
    pub fn to_cell(&self) -> Cell {
        let mut cell = Cell::new(&self.name);
        for rect in &self.shapes {
            cell.add_geometry(GeomPrimitive::Rect(rect.clone()));
        }
        cell
    }
}

fn to_dbu(v: f64) -> i64 {
    (v * DBU_PER_UM).round() as i64
}

fn to_um(v: i64) -> f64 {
    v as f64 / DBU_PER_UM
}

/// A snapped shape in database units.
#[derive(Debug, Clone)]
enum Region {
    Box { x0: i64, y0: i64, x1: i64, y1: i64 },
    Polygon(Vec<(i64, i64)>),
}

impl Region {
    fn from_bbox(bbox: &BBox) -> Option<Self> {
        let (x0, y0) = (to_dbu(bbox.min.x), to_dbu(bbox.min.y));
        let (x1, y1) = (to_dbu(bbox.max.x), to_dbu(bbox.max.y));
        (x1 > x0 && y1 > y0).then_some(Region::Box { x0, y0, x1, y1 })
    }

    fn vertices(&self) -> Vec<(i64, i64)> {
        match self {
            Region::Box { x0, y0, x1, y1 } => vec![(*x0, *y0), (*x1, *y1)],
            Region::Polygon(v) => v.clone(),
        }
    }

    fn extent(&self) -> BBox {
        let pts: Vec<Point> = self
            .vertices()
            .iter()
            .map(|&(x, y)| Point::new(x as f64, y as f64))
            .collect();
        BBox::from_points(&pts).unwrap_or(BBox::new(Point::new(0.0, 0.0), Point::new(0.0, 0.0)))
    }

    /// Point containment in doubled coordinates. Callers only pass grid
    /// cell centers, which never lie on an edge.
    fn contains(&self, cx2: i64, cy2: i64) -> bool {
        match self {
            Region::Box { x0, y0, x1, y1 } => {
                2 * x0 < cx2 && cx2 < 2 * x1 && 2 * y0 < cy2 && cy2 < 2 * y1
            }
            Region::Polygon(v) => {
                let mut inside = false;
                for (k, &(xa, ya)) in v.iter().enumerate() {
                    let (xb, yb) = v[(k + 1) % v.len()];
                    if xa == xb
                        && 2 * xa > cx2
                        && 2 * ya.min(yb) < cy2
                        && cy2 < 2 * ya.max(yb)
                    {
                        inside = !inside;
                    }
                }
                inside
            }
        }
    }
}

fn regions_on(
    layout: &FlatLayout,
    layer: LayerId,
) -> Result<Vec<Region>, BooleanError> {
    let non_manhattan = |kind| BooleanError::NonManhattan {
        cell: layout.name().to_string(),
        layer,
        kind,
    };

    let mut regions = Vec::new();
    for shape in layout.shapes_on(layer) {
        match shape {
            GeomPrimitive::Rect(r) => regions.extend(Region::from_bbox(&r.bbox())),
            GeomPrimitive::Via(v) => regions.extend(Region::from_bbox(&v.bbox())),
            GeomPrimitive::Polygon(p) => {
                let mut pts: Vec<(i64, i64)> = p
                    .vertices
                    .iter()
                    .map(|v| (to_dbu(v.x), to_dbu(v.y)))
                    .collect();
                pts.dedup();
                if pts.len() > 1 && pts.first() == pts.last() {
                    pts.pop();
                }
                if pts.len() < 4 {
                    log::debug!("Skipping degenerate polygon on {} in '{}'", layer, layout.name());
                    continue;
                }
                let manhattan = (0..pts.len()).all(|k| {
                    let (a, b) = (pts[k], pts[(k + 1) % pts.len()]);
                    a.0 == b.0 || a.1 == b.1
                });
                if !manhattan {
                    return Err(non_manhattan("polygon edge"));
                }
                regions.push(Region::Polygon(pts));
            }
            GeomPrimitive::Path(p) => {
                let hw = p.width / 2.0;
                let last = p.points.len().saturating_sub(2);
                for (k, seg) in p.points.windows(2).enumerate() {
                    let (a, b) = (seg[0], seg[1]);
                    // Interior joints are extended so bends come out square.
                    let ext_start = if k > 0 { hw } else { 0.0 };
                    let ext_end = if k < last { hw } else { 0.0 };
                    let bbox = if to_dbu(a.y) == to_dbu(b.y) {
                        let (lo, hi, lo_ext, hi_ext) = if a.x <= b.x {
                            (a.x, b.x, ext_start, ext_end)
                        } else {
                            (b.x, a.x, ext_end, ext_start)
                        };
                        BBox::new(
                            Point::new(lo - lo_ext, a.y - hw),
                            Point::new(hi + hi_ext, a.y + hw),
                        )
                    } else if to_dbu(a.x) == to_dbu(b.x) {
                        let (lo, hi, lo_ext, hi_ext) = if a.y <= b.y {
                            (a.y, b.y, ext_start, ext_end)
                        } else {
                            (b.y, a.y, ext_end, ext_start)
                        };
                        BBox::new(
                            Point::new(a.x - hw, lo - lo_ext),
                            Point::new(a.x + hw, hi + hi_ext),
                        )
                    } else {
                        return Err(non_manhattan("path segment"));
                    };
                    regions.extend(Region::from_bbox(&bbox));
                }
            }
        }
    }
    Ok(regions)
}

fn index_regions(regions: &[Region]) -> SpatialIndex {
    SpatialIndex::build(
        regions
            .iter()
            .enumerate()
            .map(|(geometry_index, r)| SpatialEntry {
                geometry_index,
                bbox: r.extent(),
            })
            .collect(),
    )
}

fn covers(index: &SpatialIndex, regions: &[Region], cx2: i64, cy2: i64) -> bool {
    let center = Point::new(cx2 as f64 / 2.0, cy2 as f64 / 2.0);
    index
        .query_point(&center)
        .iter()
        .any(|e| regions[e.geometry_index].contains(cx2, cy2))
}

fn sorted_coords(regions: &[Region], pick: impl Fn(&(i64, i64)) -> i64) -> Vec<i64> {
    let mut coords: Vec<i64> = regions
        .iter()
        .flat_map(|r| r.vertices())
        .map(|v| pick(&v))
        .collect();
    coords.sort_unstable();
    coords.dedup();
    coords
}

fn xor_layer(layer: LayerId, a: &[Region], b: &[Region], out: &mut Vec<Rect>) -> LayerOverlap {
    let all: Vec<Region> = a.iter().chain(b).cloned().collect();
    let xs = sorted_coords(&all, |v| v.0);
    let ys = sorted_coords(&all, |v| v.1);
    let (index_a, index_b) = (index_regions(a), index_regions(b));

    let (mut area_a, mut area_b, mut common, mut xor) = (0i128, 0i128, 0i128, 0i128);
    for j in 0..ys.len().saturating_sub(1) {
        let cy2 = ys[j] + ys[j + 1];
        let dy = (ys[j + 1] - ys[j]) as i128;
        let mut run: Option<usize> = None;
        for i in 0..xs.len().saturating_sub(1) {
            let cx2 = xs[i] + xs[i + 1];
            let area = (xs[i + 1] - xs[i]) as i128 * dy;
            let in_a = covers(&index_a, a, cx2, cy2);
            let in_b = covers(&index_b, b, cx2, cy2);
            if in_a {
                area_a += area;
            }
            if in_b {
                area_b += area;
            }
            if in_a && in_b {
                common += area;
            }
            if in_a != in_b {
                xor += area;
                run.get_or_insert(i);
            } else if let Some(start) = run.take() {
                out.push(Rect::new(layer, to_um(xs[start]), to_um(ys[j]), to_um(xs[i]), to_um(ys[j + 1])));
            }
        }
        if let Some(start) = run {
            let end = xs[xs.len() - 1];
            out.push(Rect::new(layer, to_um(xs[start]), to_um(ys[j]), to_um(end), to_um(ys[j + 1])));
        }
    }

    let scale = DBU_PER_UM * DBU_PER_UM;
    LayerOverlap {
        layer,
        area_a: area_a as f64 / scale,
        area_b: area_b as f64 / scale,
        common_area: common as f64 / scale,
        xor_area: xor as f64 / scale,
    }
}

/// XOR two flattened layouts layer by layer.
///
/// Every layer drawn in either operand is reported, including layers only
/// one side uses.
pub fn xor(a: &FlatLayout, b: &FlatLayout) -> Result<XorResult, BooleanError> {
    let layers: BTreeSet<LayerId> = a.layers().union(&b.layers()).copied().collect();
    let mut shapes = Vec::new();
    let mut overlaps = Vec::with_capacity(layers.len());

    for layer in layers {
        let ra = regions_on(a, layer)?;
        let rb = regions_on(b, layer)?;
        let overlap = xor_layer(layer, &ra, &rb, &mut shapes);
        log::debug!(
            "XOR {} on {}: xor {:.4} um², common {:.4} um²",
            a.name(),
            layer,
            overlap.xor_area,
            overlap.common_area
        );
        overlaps.push(overlap);
    }

    Ok(XorResult {
        name: format!("xor_{}_{}", a.name(), b.name()),
        layers: overlaps,
        shapes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Path, Polygon, Via};

    const M4: LayerId = LayerId::new(50, 0);
    const M5: LayerId = LayerId::new(67, 0);

    fn flat(name: &str, shapes: Vec<GeomPrimitive>) -> FlatLayout {
        FlatLayout::new(name, shapes, Vec::new())
    }

    fn rect(layer: LayerId, x0: f64, y0: f64, x1: f64, y1: f64) -> GeomPrimitive {
        GeomPrimitive::Rect(Rect::new(layer, x0, y0, x1, y1))
    }

    #[test]
    fn test_identical_layouts_have_empty_xor() {
        let a = flat("a", vec![rect(M4, 0.0, 0.0, 5.0, 5.0), rect(M5, 1.0, 1.0, 4.0, 4.0)]);
        let result = xor(&a, &a).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.layers.len(), 2);
        assert!((result.layers[0].common_area - 25.0).abs() < 1e-9);
        assert_eq!(result.total_xor_area(), 0.0);
    }

    #[test]
    fn test_offset_rectangles() {
        let a = flat("a", vec![rect(M4, 0.0, 0.0, 4.0, 4.0)]);
        let b = flat("b", vec![rect(M4, 2.0, 0.0, 6.0, 4.0)]);
        let result = xor(&a, &b).unwrap();
        let layer = &result.layers[0];
        assert!((layer.common_area - 8.0).abs() < 1e-9);
        assert!((layer.xor_area - 16.0).abs() < 1e-9);
        // One strip on each side, merged across the single row.
        assert_eq!(result.shapes.len(), 2);
        assert_eq!(result.name, "xor_a_b");
    }

    #[test]
    fn test_overlapping_shapes_on_one_side_are_merged() {
        let a = flat("a", vec![rect(M4, 0.0, 0.0, 3.0, 2.0), rect(M4, 2.0, 0.0, 5.0, 2.0)]);
        let b = flat("b", vec![rect(M4, 0.0, 0.0, 5.0, 2.0)]);
        assert!(xor(&a, &b).unwrap().is_empty());
    }

    #[test]
    fn test_layer_only_on_one_side() {
        let a = flat("a", vec![rect(M4, 0.0, 0.0, 1.0, 1.0)]);
        let b = flat("b", vec![rect(M5, 0.0, 0.0, 1.0, 1.0)]);
        let result = xor(&a, &b).unwrap();
        assert_eq!(result.layers.len(), 2);
        assert!(result.layers.iter().all(|l| l.common_area == 0.0));
        assert!((result.total_xor_area() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_l_shaped_polygon_matches_rect_union() {
        let poly = GeomPrimitive::Polygon(Polygon::new(
            M4,
            vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 0.0),
                Point::new(4.0, 1.0),
                Point::new(1.0, 1.0),
                Point::new(1.0, 4.0),
                Point::new(0.0, 4.0),
            ],
        ));
        let rects = vec![rect(M4, 0.0, 0.0, 4.0, 1.0), rect(M4, 0.0, 0.0, 1.0, 4.0)];
        let result = xor(&flat("poly", vec![poly]), &flat("rects", rects)).unwrap();
        assert!(result.is_empty());
        assert!((result.layers[0].area_a - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_bent_path_has_square_corner() {
        let path = GeomPrimitive::Path(Path::new(
            M5,
            vec![Point::new(0.0, 0.0), Point::new(4.0, 0.0), Point::new(4.0, 4.0)],
            1.0,
        ));
        let expected = vec![rect(M5, 0.0, -0.5, 4.5, 0.5), rect(M5, 3.5, -0.5, 4.5, 4.0)];
        assert!(xor(&flat("p", vec![path]), &flat("r", expected)).unwrap().is_empty());
    }

    #[test]
    fn test_via_uses_cut_rect() {
        let via = GeomPrimitive::Via(Via::new(M4, M5, LayerId::new(66, 0), Point::new(1.0, 1.0), 0.2, 0.2));
        let cut = rect(LayerId::new(66, 0), 0.9, 0.9, 1.1, 1.1);
        assert!(xor(&flat("v", vec![via]), &flat("c", vec![cut])).unwrap().is_empty());
    }

    #[test]
    fn test_non_manhattan_polygon_is_rejected() {
        let tri = GeomPrimitive::Polygon(Polygon::new(
            M4,
            vec![
                Point::new(0.0, 0.0),
                Point::new(4.0, 0.0),
                Point::new(4.0, 2.0),
                Point::new(0.0, 4.0),
            ],
        ));
        let err = xor(&flat("slanted", vec![tri]), &flat("empty", vec![])).unwrap_err();
        assert!(matches!(err, BooleanError::NonManhattan { kind: "polygon edge", .. }));
    }

    #[test]
    fn test_xor_cell_contains_difference() {
        let a = flat("a", vec![rect(M4, 0.0, 0.0, 2.0, 2.0)]);
        let b = flat("b", vec![]);
        let cell = xor(&a, &b).unwrap().to_cell();
        assert_eq!(cell.name, "xor_a_b");
        assert_eq!(cell.geometry_count(), 1);
        let bb = cell.local_bbox().unwrap();
        assert!((bb.area() - 4.0).abs() < 1e-9);
    }
}
