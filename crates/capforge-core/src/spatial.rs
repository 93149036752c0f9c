use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{BBox, Point};

/// A region extent in the index, tagged with its position in the caller's
/// region list.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    pub geometry_index: usize,
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Bulk-loaded R-tree used by the boolean operator to find the regions
/// that may cover a sample point.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Entries whose extent contains `point`, boundary included.
    pub fn query_point(&self, point: &Point) -> Vec<&SpatialEntry> {
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x, point.y]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(geometry_index: usize, x0: f64, y0: f64, x1: f64, y1: f64) -> SpatialEntry {
        SpatialEntry {
            geometry_index,
            bbox: BBox::new(Point::new(x0, y0), Point::new(x1, y1)),
        }
    }

    #[test]
    fn test_query_point() {
        let index = SpatialIndex::build(vec![
            entry(0, 0.0, 0.0, 10.0, 10.0),
            entry(1, 20.0, 20.0, 30.0, 30.0),
        ]);

        let hits = index.query_point(&Point::new(5.0, 5.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].geometry_index, 0);

        let hits = index.query_point(&Point::new(25.0, 25.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].geometry_index, 1);

        assert!(index.query_point(&Point::new(15.0, 15.0)).is_empty());
    }

    #[test]
    fn test_query_point_includes_boundary() {
        let index = SpatialIndex::build(vec![
            entry(0, 0.0, 0.0, 1.0, 1.0),
            entry(1, 1.0, 0.0, 2.0, 1.0),
        ]);
        let mut hits: Vec<usize> = index
            .query_point(&Point::new(1.0, 0.5))
            .iter()
            .map(|e| e.geometry_index)
            .collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }
}
