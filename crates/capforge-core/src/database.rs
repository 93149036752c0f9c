use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::cell::{Cell, CellId, CellInstance, Label, Transform};
use crate::geometry::{BBox, GeomPrimitive, Point};
use crate::layout::{FlatLayout, Layout};

/// Errors raised while walking a cell hierarchy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HierarchyError {
    #[error("Cell {0} referenced but not defined")]
    UndefinedCell(CellId),

    #[error("Cell '{0}' (directly or indirectly) instantiates itself")]
    RecursiveHierarchy(String),

    #[error("Cell '{cell}' has no instance at index {index}")]
    NoSuchInstance { cell: String, index: usize },
}

/// The layout library: every cell of a session, addressed by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct LayoutDatabase {
    /// Database identifier.
    pub id: Uuid,
    /// Library name.
    pub name: String,
    /// All cells indexed by ID.
    cells: HashMap<CellId, Cell>,
    /// Insertion order, for deterministic iteration.
    order: Vec<CellId>,
    /// First cell added, unless set explicitly.
    pub top_cell: Option<CellId>,
}

impl LayoutDatabase {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            cells: HashMap::new(),
            order: Vec::new(),
            top_cell: None,
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    /// Add a cell. Cell names are unique within a library; a clashing name
    /// gets a `$n` suffix.
    pub fn add_cell(&mut self, mut cell: Cell) -> CellId {
        if self.find_cell_by_name(&cell.name).is_some() {
            let base = cell.name.clone();
            let mut n = 1;
            while self.find_cell_by_name(&format!("{base}${n}")).is_some() {
                n += 1;
            }
            cell.name = format!("{base}${n}");
            log::debug!("Cell name '{}' taken, renamed to '{}'", base, cell.name);
        }
        let id = cell.id;
        self.cells.insert(id, cell);
        self.order.push(id);
        if self.top_cell.is_none() {
            self.top_cell = Some(id);
        }
        id
    }

    pub fn get_cell(&self, id: &CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub fn get_cell_mut(&mut self, id: &CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    fn cell(&self, id: &CellId) -> Result<&Cell, HierarchyError> {
        self.cells.get(id).ok_or(HierarchyError::UndefinedCell(*id))
    }

    fn cell_mut(&mut self, id: &CellId) -> Result<&mut Cell, HierarchyError> {
        self.cells
            .get_mut(id)
            .ok_or(HierarchyError::UndefinedCell(*id))
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.all_cells().find(|c| c.name == name)
    }

    pub fn cell_names(&self) -> Vec<&str> {
        self.all_cells().map(|c| c.name.as_str()).collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// All cells in insertion order.
    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.order.iter().filter_map(|id| self.cells.get(id))
    }

    // ── Hierarchy ────────────────────────────────────────────────────

    /// Place `child` inside `parent`. Returns the instance index.
    pub fn add_instance(
        &mut self,
        parent: CellId,
        child: CellId,
        instance_name: &str,
        transform: Transform,
    ) -> Result<usize, HierarchyError> {
        self.cell(&child)?;
        if parent == child || self.dependencies(child)?.contains(&parent) {
            return Err(HierarchyError::RecursiveHierarchy(
                self.cell(&parent)?.name.clone(),
            ));
        }
        let cell = self.cell_mut(&parent)?;
        cell.add_instance(CellInstance::new(child, instance_name, transform));
        Ok(cell.instance_count() - 1)
    }

    /// Move an instance so its bounding-box center sits at `x` and/or `y`.
    pub fn place_instance_center(
        &mut self,
        parent: CellId,
        index: usize,
        x: Option<f64>,
        y: Option<f64>,
    ) -> Result<(), HierarchyError> {
        let parent_cell = self.cell(&parent)?;
        let inst = parent_cell
            .instances
            .get(index)
            .ok_or_else(|| HierarchyError::NoSuchInstance {
                cell: parent_cell.name.clone(),
                index,
            })?;
        let Some(bbox) = self.bbox(inst.cell_id)? else {
            return Ok(());
        };
        let center = bbox.transformed(&inst.transform).center();
        let dx = x.map_or(0.0, |x| x - center.x);
        let dy = y.map_or(0.0, |y| y - center.y);

        let inst = &mut self.cell_mut(&parent)?.instances[index];
        inst.transform.offset = inst.transform.offset.translate(dx, dy);
        Ok(())
    }

    /// All cells reachable from `top`, children before parents, `top` last.
    pub fn dependencies(&self, top: CellId) -> Result<Vec<CellId>, HierarchyError> {
        let mut done = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = Vec::new();
        self.visit(top, &mut done, &mut seen, &mut stack)?;
        Ok(done)
    }

    fn visit(
        &self,
        id: CellId,
        done: &mut Vec<CellId>,
        seen: &mut HashSet<CellId>,
        stack: &mut Vec<CellId>,
    ) -> Result<(), HierarchyError> {
        if seen.contains(&id) {
            return Ok(());
        }
        let cell = self.cell(&id)?;
        if stack.contains(&id) {
            return Err(HierarchyError::RecursiveHierarchy(cell.name.clone()));
        }
        stack.push(id);
        for inst in &cell.instances {
            self.visit(inst.cell_id, done, seen, stack)?;
        }
        stack.pop();
        seen.insert(id);
        done.push(id);
        Ok(())
    }

    /// Copy `top` and every cell it references out of another library.
    /// Copies get fresh ids; clashing names are uniquified as in
    /// [`LayoutDatabase::add_cell`]. Returns the id of the copied `top`.
    pub fn import_cell(
        &mut self,
        src: &LayoutDatabase,
        top: CellId,
    ) -> Result<CellId, HierarchyError> {
        let mut copies: HashMap<CellId, CellId> = HashMap::new();
        for id in src.dependencies(top)? {
            let mut cell = src.cell(&id)?.clone();
            cell.id = Uuid::new_v4();
            for inst in &mut cell.instances {
                inst.cell_id = *copies
                    .get(&inst.cell_id)
                    .ok_or(HierarchyError::UndefinedCell(inst.cell_id))?;
            }
            copies.insert(id, self.add_cell(cell));
        }
        log::debug!("Imported {} cells from '{}'", copies.len(), src.name);
        copies
            .get(&top)
            .copied()
            .ok_or(HierarchyError::UndefinedCell(top))
    }

    /// Hierarchical bounding box of a cell, `None` for a cell without geometry.
    pub fn bbox(&self, id: CellId) -> Result<Option<BBox>, HierarchyError> {
        Ok(self.flatten(id)?.bbox())
    }

    /// Resolve all instances of a cell into a single-level shape list.
    pub fn flatten(&self, id: CellId) -> Result<FlatLayout, HierarchyError> {
        let top = self.cell(&id)?;
        let mut shapes = Vec::new();
        let mut labels = Vec::new();
        let mut stack = Vec::new();
        self.flatten_into(
            id,
            &Transform::default(),
            &mut shapes,
            &mut labels,
            &mut stack,
        )?;
        log::debug!(
            "Flattened '{}' into {} shapes and {} labels",
            top.name,
            shapes.len(),
            labels.len()
        );
        Ok(FlatLayout::new(&top.name, shapes, labels))
    }

    fn flatten_into(
        &self,
        id: CellId,
        transform: &Transform,
        shapes: &mut Vec<GeomPrimitive>,
        labels: &mut Vec<Label>,
        stack: &mut Vec<CellId>,
    ) -> Result<(), HierarchyError> {
        let cell = self.cell(&id)?;
        if stack.contains(&id) {
            return Err(HierarchyError::RecursiveHierarchy(cell.name.clone()));
        }
        stack.push(id);

        shapes.extend(cell.geometries.iter().map(|g| g.transformed(transform)));
        labels.extend(cell.labels.iter().map(|l| Label {
            position: transform.apply(&l.position),
            ..l.clone()
        }));
        for inst in &cell.instances {
            let child_transform = transform.compose(&inst.transform);
            self.flatten_into(inst.cell_id, &child_transform, shapes, labels, stack)?;
        }

        stack.pop();
        Ok(())
    }

    /// Bounding box of an instance in its parent's coordinates.
    pub fn instance_bbox(&self, inst: &CellInstance) -> Result<Option<BBox>, HierarchyError> {
        Ok(self
            .bbox(inst.cell_id)?
            .map(|bb| bb.transformed(&inst.transform)))
    }

    /// Convenience for callers that only need a point inside the placed cell.
    pub fn instance_center(&self, inst: &CellInstance) -> Result<Option<Point>, HierarchyError> {
        Ok(self.instance_bbox(inst)?.map(|bb| bb.center()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::LayerId;

    const M1: LayerId = LayerId::new(8, 0);

    fn square(name: &str, size: f64) -> Cell {
        let mut cell = Cell::new(name);
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(M1, 0.0, 0.0, size, size)));
        cell
    }

    #[test]
    fn test_database_create() {
        let db = LayoutDatabase::new("test_project");
        assert_eq!(db.name, "test_project");
        assert_eq!(db.cell_count(), 0);
        assert!(db.top_cell.is_none());
    }

    #[test]
    fn test_add_and_find_cell() {
        let mut db = LayoutDatabase::new("test");
        let cell = Cell::new("inverter");
        let id = db.add_cell(cell);
        assert_eq!(db.cell_count(), 1);
        assert!(db.get_cell(&id).is_some());
        assert_eq!(db.find_cell_by_name("inverter").unwrap().name, "inverter");
        assert_eq!(db.top_cell, Some(id));
    }

    #[test]
    fn test_duplicate_names_are_uniquified() {
        let mut db = LayoutDatabase::new("test");
        db.add_cell(Cell::new("cmim"));
        let second = db.add_cell(Cell::new("cmim"));
        let third = db.add_cell(Cell::new("cmim"));
        assert_eq!(db.get_cell(&second).unwrap().name, "cmim$1");
        assert_eq!(db.get_cell(&third).unwrap().name, "cmim$2");
        assert_eq!(db.cell_names(), vec!["cmim", "cmim$1", "cmim$2"]);
    }

    #[test]
    fn test_flatten_applies_transforms() {
        let mut db = LayoutDatabase::new("test");
        let leaf = db.add_cell(square("leaf", 2.0));
        let mid = db.add_cell(Cell::new("mid"));
        let top = db.add_cell(Cell::new("top"));
        db.add_instance(mid, leaf, "a", Transform::translate(10.0, 0.0))
            .unwrap();
        db.add_instance(top, mid, "b", Transform::translate(0.0, 5.0))
            .unwrap();

        let flat = db.flatten(top).unwrap();
        assert_eq!(flat.shapes().len(), 1);
        let bb = flat.bbox().unwrap();
        assert!((bb.min.x - 10.0).abs() < 1e-10);
        assert!((bb.min.y - 5.0).abs() < 1e-10);
        assert!((bb.max.x - 12.0).abs() < 1e-10);
    }

    #[test]
    fn test_hierarchical_bbox() {
        let mut db = LayoutDatabase::new("test");
        let leaf = db.add_cell(square("leaf", 2.0));
        let top = db.add_cell(square("top", 1.0));
        db.add_instance(top, leaf, "a", Transform::translate(4.0, 3.0))
            .unwrap();
        let bb = db.bbox(top).unwrap().unwrap();
        assert_eq!(bb, BBox::new(Point::new(0.0, 0.0), Point::new(6.0, 5.0)));

        let empty = db.add_cell(Cell::new("empty"));
        assert_eq!(db.bbox(empty).unwrap(), None);
    }

    #[test]
    fn test_dependencies_children_first() {
        let mut db = LayoutDatabase::new("test");
        let leaf = db.add_cell(square("leaf", 1.0));
        let top = db.add_cell(Cell::new("top"));
        db.add_instance(top, leaf, "l0", Transform::default()).unwrap();
        db.add_instance(top, leaf, "l1", Transform::translate(3.0, 0.0))
            .unwrap();
        assert_eq!(db.dependencies(top).unwrap(), vec![leaf, top]);
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut db = LayoutDatabase::new("test");
        let a = db.add_cell(Cell::new("a"));
        let b = db.add_cell(Cell::new("b"));
        db.add_instance(a, b, "b", Transform::default()).unwrap();
        let err = db.add_instance(b, a, "a", Transform::default()).unwrap_err();
        assert_eq!(err, HierarchyError::RecursiveHierarchy("b".into()));
        assert!(db.add_instance(a, a, "self", Transform::default()).is_err());
    }

    #[test]
    fn test_undefined_child() {
        let mut db = LayoutDatabase::new("test");
        let a = db.add_cell(Cell::new("a"));
        let missing = Uuid::new_v4();
        assert_eq!(
            db.add_instance(a, missing, "x", Transform::default()),
            Err(HierarchyError::UndefinedCell(missing))
        );
    }

    #[test]
    fn test_import_cell_remaps_ids() {
        let mut src = LayoutDatabase::new("ref");
        let leaf = src.add_cell(square("cmim", 5.0));
        let top = src.add_cell(Cell::new("top"));
        src.add_instance(top, leaf, "c", Transform::translate(1.0, 1.0))
            .unwrap();
        src.add_cell(square("unused", 1.0));

        let mut db = LayoutDatabase::new("session");
        db.add_cell(Cell::new("cmim"));
        let copy = db.import_cell(&src, top).unwrap();

        assert_eq!(db.cell_names(), vec!["cmim", "cmim$1", "top"]);
        assert_ne!(copy, top);
        let inst = &db.get_cell(&copy).unwrap().instances[0];
        assert_eq!(db.get_cell(&inst.cell_id).unwrap().name, "cmim$1");
        assert_eq!(db.bbox(copy).unwrap(), src.bbox(top).unwrap());
    }

    #[test]
    fn test_place_instance_center() {
        let mut db = LayoutDatabase::new("test");
        let leaf = db.add_cell(square("leaf", 4.0));
        let top = db.add_cell(Cell::new("top"));
        let idx = db.add_instance(top, leaf, "l", Transform::default()).unwrap();
        db.place_instance_center(top, idx, Some(50.0), None).unwrap();

        let inst = &db.get_cell(&top).unwrap().instances[idx];
        let center = db.instance_center(inst).unwrap().unwrap();
        assert!((center.x - 50.0).abs() < 1e-10);
        assert!((center.y - 2.0).abs() < 1e-10);

        assert!(matches!(
            db.place_instance_center(top, 7, Some(0.0), None),
            Err(HierarchyError::NoSuchInstance { index: 7, .. })
        ));
    }
}
