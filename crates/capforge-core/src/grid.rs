use thiserror::Error;

use crate::cell::{Cell, CellId, Transform};
use crate::database::{HierarchyError, LayoutDatabase};
use crate::geometry::BBox;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Grid shape {rows}x{cols} has room for {} cells, got {members}", .rows * .cols)]
    ShapeTooSmall {
        rows: usize,
        cols: usize,
        members: usize,
    },

    #[error("Grid spacing must be finite and non-negative, got {0}")]
    InvalidSpacing(f64),

    #[error("Cell '{0}' has no geometry and cannot be placed on a grid")]
    EmptyMember(String),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

/// Arrange cells on a `rows` x `cols` grid inside a new cell called `name`.
///
/// Members fill the grid row by row, first row on top. Each column is as
/// wide as its widest member and each row as tall as its tallest; members
/// are centered in their slot and slots are `spacing` apart.
pub fn arrange(
    db: &mut LayoutDatabase,
    name: &str,
    members: &[CellId],
    spacing: f64,
    (rows, cols): (usize, usize),
) -> Result<CellId, GridError> {
    if !spacing.is_finite() || spacing < 0.0 {
        return Err(GridError::InvalidSpacing(spacing));
    }
    if members.len() > rows * cols {
        return Err(GridError::ShapeTooSmall {
            rows,
            cols,
            members: members.len(),
        });
    }

    let mut boxes: Vec<BBox> = Vec::with_capacity(members.len());
    for id in members {
        let bbox = db.bbox(*id)?.ok_or_else(|| {
            let name = db.get_cell(id).map(|c| c.name.clone()).unwrap_or_default();
            GridError::EmptyMember(name)
        })?;
        boxes.push(bbox);
    }

    let mut col_widths = vec![0.0f64; cols];
    let mut row_heights = vec![0.0f64; rows];
    for (k, bbox) in boxes.iter().enumerate() {
        let (r, c) = (k / cols, k % cols);
        col_widths[c] = col_widths[c].max(bbox.width());
        row_heights[r] = row_heights[r].max(bbox.height());
    }

    let col_x: Vec<f64> = col_widths
        .iter()
        .scan(0.0, |x, w| {
            let start = *x;
            *x += w + spacing;
            Some(start)
        })
        .collect();
    let row_top: Vec<f64> = row_heights
        .iter()
        .scan(0.0, |y, h| {
            let top = *y;
            *y -= h + spacing;
            Some(top)
        })
        .collect();

    let grid_id = db.add_cell(Cell::new(name));
    for (k, (id, bbox)) in members.iter().zip(&boxes).enumerate() {
        let (r, c) = (k / cols, k % cols);
        let slot_cx = col_x[c] + col_widths[c] / 2.0;
        let slot_cy = row_top[r] - row_heights[r] / 2.0;
        let center = bbox.center();
        let transform = Transform::translate(slot_cx - center.x, slot_cy - center.y);
        let inst_name = db.get_cell(id).map(|c| c.name.clone()).unwrap_or_default();
        db.add_instance(grid_id, *id, &inst_name, transform)?;
    }

    log::info!(
        "Arranged {} cells on a {}x{} grid as '{}'",
        members.len(),
        rows,
        cols,
        name
    );
    Ok(grid_id)
}
