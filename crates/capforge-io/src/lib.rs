//! # CapForge I/O
//!
//! GDS-II stream reading and writing for [`capforge_core::LayoutDatabase`].

pub mod gds;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use capforge_core::{CellId, LayoutDatabase};

pub use gds::{GdsError, GdsReader, GdsWriter};

/// Write `top` and its sub-cells to a GDS file.
pub fn write_gds_file(
    path: impl AsRef<Path>,
    db: &LayoutDatabase,
    top: CellId,
) -> Result<(), GdsError> {
    let path = path.as_ref();
    let file = File::create(path)?;
    GdsWriter::new(BufWriter::new(file)).write_cell_tree(db, top)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

pub fn read_gds_file(path: impl AsRef<Path>) -> Result<LayoutDatabase, GdsError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let db = GdsReader::new(BufReader::new(file)).read()?;
    log::info!("Loaded {} ({} cells)", path.display(), db.cell_count());
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_core::{Cell, GeomPrimitive, LayerId, Rect};

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cap.gds");

        let mut db = LayoutDatabase::new("lib");
        let mut cell = Cell::new("cmim");
        cell.add_geometry(GeomPrimitive::Rect(Rect::new(LayerId::new(36, 0), 0.0, 0.0, 5.0, 5.0)));
        let top = db.add_cell(cell);

        write_gds_file(&path, &db, top).unwrap();
        let read = read_gds_file(&path).unwrap();
        assert_eq!(read.cell_names(), vec!["cmim"]);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_gds_file(dir.path().join("nope.gds")).unwrap_err();
        assert!(matches!(err, GdsError::Io(_)));
    }
}
