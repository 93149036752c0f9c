//! # CapForge Core
//!
//! Layout database with hierarchical cell management, geometric primitives,
//! grid placement, spatial indexing (R-tree) and Manhattan boolean
//! operations.
//!
//! Everything the capacitor tooling knows about geometry goes through this
//! crate.

pub mod boolean;
pub mod cell;
pub mod database;
pub mod geometry;
pub mod grid;
pub mod layer;
pub mod layout;
pub mod spatial;

pub use boolean::{BooleanError, LayerOverlap, XorResult};
pub use cell::{Cell, CellId, CellInstance, Label, Pin, PinDirection, Transform};
pub use database::{HierarchyError, LayoutDatabase};
pub use geometry::{BBox, GeomPrimitive, Path, Point, Polygon, Rect, Via};
pub use grid::GridError;
pub use layer::{Layer, LayerId, LayerStack};
pub use layout::{FlatLayout, Layout};
