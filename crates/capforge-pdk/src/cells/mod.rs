//! MIM capacitor cell factories.

pub mod cmim;
pub mod fixed;
pub mod rfcmim;

use std::fmt;

use capforge_analysis::CapacitorResult;
use capforge_core::{BBox, Cell, CellId, GeomPrimitive, LayerId, LayoutDatabase, Point, Via};
use serde::{Deserialize, Serialize};

use crate::{Pdk, PdkError};

pub(crate) const FACTORY_NAMES: [&str; 3] = ["cmim", "rfcmim", "cmim_ref"];

/// Parameters for [`Pdk::cell`]. Fixed cells ignore them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CellParams {
    pub width: Option<f64>,
    pub length: Option<f64>,
}

impl CellParams {
    pub fn new(width: f64, length: f64) -> Self {
        Self {
            width: Some(width),
            length: Some(length),
        }
    }

    fn require(&self, cell: &str) -> Result<(f64, f64), PdkError> {
        let missing = |param| PdkError::MissingParameter {
            cell: cell.to_string(),
            param,
        };
        Ok((
            self.width.ok_or_else(|| missing("width"))?,
            self.length.ok_or_else(|| missing("length"))?,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacitorKind {
    Cmim,
    Rfcmim,
}

impl fmt::Display for CapacitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacitorKind::Cmim => write!(f, "MIM"),
            CapacitorKind::Rfcmim => write!(f, "RF MIM"),
        }
    }
}

/// Dimensions and electrical values of a generated capacitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacitorInfo {
    pub kind: CapacitorKind,
    pub width: f64,
    pub length: f64,
    pub capacitance_ff: f64,
    pub area_um2: f64,
    pub ports: Vec<String>,
}

impl CapacitorInfo {
    fn new(kind: CapacitorKind, result: &CapacitorResult, ports: Vec<String>) -> Self {
        Self {
            kind,
            width: result.spec.width(),
            length: result.spec.length(),
            capacitance_ff: result.capacitance_ff,
            area_um2: result.area_um2,
            ports,
        }
    }
}

/// Handle to a capacitor cell stored in a [`LayoutDatabase`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capacitor {
    pub cell: CellId,
    pub name: String,
    pub info: CapacitorInfo,
}

pub(crate) fn build(
    pdk: &Pdk,
    db: &mut LayoutDatabase,
    name: &str,
    params: &CellParams,
) -> Result<Capacitor, PdkError> {
    match name {
        "cmim" => {
            let (w, l) = params.require(name)?;
            cmim::cmim(pdk, db, w, l)
        }
        "rfcmim" => {
            let (w, l) = params.require(name)?;
            rfcmim::rfcmim(pdk, db, w, l)
        }
        "cmim_ref" => fixed::cmim(pdk, db),
        other => Err(PdkError::UnknownCell(other.to_string())),
    }
}

/// Cell-name fragment for a dimension: `5.0` -> `5`, `8.165` -> `8p165`.
pub(crate) fn dim_tag(value: f64) -> String {
    let s = format!("{value:.3}");
    s.trim_end_matches('0')
        .trim_end_matches('.')
        .replace('.', "p")
}

/// Centers of a square via array fitting inside `region`, centered in it.
pub(crate) fn via_array(region: &BBox, size: f64, spacing: f64) -> Vec<Point> {
    let pitch = size + spacing;
    let count = |avail: f64| {
        if avail < size {
            0
        } else {
            ((avail - size) / pitch + 1e-9).floor() as usize + 1
        }
    };
    let (nx, ny) = (count(region.width()), count(region.height()));
    if nx == 0 || ny == 0 {
        return Vec::new();
    }
    let span_x = (nx - 1) as f64 * pitch;
    let span_y = (ny - 1) as f64 * pitch;
    let c = region.center();
    let (x0, y0) = (c.x - span_x / 2.0, c.y - span_y / 2.0);
    (0..ny)
        .flat_map(|j| (0..nx).map(move |i| Point::new(x0 + i as f64 * pitch, y0 + j as f64 * pitch)))
        .collect()
}

pub(crate) fn add_vias(
    cell: &mut Cell,
    region: &BBox,
    size: f64,
    spacing: f64,
    (bottom, top, cut): (LayerId, LayerId, LayerId),
) -> usize {
    let centers = via_array(region, size, spacing);
    for p in &centers {
        cell.add_geometry(GeomPrimitive::Via(Via::new(bottom, top, cut, *p, size, size)));
    }
    centers.len()
}
