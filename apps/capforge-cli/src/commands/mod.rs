//! One module per `capforge` subcommand.

pub mod compare;
pub mod draw;
pub mod sizes;
pub mod sizing;
pub mod visualize;

use anyhow::Result;

use capforge_core::grid;
use capforge_core::CellId;
use capforge_pdk::Capacitor;

use crate::session::Session;

/// Square capacitors used by the grid and size-comparison layouts.
pub(crate) const GRID_SIZES: [f64; 4] = [3.0, 5.0, 8.0, 10.0];

/// One square cmim per entry of [`GRID_SIZES`].
pub(crate) fn size_series(session: &mut Session) -> Result<Vec<Capacitor>> {
    let mut caps = Vec::with_capacity(GRID_SIZES.len());
    for size in GRID_SIZES {
        caps.push(session.pdk.cmim(&mut session.db, size, size)?);
    }
    Ok(caps)
}

/// 2 x 2 grid of capacitors in a new `capacitor_grid` cell.
pub(crate) fn capacitor_grid(session: &mut Session, caps: &[Capacitor], spacing: f64) -> Result<CellId> {
    let members: Vec<CellId> = caps.iter().map(|c| c.cell).collect();
    Ok(grid::arrange(&mut session.db, "capacitor_grid", &members, spacing, (2, 2))?)
}
