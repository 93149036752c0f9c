use capforge_analysis::{CapacitorResult, CapacitorSpec};
use capforge_core::{BBox, Cell, GeomPrimitive, LayoutDatabase, Pin, PinDirection, Point, Rect};

use super::{add_vias, dim_tag, Capacitor, CapacitorInfo, CapacitorKind};
use crate::config::CmimRules;
use crate::layers;
use crate::{Pdk, PdkError};

/// Draw the plate stack of a `width` x `length` MIM capacitor with its
/// dielectric at the origin. Returns the bottom plate extent.
///
/// Ports: `PLUS` on the TopMetal1 top plate, `MINUS` on the Metal4 bottom
/// plate.
pub(crate) fn draw_plates(
    pdk: &Pdk,
    cell: &mut Cell,
    width: f64,
    length: f64,
    rules: &CmimRules,
) -> Result<BBox, PdkError> {
    let m4 = pdk.layer(layers::METAL4)?;
    let via4 = pdk.layer(layers::VIA4)?;
    let m5 = pdk.layer(layers::METAL5)?;
    let mim_layer = pdk.layer(layers::MIM)?;
    let top_via = pdk.layer(layers::TOP_VIA1)?;
    let tm1 = pdk.layer(layers::TOP_METAL1)?;

    let mim = BBox::new(Point::new(0.0, 0.0), Point::new(width, length));
    let bottom = mim.expand(rules.bottom_plate_enclosure);

    cell.add_pin(Pin::new(
        "MINUS",
        GeomPrimitive::Rect(Rect::from_bbox(m4, &bottom)),
        PinDirection::InOut,
    ));
    cell.add_geometry(GeomPrimitive::Rect(Rect::from_bbox(mim_layer, &mim)));
    cell.add_geometry(GeomPrimitive::Rect(Rect::from_bbox(m5, &mim)));
    let n_via4 = add_vias(
        cell,
        &mim.expand(-rules.via_enclosure),
        rules.via_size,
        rules.via_spacing,
        (m4, m5, via4),
    );

    cell.add_pin(Pin::new(
        "PLUS",
        GeomPrimitive::Rect(Rect::from_bbox(tm1, &mim)),
        PinDirection::InOut,
    ));
    let n_top = add_vias(
        cell,
        &mim.expand(-rules.top_via_enclosure),
        rules.top_via_size,
        rules.top_via_spacing,
        (m5, tm1, top_via),
    );

    cell.add_geometry(GeomPrimitive::Rect(Rect::from_bbox(
        pdk.layer(layers::MEMCAP)?,
        &bottom,
    )));
    if rules.draw_nofill {
        cell.add_geometry(GeomPrimitive::Rect(Rect::from_bbox(
            pdk.layer(layers::METAL4_NOFILL)?,
            &bottom.expand(rules.nofill_margin),
        )));
    }

    log::debug!(
        "Drew '{}': {} Via4, {} TopVia1",
        cell.name,
        n_via4,
        n_top
    );
    Ok(bottom)
}

/// Width and length of the dielectric drawn in `cell`.
fn drawn_size(pdk: &Pdk, cell: &Cell) -> Option<(f64, f64)> {
    let mim = pdk.layer(layers::MIM).ok()?;
    let bb = cell.geometries_on_layer(mim).first()?.bbox()?;
    Some((bb.width(), bb.height()))
}

/// Register a freshly drawn capacitor, or reuse a cell of the same name
/// (or a `$n` variant of it) whose dielectric has exactly the requested
/// size. Names carry dimensions rounded to 1 nm, so two requests may
/// share a name but not a cell.
pub(crate) fn register(
    pdk: &Pdk,
    db: &mut LayoutDatabase,
    name: &str,
    kind: CapacitorKind,
    result: &CapacitorResult,
    draw: impl FnOnce(&mut Cell) -> Result<(), PdkError>,
) -> Result<Capacitor, PdkError> {
    let size = (result.spec.width(), result.spec.length());
    let cached = db.all_cells().find(|c| {
        let same_name = c.name == name
            || c.name
                .strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('$'));
        same_name && drawn_size(pdk, c) == Some(size)
    });
    if let Some(existing) = cached {
        log::debug!("Reusing cell '{}'", existing.name);
        return Ok(Capacitor {
            cell: existing.id,
            name: existing.name.clone(),
            info: CapacitorInfo::new(kind, result, existing.port_names()),
        });
    }

    let mut cell = Cell::new(name);
    draw(&mut cell)?;
    let info = CapacitorInfo::new(kind, result, cell.port_names());
    let id = db.add_cell(cell);
    let name = db
        .get_cell(&id)
        .map_or_else(|| name.to_string(), |c| c.name.clone());
    log::info!(
        "Created {} '{}': {:.2} x {:.2} um, {:.2} fF",
        kind,
        name,
        info.width,
        info.length,
        info.capacitance_ff
    );
    Ok(Capacitor {
        cell: id,
        name,
        info,
    })
}

/// Parametrized MIM capacitor.
pub fn cmim(pdk: &Pdk, db: &mut LayoutDatabase, width: f64, length: f64) -> Result<Capacitor, PdkError> {
    let result = CapacitorSpec::new(width, length, pdk.config().cmim_density_ff_per_um2)?.evaluate();
    let name = format!("cmim_W{}_L{}", dim_tag(width), dim_tag(length));
    let rules = pdk.config().cmim;
    register(pdk, db, &name, CapacitorKind::Cmim, &result, |cell| {
        draw_plates(pdk, cell, width, length, &rules).map(|_| ())
    })
}
