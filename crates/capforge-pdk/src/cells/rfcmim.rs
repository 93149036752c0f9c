use capforge_analysis::CapacitorSpec;
use capforge_core::{GeomPrimitive, LayoutDatabase, Pin, PinDirection, Rect};

use super::cmim::{draw_plates, register};
use super::{dim_tag, Capacitor, CapacitorKind};
use crate::layers;
use crate::{Pdk, PdkError};

/// RF MIM capacitor: the plate stack inside a Metal1 ground ring over a
/// PWell block. Adds a `TIE_LOW` port on the ring.
pub fn rfcmim(pdk: &Pdk, db: &mut LayoutDatabase, width: f64, length: f64) -> Result<Capacitor, PdkError> {
    let result = CapacitorSpec::new(width, length, pdk.config().rfcmim_density_ff_per_um2)?.evaluate();
    let name = format!("rfcmim_W{}_L{}", dim_tag(width), dim_tag(length));
    let rules = pdk.config().cmim;

    register(pdk, db, &name, CapacitorKind::Rfcmim, &result, |cell| {
        let bottom = draw_plates(pdk, cell, width, length, &rules)?;
        let m1 = pdk.layer(layers::METAL1)?;

        let inner = bottom.expand(rules.rf_ring_gap);
        let outer = inner.expand(rules.rf_ring_width);
        let strips = [
            Rect::new(m1, outer.min.x, outer.min.y, outer.max.x, inner.min.y),
            Rect::new(m1, outer.min.x, inner.max.y, outer.max.x, outer.max.y),
            Rect::new(m1, inner.max.x, inner.min.y, outer.max.x, inner.max.y),
        ];
        cell.add_pin(Pin::new(
            "TIE_LOW",
            GeomPrimitive::Rect(Rect::new(m1, outer.min.x, inner.min.y, inner.min.x, inner.max.y)),
            PinDirection::Ground,
        ));
        for strip in strips {
            cell.add_geometry(GeomPrimitive::Rect(strip));
        }
        cell.add_geometry(GeomPrimitive::Rect(Rect::from_bbox(
            pdk.layer(layers::PWELL_BLOCK)?,
            &outer,
        )));
        Ok(())
    })
}
