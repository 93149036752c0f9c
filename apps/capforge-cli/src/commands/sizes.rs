use anyhow::Result;

use capforge_analysis::CapacitorSpec;

use super::{capacitor_grid, size_series};
use crate::session::{rule, Session};

const TARGET_FF: f64 = 100.0;

const LAYER_LEGEND: [&str; 8] = [
    "Metal4 (bottom plate)",
    "Metal5 (top plate)",
    "MIM (dielectric)",
    "Via4 (connections)",
    "TopMetal1 (routing)",
    "TopVia1 (vias)",
    "MemCap (capacitor marker)",
    "Metal4nofill (no-fill region)",
];

pub fn run(session: &mut Session) -> Result<()> {
    say!(session, "{}", rule(60));
    say!(session, "IHP CMIM Capacitor Examples");
    say!(session, "{}", rule(60));

    say!(session, "\n1. Reference CMIM capacitor:");
    let reference = session.pdk.fixed_cmim(&mut session.db)?;
    say!(session, "   - Component: {}", reference.name);
    say!(session, "   - Layers: {}", session.describe(&session.layers(reference.cell)?));
    say!(session, "   - Bounding box: {}", session.bbox_of(reference.cell)?);

    say!(session, "\n2. Custom CMIM capacitors:");
    let caps = size_series(session)?;
    for (i, cap) in caps.iter().enumerate() {
        say!(session, "\n   Capacitor {}:", i + 1);
        say!(session, "     - Size: {} x {} um", cap.info.width, cap.info.length);
        say!(session, "     - Capacitance: {:.2} fF", cap.info.capacitance_ff);
        say!(session, "     - Area: {:.2} um²", cap.info.area_um2);
        say!(session, "     - Ports: {:?}", cap.info.ports);
        session.check_limits(cap);
    }

    say!(session, "\n3. Creating a grid layout with all capacitors...");
    let grid = capacitor_grid(session, &caps, 30.0)?;
    say!(session, "   - Grid contains {} capacitors", caps.len());
    say!(session, "   - Grid bounding box: {}", session.bbox_of(grid)?);

    say!(session, "\n4. Design a capacitor for target capacitance:");
    let density = session.pdk.config().cmim_density_ff_per_um2;
    let spec = CapacitorSpec::for_target(TARGET_FF, density)?;
    let target = session.pdk.cmim(&mut session.db, spec.width(), spec.length())?;
    say!(session, "   - Target capacitance: {} fF", TARGET_FF);
    say!(session, "   - Required size: {:.2} x {:.2} um", spec.width(), spec.length());
    say!(session, "   - Actual capacitance: {:.2} fF", target.info.capacitance_ff);
    session.check_limits(&target);

    say!(session, "\n5. Exporting GDS files...");
    let medium = &caps[1];
    session.export(reference.cell, "output_cmim_reference.gds");
    session.export(medium.cell, "output_cmim_5x5.gds");
    session.export(target.cell, "output_cmim_target_100fF.gds");
    session.export(grid, "output_capacitor_grid.gds");

    say!(session, "\n6. Layer information for CMIM capacitor:");
    for entry in LAYER_LEGEND {
        say!(session, "   - {}", entry);
    }

    say!(session, "\n{}", rule(60));
    say!(session, "Done! GDS files generated successfully.");
    say!(session, "{}", rule(60));

    say!(session, "\n7. Comparing reference vs custom capacitor:");
    say!(session, "   Reference: {}", reference.name);
    say!(session, "     - Bounding box: {}", session.bbox_of(reference.cell)?);
    say!(session, "\n   Custom (5x5um): {}", medium.name);
    say!(session, "     - Bounding box: {}", session.bbox_of(medium.cell)?);
    say!(session, "\n{}", rule(60));
    Ok(())
}
