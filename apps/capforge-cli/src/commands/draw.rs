use anyhow::Result;

use super::{capacitor_grid, size_series};
use crate::session::{rule, Session};

pub fn run(session: &mut Session) -> Result<()> {
    say!(session, "{}", rule(60));
    say!(session, "IHP Capacitor Examples");
    say!(session, "{}", rule(60));

    say!(session, "\n1. Reference CMIM capacitor:");
    let reference = session.pdk.fixed_cmim(&mut session.db)?;
    say!(session, "   - Component: {}", reference.name);
    say!(session, "   - Layers: {}", session.describe(&session.layers(reference.cell)?));

    say!(session, "\n2. Custom CMIM capacitor (5x5 um):");
    let custom = session.pdk.cmim(&mut session.db, 5.0, 5.0)?;
    session.print_capacitor(&custom);

    say!(session, "\n3. RF CMIM capacitor (10x10 um):");
    let rf = session.pdk.rfcmim(&mut session.db, 10.0, 10.0)?;
    session.print_capacitor(&rf);
    say!(session, "   - Type: {}", rf.info.kind);

    say!(session, "\n4. Creating a grid of capacitors with different sizes...");
    let caps = size_series(session)?;
    let grid = capacitor_grid(session, &caps, 20.0)?;
    say!(session, "   - Grid created with {} capacitors", caps.len());

    say!(session, "\n5. Exporting designs...");
    session.export(reference.cell, "output_cmim_reference.gds");
    session.export(custom.cell, "output_cmim_custom.gds");
    session.export(rf.cell, "output_rfcmim.gds");
    session.export(grid, "output_capacitor_grid.gds");

    say!(session, "\n{}", rule(60));
    say!(session, "Done! You can view the GDS files in KLayout.");
    say!(session, "{}", rule(60));
    Ok(())
}
