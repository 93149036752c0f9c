use anyhow::{anyhow, Context, Result};

use capforge_analysis::{geometric_compare, Classification, ComparisonReport};
use capforge_core::{Cell, CellId, Point, Transform};

use crate::args::CompareArgs;
use crate::session::{rule, Session};

/// Horizontal distance between the two capacitors in the side-by-side cell.
const SIDE_BY_SIDE_PITCH: f64 = 50.0;
const LABEL_Y: f64 = -20.0;

struct Reference {
    cell: CellId,
    name: String,
    source: String,
}

fn load_reference(session: &mut Session, args: &CompareArgs) -> Result<Reference> {
    let Some(path) = &args.reference else {
        let cap = session.pdk.fixed_cmim(&mut session.db)?;
        return Ok(Reference {
            cell: cap.cell,
            name: cap.name,
            source: "built-in reference cell".to_string(),
        });
    };

    let lib = capforge_io::read_gds_file(path)
        .with_context(|| format!("failed to read reference {}", path.display()))?;
    let top = match &args.reference_cell {
        Some(name) => lib
            .find_cell_by_name(name)
            .map(|c| c.id)
            .ok_or_else(|| anyhow!("cell '{}' not found in {}", name, path.display()))?,
        None => lib
            .top_cell
            .ok_or_else(|| anyhow!("{} contains no cells", path.display()))?,
    };
    let cell = session.db.import_cell(&lib, top)?;
    let name = session
        .db
        .get_cell(&cell)
        .map(|c| c.name.clone())
        .unwrap_or_default();
    Ok(Reference {
        cell,
        name,
        source: path.display().to_string(),
    })
}

fn side_by_side(session: &mut Session, reference: CellId, custom: CellId) -> Result<CellId> {
    let label_layer = session.pdk.label_layer()?;
    let mut cell = Cell::new("capacitor_comparison");
    cell.add_label("REFERENCE", Point::new(0.0, LABEL_Y), label_layer);
    cell.add_label("CUSTOM", Point::new(SIDE_BY_SIDE_PITCH, LABEL_Y), label_layer);

    let db = &mut session.db;
    let id = db.add_cell(cell);
    let r = db.add_instance(id, reference, "reference", Transform::default())?;
    db.place_instance_center(id, r, Some(0.0), None)?;
    let c = db.add_instance(id, custom, "custom", Transform::default())?;
    db.place_instance_center(id, c, Some(SIDE_BY_SIDE_PITCH), None)?;
    Ok(id)
}

fn print_layers(session: &Session, report: &ComparisonReport) {
    let total_a = report.common_layers.len() + report.only_in_a.len();
    let total_b = report.common_layers.len() + report.only_in_b.len();
    say!(session, "   Reference has {} layers", total_a);
    say!(session, "   Custom has {} layers", total_b);

    if !report.common_layers.is_empty() {
        say!(
            session,
            "\n   ✓ Common layers ({}): {}",
            report.common_layers.len(),
            session.describe(&report.common_layers)
        );
    }
    if !report.only_in_a.is_empty() {
        say!(
            session,
            "\n   ⚠ Only in reference ({}): {}",
            report.only_in_a.len(),
            session.describe(&report.only_in_a)
        );
    }
    if !report.only_in_b.is_empty() {
        say!(
            session,
            "\n   ℹ Only in custom ({}): {}",
            report.only_in_b.len(),
            session.describe(&report.only_in_b)
        );
    }

    say!(session, "\n   Geometric difference: {}", report.geometric_difference);
    for layer in &report.per_layer {
        say!(
            session,
            "     {:<28} {:<16} common {:>9.3} um²  xor {:>9.3} um²",
            session.pdk.layers().display_name(layer.layer),
            layer.classification.to_string(),
            layer.common_area,
            layer.xor_area
        );
    }
}

pub fn run(session: &mut Session, args: &CompareArgs) -> Result<()> {
    // The custom cell goes in first so an imported reference with the same
    // name is the one that gets renamed.
    let custom = session.pdk.cmim(&mut session.db, args.width, args.length)?;
    let reference = load_reference(session, args)?;

    say!(session, "{}", rule(70));
    say!(session, "CAPACITOR COMPARISON: Custom vs Reference");
    say!(session, "{}", rule(70));

    say!(session, "\n📁 Loading reference capacitor...");
    say!(session, "   ✓ Loaded: {}", reference.name);
    say!(session, "   - File: {}", reference.source);
    say!(session, "   - Layers: {}", session.describe(&session.layers(reference.cell)?));

    say!(session, "\n🔨 Creating custom capacitor...");
    say!(session, "   ✓ Created: {}", custom.name);
    say!(session, "   - Width: {} µm", custom.info.width);
    say!(session, "   - Length: {} µm", custom.info.length);
    say!(session, "   - Capacitance: {} fF", custom.info.capacitance_ff);
    say!(session, "   - Layers: {}", session.describe(&session.layers(custom.cell)?));
    session.check_limits(&custom);

    say!(session, "\n🔍 Layer Comparison:");
    let flat_ref = session.db.flatten(reference.cell)?;
    let flat_custom = session.db.flatten(custom.cell)?;
    let report = geometric_compare(&flat_ref, &flat_custom);
    print_layers(session, &report);

    say!(session, "\n📊 Creating side-by-side comparison...");
    let comparison = side_by_side(session, reference.cell, custom.cell)?;
    session.export(comparison, "output_comparison.gds");

    say!(session, "\n🔬 Creating XOR difference analysis...");
    match (report.difference_cell(), &report.geometric_difference) {
        (Some(cell), _) => {
            let xor = session.db.add_cell(cell);
            if session.export(xor, "output_xor_difference.gds") {
                say!(session, "   Note: XOR shapes show where reference and custom differ");
            }
        }
        (None, Classification::Error(reason)) => {
            say!(session, "   ⚠ Could not create XOR: {}", reason);
        }
        (None, _) => {}
    }

    say!(session, "\n💾 Exporting individual files...");
    session.export(reference.cell, "output_reference_only.gds");
    session.export(custom.cell, "output_custom_only.gds");

    say!(session, "\n{}", rule(70));
    say!(session, "SUMMARY");
    say!(session, "{}", rule(70));
    say!(session, "\n✅ Generated Files:");
    say!(session, "   1. output_comparison.gds       - Side-by-side comparison");
    say!(session, "   2. output_reference_only.gds   - Reference capacitor only");
    say!(session, "   3. output_custom_only.gds      - Custom capacitor only");
    say!(session, "   4. output_xor_difference.gds   - Difference analysis");
    say!(session, "\n{}", rule(70));

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_core::Layout;
    use capforge_pdk::Pdk;

    fn session(dir: &std::path::Path) -> Session {
        let mut s = Session::new(Pdk::default(), dir).unwrap();
        s.quiet = true;
        s
    }

    fn args() -> CompareArgs {
        CompareArgs {
            reference: None,
            reference_cell: None,
            width: 5.0,
            length: 5.0,
            json: false,
        }
    }

    #[test]
    fn test_side_by_side_centers() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let a = s.pdk.fixed_cmim(&mut s.db).unwrap();
        let b = s.pdk.cmim(&mut s.db, 5.0, 5.0).unwrap();
        let id = side_by_side(&mut s, a.cell, b.cell).unwrap();

        let cell = s.db.get_cell(&id).unwrap();
        assert_eq!(cell.labels.len(), 2);
        let centers: Vec<Point> = cell
            .instances
            .iter()
            .map(|i| s.db.instance_center(i).unwrap().unwrap())
            .collect();
        assert!(centers[0].x.abs() < 1e-9);
        assert!((centers[1].x - SIDE_BY_SIDE_PITCH).abs() < 1e-9);
    }

    #[test]
    fn test_builtin_reference_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        run(&mut s, &args()).unwrap();
        assert!(dir.path().join("output_xor_difference.gds").is_file());
        s.finish().unwrap();
    }

    #[test]
    fn test_missing_reference_cell() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let cap = s.pdk.cmim(&mut s.db, 3.0, 3.0).unwrap();
        s.export(cap.cell, "ref.gds");

        let a = CompareArgs {
            reference: Some(dir.path().join("ref.gds")),
            reference_cell: Some("nope".into()),
            ..args()
        };
        let err = run(&mut s, &a).unwrap_err();
        assert!(err.to_string().contains("cell 'nope' not found"));
    }

    #[test]
    fn test_reference_name_clash_is_renamed() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let cap = s.pdk.cmim(&mut s.db, 5.0, 5.0).unwrap();
        s.export(cap.cell, "same.gds");

        let mut s = session(dir.path());
        let a = CompareArgs {
            reference: Some(dir.path().join("same.gds")),
            ..args()
        };
        let custom = s.pdk.cmim(&mut s.db, 5.0, 5.0).unwrap();
        let reference = load_reference(&mut s, &a).unwrap();
        assert_eq!(reference.name, "cmim_W5_L5$1");
        assert_ne!(reference.cell, custom.cell);

        let report = geometric_compare(
            &s.db.flatten(reference.cell).unwrap(),
            &s.db.flatten(custom.cell).unwrap(),
        );
        assert_eq!(report.geometric_difference, Classification::Identical);
        assert!(s.db.flatten(reference.cell).unwrap().bbox().is_some());
    }
}
