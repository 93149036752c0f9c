use anyhow::Result;

use capforge_core::{Cell, CellId, LayerId, Point, Transform};

use super::GRID_SIZES;
use crate::session::{rule, Session};

const SIZE_GAP: f64 = 10.0;
const DEMO_ROWS: [f64; 3] = [60.0, 0.0, -60.0];

const STRUCTURE_LABELS: [(&str, f64); 5] = [
    ("Metal4 (Bottom)", 5.0),
    ("Metal5 (Top)", 3.0),
    ("MIM Dielectric", 1.0),
    ("Via4 Array", -1.0),
    ("TopMetal1", -3.0),
];

/// New cell holding `labels`; returns its id.
fn labelled_cell(session: &mut Session, name: &str, labels: &[(String, Point)]) -> Result<CellId> {
    let layer: LayerId = session.pdk.label_layer()?;
    let mut cell = Cell::new(name);
    for (text, at) in labels {
        cell.add_label(text, *at, layer);
    }
    Ok(session.db.add_cell(cell))
}

/// Instantiate `child` in `parent`, centered at `x` and/or `y`.
fn place(session: &mut Session, parent: CellId, child: CellId, name: &str, x: Option<f64>, y: Option<f64>) -> Result<()> {
    let idx = session.db.add_instance(parent, child, name, Transform::default())?;
    session.db.place_instance_center(parent, idx, x, y)?;
    Ok(())
}

fn annotated_capacitor(session: &mut Session) -> Result<CellId> {
    let cap = session.pdk.cmim(&mut session.db, 5.0, 5.0)?;
    let mut labels = vec![
        (
            format!("IHP CMIM CAPACITOR - {}x{}um", cap.info.width, cap.info.length),
            Point::new(0.0, 15.0),
        ),
        (format!("{} fF", cap.info.capacitance_ff), Point::new(0.0, 12.0)),
    ];
    labels.extend(
        STRUCTURE_LABELS
            .iter()
            .map(|(text, y)| (text.to_string(), Point::new(-15.0, *y))),
    );

    let id = labelled_cell(session, "annotated_capacitor", &labels)?;
    session.db.add_instance(id, cap.cell, "cap", Transform::default())?;
    Ok(id)
}

fn size_comparison(session: &mut Session) -> Result<CellId> {
    let mut caps = Vec::new();
    let mut labels = vec![("CAPACITOR SIZE COMPARISON".to_string(), Point::new(15.0, 15.0))];
    let mut x = 0.0;
    for size in GRID_SIZES {
        let cap = session.pdk.cmim(&mut session.db, size, size)?;
        labels.push((
            format!("{}x{}um\n{}fF", size, size, cap.info.capacitance_ff),
            Point::new(x, -15.0),
        ));
        caps.push((cap, x));
        x += size + SIZE_GAP;
    }

    let id = labelled_cell(session, "size_comparison", &labels)?;
    for (cap, x) in caps {
        place(session, id, cap.cell, &cap.name, Some(x), None)?;
    }
    Ok(id)
}

fn reference_comparison(session: &mut Session) -> Result<CellId> {
    let reference = session.pdk.fixed_cmim(&mut session.db)?;
    let custom = session.pdk.cmim(&mut session.db, 5.0, 5.0)?;
    let labels = [
        ("REFERENCE\n(fixed cell)".to_string(), Point::new(-20.0, -15.0)),
        ("CUSTOM\n(programmatic)".to_string(), Point::new(20.0, -15.0)),
        ("REFERENCE vs CUSTOM COMPARISON".to_string(), Point::new(0.0, 20.0)),
    ];

    let id = labelled_cell(session, "ref_vs_custom", &labels)?;
    place(session, id, reference.cell, "reference", Some(-20.0), None)?;
    place(session, id, custom.cell, "custom", Some(20.0), None)?;
    Ok(id)
}

pub fn run(session: &mut Session) -> Result<()> {
    say!(session, "{}", rule(70));
    say!(session, "IHP CAPACITOR VISUALIZATION");
    say!(session, "{}", rule(70));

    say!(session, "\n1. Creating annotated capacitor...");
    let annotated = annotated_capacitor(session)?;
    session.export(annotated, "viz_annotated_capacitor.gds");

    say!(session, "\n2. Creating size comparison...");
    let sizes = size_comparison(session)?;
    session.export(sizes, "viz_size_comparison.gds");

    say!(session, "\n3. Creating reference comparison...");
    let refs = reference_comparison(session)?;
    session.export(refs, "viz_reference_comparison.gds");

    say!(session, "\n4. Creating complete demo layout...");
    let demo = session.db.add_cell(Cell::new("complete_demo"));
    for (child, y) in [annotated, sizes, refs].into_iter().zip(DEMO_ROWS) {
        place(session, demo, child, "view", None, Some(y))?;
    }
    session.export(demo, "viz_complete_demo.gds");

    say!(session, "\n{}", rule(70));
    say!(session, "VISUALIZATION FILES CREATED");
    say!(session, "{}", rule(70));
    say!(session, "\nGenerated files:");
    say!(session, "  1. viz_annotated_capacitor.gds   - Single capacitor with labels");
    say!(session, "  2. viz_size_comparison.gds       - Different sizes side-by-side");
    say!(session, "  3. viz_reference_comparison.gds  - Reference vs custom");
    say!(session, "  4. viz_complete_demo.gds         - All visualizations combined");
    say!(session, "\n{}", rule(70));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_pdk::Pdk;

    fn session(dir: &std::path::Path) -> Session {
        let mut s = Session::new(Pdk::default(), dir).unwrap();
        s.quiet = true;
        s
    }

    #[test]
    fn test_annotated_labels() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let id = annotated_capacitor(&mut s).unwrap();
        let cell = s.db.get_cell(&id).unwrap();
        assert_eq!(cell.labels[0].text, "IHP CMIM CAPACITOR - 5x5um");
        assert_eq!(cell.labels[1].text, "37.5 fF");
        assert_eq!(cell.labels.len(), 7);
        assert_eq!(cell.instances.len(), 1);
    }

    #[test]
    fn test_size_comparison_layout() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        let id = size_comparison(&mut s).unwrap();
        let cell = s.db.get_cell(&id).unwrap();
        let texts: Vec<&str> = cell.labels.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "CAPACITOR SIZE COMPARISON",
                "3x3um\n13.5fF",
                "5x5um\n37.5fF",
                "8x8um\n96fF",
                "10x10um\n150fF",
            ]
        );
        // Centers at 0, 13, 28, 46
        let xs: Vec<f64> = cell
            .instances
            .iter()
            .map(|i| s.db.instance_center(i).unwrap().unwrap().x)
            .collect();
        for (x, want) in xs.iter().zip([0.0, 13.0, 28.0, 46.0]) {
            assert!((x - want).abs() < 1e-9, "{x} != {want}");
        }
    }

    #[test]
    fn test_complete_demo_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = session(dir.path());
        run(&mut s).unwrap();
        let demo = s.db.find_cell_by_name("complete_demo").unwrap();
        let ys: Vec<f64> = demo
            .instances
            .iter()
            .map(|i| s.db.instance_center(i).unwrap().unwrap().y)
            .collect();
        assert_eq!(ys.len(), 3);
        for (y, want) in ys.iter().zip(DEMO_ROWS) {
            assert!((y - want).abs() < 1e-9);
        }
        s.finish().unwrap();
    }
}
