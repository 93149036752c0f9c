//! Fixed (non-parametrized) reference cells.

use capforge_analysis::CapacitorSpec;
use capforge_core::LayoutDatabase;

use super::cmim::{draw_plates, register};
use super::{Capacitor, CapacitorKind};
use crate::config::CmimRules;
use crate::{Pdk, PdkError};

/// Plate size of the reference MIM capacitor.
pub const REFERENCE_CMIM_SIZE_UM: f64 = 5.0;

/// The reference `cmim` cell, 5 x 5 µm, drawn with [`CmimRules::legacy`].
pub fn cmim(pdk: &Pdk, db: &mut LayoutDatabase) -> Result<Capacitor, PdkError> {
    let size = REFERENCE_CMIM_SIZE_UM;
    let result = CapacitorSpec::new(size, size, pdk.config().cmim_density_ff_per_um2)?.evaluate();
    let rules = CmimRules::legacy();
    register(pdk, db, "cmim", CapacitorKind::Cmim, &result, |cell| {
        draw_plates(pdk, cell, size, size, &rules).map(|_| ())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers;
    use capforge_analysis::{geometric_compare, Classification};
    use capforge_core::Layout;

    #[test]
    fn test_reference_differs_from_generated() {
        let pdk = Pdk::default();
        let mut db = LayoutDatabase::new("lib");
        let reference = pdk.fixed_cmim(&mut db).unwrap();
        let custom = pdk.cmim(&mut db, 5.0, 5.0).unwrap();

        assert_eq!(reference.name, "cmim");
        assert!((reference.info.capacitance_ff - 37.5).abs() < 1e-9);

        let a = db.flatten(reference.cell).unwrap();
        let b = db.flatten(custom.cell).unwrap();
        assert!(!a.layers().contains(&pdk.layer(layers::METAL4_NOFILL).unwrap()));

        let report = geometric_compare(&a, &b);
        assert_eq!(report.only_in_b.len(), 1);
        assert!(report.only_in_a.is_empty());
        assert_eq!(report.geometric_difference, Classification::PartialOverlap);
        let mim = report
            .per_layer
            .iter()
            .find(|l| l.layer == pdk.layer(layers::MIM).unwrap())
            .unwrap();
        assert_eq!(mim.classification, Classification::Identical);
    }
}
