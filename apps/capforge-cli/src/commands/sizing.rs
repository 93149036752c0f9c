use anyhow::Result;

use capforge_analysis::{CapacitorResult, CapacitorSpec};
use capforge_pdk::Pdk;

/// Square dimensions for a target capacitance.
pub fn size(pdk: &Pdk, target_ff: f64) -> Result<()> {
    let density = pdk.config().cmim_density_ff_per_um2;
    let result = CapacitorSpec::for_target(target_ff, density)?.evaluate();
    println!("Target capacitance: {} fF", target_ff);
    println!("Density: {} fF/um²", density);
    println!(
        "Required size: {:.3} x {:.3} um ({:.3} um²)",
        result.spec.width(),
        result.spec.length(),
        result.area_um2
    );
    println!("Actual capacitance: {:.2} fF", result.capacitance_ff);
    for warning in capforge_analysis::check_process_limits(&result, &pdk.config().limits()) {
        log::warn!("{}", warning);
    }
    Ok(())
}

pub fn capacitance(pdk: &Pdk, width: f64, length: f64) -> Result<()> {
    let result = evaluate(pdk, width, length)?;
    println!("Size: {} x {} um", result.spec.width(), result.spec.length());
    println!("Area: {:.3} um²", result.area_um2);
    println!("Capacitance: {:.3} fF", result.capacitance_ff);
    Ok(())
}

fn evaluate(pdk: &Pdk, width: f64, length: f64) -> Result<CapacitorResult> {
    let density = pdk.config().cmim_density_ff_per_um2;
    Ok(CapacitorSpec::new(width, length, density)?.evaluate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use capforge_analysis::SizingError;

    #[test]
    fn test_rejects_non_positive_target() {
        let err = size(&Pdk::default(), -1.0).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SizingError>(),
            Some(SizingError::InvalidArgument { .. })
        ));
        assert!(capacitance(&Pdk::default(), 5.0, 0.0).is_err());
        assert!(capacitance(&Pdk::default(), 5.0, 5.0).is_ok());
    }

    #[test]
    fn test_capacitance_uses_derived_values() {
        let result = evaluate(&Pdk::default(), 4.0, 2.5).unwrap();
        assert!((result.area_um2 - 10.0).abs() < 1e-9);
        assert!((result.capacitance_ff - 15.0).abs() < 1e-9);
        assert!(evaluate(&Pdk::default(), f64::NAN, 1.0).is_err());
    }
}
