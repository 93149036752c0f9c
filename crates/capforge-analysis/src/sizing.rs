//! Capacitor sizing: plate dimensions to capacitance and back.
//!
//! A parallel-plate MIM capacitor is modeled by its area capacitance only:
//! `C = width * length * density`. Fringe and perimeter terms are ignored.
//! No process minimum is enforced here; see [`check_process_limits`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizingError {
    #[error("Invalid {name}: {value} (must be a finite value greater than zero)")]
    InvalidArgument { name: &'static str, value: f64 },
}

fn require_positive(name: &'static str, value: f64) -> Result<f64, SizingError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SizingError::InvalidArgument { name, value })
    }
}

/// Capacitance in fF of a `width` x `length` µm plate at `density` fF/µm².
pub fn capacitance_from_dimensions(width: f64, length: f64, density: f64) -> Result<f64, SizingError> {
    Ok(CapacitorSpec::new(width, length, density)?
        .evaluate()
        .capacitance_ff)
}

/// Side length of the square plate that yields `target_ff` at `density`.
///
/// Returned as `(width, length)`, which are equal.
pub fn dimensions_from_capacitance(target_ff: f64, density: f64) -> Result<(f64, f64), SizingError> {
    let target_ff = require_positive("target capacitance", target_ff)?;
    let density = require_positive("capacitance density", density)?;
    let side = (target_ff / density).sqrt();
    log::debug!("{target_ff} fF at {density} fF/um² -> {side:.4} x {side:.4} um");
    Ok((side, side))
}

/// Plate dimensions plus the process density they are evaluated at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitorSpec {
    width: f64,
    length: f64,
    density: f64,
}

impl CapacitorSpec {
    pub fn new(width: f64, length: f64, density: f64) -> Result<Self, SizingError> {
        Ok(Self {
            width: require_positive("width", width)?,
            length: require_positive("length", length)?,
            density: require_positive("capacitance density", density)?,
        })
    }

    /// Square plate sized for `target_ff`.
    pub fn for_target(target_ff: f64, density: f64) -> Result<Self, SizingError> {
        let (width, length) = dimensions_from_capacitance(target_ff, density)?;
        Self::new(width, length, density)
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn density(&self) -> f64 {
        self.density
    }

    pub fn evaluate(&self) -> CapacitorResult {
        let area_um2 = self.width * self.length;
        CapacitorResult {
            spec: *self,
            capacitance_ff: area_um2 * self.density,
            area_um2,
        }
    }
}

/// Derived electrical and geometric values of a [`CapacitorSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CapacitorResult {
    pub spec: CapacitorSpec,
    pub capacitance_ff: f64,
    pub area_um2: f64,
}

/// Optional process limits for advisory checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessLimits {
    pub min_side_um: Option<f64>,
    pub max_area_um2: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LimitWarning {
    BelowMinimumSide { side_um: f64, min_um: f64 },
    AboveMaximumArea { area_um2: f64, max_um2: f64 },
}

impl std::fmt::Display for LimitWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitWarning::BelowMinimumSide { side_um, min_um } => write!(
                f,
                "plate side {side_um:.3} um is below the process minimum of {min_um:.3} um"
            ),
            LimitWarning::AboveMaximumArea { area_um2, max_um2 } => write!(
                f,
                "plate area {area_um2:.2} um² exceeds the process maximum of {max_um2:.2} um²"
            ),
        }
    }
}

/// Compare a sized capacitor against optional process limits. Never fails
/// and does not adjust the result.
pub fn check_process_limits(result: &CapacitorResult, limits: &ProcessLimits) -> Vec<LimitWarning> {
    let mut warnings = Vec::new();
    if let Some(min_um) = limits.min_side_um {
        let side_um = result.spec.width.min(result.spec.length);
        if side_um < min_um {
            warnings.push(LimitWarning::BelowMinimumSide { side_um, min_um });
        }
    }
    if let Some(max_um2) = limits.max_area_um2 {
        if result.area_um2 > max_um2 {
            warnings.push(LimitWarning::AboveMaximumArea {
                area_um2: result.area_um2,
                max_um2,
            });
        }
    }
    warnings
}
