//! # CapForge Analysis
//!
//! Capacitor sizing and layout comparison.
//!
//! Both modules are pure: sizing is plain arithmetic, and the comparator
//! only talks to layouts through [`capforge_core::Layout`].

pub mod compare;
pub mod sizing;

pub use compare::{
    diff_layers, geometric_compare, layer_sets, Classification, ComparisonReport, LayerComparison,
    LayerDiff, LayerSet,
};
pub use sizing::{
    capacitance_from_dimensions, check_process_limits, dimensions_from_capacitance, CapacitorResult,
    CapacitorSpec, LimitWarning, ProcessLimits, SizingError,
};
