//! # CapForge PDK
//!
//! Process configuration and parametrized MIM capacitor cells.
//!
//! A [`Pdk`] is an ordinary value built from a [`ProcessConfig`]; nothing is
//! activated globally. Cell factories are looked up by name through
//! [`Pdk::cell`] or called directly.

pub mod cells;
pub mod config;
pub mod layers;

use capforge_analysis::SizingError;
use capforge_core::{LayerId, LayerStack, LayoutDatabase};
use thiserror::Error;

pub use cells::{Capacitor, CapacitorInfo, CapacitorKind, CellParams};
pub use config::{CmimRules, ConfigError, LayerConfig, ProcessConfig};

#[derive(Error, Debug)]
pub enum PdkError {
    #[error("Layer '{0}' is not in the process layer map")]
    UnknownLayer(String),

    #[error("No cell factory named '{0}'")]
    UnknownCell(String),

    #[error("Cell '{cell}' requires parameter '{param}'")]
    MissingParameter { cell: String, param: &'static str },

    #[error("Invalid process config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Sizing(#[from] SizingError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// An instantiated process: config plus its resolved layer map.
#[derive(Debug, Clone)]
pub struct Pdk {
    config: ProcessConfig,
    layers: LayerStack,
}

impl Pdk {
    /// Validate a config and resolve its layer map.
    pub fn new(config: ProcessConfig) -> Result<Self, PdkError> {
        for (what, density) in [
            ("cmim density", config.cmim_density_ff_per_um2),
            ("rfcmim density", config.rfcmim_density_ff_per_um2),
        ] {
            if !(density.is_finite() && density > 0.0) {
                return Err(PdkError::InvalidConfig(format!("{what} must be positive, got {density}")));
            }
        }

        let pdk = Self {
            layers: config.layer_stack(),
            config,
        };
        for name in layers::CMIM_LAYERS
            .iter()
            .chain([&layers::METAL1, &layers::PWELL_BLOCK])
        {
            pdk.layer(name)?;
        }
        pdk.label_layer()?;

        log::info!(
            "Process '{}' ready: {} layers, cmim {} fF/um²",
            pdk.config.name,
            pdk.layers.layer_count(),
            pdk.config.cmim_density_ff_per_um2
        );
        Ok(pdk)
    }

    /// Load a TOML process config and build a PDK from it.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, PdkError> {
        Self::new(ProcessConfig::from_toml_file(path)?)
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn layers(&self) -> &LayerStack {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Result<LayerId, PdkError> {
        self.layers
            .get_layer_by_name(name)
            .map(|l| l.id)
            .ok_or_else(|| PdkError::UnknownLayer(name.to_string()))
    }

    pub fn label_layer(&self) -> Result<LayerId, PdkError> {
        self.layer(&self.config.label_layer)
    }

    /// Names accepted by [`Pdk::cell`].
    pub fn cell_names(&self) -> &'static [&'static str] {
        &cells::FACTORY_NAMES
    }

    /// Instantiate a cell by factory name.
    pub fn cell(
        &self,
        db: &mut LayoutDatabase,
        name: &str,
        params: &CellParams,
    ) -> Result<Capacitor, PdkError> {
        cells::build(self, db, name, params)
    }

    pub fn cmim(&self, db: &mut LayoutDatabase, width: f64, length: f64) -> Result<Capacitor, PdkError> {
        cells::cmim::cmim(self, db, width, length)
    }

    pub fn rfcmim(&self, db: &mut LayoutDatabase, width: f64, length: f64) -> Result<Capacitor, PdkError> {
        cells::rfcmim::rfcmim(self, db, width, length)
    }

    /// The fixed reference MIM capacitor.
    pub fn fixed_cmim(&self, db: &mut LayoutDatabase) -> Result<Capacitor, PdkError> {
        cells::fixed::cmim(self, db)
    }
}

impl Default for Pdk {
    /// IHP SG13G2 with built-in constants.
    fn default() -> Self {
        let config = ProcessConfig::default();
        Self {
            layers: config.layer_stack(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pdk_resolves_layers() {
        let pdk = Pdk::new(ProcessConfig::default()).unwrap();
        assert_eq!(pdk.layer(layers::METAL4).unwrap(), LayerId::new(50, 0));
        assert_eq!(pdk.label_layer().unwrap(), LayerId::new(8, 0));
        assert!(matches!(pdk.layer("Poly"), Err(PdkError::UnknownLayer(_))));
    }

    #[test]
    fn test_missing_layer_rejected() {
        let mut config = ProcessConfig::default();
        config.layers.retain(|l| l.name != layers::MIM);
        assert!(matches!(Pdk::new(config), Err(PdkError::UnknownLayer(name)) if name == layers::MIM));
    }

    #[test]
    fn test_bad_density_rejected() {
        let config = ProcessConfig {
            cmim_density_ff_per_um2: 0.0,
            ..ProcessConfig::default()
        };
        assert!(matches!(Pdk::new(config), Err(PdkError::InvalidConfig(_))));
    }
}
