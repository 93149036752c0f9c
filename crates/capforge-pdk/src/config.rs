use std::fs;
use std::path::{Path, PathBuf};

use capforge_analysis::ProcessLimits;
use capforge_core::{Layer, LayerStack};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::layers;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read process config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid process config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One entry of the layer map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    pub name: String,
    pub layer: u16,
    pub datatype: u16,
    #[serde(default)]
    pub description: String,
}

impl LayerConfig {
    pub fn new(name: &str, layer: u16, datatype: u16, description: &str) -> Self {
        Self {
            name: name.to_string(),
            layer,
            datatype,
            description: description.to_string(),
        }
    }
}

/// Drawing rules for the MIM capacitor cells, in µm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmimRules {
    /// Bottom plate (Metal4) enclosure of the MIM dielectric.
    pub bottom_plate_enclosure: f64,
    /// Margin of the Metal4 no-fill region around the bottom plate.
    pub nofill_margin: f64,
    pub draw_nofill: bool,
    pub via_size: f64,
    pub via_spacing: f64,
    /// MIM enclosure of the Via4 array.
    pub via_enclosure: f64,
    pub top_via_size: f64,
    pub top_via_spacing: f64,
    pub top_via_enclosure: f64,
    /// Gap between bottom plate and the RF ground ring.
    pub rf_ring_gap: f64,
    pub rf_ring_width: f64,
}

impl Default for CmimRules {
    fn default() -> Self {
        Self {
            bottom_plate_enclosure: 0.6,
            nofill_margin: 1.0,
            draw_nofill: true,
            via_size: 0.42,
            via_spacing: 0.52,
            via_enclosure: 0.36,
            top_via_size: 0.42,
            top_via_spacing: 0.42,
            top_via_enclosure: 0.42,
            rf_ring_gap: 2.0,
            rf_ring_width: 1.0,
        }
    }
}

impl CmimRules {
    /// The rule set the fixed reference cell was drawn with: no no-fill
    /// region and a sparser via array.
    pub fn legacy() -> Self {
        Self {
            draw_nofill: false,
            via_spacing: 0.84,
            via_enclosure: 0.5,
            top_via_spacing: 0.84,
            top_via_enclosure: 0.5,
            ..Self::default()
        }
    }
}

/// Process constants and layer map. Passed explicitly to [`crate::Pdk`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub name: String,
    pub cmim_density_ff_per_um2: f64,
    pub rfcmim_density_ff_per_um2: f64,
    /// Advisory only: sized plates below this side length are reported.
    pub min_side_um: Option<f64>,
    /// Advisory only: sized plates above this area are reported.
    pub max_area_um2: Option<f64>,
    pub label_layer: String,
    pub layers: Vec<LayerConfig>,
    pub cmim: CmimRules,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            name: "sg13g2".to_string(),
            cmim_density_ff_per_um2: 1.5,
            rfcmim_density_ff_per_um2: 1.5,
            min_side_um: Some(1.14),
            max_area_um2: Some(5625.0),
            label_layer: layers::METAL1.to_string(),
            layers: layers::sg13g2_layers(),
            cmim: CmimRules::default(),
        }
    }
}

impl ProcessConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        log::info!("Loaded process config '{}' from {:?}", config.name, path);
        Ok(config)
    }

    pub fn limits(&self) -> ProcessLimits {
        ProcessLimits {
            min_side_um: self.min_side_um,
            max_area_um2: self.max_area_um2,
        }
    }

    pub fn layer_stack(&self) -> LayerStack {
        let mut stack = LayerStack::new();
        for l in &self.layers {
            stack.add_layer(Layer::new(&l.name, l.layer, l.datatype).with_description(&l.description));
        }
        stack
    }
}
