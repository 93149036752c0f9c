//! IHP SG13G2 layer names and their GDS numbers.

use crate::config::LayerConfig;

pub const METAL1: &str = "Metal1drawing";
pub const METAL4: &str = "Metal4drawing";
pub const METAL4_NOFILL: &str = "Metal4nofill";
pub const VIA4: &str = "Via4drawing";
pub const METAL5: &str = "Metal5drawing";
pub const MIM: &str = "MIMdrawing";
pub const TOP_VIA1: &str = "TopVia1drawing";
pub const TOP_METAL1: &str = "TopMetal1drawing";
pub const MEMCAP: &str = "MemCapdrawing";
pub const PWELL_BLOCK: &str = "PWellblock";

/// Layers of the parametrized MIM capacitor.
pub const CMIM_LAYERS: [&str; 8] = [
    METAL4,
    METAL4_NOFILL,
    VIA4,
    METAL5,
    MIM,
    TOP_VIA1,
    TOP_METAL1,
    MEMCAP,
];

pub fn sg13g2_layers() -> Vec<LayerConfig> {
    vec![
        LayerConfig::new(METAL1, 8, 0, "Metal1 (labels, RF ground ring)"),
        LayerConfig::new(METAL4, 50, 0, "Metal4 (bottom plate)"),
        LayerConfig::new(METAL4_NOFILL, 50, 23, "Metal4 no-fill region"),
        LayerConfig::new(VIA4, 66, 0, "Via4 (connections)"),
        LayerConfig::new(METAL5, 67, 0, "Metal5 (top plate)"),
        LayerConfig::new(MIM, 36, 0, "MIM (dielectric)"),
        LayerConfig::new(TOP_VIA1, 125, 0, "TopVia1 (vias)"),
        LayerConfig::new(TOP_METAL1, 126, 0, "TopMetal1 (routing)"),
        LayerConfig::new(MEMCAP, 69, 0, "MemCap (capacitor marker)"),
        LayerConfig::new(PWELL_BLOCK, 46, 21, "PWell block (RF substrate isolation)"),
    ]
}
