use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use capforge_analysis::{check_process_limits, CapacitorSpec, LayerSet};
use capforge_core::{CellId, Layout, LayoutDatabase};
use capforge_pdk::{Capacitor, Pdk};

/// State shared by the export workflows: the process, one layout library
/// and the output directory.
///
/// Exports are independent. A failed export is reported and remembered;
/// [`Session::finish`] turns any failure into an error once the workflow
/// has run to the end.
pub struct Session {
    pub pdk: Pdk,
    pub db: LayoutDatabase,
    pub quiet: bool,
    output_dir: PathBuf,
    failed: Vec<String>,
}

impl Session {
    pub fn new(pdk: Pdk, output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;
        let db = LayoutDatabase::new(&pdk.config().name);
        Ok(Self {
            pdk,
            db,
            quiet: false,
            output_dir: output_dir.to_path_buf(),
            failed: Vec::new(),
        })
    }

    /// Write `top` and its sub-cells to `file_name` in the output directory.
    pub fn export(&mut self, top: CellId, file_name: &str) -> bool {
        let path = self.output_dir.join(file_name);
        match capforge_io::write_gds_file(&path, &self.db, top) {
            Ok(()) => {
                say!(self, "   ✓ Saved: {}", file_name);
                true
            }
            Err(e) => {
                log::error!("Export of {} failed: {}", path.display(), e);
                say!(self, "   ✗ Failed: {} ({})", file_name, e);
                self.failed.push(file_name.to_string());
                false
            }
        }
    }

    pub fn finish(self) -> Result<()> {
        if !self.failed.is_empty() {
            bail!("{} export(s) failed: {}", self.failed.len(), self.failed.join(", "));
        }
        Ok(())
    }

    pub fn layers(&self, cell: CellId) -> Result<LayerSet> {
        Ok(self.db.flatten(cell)?.layers())
    }

    /// `[Metal4drawing (50, 0), ...]`
    pub fn describe(&self, layers: &LayerSet) -> String {
        let names: Vec<String> = layers
            .iter()
            .map(|id| self.pdk.layers().display_name(*id))
            .collect();
        format!("[{}]", names.join(", "))
    }

    pub fn bbox_of(&self, cell: CellId) -> Result<String> {
        Ok(match self.db.bbox(cell)? {
            Some(bbox) => bbox.to_string(),
            None => "(empty)".to_string(),
        })
    }

    /// Log process-limit warnings for a generated capacitor. Advisory only.
    pub fn check_limits(&self, cap: &Capacitor) {
        let density = self.pdk.config().cmim_density_ff_per_um2;
        let Ok(spec) = CapacitorSpec::new(cap.info.width, cap.info.length, density) else {
            return;
        };
        for warning in check_process_limits(&spec.evaluate(), &self.pdk.config().limits()) {
            log::warn!("{}: {}", cap.name, warning);
        }
    }

    pub fn print_capacitor(&self, cap: &Capacitor) {
        say!(self, "   - Component: {}", cap.name);
        say!(self, "   - Width: {} um", cap.info.width);
        say!(self, "   - Length: {} um", cap.info.length);
        say!(self, "   - Capacitance: {} fF", cap.info.capacitance_ff);
        say!(self, "   - Area: {} um²", cap.info.area_um2);
        say!(self, "   - Ports: {:?}", cap.info.ports);
        self.check_limits(cap);
    }
}

pub fn rule(width: usize) -> String {
    "=".repeat(width)
}
