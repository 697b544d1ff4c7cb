//! Canvas-wide editor settings.

use crate::snap::{self, GRID_SIZE};
use crate::viewport::Viewport;
use serde::{Deserialize, Serialize};

/// Addon name used by code generation when none has been set.
pub const DEFAULT_ADDON_NAME: &str = "MyAddon";

/// Grid, snapping, export name and viewport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanvasSettings {
    pub grid_size: f64,
    pub snap_to_grid: bool,
    pub addon_name: String,
    pub viewport: Viewport,
}

impl Default for CanvasSettings {
    fn default() -> Self {
        Self {
            grid_size: GRID_SIZE,
            snap_to_grid: true,
            addon_name: DEFAULT_ADDON_NAME.to_string(),
            viewport: Viewport::default(),
        }
    }
}

impl CanvasSettings {
    pub fn set_grid_size(&mut self, size: f64) {
        self.grid_size = snap::clamp_grid_size(size);
    }

    pub fn toggle_snap(&mut self) -> bool {
        self.snap_to_grid = !self.snap_to_grid;
        self.snap_to_grid
    }

    /// Set the addon name; blank input restores the default.
    pub fn set_addon_name(&mut self, name: &str) {
        let name = name.trim();
        self.addon_name = if name.is_empty() {
            DEFAULT_ADDON_NAME.to_string()
        } else {
            name.to_string()
        };
    }

    /// Bring values read from storage back into range.
    pub(crate) fn sanitize(&mut self) {
        self.grid_size = snap::clamp_grid_size(self.grid_size);
        if self.addon_name.trim().is_empty() {
            self.addon_name = DEFAULT_ADDON_NAME.to_string();
        }
        self.viewport = self.viewport.sanitized();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CanvasSettings::default();
        assert_eq!(settings.grid_size, 20.0);
        assert!(settings.snap_to_grid);
        assert_eq!(settings.addon_name, "MyAddon");
    }

    #[test]
    fn test_setters_clamp() {
        let mut settings = CanvasSettings::default();
        settings.set_grid_size(1.0);
        assert_eq!(settings.grid_size, 10.0);
        settings.set_addon_name("   ");
        assert_eq!(settings.addon_name, DEFAULT_ADDON_NAME);
        settings.set_addon_name(" Inventory ");
        assert_eq!(settings.addon_name, "Inventory");
        assert!(!settings.toggle_snap());
    }
}
