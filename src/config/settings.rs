use std::path::Path;

use serde::Deserialize;

/// Global defaults, overridable per job.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub target_width: u32,
    pub target_height: u32,
    /// "floyd", "ordered", "none" (threshold) or "off".
    pub dither: String,
    pub pad_black: bool,
    /// Horizontal overlap between segment columns, percent.
    pub hsplit_overlap: f64,
    /// Maximum logical segment width in device units.
    pub hsplit_max_width: u32,
    /// Vertical segment count the overlap search starts from.
    pub vsplit_target: u32,
    /// Minimum vertical overlap between segment rows, percent.
    pub vsplit_min_overlap: f64,
    pub thumbnail_width: u32,
    pub thumbnail_highlight: bool,
    pub write_report: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            target_width: 480,
            target_height: 800,
            dither: "floyd".to_string(),
            pad_black: false,
            hsplit_overlap: 70.0,
            hsplit_max_width: 800,
            vsplit_target: 3,
            vsplit_min_overlap: 5.0,
            thumbnail_width: 0,
            thumbnail_highlight: true,
            write_report: false,
        }
    }
}

impl Settings {
    pub fn from_yaml(yaml: &str) -> crate::error::Result<Self> {
        serde_yml::from_str(yaml).map_err(|e| {
            crate::error::TileError::policy(format!("Failed to parse settings YAML: {e}"))
        })
    }

    pub fn from_file(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
