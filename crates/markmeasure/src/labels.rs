//! Label classes and defaults shared by every annotation session.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum LabelConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_marker_size_mm() -> f64 {
    60.0
}

/// Contents of a `labels.json` file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default)]
    pub classes: Vec<String>,
    /// Printed side length of the calibration markers.
    #[serde(default = "default_marker_size_mm")]
    pub default_marker_size_mm: f64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            classes: Vec::new(),
            default_marker_size_mm: default_marker_size_mm(),
        }
    }
}

impl LabelConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LabelConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LabelConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// First class, or the empty label when none are configured.
    pub fn default_label(&self) -> &str {
        self.classes.first().map(String::as_str).unwrap_or("")
    }
}
