//! Pipeline configuration: loading, validating and defaulting
//! `layer-mint.toml`.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! data_dir = "data"         # Root for all pipeline directories
//!
//! [canvas]
//! width = 1400              # Edition canvas width in pixels
//! height = 1400             # Edition canvas height in pixels
//!
//! [directories]
//! layers = "layers"         # Uploaded layer options (generation input)
//! uploads = "uploads"       # Raw pre-composited images
//! output = "nfts"           # Generation scratch output
//! public = "public"         # Per-collection staging area
//!
//! [generation]
//! min_layers = 5            # Fewest layers a generate request accepts
//! min_options = 5           # Fewest options per layer
//! ```
//!
//! Config files are sparse — override just the values you want. Unknown keys
//! are rejected to catch typos early.

use crate::staging::Roots;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `layer-mint.toml`.
///
/// All fields have sensible defaults; a missing config file means stock
/// defaults throughout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory all pipeline paths are resolved under.
    pub data_dir: String,
    pub canvas: CanvasConfig,
    pub directories: DirectoryConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CanvasConfig {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectoryConfig {
    pub layers: String,
    pub uploads: String,
    pub output: String,
    pub public: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Fewest layers required before a generate request is accepted.
    pub min_layers: usize,
    /// Fewest options each layer must hold.
    pub min_options: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            canvas: CanvasConfig::default(),
            directories: DirectoryConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: 1400,
            height: 1400,
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            layers: "layers".to_string(),
            uploads: "uploads".to_string(),
            output: "nfts".to_string(),
            public: "public".to_string(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_layers: 5,
            min_options: 5,
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, falling back to stock defaults when the file does
    /// not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(ConfigError::Validation(
                "canvas dimensions must be non-zero".into(),
            ));
        }
        for (key, name) in [
            ("directories.layers", &self.directories.layers),
            ("directories.uploads", &self.directories.uploads),
            ("directories.output", &self.directories.output),
            ("directories.public", &self.directories.public),
        ] {
            if name.is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        if self.generation.min_layers == 0 || self.generation.min_options == 0 {
            return Err(ConfigError::Validation(
                "generation minimums must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Canvas dimensions as the (width, height) pair the compositor takes.
    pub fn canvas_size(&self) -> (u32, u32) {
        (self.canvas.width, self.canvas.height)
    }

    /// Resolve the four filesystem roots under the data directory.
    pub fn roots(&self, base: &Path) -> Roots {
        let data = base.join(&self.data_dir);
        Roots {
            layers: data.join(&self.directories.layers),
            uploads: data.join(&self.directories.uploads),
            output: data.join(&self.directories.output),
            public: data.join(&self.directories.public),
        }
    }
}

/// A documented stock config, printed by `layer-mint gen-config`.
pub fn stock_config_toml() -> String {
    let mut out = String::new();
    for line in [
        "# layer-mint configuration - all options shown with their defaults.",
        "",
        "data_dir = \"data\"",
        "",
        "[canvas]",
        "width = 1400",
        "height = 1400",
        "",
        "[directories]",
        "layers = \"layers\"",
        "uploads = \"uploads\"",
        "output = \"nfts\"",
        "public = \"public\"",
        "",
        "[generation]",
        "min_layers = 5",
        "min_options = 5",
    ] {
        out.push_str(line);
        out.push('\n');
    }
    out
}
