//! Codec configuration
//!
//! Read from the `[codec]` section of a TOML file. Every field has a default,
//! so a missing file, a missing section, or a partial section all work.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::depth::DEFAULT_MAX_DEPTH;

/// Limits and formatting options for the query codecs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Largest cache frame payload accepted on decode (bytes)
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: u64,

    /// Deepest query nesting accepted by the wire and cache decoders
    ///
    /// Decoding recurses once per level, so stack use grows with this bound.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Indent wire JSON written by the CLI
    #[serde(default)]
    pub pretty_wire: bool,
}

fn default_max_frame_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_frame_bytes: default_max_frame_bytes(),
            max_depth: default_max_depth(),
            pretty_wire: false,
        }
    }
}

/// Load the codec config from `path`
///
/// Falls back to defaults if the file doesn't exist or has no `[codec]` section.
pub fn load_config(path: &Path) -> Result<CodecConfig> {
    if !path.exists() {
        log::debug!("No config found at {}, using default codec config", path.display());
        return Ok(CodecConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let toml_value: toml::Value = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if let Some(codec_table) = toml_value.get("codec") {
        let config: CodecConfig = codec_table.clone().try_into()
            .context("Failed to parse [codec] section")?;
        Ok(config)
    } else {
        log::debug!("No [codec] section in {}, using defaults", path.display());
        Ok(CodecConfig::default())
    }
}
