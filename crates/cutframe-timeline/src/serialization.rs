//! Scene file loading for command-line rendering.
//!
//! Uses JSON with a schema version field.

use cutframe_core::{CutframeError, Result};
use serde::{Deserialize, Serialize};

use crate::scene::Scene;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned scene file wrapper.
#[derive(Debug, Serialize, Deserialize)]
pub struct SceneFile {
    /// Schema version.
    pub version: u32,
    /// The scene data.
    pub scene: Scene,
}

impl SceneFile {
    /// Wrap a scene at the current schema version.
    pub fn new(scene: Scene) -> Self {
        Self {
            version: CURRENT_VERSION,
            scene,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| CutframeError::Parse(format!("Failed to serialize scene: {}", e)))
    }

    /// Deserialize from JSON bytes.
    ///
    /// A bare scene object without the wrapper is accepted as version 1.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| CutframeError::Parse(format!("Invalid JSON: {}", e)))?;

        let Some(version) = raw.get("version").and_then(|v| v.as_u64()) else {
            let scene = serde_json::from_value(raw)
                .map_err(|e| CutframeError::Parse(format!("Failed to parse scene: {}", e)))?;
            return Ok(Self::new(scene));
        };

        if version > CURRENT_VERSION as u64 {
            return Err(CutframeError::Parse(format!(
                "Scene file version {} is newer than supported version {}",
                version, CURRENT_VERSION
            )));
        }

        serde_json::from_value(raw)
            .map_err(|e| CutframeError::Parse(format!("Failed to parse scene: {}", e)))
    }

    /// Load a scene file from disk.
    pub fn load_from_file(path: &std::path::Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}
