//! Project descriptor with versioning and migration.
//!
//! Uses JSON with a schema version field for forward-compatible persistence.

use serde::{Deserialize, Serialize};
use splice_core::{Result, SpliceError};
use std::path::Path;
use tracing::{debug, info};

use crate::timeline::Timeline;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Versioned project file wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    /// Schema version for migration.
    pub version: u32,
    /// Application version that wrote this file.
    pub app_version: String,
    /// The edited document.
    pub timeline: Timeline,
}

impl ProjectFile {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            version: CURRENT_VERSION,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            timeline,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| SpliceError::Serialization(format!("Failed to serialize project: {e}")))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    ///
    /// The loaded timeline must satisfy every structural invariant.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| SpliceError::Serialization(format!("Invalid JSON: {e}")))?;

        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(0);
        let version = u32::try_from(version).unwrap_or(u32::MAX);

        if version > CURRENT_VERSION {
            return Err(SpliceError::Serialization(format!(
                "Project file version {version} is newer than supported version {CURRENT_VERSION}"
            )));
        }

        let migrated = migrate(raw, version)?;
        let file: Self = serde_json::from_value(migrated)
            .map_err(|e| SpliceError::Serialization(format!("Failed to parse project: {e}")))?;
        file.timeline.validate().map_err(|e| {
            SpliceError::Serialization(format!("Project '{}' is damaged: {e}", file.timeline.name))
        })?;
        Ok(file)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        info!(path = %path.display(), "project saved");
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        let file = Self::from_json(&data)?;
        info!(path = %path.display(), timeline = %file.timeline.name, "project loaded");
        Ok(file)
    }
}

/// Apply sequential migrations from `from_version` to CURRENT_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CURRENT_VERSION {
        match version {
            0 => {
                // v0 files are a bare timeline
                if data.get("version").is_none() {
                    data = serde_json::json!({
                        "version": 1,
                        "app_version": "0.1.0",
                        "timeline": data,
                    });
                }
                version = 1;
            }
            _ => {
                return Err(SpliceError::Serialization(format!(
                    "No migration path from version {version}"
                )));
            }
        }
        debug!(version, "migrated project file");
    }

    Ok(data)
}
