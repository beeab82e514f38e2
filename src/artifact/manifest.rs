//! Bundle manifest (spec §6): a JSON sidecar recording format
//! versions and training-time hyperparameters, checked at load time
//! before any binary weight file is read.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MANIFEST_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleManifest {
    pub format_version: u32,
    pub embedding_dim: usize,
    pub hidden_width: usize,
    pub encoder_layers: usize,
    pub n_channels: usize,
    pub prototypes_per_user: usize,
    pub sample_rate_out: u32,
    pub window_seconds: f64,
    pub step_seconds: f64,
}

impl BundleManifest {
    pub fn from_config(config: &crate::config::Config) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            embedding_dim: config.embedding_dim,
            hidden_width: config.hidden_width,
            encoder_layers: config.encoder_layers,
            n_channels: config.n_channels,
            prototypes_per_user: config.prototypes_per_user,
            sample_rate_out: config.sample_rate_out,
            window_seconds: config.window_seconds,
            step_seconds: config.step_seconds,
        }
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| Error::InputFormat(format!("serializing manifest: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| Error::InputFormat(format!("writing {}: {e}", path.display())))
    }

    pub fn load(path: &std::path::Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InputFormat(format!("reading {}: {e}", path.display())))?;
        let manifest: Self = serde_json::from_str(&text)
            .map_err(|e| Error::InputFormat(format!("parsing {}: {e}", path.display())))?;
        if manifest.format_version != MANIFEST_FORMAT_VERSION {
            return Err(Error::InputFormat(format!(
                "manifest format version {} unsupported (expected {})",
                manifest.format_version, MANIFEST_FORMAT_VERSION
            )));
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_roundtrips_through_json() {
        let config = crate::config::Config::default();
        let manifest = BundleManifest::from_config(&config);
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        manifest.save(&path).unwrap();
        let loaded = BundleManifest::load(&path).unwrap();
        assert_eq!(manifest, loaded);
    }

    #[test]
    fn load_rejects_unknown_format_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, r#"{"format_version": 999, "embedding_dim": 1, "hidden_width": 1, "encoder_layers": 1, "n_channels": 1, "prototypes_per_user": 1, "sample_rate_out": 1, "window_seconds": 1.0, "step_seconds": 1.0}"#).unwrap();
        assert!(BundleManifest::load(&path).is_err());
    }
}
