use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_types::Compression;
use tracing::{debug, info};

use crate::error::{DatasetError, DatasetResult};

/// Dataset-level settings. Every field has a default, so a TOML file only
/// needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Branch created by [`Dataset::create`](crate::Dataset::create).
    pub default_branch: String,
    /// Compression of tensors created without an explicit one.
    pub default_compression: Compression,
    /// Re-hash sample bytes against their id on every read.
    pub verify_on_read: bool,
    /// Seal a target branch's uncommitted changes before merging it. When
    /// off, merging a branch with pending changes is a checkout error.
    pub auto_commit_target: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            default_branch: "main".into(),
            default_compression: Compression::None,
            verify_on_read: true,
            auto_commit_target: true,
        }
    }
}

impl DatasetConfig {
    pub fn from_toml(text: &str) -> DatasetResult<Self> {
        let config: DatasetConfig =
            toml::from_str(text).map_err(|e| DatasetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> DatasetResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading dataset configuration");
        let text = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::Config(format!("{}: {e}", path.display())))?;
        let config = Self::from_toml(&text)?;
        debug!(?config, "configuration parsed");
        Ok(config)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        strata_refs::validate_branch_name(&self.default_branch)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DatasetConfig::default();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.default_compression, Compression::None);
        assert!(config.verify_on_read);
        assert!(config.auto_commit_target);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DatasetConfig::from_toml(
            r#"
            default_branch = "trunk"
            default_compression = "zstd"
            "#,
        )
        .unwrap();
        assert_eq!(config.default_branch, "trunk");
        assert_eq!(config.default_compression, Compression::Zstd);
        assert!(config.verify_on_read);
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            DatasetConfig::from_toml("verify_on_read = \"yes\""),
            Err(DatasetError::Config(_))
        ));
        assert!(matches!(
            DatasetConfig::from_toml("default_branch = \"bad..name\""),
            Err(DatasetError::InvalidBranchName { .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strata.toml");
        std::fs::write(&path, "auto_commit_target = false\n").unwrap();
        let config = DatasetConfig::load_from_file(&path).unwrap();
        assert!(!config.auto_commit_target);
        assert!(DatasetConfig::load_from_file(dir.path().join("missing.toml")).is_err());
    }
}
