//! Asset resolution

use std::path::{Path, PathBuf};

use photo_core::validation::is_safe_asset_path;

use crate::error::{DownloadError, Result};

/// Directory holding the purchasable originals
#[derive(Clone, Debug)]
pub struct AssetRoot {
    root: PathBuf,
}

impl AssetRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a line item's asset path to a readable regular file
    pub async fn resolve(&self, asset_path: &str) -> Result<PathBuf> {
        if !is_safe_asset_path(asset_path) {
            return Err(DownloadError::AssetUnavailable(format!(
                "{asset_path}: outside the asset root"
            )));
        }

        let path = self.root.join(asset_path.trim());
        match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(path),
            Ok(_) => Err(DownloadError::AssetUnavailable(format!("{asset_path}: not a file"))),
            Err(e) => Err(DownloadError::AssetUnavailable(format!("{asset_path}: {e}"))),
        }
    }
}
