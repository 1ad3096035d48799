//! Named asset lookup (reference images, overlay media)

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Failed to read asset {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Source of raw asset bytes by name
pub trait AssetStore {
    fn open(&self, name: &str) -> Result<Vec<u8>, AssetError>;

    fn exists(&self, name: &str) -> bool {
        self.open(name).is_ok()
    }
}

/// Assets stored as plain files under a root directory
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        // Names are flat or relative; never escape the root
        let relative = Path::new(name);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl AssetStore for DirAssetStore {
    fn open(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| AssetError::NotFound(name.to_string()))?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AssetError::NotFound(name.to_string()))
            }
            Err(source) => Err(AssetError::Io {
                name: name.to_string(),
                source,
            }),
        }
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_some_and(|p| p.is_file())
    }
}
