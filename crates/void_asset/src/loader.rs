//! Asset Loader - the contract scene import calls into
//!
//! Model loads are asynchronous: [`AssetSource::load_model`] only validates and
//! queues the request, handing back a [`LoadRequestId`]. Completion arrives
//! later as an [`AssetEvent`](crate::AssetEvent) carrying the same id.
//! Texture loads used for scene environments are synchronous.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};
use crate::handle::LoadRequestId;
use crate::texture::{CubemapAsset, TextureAsset};

/// Options applied while importing a model
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Flip the V texture coordinate
    pub flip_uvs: bool,
    /// Generate flat normals for meshes that have none
    pub generate_normals: bool,
    /// Resolve and decode material textures
    pub load_textures: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            flip_uvs: false,
            generate_normals: true,
            load_textures: true,
        }
    }
}

/// Model file formats the loaders understand
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Obj,
    Gltf,
    Glb,
}

impl ModelFormat {
    /// Determine the format from a file extension
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "obj" => Some(Self::Obj),
            "gltf" => Some(Self::Gltf),
            "glb" => Some(Self::Glb),
            _ => None,
        }
    }
}

/// Reject paths that can never name an asset
pub fn validate_path(path: &str) -> LoadResult<()> {
    if path.trim().is_empty() || path.contains('\0') {
        return Err(LoadError::InvalidPath(path.to_string()));
    }
    match Path::new(path).file_name() {
        Some(_) => Ok(()),
        None => Err(LoadError::InvalidPath(path.to_string())),
    }
}

/// Whether a texture path names a cubemap archive rather than a single image
pub fn is_cubemap_path(path: &str) -> bool {
    path.to_lowercase().ends_with(".zip")
}

/// Source of models and textures for scene import
pub trait AssetSource {
    /// Issue an asynchronous model load.
    ///
    /// Errors returned here mean the request was never issued; no event will
    /// follow for it.
    fn load_model(
        &self,
        path: &str,
        settings: &ImportSettings,
        cache_enabled: bool,
    ) -> LoadResult<LoadRequestId>;

    /// Open and decode a single texture
    fn load_texture(&self, path: &str) -> LoadResult<Arc<TextureAsset>>;

    /// Open and decode a six-face cubemap archive
    fn load_cubemap_texture(&self, path: &str) -> LoadResult<Arc<CubemapAsset>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_format_detection() {
        assert_eq!(ModelFormat::from_path("a/box.obj"), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_path("BOX.OBJ"), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_path("m/helmet.gltf"), Some(ModelFormat::Gltf));
        assert_eq!(ModelFormat::from_path("helmet.glb"), Some(ModelFormat::Glb));
        assert_eq!(ModelFormat::from_path("notes.txt"), None);
        assert_eq!(ModelFormat::from_path("noext"), None);
    }

    #[test]
    fn test_validate_path() {
        assert!(validate_path("a/box.obj").is_ok());
        assert!(validate_path("").is_err());
        assert!(validate_path("   ").is_err());
        assert!(validate_path("bad\0name.obj").is_err());
        assert!(validate_path("..").is_err());
    }

    #[test]
    fn test_cubemap_suffix() {
        assert!(is_cubemap_path("env/sky.zip"));
        assert!(is_cubemap_path("env/SKY.ZIP"));
        assert!(!is_cubemap_path("env/sky.png"));
        assert!(!is_cubemap_path("env/zip.png"));
    }
}
