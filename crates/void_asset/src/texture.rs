//! Texture and cubemap decoding
//!
//! Single textures are decoded with `image`. Cubemaps are `.zip` archives that
//! hold one image per face, named after the face (`posx.png`, `negy.jpg`, ...).

use std::io::{Cursor, Read};

use crate::error::{LoadError, LoadResult};

/// Texture data ready for GPU upload
#[derive(Clone, Debug, PartialEq)]
pub struct TextureAsset {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row (width * 4 for RGBA)
    pub bytes_per_row: u32,
    /// Whether texture uses sRGB color space
    pub srgb: bool,
}

impl TextureAsset {
    /// Create a 1x1 solid color texture
    pub fn solid_color(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            data: vec![r, g, b, a],
            width: 1,
            height: 1,
            bytes_per_row: 4,
            srgb: true,
        }
    }

    /// Placeholder substituted when a material texture fails to load
    pub fn placeholder() -> Self {
        Self::solid_color(255, 0, 255, 255)
    }
}

/// Faces of a cubemap, in upload order
pub const CUBEMAP_FACES: [&str; 6] = ["posx", "negx", "posy", "negy", "posz", "negz"];

/// Six square textures forming a cubemap
#[derive(Clone, Debug, PartialEq)]
pub struct CubemapAsset {
    /// Faces in [`CUBEMAP_FACES`] order
    pub faces: Vec<TextureAsset>,
    /// Edge length of each face
    pub face_size: u32,
}

/// Decoder for image textures
#[derive(Clone, Debug)]
pub struct TextureLoader {
    /// Interpret as sRGB
    pub srgb: bool,
}

impl Default for TextureLoader {
    fn default() -> Self {
        Self { srgb: true }
    }
}

impl TextureLoader {
    /// Create a new texture loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a texture from image bytes
    pub fn load(&self, data: &[u8], path: &str) -> LoadResult<TextureAsset> {
        let img = image::load_from_memory(data)
            .map_err(|e| LoadError::Parse(format!("Failed to decode image {}: {}", path, e)))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        Ok(TextureAsset {
            data: rgba.into_raw(),
            width,
            height,
            bytes_per_row: width * 4,
            srgb: self.srgb,
        })
    }

    /// Decode a cubemap archive
    pub fn load_cubemap(&self, data: &[u8], path: &str) -> LoadResult<CubemapAsset> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))
            .map_err(|e| LoadError::Parse(format!("Invalid cubemap archive {}: {}", path, e)))?;

        let mut faces: [Option<TextureAsset>; 6] = Default::default();

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| LoadError::Parse(format!("{}: {}", path, e)))?;
            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let stem = face_stem(&entry_name);
            let Some(slot) = CUBEMAP_FACES.iter().position(|f| *f == stem) else {
                log::debug!("Ignoring {} in cubemap {}", entry_name, path);
                continue;
            };

            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|e| LoadError::from_io(path, &e))?;
            faces[slot] = Some(self.load(&bytes, &entry_name)?);
        }

        let mut decoded = Vec::with_capacity(6);
        for (face, name) in faces.into_iter().zip(CUBEMAP_FACES) {
            let face = face.ok_or_else(|| LoadError::MissingCubemapFace {
                archive: path.to_string(),
                face: name,
            })?;
            decoded.push(face);
        }

        let face_size = decoded[0].width;
        if decoded.iter().any(|f| f.width != face_size || f.height != face_size) {
            return Err(LoadError::Parse(format!(
                "Cubemap {} faces must be square and equally sized",
                path
            )));
        }

        Ok(CubemapAsset { faces: decoded, face_size })
    }
}

/// `"sky/PosX.png"` -> `"posx"`
fn face_stem(entry_name: &str) -> String {
    let file = entry_name.rsplit('/').next().unwrap_or(entry_name);
    let stem = file.split('.').next().unwrap_or(file);
    stem.to_lowercase()
}
