//! Model loader for OBJ and glTF files
//!
//! A model is decoded into one [`Mesh`] per material group. Material textures
//! are resolved relative to the model file; a texture that cannot be decoded is
//! replaced with [`TextureAsset::placeholder`] and reported alongside the model
//! instead of failing the whole load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{LoadError, LoadResult};
use crate::loader::{ImportSettings, ModelFormat};
use crate::texture::{TextureAsset, TextureLoader};

/// Vertex format shared by every loaded mesh
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, normal, uv }
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl Bounds {
    /// Compute bounds from vertices
    pub fn from_vertices(vertices: &[Vertex]) -> Self {
        if vertices.is_empty() {
            return Self::default();
        }

        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for v in vertices {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }
        Self { min, max }
    }

    /// Smallest box containing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        let mut out = self.clone();
        for i in 0..3 {
            out.min[i] = out.min[i].min(other.min[i]);
            out.max[i] = out.max[i].max(other.max[i]);
        }
        out
    }

    pub fn center(&self) -> [f32; 3] {
        [
            (self.min[0] + self.max[0]) * 0.5,
            (self.min[1] + self.max[1]) * 0.5,
            (self.min[2] + self.max[2]) * 0.5,
        ]
    }
}

/// Surface description referenced by meshes
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse_color: [f32; 4],
    /// Texture path as written in the source file
    pub texture_path: Option<String>,
    pub diffuse_texture: Option<Arc<TextureAsset>>,
}

impl Material {
    fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            diffuse_color: [1.0, 1.0, 1.0, 1.0],
            texture_path: None,
            diffuse_texture: None,
        }
    }
}

/// Triangle list with a single material
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub material_index: Option<usize>,
    pub bounds: Bounds,
}

/// A decoded model file
#[derive(Clone, Debug, PartialEq)]
pub struct ModelAsset {
    /// Resolved path the model was read from
    pub path: String,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub bounds: Bounds,
}

impl ModelAsset {
    /// Get total vertex count across all meshes
    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }

    /// Get total triangle count across all meshes
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }
}

/// A texture that failed while loading a model
#[derive(Clone, Debug, PartialEq)]
pub struct TextureFailure {
    pub texture_path: String,
    pub error: LoadError,
}

/// Result of a successful model load
#[derive(Clone, Debug)]
pub struct LoadedModel {
    pub model: ModelAsset,
    pub texture_failures: Vec<TextureFailure>,
}

/// Decodes model files from disk
#[derive(Clone, Debug, Default)]
pub struct ModelLoader {
    settings: ImportSettings,
    textures: TextureLoader,
}

impl ModelLoader {
    pub fn new(settings: ImportSettings) -> Self {
        Self {
            settings,
            textures: TextureLoader::default(),
        }
    }

    /// Load a model file, dispatching on its extension
    pub fn load_file(&self, path: &Path) -> LoadResult<LoadedModel> {
        let path_str = path.to_string_lossy().to_string();
        let format = ModelFormat::from_path(&path_str)
            .ok_or_else(|| LoadError::UnsupportedFormat(path_str.clone()))?;

        match format {
            ModelFormat::Obj => {
                let text = std::fs::read_to_string(path)
                    .map_err(|e| LoadError::from_io(&path_str, &e))?;
                self.load_obj(&text, path)
            }
            ModelFormat::Gltf | ModelFormat::Glb => self.load_gltf(path),
        }
    }

    /// Parse OBJ text. `path` locates `mtllib` files and their textures.
    pub fn load_obj(&self, text: &str, path: &Path) -> LoadResult<LoadedModel> {
        let path_str = path.to_string_lossy().to_string();
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut uvs: Vec<[f32; 2]> = Vec::new();

        let mut material_libs: Vec<String> = Vec::new();
        let mut groups: Vec<(Option<String>, Vec<Vertex>)> = vec![(None, Vec::new())];

        for (line_no, line) in text.lines().enumerate() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.is_empty() {
                continue;
            }

            match parts[0] {
                "v" if parts.len() >= 4 => {
                    positions.push(parse_floats::<3>(&parts[1..], &path_str, line_no)?);
                }
                "vn" if parts.len() >= 4 => {
                    normals.push(parse_floats::<3>(&parts[1..], &path_str, line_no)?);
                }
                "vt" if parts.len() >= 2 => {
                    let u: f32 = parse_float(parts[1], &path_str, line_no)?;
                    let v: f32 = match parts.get(2) {
                        Some(s) => parse_float(s, &path_str, line_no)?,
                        None => 0.0,
                    };
                    let v = if self.settings.flip_uvs { v } else { 1.0 - v };
                    uvs.push([u, v]);
                }
                "f" if parts.len() >= 4 => {
                    let face: Vec<Vertex> = parts[1..]
                        .iter()
                        .map(|p| parse_face_vertex(p, &positions, &normals, &uvs))
                        .collect::<Option<_>>()
                        .ok_or_else(|| {
                            LoadError::Parse(format!(
                                "{}:{}: face references a missing vertex",
                                path_str,
                                line_no + 1
                            ))
                        })?;

                    // Fan triangulation
                    if let Some((_, verts)) = groups.last_mut() {
                        for i in 1..face.len() - 1 {
                            verts.push(face[0]);
                            verts.push(face[i]);
                            verts.push(face[i + 1]);
                        }
                    }
                }
                "usemtl" if parts.len() >= 2 => {
                    groups.push((Some(parts[1].to_string()), Vec::new()));
                }
                "mtllib" if parts.len() >= 2 => {
                    material_libs.extend(parts[1..].iter().map(|s| s.to_string()));
                }
                _ => {}
            }
        }

        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let mut texture_failures = Vec::new();
        let mut materials = Vec::new();
        for lib in &material_libs {
            let lib_path = base_dir.join(lib);
            match std::fs::read_to_string(&lib_path) {
                Ok(text) => materials.extend(parse_mtl(&text)),
                Err(e) => {
                    let lib_str = lib_path.to_string_lossy().to_string();
                    log::warn!("Material library {} unavailable: {}", lib_str, e);
                    texture_failures.push(TextureFailure {
                        error: LoadError::from_io(&lib_str, &e),
                        texture_path: lib_str,
                    });
                }
            }
        }

        if self.settings.load_textures {
            for material in &mut materials {
                let Some(tex_path) = material.texture_path.clone() else {
                    continue;
                };
                let full = base_dir.join(&tex_path);
                let full_str = full.to_string_lossy().to_string();
                let decoded = std::fs::read(&full)
                    .map_err(|e| LoadError::from_io(&full_str, &e))
                    .and_then(|bytes| self.textures.load(&bytes, &full_str));

                match decoded {
                    Ok(tex) => material.diffuse_texture = Some(Arc::new(tex)),
                    Err(error) => {
                        material.diffuse_texture = Some(Arc::new(TextureAsset::placeholder()));
                        texture_failures.push(TextureFailure {
                            texture_path: full_str,
                            error,
                        });
                    }
                }
            }
        }

        let material_lookup: HashMap<&str, usize> = materials
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();

        let mut meshes = Vec::new();
        for (material, mut vertices) in groups {
            if vertices.is_empty() {
                continue;
            }
            if normals.is_empty() && self.settings.generate_normals {
                generate_flat_normals(&mut vertices);
            }
            let indices = (0..vertices.len() as u32).collect();
            let bounds = Bounds::from_vertices(&vertices);
            let material_index = material
                .as_deref()
                .and_then(|name| material_lookup.get(name).copied());
            meshes.push(Mesh {
                name: material.unwrap_or_default(),
                vertices,
                indices,
                material_index,
                bounds,
            });
        }

        if meshes.is_empty() {
            return Err(LoadError::Parse(format!("{} contains no faces", path_str)));
        }

        Ok(LoadedModel {
            model: assemble(path_str, meshes, materials),
            texture_failures,
        })
    }

    /// Load a glTF or GLB file
    pub fn load_gltf(&self, path: &Path) -> LoadResult<LoadedModel> {
        let path_str = path.to_string_lossy().to_string();
        let (document, buffers, images) = gltf::import(path).map_err(|e| match e {
            gltf::Error::Io(io) => LoadError::from_io(&path_str, &io),
            other => LoadError::Parse(format!("Failed to parse glTF {}: {}", path_str, other)),
        })?;

        let mut texture_failures = Vec::new();
        let mut materials = Vec::new();
        for material in document.materials() {
            let pbr = material.pbr_metallic_roughness();
            let mut out = Material::named(material.name().unwrap_or(""));
            out.diffuse_color = pbr.base_color_factor();

            if let (true, Some(info)) = (self.settings.load_textures, pbr.base_color_texture()) {
                let index = info.texture().source().index();
                out.texture_path = Some(format!("{}#image{}", path_str, index));
                match images.get(index).map(gltf_image_to_texture) {
                    Some(Ok(tex)) => out.diffuse_texture = Some(Arc::new(tex)),
                    Some(Err(error)) => {
                        out.diffuse_texture = Some(Arc::new(TextureAsset::placeholder()));
                        texture_failures.push(TextureFailure {
                            texture_path: format!("{}#image{}", path_str, index),
                            error,
                        });
                    }
                    None => {}
                }
            }
            materials.push(out);
        }

        let mut meshes = Vec::new();
        for mesh in document.meshes() {
            for primitive in mesh.primitives() {
                if primitive.mode() != gltf::mesh::Mode::Triangles {
                    log::warn!(
                        "{}: skipping {:?} primitive in mesh {:?}",
                        path_str,
                        primitive.mode(),
                        mesh.name().unwrap_or("")
                    );
                    continue;
                }
                let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

                let positions: Vec<[f32; 3]> = reader
                    .read_positions()
                    .ok_or_else(|| {
                        LoadError::Parse(format!("{}: mesh missing positions", path_str))
                    })?
                    .collect();
                let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(|n| n.collect());
                let uvs: Vec<[f32; 2]> = reader
                    .read_tex_coords(0)
                    .map(|t| t.into_f32().collect())
                    .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);
                let indices: Vec<u32> = reader
                    .read_indices()
                    .map(|i| i.into_u32().collect())
                    .unwrap_or_else(|| (0..positions.len() as u32).collect());

                let has_normals = normals.is_some();
                let mut vertices: Vec<Vertex> = (0..positions.len())
                    .map(|i| {
                        let [u, v] = uvs.get(i).copied().unwrap_or([0.0, 0.0]);
                        let v = if self.settings.flip_uvs { 1.0 - v } else { v };
                        Vertex::new(
                            positions[i],
                            normals
                                .as_ref()
                                .and_then(|n| n.get(i).copied())
                                .unwrap_or([0.0, 1.0, 0.0]),
                            [u, v],
                        )
                    })
                    .collect();

                if !has_normals && self.settings.generate_normals {
                    vertices = unweld(&vertices, &indices);
                    generate_flat_normals(&mut vertices);
                    let bounds = Bounds::from_vertices(&vertices);
                    let count = vertices.len() as u32;
                    meshes.push(Mesh {
                        name: mesh.name().unwrap_or("").to_string(),
                        vertices,
                        indices: (0..count).collect(),
                        material_index: primitive.material().index(),
                        bounds,
                    });
                    continue;
                }

                meshes.push(Mesh {
                    name: mesh.name().unwrap_or("").to_string(),
                    bounds: Bounds::from_vertices(&vertices),
                    vertices,
                    indices,
                    material_index: primitive.material().index(),
                });
            }
        }

        if meshes.is_empty() {
            return Err(LoadError::Parse(format!("{} contains no meshes", path_str)));
        }

        Ok(LoadedModel {
            model: assemble(path_str, meshes, materials),
            texture_failures,
        })
    }
}

fn assemble(path: String, meshes: Vec<Mesh>, materials: Vec<Material>) -> ModelAsset {
    let bounds = meshes
        .iter()
        .map(|m| m.bounds.clone())
        .reduce(|a, b| a.union(&b))
        .unwrap_or_default();
    ModelAsset {
        path,
        meshes,
        materials,
        bounds,
    }
}

fn parse_float(s: &str, path: &str, line_no: usize) -> LoadResult<f32> {
    s.parse()
        .map_err(|_| LoadError::Parse(format!("{}:{}: invalid number {:?}", path, line_no + 1, s)))
}

fn parse_floats<const N: usize>(
    parts: &[&str],
    path: &str,
    line_no: usize,
) -> LoadResult<[f32; N]> {
    let mut out = [0.0; N];
    for (slot, s) in out.iter_mut().zip(parts) {
        *slot = parse_float(s, path, line_no)?;
    }
    Ok(out)
}

/// Resolve an OBJ index (1-based, negative = relative to the end)
fn resolve_index(raw: &str, len: usize) -> Option<usize> {
    let idx: i64 = raw.parse().ok()?;
    if idx > 0 {
        let idx = idx as usize - 1;
        (idx < len).then_some(idx)
    } else if idx < 0 {
        len.checked_sub(idx.unsigned_abs() as usize)
    } else {
        None
    }
}

/// Parse a face vertex like "1/2/3", "1//3" or "1"
fn parse_face_vertex(
    s: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
) -> Option<Vertex> {
    let mut parts = s.split('/');
    let position = positions[resolve_index(parts.next()?, positions.len())?];

    let uv = match parts.next() {
        Some(raw) if !raw.is_empty() => uvs[resolve_index(raw, uvs.len())?],
        _ => [0.0, 0.0],
    };
    let normal = match parts.next() {
        Some(raw) if !raw.is_empty() => normals[resolve_index(raw, normals.len())?],
        _ => [0.0, 1.0, 0.0],
    };

    Some(Vertex::new(position, normal, uv))
}

fn parse_mtl(text: &str) -> Vec<Material> {
    let mut materials: Vec<Material> = Vec::new();
    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["newmtl", name, ..] => materials.push(Material::named(*name)),
            ["Kd", r, g, b, ..] => {
                if let Some(m) = materials.last_mut() {
                    let alpha = m.diffuse_color[3];
                    m.diffuse_color = [
                        r.parse().unwrap_or(1.0),
                        g.parse().unwrap_or(1.0),
                        b.parse().unwrap_or(1.0),
                        alpha,
                    ];
                }
            }
            ["d", alpha, ..] => {
                if let Some(m) = materials.last_mut() {
                    m.diffuse_color[3] = alpha.parse().unwrap_or(1.0);
                }
            }
            ["map_Kd", rest @ ..] if !rest.is_empty() => {
                // Options such as "-s 1 1 1" precede the file name
                if let (Some(m), Some(file)) = (materials.last_mut(), rest.last()) {
                    m.texture_path = Some(file.to_string());
                }
            }
            _ => {}
        }
    }
    materials
}

fn gltf_image_to_texture(image: &gltf::image::Data) -> LoadResult<TextureAsset> {
    let pixel_count = image.width as usize * image.height as usize;
    let data = match image.format {
        gltf::image::Format::R8G8B8A8 => image.pixels.clone(),
        gltf::image::Format::R8G8B8 => image
            .pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        gltf::image::Format::R8 => image.pixels.iter().flat_map(|&l| [l, l, l, 255]).collect(),
        gltf::image::Format::R8G8 => image
            .pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        other => {
            return Err(LoadError::UnsupportedFormat(format!(
                "glTF image format {:?}",
                other
            )))
        }
    };

    if data.len() != pixel_count * 4 {
        return Err(LoadError::Parse("glTF image size mismatch".into()));
    }

    Ok(TextureAsset {
        data,
        width: image.width,
        height: image.height,
        bytes_per_row: image.width * 4,
        srgb: true,
    })
}

fn unweld(vertices: &[Vertex], indices: &[u32]) -> Vec<Vertex> {
    indices
        .iter()
        .filter_map(|&i| vertices.get(i as usize).copied())
        .collect()
}

/// Assign each triangle's face normal to its three (unshared) vertices
fn generate_flat_normals(vertices: &mut [Vertex]) {
    for tri in vertices.chunks_exact_mut(3) {
        let p0 = tri[0].position;
        let p1 = tri[1].position;
        let p2 = tri[2].position;

        let e1 = [p1[0] - p0[0], p1[1] - p0[1], p1[2] - p0[2]];
        let e2 = [p2[0] - p0[0], p2[1] - p0[1], p2[2] - p0[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];

        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let normal = if len > 0.0001 {
            [n[0] / len, n[1] / len, n[2] / len]
        } else {
            [0.0, 1.0, 0.0]
        };

        for v in tri.iter_mut() {
            v.normal = normal;
        }
    }
}
