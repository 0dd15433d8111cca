//! Persisted per-entity records

use std::sync::atomic::{AtomicU64, Ordering};

use glam::Mat4;
use serde::{Deserialize, Deserializer, Serialize};

use crate::graph::NodeHandle;

/// Scale used when an environment record has none, or a non-positive one
pub const DEFAULT_ENVIRONMENT_SCALE: f32 = 200.0;

/// Runtime identity of a record; never persisted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecordId(u64);

impl RecordId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        RecordId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::next()
    }
}

/// One scene node's persisted state
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Column-major 4x4 local transform
    #[serde(rename = "modelMatrix")]
    pub model_matrix: [f32; 16],
    /// Model the node was loaded from
    #[serde(rename = "src")]
    pub source_path: String,
    pub name: String,
    #[serde(skip)]
    id: RecordId,
    #[serde(skip)]
    node: Option<NodeHandle>,
}

impl NodeRecord {
    pub fn new(source_path: impl Into<String>, name: impl Into<String>, transform: Mat4) -> Self {
        Self {
            model_matrix: transform.to_cols_array(),
            source_path: source_path.into(),
            name: name.into(),
            id: RecordId::next(),
            node: None,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array(&self.model_matrix)
    }

    pub fn set_transform(&mut self, transform: Mat4) {
        self.model_matrix = transform.to_cols_array();
    }

    /// Whether every matrix element is finite
    pub fn is_finite(&self) -> bool {
        self.model_matrix.iter().all(|f| f.is_finite())
    }

    /// Live node this record currently describes, if any
    pub fn node(&self) -> Option<NodeHandle> {
        self.node
    }

    pub(crate) fn associate(&mut self, node: NodeHandle) {
        self.node = Some(node);
    }
}

/// Scene backdrop persisted alongside the nodes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    #[serde(rename = "src", default)]
    pub source_path: String,
    #[serde(default = "default_scale", deserialize_with = "deserialize_scale")]
    pub scale: f32,
}

fn default_scale() -> f32 {
    DEFAULT_ENVIRONMENT_SCALE
}

fn deserialize_scale<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let scale = Option::<f32>::deserialize(deserializer)?;
    Ok(normalize_scale(scale))
}

fn normalize_scale(scale: Option<f32>) -> f32 {
    match scale {
        Some(s) if s > 0.0 && s.is_finite() => s,
        _ => DEFAULT_ENVIRONMENT_SCALE,
    }
}

impl EnvironmentRecord {
    /// Create a record; non-positive scales fall back to the default
    pub fn new(source_path: impl Into<String>, scale: Option<f32>) -> Self {
        Self {
            source_path: source_path.into(),
            scale: normalize_scale(scale),
        }
    }

    /// Re-apply the scale invariant after direct field edits
    pub fn normalize(&mut self) {
        self.scale = normalize_scale(Some(self.scale));
    }

    /// Whether the environment is a `.zip` cubemap archive
    pub fn is_cubemap(&self) -> bool {
        void_asset::is_cubemap_path(&self.source_path)
    }
}
