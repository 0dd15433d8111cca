//! # void_scene - Scene Persistence
//!
//! Saves a scene as a JSON snapshot of its model-backed nodes and restores it
//! later through the asset loader:
//! - [`SceneSnapshot`] holds one [`NodeRecord`] per persisted node (source
//!   model, unique name, column-major transform) plus an optional
//!   [`EnvironmentRecord`]
//! - [`SceneSerializer`] exports the snapshot and drives imports
//! - Imports are asynchronous: node callbacks arrive in list order as asset
//!   events are pumped into the serializer
//!
//! ## Example
//!
//! ```ignore
//! use void_scene::prelude::*;
//!
//! let server = AssetServer::default_config()?;
//! let mut graph = SceneGraph::new();
//! let mut serializer = SceneSerializer::default();
//! let root = graph.root();
//!
//! serializer.import_scene_from("scene.json".as_ref(), &mut graph, root, &server, &mut listener);
//! while serializer.is_importing() {
//!     serializer.pump(&server, &mut graph, &mut listener);
//! }
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod import;
pub mod listener;
pub mod record;
pub mod serializer;
pub mod snapshot;

pub use config::SerializerConfig;
pub use error::SceneError;
pub use graph::{Environment, NodeHandle, Renderable, SceneGraph, SceneNode};
pub use import::ImportSession;
pub use listener::{ImportReport, NullListener, RecordOutcome, SceneLoadListener};
pub use record::{EnvironmentRecord, NodeRecord, RecordId, DEFAULT_ENVIRONMENT_SCALE};
pub use serializer::{SceneSerializer, ENVIRONMENT_NODE_NAME};
pub use snapshot::{base_name, SceneSnapshot};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::config::SerializerConfig;
    pub use crate::error::SceneError;
    pub use crate::graph::{NodeHandle, SceneGraph};
    pub use crate::listener::{ImportReport, RecordOutcome, SceneLoadListener};
    pub use crate::serializer::SceneSerializer;
    pub use crate::snapshot::SceneSnapshot;
    pub use void_asset::prelude::*;
}
