//! Scene serializer - export and import of scene snapshots.
//!
//! Export writes the current [`SceneSnapshot`] as JSON. Import reads a
//! snapshot back, attaches its environment synchronously, then restores the
//! nodes through an [`ImportSession`] driven by asset events.

use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use void_asset::{AssetEvent, AssetServer, AssetSource};

use crate::config::SerializerConfig;
use crate::error::SceneError;
use crate::graph::{Environment, NodeHandle, Renderable, SceneGraph};
use crate::import::ImportSession;
use crate::listener::SceneLoadListener;
use crate::record::EnvironmentRecord;
use crate::snapshot::SceneSnapshot;

/// Name given to the node that carries the imported environment
pub const ENVIRONMENT_NODE_NAME: &str = "environment";

/// Scene serializer for export/import operations.
pub struct SceneSerializer {
    config: SerializerConfig,
    snapshot: Option<SceneSnapshot>,
    import: Option<ImportSession>,
}

impl SceneSerializer {
    pub fn new(config: SerializerConfig) -> Self {
        Self {
            config,
            snapshot: None,
            import: None,
        }
    }

    pub fn config(&self) -> &SerializerConfig {
        &self.config
    }

    /// Current snapshot, if one was built or imported
    pub fn snapshot(&self) -> Option<&SceneSnapshot> {
        self.snapshot.as_ref()
    }

    /// Current snapshot, created empty on first use
    pub fn snapshot_mut(&mut self) -> &mut SceneSnapshot {
        self.snapshot.get_or_insert_with(SceneSnapshot::new)
    }

    /// Persist a live node loaded from `source_path`
    pub fn add_to_scene_data(
        &mut self,
        graph: &mut SceneGraph,
        node: NodeHandle,
        source_path: &str,
    ) -> Result<(), SceneError> {
        let record = self.snapshot_mut().add_node(graph, node, source_path)?;
        log::debug!("Added {} ({}) to scene data", record.name, record.source_path);
        Ok(())
    }

    /// Forget the record for `node`. Fails when there is no scene data yet.
    pub fn remove_from_scene_data(&mut self, node: NodeHandle) -> Result<bool, SceneError> {
        self.snapshot
            .as_mut()
            .ok_or(SceneError::NoSceneData)?
            .remove_node(node)
    }

    /// Set the environment persisted with the scene
    pub fn set_environment_data(&mut self, source_path: &str, scale: Option<f32>) {
        let environment = EnvironmentRecord::new(source_path, scale);
        self.snapshot_mut().set_environment(Some(environment));
    }

    /// Export to the configured default location
    pub fn export_scene(&mut self, graph: &SceneGraph) -> Result<PathBuf, SceneError> {
        let path = self.config.scene_path();
        self.export_scene_to(graph, &path)?;
        Ok(path)
    }

    /// Refresh records from the live graph and write them to `path`
    pub fn export_scene_to(&mut self, graph: &SceneGraph, path: &Path) -> Result<(), SceneError> {
        let snapshot = self.snapshot_mut();
        snapshot.refresh_for_export(graph);
        let json = snapshot.to_json()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;

        log::info!("Exported {} scene records to {:?}", snapshot.len(), path);
        Ok(())
    }

    /// Read a snapshot from disk without touching any scene
    pub fn read_snapshot(path: &Path) -> Result<SceneSnapshot, SceneError> {
        let content = std::fs::read_to_string(path)?;
        SceneSnapshot::from_json(&content)
    }

    /// Import from the configured default location
    pub fn import_scene(
        &mut self,
        graph: &mut SceneGraph,
        target: NodeHandle,
        assets: &dyn AssetSource,
        listener: &mut dyn SceneLoadListener,
    ) {
        let path = self.config.scene_path();
        self.import_scene_from(&path, graph, target, assets, listener);
    }

    /// Import the scene at `path` under `target`.
    ///
    /// The environment callback fires before this returns. Node callbacks
    /// follow as asset events are fed to [`handle_event`](Self::handle_event)
    /// or [`pump`](Self::pump). An unreadable or malformed file leaves the
    /// serializer without scene data and reports no environment.
    pub fn import_scene_from(
        &mut self,
        path: &Path,
        graph: &mut SceneGraph,
        target: NodeHandle,
        assets: &dyn AssetSource,
        listener: &mut dyn SceneLoadListener,
    ) {
        if let Some(previous) = self.import.take() {
            log::warn!(
                "Replacing unfinished import ({} in flight, {} waiting)",
                previous.in_flight(),
                previous.remaining()
            );
        }

        self.snapshot = match Self::read_snapshot(path) {
            Ok(snapshot) => {
                log::info!("Importing {} scene records from {:?}", snapshot.len(), path);
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("Could not read scene {:?}: {}", path, e);
                None
            }
        };

        let environment = self.attach_environment(graph, target, assets);
        listener.on_environment_loaded(graph, environment);

        let mut empty = SceneSnapshot::new();
        let snapshot = self.snapshot.as_mut().unwrap_or(&mut empty);
        let mut session = ImportSession::new(
            target,
            snapshot,
            self.config.import_settings.clone(),
            self.config.cache_enabled,
            self.config.max_in_flight(),
        );
        session.advance(snapshot, graph, assets, listener);

        if !session.is_finished() {
            self.import = Some(session);
        }
    }

    fn attach_environment(
        &self,
        graph: &mut SceneGraph,
        target: NodeHandle,
        assets: &dyn AssetSource,
    ) -> Option<NodeHandle> {
        let record = self.snapshot.as_ref()?.environment()?;
        if record.source_path.trim().is_empty() {
            return None;
        }

        let loaded = if record.is_cubemap() {
            assets.load_cubemap_texture(&record.source_path).map(Environment::Cubemap)
        } else {
            assets.load_texture(&record.source_path).map(Environment::Sphere)
        };
        let environment = match loaded {
            Ok(environment) => environment,
            Err(e) => {
                log::warn!("Could not open environment {}: {}", record.source_path, e);
                return None;
            }
        };

        let node = graph.create_node(ENVIRONMENT_NODE_NAME);
        graph.set_transform(node, Mat4::from_scale(Vec3::splat(record.scale)));
        if let Some(n) = graph.get_mut(node) {
            n.renderable = Some(Renderable::Environment(environment));
        }
        if !graph.add_child(target, node) {
            let root = graph.root();
            graph.add_child(root, node);
        }

        log::info!("Attached environment {} (scale {})", record.source_path, record.scale);
        Some(node)
    }

    /// Feed one asset event to the running import.
    ///
    /// Returns false when no import is running or the event belongs to an
    /// unrelated request.
    pub fn handle_event(
        &mut self,
        event: &AssetEvent,
        graph: &mut SceneGraph,
        assets: &dyn AssetSource,
        listener: &mut dyn SceneLoadListener,
    ) -> bool {
        let (Some(session), Some(snapshot)) = (self.import.as_mut(), self.snapshot.as_mut()) else {
            return false;
        };

        let consumed = session.handle_event(event, snapshot, graph, assets, listener);
        if session.is_finished() {
            self.import = None;
        }
        consumed
    }

    /// Drain the server's pending events into the import.
    ///
    /// Events the import does not own are handed back in arrival order.
    pub fn pump(
        &mut self,
        server: &AssetServer,
        graph: &mut SceneGraph,
        listener: &mut dyn SceneLoadListener,
    ) -> Vec<AssetEvent> {
        let mut unconsumed = Vec::new();
        for event in server.poll_events() {
            if !self.handle_event(&event, graph, server, listener) {
                unconsumed.push(event);
            }
        }
        unconsumed
    }

    /// Whether an import is still waiting on asset events
    pub fn is_importing(&self) -> bool {
        self.import.is_some()
    }

    /// The running import, if any
    pub fn import_session(&self) -> Option<&ImportSession> {
        self.import.as_ref()
    }

    /// Stop the running import. Records not yet restored stay in the snapshot.
    pub fn cancel_import(&mut self, listener: &mut dyn SceneLoadListener) {
        let Some(mut session) = self.import.take() else {
            return;
        };
        log::info!("Cancelling scene import");
        let empty = SceneSnapshot::new();
        session.cancel(self.snapshot.as_ref().unwrap_or(&empty), listener);
    }
}

impl Default for SceneSerializer {
    fn default() -> Self {
        Self::new(SerializerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NullListener;

    #[test]
    fn test_remove_before_any_data_fails() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("box");
        let mut serializer = SceneSerializer::default();
        assert!(matches!(
            serializer.remove_from_scene_data(node),
            Err(SceneError::NoSceneData)
        ));
    }

    #[test]
    fn test_set_environment_normalizes_scale() {
        let mut serializer = SceneSerializer::default();
        serializer.set_environment_data("sky.png", Some(0.0));
        let env = serializer.snapshot().unwrap().environment().unwrap();
        assert_eq!(env.scale, 200.0);
        assert_eq!(env.source_path, "sky.png");
    }

    #[test]
    fn test_export_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("scene.json");
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let node = graph.create_node("x");
        graph.add_child(root, node);

        let mut serializer = SceneSerializer::default();
        serializer.add_to_scene_data(&mut graph, node, "models/box.obj").unwrap();
        serializer.export_scene_to(&graph, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["sceneObjectDataList"][0]["name"], "box_0");
    }

    #[test]
    fn test_import_of_empty_list_finishes_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.json");
        std::fs::write(&path, r#"{"sceneObjectDataList": []}"#).unwrap();

        let server = void_asset::AssetServer::default_config().unwrap();
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let mut serializer = SceneSerializer::default();
        serializer.import_scene_from(&path, &mut graph, root, &server, &mut NullListener);

        assert!(!serializer.is_importing());
        assert!(serializer.snapshot().unwrap().has_node_list());
        assert!(!serializer.remove_from_scene_data(root).unwrap());
    }

    #[test]
    fn test_export_uses_configured_location() {
        let dir = tempfile::tempdir().unwrap();
        let config = SerializerConfig {
            scene_dir: Some(dir.path().to_path_buf()),
            file_name: "level.json".into(),
            ..SerializerConfig::default()
        };
        let graph = SceneGraph::new();
        let mut serializer = SceneSerializer::new(config);
        let path = serializer.export_scene(&graph).unwrap();
        assert_eq!(path, dir.path().join("level.json"));
        assert!(path.exists());
    }
}
