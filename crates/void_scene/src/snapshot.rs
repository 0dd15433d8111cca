//! Scene snapshot - the serializable view of a scene
//!
//! A snapshot holds one [`NodeRecord`] per persisted node plus an optional
//! [`EnvironmentRecord`]. It does not own live nodes; records point at them
//! through weak [`NodeHandle`]s.
//!
//! Record names are kept unique so that a re-imported record can be matched
//! back to its freshly created node by name alone.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SceneError;
use crate::graph::{NodeHandle, SceneGraph};
use crate::record::{EnvironmentRecord, NodeRecord, RecordId};

/// Persisted nodes and environment of a scene
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(
        rename = "environmentData",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    environment: Option<EnvironmentRecord>,
    #[serde(
        rename = "sceneObjectDataList",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    nodes: Option<Vec<NodeRecord>>,
    /// Built on first add after construction or deserialization
    #[serde(skip)]
    names: Option<HashSet<String>>,
    /// Suffix counter for generated names
    #[serde(skip)]
    counter: u32,
}

impl SceneSnapshot {
    /// Create an empty snapshot with no node list
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a snapshot from JSON text
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        let mut snapshot: SceneSnapshot =
            serde_json::from_str(text).map_err(|e| SceneError::Parse(e.to_string()))?;
        if let Some(env) = snapshot.environment.as_mut() {
            env.normalize();
        }
        Ok(snapshot)
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// Fails if any record holds a non-finite matrix element, since JSON has
    /// no representation for it and the file could not be read back.
    pub fn to_json(&self) -> Result<String, SceneError> {
        if let Some(record) = self.nodes().iter().find(|r| !r.is_finite()) {
            return Err(SceneError::Serialization(format!(
                "record {} ({}) has a non-finite transform",
                record.name, record.source_path
            )));
        }
        serde_json::to_string_pretty(self).map_err(|e| SceneError::Serialization(e.to_string()))
    }

    pub fn environment(&self) -> Option<&EnvironmentRecord> {
        self.environment.as_ref()
    }

    /// Replace the environment record, normalizing its scale
    pub fn set_environment(&mut self, environment: Option<EnvironmentRecord>) {
        self.environment = environment.map(|mut env| {
            env.normalize();
            env
        });
    }

    /// Records in list order (empty when there is no node list)
    pub fn nodes(&self) -> &[NodeRecord] {
        self.nodes.as_deref().unwrap_or(&[])
    }

    /// Whether a node list exists (after an add or a deserialize that had one)
    pub fn has_node_list(&self) -> bool {
        self.nodes.is_some()
    }

    pub fn len(&self) -> usize {
        self.nodes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }

    /// Record currently associated with a live node
    pub fn record_for(&self, node: NodeHandle) -> Option<&NodeRecord> {
        self.nodes().iter().find(|r| r.node() == Some(node))
    }

    pub(crate) fn record(&self, id: RecordId) -> Option<&NodeRecord> {
        self.nodes().iter().find(|r| r.id() == id)
    }

    pub(crate) fn record_mut(&mut self, id: RecordId) -> Option<&mut NodeRecord> {
        self.nodes.as_mut()?.iter_mut().find(|r| r.id() == id)
    }

    /// Drop a record by identity, keeping the name index in step
    pub(crate) fn remove_record(&mut self, id: RecordId) -> Option<NodeRecord> {
        let nodes = self.nodes.as_mut()?;
        let pos = nodes.iter().position(|r| r.id() == id)?;
        let record = nodes.remove(pos);
        if let Some(names) = self.names.as_mut() {
            names.remove(&record.name);
        }
        Some(record)
    }

    /// Persist a live node.
    ///
    /// The node is renamed to `<basename>_<n>` where `basename` is the source
    /// path's file name without extension and `n` is the first value of this
    /// snapshot's counter that yields an unused name.
    pub fn add_node(
        &mut self,
        graph: &mut SceneGraph,
        node: NodeHandle,
        source_path: &str,
    ) -> Result<&NodeRecord, SceneError> {
        let transform = graph.transform(node).ok_or(SceneError::UnknownNode(node))?;
        let name = self.unique_name(&base_name(source_path));
        graph.set_name(node, name.clone());

        let mut record = NodeRecord::new(source_path, name.clone(), transform);
        record.associate(node);

        self.name_index().insert(name);
        let nodes = self.nodes.get_or_insert_with(Vec::new);
        nodes.push(record);
        Ok(&nodes[nodes.len() - 1])
    }

    /// Forget the record associated with `node`.
    ///
    /// Matches by back-reference identity only. Returns whether a record was
    /// removed; fails if no node list exists yet.
    pub fn remove_node(&mut self, node: NodeHandle) -> Result<bool, SceneError> {
        let nodes = self.nodes.as_ref().ok_or(SceneError::NoSceneData)?;
        let Some(id) = nodes.iter().find(|r| r.node() == Some(node)).map(|r| r.id()) else {
            return Ok(false);
        };
        Ok(self.remove_record(id).is_some())
    }

    /// Copy each live node's current transform and name into its record.
    ///
    /// Records without a live node are left untouched. A non-finite live
    /// transform keeps the record's last matrix, and a live name already held
    /// by another record keeps the record's last name.
    pub fn refresh_for_export(&mut self, graph: &SceneGraph) {
        let Some(nodes) = self.nodes.as_mut() else {
            return;
        };

        let mut names: HashSet<String> = nodes.iter().map(|r| r.name.clone()).collect();
        let mut renamed = false;
        for record in nodes.iter_mut() {
            let Some(node) = record.node().and_then(|h| graph.get(h)) else {
                continue;
            };

            if node.transform.is_finite() {
                record.set_transform(node.transform);
            } else {
                log::warn!(
                    "Node {} has a non-finite transform; keeping its last saved matrix",
                    record.name
                );
            }

            if record.name == node.name {
                continue;
            }
            if names.contains(&node.name) {
                log::warn!(
                    "Node {} was renamed to {}, which another record already uses; keeping {}",
                    record.name,
                    node.name,
                    record.name
                );
                continue;
            }
            names.remove(&record.name);
            names.insert(node.name.clone());
            record.name = node.name.clone();
            renamed = true;
        }

        if renamed {
            self.names = None;
        }
    }

    fn name_index(&mut self) -> &mut HashSet<String> {
        let nodes = &self.nodes;
        self.names.get_or_insert_with(|| {
            nodes
                .iter()
                .flatten()
                .map(|r| r.name.clone())
                .collect()
        })
    }

    fn unique_name(&mut self, base: &str) -> String {
        loop {
            let candidate = format!("{}_{}", base, self.counter);
            self.counter += 1;
            if !self.name_index().contains(&candidate) {
                return candidate;
            }
        }
    }
}

/// `"models/chair.obj"` -> `"chair"`
pub fn base_name(source_path: &str) -> String {
    let file = source_path
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(source_path);
    let stem = Path::new(file)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file);
    if stem.is_empty() {
        "node".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    fn live(graph: &mut SceneGraph) -> NodeHandle {
        let root = graph.root();
        let node = graph.create_node("unnamed");
        graph.add_child(root, node);
        node
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("x/cube.obj"), "cube");
        assert_eq!(base_name("cube.obj"), "cube");
        assert_eq!(base_name("a\\b\\lamp.glb"), "lamp");
        assert_eq!(base_name("dir/archive.tar.gz"), "archive.tar");
        assert_eq!(base_name("dir/"), "node");
    }

    #[test]
    fn test_colliding_names_get_counters() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();

        let a = live(&mut graph);
        let b = live(&mut graph);
        snapshot.add_node(&mut graph, a, "x/cube.obj").unwrap();
        snapshot.add_node(&mut graph, b, "y/cube.obj").unwrap();

        assert_eq!(graph.name(a), Some("cube_0"));
        assert_eq!(graph.name(b), Some("cube_1"));
        assert_eq!(snapshot.nodes()[1].name, "cube_1");
        assert_eq!(snapshot.record_for(b).unwrap().source_path, "y/cube.obj");
    }

    #[test]
    fn test_names_stay_unique_after_deserialize() {
        let json = r#"{
            "sceneObjectDataList": [
                { "src": "cube.obj", "name": "cube_0",
                  "modelMatrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1] },
                { "src": "cube.obj", "name": "cube_1",
                  "modelMatrix": [1,0,0,0, 0,1,0,0, 0,0,1,0, 0,0,0,1] }
            ]
        }"#;
        let mut snapshot = SceneSnapshot::from_json(json).unwrap();
        let mut graph = SceneGraph::new();
        let node = live(&mut graph);

        snapshot.add_node(&mut graph, node, "cube.obj").unwrap();
        assert_eq!(graph.name(node), Some("cube_2"));

        let names: HashSet<&str> = snapshot.nodes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), snapshot.len());
    }

    #[test]
    fn test_many_adds_never_collide() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let paths = ["a/box.obj", "b/box.obj", "box.glb", "c/ball.obj", "ball.obj"];
        for i in 0..40 {
            let node = live(&mut graph);
            snapshot.add_node(&mut graph, node, paths[i % paths.len()]).unwrap();
        }
        let names: HashSet<&str> = snapshot.nodes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), 40);
    }

    #[test]
    fn test_add_rejects_stale_node() {
        let mut graph = SceneGraph::new();
        let node = live(&mut graph);
        graph.remove_node(node);

        let mut snapshot = SceneSnapshot::new();
        assert!(matches!(
            snapshot.add_node(&mut graph, node, "a.obj"),
            Err(SceneError::UnknownNode(_))
        ));
        assert!(!snapshot.has_node_list());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let a = live(&mut graph);
        let b = live(&mut graph);
        snapshot.add_node(&mut graph, a, "box.obj").unwrap();
        snapshot.add_node(&mut graph, b, "box.obj").unwrap();

        assert!(snapshot.remove_node(a).unwrap());
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.nodes()[0].node(), Some(b));

        // Unknown node is a no-op
        assert!(!snapshot.remove_node(a).unwrap());
        assert_eq!(snapshot.len(), 1);
    }

    #[test]
    fn test_remove_without_node_list_fails() {
        let mut graph = SceneGraph::new();
        let node = live(&mut graph);
        let mut snapshot = SceneSnapshot::new();
        assert!(matches!(
            snapshot.remove_node(node),
            Err(SceneError::NoSceneData)
        ));
    }

    #[test]
    fn test_refresh_reads_live_state() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let a = live(&mut graph);
        snapshot.add_node(&mut graph, a, "box.obj").unwrap();

        let moved = Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0));
        graph.set_transform(a, moved);
        graph.set_name(a, "crate");
        snapshot.refresh_for_export(&graph);

        let record = &snapshot.nodes()[0];
        assert_eq!(record.transform(), moved);
        assert_eq!(record.name, "crate");
    }

    #[test]
    fn test_refresh_skips_records_without_live_node() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let a = live(&mut graph);
        snapshot.add_node(&mut graph, a, "box.obj").unwrap();
        graph.remove_node(a);

        snapshot.refresh_for_export(&graph);
        assert_eq!(snapshot.nodes()[0].name, "box_0");
        assert_eq!(snapshot.nodes()[0].transform(), Mat4::IDENTITY);

        // No node list at all
        let mut empty = SceneSnapshot::new();
        empty.refresh_for_export(&graph);
        assert!(!empty.has_node_list());
    }

    #[test]
    fn test_refresh_keeps_last_finite_matrix() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let a = live(&mut graph);
        let b = live(&mut graph);
        let placed = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        graph.set_transform(b, placed);
        snapshot.add_node(&mut graph, a, "box.obj").unwrap();
        snapshot.add_node(&mut graph, b, "box.obj").unwrap();

        graph.set_transform(b, Mat4::from_scale(Vec3::new(f32::INFINITY, 1.0, 1.0)));
        snapshot.refresh_for_export(&graph);
        assert_eq!(snapshot.nodes()[1].transform(), placed);

        let reread = SceneSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(reread.len(), 2);
        assert_eq!(reread.nodes()[1].transform(), placed);
    }

    #[test]
    fn test_non_finite_record_is_not_serialized() {
        let mut snapshot = SceneSnapshot::new();
        let mut graph = SceneGraph::new();
        let node = live(&mut graph);
        graph.set_transform(node, Mat4::from_scale(Vec3::splat(f32::NAN)));
        snapshot.add_node(&mut graph, node, "bad.obj").unwrap();

        match snapshot.to_json() {
            Err(SceneError::Serialization(message)) => assert!(message.contains("bad_0")),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_refresh_rejects_clashing_rename() {
        let mut graph = SceneGraph::new();
        let mut snapshot = SceneSnapshot::new();
        let a = live(&mut graph);
        let b = live(&mut graph);
        snapshot.add_node(&mut graph, a, "box.obj").unwrap();
        snapshot.add_node(&mut graph, b, "box.obj").unwrap();

        graph.set_name(b, "box_0");
        snapshot.refresh_for_export(&graph);

        let names: Vec<&str> = snapshot.nodes().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["box_0", "box_1"]);

        // A free name is still taken over
        graph.set_name(b, "lid");
        snapshot.refresh_for_export(&graph);
        assert_eq!(snapshot.nodes()[1].name, "lid");
    }

    #[test]
    fn test_schema_omits_absent_sections() {
        let snapshot = SceneSnapshot::new();
        assert_eq!(snapshot.to_json().unwrap().replace(char::is_whitespace, ""), "{}");
    }

    #[test]
    fn test_environment_scale_default_on_set() {
        let mut snapshot = SceneSnapshot::new();
        snapshot.set_environment(Some(EnvironmentRecord {
            source_path: "sky.png".into(),
            scale: -5.0,
        }));
        assert_eq!(snapshot.environment().unwrap().scale, 200.0);
    }
}
