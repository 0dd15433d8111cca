//! Scene graph host
//!
//! Nodes live in a generational arena. A [`NodeHandle`] never keeps its node
//! alive: once the node is removed the slot's generation moves on and every
//! outstanding handle to it stops resolving. Persisted records use handles as
//! their back-reference to the live node for exactly this reason.

use std::fmt;
use std::sync::Arc;

use glam::Mat4;
use void_asset::{CubemapAsset, ModelAsset, TextureAsset};

/// Weak, copyable reference to a scene node
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    index: u32,
    generation: u32,
}

impl NodeHandle {
    /// Slot index
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHandle({}v{})", self.index, self.generation)
    }
}

/// Backdrop attached to a scene
#[derive(Clone, Debug)]
pub enum Environment {
    /// Equirectangular texture on an inward-facing sphere
    Sphere(Arc<TextureAsset>),
    /// Six-face cubemap
    Cubemap(Arc<CubemapAsset>),
}

/// Render data attached to a node
#[derive(Clone, Debug)]
pub enum Renderable {
    Model(Arc<ModelAsset>),
    Environment(Environment),
}

/// A node in the scene graph
#[derive(Clone, Debug)]
pub struct SceneNode {
    pub name: String,
    /// Local transform
    pub transform: Mat4,
    pub renderable: Option<Renderable>,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

impl SceneNode {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            renderable: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }
}

struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// Arena-backed node hierarchy with a permanent root
pub struct SceneGraph {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    root: NodeHandle,
    live: usize,
}

impl SceneGraph {
    /// Create a graph containing only the root
    pub fn new() -> Self {
        let mut graph = Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            root: NodeHandle { index: 0, generation: 0 },
            live: 0,
        };
        graph.root = graph.allocate(SceneNode::new("root"));
        graph
    }

    /// The root node
    pub fn root(&self) -> NodeHandle {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn allocate(&mut self, node: SceneNode) -> NodeHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            NodeHandle { index, generation: slot.generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot { generation: 0, node: Some(node) });
            NodeHandle { index, generation: 0 }
        }
    }

    /// Create a detached node
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeHandle {
        self.allocate(SceneNode::new(name))
    }

    /// Whether the handle still refers to a live node
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&SceneNode> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut SceneNode> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    pub fn name(&self, handle: NodeHandle) -> Option<&str> {
        self.get(handle).map(|n| n.name.as_str())
    }

    /// Rename a node. Returns false for a stale handle.
    pub fn set_name(&mut self, handle: NodeHandle, name: impl Into<String>) -> bool {
        match self.get_mut(handle) {
            Some(node) => {
                node.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn transform(&self, handle: NodeHandle) -> Option<Mat4> {
        self.get(handle).map(|n| n.transform)
    }

    /// Replace a node's local transform. Returns false for a stale handle.
    pub fn set_transform(&mut self, handle: NodeHandle, transform: Mat4) -> bool {
        match self.get_mut(handle) {
            Some(node) => {
                node.transform = transform;
                true
            }
            None => false,
        }
    }

    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.get(handle).map(|n| n.children()).unwrap_or(&[])
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    ///
    /// Fails for stale handles and for attachments that would form a cycle.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return false;
        }

        let mut cursor = self.get(parent).and_then(|n| n.parent);
        while let Some(ancestor) = cursor {
            if ancestor == child {
                return false;
            }
            cursor = self.get(ancestor).and_then(|n| n.parent);
        }

        self.detach(child);
        if let Some(node) = self.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.get_mut(parent) {
            node.children.push(child);
        }
        true
    }

    /// Detach a node from its parent without freeing it
    pub fn detach(&mut self, handle: NodeHandle) {
        let Some(parent) = self.get_mut(handle).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != handle);
        }
    }

    /// Remove a node and its whole subtree. The root cannot be removed.
    pub fn remove_node(&mut self, handle: NodeHandle) -> bool {
        if handle == self.root || !self.contains(handle) {
            return false;
        }

        self.detach(handle);
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free_list.push(current.index);
                self.live -= 1;
            }
        }
        true
    }

    /// First node with the given name, depth-first from the root
    pub fn find_by_name(&self, name: &str) -> Option<NodeHandle> {
        self.descendants(self.root)
            .into_iter()
            .find(|h| self.name(*h) == Some(name))
    }

    /// All nodes below `handle` in depth-first pre-order, excluding `handle`
    pub fn descendants(&self, handle: NodeHandle) -> Vec<NodeHandle> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeHandle> = self.children(handle).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_stale_handle_stops_resolving() {
        let mut graph = SceneGraph::new();
        let node = graph.create_node("box");
        assert!(graph.contains(node));

        assert!(graph.remove_node(node));
        assert!(!graph.contains(node));
        assert!(!graph.set_name(node, "other"));

        // Slot is reused with a new generation
        let reused = graph.create_node("sphere");
        assert_eq!(reused.index(), node.index());
        assert_ne!(reused, node);
        assert_eq!(graph.name(node), None);
        assert_eq!(graph.name(reused), Some("sphere"));
    }

    #[test]
    fn test_add_child_reparents() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        let c = graph.create_node("c");

        assert!(graph.add_child(a, c));
        assert!(graph.add_child(b, c));
        assert!(graph.children(a).is_empty());
        assert_eq!(graph.children(b), &[c]);
        assert_eq!(graph.get(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn test_add_child_rejects_cycles() {
        let mut graph = SceneGraph::new();
        let a = graph.create_node("a");
        let b = graph.create_node("b");
        assert!(graph.add_child(a, b));
        assert!(!graph.add_child(b, a));
        assert!(!graph.add_child(a, a));
    }

    #[test]
    fn test_remove_subtree() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let parent = graph.create_node("parent");
        let child = graph.create_node("child");
        graph.add_child(root, parent);
        graph.add_child(parent, child);
        assert_eq!(graph.len(), 3);

        assert!(graph.remove_node(parent));
        assert!(!graph.contains(child));
        assert_eq!(graph.len(), 1);
        assert!(graph.children(root).is_empty());
        assert!(!graph.remove_node(root));
    }

    #[test]
    fn test_transform_and_lookup() {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let node = graph.create_node("lamp");
        graph.add_child(root, node);

        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(graph.set_transform(node, m));
        assert_eq!(graph.transform(node), Some(m));
        assert_eq!(graph.find_by_name("lamp"), Some(node));
        assert_eq!(graph.find_by_name("missing"), None);
    }
}
