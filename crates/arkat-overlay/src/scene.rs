//! Scene graph for anchored overlay content

use arkat_core::Pose;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::material::ChromaKeyMaterial;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    #[error("Unknown scene node: {0}")]
    UnknownNode(NodeId),
}

/// A fixed point in world space derived from a tracked pose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    id: Uuid,
    pose: Pose,
    attached: bool,
}

impl Anchor {
    pub fn new(pose: Pose) -> Self {
        Self {
            id: Uuid::new_v4(),
            pose,
            attached: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Stop tracking this anchor; it no longer moves with the world
    pub fn detach(&mut self) {
        self.attached = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root that follows an anchor
    Anchor { anchor: Uuid },
    /// Node the user can move, rotate and scale
    Transformable { selected: bool },
    /// Chroma-keyed video surface
    Video { material: ChromaKeyMaterial },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub local_scale: [f32; 3],
    pub cast_shadows: bool,
    pub receive_shadows: bool,
}

impl Node {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            local_scale: [1.0, 1.0, 1.0],
            cast_shadows: true,
            receive_shadows: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: HashMap<NodeId, Node>,
    next_id: u32,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Add a node directly under the scene root
    pub fn add_root(&mut self, kind: NodeKind) -> NodeId {
        self.allocate(Node::new(kind, None))
    }

    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> Result<NodeId, SceneError> {
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::UnknownNode(parent));
        }
        let id = self.allocate(Node::new(kind, Some(parent)));
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Remove a node and its whole subtree; returns the number of nodes removed
    pub fn detach(&mut self, id: NodeId) -> Result<usize, SceneError> {
        let node = self.nodes.get(&id).ok_or(SceneError::UnknownNode(id))?;
        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }

        let mut removed = 0;
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(&next) {
                stack.extend(node.children);
                removed += 1;
            }
        }
        debug!(node = %id, removed, "Detached scene subtree");
        Ok(removed)
    }

    /// Number of ancestors between `id` and the scene root
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        let mut node = self.nodes.get(&id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            depth += 1;
        }
        Some(depth)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
