/// SceneGraph - parent/child node hierarchy producing render objects
///
/// Nodes live in a SlotMap so keys stay valid while other nodes come and go.
/// World transforms are cached and refreshed top-down by `refresh_transforms`.

use std::sync::Arc;
use glam::Mat4;
use slotmap::{new_key_type, SlotMap};

use crate::error::{Error, Result};
use crate::scene::{DrawContext, MeshAsset, RenderObject};

new_key_type! {
    /// Stable key of a scene node
    pub struct NodeKey;
}

/// What a node contributes when drawn
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Grouping node, only carries a transform
    Empty,
    Mesh(Arc<MeshAsset>),
}

/// One node of the hierarchy
#[derive(Debug, Clone)]
pub struct Node {
    pub parent: Option<NodeKey>,
    pub children: Vec<NodeKey>,
    pub local_transform: Mat4,
    /// parent.world_transform * local_transform, as of the last refresh
    pub world_transform: Mat4,
    pub kind: NodeKind,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self { nodes: SlotMap::with_key(), roots: Vec::new() }
    }

    /// Insert a node under `parent`, or as a root when `parent` is None
    ///
    /// The world transform is computed from the parent's cached one.
    pub fn add_node(
        &mut self,
        parent: Option<NodeKey>,
        local_transform: Mat4,
        kind: NodeKind,
    ) -> Result<NodeKey> {
        let parent_world = match parent {
            Some(p) => self
                .nodes
                .get(p)
                .map(|n| n.world_transform)
                .ok_or_else(|| Error::InvalidResource(format!("parent node {:?} not found", p)))?,
            None => Mat4::IDENTITY,
        };

        let key = self.nodes.insert(Node {
            parent,
            children: Vec::new(),
            local_transform,
            world_transform: parent_world * local_transform,
            kind,
        });

        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(p) {
                    parent_node.children.push(key);
                }
            }
            None => self.roots.push(key),
        }
        Ok(key)
    }

    /// Remove a node and its whole subtree
    ///
    /// Returns false if the key is invalid.
    pub fn remove_node(&mut self, key: NodeKey) -> bool {
        let parent = match self.nodes.get(key) {
            Some(node) => node.parent,
            None => return false,
        };
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent_node) => parent_node.children.retain(|&c| c != key),
            None => self.roots.retain(|&r| r != key),
        }

        let mut stack = vec![key];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.nodes.remove(next) {
                stack.extend(node.children);
            }
        }
        true
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Replace a node's local transform; call `refresh_transforms` afterwards
    pub fn set_local_transform(&mut self, key: NodeKey, local_transform: Mat4) -> Result<()> {
        let node = self
            .nodes
            .get_mut(key)
            .ok_or_else(|| Error::InvalidResource(format!("node {:?} not found", key)))?;
        node.local_transform = local_transform;
        Ok(())
    }

    /// Recompute every cached world transform, parents before children
    pub fn refresh_transforms(&mut self) {
        let mut stack: Vec<(NodeKey, Mat4)> =
            self.roots.iter().map(|&r| (r, Mat4::IDENTITY)).collect();
        while let Some((key, parent_world)) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(key) {
                node.world_transform = parent_world * node.local_transform;
                let world = node.world_transform;
                stack.extend(node.children.iter().map(|&c| (c, world)));
            }
        }
    }

    /// Append a RenderObject for every drawable surface in the graph
    ///
    /// `top` is applied on top of each node's world transform. Surfaces
    /// without a material are skipped.
    pub fn draw(&self, top: Mat4, ctx: &mut DrawContext) {
        for node in self.nodes.values() {
            let NodeKind::Mesh(mesh) = &node.kind else { continue };
            let transform = top * node.world_transform;
            for surface in &mesh.surfaces {
                let Some(material) = surface.material else { continue };
                ctx.push(RenderObject {
                    index_count: surface.count,
                    first_index: surface.start_index,
                    index_buffer: mesh.mesh_buffers.index_buffer.buffer,
                    material,
                    transform,
                    vertex_buffer_address: mesh.mesh_buffers.vertex_buffer_address,
                });
            }
        }
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
#[path = "scene_graph_tests.rs"]
mod tests;
