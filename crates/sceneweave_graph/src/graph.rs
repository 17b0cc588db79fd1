// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node arena.
//!
//! Nodes live in an insertion-ordered map keyed by [`NodeId`]. Ids come from a
//! monotonic counter, so a stale handle never resolves to a different node.

use crate::endpoint::{Endpoint, EndpointId, Slot};
use crate::node::{EditorNode, NodeId};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Arena of editor nodes
#[derive(Debug, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, EditorNode>,
    next_id: u32,
}

impl Graph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a node and return its handle.
    ///
    /// The node must not hold links yet; connections are made through the
    /// registry once both ends are in the arena.
    pub(crate) fn add_node(&mut self, node: EditorNode) -> NodeId {
        debug_assert!(
            node.endpoints().all(|(_, e)| !e.is_connected()),
            "nodes enter the arena unconnected"
        );
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, node);
        id
    }

    /// Remove a node, returning it with its position in the arena order
    pub(crate) fn take_node(&mut self, id: NodeId) -> Option<(usize, EditorNode)> {
        self.nodes.shift_remove_full(&id).map(|(index, _, node)| (index, node))
    }

    /// Put a previously taken node back under its old id and position
    pub(crate) fn restore_node(&mut self, index: usize, id: NodeId, node: EditorNode) {
        debug_assert!(!self.nodes.contains_key(&id), "node {id} restored twice");
        let index = index.min(self.nodes.len());
        self.nodes.shift_insert(index, id, node);
        self.next_id = self.next_id.max(id.0 + 1);
    }

    /// Get a node by ID
    pub fn node(&self, id: NodeId) -> Option<&EditorNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut EditorNode> {
        self.nodes.get_mut(&id)
    }

    /// Whether `id` is in the arena
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get all nodes in arena order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &EditorNode)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// First node whose name matches
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes().find(|(_, node)| node.name() == name).map(|(id, _)| id)
    }

    /// Endpoint by handle
    pub fn endpoint(&self, id: EndpointId) -> Option<&Endpoint> {
        self.nodes.get(&id.node).and_then(|node| node.endpoint(id.field))
    }

    pub(crate) fn endpoint_mut(&mut self, id: EndpointId) -> Option<&mut Endpoint> {
        self.nodes.get_mut(&id.node).and_then(|node| node.endpoint_mut(id.field))
    }

    /// Endpoint of `node` for `slot`
    pub fn slot_endpoint(&self, node: NodeId, slot: Slot) -> Option<EndpointId> {
        let field = self.nodes.get(&node)?.slot_index(slot)?;
        Some(EndpointId::new(node, field))
    }

    /// Endpoint of `node` in the field called `name`
    pub fn field_endpoint(&self, node: NodeId, name: &str) -> Option<EndpointId> {
        let owner = self.nodes.get(&node)?;
        let field = owner.field_index(name)?;
        owner.endpoint(field)?;
        Some(EndpointId::new(node, field))
    }

    /// Every endpoint in arena order
    pub fn endpoints(&self) -> impl Iterator<Item = (EndpointId, &Endpoint)> + '_ {
        self.nodes.iter().flat_map(|(id, node)| {
            node.endpoints()
                .map(move |(field, endpoint)| (EndpointId::new(*id, field), endpoint))
        })
    }

    /// Scene parent of `node`
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.slot_endpoint(node, Slot::Parent)?;
        self.endpoint(parent)?.partners().next().map(|p| p.node)
    }

    /// Scene children of `node` in link order
    pub fn children_of(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.slot_endpoint(node, Slot::Children)
            .and_then(|children| self.endpoint(children))
            .into_iter()
            .flat_map(|children| children.partners().map(|p| p.node))
    }

    /// Whether `ancestor` is `node` or sits above it in the scene hierarchy
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Visit `root` and every node below it along children links, depth first
    pub fn walk_subtree(&self, root: NodeId, mut visit: impl FnMut(NodeId, &EditorNode)) {
        let mut seen = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            visit(id, node);

            let below: Vec<NodeId> = self.children_of(id).collect();
            stack.extend(below.into_iter().rev());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    #[test]
    fn test_ids_are_not_reused() {
        let mut graph = Graph::new();
        let a = graph.add_node(EditorNode::new(NodeKind::Node, "a"));
        graph.take_node(a);
        let b = graph.add_node(EditorNode::new(NodeKind::Node, "b"));
        assert_ne!(a, b);
        assert!(graph.node(a).is_none());
    }

    #[test]
    fn test_restore_keeps_order() {
        let mut graph = Graph::new();
        let a = graph.add_node(EditorNode::new(NodeKind::Node, "a"));
        let b = graph.add_node(EditorNode::new(NodeKind::Node, "b"));
        let c = graph.add_node(EditorNode::new(NodeKind::Node, "c"));

        let (index, node) = graph.take_node(b).unwrap();
        assert_eq!(index, 1);
        graph.restore_node(index, b, node);
        assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_endpoint_lookup() {
        let mut graph = Graph::new();
        let id = graph.add_node(EditorNode::new(NodeKind::Geometry, "mesh"));

        let shader = graph.slot_endpoint(id, Slot::Shader).unwrap();
        assert_eq!(graph.field_endpoint(id, "Shader"), Some(shader));
        assert_eq!(graph.endpoint(shader).map(Endpoint::slot), Some(Slot::Shader));
        // The name field has no endpoint
        assert!(graph.field_endpoint(id, "Name").is_none());
        assert_eq!(graph.endpoints().count(), NodeKind::Geometry.slots().len());
    }

    #[test]
    fn test_find_by_name() {
        let mut graph = Graph::new();
        graph.add_node(EditorNode::new(NodeKind::Node, "a"));
        let b = graph.add_node(EditorNode::new(NodeKind::Node, "b"));
        assert_eq!(graph.find_by_name("b"), Some(b));
        assert_eq!(graph.find_by_name("z"), None);
    }
}
