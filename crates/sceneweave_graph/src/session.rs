// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editing session.
//!
//! The session is the single mutation point of the interaction loop: every
//! edit is validated into a command and queued, and [`EditorSession::end_frame`]
//! executes the whole batch once per frame.

use crate::command::{
    AddNodeCommand, CommandError, RemoveNodeCommand, SetConnectionsCommand, SetPropertyCommand,
};
use crate::diagnostics::Diagnostics;
use crate::endpoint::EndpointId;
use crate::history::{CommandQueue, FlushReport, HistoryError, HistoryStats, MAX_HISTORY};
use crate::importer::import_or_empty;
use crate::node::{EditorNode, NodeId};
use crate::registry::ConnectionRegistry;
use crate::scene::SceneDocument;
use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};

/// Session tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Undo history depth
    pub max_history: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY,
        }
    }
}

/// A graph under edit together with its command history
#[derive(Debug, Default)]
pub struct EditorSession {
    registry: ConnectionRegistry,
    commands: CommandQueue,
}

impl EditorSession {
    /// Start from an empty graph
    pub fn new(config: &SessionConfig) -> Self {
        Self::from_registry(ConnectionRegistry::new(), config)
    }

    /// Edit an existing graph
    pub fn from_registry(registry: ConnectionRegistry, config: &SessionConfig) -> Self {
        Self {
            registry,
            commands: CommandQueue::with_max_depth(config.max_history),
        }
    }

    /// Import `doc` and edit the result. A fatal import error leaves the
    /// session empty with the error as its only diagnostic.
    pub fn from_import(doc: &SceneDocument, config: &SessionConfig) -> (Self, Diagnostics) {
        let result = import_or_empty(doc);
        (Self::from_registry(result.registry, config), result.diagnostics)
    }

    /// The graph under edit
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The command queue and history
    pub fn commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Queue the insertion of `node`
    pub fn add_node(&mut self, node: EditorNode) {
        self.commands.queue(AddNodeCommand::new(node));
    }

    /// Queue the removal of `node` and all of its links
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), CommandError> {
        let command = RemoveNodeCommand::new(&self.registry, node)?;
        self.commands.queue(command);
        Ok(())
    }

    /// Queue a value edit
    pub fn set_property(
        &mut self,
        node: NodeId,
        field: &str,
        value: PropertyValue,
    ) -> Result<(), CommandError> {
        let command = SetPropertyCommand::new(&self.registry, node, field, value)?;
        self.commands.queue(command);
        Ok(())
    }

    /// Queue a link between `a` and `b`, displacing partners of single ends
    pub fn connect(&mut self, a: EndpointId, b: EndpointId) -> Result<(), CommandError> {
        if !self.registry.can_connect(a, b) {
            return Err(CommandError::Incompatible(a, b));
        }
        let map = self.registry.query_state_change(a, b, true);
        if map.is_empty() {
            return Ok(());
        }
        self.commands.queue(SetConnectionsCommand::new(&self.registry, map)?);
        Ok(())
    }

    /// Queue the removal of every link of `endpoint`
    pub fn disconnect_endpoint(&mut self, endpoint: EndpointId) -> Result<(), CommandError> {
        if self.registry.graph().endpoint(endpoint).is_none() {
            return Err(CommandError::EndpointNotFound(endpoint));
        }
        let map = self.registry.query_disconnect(endpoint);
        if map.is_empty() {
            return Ok(());
        }
        self.commands.queue(SetConnectionsCommand::new(&self.registry, map)?);
        Ok(())
    }

    /// Start dragging a link from `endpoint`
    pub fn begin_connect(&mut self, endpoint: EndpointId) -> bool {
        self.registry.begin_seek(endpoint)
    }

    /// Drop the dragged link on `candidate`, or on empty space.
    ///
    /// The whole gesture becomes one command. Returns whether anything was
    /// queued.
    pub fn release_connect(&mut self, candidate: Option<EndpointId>) -> Result<bool, CommandError> {
        let Some(map) = self.registry.release_seek(candidate) else {
            return Ok(false);
        };
        self.commands.queue(SetConnectionsCommand::new(&self.registry, map)?);
        Ok(true)
    }

    /// Abandon the current drag
    pub fn cancel_connect(&mut self) {
        self.registry.cancel_seek();
    }

    /// Endpoint currently being dragged
    pub fn connecting_from(&self) -> Option<EndpointId> {
        self.registry.seeker()
    }

    /// Execute everything queued this frame
    pub fn end_frame(&mut self) -> FlushReport {
        self.commands.flush(&mut self.registry)
    }

    /// Undo the last recorded edit. Pending edits run first.
    pub fn undo(&mut self) -> Result<(), HistoryError> {
        self.end_frame();
        self.commands.undo(&mut self.registry)
    }

    /// Redo the next undone edit. Pending edits run first.
    pub fn redo(&mut self) -> Result<(), HistoryError> {
        self.end_frame();
        self.commands.redo(&mut self.registry)
    }

    /// History statistics
    pub fn stats(&self) -> HistoryStats {
        self.commands.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Slot;
    use crate::node::NodeKind;
    use crate::scene::fixtures::{sample, MESH};
    use crate::scene::ObjectId;
    use crate::state::EndpointPair;

    type Snapshot = (Vec<(NodeId, String)>, Vec<(EndpointId, Vec<EndpointId>)>, Vec<EndpointPair>);

    /// Node names in arena order, every partner list, and the links in
    /// drawing order, for comparing whole states
    fn snapshot(session: &EditorSession) -> Snapshot {
        let graph = session.registry().graph();
        let nodes = graph.nodes().map(|(id, n)| (id, n.name().to_string())).collect();
        let partners = graph.endpoints().map(|(id, e)| (id, e.partners().collect())).collect();
        let links = session.registry().connections().collect();
        (nodes, partners, links)
    }

    fn endpoint(session: &EditorSession, node: NodeId, slot: Slot) -> EndpointId {
        session.registry().graph().slot_endpoint(node, slot).unwrap()
    }

    /// A node whose controller is linked to the first of two controllers
    fn controlled() -> (EditorSession, NodeId, NodeId, NodeId) {
        let mut registry = ConnectionRegistry::new();
        let a = registry.add_node(EditorNode::new(NodeKind::Node, "a"));
        let b = registry.add_node(EditorNode::new(NodeKind::Controller, "b"));
        let c = registry.add_node(EditorNode::new(NodeKind::Controller, "c"));
        let mut session = EditorSession::from_registry(registry, &SessionConfig::default());

        let from = endpoint(&session, a, Slot::Controller);
        let to = endpoint(&session, b, Slot::ControllerTarget);
        session.connect(from, to).unwrap();
        session.end_frame();
        (session, a, b, c)
    }

    #[test]
    fn test_drag_gesture_is_one_undo_step() {
        let (mut session, a, b, c) = controlled();
        let seeker = endpoint(&session, a, Slot::Controller);
        let old = endpoint(&session, b, Slot::ControllerTarget);
        let new = endpoint(&session, c, Slot::ControllerTarget);

        assert!(session.begin_connect(seeker));
        assert!(session.release_connect(Some(new)).unwrap());
        let report = session.end_frame();
        assert_eq!(report, FlushReport { executed: 1, recorded: 1 });
        assert!(session.registry().is_connected(seeker, new));
        assert!(!session.registry().is_connected(seeker, old));
        assert_eq!(session.commands().undo_description(), Some("Reconnect"));

        session.undo().unwrap();
        assert!(session.registry().is_connected(seeker, old));
        assert!(!session.registry().is_connected(seeker, new));

        session.redo().unwrap();
        assert!(session.registry().is_connected(seeker, new));
    }

    #[test]
    fn test_drop_back_on_partner_records_nothing() {
        let (mut session, a, b, _) = controlled();
        let seeker = endpoint(&session, a, Slot::Controller);
        let old = endpoint(&session, b, Slot::ControllerTarget);
        let before = session.stats();

        session.begin_connect(seeker);
        assert!(!session.release_connect(Some(old)).unwrap());
        assert_eq!(session.end_frame(), FlushReport::default());
        assert_eq!(session.stats(), before);
        assert!(session.registry().is_connected(seeker, old));
    }

    #[test]
    fn test_cancelled_drag_changes_nothing() {
        let (mut session, a, _, _) = controlled();
        let before = snapshot(&session);

        session.begin_connect(endpoint(&session, a, Slot::Controller));
        assert!(session.connecting_from().is_some());
        session.cancel_connect();
        assert!(session.connecting_from().is_none());
        session.end_frame();
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_undo_all_then_redo_all() {
        let mut session = EditorSession::new(&SessionConfig::default());
        let mut states = vec![snapshot(&session)];

        session.add_node(EditorNode::new(NodeKind::Node, "root"));
        session.end_frame();
        states.push(snapshot(&session));

        session.add_node(EditorNode::new(NodeKind::Geometry, "mesh"));
        session.end_frame();
        states.push(snapshot(&session));

        let (root, mesh) = (NodeId(0), NodeId(1));
        session
            .connect(endpoint(&session, root, Slot::Children), endpoint(&session, mesh, Slot::Parent))
            .unwrap();
        session.end_frame();
        states.push(snapshot(&session));

        session.set_property(mesh, "Name", "blade".into()).unwrap();
        session.end_frame();
        states.push(snapshot(&session));

        session.remove_node(root).unwrap();
        session.end_frame();
        states.push(snapshot(&session));

        let steps = states.len() - 1;
        for expected in states.iter().rev().skip(1) {
            session.undo().unwrap();
            assert_eq!(&snapshot(&session), expected);
        }
        assert_eq!(session.undo(), Err(HistoryError::NothingToUndo));

        for expected in states.iter().skip(1) {
            session.redo().unwrap();
            assert_eq!(&snapshot(&session), expected);
        }
        assert_eq!(session.redo(), Err(HistoryError::NothingToRedo));
        assert_eq!(session.stats().undo_count, steps);
    }

    #[test]
    fn test_undo_remove_restores_every_order() {
        let (mut session, _) = EditorSession::from_import(&sample(), &SessionConfig::default());
        let before = snapshot(&session);
        let ids: Vec<NodeId> = session.registry().graph().node_ids().collect();

        for id in ids {
            session.remove_node(id).unwrap();
            session.end_frame();
            session.undo().unwrap();
            assert_eq!(snapshot(&session), before, "after removing {id}");
        }
    }

    #[test]
    fn test_undo_reconnect_restores_order() {
        let mut registry = ConnectionRegistry::new();
        let shader = registry.add_node(EditorNode::new(NodeKind::Shader, "lit"));
        let other = registry.add_node(EditorNode::new(NodeKind::Shader, "flat"));
        let mut meshes = Vec::new();
        for name in ["a", "b", "c"] {
            meshes.push(registry.add_node(EditorNode::new(NodeKind::Geometry, name)));
        }
        let mut session = EditorSession::from_registry(registry, &SessionConfig::default());
        let users = endpoint(&session, shader, Slot::ShaderUsers);
        for mesh in &meshes {
            session.connect(users, endpoint(&session, *mesh, Slot::Shader)).unwrap();
        }
        session.end_frame();
        let before = snapshot(&session);

        // Move the middle mesh to the other shader and back out again
        session
            .connect(endpoint(&session, meshes[1], Slot::Shader), endpoint(&session, other, Slot::ShaderUsers))
            .unwrap();
        session.end_frame();
        session.undo().unwrap();
        assert_eq!(snapshot(&session), before);

        session.disconnect_endpoint(users).unwrap();
        session.end_frame();
        session.undo().unwrap();
        assert_eq!(snapshot(&session), before);
    }

    #[test]
    fn test_connect_to_node_removed_earlier_in_frame() {
        let (mut session, a, b, c) = controlled();
        let from = endpoint(&session, a, Slot::Controller);
        let old = endpoint(&session, b, Slot::ControllerTarget);
        let gone = endpoint(&session, c, Slot::ControllerTarget);

        session.remove_node(c).unwrap();
        session.connect(from, gone).unwrap();
        let report = session.end_frame();
        assert_eq!(report, FlushReport { executed: 2, recorded: 1 });
        assert!(!session.registry().graph().contains(c));
        // The displaced partner stays
        assert!(session.registry().is_connected(from, old));
    }

    #[test]
    fn test_connect_after_partner_removed_earlier_in_frame() {
        let (mut session, a, b, c) = controlled();
        let from = endpoint(&session, a, Slot::Controller);
        let to = endpoint(&session, c, Slot::ControllerTarget);

        session.remove_node(b).unwrap();
        session.connect(from, to).unwrap();
        let report = session.end_frame();
        assert_eq!(report, FlushReport { executed: 2, recorded: 2 });
        assert!(session.registry().is_connected(from, to));
        assert_eq!(session.registry().connection_count(), 1);

        session.undo().unwrap();
        session.undo().unwrap();
        assert!(session.registry().graph().contains(b));
        assert!(session.registry().is_connected(from, endpoint(&session, b, Slot::ControllerTarget)));
    }

    #[test]
    fn test_edits_wait_for_end_frame() {
        let mut session = EditorSession::new(&SessionConfig::default());
        session.add_node(EditorNode::new(NodeKind::Shader, "lit"));
        assert!(session.registry().graph().is_empty());
        assert_eq!(session.stats().pending, 1);

        session.end_frame();
        assert_eq!(session.registry().graph().node_count(), 1);
    }

    #[test]
    fn test_validation_happens_at_queue_time() {
        let (mut session, a, b, _) = controlled();
        assert!(matches!(session.remove_node(NodeId(77)), Err(CommandError::NodeNotFound(_))));
        assert!(matches!(
            session.connect(endpoint(&session, a, Slot::Properties), endpoint(&session, b, Slot::ControllerTarget)),
            Err(CommandError::Incompatible(..))
        ));
        assert!(matches!(
            session.disconnect_endpoint(EndpointId::new(NodeId(77), 1)),
            Err(CommandError::EndpointNotFound(_))
        ));
        assert_eq!(session.stats().pending, 0);
    }

    #[test]
    fn test_disconnect_endpoint_round_trip() {
        let (mut session, a, b, _) = controlled();
        let controller = endpoint(&session, a, Slot::Controller);
        session.disconnect_endpoint(controller).unwrap();
        session.end_frame();
        assert_eq!(session.registry().connection_count(), 0);

        session.undo().unwrap();
        assert!(session.registry().is_connected(controller, endpoint(&session, b, Slot::ControllerTarget)));
    }

    #[test]
    fn test_history_depth_from_config() {
        let config = SessionConfig { max_history: 2 };
        let mut session = EditorSession::new(&config);
        for name in ["a", "b", "c"] {
            session.add_node(EditorNode::new(NodeKind::Node, name));
            session.end_frame();
        }
        assert_eq!(session.stats().undo_count, 2);
        assert_eq!(session.stats().max_depth, 2);
    }

    #[test]
    fn test_from_import() {
        let (session, diagnostics) = EditorSession::from_import(&sample(), &SessionConfig::default());
        assert!(diagnostics.is_empty());
        assert!(session
            .registry()
            .graph()
            .nodes()
            .any(|(_, node)| node.object() == Some(MESH)));

        let mut broken = sample();
        broken.root = Some(ObjectId(404));
        let (session, diagnostics) = EditorSession::from_import(&broken, &SessionConfig::default());
        assert!(session.registry().graph().is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_config_defaults_from_ron() {
        let config: SessionConfig = ron::from_str("()").unwrap();
        assert_eq!(config, SessionConfig::default());
        let config: SessionConfig = ron::from_str("(max_history: 7)").unwrap();
        assert_eq!(config.max_history, 7);
    }
}
