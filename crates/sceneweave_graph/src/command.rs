// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph mutations as reversible commands.
//!
//! Constructors validate everything that can fail. Commands queued within
//! one frame may find the graph already changed by an earlier one, so
//! `apply` skips whatever no longer exists. `reverse` only asserts on
//! programming errors and puts links back in their original order.

use crate::endpoint::EndpointId;
use crate::node::{EditorNode, Field, NodeId};
use crate::registry::{ConnectionRegistry, LinkOrder};
use crate::state::{EndpointPair, StateMap};
use crate::value::{PropertyValue, ValueKind};

/// A graph mutation that can be applied and reversed
pub trait GraphCommand {
    /// Get a description of this command
    fn description(&self) -> &str;

    /// Execute the command
    fn apply(&mut self, registry: &mut ConnectionRegistry);

    /// Undo a previous `apply`
    fn reverse(&mut self, registry: &mut ConnectionRegistry);

    /// Whether the last `apply` changed anything worth undoing
    fn is_reversible(&self) -> bool;
}

/// Error type for command construction
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Field not found
    #[error("Node {node} has no field named {field:?}")]
    FieldNotFound {
        /// Node searched
        node: NodeId,
        /// Requested field
        field: String,
    },

    /// Field does not hold a value
    #[error("Field {field:?} on node {node} holds no value")]
    NotAValue {
        /// Owning node
        node: NodeId,
        /// Field name
        field: String,
    },

    /// Value kind does not match the field
    #[error("Expected a {expected:?} value, got {found:?}")]
    ValueKindMismatch {
        /// Kind stored in the field
        expected: ValueKind,
        /// Kind supplied
        found: ValueKind,
    },

    /// Endpoint not found
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(EndpointId),

    /// Endpoints cannot be linked
    #[error("Endpoints {0} and {1} cannot be connected")]
    Incompatible(EndpointId, EndpointId),
}

/// Insert a new node
#[derive(Debug)]
pub struct AddNodeCommand {
    description: String,
    node: Option<EditorNode>,
    placed: Option<(usize, NodeId)>,
}

impl AddNodeCommand {
    /// Create a command inserting `node`
    pub fn new(node: EditorNode) -> Self {
        Self {
            description: format!("Add {}", node.kind().label()),
            node: Some(node),
            placed: None,
        }
    }

    /// Handle of the inserted node, once applied
    pub fn node_id(&self) -> Option<NodeId> {
        self.placed.map(|(_, id)| id)
    }
}

impl GraphCommand for AddNodeCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&mut self, registry: &mut ConnectionRegistry) {
        let Some(node) = self.node.take() else {
            debug_assert!(false, "add node applied twice");
            return;
        };

        match self.placed {
            Some((index, id)) => registry.restore_node(index, id, node),
            None => {
                let id = registry.add_node(node);
                self.placed = Some((registry.graph().node_count() - 1, id));
            }
        }
    }

    fn reverse(&mut self, registry: &mut ConnectionRegistry) {
        let Some((_, id)) = self.placed else {
            debug_assert!(false, "add node reversed before apply");
            return;
        };

        let severed = registry.disconnect_node(id);
        debug_assert!(severed.is_empty(), "added node {id} gained links outside the history");
        if let Some((index, node)) = registry.take_node(id) {
            self.placed = Some((index, id));
            self.node = Some(node);
        }
    }

    fn is_reversible(&self) -> bool {
        self.placed.is_some()
    }
}

/// Remove a node after severing all of its links
#[derive(Debug)]
pub struct RemoveNodeCommand {
    id: NodeId,
    description: String,
    removed: Option<(usize, EditorNode)>,
    severed: StateMap,
    order: LinkOrder,
}

impl RemoveNodeCommand {
    /// Create a command removing `id`
    pub fn new(registry: &ConnectionRegistry, id: NodeId) -> Result<Self, CommandError> {
        let node = registry.graph().node(id).ok_or(CommandError::NodeNotFound(id))?;
        Ok(Self {
            id,
            description: format!("Remove {} \"{}\"", node.kind().label(), node.name()),
            removed: None,
            severed: StateMap::new(),
            order: LinkOrder::default(),
        })
    }

    /// Links severed by the last `apply`
    pub fn severed(&self) -> &StateMap {
        &self.severed
    }
}

impl GraphCommand for RemoveNodeCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&mut self, registry: &mut ConnectionRegistry) {
        if !registry.graph().contains(self.id) {
            tracing::debug!("Node {} already gone; nothing to remove", self.id);
            return;
        }
        let (severed, order) = registry.recording_order(|r| r.disconnect_node(self.id));
        self.severed = severed;
        self.order = order;
        self.removed = registry.take_node(self.id);
    }

    fn reverse(&mut self, registry: &mut ConnectionRegistry) {
        let Some((index, node)) = self.removed.take() else {
            debug_assert!(false, "remove node reversed before apply");
            return;
        };
        registry.restore_node(index, self.id, node);
        registry.apply_state_map(&self.severed.inverted());
        registry.restore_order(&self.order);
    }

    fn is_reversible(&self) -> bool {
        self.removed.is_some()
    }
}

/// Apply a connection diff
#[derive(Debug)]
pub struct SetConnectionsCommand {
    description: String,
    map: StateMap,
    applied: Option<StateMap>,
    order: LinkOrder,
}

impl SetConnectionsCommand {
    /// Validate `map` against the registry and wrap it in a command
    pub fn new(registry: &ConnectionRegistry, map: StateMap) -> Result<Self, CommandError> {
        for (pair, connect) in map.iter() {
            for end in [pair.first(), pair.second()] {
                if registry.graph().endpoint(end).is_none() {
                    return Err(CommandError::EndpointNotFound(end));
                }
            }
            if connect && !registry.can_connect(pair.first(), pair.second()) {
                return Err(CommandError::Incompatible(pair.first(), pair.second()));
            }
        }

        let description = match (map.connections().count(), map.disconnections().count()) {
            (0, _) => "Disconnect".to_string(),
            (_, 0) => "Connect".to_string(),
            _ => "Reconnect".to_string(),
        };
        Ok(Self {
            description,
            map,
            applied: None,
            order: LinkOrder::default(),
        })
    }

    /// The requested diff
    pub fn map(&self) -> &StateMap {
        &self.map
    }
}

impl GraphCommand for SetConnectionsCommand {
    fn description(&self) -> &str {
        &self.description
    }

    /// The graph may have moved on since the command was queued. Disconnects
    /// of endpoints that no longer exist are already done and get dropped; a
    /// connect that can no longer be made voids the whole command, so a
    /// displaced partner is never detached without its replacement.
    fn apply(&mut self, registry: &mut ConnectionRegistry) {
        let alive = |pair: &EndpointPair| {
            let graph = registry.graph();
            graph.endpoint(pair.first()).is_some() && graph.endpoint(pair.second()).is_some()
        };
        if let Some(pair) = self
            .map
            .connections()
            .find(|pair| !alive(pair) || !registry.can_connect(pair.first(), pair.second()))
        {
            tracing::debug!("{} no longer applies; {pair} cannot be linked", self.description);
            self.applied = Some(StateMap::new());
            self.order = LinkOrder::default();
            return;
        }
        let live: StateMap = self.map.iter().filter(|(pair, _)| alive(pair)).collect();

        let (applied, order) = registry.recording_order(|r| r.apply_state_map(&live));
        self.applied = Some(applied);
        self.order = order;
    }

    fn reverse(&mut self, registry: &mut ConnectionRegistry) {
        let Some(applied) = self.applied.take() else {
            debug_assert!(false, "connection change reversed before apply");
            return;
        };
        registry.apply_state_map(&applied.inverted());
        registry.restore_order(&self.order);
    }

    fn is_reversible(&self) -> bool {
        self.applied.as_ref().is_some_and(|applied| !applied.is_empty())
    }
}

/// Assign a value field
#[derive(Debug)]
pub struct SetPropertyCommand {
    node: NodeId,
    field: usize,
    description: String,
    value: PropertyValue,
    previous: Option<PropertyValue>,
    changed: bool,
}

impl SetPropertyCommand {
    /// Create a command writing `value` into the field called `field` of `node`
    pub fn new(
        registry: &ConnectionRegistry,
        node: NodeId,
        field: &str,
        value: PropertyValue,
    ) -> Result<Self, CommandError> {
        let owner = registry.graph().node(node).ok_or(CommandError::NodeNotFound(node))?;
        let index = owner.field_index(field).ok_or_else(|| CommandError::FieldNotFound {
            node,
            field: field.to_string(),
        })?;
        let current = owner
            .field(index)
            .and_then(Field::current)
            .ok_or_else(|| CommandError::NotAValue {
                node,
                field: field.to_string(),
            })?;
        if current.kind() != value.kind() {
            return Err(CommandError::ValueKindMismatch {
                expected: current.kind(),
                found: value.kind(),
            });
        }

        Ok(Self {
            node,
            field: index,
            description: format!("Set {field}"),
            value,
            previous: None,
            changed: false,
        })
    }

    fn write(
        registry: &mut ConnectionRegistry,
        node: NodeId,
        field: usize,
        value: PropertyValue,
    ) -> Option<(PropertyValue, bool)> {
        let cell = registry.node_mut(node)?.field_mut(field)?.cell_mut()?;
        let previous = cell.get().clone();
        let changed = cell.set(value);
        Some((previous, changed))
    }
}

impl GraphCommand for SetPropertyCommand {
    fn description(&self) -> &str {
        &self.description
    }

    fn apply(&mut self, registry: &mut ConnectionRegistry) {
        match Self::write(registry, self.node, self.field, self.value.clone()) {
            Some((previous, changed)) => {
                self.previous = Some(previous);
                self.changed = changed;
            }
            None => {
                tracing::debug!("Field {} of node {} vanished before apply", self.field, self.node);
                self.previous = None;
                self.changed = false;
            }
        }
    }

    fn reverse(&mut self, registry: &mut ConnectionRegistry) {
        let Some(previous) = self.previous.clone() else {
            debug_assert!(false, "property change reversed before apply");
            return;
        };
        Self::write(registry, self.node, self.field, previous);
    }

    fn is_reversible(&self) -> bool {
        self.changed
    }
}
