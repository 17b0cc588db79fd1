// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor node definitions.

use crate::cell::ObservableCell;
use crate::endpoint::{Endpoint, Slot};
use crate::scene::{ModifierKind, ObjectId, PropertyKind};
use crate::value::PropertyValue;
use std::fmt;

/// Name of the text field every node carries first
pub const NAME_FIELD: &str = "Name";

/// Node width in graph units
pub const NODE_WIDTH: f32 = 180.0;
/// Height of the title bar
pub const NODE_HEADER_HEIGHT: f32 = 28.0;
/// Height of one field row
pub const FIELD_HEIGHT: f32 = 22.0;

/// Arena handle of an editor node. Ids are never reused within a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an editor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Scene transform node
    Node,
    /// Renderable geometry
    Geometry,
    /// Particle system
    ParticleSystem,
    /// Particle data block
    ParticleData,
    /// Particle modifier
    Modifier(ModifierKind),
    /// Animation controller
    Controller,
    /// Render property
    Property(PropertyKind),
    /// Shader
    Shader,
    /// Extra data block
    ExtraData,
}

impl NodeKind {
    /// Endpoint slots of this kind, in field order
    pub fn slots(self) -> &'static [Slot] {
        match self {
            Self::Node => &[
                Slot::Parent,
                Slot::Children,
                Slot::Properties,
                Slot::ExtraData,
                Slot::Controller,
                Slot::EmitterUsers,
            ],
            Self::Geometry => &[
                Slot::Parent,
                Slot::Properties,
                Slot::ExtraData,
                Slot::Controller,
                Slot::Shader,
                Slot::EmitterUsers,
            ],
            Self::ParticleSystem => &[
                Slot::Parent,
                Slot::Properties,
                Slot::ExtraData,
                Slot::Controller,
                Slot::Data,
                Slot::Modifiers,
            ],
            Self::ParticleData => &[Slot::DataOwner],
            Self::Modifier(ModifierKind::Emitter) => &[Slot::ModifierSystem, Slot::EmitterObject],
            Self::Modifier(_) => &[Slot::ModifierSystem],
            Self::Controller => &[
                Slot::ControllerTarget,
                Slot::PreviousController,
                Slot::NextController,
            ],
            Self::Property(_) => &[Slot::PropertyUsers],
            Self::Shader => &[Slot::ShaderUsers],
            Self::ExtraData => &[Slot::ExtraDataUsers],
        }
    }

    /// Display label
    pub fn label(self) -> String {
        match self {
            Self::Node => "Node".to_string(),
            Self::Geometry => "Geometry".to_string(),
            Self::ParticleSystem => "Particle System".to_string(),
            Self::ParticleData => "Particle Data".to_string(),
            Self::Modifier(kind) => format!("{kind:?} Modifier"),
            Self::Controller => "Controller".to_string(),
            Self::Property(kind) => format!("{kind:?} Property"),
            Self::Shader => "Shader".to_string(),
            Self::ExtraData => "Extra Data".to_string(),
        }
    }
}

/// A named slot on a node, holding a value, an endpoint, or neither
#[derive(Debug)]
pub struct Field {
    name: String,
    value: Option<ObservableCell<PropertyValue>>,
    endpoint: Option<Endpoint>,
}

impl Field {
    /// Create a value field
    pub fn value(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value: Some(ObservableCell::new(value)),
            endpoint: None,
        }
    }

    /// Create an endpoint field named after its slot
    pub fn endpoint(slot: Slot) -> Self {
        Self {
            name: slot.name().to_string(),
            value: None,
            endpoint: Some(Endpoint::new(slot)),
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value, for value fields
    pub fn current(&self) -> Option<&PropertyValue> {
        self.value.as_ref().map(ObservableCell::get)
    }

    /// Observable cell of a value field
    pub fn cell(&self) -> Option<&ObservableCell<PropertyValue>> {
        self.value.as_ref()
    }

    pub(crate) fn cell_mut(&mut self) -> Option<&mut ObservableCell<PropertyValue>> {
        self.value.as_mut()
    }

    /// Endpoint of an endpoint field
    pub fn get_endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub(crate) fn endpoint_mut(&mut self) -> Option<&mut Endpoint> {
        self.endpoint.as_mut()
    }
}

/// One interactive unit of the node graph.
///
/// The node exclusively owns its fields and their endpoints. Links to other
/// nodes are stored as [`EndpointId`](crate::endpoint::EndpointId) handles.
#[derive(Debug)]
pub struct EditorNode {
    kind: NodeKind,
    object: Option<ObjectId>,
    fields: Vec<Field>,
    position: [f32; 2],
    collapsed: bool,
}

impl EditorNode {
    /// Create a node with a `Name` field followed by one field per slot of `kind`
    pub fn new(kind: NodeKind, name: impl Into<String>) -> Self {
        let mut fields = Vec::with_capacity(kind.slots().len() + 1);
        fields.push(Field::value(NAME_FIELD, PropertyValue::String(name.into())));
        fields.extend(kind.slots().iter().copied().map(Field::endpoint));

        Self {
            kind,
            object: None,
            fields,
            position: [0.0, 0.0],
            collapsed: false,
        }
    }

    /// Record the scene object this node stands for
    pub fn with_object(mut self, object: ObjectId) -> Self {
        self.object = Some(object);
        self
    }

    /// Set the position
    pub fn with_position(mut self, x: f32, y: f32) -> Self {
        self.position = [x, y];
        self
    }

    /// Append a value field
    pub fn with_attribute(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.fields.push(Field::value(name, value));
        self
    }

    /// Node kind
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Backing scene object, if any
    pub fn object(&self) -> Option<ObjectId> {
        self.object
    }

    /// Current name
    pub fn name(&self) -> &str {
        self.fields
            .first()
            .and_then(Field::current)
            .and_then(PropertyValue::as_str)
            .unwrap_or_default()
    }

    /// All fields in order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Field by index
    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub(crate) fn field_mut(&mut self, index: usize) -> Option<&mut Field> {
        self.fields.get_mut(index)
    }

    /// Index of the field called `name`
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Index of the endpoint field for `slot`
    pub fn slot_index(&self, slot: Slot) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.endpoint.as_ref().is_some_and(|e| e.slot() == slot))
    }

    /// Endpoint of the field at `index`
    pub fn endpoint(&self, index: usize) -> Option<&Endpoint> {
        self.fields.get(index).and_then(Field::get_endpoint)
    }

    pub(crate) fn endpoint_mut(&mut self, index: usize) -> Option<&mut Endpoint> {
        self.fields.get_mut(index).and_then(Field::endpoint_mut)
    }

    /// Endpoint fields with their indices
    pub fn endpoints(&self) -> impl Iterator<Item = (usize, &Endpoint)> + '_ {
        self.fields
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.get_endpoint().map(|e| (i, e)))
    }

    /// Top-left corner in graph units
    pub fn position(&self) -> [f32; 2] {
        self.position
    }

    /// Move the node
    pub fn set_position(&mut self, position: [f32; 2]) {
        self.position = position;
    }

    /// Whether only the title bar is shown
    pub fn collapsed(&self) -> bool {
        self.collapsed
    }

    /// Collapse or expand the node
    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.collapsed = collapsed;
    }

    /// Width and height in graph units
    pub fn size(&self) -> [f32; 2] {
        let rows = if self.collapsed { 0 } else { self.fields.len() };
        [NODE_WIDTH, NODE_HEADER_HEIGHT + rows as f32 * FIELD_HEIGHT]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_node_layout() {
        let node = EditorNode::new(NodeKind::Node, "Scene Root");
        assert_eq!(node.name(), "Scene Root");
        assert_eq!(node.field_index(NAME_FIELD), Some(0));
        assert_eq!(node.fields().len(), NodeKind::Node.slots().len() + 1);
        assert_eq!(node.slot_index(Slot::Children), node.field_index("Children"));
        assert!(node.slot_index(Slot::Shader).is_none());
    }

    #[test]
    fn test_attributes_follow_slots() {
        let node = EditorNode::new(NodeKind::ExtraData, "Tag")
            .with_attribute("Value", PropertyValue::from("hidden"));
        assert_eq!(node.fields().len(), 3);
        let value = node.field_index("Value").and_then(|i| node.field(i));
        assert_eq!(value.and_then(Field::current), Some(&PropertyValue::from("hidden")));
    }

    #[test]
    fn test_emitter_modifier_has_emitter_object() {
        let emitter = EditorNode::new(NodeKind::Modifier(ModifierKind::Emitter), "Box");
        let gravity = EditorNode::new(NodeKind::Modifier(ModifierKind::Gravity), "Fall");
        assert!(emitter.slot_index(Slot::EmitterObject).is_some());
        assert!(gravity.slot_index(Slot::EmitterObject).is_none());
    }

    #[test]
    fn test_size_tracks_collapse() {
        let mut node = EditorNode::new(NodeKind::Shader, "Lit");
        assert_eq!(node.size(), [NODE_WIDTH, NODE_HEADER_HEIGHT + 2.0 * FIELD_HEIGHT]);
        node.set_collapsed(true);
        assert_eq!(node.size(), [NODE_WIDTH, NODE_HEADER_HEIGHT]);
    }
}
