// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene object model.
//!
//! This is the externally owned typed object graph the editor mirrors. Each
//! record is one [`SceneObject`] keyed by a stable [`ObjectId`]; references
//! between records are stored as ids in the order the format defines them.
//!
//! Documents are exchanged as RON. The binary scene encoding is handled
//! elsewhere.

use crate::endpoint::Slot;
use crate::value::PropertyValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Stable identity of a record in a scene document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Particle modifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModifierKind {
    /// Spawns new particles
    Spawn,
    /// Emits particles from a scene object
    Emitter,
    /// Applies gravity
    Gravity,
    /// Ages and kills particles
    Age,
    /// Animates particle color
    Color,
    /// Rotates particles
    Rotation,
}

/// Render property type. An owner holds at most one property of each type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyKind {
    /// Surface material
    Material,
    /// Texture stages
    Texturing,
    /// Blending and alpha test
    Alpha,
    /// Specular highlights
    Specular,
    /// Stencil and face culling
    Stencil,
}

/// Reference layout of each recognised record kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectBody {
    /// Scene transform node
    Node {
        /// Child nodes, geometry and particle systems
        #[serde(default)]
        children: Vec<ObjectId>,
        /// Render properties
        #[serde(default)]
        properties: Vec<ObjectId>,
        /// Extra data blocks
        #[serde(default)]
        extra_data: Vec<ObjectId>,
        /// First controller
        #[serde(default)]
        controller: Option<ObjectId>,
    },
    /// Renderable geometry
    Geometry {
        /// Render properties
        #[serde(default)]
        properties: Vec<ObjectId>,
        /// Extra data blocks
        #[serde(default)]
        extra_data: Vec<ObjectId>,
        /// First controller
        #[serde(default)]
        controller: Option<ObjectId>,
        /// Shader
        #[serde(default)]
        shader: Option<ObjectId>,
    },
    /// Particle system
    ParticleSystem {
        /// Particle data block (required)
        #[serde(default)]
        data: Option<ObjectId>,
        /// Modifier chain
        #[serde(default)]
        modifiers: Vec<ObjectId>,
        /// Render properties
        #[serde(default)]
        properties: Vec<ObjectId>,
        /// Extra data blocks
        #[serde(default)]
        extra_data: Vec<ObjectId>,
        /// First controller
        #[serde(default)]
        controller: Option<ObjectId>,
    },
    /// Particle data block
    ParticleData,
    /// Particle modifier
    Modifier {
        /// Modifier type
        kind: ModifierKind,
        /// Position in the owning system's chain
        #[serde(default)]
        order: u32,
        /// Scene object emitted from (emitter modifiers only)
        #[serde(default)]
        emitter_object: Option<ObjectId>,
    },
    /// Animation controller
    Controller {
        /// Next controller in the chain
        #[serde(default)]
        next: Option<ObjectId>,
    },
    /// Render property
    Property {
        /// Property type
        kind: PropertyKind,
    },
    /// Shader
    Shader,
    /// Extra data block
    ExtraData,
}

impl ObjectBody {
    /// Format name of the record kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Node { .. } => "Node",
            Self::Geometry { .. } => "Geometry",
            Self::ParticleSystem { .. } => "ParticleSystem",
            Self::ParticleData => "ParticleData",
            Self::Modifier { .. } => "Modifier",
            Self::Controller { .. } => "Controller",
            Self::Property { .. } => "Property",
            Self::Shader => "Shader",
            Self::ExtraData => "ExtraData",
        }
    }

    /// Whether the format lets more than one owner reference this record
    pub fn is_shareable(&self) -> bool {
        match self {
            Self::Property { .. } | Self::Shader | Self::ExtraData => true,
            Self::Node { .. }
            | Self::Geometry { .. }
            | Self::ParticleSystem { .. }
            | Self::ParticleData
            | Self::Modifier { .. }
            | Self::Controller { .. } => false,
        }
    }

    /// Add or remove the reference stored under `slot`.
    ///
    /// A new list entry goes to `at` (clamped), or to the end.
    pub fn edit_reference(
        &mut self,
        slot: Slot,
        target: ObjectId,
        present: bool,
        at: Option<usize>,
    ) -> ReferenceEdit {
        match (self, slot) {
            (Self::Node { children, .. }, Slot::Children) => update_list(children, target, present, at),
            (
                Self::Node { properties, .. }
                | Self::Geometry { properties, .. }
                | Self::ParticleSystem { properties, .. },
                Slot::Properties,
            ) => update_list(properties, target, present, at),
            (
                Self::Node { extra_data, .. }
                | Self::Geometry { extra_data, .. }
                | Self::ParticleSystem { extra_data, .. },
                Slot::ExtraData,
            ) => update_list(extra_data, target, present, at),
            (
                Self::Node { controller, .. }
                | Self::Geometry { controller, .. }
                | Self::ParticleSystem { controller, .. },
                Slot::Controller,
            ) => update_single(controller, target, present),
            (Self::Geometry { shader, .. }, Slot::Shader) => update_single(shader, target, present),
            (Self::ParticleSystem { data, .. }, Slot::Data) => update_single(data, target, present),
            (Self::ParticleSystem { modifiers, .. }, Slot::Modifiers) => {
                update_list(modifiers, target, present, at)
            }
            (Self::Modifier { emitter_object, .. }, Slot::EmitterObject) => {
                update_single(emitter_object, target, present)
            }
            (Self::Controller { next }, Slot::NextController) => update_single(next, target, present),
            _ => ReferenceEdit::Unchanged,
        }
    }
}

/// What a reference edit did to the owning record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceEdit {
    /// Nothing changed
    Unchanged,
    /// Reference stored at this position
    Inserted(usize),
    /// Reference dropped from this position
    Removed(usize),
}

impl ReferenceEdit {
    /// Whether the record changed
    pub fn changed(self) -> bool {
        self != Self::Unchanged
    }
}

fn update_list(list: &mut Vec<ObjectId>, target: ObjectId, present: bool, at: Option<usize>) -> ReferenceEdit {
    let position = list.iter().position(|id| *id == target);
    match (position, present) {
        (None, true) => {
            let index = at.map_or(list.len(), |at| at.min(list.len()));
            list.insert(index, target);
            ReferenceEdit::Inserted(index)
        }
        (Some(index), false) => {
            list.remove(index);
            ReferenceEdit::Removed(index)
        }
        _ => ReferenceEdit::Unchanged,
    }
}

fn update_single(reference: &mut Option<ObjectId>, target: ObjectId, present: bool) -> ReferenceEdit {
    if present {
        if *reference == Some(target) {
            return ReferenceEdit::Unchanged;
        }
        *reference = Some(target);
        ReferenceEdit::Inserted(0)
    } else if *reference == Some(target) {
        *reference = None;
        ReferenceEdit::Removed(0)
    } else {
        ReferenceEdit::Unchanged
    }
}

/// One record of the scene object model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Record name
    pub name: String,
    /// Primitive attributes in format order
    #[serde(default)]
    pub attributes: IndexMap<String, PropertyValue>,
    /// Kind-specific references
    pub body: ObjectBody,
}

impl SceneObject {
    /// Create a record without attributes
    pub fn new(name: impl Into<String>, body: ObjectBody) -> Self {
        Self {
            name: name.into(),
            attributes: IndexMap::new(),
            body,
        }
    }

    /// Add an attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Errors reading or writing scene documents
#[derive(Debug, Error)]
pub enum SceneError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text is not a valid scene description
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Document could not be encoded
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// A complete scene object graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Top-level record
    #[serde(default)]
    pub root: Option<ObjectId>,
    /// All records by id
    #[serde(default)]
    pub objects: IndexMap<ObjectId, SceneObject>,
}

impl SceneDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any record with the same id
    pub fn insert(&mut self, id: ObjectId, object: SceneObject) {
        self.objects.insert(id, object);
    }

    /// Record by id
    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    /// Mutable record by id
    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the document has no records
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Write a primitive value. `Name` updates the record name.
    pub fn set_attribute(&mut self, id: ObjectId, name: &str, value: &PropertyValue) -> bool {
        let Some(object) = self.objects.get_mut(&id) else {
            return false;
        };

        if name == crate::node::NAME_FIELD {
            return match value.as_str() {
                Some(text) => {
                    object.name = text.to_string();
                    true
                }
                None => false,
            };
        }

        object.attributes.insert(name.to_string(), value.clone());
        true
    }

    /// Add or remove a reference held by `owner`
    pub fn set_reference(&mut self, owner: ObjectId, slot: Slot, target: ObjectId, present: bool) -> bool {
        self.edit_reference(owner, slot, target, present, None).changed()
    }

    /// Add or remove a reference held by `owner`, inserting at `at` when given
    pub fn edit_reference(
        &mut self,
        owner: ObjectId,
        slot: Slot,
        target: ObjectId,
        present: bool,
        at: Option<usize>,
    ) -> ReferenceEdit {
        self.objects
            .get_mut(&owner)
            .map_or(ReferenceEdit::Unchanged, |object| object.body.edit_reference(slot, target, present, at))
    }

    /// Parse a RON scene description
    pub fn from_ron(text: &str) -> Result<Self, SceneError> {
        Ok(ron::from_str(text)?)
    }

    /// Encode as pretty-printed RON
    pub fn to_ron(&self) -> Result<String, SceneError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Load a RON scene description from disk
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Save as RON
    pub fn save(&self, path: &Path) -> Result<(), SceneError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }
}
