// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scene document to editor graph.
//!
//! One depth-first pass materialises an editor node per reachable object and
//! records every reference as a deferred connection request. A second pass
//! resolves the requests once all nodes exist, so forward references (an
//! emitter pointing at geometry visited later) link like any other.
//!
//! Only a missing or unsupported root aborts the import. Everything else is a
//! recoverable anomaly reported through [`Diagnostics`].

use crate::diagnostics::Diagnostics;
use crate::endpoint::Slot;
use crate::node::{EditorNode, NodeId, NodeKind};
use crate::registry::ConnectionRegistry;
use crate::scene::{ObjectBody, ObjectId, PropertyKind, SceneDocument, SceneObject};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

/// Horizontal distance between layout columns
const COLUMN_SPACING: f32 = 240.0;
/// Vertical gap between stacked nodes
const ROW_GAP: f32 = 24.0;

/// Fatal import errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// The document declares no root
    #[error("Scene has no root object")]
    MissingRoot,

    /// The declared root is not in the document
    #[error("Root object {0} is missing from the scene")]
    MissingRootObject(ObjectId),

    /// The root is not a scene node
    #[error("Root object has unsupported kind {kind}")]
    UnsupportedRoot {
        /// Kind of the root record
        kind: &'static str,
    },
}

/// Graph built from a document, plus what went wrong along the way
#[derive(Debug, Default)]
pub struct ImportResult {
    /// Nodes and links
    pub registry: ConnectionRegistry,
    /// Recoverable anomalies, in discovery order
    pub diagnostics: Diagnostics,
}

/// Build the editor graph for `doc`
pub fn import(doc: &SceneDocument) -> Result<ImportResult, ImportError> {
    let root = doc.root.ok_or(ImportError::MissingRoot)?;
    let object = doc.get(root).ok_or(ImportError::MissingRootObject(root))?;
    if !matches!(object.body, ObjectBody::Node { .. }) {
        return Err(ImportError::UnsupportedRoot {
            kind: object.body.kind_name(),
        });
    }

    let mut importer = Importer::new(doc);
    importer.visit(root, 0);
    importer.resolve();

    tracing::info!(
        "Imported {} node(s), {} connection(s), {} diagnostic(s)",
        importer.registry.graph().node_count(),
        importer.registry.connection_count(),
        importer.diagnostics.len()
    );
    Ok(ImportResult {
        registry: importer.registry,
        diagnostics: importer.diagnostics,
    })
}

/// Import `doc`, falling back to an empty graph on a fatal error.
///
/// The fatal error becomes the only diagnostic.
pub fn import_or_empty(doc: &SceneDocument) -> ImportResult {
    match import(doc) {
        Ok(result) => result,
        Err(err) => {
            tracing::error!("Import failed: {err}");
            let mut diagnostics = Diagnostics::new();
            diagnostics.push(err.to_string());
            ImportResult {
                registry: ConnectionRegistry::new(),
                diagnostics,
            }
        }
    }
}

/// Node a request points at
#[derive(Debug, Clone, Copy)]
enum Anchor {
    Object(ObjectId),
    Synthesized(NodeId),
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(id) => write!(f, "object {id}"),
            Self::Synthesized(node) => write!(f, "node {node}"),
        }
    }
}

#[derive(Debug)]
struct Request {
    from: Anchor,
    from_slot: Slot,
    to: Anchor,
    to_slot: Slot,
}

struct Importer<'a> {
    doc: &'a SceneDocument,
    registry: ConnectionRegistry,
    mapped: HashMap<ObjectId, NodeId>,
    owners: HashMap<ObjectId, ObjectId>,
    requests: Vec<Request>,
    diagnostics: Diagnostics,
    /// Next free y per depth
    columns: Vec<f32>,
}

impl<'a> Importer<'a> {
    fn new(doc: &'a SceneDocument) -> Self {
        Self {
            doc,
            registry: ConnectionRegistry::new(),
            mapped: HashMap::new(),
            owners: HashMap::new(),
            requests: Vec::new(),
            diagnostics: Diagnostics::new(),
            columns: Vec::new(),
        }
    }

    /// Materialise `id` and everything it owns
    fn visit(&mut self, id: ObjectId, depth: usize) {
        let doc = self.doc;
        let Some(object) = doc.get(id) else {
            return;
        };

        // Factory
        let node = self.place(build_node(id, object), depth);
        let node_id = self.registry.add_node(node);
        self.mapped.insert(id, node_id);

        // Forwarding
        match &object.body {
            ObjectBody::Node {
                children,
                properties,
                extra_data,
                controller,
            } => {
                self.forward_properties(id, properties, depth);
                self.forward_all(id, Slot::ExtraData, extra_data, depth);
                self.forward_opt(id, Slot::Controller, *controller, depth);
                self.forward_all(id, Slot::Children, children, depth);
            }
            ObjectBody::Geometry {
                properties,
                extra_data,
                controller,
                shader,
            } => {
                self.forward_properties(id, properties, depth);
                self.forward_all(id, Slot::ExtraData, extra_data, depth);
                self.forward_opt(id, Slot::Shader, *shader, depth);
                self.forward_opt(id, Slot::Controller, *controller, depth);
            }
            ObjectBody::ParticleSystem {
                data,
                modifiers,
                properties,
                extra_data,
                controller,
            } => {
                self.forward_properties(id, properties, depth);
                self.forward_all(id, Slot::ExtraData, extra_data, depth);
                self.forward_particle_data(id, object, *data, depth);
                self.forward_modifiers(id, modifiers, depth);
                self.forward_opt(id, Slot::Controller, *controller, depth);
            }
            ObjectBody::Modifier { emitter_object, .. } => {
                // Non-owning: linked, never recursed into
                if let Some(target) = *emitter_object {
                    if self.doc.get(target).is_some() {
                        self.request(Anchor::Object(id), Slot::EmitterObject, Anchor::Object(target));
                    } else {
                        self.dangling(id, Slot::EmitterObject, target);
                    }
                }
            }
            ObjectBody::Controller { next } => {
                self.forward_opt(id, Slot::NextController, *next, depth);
            }
            ObjectBody::ParticleData
            | ObjectBody::Property { .. }
            | ObjectBody::Shader
            | ObjectBody::ExtraData => {}
        }
    }

    /// Follow an owning reference from `owner` through `slot`
    /// Returns whether a link to `target` was requested
    fn forward(&mut self, owner: ObjectId, slot: Slot, target: ObjectId, depth: usize) -> bool {
        let doc = self.doc;
        let Some(object) = doc.get(target) else {
            self.dangling(owner, slot, target);
            return false;
        };

        if self.mapped.contains_key(&target) {
            if object.body.is_shareable() {
                self.request(Anchor::Object(owner), slot, Anchor::Object(target));
                return true;
            } else {
                let first = self
                    .owners
                    .get(&target)
                    .map_or_else(|| "the root".to_string(), |id| id.to_string());
                self.diagnostics.push(format!(
                    "{} {target} is referenced by {owner} but already owned by {first}; keeping the first owner",
                    object.body.kind_name()
                ));
            }
            return false;
        }

        if !object.body.is_shareable() {
            self.owners.insert(target, owner);
        }
        self.request(Anchor::Object(owner), slot, Anchor::Object(target));
        self.visit(target, depth + 1);
        true
    }

    fn forward_all(&mut self, owner: ObjectId, slot: Slot, targets: &[ObjectId], depth: usize) {
        for target in targets {
            self.forward(owner, slot, *target, depth);
        }
    }

    fn forward_opt(&mut self, owner: ObjectId, slot: Slot, target: Option<ObjectId>, depth: usize) {
        if let Some(target) = target {
            self.forward(owner, slot, target, depth);
        }
    }

    /// Properties of a unique kind keep only the first of that kind
    fn forward_properties(&mut self, owner: ObjectId, properties: &[ObjectId], depth: usize) {
        let mut seen: HashSet<PropertyKind> = HashSet::new();
        for target in properties {
            if let Some(ObjectBody::Property { kind }) = self.doc.get(*target).map(|o| &o.body) {
                if !seen.insert(*kind) {
                    self.diagnostics.push(format!(
                        "{owner} has more than one {kind:?} property; ignoring {target}"
                    ));
                    continue;
                }
            }
            self.forward(owner, Slot::Properties, *target, depth);
        }
    }

    /// Particle data is required; a default block stands in when it is
    /// absent, dangling or already owned by another system
    fn forward_particle_data(
        &mut self,
        owner: ObjectId,
        object: &SceneObject,
        data: Option<ObjectId>,
        depth: usize,
    ) {
        if let Some(target) = data {
            if self.forward(owner, Slot::Data, target, depth) {
                return;
            }
        }

        self.diagnostics.push(format!(
            "Particle system {owner} \"{}\" has no particle data; using a default block",
            object.name
        ));
        let node = self.place(EditorNode::new(NodeKind::ParticleData, "Particle Data"), depth + 1);
        let synthesized = self.registry.add_node(node);
        self.request(Anchor::Object(owner), Slot::Data, Anchor::Synthesized(synthesized));
    }

    /// Modifiers are visited by their declared `order`, not list position
    fn forward_modifiers(&mut self, owner: ObjectId, modifiers: &[ObjectId], depth: usize) {
        let order_of = |id: &ObjectId| match self.doc.get(*id).map(|o| &o.body) {
            Some(ObjectBody::Modifier { order, .. }) => *order,
            _ => u32::MAX,
        };

        let mut sorted = modifiers.to_vec();
        sorted.sort_by_key(order_of);
        if sorted != modifiers {
            tracing::debug!("Modifier chain of {owner} listed out of order; resorted");
        }

        self.forward_all(owner, Slot::Modifiers, &sorted, depth);
    }

    fn request(&mut self, from: Anchor, from_slot: Slot, to: Anchor) {
        self.requests.push(Request {
            from,
            from_slot,
            to,
            to_slot: from_slot.counterpart(),
        });
    }

    fn dangling(&mut self, owner: ObjectId, slot: Slot, target: ObjectId) {
        self.diagnostics.push(format!(
            "{owner} references missing object {target} through {slot}; reference dropped"
        ));
    }

    /// Assign the next free spot in the column for `depth`
    fn place(&mut self, node: EditorNode, depth: usize) -> EditorNode {
        if self.columns.len() <= depth {
            self.columns.resize(depth + 1, 0.0);
        }
        let y = self.columns[depth];
        self.columns[depth] += node.size()[1] + ROW_GAP;
        node.with_position(depth as f32 * COLUMN_SPACING, y)
    }

    fn anchor_node(&self, anchor: Anchor) -> Option<NodeId> {
        match anchor {
            Anchor::Object(id) => self.mapped.get(&id).copied(),
            Anchor::Synthesized(node) => Some(node),
        }
    }

    /// Link every deferred request, in the order it was recorded
    fn resolve(&mut self) {
        let requests = std::mem::take(&mut self.requests);
        for request in requests {
            let (Some(from), Some(to)) = (self.anchor_node(request.from), self.anchor_node(request.to)) else {
                let missing = if self.anchor_node(request.from).is_none() {
                    request.from
                } else {
                    request.to
                };
                self.diagnostics.push(format!(
                    "Dropped {} link: {missing} was never materialised",
                    request.from_slot
                ));
                continue;
            };

            let graph = self.registry.graph();
            let endpoints = (
                graph.slot_endpoint(from, request.from_slot),
                graph.slot_endpoint(to, request.to_slot),
            );
            let (Some(a), Some(b)) = endpoints else {
                self.incompatible(from, to, request.from_slot);
                continue;
            };
            if !self.registry.can_connect(a, b) {
                self.incompatible(from, to, request.from_slot);
                continue;
            }

            self.registry.set_connection_state(a, b, true);
        }
    }

    fn incompatible(&mut self, from: NodeId, to: NodeId, slot: Slot) {
        let kind = |id| {
            self.registry
                .graph()
                .node(id)
                .map_or_else(String::new, |n| n.kind().label())
        };
        let message = format!(
            "Dropped {slot} link from {} to {}: endpoints are incompatible",
            kind(from),
            kind(to)
        );
        self.diagnostics.push(message);
    }
}

fn node_kind(body: &ObjectBody) -> NodeKind {
    match body {
        ObjectBody::Node { .. } => NodeKind::Node,
        ObjectBody::Geometry { .. } => NodeKind::Geometry,
        ObjectBody::ParticleSystem { .. } => NodeKind::ParticleSystem,
        ObjectBody::ParticleData => NodeKind::ParticleData,
        ObjectBody::Modifier { kind, .. } => NodeKind::Modifier(*kind),
        ObjectBody::Controller { .. } => NodeKind::Controller,
        ObjectBody::Property { kind } => NodeKind::Property(*kind),
        ObjectBody::Shader => NodeKind::Shader,
        ObjectBody::ExtraData => NodeKind::ExtraData,
    }
}

fn build_node(id: ObjectId, object: &SceneObject) -> EditorNode {
    object
        .attributes
        .iter()
        .fold(
            EditorNode::new(node_kind(&object.body), object.name.as_str()),
            |node, (name, value)| node.with_attribute(name.as_str(), value.clone()),
        )
        .with_object(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointId;
    use crate::scene::fixtures::*;
    use crate::scene::ModifierKind;
    use crate::state::EndpointPair;
    use crate::value::PropertyValue;
    use tracing_test::traced_test;

    fn node_of(result: &ImportResult, object: ObjectId) -> NodeId {
        result
            .registry
            .graph()
            .nodes()
            .find(|(_, node)| node.object() == Some(object))
            .map(|(id, _)| id)
            .unwrap()
    }

    fn slot(result: &ImportResult, object: ObjectId, slot: Slot) -> EndpointId {
        let node = node_of(result, object);
        result.registry.graph().slot_endpoint(node, slot).unwrap()
    }

    fn partners(result: &ImportResult, object: ObjectId, s: Slot) -> Vec<NodeId> {
        let endpoint = slot(result, object, s);
        result
            .registry
            .graph()
            .endpoint(endpoint)
            .unwrap()
            .partners()
            .map(|p| p.node)
            .collect()
    }

    #[test]
    fn test_sample_imports_cleanly() {
        let result = import(&sample()).unwrap();
        assert!(result.diagnostics.is_empty(), "{}", result.diagnostics);
        // Every object is reachable once
        assert_eq!(result.registry.graph().node_count(), sample().len());
    }

    #[test]
    fn test_shared_extra_data_is_one_node() {
        let result = import(&sample()).unwrap();
        let users = partners(&result, TAG, Slot::ExtraDataUsers);
        assert_eq!(users, vec![node_of(&result, ARM), node_of(&result, MESH)]);
        assert_eq!(partners(&result, MATERIAL, Slot::PropertyUsers).len(), 2);
    }

    #[test]
    fn test_forward_emitter_reference_resolves() {
        let result = import(&sample()).unwrap();
        assert_eq!(partners(&result, EMIT, Slot::EmitterObject), vec![node_of(&result, MESH)]);
        // The emitter does not own the mesh: its parent is still the root
        assert_eq!(
            result.registry.graph().parent_of(node_of(&result, MESH)),
            Some(node_of(&result, ROOT))
        );
    }

    #[test]
    fn test_modifiers_follow_declared_order() {
        let result = import(&sample()).unwrap();
        assert_eq!(
            partners(&result, SPARKS, Slot::Modifiers),
            vec![node_of(&result, EMIT), node_of(&result, GRAVITY)]
        );
    }

    #[test]
    fn test_children_keep_declared_order() {
        let result = import(&sample()).unwrap();
        assert_eq!(
            partners(&result, ROOT, Slot::Children),
            vec![node_of(&result, SPARKS), node_of(&result, ARM), node_of(&result, MESH)]
        );
    }

    #[test]
    fn test_controller_chain() {
        let result = import(&sample()).unwrap();
        assert_eq!(partners(&result, ARM, Slot::Controller), vec![node_of(&result, SPIN)]);
        assert_eq!(partners(&result, SPIN, Slot::NextController), vec![node_of(&result, NEXT_SPIN)]);
    }

    #[test]
    fn test_attributes_become_value_fields() {
        let result = import(&sample()).unwrap();
        let arm = result.registry.graph().node(node_of(&result, ARM)).unwrap();
        let field = arm.field(arm.field_index("Translation").unwrap()).unwrap();
        assert_eq!(field.current(), Some(&PropertyValue::Vector3([0.0, 1.0, 0.0])));
        assert_eq!(arm.name(), "Arm");
    }

    #[test]
    fn test_layout_columns_follow_depth() {
        let result = import(&sample()).unwrap();
        let graph = result.registry.graph();
        let root = graph.node(node_of(&result, ROOT)).unwrap().position();
        let arm = graph.node(node_of(&result, ARM)).unwrap().position();
        let sparks = graph.node(node_of(&result, SPARKS)).unwrap().position();
        let spin = graph.node(node_of(&result, SPIN)).unwrap().position();

        assert_eq!(root, [0.0, 0.0]);
        assert_eq!(arm[0], sparks[0]);
        assert!(arm[1] > sparks[1]);
        assert!(spin[0] > arm[0]);
    }

    #[test]
    #[traced_test]
    fn test_missing_particle_data_is_synthesized() {
        let mut doc = sample();
        if let Some(object) = doc.get_mut(SPARKS) {
            if let ObjectBody::ParticleSystem { data, .. } = &mut object.body {
                *data = None;
            }
        }
        doc.objects.shift_remove(&SPARK_DATA);

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("no particle data"));
        assert!(logs_contain("no particle data"));

        let data = partners(&result, SPARKS, Slot::Data);
        assert_eq!(data.len(), 1);
        let synthesized = result.registry.graph().node(data[0]).unwrap();
        assert_eq!(synthesized.kind(), NodeKind::ParticleData);
        assert_eq!(synthesized.object(), None);
    }

    #[test]
    fn test_shared_particle_data_gives_second_system_a_default() {
        const EMBERS: ObjectId = ObjectId(70);
        let mut doc = sample();
        doc.insert(
            EMBERS,
            SceneObject::new(
                "Embers",
                ObjectBody::ParticleSystem {
                    data: Some(SPARK_DATA),
                    modifiers: vec![],
                    properties: vec![],
                    extra_data: vec![],
                    controller: None,
                },
            ),
        );
        if let Some(ObjectBody::Node { children, .. }) = doc.get_mut(ROOT).map(|o| &mut o.body) {
            children.push(EMBERS);
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.diagnostics.mentions("already owned"));
        assert!(result.diagnostics.mentions("no particle data"));

        assert_eq!(partners(&result, SPARKS, Slot::Data), vec![node_of(&result, SPARK_DATA)]);
        let data = partners(&result, EMBERS, Slot::Data);
        assert_eq!(data.len(), 1);
        let synthesized = result.registry.graph().node(data[0]).unwrap();
        assert_eq!(synthesized.kind(), NodeKind::ParticleData);
        assert_eq!(synthesized.object(), None);
    }

    #[test]
    fn test_exclusive_object_keeps_first_owner() {
        let mut doc = sample();
        // The mesh also claims the arm's controller
        if let Some(object) = doc.get_mut(MESH) {
            if let ObjectBody::Geometry { controller, .. } = &mut object.body {
                *controller = Some(SPIN);
            }
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("keeping the first owner"));
        assert_eq!(partners(&result, SPIN, Slot::ControllerTarget), vec![node_of(&result, ARM)]);
        assert!(partners(&result, MESH, Slot::Controller).is_empty());
    }

    #[test]
    #[traced_test]
    fn test_dangling_reference_dropped() {
        let mut doc = sample();
        if let Some(object) = doc.get_mut(ARM) {
            if let ObjectBody::Node { children, .. } = &mut object.body {
                children.push(ObjectId(99));
            }
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("@99"));
        assert!(logs_contain("missing object @99"));
        assert_eq!(result.registry.graph().node_count(), sample().len());
    }

    #[test]
    fn test_duplicate_property_kind_keeps_first() {
        let mut doc = sample();
        let chrome = ObjectId(50);
        doc.insert(
            chrome,
            SceneObject::new("Chrome", ObjectBody::Property { kind: PropertyKind::Material }),
        );
        if let Some(object) = doc.get_mut(ARM) {
            if let ObjectBody::Node { properties, .. } = &mut object.body {
                properties.push(chrome);
            }
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("more than one Material"));
        assert_eq!(partners(&result, ARM, Slot::Properties), vec![node_of(&result, MATERIAL)]);
    }

    #[test]
    fn test_unreached_emitter_target_dropped() {
        let mut doc = sample();
        let orphan = ObjectId(60);
        doc.insert(
            orphan,
            SceneObject::new(
                "Orphan",
                ObjectBody::Geometry {
                    properties: vec![],
                    extra_data: vec![],
                    controller: None,
                    shader: None,
                },
            ),
        );
        if let Some(object) = doc.get_mut(EMIT) {
            if let ObjectBody::Modifier { emitter_object, .. } = &mut object.body {
                *emitter_object = Some(orphan);
            }
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("never materialised"));
        assert!(partners(&result, EMIT, Slot::EmitterObject).is_empty());
    }

    #[test]
    fn test_wrong_kind_reference_dropped() {
        let mut doc = sample();
        // A shader listed as a render property
        if let Some(object) = doc.get_mut(ARM) {
            if let ObjectBody::Node { properties, .. } = &mut object.body {
                properties.push(SHADER);
            }
        }

        let result = import(&doc).unwrap();
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics.mentions("incompatible"));
        assert_eq!(partners(&result, ARM, Slot::Properties), vec![node_of(&result, MATERIAL)]);
    }

    #[test]
    fn test_fatal_root_errors() {
        let mut doc = sample();
        doc.root = None;
        assert_eq!(import(&doc).unwrap_err(), ImportError::MissingRoot);

        doc.root = Some(ObjectId(404));
        assert_eq!(import(&doc).unwrap_err(), ImportError::MissingRootObject(ObjectId(404)));

        doc.root = Some(GRAVITY);
        assert_eq!(
            import(&doc).unwrap_err(),
            ImportError::UnsupportedRoot { kind: "Modifier" }
        );
    }

    #[test]
    fn test_import_or_empty_falls_back() {
        let result = import_or_empty(&SceneDocument::new());
        assert!(result.registry.graph().is_empty());
        assert_eq!(result.diagnostics.messages(), ["Scene has no root object"]);
    }

    #[test]
    fn test_import_is_deterministic() {
        fn topology(result: &ImportResult) -> Vec<(String, String)> {
            let name = |e: EndpointId| {
                let node = result.registry.graph().node(e.node).unwrap();
                format!("{}.{}", node.name(), node.field(e.field).unwrap().name())
            };
            let mut pairs: Vec<_> = result
                .registry
                .connections()
                .map(|pair: EndpointPair| (name(pair.first()), name(pair.second())))
                .collect();
            pairs.sort();
            pairs
        }

        let first = import(&sample()).unwrap();
        let second = import(&sample()).unwrap();
        assert_eq!(topology(&first), topology(&second));
        assert_eq!(first.registry.connection_count(), second.registry.connection_count());
    }

    #[test]
    fn test_modifier_kind_carried_to_node() {
        let result = import(&sample()).unwrap();
        let emit = result.registry.graph().node(node_of(&result, EMIT)).unwrap();
        assert_eq!(emit.kind(), NodeKind::Modifier(ModifierKind::Emitter));
    }
}
