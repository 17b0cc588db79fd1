// SPDX-License-Identifier: MIT OR Apache-2.0
//! Scripted edits driven through an editing session.

use crate::error::AppError;
use sceneweave_graph::{
    import, Diagnostics, EditorSession, ModelBinding, SceneDocument, SessionConfig, Slot,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Outcome of a scripted edit
#[derive(Debug)]
pub struct EditOutcome {
    /// The document with the edit written back
    pub document: SceneDocument,
    /// Anomalies found while importing
    pub diagnostics: Diagnostics,
    /// Whether the graph changed
    pub changed: bool,
}

/// Move the node called `node` under the node called `parent`.
///
/// Performs the same drag-to-connect gesture an interactive user would:
/// pick up the node's parent endpoint and drop it on the new parent's
/// children endpoint.
pub fn reparent(
    doc: SceneDocument,
    config: &SessionConfig,
    node: &str,
    parent: &str,
) -> Result<EditOutcome, AppError> {
    let imported = import(&doc)?;
    let document = Rc::new(RefCell::new(doc));
    let mut session = EditorSession::from_registry(imported.registry, config);
    let binding = ModelBinding::attach(session.registry(), Rc::clone(&document));

    let graph = session.registry().graph();
    let child = graph
        .find_by_name(node)
        .ok_or_else(|| AppError::NodeNotFound(node.to_string()))?;
    let target = graph
        .find_by_name(parent)
        .ok_or_else(|| AppError::NodeNotFound(parent.to_string()))?;

    let invalid = || AppError::InvalidParent {
        node: node.to_string(),
        parent: parent.to_string(),
    };
    let seeker = graph.slot_endpoint(child, Slot::Parent).ok_or_else(invalid)?;
    let drop_on = graph.slot_endpoint(target, Slot::Children).ok_or_else(invalid)?;
    if !session.registry().can_connect(seeker, drop_on) {
        return Err(invalid());
    }

    session.begin_connect(seeker);
    let queued = session.release_connect(Some(drop_on))?;
    let report = session.end_frame();
    tracing::info!(
        "Reparented {node:?} under {parent:?} ({} command(s), {} recorded)",
        report.executed,
        report.recorded
    );

    drop(binding);
    let document = Rc::try_unwrap(document)
        .map(RefCell::into_inner)
        .unwrap_or_else(|shared| shared.borrow().clone());

    Ok(EditOutcome {
        document,
        diagnostics: imported.diagnostics,
        changed: queued,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneweave_graph::{ObjectBody, ObjectId, SceneObject};

    const ROOT: ObjectId = ObjectId(1);
    const ARM: ObjectId = ObjectId(2);
    const BLADE: ObjectId = ObjectId(3);

    fn scene() -> SceneDocument {
        let node = |children: Vec<ObjectId>| ObjectBody::Node {
            children,
            properties: vec![],
            extra_data: vec![],
            controller: None,
        };

        let mut doc = SceneDocument::new();
        doc.root = Some(ROOT);
        doc.insert(ROOT, SceneObject::new("Root", node(vec![ARM, BLADE])));
        doc.insert(ARM, SceneObject::new("Arm", node(vec![])));
        doc.insert(
            BLADE,
            SceneObject::new(
                "Blade",
                ObjectBody::Geometry {
                    properties: vec![],
                    extra_data: vec![],
                    controller: None,
                    shader: None,
                },
            ),
        );
        doc
    }

    fn children(doc: &SceneDocument, id: ObjectId) -> Vec<ObjectId> {
        match &doc.get(id).unwrap().body {
            ObjectBody::Node { children, .. } => children.clone(),
            _ => panic!("not a node"),
        }
    }

    #[test]
    fn test_reparent_updates_document() {
        let outcome = reparent(scene(), &SessionConfig::default(), "Blade", "Arm").unwrap();
        assert!(outcome.changed);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(children(&outcome.document, ROOT), vec![ARM]);
        assert_eq!(children(&outcome.document, ARM), vec![BLADE]);
    }

    #[test]
    fn test_reparent_to_current_parent_is_noop() {
        let outcome = reparent(scene(), &SessionConfig::default(), "Blade", "Root").unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.document, scene());
    }

    #[test]
    fn test_reparent_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.ron");

        let outcome = reparent(scene(), &SessionConfig::default(), "Blade", "Arm").unwrap();
        outcome.document.save(&path).unwrap();
        let loaded = SceneDocument::load(&path).unwrap();
        assert_eq!(children(&loaded, ARM), vec![BLADE]);
    }

    #[test]
    fn test_reparent_rejections() {
        let config = SessionConfig::default();
        assert!(matches!(
            reparent(scene(), &config, "Hilt", "Arm"),
            Err(AppError::NodeNotFound(name)) if name == "Hilt"
        ));
        // Geometry has no children
        assert!(matches!(
            reparent(scene(), &config, "Arm", "Blade"),
            Err(AppError::InvalidParent { .. })
        ));
        // A node cannot move below itself
        assert!(matches!(
            reparent(scene(), &config, "Root", "Arm"),
            Err(AppError::InvalidParent { .. })
        ));

        let mut rootless = scene();
        rootless.root = None;
        assert!(matches!(
            reparent(rootless, &config, "Blade", "Arm"),
            Err(AppError::Import(_))
        ));
    }
}
