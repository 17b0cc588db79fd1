// SPDX-License-Identifier: MIT OR Apache-2.0
//! Write-back from the editor graph to the scene document.
//!
//! The binding listens to link changes and to the value cells of every node
//! that stands for a scene object. Nodes without a backing object are not
//! written back. Dropping the binding stops all write-back.
//!
//! A list reference that is removed and later put back (an undo, usually)
//! returns to the position it was removed from.

use crate::cell::Subscription;
use crate::endpoint::Slot;
use crate::registry::{ConnectionChange, ConnectionRegistry};
use crate::scene::{ObjectId, ReferenceEdit, SceneDocument};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Owner, slot and target of a removed list reference, and where it sat
type Removed = HashMap<(ObjectId, Slot, ObjectId), usize>;

/// Live subscriptions that mirror graph edits into a [`SceneDocument`]
#[derive(Debug)]
pub struct ModelBinding {
    document: Rc<RefCell<SceneDocument>>,
    subscriptions: Vec<Subscription>,
}

impl ModelBinding {
    /// Bind every object-backed node of `registry` to `document`
    pub fn attach(registry: &ConnectionRegistry, document: Rc<RefCell<SceneDocument>>) -> Self {
        let mut subscriptions = Vec::new();

        let doc = Rc::clone(&document);
        let removed = RefCell::new(Removed::new());
        subscriptions.push(registry.subscribe_changes(move |change| write_link(&doc, &removed, change)));

        for (_, node) in registry.graph().nodes() {
            let Some(object) = node.object() else {
                continue;
            };
            for field in node.fields() {
                let Some(cell) = field.cell() else {
                    continue;
                };
                let doc = Rc::clone(&document);
                let name = field.name().to_string();
                subscriptions.push(cell.subscribe(move |value| {
                    let Ok(mut doc) = doc.try_borrow_mut() else {
                        tracing::error!("Scene document busy; lost write of {name} on {object}");
                        return;
                    };
                    if !doc.set_attribute(object, &name, value) {
                        tracing::debug!("Object {object} did not take {name} = {value}");
                    }
                }));
            }
        }

        tracing::debug!("Bound {} subscription(s) to the scene document", subscriptions.len());
        Self {
            document,
            subscriptions,
        }
    }

    /// The bound document
    pub fn document(&self) -> &Rc<RefCell<SceneDocument>> {
        &self.document
    }

    /// Number of live subscriptions
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

fn write_link(doc: &RefCell<SceneDocument>, removed: &RefCell<Removed>, change: &ConnectionChange) {
    let Some((owner, target)) = change.owner_and_target() else {
        return;
    };
    let (Some(owner_object), Some(target_object)) = (owner.object, target.object) else {
        return;
    };
    let Ok(mut doc) = doc.try_borrow_mut() else {
        tracing::error!("Scene document busy; lost {} change on {owner_object}", owner.slot);
        return;
    };

    let key = (owner_object, owner.slot, target_object);
    let mut removed = removed.borrow_mut();
    let at = if change.connected { removed.remove(&key) } else { None };

    match doc.edit_reference(owner_object, owner.slot, target_object, change.connected, at) {
        ReferenceEdit::Removed(index) => {
            removed.insert(key, index);
        }
        ReferenceEdit::Inserted(_) => {}
        ReferenceEdit::Unchanged => tracing::debug!(
            "{owner_object}.{} already {} {target_object}",
            owner.slot,
            if change.connected { "references" } else { "omits" }
        ),
    }
}
