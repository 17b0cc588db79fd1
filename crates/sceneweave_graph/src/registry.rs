// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection registry.
//!
//! The registry owns the node arena of one graph region and is the only place
//! links are made or broken. Each endpoint's partner set is the source of
//! truth; the incidence record is a cache of connected pairs kept for drawing
//! and lookup, written only by [`ConnectionRegistry::set_connection_state`]
//! and its helpers, and reordered by [`ConnectionRegistry::restore_order`].
//!
//! It also tracks the drag-to-connect gesture: the endpoint being dragged
//! (the seeker) and the state accumulated since it was armed, so the whole
//! gesture turns into one [`StateMap`].

use crate::cell::{Signal, Subscription};
use crate::endpoint::{Cardinality, EndpointId, Slot};
use crate::graph::Graph;
use crate::node::{EditorNode, NodeId};
use crate::scene::ObjectId;
use crate::state::{EndpointPair, StateMap};
use indexmap::IndexSet;

/// One side of a link that was just made or broken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEnd {
    /// Endpoint handle
    pub endpoint: EndpointId,
    /// Slot of the endpoint
    pub slot: Slot,
    /// Scene object behind the owning node
    pub object: Option<ObjectId>,
}

/// Notification sent for every link or unlink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionChange {
    /// Pair affected
    pub pair: EndpointPair,
    /// `true` when the pair was linked
    pub connected: bool,
    /// Both ends, lower endpoint first
    pub ends: [ChangeEnd; 2],
}

impl ConnectionChange {
    /// The end whose object stores the reference, and the other end
    pub fn owner_and_target(&self) -> Option<(ChangeEnd, ChangeEnd)> {
        let [a, b] = self.ends;
        if a.slot.holds_reference() {
            Some((a, b))
        } else if b.slot.holds_reference() {
            Some((b, a))
        } else {
            None
        }
    }
}

/// Where severed links sat in their partner sets and in the incidence record.
///
/// Captured by [`ConnectionRegistry::recording_order`] and replayed by
/// [`ConnectionRegistry::restore_order`] after the links are made again, so
/// an undo leaves every ordered relation as it was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkOrder {
    severed: Vec<Severed>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Severed {
    a: EndpointId,
    b: EndpointId,
    in_a: usize,
    in_b: usize,
    drawn: usize,
}

impl LinkOrder {
    /// Number of severed links recorded
    pub fn len(&self) -> usize {
        self.severed.len()
    }

    /// Whether nothing was severed
    pub fn is_empty(&self) -> bool {
        self.severed.is_empty()
    }
}

#[derive(Debug)]
struct Seek {
    seeker: EndpointId,
    pending: StateMap,
}

/// Owner of the node arena and of every link between its endpoints
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    graph: Graph,
    incidence: IndexSet<EndpointPair>,
    seek: Option<Seek>,
    journal: Option<LinkOrder>,
    changes: Signal<ConnectionChange>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The node arena
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Insert an unconnected node directly, outside of the undo history
    pub fn add_node(&mut self, node: EditorNode) -> NodeId {
        self.graph.add_node(node)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut EditorNode> {
        self.graph.node_mut(id)
    }

    /// Detach an unconnected node from the arena
    pub(crate) fn take_node(&mut self, id: NodeId) -> Option<(usize, EditorNode)> {
        debug_assert!(
            !self.incidence.iter().any(|pair| pair.involves_node(id)),
            "node {id} removed while still connected"
        );
        if self.seeker().is_some_and(|s| s.node == id) {
            self.seek = None;
        }
        self.graph.take_node(id)
    }

    pub(crate) fn restore_node(&mut self, index: usize, id: NodeId, node: EditorNode) {
        self.graph.restore_node(index, id, node);
    }

    /// Listen for every link and unlink
    pub fn subscribe_changes(&self, listener: impl Fn(&ConnectionChange) + 'static) -> Subscription {
        self.changes.subscribe(listener)
    }

    /// Whether `a` and `b` may be linked.
    ///
    /// Both roles must accept each other, the ends must sit on different
    /// nodes, and a parent link may not make a node its own ancestor.
    pub fn can_connect(&self, a: EndpointId, b: EndpointId) -> bool {
        if a.node == b.node {
            return false;
        }
        let (Some(ea), Some(eb)) = (self.graph.endpoint(a), self.graph.endpoint(b)) else {
            return false;
        };
        if !ea.can_connect(eb) {
            return false;
        }

        let containment = match (ea.slot(), eb.slot()) {
            (Slot::Children, Slot::Parent) => Some((a.node, b.node)),
            (Slot::Parent, Slot::Children) => Some((b.node, a.node)),
            _ => None,
        };
        match containment {
            Some((parent, child)) => !self.graph.is_ancestor_or_self(child, parent),
            None => true,
        }
    }

    /// What `set_connection_state(a, b, connect)` would change right now
    pub fn query_state_change(&self, a: EndpointId, b: EndpointId, connect: bool) -> StateMap {
        self.query_state_change_from(&StateMap::new(), a, b, connect)
    }

    /// Same as [`query_state_change`](Self::query_state_change), evaluated as
    /// if `base` had already been applied. The result excludes `base`.
    pub fn query_state_change_from(
        &self,
        base: &StateMap,
        a: EndpointId,
        b: EndpointId,
        connect: bool,
    ) -> StateMap {
        let (Some(ea), Some(eb)) = (self.graph.endpoint(a), self.graph.endpoint(b)) else {
            return StateMap::new();
        };
        if a == b {
            return StateMap::new();
        }

        let mut map = ea.query_state_change(a, b, connect, base);
        map.merge(&eb.query_state_change(b, a, connect, base));
        map
    }

    /// What [`disconnect`](Self::disconnect) would change right now
    pub fn query_disconnect(&self, endpoint: EndpointId) -> StateMap {
        self.graph
            .endpoint(endpoint)
            .map(|e| {
                e.partners()
                    .map(|p| (EndpointPair::new(endpoint, p), false))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Link or unlink `a` and `b`, returning what actually changed.
    ///
    /// Single-cardinality ends drop their current partner before a new link
    /// is made.
    pub fn set_connection_state(&mut self, a: EndpointId, b: EndpointId, connect: bool) -> StateMap {
        let mut applied = StateMap::new();
        if a == b || self.graph.endpoint(a).is_none() || self.graph.endpoint(b).is_none() {
            tracing::warn!("Ignoring connection request for dead endpoint {a} or {b}");
            return applied;
        }

        if !connect {
            if self.unlink(a, b) {
                applied.set(EndpointPair::new(a, b), false);
            }
            return applied;
        }

        for (side, other) in [(a, b), (b, a)] {
            let stale: Vec<EndpointId> = match self.graph.endpoint(side) {
                Some(e) if e.cardinality() == Cardinality::Single => {
                    e.partners().filter(|p| *p != other).collect()
                }
                _ => Vec::new(),
            };
            for partner in stale {
                if self.unlink(side, partner) {
                    applied.set(EndpointPair::new(side, partner), false);
                }
            }
        }

        if self.link(a, b) {
            applied.set(EndpointPair::new(a, b), true);
        }
        applied
    }

    /// Apply a diff: every disconnect in order, then every connect in order.
    ///
    /// Returns the diff actually applied.
    pub fn apply_state_map(&mut self, map: &StateMap) -> StateMap {
        let mut applied = StateMap::new();
        for pair in map.disconnections() {
            applied.merge(&self.set_connection_state(pair.first(), pair.second(), false));
        }
        for pair in map.connections() {
            applied.merge(&self.set_connection_state(pair.first(), pair.second(), true));
        }
        applied
    }

    /// Sever every partner of `endpoint`, first linked first
    pub fn disconnect(&mut self, endpoint: EndpointId) -> StateMap {
        let mut applied = StateMap::new();
        let partners: Vec<EndpointId> = match self.graph.endpoint(endpoint) {
            Some(e) => e.partners().collect(),
            None => return applied,
        };
        for partner in partners {
            if self.unlink(endpoint, partner) {
                applied.set(EndpointPair::new(endpoint, partner), false);
            }
        }
        applied
    }

    /// Sever every link of every endpoint on `node`
    pub fn disconnect_node(&mut self, node: NodeId) -> StateMap {
        let fields: Vec<usize> = match self.graph.node(node) {
            Some(n) => n.endpoints().map(|(field, _)| field).collect(),
            None => return StateMap::new(),
        };

        let mut applied = StateMap::new();
        for field in fields {
            applied.merge(&self.disconnect(EndpointId::new(node, field)));
        }
        applied
    }

    /// Sever every link of `root` and of every node below it
    pub fn disconnect_subtree(&mut self, root: NodeId) -> StateMap {
        let mut members = Vec::new();
        self.graph.walk_subtree(root, |id, _| members.push(id));

        let mut applied = StateMap::new();
        for id in members {
            applied.merge(&self.disconnect_node(id));
        }
        applied
    }

    /// Run `edit`, recording where every link it severs sat
    pub fn recording_order<R>(&mut self, edit: impl FnOnce(&mut Self) -> R) -> (R, LinkOrder) {
        let outer = self.journal.replace(LinkOrder::default());
        let result = edit(self);
        let order = self.journal.take().unwrap_or_default();
        self.journal = outer;
        if let Some(outer) = &mut self.journal {
            outer.severed.extend_from_slice(&order.severed);
        }
        (result, order)
    }

    /// Put relinked pairs back where `order` saw them, latest severance first.
    ///
    /// Pairs that are not linked any more are skipped.
    pub fn restore_order(&mut self, order: &LinkOrder) {
        for severed in order.severed.iter().rev() {
            let Severed { a, b, in_a, in_b, drawn } = *severed;
            if !self.is_connected(a, b) {
                continue;
            }
            if let Some(e) = self.graph.endpoint_mut(a) {
                e.move_partner(b, in_a);
            }
            if let Some(e) = self.graph.endpoint_mut(b) {
                e.move_partner(a, in_b);
            }
            if let Some(from) = self.incidence.get_index_of(&EndpointPair::new(a, b)) {
                let to = drawn.min(self.incidence.len() - 1);
                self.incidence.move_index(from, to);
            }
        }
    }

    /// Whether `a` and `b` are linked
    pub fn is_connected(&self, a: EndpointId, b: EndpointId) -> bool {
        self.graph.endpoint(a).is_some_and(|e| e.is_connected_to(b))
    }

    /// Whether `pair` is in the incidence record
    pub fn is_drawn(&self, pair: EndpointPair) -> bool {
        self.incidence.contains(&pair)
    }

    /// Connected pairs in the order they were linked
    pub fn connections(&self) -> impl Iterator<Item = EndpointPair> + '_ {
        self.incidence.iter().copied()
    }

    /// Number of connected pairs
    pub fn connection_count(&self) -> usize {
        self.incidence.len()
    }

    /// Arm a drag-to-connect gesture from `seeker`.
    ///
    /// Picking up a connected single-cardinality endpoint detaches its
    /// partner as part of the same gesture. Nothing is applied until the
    /// resulting diff is executed.
    pub fn begin_seek(&mut self, seeker: EndpointId) -> bool {
        let Some(endpoint) = self.graph.endpoint(seeker) else {
            return false;
        };
        let pending = if endpoint.cardinality() == Cardinality::Single {
            self.query_disconnect(seeker)
        } else {
            StateMap::new()
        };

        tracing::debug!("Seeking from {seeker} with {} pending change(s)", pending.len());
        self.seek = Some(Seek { seeker, pending });
        true
    }

    /// Endpoint currently being dragged
    pub fn seeker(&self) -> Option<EndpointId> {
        self.seek.as_ref().map(|s| s.seeker)
    }

    /// State accumulated by the current gesture
    pub fn pending_state(&self) -> Option<&StateMap> {
        self.seek.as_ref().map(|s| &s.pending)
    }

    /// Endpoints the current seeker may be dropped on
    pub fn reachable(&self) -> Vec<EndpointId> {
        let Some(seeker) = self.seeker() else {
            return Vec::new();
        };
        self.graph
            .endpoints()
            .map(|(id, _)| id)
            .filter(|id| self.can_connect(seeker, *id))
            .collect()
    }

    /// Finish the gesture over `candidate` (or over empty space).
    ///
    /// Returns the merged diff for the whole gesture, or `None` when it would
    /// change nothing. A candidate that cannot take the seeker counts as
    /// empty space: the detach made on pickup still stands.
    pub fn release_seek(&mut self, candidate: Option<EndpointId>) -> Option<StateMap> {
        let Seek { seeker, pending } = self.seek.take()?;
        let mut result = pending;

        if let Some(target) = candidate {
            if self.can_connect(seeker, target) {
                let change = self.query_state_change_from(&result, seeker, target, true);
                result.merge(&change);
            } else {
                tracing::debug!("Dropped {seeker} on incompatible endpoint {target}");
            }
        }

        (!result.is_empty()).then_some(result)
    }

    /// Abandon the gesture without recording anything
    pub fn cancel_seek(&mut self) {
        self.seek = None;
    }

    fn link(&mut self, a: EndpointId, b: EndpointId) -> bool {
        let linked_a = self.graph.endpoint_mut(a).is_some_and(|e| e.link(b));
        let linked_b = self.graph.endpoint_mut(b).is_some_and(|e| e.link(a));
        debug_assert_eq!(linked_a, linked_b, "asymmetric link between {a} and {b}");
        if !linked_a {
            return false;
        }

        let pair = EndpointPair::new(a, b);
        self.incidence.insert(pair);
        self.notify(pair, true);
        true
    }

    fn unlink(&mut self, a: EndpointId, b: EndpointId) -> bool {
        let in_a = self.graph.endpoint_mut(a).and_then(|e| e.unlink(b));
        let in_b = self.graph.endpoint_mut(b).and_then(|e| e.unlink(a));
        debug_assert_eq!(in_a.is_some(), in_b.is_some(), "asymmetric unlink between {a} and {b}");
        let (Some(in_a), Some(in_b)) = (in_a, in_b) else {
            return false;
        };

        let pair = EndpointPair::new(a, b);
        let drawn = self.incidence.shift_remove_full(&pair).map_or(self.incidence.len(), |(i, _)| i);
        if let Some(journal) = &mut self.journal {
            journal.severed.push(Severed { a, b, in_a, in_b, drawn });
        }
        self.notify(pair, false);
        true
    }

    fn notify(&self, pair: EndpointPair, connected: bool) {
        let (Some(first), Some(second)) = (self.change_end(pair.first()), self.change_end(pair.second()))
        else {
            return;
        };
        self.changes.emit(&ConnectionChange {
            pair,
            connected,
            ends: [first, second],
        });
    }

    fn change_end(&self, endpoint: EndpointId) -> Option<ChangeEnd> {
        let node = self.graph.node(endpoint.node)?;
        Some(ChangeEnd {
            endpoint,
            slot: node.endpoint(endpoint.field)?.slot(),
            object: node.object(),
        })
    }
}
