// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection diffs.
//!
//! A [`StateMap`] is an ordered batch of `connect`/`disconnect` entries keyed
//! by unordered [`EndpointPair`]s. Diffs combine with [`StateMap::merge`]:
//! an entry meeting its opposite cancels out, so a connect followed by a
//! disconnect of the same pair leaves nothing behind.

use crate::endpoint::EndpointId;
use crate::node::NodeId;
use indexmap::IndexMap;
use std::fmt;

/// Unordered pair of endpoints; `(a, b)` and `(b, a)` are the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointPair {
    first: EndpointId,
    second: EndpointId,
}

impl EndpointPair {
    /// Create a normalised pair
    pub fn new(a: EndpointId, b: EndpointId) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Lower endpoint of the pair
    pub fn first(&self) -> EndpointId {
        self.first
    }

    /// Higher endpoint of the pair
    pub fn second(&self) -> EndpointId {
        self.second
    }

    /// Whether `endpoint` is one of the two ends
    pub fn contains(&self, endpoint: EndpointId) -> bool {
        self.first == endpoint || self.second == endpoint
    }

    /// The end opposite `endpoint`, if `endpoint` is part of the pair
    pub fn other(&self, endpoint: EndpointId) -> Option<EndpointId> {
        if self.first == endpoint {
            Some(self.second)
        } else if self.second == endpoint {
            Some(self.first)
        } else {
            None
        }
    }

    /// Whether either end belongs to `node`
    pub fn involves_node(&self, node: NodeId) -> bool {
        self.first.node == node || self.second.node == node
    }
}

impl fmt::Display for EndpointPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.first, self.second)
    }
}

/// Ordered batch of pending or completed connection changes.
///
/// `true` means connect, `false` disconnect. Equality ignores entry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    entries: IndexMap<EndpointPair, bool>,
}

impl StateMap {
    /// Create an empty diff
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry, overwriting any previous value for the pair
    pub fn set(&mut self, pair: EndpointPair, connect: bool) {
        self.entries.insert(pair, connect);
    }

    /// Value recorded for `pair`
    pub fn get(&self, pair: EndpointPair) -> Option<bool> {
        self.entries.get(&pair).copied()
    }

    /// Fold `other` into this map.
    ///
    /// An entry whose pair already holds the opposite value removes the pair;
    /// an entry holding the same value leaves it unchanged.
    pub fn merge(&mut self, other: &StateMap) {
        for (pair, connect) in other.iter() {
            match self.entries.get(&pair) {
                Some(existing) if *existing != connect => {
                    self.entries.shift_remove(&pair);
                }
                Some(_) => {}
                None => {
                    self.entries.insert(pair, connect);
                }
            }
        }
    }

    /// Consuming form of [`merge`](Self::merge)
    pub fn merged(mut self, other: &StateMap) -> Self {
        self.merge(other);
        self
    }

    /// The diff undoing this one, latest entry first
    pub fn inverted(&self) -> Self {
        Self {
            entries: self.entries.iter().rev().map(|(pair, c)| (*pair, !c)).collect(),
        }
    }

    /// Entries in recording order
    pub fn iter(&self) -> impl Iterator<Item = (EndpointPair, bool)> + '_ {
        self.entries.iter().map(|(pair, c)| (*pair, *c))
    }

    /// Pairs to connect, in order
    pub fn connections(&self) -> impl Iterator<Item = EndpointPair> + '_ {
        self.iter().filter(|(_, c)| *c).map(|(pair, _)| pair)
    }

    /// Pairs to disconnect, in order
    pub fn disconnections(&self) -> impl Iterator<Item = EndpointPair> + '_ {
        self.iter().filter(|(_, c)| !*c).map(|(pair, _)| pair)
    }

    /// Whether any entry touches `endpoint`
    pub fn touches(&self, endpoint: EndpointId) -> bool {
        self.entries.keys().any(|pair| pair.contains(endpoint))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the diff changes nothing
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(EndpointPair, bool)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (EndpointPair, bool)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (pair, connect) in iter {
            map.set(pair, connect);
        }
        map
    }
}
