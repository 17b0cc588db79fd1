// SPDX-License-Identifier: MIT OR Apache-2.0
//! Endpoint definitions: the typed link points owned by node fields.
//!
//! An endpoint knows its [`Slot`] (what the link means in the scene format),
//! its [`Cardinality`] and its producer/consumer [`Role`]. Its partner set is
//! the source of truth for connectivity; the registry keeps both sides of
//! every pair in step.

use crate::node::NodeId;
use crate::state::{EndpointPair, StateMap};
use indexmap::IndexSet;
use std::fmt;

/// Arena handle of an endpoint: the owning node and the field index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId {
    /// Owning node
    pub node: NodeId,
    /// Index of the owning field within the node
    pub field: usize,
}

impl EndpointId {
    /// Create an endpoint handle
    pub fn new(node: NodeId, field: usize) -> Self {
        Self { node, field }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.field)
    }
}

/// How many partners an endpoint may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one partner
    Single,
    /// Any number of partners
    Multi,
}

/// What one side of a link offers to, or requires from, the other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Can hold scene children
    Container,
    /// Can be placed under a container
    Child,
    /// Can hold properties
    PropertyHolder,
    /// Render property
    Property,
    /// Can hold extra data
    ExtraDataHolder,
    /// Extra data block
    ExtraData,
    /// Can be animated by a controller
    Controllable,
    /// Controller block
    Controller,
    /// Controller pointing at the next one in its chain
    ChainHead,
    /// Controller following another in its chain
    ChainTail,
    /// Particle system accepting modifiers
    ModifierHost,
    /// Particle modifier
    Modifier,
    /// Emitter that spawns from a scene object
    EmitterSource,
    /// Scene object usable as an emitter shape
    Emissive,
    /// Geometry that can be shaded
    Shaded,
    /// Shader block
    Shader,
    /// Particle system owning particle data
    DataHost,
    /// Particle data block
    ParticleData,
}

/// Producer/consumer pair of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Role {
    /// What this side offers
    pub produces: Capability,
    /// What this side will take from a partner
    pub accepts: &'static [Capability],
}

impl Role {
    /// Whether this side takes a partner offering `offered`
    pub fn accepts(&self, offered: Capability) -> bool {
        self.accepts.contains(&offered)
    }
}

/// Meaning of a link point in the scene format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Scene parent of a node
    Parent,
    /// Scene children of a node
    Children,
    /// Properties attached to a node
    Properties,
    /// Nodes using a property
    PropertyUsers,
    /// Extra data attached to a node
    ExtraData,
    /// Nodes using an extra data block
    ExtraDataUsers,
    /// First controller animating a node
    Controller,
    /// Node animated by a controller
    ControllerTarget,
    /// Next controller in the chain
    NextController,
    /// Previous controller in the chain
    PreviousController,
    /// Ordered modifier chain of a particle system
    Modifiers,
    /// Particle system owning a modifier
    ModifierSystem,
    /// Scene object an emitter spawns from
    EmitterObject,
    /// Emitters spawning from a scene object
    EmitterUsers,
    /// Shader used by geometry
    Shader,
    /// Geometry using a shader
    ShaderUsers,
    /// Particle data of a particle system
    Data,
    /// Particle system owning the data
    DataOwner,
}

impl Slot {
    /// Field name used for this slot on an editor node
    pub fn name(self) -> &'static str {
        match self {
            Self::Parent => "Parent",
            Self::Children => "Children",
            Self::Properties => "Properties",
            Self::PropertyUsers => "Property Users",
            Self::ExtraData => "Extra Data",
            Self::ExtraDataUsers => "Extra Data Users",
            Self::Controller => "Controller",
            Self::ControllerTarget => "Target",
            Self::NextController => "Next Controller",
            Self::PreviousController => "Previous Controller",
            Self::Modifiers => "Modifiers",
            Self::ModifierSystem => "System",
            Self::EmitterObject => "Emitter Object",
            Self::EmitterUsers => "Emitter Users",
            Self::Shader => "Shader",
            Self::ShaderUsers => "Shader Users",
            Self::Data => "Data",
            Self::DataOwner => "Data Owner",
        }
    }

    /// Partner limit of endpoints in this slot
    pub fn cardinality(self) -> Cardinality {
        match self {
            Self::Parent
            | Self::Controller
            | Self::ControllerTarget
            | Self::NextController
            | Self::PreviousController
            | Self::ModifierSystem
            | Self::EmitterObject
            | Self::Shader
            | Self::Data
            | Self::DataOwner => Cardinality::Single,
            Self::Children
            | Self::Properties
            | Self::PropertyUsers
            | Self::ExtraData
            | Self::ExtraDataUsers
            | Self::Modifiers
            | Self::EmitterUsers
            | Self::ShaderUsers => Cardinality::Multi,
        }
    }

    /// Producer/consumer role of endpoints in this slot
    pub fn role(self) -> Role {
        use Capability as C;

        let (produces, accepts): (Capability, &'static [Capability]) = match self {
            Self::Parent => (C::Child, &[C::Container]),
            Self::Children => (C::Container, &[C::Child]),
            Self::Properties => (C::PropertyHolder, &[C::Property]),
            Self::PropertyUsers => (C::Property, &[C::PropertyHolder]),
            Self::ExtraData => (C::ExtraDataHolder, &[C::ExtraData]),
            Self::ExtraDataUsers => (C::ExtraData, &[C::ExtraDataHolder]),
            Self::Controller => (C::Controllable, &[C::Controller]),
            Self::ControllerTarget => (C::Controller, &[C::Controllable]),
            Self::NextController => (C::ChainHead, &[C::ChainTail]),
            Self::PreviousController => (C::ChainTail, &[C::ChainHead]),
            Self::Modifiers => (C::ModifierHost, &[C::Modifier]),
            Self::ModifierSystem => (C::Modifier, &[C::ModifierHost]),
            Self::EmitterObject => (C::EmitterSource, &[C::Emissive]),
            Self::EmitterUsers => (C::Emissive, &[C::EmitterSource]),
            Self::Shader => (C::Shaded, &[C::Shader]),
            Self::ShaderUsers => (C::Shader, &[C::Shaded]),
            Self::Data => (C::DataHost, &[C::ParticleData]),
            Self::DataOwner => (C::ParticleData, &[C::DataHost]),
        };
        Role { produces, accepts }
    }

    /// Slot found on the other side of a well-formed link
    pub fn counterpart(self) -> Slot {
        match self {
            Self::Parent => Self::Children,
            Self::Children => Self::Parent,
            Self::Properties => Self::PropertyUsers,
            Self::PropertyUsers => Self::Properties,
            Self::ExtraData => Self::ExtraDataUsers,
            Self::ExtraDataUsers => Self::ExtraData,
            Self::Controller => Self::ControllerTarget,
            Self::ControllerTarget => Self::Controller,
            Self::NextController => Self::PreviousController,
            Self::PreviousController => Self::NextController,
            Self::Modifiers => Self::ModifierSystem,
            Self::ModifierSystem => Self::Modifiers,
            Self::EmitterObject => Self::EmitterUsers,
            Self::EmitterUsers => Self::EmitterObject,
            Self::Shader => Self::ShaderUsers,
            Self::ShaderUsers => Self::Shader,
            Self::Data => Self::DataOwner,
            Self::DataOwner => Self::Data,
        }
    }

    /// Whether the object on this side stores the reference in the scene document
    pub fn holds_reference(self) -> bool {
        matches!(
            self,
            Self::Children
                | Self::Properties
                | Self::ExtraData
                | Self::Controller
                | Self::NextController
                | Self::Modifiers
                | Self::EmitterObject
                | Self::Shader
                | Self::Data
        )
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A link point on a node field
#[derive(Debug, Clone)]
pub struct Endpoint {
    slot: Slot,
    partners: IndexSet<EndpointId>,
}

impl Endpoint {
    /// Create an unconnected endpoint
    pub fn new(slot: Slot) -> Self {
        Self {
            slot,
            partners: IndexSet::new(),
        }
    }

    /// Slot of this endpoint
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Partner limit
    pub fn cardinality(&self) -> Cardinality {
        self.slot.cardinality()
    }

    /// Producer/consumer role
    pub fn role(&self) -> Role {
        self.slot.role()
    }

    /// Connected partners in the order they were linked
    pub fn partners(&self) -> impl Iterator<Item = EndpointId> + '_ {
        self.partners.iter().copied()
    }

    /// Number of connected partners
    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    /// Whether any partner is connected
    pub fn is_connected(&self) -> bool {
        !self.partners.is_empty()
    }

    /// Whether `other` is a partner
    pub fn is_connected_to(&self, other: EndpointId) -> bool {
        self.partners.contains(&other)
    }

    /// Type compatibility, checked in both directions
    pub fn can_connect(&self, other: &Endpoint) -> bool {
        self.role().accepts(other.role().produces) && other.role().accepts(self.role().produces)
    }

    /// Partners as they would be after `base` were applied
    pub(crate) fn effective_partners(&self, me: EndpointId, base: &StateMap) -> Vec<EndpointId> {
        let mut partners: Vec<EndpointId> = self
            .partners
            .iter()
            .copied()
            .filter(|p| base.get(EndpointPair::new(me, *p)) != Some(false))
            .collect();

        for (pair, connect) in base.iter() {
            if !connect {
                continue;
            }
            if let Some(other) = pair.other(me) {
                if !partners.contains(&other) {
                    partners.push(other);
                }
            }
        }
        partners
    }

    /// This side's share of the diff for linking or unlinking `other`,
    /// computed against the state after `base`.
    pub(crate) fn query_state_change(
        &self,
        me: EndpointId,
        other: EndpointId,
        connect: bool,
        base: &StateMap,
    ) -> StateMap {
        let partners = self.effective_partners(me, base);
        let connected = partners.contains(&other);
        let mut map = StateMap::new();

        if connect {
            if connected {
                return map;
            }
            if self.cardinality() == Cardinality::Single {
                for partner in partners {
                    map.set(EndpointPair::new(me, partner), false);
                }
            }
            map.set(EndpointPair::new(me, other), true);
        } else if connected {
            map.set(EndpointPair::new(me, other), false);
        }
        map
    }

    pub(crate) fn link(&mut self, other: EndpointId) -> bool {
        self.partners.insert(other)
    }

    /// Returns the position `other` held
    pub(crate) fn unlink(&mut self, other: EndpointId) -> Option<usize> {
        self.partners.shift_remove_full(&other).map(|(index, _)| index)
    }

    /// Move a current partner to `index`, clamped to the end
    pub(crate) fn move_partner(&mut self, other: EndpointId, index: usize) {
        if let Some(from) = self.partners.get_index_of(&other) {
            let to = index.min(self.partners.len() - 1);
            self.partners.move_index(from, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_SLOTS: [Slot; 18] = [
        Slot::Parent,
        Slot::Children,
        Slot::Properties,
        Slot::PropertyUsers,
        Slot::ExtraData,
        Slot::ExtraDataUsers,
        Slot::Controller,
        Slot::ControllerTarget,
        Slot::NextController,
        Slot::PreviousController,
        Slot::Modifiers,
        Slot::ModifierSystem,
        Slot::EmitterObject,
        Slot::EmitterUsers,
        Slot::Shader,
        Slot::ShaderUsers,
        Slot::Data,
        Slot::DataOwner,
    ];

    fn id(node: u32, field: usize) -> EndpointId {
        EndpointId::new(NodeId(node), field)
    }

    #[test]
    fn test_counterparts_connect() {
        for slot in ALL_SLOTS {
            let a = Endpoint::new(slot);
            let b = Endpoint::new(slot.counterpart());
            assert!(a.can_connect(&b), "{slot} should accept {}", slot.counterpart());
            assert_eq!(slot.counterpart().counterpart(), slot);
            assert_ne!(slot.holds_reference(), slot.counterpart().holds_reference());
        }
    }

    #[test]
    fn test_same_slot_rejected() {
        for slot in ALL_SLOTS {
            assert!(!Endpoint::new(slot).can_connect(&Endpoint::new(slot)));
        }
    }

    #[test]
    fn test_compatibility_is_checked_both_ways() {
        // A modifier's system side offers what a host wants, but a host never
        // accepts a data block.
        let modifiers = Endpoint::new(Slot::Modifiers);
        let data_owner = Endpoint::new(Slot::DataOwner);
        assert!(!modifiers.can_connect(&data_owner));
        assert!(!data_owner.can_connect(&modifiers));
        assert!(!Endpoint::new(Slot::Parent).can_connect(&Endpoint::new(Slot::Properties)));
    }

    #[test]
    fn test_single_query_displaces_partner() {
        let mut a = Endpoint::new(Slot::Parent);
        a.link(id(1, 1));

        let map = a.query_state_change(id(0, 1), id(2, 1), true, &StateMap::new());
        assert_eq!(map.get(EndpointPair::new(id(0, 1), id(1, 1))), Some(false));
        assert_eq!(map.get(EndpointPair::new(id(0, 1), id(2, 1))), Some(true));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_multi_query_touches_only_pair() {
        let mut a = Endpoint::new(Slot::Children);
        a.link(id(1, 0));

        let map = a.query_state_change(id(0, 2), id(2, 0), true, &StateMap::new());
        assert_eq!(map.len(), 1);
        assert!(a.query_state_change(id(0, 2), id(1, 0), true, &StateMap::new()).is_empty());
        assert!(a.query_state_change(id(0, 2), id(3, 0), false, &StateMap::new()).is_empty());
    }

    #[test]
    fn test_effective_partners_follow_base() {
        let mut a = Endpoint::new(Slot::Parent);
        a.link(id(1, 1));

        let mut base = StateMap::new();
        base.set(EndpointPair::new(id(0, 1), id(1, 1)), false);
        assert!(a.effective_partners(id(0, 1), &base).is_empty());

        // Relinking the detached partner is a fresh connect against the base
        let map = a.query_state_change(id(0, 1), id(1, 1), true, &base);
        assert_eq!(map.get(EndpointPair::new(id(0, 1), id(1, 1))), Some(true));
    }
}
