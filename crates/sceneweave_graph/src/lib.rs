// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph construction and live connection editing for `SceneWeave`.
//!
//! This crate keeps two graphs in step under arbitrary user edits:
//! - the externally owned scene object model ([`scene`])
//! - the editable node graph built from it ([`graph`], [`registry`])
//!
//! ## Architecture
//!
//! - [`importer`] walks a [`SceneDocument`] once, creating one editor node per
//!   recognised object and resolving references through a deferred request list
//! - [`registry`] enforces which endpoints may link, computes minimal
//!   [`StateMap`] diffs and keeps the incidence record
//! - [`history`] defers every mutation to a single flush per frame and keeps a
//!   bounded undo/redo list
//! - [`binding`] writes graph edits back into the object model

pub mod binding;
pub mod cell;
pub mod command;
pub mod diagnostics;
pub mod endpoint;
pub mod graph;
pub mod history;
pub mod importer;
pub mod node;
pub mod registry;
pub mod scene;
pub mod session;
pub mod state;
pub mod value;

pub use binding::ModelBinding;
pub use cell::{ObservableCell, Signal, Subscription};
pub use command::{
    AddNodeCommand, CommandError, GraphCommand, RemoveNodeCommand, SetConnectionsCommand,
    SetPropertyCommand,
};
pub use diagnostics::Diagnostics;
pub use endpoint::{Capability, Cardinality, Endpoint, EndpointId, Role, Slot};
pub use graph::Graph;
pub use history::{CommandQueue, FlushReport, HistoryError, HistoryStats};
pub use importer::{import, import_or_empty, ImportError, ImportResult};
pub use node::{EditorNode, Field, NodeId, NodeKind};
pub use registry::{ChangeEnd, ConnectionChange, ConnectionRegistry, LinkOrder};
pub use scene::{ObjectBody, ObjectId, ReferenceEdit, SceneDocument, SceneError, SceneObject};
pub use session::{EditorSession, SessionConfig};
pub use state::{EndpointPair, StateMap};
pub use value::PropertyValue;
