//! HLIM: the graph intermediate representation of a circuit.
//!
//! A [`Circuit`] owns every [`Node`], [`Clock`] and [`NodeGroup`] in arenas
//! keyed by stable IDs. Nodes are typed by the closed [`NodeKind`] enum and
//! connected through [`NodePort`]s; connection types are checked on every
//! edit so that an invalid circuit is rejected at the call that would build it.

#![warn(missing_docs)]

pub mod arena;
pub mod circuit;
pub mod clock;
pub mod connection;
pub mod construct;
pub mod error;
pub mod group;
pub mod ids;
pub mod kind;
pub mod node;
pub mod passes;

pub use arena::{Arena, ArenaId};
pub use circuit::Circuit;
pub use clock::{
    Clock, ClockConfig, ClockSource, DerivedClockConfig, ResetActive, ResetKind, ResetPolicy,
    TriggerEdge,
};
pub use connection::{ConnectionType, Interpretation, NodePort};
pub use error::IrError;
pub use group::{GroupKind, NodeGroup};
pub use ids::{ClockId, GroupId, NodeId};
pub use kind::{
    ArithmeticOp, CompareOp, LogicOp, MessagePart, NodeKind, OutputTiming, RewireRange,
    RewireSource, ShiftDirection, ShiftFill, TapLevel, TapTrigger,
};
pub use node::{Node, OutputPort};
