//! Signal types and port endpoints.
//!
//! A [`ConnectionType`] describes what travels along an edge of the graph:
//! a width plus an interpretation tag. A [`NodePort`] names one endpoint of
//! such an edge by node ID and port index.

use crate::ids::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the bits of a connection are to be read.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Interpretation {
    /// A single boolean bit.
    Boolean,
    /// An unsigned bit vector.
    BitVector,
    /// An ordering edge that carries no value.
    StructuralDependencyOnly,
}

/// The width and interpretation of a signal.
///
/// Two types are equal only if both width and interpretation match.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ConnectionType {
    /// Number of bits.
    pub width: usize,
    /// How the bits are interpreted.
    pub interpretation: Interpretation,
}

impl ConnectionType {
    /// A single boolean bit.
    pub const fn boolean() -> Self {
        Self {
            width: 1,
            interpretation: Interpretation::Boolean,
        }
    }

    /// An unsigned bit vector of the given width.
    pub const fn bit_vector(width: usize) -> Self {
        Self {
            width,
            interpretation: Interpretation::BitVector,
        }
    }

    /// A value-less dependency edge.
    pub const fn dependency() -> Self {
        Self {
            width: 0,
            interpretation: Interpretation::StructuralDependencyOnly,
        }
    }

    /// Returns `true` for dependency-only edges.
    pub fn is_dependency(&self) -> bool {
        self.interpretation == Interpretation::StructuralDependencyOnly
    }

    /// Returns `true` for a boolean or a one-bit vector.
    pub fn is_single_bit(&self) -> bool {
        self.width == 1 && !self.is_dependency()
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.interpretation {
            Interpretation::Boolean => write!(f, "BOOL"),
            Interpretation::BitVector => write!(f, "UInt({})", self.width),
            Interpretation::StructuralDependencyOnly => write!(f, "DEPENDENCY"),
        }
    }
}

/// One endpoint of a graph edge: a port index on a node.
///
/// Whether the index names an input or an output depends on context. An
/// unconnected input is represented as `Option<NodePort>::None`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodePort {
    /// The node.
    pub node: NodeId,
    /// The port index on that node.
    pub port: usize,
}

impl NodePort {
    /// Creates a new port reference.
    pub fn new(node: NodeId, port: usize) -> Self {
        Self { node, port }
    }

    /// Output or input 0 of `node`, the common case for single-output kinds.
    pub fn first(node: NodeId) -> Self {
        Self { node, port: 0 }
    }
}

impl fmt::Display for NodePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}
