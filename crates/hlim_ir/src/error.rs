//! Error types for circuit construction.
//!
//! Every variant describes a circuit that cannot be built. Messages name the
//! offending node (by label) and port so they can be shown to the user as-is.

use crate::connection::ConnectionType;
use crate::ids::{ClockId, GroupId, NodeId};

/// Errors raised by the violating construction call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IrError {
    /// An input received a type that conflicts with what the node already requires.
    #[error("type conflict at input {port} ({port_name}) of {node}: expected {expected}, found {found}")]
    TypeConflict {
        /// Label of the node.
        node: String,
        /// Input port index.
        port: usize,
        /// Input port name.
        port_name: String,
        /// The type the port requires.
        expected: ConnectionType,
        /// The type that was offered.
        found: ConnectionType,
    },

    /// A connection would change an output type that consumers already rely on.
    #[error("output type of {node} is fixed by its consumers and cannot change from {current} to {requested}")]
    OutputTypeFixed {
        /// Label of the node.
        node: String,
        /// The current output type.
        current: ConnectionType,
        /// The type the connection would impose.
        requested: ConnectionType,
    },

    /// An input is wider than its kind can evaluate.
    #[error("unsupported width {width} at input {port} ({port_name}) of {node} (maximum {max})")]
    UnsupportedWidth {
        /// Label of the node.
        node: String,
        /// Input port index.
        port: usize,
        /// Input port name.
        port_name: String,
        /// The offered width.
        width: usize,
        /// The largest supported width.
        max: usize,
    },

    /// An input port index beyond the node's inputs.
    #[error("{node} has no input {port} ({count} inputs)")]
    InvalidInputPort {
        /// Label of the node.
        node: String,
        /// Requested port index.
        port: usize,
        /// Number of inputs of the node.
        count: usize,
    },

    /// An output port index beyond the node's outputs.
    #[error("{node} has no output {port} ({count} outputs)")]
    InvalidOutputPort {
        /// Label of the node.
        node: String,
        /// Requested port index.
        port: usize,
        /// Number of outputs of the node.
        count: usize,
    },

    /// A connection that is structurally invalid for the port.
    #[error("invalid connection at input {port} of {node}: {reason}")]
    InvalidConnection {
        /// Label of the node.
        node: String,
        /// Input port index.
        port: usize,
        /// Why the connection is invalid.
        reason: String,
    },

    /// A node ID that does not refer to a live node.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A clock ID that does not refer to a clock of this circuit.
    #[error("unknown clock {0}")]
    UnknownClock(ClockId),

    /// A group ID that does not refer to a group of this circuit.
    #[error("unknown group {0}")]
    UnknownGroup(GroupId),

    /// A register on a clock that neither resets nor initializes registers.
    #[error("register {node} is clocked by '{clock}', which has no reset and does not initialize registers")]
    MissingResetPolicy {
        /// Label of the register.
        node: String,
        /// Name of the clock.
        clock: String,
    },

    /// A clock slot index beyond the node's clock slots.
    #[error("{node} has no clock slot {slot}")]
    InvalidClockSlot {
        /// Label of the node.
        node: String,
        /// Requested slot.
        slot: usize,
    },

    /// A node that cannot be cloned.
    #[error("cannot clone {node}: {reason}")]
    CloneMisuse {
        /// Label of the node.
        node: String,
        /// Why cloning is refused.
        reason: String,
    },

    /// A node configuration that describes no valid hardware.
    #[error("invalid {kind} node: {reason}")]
    InvalidNode {
        /// Kind name.
        kind: String,
        /// What is wrong.
        reason: String,
    },

    /// A clock configuration that describes no valid clock.
    #[error("invalid clock '{name}': {reason}")]
    InvalidClock {
        /// Name of the clock.
        name: String,
        /// What is wrong.
        reason: String,
    },

    /// A group move that would make the group tree cyclic.
    #[error("cannot move {group} below its own descendant {target}")]
    GroupCycle {
        /// The group being moved.
        group: GroupId,
        /// The requested new parent.
        target: GroupId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_conflict_display() {
        let err = IrError::TypeConflict {
            node: "'sum' (node#3 Arithmetic(Add))".into(),
            port: 1,
            port_name: "b".into(),
            expected: ConnectionType::bit_vector(8),
            found: ConnectionType::bit_vector(4),
        };
        assert_eq!(
            err.to_string(),
            "type conflict at input 1 (b) of 'sum' (node#3 Arithmetic(Add)): expected UInt(8), found UInt(4)"
        );
    }

    #[test]
    fn unsupported_width_display() {
        let err = IrError::UnsupportedWidth {
            node: "node#2 Mux".into(),
            port: 0,
            port_name: "select".into(),
            width: 65,
            max: 64,
        };
        assert_eq!(
            err.to_string(),
            "unsupported width 65 at input 0 (select) of node#2 Mux (maximum 64)"
        );
    }

    #[test]
    fn missing_reset_policy_display() {
        let err = IrError::MissingResetPolicy {
            node: "node#1 Register".into(),
            clock: "clk".into(),
        };
        assert_eq!(
            err.to_string(),
            "register node#1 Register is clocked by 'clk', which has no reset and does not initialize registers"
        );
    }

    #[test]
    fn unknown_ids_display() {
        assert_eq!(IrError::UnknownNode(NodeId::from_raw(9)).to_string(), "unknown node node#9");
        assert_eq!(IrError::UnknownClock(ClockId::from_raw(1)).to_string(), "unknown clock clock#1");
    }

    #[test]
    fn clone_misuse_display() {
        let err = IrError::CloneMisuse {
            node: "'a' (node#0 InputPin)".into(),
            reason: "pins are part of the circuit interface".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot clone 'a' (node#0 InputPin): pins are part of the circuit interface"
        );
    }
}
