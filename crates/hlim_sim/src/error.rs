//! Simulation error types.
//!
//! Errors raised while compiling a circuit for simulation or while running
//! it. Undefined values are never errors; they propagate as X.

use crate::time::SimTime;
use hlim_config::ConfigError;
use hlim_ir::IrError;

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The combinational part of the circuit contains a cycle.
    #[error("combinational loop through {node}")]
    CombinationalLoop {
        /// Label of a node on the loop.
        node: String,
    },

    /// Too many evaluation rounds at one instant.
    #[error("delta cycle limit exceeded at {time} (max {max} rounds)")]
    DeltaCycleLimit {
        /// The instant at which the limit was hit.
        time: SimTime,
        /// The configured limit.
        max: u32,
    },

    /// A check in a simulation task failed.
    #[error("assertion failed at {time}: {message}")]
    AssertionFailed {
        /// Simulated time of the failure.
        time: SimTime,
        /// The failure message.
        message: String,
    },

    /// A task tried to drive something that is not an input pin.
    #[error("{node} is not an input pin")]
    InvalidPin {
        /// Label of the node.
        node: String,
    },

    /// A value of the wrong width was written to a pin.
    #[error("width mismatch on {node}: expected {expected} bits, found {found}")]
    WidthMismatch {
        /// Label of the pin.
        node: String,
        /// The pin width.
        expected: usize,
        /// The width of the offered value.
        found: usize,
    },

    /// A task read an output port that does not exist.
    #[error("no such output port: {port}")]
    UnknownOutput {
        /// The requested port.
        port: String,
    },

    /// A task tried to override something that is not a register.
    #[error("{node} is not a register")]
    NotARegister {
        /// Label of the node.
        node: String,
    },

    /// A circuit edit made by a pass was rejected.
    #[error("invalid circuit: {0}")]
    Circuit(#[from] IrError),

    /// The simulation settings could not be converted.
    #[error("invalid simulation configuration: {0}")]
    Config(#[from] ConfigError),
}
