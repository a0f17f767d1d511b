//! The closed set of node kinds and their per-kind metadata.
//!
//! A [`NodeKind`] fixes a node's port layout: how many inputs, outputs and
//! clock slots it has, which inputs determine the output type, which input
//! widths are bounded, and how its outputs behave over time. Simulation
//! behavior lives in `hlim_sim`, keyed by the same enum.

use crate::connection::{ConnectionType, Interpretation};
use hlim_common::BitState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Port and internal-state indices of [`NodeKind::Register`].
pub mod register {
    /// Data captured on the active clock edge.
    pub const DATA: usize = 0;
    /// Value loaded on reset and at power-on.
    pub const RESET_VALUE: usize = 1;
    /// Capture enable, enabled when unconnected.
    pub const ENABLE: usize = 2;

    /// Internal slot holding the data latched during evaluation.
    pub const INT_DATA: usize = 0;
    /// Internal slot holding the enable latched during evaluation.
    pub const INT_ENABLE: usize = 1;
    /// Internal slot holding whether the clock is in reset.
    pub const INT_IN_RESET: usize = 2;
}

/// Port and internal-state indices of [`NodeKind::MemPort`].
pub mod mem_port {
    /// Dependency edge from the [`Memory`](super::NodeKind::Memory) node.
    pub const MEMORY: usize = 0;
    /// Port enable, enabled when unconnected.
    pub const ENABLE: usize = 1;
    /// Write enable, reads only when unconnected.
    pub const WR_ENABLE: usize = 2;
    /// Word address.
    pub const ADDRESS: usize = 3;
    /// Data to write.
    pub const WR_DATA: usize = 4;

    /// Read data output.
    pub const RD_DATA: usize = 0;

    /// Internal slot holding the latched write request.
    pub const INT_WRITE: usize = 0;
    /// Internal slot holding the latched address.
    pub const INT_ADDRESS: usize = 1;
    /// Internal slot holding the latched write data.
    pub const INT_DATA: usize = 2;
}

/// Port indices of [`NodeKind::SignalTap`].
pub mod signal_tap {
    /// The trigger condition. Ignored for [`TapTrigger::Always`](super::TapTrigger::Always).
    pub const TRIGGER: usize = 0;
    /// First input whose value can be interpolated into the message.
    pub const FIRST_VALUE: usize = 1;
}

/// Bitwise logic operations.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum LogicOp {
    /// Bitwise AND.
    And,
    /// Bitwise NAND.
    Nand,
    /// Bitwise OR.
    Or,
    /// Bitwise NOR.
    Nor,
    /// Bitwise XOR.
    Xor,
    /// Bitwise equivalence (XNOR).
    Eq,
    /// Bitwise inversion, the only unary operation.
    Not,
}

/// Unsigned comparison operations producing a boolean.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Not equal.
    Neq,
    /// Less than.
    Lt,
    /// Greater than.
    Gt,
    /// Less than or equal.
    Leq,
    /// Greater than or equal.
    Geq,
}

/// Wrapping unsigned arithmetic.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ArithmeticOp {
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Division. Division by zero yields X.
    Div,
    /// Remainder. Remainder by zero yields X.
    Rem,
}

/// Direction of a [`NodeKind::Shift`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ShiftDirection {
    /// Towards the most significant bit.
    Left,
    /// Towards the least significant bit.
    Right,
}

/// What a [`NodeKind::Shift`] shifts in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ShiftFill {
    /// Zeros.
    Zero,
    /// Ones.
    One,
    /// Copies of the bit at the end being vacated (sign extension for right shifts).
    Last,
    /// The bits shifted out at the other end.
    Rotate,
}

/// Where a [`RewireRange`] takes its bits from.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum RewireSource {
    /// A slice of an input starting at `offset`.
    Input {
        /// Input port index.
        input: usize,
        /// First bit of the slice.
        offset: usize,
    },
    /// Constant zeros.
    ConstZero,
    /// Constant ones.
    ConstOne,
}

/// One contiguous piece of a [`NodeKind::Rewire`] output, least significant first.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct RewireRange {
    /// Source of the bits.
    pub source: RewireSource,
    /// Number of bits.
    pub width: usize,
}

/// Severity of a [`NodeKind::SignalTap`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TapLevel {
    /// Reported through `on_assert`.
    Assert,
    /// Reported through `on_warning`.
    Warn,
    /// Reported through `on_debug_message`.
    Debug,
}

/// When a [`NodeKind::SignalTap`] fires.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum TapTrigger {
    /// On every commit.
    Always,
    /// While the trigger input is high.
    WhenHigh,
    /// While the trigger input is low (assertions fire when their condition fails).
    WhenLow,
}

/// A piece of a signal tap message.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum MessagePart {
    /// Literal text.
    Text(String),
    /// The current value of value input `n` (counted from [`signal_tap::FIRST_VALUE`]).
    Value(usize),
}

/// How an output's value relates to time, used for ordering and domain inference.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum OutputTiming {
    /// Follows the node's inputs within the same delta cycle.
    Immediate,
    /// Held in state and only changed by clock edges, resets or tasks.
    Latched,
    /// Never changes after power-on.
    Constant,
}

/// The kind of a node, fixing its port layout and semantics.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NodeKind {
    /// Pass-through wire. Not evaluated; simulation aliases its driver.
    Signal,
    /// Constant value source.
    Constant {
        /// The value, possibly containing undefined bits.
        value: BitState,
        /// Interpretation of the output.
        interpretation: Interpretation,
    },
    /// Bitwise logic.
    Logic(LogicOp),
    /// Unsigned comparison.
    Compare(CompareOp),
    /// Wrapping arithmetic.
    Arithmetic(ArithmeticOp),
    /// Selects one of `data_inputs` inputs by the value of input 0.
    Multiplexer {
        /// Number of data inputs following the selector.
        data_inputs: usize,
    },
    /// Concatenation of input slices and constant bits.
    Rewire {
        /// Number of inputs.
        inputs: usize,
        /// Output pieces, least significant first.
        ranges: Vec<RewireRange>,
    },
    /// Shift of input 0 by the unsigned amount on input 1.
    Shift {
        /// Shift direction.
        direction: ShiftDirection,
        /// Fill mode.
        fill: ShiftFill,
    },
    /// Clocked register with reset value and enable.
    Register,
    /// Input of the circuit, driven by simulation tasks.
    InputPin {
        /// Type of the pin.
        ty: ConnectionType,
    },
    /// Output of the circuit, observed by simulation tasks.
    OutputPin,
    /// Word-addressed storage, accessed through [`NodeKind::MemPort`] nodes.
    Memory {
        /// Number of words.
        depth: usize,
        /// Bits per word.
        word_width: usize,
        /// Power-on content. Undefined when absent.
        init: Option<BitState>,
    },
    /// Read/write port of a memory. Reads are combinational, writes happen on the clock edge.
    MemPort {
        /// Bits per word, matching the memory.
        word_width: usize,
    },
    /// Pass-through marking an intentional clock-domain crossing.
    CdcMarker,
    /// Simulation-time assertion, warning or debug message.
    SignalTap {
        /// Severity.
        level: TapLevel,
        /// Trigger condition.
        trigger: TapTrigger,
        /// Message pieces.
        message: Vec<MessagePart>,
        /// Number of value inputs available to the message.
        values: usize,
    },
}

impl NodeKind {
    /// Number of input ports.
    pub fn num_inputs(&self) -> usize {
        match self {
            NodeKind::Constant { .. } | NodeKind::InputPin { .. } | NodeKind::Memory { .. } => 0,
            NodeKind::Signal | NodeKind::CdcMarker | NodeKind::OutputPin => 1,
            NodeKind::Logic(LogicOp::Not) => 1,
            NodeKind::Logic(_)
            | NodeKind::Compare(_)
            | NodeKind::Arithmetic(_)
            | NodeKind::Shift { .. } => 2,
            NodeKind::Multiplexer { data_inputs } => 1 + data_inputs,
            NodeKind::Rewire { inputs, .. } => *inputs,
            NodeKind::Register => 3,
            NodeKind::MemPort { .. } => 5,
            NodeKind::SignalTap { values, .. } => 1 + values,
        }
    }

    /// Number of output ports.
    pub fn num_outputs(&self) -> usize {
        match self {
            NodeKind::OutputPin | NodeKind::SignalTap { .. } => 0,
            _ => 1,
        }
    }

    /// Number of clock slots.
    pub fn num_clocks(&self) -> usize {
        match self {
            NodeKind::Register | NodeKind::MemPort { .. } => 1,
            _ => 0,
        }
    }

    /// Returns `true` for pure pass-through wires.
    pub fn is_signal(&self) -> bool {
        matches!(self, NodeKind::Signal)
    }

    /// Returns `true` for kinds whose output type may change after consumers attach.
    pub fn may_retype(&self) -> bool {
        matches!(self, NodeKind::Signal | NodeKind::CdcMarker)
    }

    /// Output type of a freshly created node.
    ///
    /// Kinds whose type follows their inputs start as a zero-width vector.
    pub fn initial_output_type(&self, port: usize) -> ConnectionType {
        debug_assert!(port < self.num_outputs());
        match self {
            NodeKind::Constant {
                value,
                interpretation,
            } => ConnectionType {
                width: value.size(),
                interpretation: *interpretation,
            },
            NodeKind::Compare(_) => ConnectionType::boolean(),
            NodeKind::Rewire { ranges, .. } => {
                ConnectionType::bit_vector(ranges.iter().map(|r| r.width).sum())
            }
            NodeKind::InputPin { ty } => *ty,
            NodeKind::Memory { .. } => ConnectionType::dependency(),
            NodeKind::MemPort { word_width } => ConnectionType::bit_vector(*word_width),
            _ => ConnectionType::bit_vector(0),
        }
    }

    /// Inputs whose connected types must all be equal.
    pub fn agreeing_inputs(&self) -> Vec<usize> {
        match self {
            NodeKind::Signal | NodeKind::CdcMarker => vec![0],
            NodeKind::Logic(LogicOp::Not) => vec![0],
            NodeKind::Logic(_) | NodeKind::Compare(_) | NodeKind::Arithmetic(_) => vec![0, 1],
            NodeKind::Multiplexer { data_inputs } => (1..=*data_inputs).collect(),
            NodeKind::Register => vec![register::DATA, register::RESET_VALUE],
            NodeKind::Shift { .. } => vec![0],
            _ => Vec::new(),
        }
    }

    /// Returns `true` if output 0 takes the type of the agreeing inputs.
    pub fn type_follows_inputs(&self) -> bool {
        !matches!(
            self,
            NodeKind::Compare(_)
                | NodeKind::Constant { .. }
                | NodeKind::Rewire { .. }
                | NodeKind::InputPin { .. }
                | NodeKind::OutputPin
                | NodeKind::Memory { .. }
                | NodeKind::MemPort { .. }
                | NodeKind::SignalTap { .. }
        )
    }

    /// Maximum width accepted on an input, for inputs evaluated as a single machine word.
    pub fn max_input_width(&self, port: usize) -> Option<usize> {
        match (self, port) {
            (NodeKind::Multiplexer { .. }, 0) => Some(64),
            (NodeKind::Shift { .. }, 1) => Some(64),
            (NodeKind::MemPort { .. }, mem_port::ADDRESS) => Some(64),
            (
                NodeKind::Arithmetic(ArithmeticOp::Mul | ArithmeticOp::Div | ArithmeticOp::Rem),
                _,
            ) => Some(64),
            _ => None,
        }
    }

    /// Returns `true` if the input must carry exactly one bit.
    pub fn requires_single_bit(&self, port: usize) -> bool {
        match (self, port) {
            (NodeKind::Register, register::ENABLE) => true,
            (NodeKind::MemPort { .. }, mem_port::ENABLE | mem_port::WR_ENABLE) => true,
            (NodeKind::SignalTap { trigger, .. }, signal_tap::TRIGGER) => {
                *trigger != TapTrigger::Always
            }
            _ => false,
        }
    }

    /// Returns `true` if the input must be a dependency edge rather than a value.
    pub fn expects_dependency(&self, port: usize) -> bool {
        matches!((self, port), (NodeKind::MemPort { .. }, mem_port::MEMORY))
    }

    /// Timing class of an output.
    pub fn output_timing(&self, port: usize) -> OutputTiming {
        debug_assert!(port < self.num_outputs());
        match self {
            NodeKind::Constant { .. } => OutputTiming::Constant,
            NodeKind::Register | NodeKind::InputPin { .. } | NodeKind::Memory { .. } => {
                OutputTiming::Latched
            }
            _ => OutputTiming::Immediate,
        }
    }

    /// Short human-readable kind name.
    pub fn type_name(&self) -> String {
        match self {
            NodeKind::Signal => "Signal".into(),
            NodeKind::Constant { .. } => "Const".into(),
            NodeKind::Logic(op) => format!("Logic({op:?})"),
            NodeKind::Compare(op) => format!("Compare({op:?})"),
            NodeKind::Arithmetic(op) => format!("Arithmetic({op:?})"),
            NodeKind::Multiplexer { .. } => "Mux".into(),
            NodeKind::Rewire { .. } => "Rewire".into(),
            NodeKind::Shift { direction, .. } => format!("Shift({direction:?})"),
            NodeKind::Register => "Register".into(),
            NodeKind::InputPin { .. } => "InputPin".into(),
            NodeKind::OutputPin => "OutputPin".into(),
            NodeKind::Memory { .. } => "Memory".into(),
            NodeKind::MemPort { .. } => "MemPort".into(),
            NodeKind::CdcMarker => "CdcMarker".into(),
            NodeKind::SignalTap { level, .. } => format!("SignalTap({level:?})"),
        }
    }

    /// Name of an input port, for diagnostics.
    pub fn input_name(&self, port: usize) -> String {
        match (self, port) {
            (NodeKind::Multiplexer { .. }, 0) => "select".into(),
            (NodeKind::Multiplexer { .. }, n) => format!("in_{}", n - 1),
            (NodeKind::Shift { .. }, 0) => "operand".into(),
            (NodeKind::Shift { .. }, _) => "amount".into(),
            (NodeKind::Register, register::DATA) => "data_in".into(),
            (NodeKind::Register, register::RESET_VALUE) => "reset_value".into(),
            (NodeKind::Register, _) => "enable".into(),
            (NodeKind::MemPort { .. }, mem_port::MEMORY) => "memory".into(),
            (NodeKind::MemPort { .. }, mem_port::ENABLE) => "enable".into(),
            (NodeKind::MemPort { .. }, mem_port::WR_ENABLE) => "wr_enable".into(),
            (NodeKind::MemPort { .. }, mem_port::ADDRESS) => "address".into(),
            (NodeKind::MemPort { .. }, _) => "wr_data".into(),
            (NodeKind::SignalTap { .. }, signal_tap::TRIGGER) => "trigger".into(),
            (NodeKind::SignalTap { .. }, n) => format!("value_{}", n - signal_tap::FIRST_VALUE),
            (NodeKind::Logic(LogicOp::Not), _) => "in".into(),
            (NodeKind::Logic(_) | NodeKind::Compare(_) | NodeKind::Arithmetic(_), 0) => "a".into(),
            (NodeKind::Logic(_) | NodeKind::Compare(_) | NodeKind::Arithmetic(_), _) => "b".into(),
            (_, n) => format!("in_{n}"),
        }
    }

    /// Name of an output port, for diagnostics.
    pub fn output_name(&self, port: usize) -> String {
        match self {
            NodeKind::Register => "data_out".into(),
            NodeKind::MemPort { .. } => "rd_data".into(),
            NodeKind::Memory { .. } => "memory".into(),
            NodeKind::Compare(_) => "result".into(),
            _ => format!("out_{port}"),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_counts() {
        assert_eq!(NodeKind::Logic(LogicOp::Not).num_inputs(), 1);
        assert_eq!(NodeKind::Logic(LogicOp::And).num_inputs(), 2);
        assert_eq!(NodeKind::Multiplexer { data_inputs: 4 }.num_inputs(), 5);
        assert_eq!(NodeKind::Register.num_inputs(), 3);
        assert_eq!(NodeKind::Register.num_clocks(), 1);
        assert_eq!(NodeKind::OutputPin.num_outputs(), 0);
        assert_eq!(NodeKind::MemPort { word_width: 8 }.num_inputs(), 5);
    }

    #[test]
    fn rewire_width_is_sum_of_ranges() {
        let kind = NodeKind::Rewire {
            inputs: 1,
            ranges: vec![
                RewireRange {
                    source: RewireSource::Input { input: 0, offset: 2 },
                    width: 3,
                },
                RewireRange {
                    source: RewireSource::ConstOne,
                    width: 2,
                },
            ],
        };
        assert_eq!(kind.initial_output_type(0), ConnectionType::bit_vector(5));
        assert!(!kind.type_follows_inputs());
    }

    #[test]
    fn compare_outputs_bool() {
        let kind = NodeKind::Compare(CompareOp::Lt);
        assert_eq!(kind.initial_output_type(0), ConnectionType::boolean());
        assert_eq!(kind.agreeing_inputs(), vec![0, 1]);
    }

    #[test]
    fn timing_classes() {
        assert_eq!(NodeKind::Register.output_timing(0), OutputTiming::Latched);
        assert_eq!(
            NodeKind::MemPort { word_width: 4 }.output_timing(0),
            OutputTiming::Immediate
        );
        let constant = NodeKind::Constant {
            value: BitState::from_u64(1, 1),
            interpretation: Interpretation::Boolean,
        };
        assert_eq!(constant.output_timing(0), OutputTiming::Constant);
    }

    #[test]
    fn width_limits() {
        assert_eq!(NodeKind::Multiplexer { data_inputs: 2 }.max_input_width(0), Some(64));
        assert_eq!(NodeKind::Multiplexer { data_inputs: 2 }.max_input_width(1), None);
        assert_eq!(NodeKind::Arithmetic(ArithmeticOp::Add).max_input_width(0), None);
        assert_eq!(NodeKind::Arithmetic(ArithmeticOp::Mul).max_input_width(1), Some(64));
    }

    #[test]
    fn names() {
        assert_eq!(NodeKind::Register.input_name(register::ENABLE), "enable");
        assert_eq!(NodeKind::Multiplexer { data_inputs: 2 }.input_name(2), "in_1");
        assert_eq!(NodeKind::Logic(LogicOp::Xor).to_string(), "Logic(Xor)");
    }
}
