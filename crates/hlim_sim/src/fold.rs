//! Constant propagation.
//!
//! Folding runs the simulator's own node behaviors on a scratch state, so a
//! folded output has exactly the value simulation would compute.

use crate::callbacks::NullCallbacks;
use crate::error::SimError;
use crate::eval::{behavior, NodeIo};
use crate::program::{MappedNode, Slot};
use hlim_common::{BitState, WORD_BITS};
use hlim_ir::kind::register;
use hlim_ir::{Circuit, Node, NodeId, NodeKind, NodePort, ResetPolicy};
use tracing::debug;

/// Kinds whose outputs depend only on their current inputs.
fn is_foldable(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Logic(_)
            | NodeKind::Compare(_)
            | NodeKind::Arithmetic(_)
            | NodeKind::Shift { .. }
            | NodeKind::Multiplexer { .. }
            | NodeKind::Rewire { .. }
    )
}

fn constant_value(circuit: &Circuit, port: Option<NodePort>) -> Option<&BitState> {
    match circuit.node(port?.node).kind() {
        NodeKind::Constant { value, .. } => Some(value),
        _ => None,
    }
}

/// The constant data driver of a register that always outputs it.
///
/// That holds when it captures on every edge and its reset value, if any,
/// is the same constant.
fn register_is_constant(circuit: &Circuit, reg: NodeId) -> Option<NodePort> {
    let data_port = circuit.non_signal_driver(reg, register::DATA)?;
    let data = constant_value(circuit, Some(data_port))?;
    if let Some(reset) = circuit.non_signal_driver(reg, register::RESET_VALUE) {
        let reset = constant_value(circuit, Some(reset))?;
        if reset.size() != data.size() || !reset.equal_range(0, data, 0, data.size()) {
            return None;
        }
    }
    if let Some(enable) = circuit.non_signal_driver(reg, register::ENABLE) {
        if constant_value(circuit, Some(enable))?.to_u64() != Some(1) {
            return None;
        }
    }
    Some(data_port)
}

fn aligned(next: &mut usize, width: usize) -> Slot {
    let slot = Slot {
        offset: *next,
        width,
    };
    *next += width.div_ceil(WORD_BITS).max(1) * WORD_BITS;
    slot
}

/// Evaluates `node` with constant inputs loaded and every other input
/// undefined. Returns the fully defined outputs.
fn evaluate_outputs(circuit: &Circuit, node: &Node) -> Vec<(usize, BitState)> {
    let mut next = 0;
    let mut constants = Vec::new();
    let inputs = (0..node.num_inputs())
        .map(|port| {
            let driver = circuit.non_signal_driver(node.id(), port)?;
            let slot = aligned(&mut next, circuit.output_type(driver)?.width);
            if let Some(value) = constant_value(circuit, Some(driver)) {
                constants.push((slot, value));
            }
            Some(slot)
        })
        .collect();
    let outputs = (0..node.num_outputs())
        .map(|port| aligned(&mut next, node.output_type(port).width))
        .collect();
    let slots = MappedNode {
        node: node.id(),
        internal: Vec::new(),
        inputs,
        outputs,
    };

    let mut state = BitState::new(next);
    for (slot, value) in constants {
        state.copy_range(slot.offset, value, 0, slot.width.min(value.size()));
    }
    behavior(node.kind()).evaluate(&mut NodeIo {
        state: &mut state,
        callbacks: &mut NullCallbacks,
        node,
        slots: &slots,
        reset: ResetPolicy::default(),
    });

    slots
        .outputs
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.width > 0 && state.all_defined(slot.offset, slot.width))
        .map(|(port, slot)| (port, state.extract_state(slot.offset, slot.width)))
        .collect()
}

/// Replaces combinational logic driven only by constants with constants.
///
/// Starting from every constant, consumers whose outputs become fully defined
/// are evaluated and their consumers moved to a new constant in the same
/// group. Registers that always hold their constant input are bypassed.
/// Replaced nodes stay in the circuit without consumers for
/// [`Circuit::cull_unused_nodes`] to remove. Returns the number of outputs
/// replaced.
pub fn propagate_constants(circuit: &mut Circuit) -> Result<usize, SimError> {
    let mut open: Vec<NodePort> = circuit
        .nodes()
        .filter(|(_, node)| matches!(node.kind(), NodeKind::Constant { .. }))
        .map(|(id, _)| NodePort::first(id))
        .collect();
    let mut replaced = 0;

    while let Some(source) = open.pop() {
        let consumers: Vec<NodeId> = circuit.directly_driven(source).iter().map(|p| p.node).collect();
        for id in consumers {
            let node = circuit.node(id);
            if !node.has_consumers() {
                continue;
            }
            match node.kind() {
                NodeKind::Signal => open.push(NodePort::first(id)),
                NodeKind::Register => {
                    if let Some(data) = register_is_constant(circuit, id) {
                        circuit.bypass_output(NodePort::first(id), data)?;
                        replaced += 1;
                        open.push(data);
                    }
                }
                kind if is_foldable(kind) => {
                    let group = node.group();
                    for (port, value) in evaluate_outputs(circuit, node) {
                        let output = NodePort { node: id, port };
                        let interpretation = circuit.node(id).output_type(port).interpretation;
                        let constant = circuit.constant(group, value, interpretation)?;
                        circuit.bypass_output(output, constant)?;
                        replaced += 1;
                        open.push(constant);
                    }
                }
                _ => {}
            }
        }
    }

    if replaced > 0 {
        debug!(replaced, "propagated constants");
    }
    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlim_common::ClockRational;
    use hlim_ir::{ArithmeticOp, ClockConfig, ConnectionType, LogicOp};

    fn source_of(c: &Circuit, pin: NodeId) -> &NodeKind {
        let driver = c.non_signal_driver(pin, 0).unwrap();
        c.node(driver.node).kind()
    }

    #[test]
    fn folds_arithmetic_chain() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = c.constant_u64(root, 3, 8).unwrap();
        let b = c.constant_u64(root, 4, 8).unwrap();
        let sum = c.arithmetic(root, ArithmeticOp::Add, a, b).unwrap();
        let s = c.signal(root, "sum", Some(sum)).unwrap();
        let doubled = c.arithmetic(root, ArithmeticOp::Add, s, s).unwrap();
        let out = c.output_pin(root, "out", doubled).unwrap();

        let replaced = propagate_constants(&mut c).unwrap();
        assert_eq!(replaced, 2);
        assert!(matches!(source_of(&c, out), NodeKind::Constant { value, .. } if value.to_u64() == Some(14)));

        c.cull_unused_nodes();
        assert!(c.nodes().all(|(_, n)| !matches!(n.kind(), NodeKind::Arithmetic(_))));
    }

    #[test]
    fn keeps_logic_with_undefined_result() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let pin = c.input_pin(root, "in", ConnectionType::bit_vector(4)).unwrap();
        let k = c.constant_u64(root, 0b1010, 4).unwrap();
        let xor = c.logic(root, LogicOp::Xor, NodePort::first(pin), k).unwrap();
        let out = c.output_pin(root, "out", xor).unwrap();

        assert_eq!(propagate_constants(&mut c).unwrap(), 0);
        assert!(matches!(source_of(&c, out), NodeKind::Logic(LogicOp::Xor)));
    }

    #[test]
    fn bypasses_register_with_matching_reset() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = c
            .create_clock(ClockConfig::new("clk", ClockRational::from_integer(1_000_000)))
            .unwrap();
        let five = c.constant_u64(root, 5, 8).unwrap();
        let reset = c.constant_u64(root, 5, 8).unwrap();
        let held = c.register(root, clk, Some(five), Some(reset), None).unwrap();
        let out = c.output_pin(root, "held", NodePort::first(held)).unwrap();

        let other_reset = c.constant_u64(root, 0, 8).unwrap();
        let kept = c.register(root, clk, Some(five), Some(other_reset), None).unwrap();
        let out_kept = c.output_pin(root, "kept", NodePort::first(kept)).unwrap();

        assert_eq!(propagate_constants(&mut c).unwrap(), 1);
        assert_eq!(c.non_signal_driver(out, 0), Some(five));
        assert_eq!(c.non_signal_driver(out_kept, 0), Some(NodePort::first(kept)));
    }
}
