//! The circuit: exclusive owner of nodes, clocks and the group tree.
//!
//! All structural edits go through [`Circuit`] so that driver links on
//! inputs and consumer lists on outputs always agree. Every edit validates
//! first and mutates second, so a failed call leaves the circuit unchanged.

use crate::arena::Arena;
use crate::clock::Clock;
use crate::connection::{ConnectionType, NodePort};
use crate::error::IrError;
use crate::group::{GroupKind, NodeGroup};
use crate::ids::{ClockId, GroupId, NodeId};
use crate::kind::{mem_port, MessagePart, NodeKind, RewireSource};
use crate::node::Node;
use serde::{Deserialize, Serialize};

/// A complete circuit graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Circuit {
    pub(crate) nodes: Arena<NodeId, Node>,
    pub(crate) clocks: Arena<ClockId, Clock>,
    pub(crate) groups: Arena<GroupId, NodeGroup>,
    pub(crate) root: GroupId,
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

impl Circuit {
    /// Creates an empty circuit with a root group named `top`.
    pub fn new() -> Self {
        let mut circuit = Self {
            nodes: Arena::new(),
            clocks: Arena::new(),
            groups: Arena::new(),
            root: GroupId::from_raw(0),
        };
        circuit.root = circuit.new_group(None, GroupKind::Root, "top");
        circuit
    }

    /// Creates an unconnected node of the given kind in `group`.
    pub fn create_node(&mut self, group: GroupId, kind: NodeKind) -> Result<NodeId, IrError> {
        self.try_group(group)?;
        validate_kind(&kind)?;
        let id = self.nodes.alloc_with(|id| Node::new(id, kind, group));
        self.groups[group].nodes.push(id);
        Ok(id)
    }

    /// Returns the node, or an error for an unknown or removed ID.
    pub fn try_node(&self, id: NodeId) -> Result<&Node, IrError> {
        self.nodes.try_get(id).ok_or(IrError::UnknownNode(id))
    }

    /// Returns the node.
    ///
    /// # Panics
    ///
    /// Panics for an unknown or removed ID.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Returns `true` if the ID refers to a live node.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    /// Iterates over all live nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Sets the name of a node.
    pub fn set_node_name(&mut self, id: NodeId, name: &str) -> Result<(), IrError> {
        self.nodes
            .try_get_mut(id)
            .ok_or(IrError::UnknownNode(id))?
            .name = name.to_string();
        Ok(())
    }

    /// Sets the comment of a node.
    pub fn set_node_comment(&mut self, id: NodeId, comment: &str) -> Result<(), IrError> {
        self.nodes
            .try_get_mut(id)
            .ok_or(IrError::UnknownNode(id))?
            .comment = comment.to_string();
        Ok(())
    }

    /// Type of an output port, `None` if the port does not exist.
    pub fn output_type(&self, output: NodePort) -> Option<ConnectionType> {
        Some(self.nodes.try_get(output.node)?.outputs.get(output.port)?.ty)
    }

    /// The direct driver of an input, which may be a signal node.
    pub fn driver(&self, node: NodeId, port: usize) -> Option<NodePort> {
        self.nodes.try_get(node)?.driver(port)
    }

    /// Follows signal nodes from `output` back to the first real producer.
    ///
    /// Returns `None` if the chain ends at an undriven signal or loops.
    pub fn non_signal_source(&self, output: NodePort) -> Option<NodePort> {
        let mut current = output;
        let mut hops = 0;
        while self.nodes.try_get(current.node)?.kind.is_signal() {
            hops += 1;
            if hops > self.nodes.len() {
                return None;
            }
            current = self.nodes[current.node].driver(0)?;
        }
        Some(current)
    }

    /// The first non-signal producer feeding an input.
    pub fn non_signal_driver(&self, node: NodeId, port: usize) -> Option<NodePort> {
        self.non_signal_source(self.driver(node, port)?)
    }

    /// Inputs driven by an output, each listed once, in no particular order.
    pub fn directly_driven(&self, output: NodePort) -> &[NodePort] {
        self.nodes
            .try_get(output.node)
            .map_or(&[], |n| n.directly_driven(output.port))
    }

    /// Connects `driver` to an input, replacing any previous driver.
    pub fn connect_input(
        &mut self,
        node: NodeId,
        port: usize,
        driver: NodePort,
    ) -> Result<(), IrError> {
        let target = self.try_node(node)?;
        if port >= target.inputs.len() {
            return Err(IrError::InvalidInputPort {
                node: target.label(),
                port,
                count: target.inputs.len(),
            });
        }
        let source = self.try_node(driver.node)?;
        let Some(output) = source.outputs.get(driver.port) else {
            return Err(IrError::InvalidOutputPort {
                node: source.label(),
                port: driver.port,
                count: source.outputs.len(),
            });
        };
        let ty = output.ty;
        if target.kind.expects_dependency(port) {
            let matches_memory = match (&target.kind, &source.kind) {
                (
                    NodeKind::MemPort { word_width },
                    NodeKind::Memory {
                        word_width: mem_width,
                        ..
                    },
                ) => word_width == mem_width,
                _ => false,
            };
            if !matches_memory {
                return Err(IrError::InvalidConnection {
                    node: target.label(),
                    port,
                    reason: format!(
                        "expected a memory of matching word width, found {}",
                        source.label()
                    ),
                });
            }
        }
        if matches!(target.kind, NodeKind::MemPort { .. })
            && matches!(port, mem_port::WR_ENABLE | mem_port::WR_DATA)
            && target.clock().is_none()
        {
            return Err(IrError::InvalidConnection {
                node: target.label(),
                port,
                reason: "write inputs need a memory port with a clock".into(),
            });
        }
        self.check_input(target, port, ty)?;

        let mut plan = Vec::new();
        self.plan_input_type(node, port, ty, &mut plan)?;

        self.unlink_input(node, port);
        self.nodes[node].inputs[port] = Some(driver);
        self.nodes[driver.node].outputs[driver.port]
            .consumers
            .push(NodePort::new(node, port));
        for (id, new_ty) in plan {
            self.nodes[id].outputs[0].ty = new_ty;
        }
        Ok(())
    }

    /// Disconnects an input. Output types stay as they are.
    pub fn disconnect_input(&mut self, node: NodeId, port: usize) -> Result<(), IrError> {
        let target = self.try_node(node)?;
        if port >= target.inputs.len() {
            return Err(IrError::InvalidInputPort {
                node: target.label(),
                port,
                count: target.inputs.len(),
            });
        }
        self.unlink_input(node, port);
        Ok(())
    }

    fn unlink_input(&mut self, node: NodeId, port: usize) {
        if let Some(old) = self.nodes[node].inputs[port].take() {
            let consumer = NodePort::new(node, port);
            self.nodes[old.node].outputs[old.port]
                .consumers
                .retain(|c| *c != consumer);
        }
    }

    /// Kind-specific checks of a type offered to an input.
    fn check_input(&self, target: &Node, port: usize, ty: ConnectionType) -> Result<(), IrError> {
        let kind = &target.kind;
        let conflict = |expected: ConnectionType| IrError::TypeConflict {
            node: target.label(),
            port,
            port_name: kind.input_name(port),
            expected,
            found: ty,
        };
        if kind.expects_dependency(port) {
            if !ty.is_dependency() {
                return Err(conflict(ConnectionType::dependency()));
            }
            return Ok(());
        }
        if ty.is_dependency() {
            return Err(IrError::InvalidConnection {
                node: target.label(),
                port,
                reason: "a dependency edge carries no value".into(),
            });
        }
        if kind.requires_single_bit(port) && ty.width != 1 {
            return Err(conflict(ConnectionType::boolean()));
        }
        if let Some(max) = kind.max_input_width(port) {
            if ty.width > max {
                return Err(IrError::UnsupportedWidth {
                    node: target.label(),
                    port,
                    port_name: kind.input_name(port),
                    width: ty.width,
                    max,
                });
            }
        }
        match kind {
            NodeKind::MemPort { word_width }
                if port == mem_port::WR_DATA && ty.width != *word_width =>
            {
                Err(conflict(ConnectionType::bit_vector(*word_width)))
            }
            NodeKind::Rewire { ranges, .. } => {
                for range in ranges {
                    if let RewireSource::Input { input, offset } = range.source {
                        if input == port && offset + range.width > ty.width {
                            return Err(IrError::InvalidConnection {
                                node: target.label(),
                                port,
                                reason: format!(
                                    "slice {offset}..{} exceeds input width {}",
                                    offset + range.width,
                                    ty.width
                                ),
                            });
                        }
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// The type an input currently receives, honoring pending retypes.
    fn planned_type(&self, output: NodePort, plan: &[(NodeId, ConnectionType)]) -> ConnectionType {
        plan.iter()
            .find(|(id, _)| *id == output.node && output.port == 0)
            .map(|(_, ty)| *ty)
            .unwrap_or(self.nodes[output.node].outputs[output.port].ty)
    }

    /// Checks agreement with sibling inputs and plans output retypes.
    fn plan_input_type(
        &self,
        node: NodeId,
        port: usize,
        ty: ConnectionType,
        plan: &mut Vec<(NodeId, ConnectionType)>,
    ) -> Result<(), IrError> {
        let target = &self.nodes[node];
        let agreeing = target.kind.agreeing_inputs();
        if !agreeing.contains(&port) {
            return Ok(());
        }
        for other in agreeing.iter().copied().filter(|p| *p != port) {
            if let Some(driver) = target.inputs[other] {
                let other_ty = self.planned_type(driver, plan);
                if other_ty != ty {
                    return Err(IrError::TypeConflict {
                        node: target.label(),
                        port,
                        port_name: target.kind.input_name(port),
                        expected: other_ty,
                        found: ty,
                    });
                }
            }
        }
        if target.kind.type_follows_inputs() && target.outputs[0].ty != ty {
            self.plan_retype(node, ty, plan)?;
        }
        Ok(())
    }

    fn plan_retype(
        &self,
        node: NodeId,
        ty: ConnectionType,
        plan: &mut Vec<(NodeId, ConnectionType)>,
    ) -> Result<(), IrError> {
        if plan.iter().any(|(id, _)| *id == node) {
            return Ok(());
        }
        let target = &self.nodes[node];
        let consumers = &target.outputs[0].consumers;
        if !consumers.is_empty() && !target.kind.may_retype() {
            return Err(IrError::OutputTypeFixed {
                node: target.label(),
                current: target.outputs[0].ty,
                requested: ty,
            });
        }
        plan.push((node, ty));
        for consumer in consumers {
            self.check_input(&self.nodes[consumer.node], consumer.port, ty)?;
            self.plan_input_type(consumer.node, consumer.port, ty, plan)?;
        }
        Ok(())
    }

    /// Attaches a clock to a clock slot.
    ///
    /// Registers require a clock that resets or initializes them.
    pub fn attach_clock(&mut self, node: NodeId, slot: usize, clock: ClockId) -> Result<(), IrError> {
        let target = self.try_node(node)?;
        let clk = self.try_clock(clock)?;
        if slot >= target.clocks.len() {
            return Err(IrError::InvalidClockSlot {
                node: target.label(),
                slot,
            });
        }
        if matches!(target.kind, NodeKind::Register) && !clk.reset.provides_reset() {
            return Err(IrError::MissingResetPolicy {
                node: target.label(),
                clock: clk.name.clone(),
            });
        }
        self.nodes[node].clocks[slot] = Some(clock);
        Ok(())
    }

    /// Creates a disconnected copy of a node in the same group.
    ///
    /// The copy keeps kind, name, comment, clocks and output types. Pins
    /// cannot be cloned since each one is a distinct circuit interface.
    pub fn clone_unconnected(&mut self, node: NodeId) -> Result<NodeId, IrError> {
        let original = self.try_node(node)?;
        if matches!(original.kind, NodeKind::InputPin { .. } | NodeKind::OutputPin) {
            return Err(IrError::CloneMisuse {
                node: original.label(),
                reason: "pins are part of the circuit interface".into(),
            });
        }
        let mut copy = original.clone();
        copy.inputs.iter_mut().for_each(|i| *i = None);
        copy.outputs.iter_mut().for_each(|o| o.consumers.clear());
        let group = copy.group;
        let id = self.nodes.alloc_with(move |id| {
            copy.id = id;
            copy
        });
        self.groups[group].nodes.push(id);
        Ok(id)
    }

    /// Removes a node, disconnecting all of its inputs and consumers.
    pub fn remove_node(&mut self, node: NodeId) -> Result<(), IrError> {
        self.try_node(node)?;
        self.remove_live_node(node);
        Ok(())
    }

    /// Reroutes every consumer of `output` to `replacement`.
    ///
    /// Both ports must carry the same type. Returns the number of inputs
    /// that were moved; `output` is left without consumers.
    pub fn bypass_output(&mut self, output: NodePort, replacement: NodePort) -> Result<usize, IrError> {
        let from = self.checked_output_type(output)?;
        let to = self.checked_output_type(replacement)?;
        let node = &self.nodes[output.node];
        if from != to {
            return Err(IrError::TypeConflict {
                node: node.label(),
                port: output.port,
                port_name: node.kind.output_name(output.port),
                expected: from,
                found: to,
            });
        }
        let consumers = node.directly_driven(output.port).to_vec();
        for consumer in &consumers {
            self.connect_input(consumer.node, consumer.port, replacement)?;
        }
        Ok(consumers.len())
    }

    fn checked_output_type(&self, output: NodePort) -> Result<ConnectionType, IrError> {
        let node = self.try_node(output.node)?;
        match node.outputs.get(output.port) {
            Some(o) => Ok(o.ty),
            None => Err(IrError::InvalidOutputPort {
                node: node.label(),
                port: output.port,
                count: node.outputs.len(),
            }),
        }
    }

    /// Removes a node known to be live.
    pub(crate) fn remove_live_node(&mut self, node: NodeId) {
        let num_inputs = self.nodes[node].inputs.len();
        let group = self.nodes[node].group;
        for port in 0..num_inputs {
            self.unlink_input(node, port);
        }
        let outputs = std::mem::take(&mut self.nodes[node].outputs);
        for output in outputs {
            for consumer in output.consumers {
                if let Some(n) = self.nodes.try_get_mut(consumer.node) {
                    n.inputs[consumer.port] = None;
                }
            }
        }
        self.groups[group].nodes.retain(|n| *n != node);
        self.nodes.remove(node);
    }
}

fn validate_kind(kind: &NodeKind) -> Result<(), IrError> {
    let invalid = |reason: String| {
        Err(IrError::InvalidNode {
            kind: kind.type_name(),
            reason,
        })
    };
    match kind {
        NodeKind::Multiplexer { data_inputs: 0 } => invalid("needs at least one data input".into()),
        NodeKind::Memory {
            depth,
            word_width,
            init,
        } => {
            if *depth == 0 || *word_width == 0 {
                return invalid(format!("depth {depth} and word width {word_width} must be positive"));
            }
            match init {
                Some(content) if content.size() != depth * word_width => invalid(format!(
                    "init content has {} bits, expected {}",
                    content.size(),
                    depth * word_width
                )),
                _ => Ok(()),
            }
        }
        NodeKind::MemPort { word_width: 0 } => invalid("word width must be positive".into()),
        NodeKind::Rewire { inputs, ranges } => {
            for range in ranges {
                if let RewireSource::Input { input, .. } = range.source {
                    if input >= *inputs {
                        return invalid(format!("range reads input {input} of {inputs}"));
                    }
                }
            }
            Ok(())
        }
        NodeKind::SignalTap {
            message, values, ..
        } => {
            for part in message {
                if let MessagePart::Value(n) = part {
                    if n >= values {
                        return invalid(format!("message refers to value {n} of {values}"));
                    }
                }
            }
            Ok(())
        }
        NodeKind::InputPin { ty } if ty.is_dependency() => {
            invalid("pins carry values, not dependencies".into())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ClockConfig, ResetKind};
    use crate::kind::{register, LogicOp};
    use hlim_common::{BitState, ClockRational};

    fn constant(c: &mut Circuit, value: u64, width: usize) -> NodePort {
        let root = c.root_group();
        c.constant_u64(root, value, width).unwrap()
    }

    #[test]
    fn connect_sets_driver_and_consumer() {
        let mut c = Circuit::new();
        let a = constant(&mut c, 1, 4);
        let b = constant(&mut c, 2, 4);
        let and = c
            .create_node(c.root_group(), NodeKind::Logic(LogicOp::And))
            .unwrap();
        c.connect_input(and, 0, a).unwrap();
        c.connect_input(and, 1, b).unwrap();
        assert_eq!(c.driver(and, 0), Some(a));
        assert_eq!(c.directly_driven(a), &[NodePort::new(and, 0)]);
        assert_eq!(c.node(and).output_type(0), ConnectionType::bit_vector(4));
    }

    #[test]
    fn reconnect_moves_consumer() {
        let mut c = Circuit::new();
        let a = constant(&mut c, 1, 4);
        let b = constant(&mut c, 2, 4);
        let sig = c.create_node(c.root_group(), NodeKind::Signal).unwrap();
        c.connect_input(sig, 0, a).unwrap();
        c.connect_input(sig, 0, b).unwrap();
        assert!(c.directly_driven(a).is_empty());
        assert_eq!(c.directly_driven(b).len(), 1);
        c.disconnect_input(sig, 0).unwrap();
        assert!(c.directly_driven(b).is_empty());
        assert_eq!(c.driver(sig, 0), None);
    }

    #[test]
    fn mismatched_operands_conflict() {
        let mut c = Circuit::new();
        let a = constant(&mut c, 1, 4);
        let b = constant(&mut c, 2, 8);
        let and = c
            .create_node(c.root_group(), NodeKind::Logic(LogicOp::And))
            .unwrap();
        c.connect_input(and, 0, a).unwrap();
        let err = c.connect_input(and, 1, b).unwrap_err();
        assert!(matches!(err, IrError::TypeConflict { port: 1, .. }));
        // The failed call left the circuit unchanged.
        assert_eq!(c.driver(and, 1), None);
        assert!(c.directly_driven(b).is_empty());
    }

    #[test]
    fn fixed_output_type_rejects_change() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = constant(&mut c, 1, 4);
        let wide = constant(&mut c, 1, 8);
        let not = c.create_node(root, NodeKind::Logic(LogicOp::Not)).unwrap();
        c.connect_input(not, 0, a).unwrap();
        let sink = c.create_node(root, NodeKind::Signal).unwrap();
        c.connect_input(sink, 0, NodePort::first(not)).unwrap();
        let err = c.connect_input(not, 0, wide).unwrap_err();
        assert!(matches!(err, IrError::OutputTypeFixed { .. }));
        assert_eq!(c.driver(not, 0), Some(a));
    }

    #[test]
    fn signal_retype_propagates_through_signal_chain() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let narrow = constant(&mut c, 1, 4);
        let wide = constant(&mut c, 1, 8);
        let s1 = c.create_node(root, NodeKind::Signal).unwrap();
        let s2 = c.create_node(root, NodeKind::Signal).unwrap();
        c.connect_input(s1, 0, narrow).unwrap();
        c.connect_input(s2, 0, NodePort::first(s1)).unwrap();
        assert_eq!(c.node(s2).output_type(0), ConnectionType::bit_vector(4));
        c.connect_input(s1, 0, wide).unwrap();
        assert_eq!(c.node(s1).output_type(0), ConnectionType::bit_vector(8));
        assert_eq!(c.node(s2).output_type(0), ConnectionType::bit_vector(8));
    }

    #[test]
    fn signal_retype_blocked_by_fixed_consumer() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let narrow = constant(&mut c, 1, 4);
        let wide = constant(&mut c, 1, 8);
        let sig = c.create_node(root, NodeKind::Signal).unwrap();
        c.connect_input(sig, 0, narrow).unwrap();
        let and = c.create_node(root, NodeKind::Logic(LogicOp::And)).unwrap();
        c.connect_input(and, 0, NodePort::first(sig)).unwrap();
        c.connect_input(and, 1, narrow).unwrap();
        let err = c.connect_input(sig, 0, wide).unwrap_err();
        assert!(matches!(err, IrError::TypeConflict { .. }));
        assert_eq!(c.node(sig).output_type(0), ConnectionType::bit_vector(4));
    }

    #[test]
    fn non_signal_driver_skips_signals() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let k = constant(&mut c, 3, 2);
        let s1 = c.signal(root, "a", Some(k)).unwrap();
        let s2 = c.signal(root, "b", Some(s1)).unwrap();
        let not = c.not(root, s2).unwrap();
        assert_eq!(c.driver(not.node, 0), Some(s2));
        assert_eq!(c.non_signal_driver(not.node, 0), Some(k));
    }

    #[test]
    fn undriven_signal_has_no_source() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let s = c.signal(root, "floating", None).unwrap();
        assert_eq!(c.non_signal_source(s), None);
    }

    #[test]
    fn invalid_ports_are_reported() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let k = constant(&mut c, 0, 1);
        let sig = c.create_node(root, NodeKind::Signal).unwrap();
        assert!(matches!(
            c.connect_input(sig, 3, k),
            Err(IrError::InvalidInputPort { port: 3, count: 1, .. })
        ));
        assert!(matches!(
            c.connect_input(sig, 0, NodePort::new(k.node, 2)),
            Err(IrError::InvalidOutputPort { port: 2, .. })
        ));
    }

    #[test]
    fn register_needs_reset_or_init() {
        let mut c = Circuit::new();
        let mut cfg = ClockConfig::new("bare", ClockRational::from_integer(1_000));
        cfg.reset.kind = ResetKind::None;
        cfg.reset.initialize_regs = false;
        let clk = c.create_clock(cfg).unwrap();
        let reg = c.create_node(c.root_group(), NodeKind::Register).unwrap();
        let err = c.attach_clock(reg, 0, clk).unwrap_err();
        assert!(matches!(err, IrError::MissingResetPolicy { .. }));
        assert!(matches!(
            c.attach_clock(reg, 1, clk),
            Err(IrError::InvalidClockSlot { .. })
        ));
    }

    #[test]
    fn register_feedback_keeps_type() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = c
            .create_clock(ClockConfig::new("clk", ClockRational::from_integer(1_000)))
            .unwrap();
        let zero = constant(&mut c, 0, 8);
        let reg = c.register(root, clk, None, Some(zero), None).unwrap();
        let one = constant(&mut c, 1, 8);
        let next = c
            .arithmetic(root, crate::kind::ArithmeticOp::Add, NodePort::first(reg), one)
            .unwrap();
        c.connect_input(reg, register::DATA, next).unwrap();
        assert_eq!(c.node(reg).output_type(0), ConnectionType::bit_vector(8));
    }

    #[test]
    fn clone_unconnected_copies_structure_only() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = constant(&mut c, 5, 4);
        let not = c.not(root, a).unwrap();
        c.set_node_name(not.node, "inv").unwrap();
        let copy = c.clone_unconnected(not.node).unwrap();
        assert_ne!(copy, not.node);
        assert_eq!(c.node(copy).name(), "inv");
        assert_eq!(c.node(copy).driver(0), None);
        assert_eq!(c.node(copy).output_type(0), ConnectionType::bit_vector(4));
        assert!(c.group(root).nodes().contains(&copy));
    }

    #[test]
    fn clone_of_pin_is_refused() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let pin = c.input_pin(root, "in", ConnectionType::boolean()).unwrap();
        assert!(matches!(c.clone_unconnected(pin), Err(IrError::CloneMisuse { .. })));
    }

    #[test]
    fn remove_node_detaches_both_sides() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = constant(&mut c, 1, 1);
        let mid = c.signal(root, "mid", Some(a)).unwrap();
        let out = c.not(root, mid).unwrap();
        c.remove_node(mid.node).unwrap();
        assert!(!c.contains_node(mid.node));
        assert!(c.directly_driven(a).is_empty());
        assert_eq!(c.driver(out.node, 0), None);
        assert!(!c.group(root).nodes().contains(&mid.node));
        assert!(matches!(c.remove_node(mid.node), Err(IrError::UnknownNode(_))));
    }

    #[test]
    fn invalid_memory_config() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let err = c
            .create_node(
                root,
                NodeKind::Memory {
                    depth: 4,
                    word_width: 8,
                    init: Some(BitState::new(8)),
                },
            )
            .unwrap_err();
        assert!(matches!(err, IrError::InvalidNode { .. }));
    }

    #[test]
    fn serde_roundtrip() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = constant(&mut c, 9, 4);
        c.signal(root, "x", Some(a)).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        let restored: Circuit = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.node_count(), 2);
        assert_eq!(restored.directly_driven(a).len(), 1);
    }
}
