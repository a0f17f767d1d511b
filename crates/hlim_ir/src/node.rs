//! Nodes: typed vertices of the circuit graph.
//!
//! Nodes are created and mutated only through [`Circuit`](crate::Circuit),
//! which keeps driver and consumer links consistent. This module exposes the
//! read-only view.

use crate::connection::{ConnectionType, NodePort};
use crate::ids::{ClockId, GroupId, NodeId};
use crate::kind::NodeKind;
use serde::{Deserialize, Serialize};

/// An output port: its type and the inputs it drives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputPort {
    pub(crate) ty: ConnectionType,
    pub(crate) consumers: Vec<NodePort>,
}

impl OutputPort {
    /// The type carried by this output.
    pub fn ty(&self) -> ConnectionType {
        self.ty
    }

    /// The inputs this output drives, each listed once.
    pub fn consumers(&self) -> &[NodePort] {
        &self.consumers
    }
}

/// A vertex of the circuit graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) name: String,
    pub(crate) comment: String,
    pub(crate) group: GroupId,
    pub(crate) inputs: Vec<Option<NodePort>>,
    pub(crate) outputs: Vec<OutputPort>,
    pub(crate) clocks: Vec<Option<ClockId>>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, group: GroupId) -> Self {
        let outputs = (0..kind.num_outputs())
            .map(|port| OutputPort {
                ty: kind.initial_output_type(port),
                consumers: Vec::new(),
            })
            .collect();
        Self {
            id,
            inputs: vec![None; kind.num_inputs()],
            clocks: vec![None; kind.num_clocks()],
            outputs,
            kind,
            name: String::new(),
            comment: String::new(),
            group,
        }
    }

    /// This node's ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The user-assigned name, possibly empty.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The user-assigned comment, possibly empty.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// The group owning this node.
    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Number of input ports.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports.
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// The direct driver of an input, which may be a signal node.
    pub fn driver(&self, port: usize) -> Option<NodePort> {
        self.inputs.get(port).copied().flatten()
    }

    /// All input drivers in port order.
    pub fn inputs(&self) -> &[Option<NodePort>] {
        &self.inputs
    }

    /// All outputs in port order.
    pub fn outputs(&self) -> &[OutputPort] {
        &self.outputs
    }

    /// Type of an output.
    ///
    /// # Panics
    ///
    /// Panics if `port` is out of range.
    pub fn output_type(&self, port: usize) -> ConnectionType {
        self.outputs[port].ty
    }

    /// Inputs driven by an output, each listed once.
    pub fn directly_driven(&self, port: usize) -> &[NodePort] {
        self.outputs.get(port).map_or(&[], |o| o.consumers.as_slice())
    }

    /// Returns `true` if any output has a consumer.
    pub fn has_consumers(&self) -> bool {
        self.outputs.iter().any(|o| !o.consumers.is_empty())
    }

    /// Attached clocks in slot order.
    pub fn clocks(&self) -> &[Option<ClockId>] {
        &self.clocks
    }

    /// The clock in slot 0, for kinds with a single clock.
    pub fn clock(&self) -> Option<ClockId> {
        self.clocks.first().copied().flatten()
    }

    /// Widths of the internal state slots the simulator reserves for this node.
    pub fn internal_state_sizes(&self) -> Vec<usize> {
        match &self.kind {
            NodeKind::Register => vec![self.output_type(0).width, 1, 1],
            NodeKind::InputPin { ty } => vec![ty.width],
            NodeKind::Memory {
                depth, word_width, ..
            } => vec![depth * word_width],
            NodeKind::MemPort { word_width } => vec![1, 64, *word_width],
            _ => Vec::new(),
        }
    }

    /// A label naming the node for diagnostics, such as `'counter' (node#4 Register)`.
    pub fn label(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.id, self.kind)
        } else {
            format!("'{}' ({} {})", self.name, self.id, self.kind)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::LogicOp;

    #[test]
    fn new_node_is_unconnected() {
        let node = Node::new(
            NodeId::from_raw(0),
            NodeKind::Logic(LogicOp::And),
            GroupId::from_raw(0),
        );
        assert_eq!(node.num_inputs(), 2);
        assert_eq!(node.driver(0), None);
        assert_eq!(node.driver(5), None);
        assert!(!node.has_consumers());
        assert!(node.directly_driven(3).is_empty());
    }

    #[test]
    fn label_uses_name_when_present() {
        let mut node = Node::new(NodeId::from_raw(4), NodeKind::Register, GroupId::from_raw(0));
        assert_eq!(node.label(), "node#4 Register");
        node.name = "counter".into();
        assert_eq!(node.label(), "'counter' (node#4 Register)");
    }

    #[test]
    fn memory_state_size() {
        let node = Node::new(
            NodeId::from_raw(0),
            NodeKind::Memory {
                depth: 16,
                word_width: 8,
                init: None,
            },
            GroupId::from_raw(0),
        );
        assert_eq!(node.internal_state_sizes(), vec![128]);
    }
}
