//! Clock-domain inference.
//!
//! Registers start a domain. Memory read data belongs to the clocks of the
//! ports writing the memory. Combinational nodes inherit the common domain
//! of their inputs, constants fit any domain, and pins or mixed inputs make
//! the result unknown.

use hlim_ir::kind::mem_port;
use hlim_ir::{Circuit, ClockId, NodeId, NodeKind, NodePort};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// The clock domain of an output port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ClockDomain {
    /// Never changes after power-on.
    Constant,
    /// Driven from outside, from several domains or through a loop.
    Unknown,
    /// Changes only on edges of this clock.
    Clock(ClockId),
}

impl ClockDomain {
    /// The domain of a combinational function of two values.
    pub fn merge(self, other: ClockDomain) -> ClockDomain {
        match (self, other) {
            (ClockDomain::Constant, d) | (d, ClockDomain::Constant) => d,
            (ClockDomain::Clock(a), ClockDomain::Clock(b)) if a == b => ClockDomain::Clock(a),
            _ => ClockDomain::Unknown,
        }
    }
}

/// Clocks of the ports that write to `memory`, in port creation order.
pub fn memory_write_clocks(circuit: &Circuit, memory: NodeId) -> Vec<(NodeId, ClockId)> {
    circuit
        .directly_driven(NodePort::first(memory))
        .iter()
        .filter(|consumer| consumer.port == mem_port::MEMORY)
        .filter_map(|consumer| {
            let port = circuit.node(consumer.node);
            let writes = port.driver(mem_port::WR_ENABLE).is_some();
            match (port.kind(), port.clock()) {
                (NodeKind::MemPort { .. }, Some(clock)) if writes => Some((consumer.node, clock)),
                _ => None,
            }
        })
        .collect()
}

struct Inference<'c> {
    circuit: &'c Circuit,
    domains: BTreeMap<NodePort, ClockDomain>,
    visiting: HashSet<NodeId>,
}

impl Inference<'_> {
    fn memory_domain(&self, memory: NodeId) -> ClockDomain {
        memory_write_clocks(self.circuit, memory)
            .into_iter()
            .fold(ClockDomain::Constant, |acc, (_, clock)| {
                acc.merge(ClockDomain::Clock(clock))
            })
    }

    fn inputs_domain(&mut self, node: NodeId) -> ClockDomain {
        if !self.visiting.insert(node) {
            return ClockDomain::Unknown;
        }
        let n = self.circuit.node(node);
        let mut domain = ClockDomain::Constant;
        for port in 0..n.num_inputs() {
            if n.kind().expects_dependency(port) {
                continue;
            }
            if let Some(driver) = n.driver(port) {
                domain = domain.merge(self.domain_of(driver));
            }
        }
        self.visiting.remove(&node);
        domain
    }

    fn domain_of(&mut self, port: NodePort) -> ClockDomain {
        if let Some(domain) = self.domains.get(&port) {
            return *domain;
        }
        let node = self.circuit.node(port.node);
        let domain = match node.kind() {
            NodeKind::Constant { .. } => ClockDomain::Constant,
            NodeKind::InputPin { .. } => ClockDomain::Unknown,
            NodeKind::Register => node.clock().map_or(ClockDomain::Unknown, ClockDomain::Clock),
            NodeKind::Memory { .. } => self.memory_domain(port.node),
            NodeKind::MemPort { .. } => {
                let content = node
                    .driver(mem_port::MEMORY)
                    .map_or(ClockDomain::Unknown, |m| self.memory_domain(m.node));
                content.merge(self.inputs_domain(port.node))
            }
            _ => self.inputs_domain(port.node),
        };
        self.domains.insert(port, domain);
        domain
    }
}

/// Infers the clock domain of every output port of the circuit.
pub fn infer_clock_domains(circuit: &Circuit) -> BTreeMap<NodePort, ClockDomain> {
    let mut inference = Inference {
        circuit,
        domains: BTreeMap::new(),
        visiting: HashSet::new(),
    };
    for (id, node) in circuit.nodes() {
        for port in 0..node.num_outputs() {
            inference.domain_of(NodePort::new(id, port));
        }
    }
    tracing::debug!(ports = inference.domains.len(), "inferred clock domains");
    inference.domains
}
