//! Compilation of a circuit into a flat simulation program.
//!
//! Every non-signal node gets disjoint slots inside one shared [`BitState`]:
//! one per output and one per internal state entry. Inputs do not own
//! storage; they point at the slot of their (signal-resolved) driver.
//! Ranges of up to 64 bits never straddle a storage word and longer ranges
//! start on a word boundary.

use crate::error::SimError;
use hlim_common::{BitState, WORD_BITS};
use hlim_ir::{Circuit, ClockId, NodeId, NodeKind, NodePort, OutputTiming};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

/// A bit range inside the simulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    /// First bit.
    pub offset: usize,
    /// Number of bits.
    pub width: usize,
}

/// Storage layout of one node.
#[derive(Debug, Clone)]
pub struct MappedNode {
    /// The circuit node.
    pub node: NodeId,
    /// Internal state slots, in the order of `Node::internal_state_sizes`.
    ///
    /// Memory ports get the storage of their memory appended.
    pub internal: Vec<Slot>,
    /// Driver slot per input, `None` when unconnected.
    pub inputs: Vec<Option<Slot>>,
    /// Slot per output.
    pub outputs: Vec<Slot>,
}

/// A circuit compiled for simulation.
#[derive(Debug)]
pub struct Program {
    circuit: Circuit,
    nodes: Vec<MappedNode>,
    index: HashMap<NodeId, usize>,
    output_slots: HashMap<NodePort, Slot>,
    order: Vec<usize>,
    taps: Vec<usize>,
    clocked: BTreeMap<ClockId, Vec<usize>>,
    state_width: usize,
}

#[derive(Default)]
struct Allocator {
    next: usize,
}

impl Allocator {
    fn alloc(&mut self, width: usize) -> Slot {
        let in_word = self.next % WORD_BITS;
        if width > WORD_BITS {
            if in_word != 0 {
                self.next += WORD_BITS - in_word;
            }
        } else if in_word + width > WORD_BITS {
            self.next += WORD_BITS - in_word;
        }
        let slot = Slot {
            offset: self.next,
            width,
        };
        self.next += width;
        slot
    }
}

impl Program {
    /// Lays out storage and evaluation order for `circuit`.
    pub fn compile(circuit: Circuit) -> Result<Self, SimError> {
        let mut alloc = Allocator::default();
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        let mut output_slots = HashMap::new();

        for (id, node) in circuit.nodes() {
            if node.kind().is_signal() {
                continue;
            }
            let outputs: Vec<Slot> = (0..node.num_outputs())
                .map(|port| alloc.alloc(node.output_type(port).width))
                .collect();
            for (port, slot) in outputs.iter().enumerate() {
                output_slots.insert(NodePort::new(id, port), *slot);
            }
            let internal = node
                .internal_state_sizes()
                .into_iter()
                .map(|width| alloc.alloc(width))
                .collect();
            index.insert(id, nodes.len());
            nodes.push(MappedNode {
                node: id,
                internal,
                inputs: Vec::new(),
                outputs,
            });
        }

        // Signals alias their first real producer. Undriven signals get storage
        // of their own that stays undefined.
        for (id, node) in circuit.nodes() {
            if !node.kind().is_signal() {
                continue;
            }
            let port = NodePort::first(id);
            let slot = match circuit.non_signal_source(port) {
                Some(source) => output_slots.get(&source).copied(),
                None => None,
            };
            let slot = slot.unwrap_or_else(|| alloc.alloc(node.output_type(0).width));
            output_slots.insert(port, slot);
        }

        for mapped in &mut nodes {
            let node = circuit.node(mapped.node);
            mapped.inputs = node
                .inputs()
                .iter()
                .map(|driver| driver.and_then(|d| output_slots.get(&d).copied()))
                .collect();
        }

        // Memory ports operate on the storage of their memory.
        for i in 0..nodes.len() {
            let id = nodes[i].node;
            if !matches!(circuit.node(id).kind(), NodeKind::MemPort { .. }) {
                continue;
            }
            let storage = circuit
                .non_signal_driver(id, hlim_ir::kind::mem_port::MEMORY)
                .and_then(|mem| index.get(&mem.node))
                .and_then(|&m| nodes[m].internal.first().copied());
            if let Some(storage) = storage {
                nodes[i].internal.push(storage);
            }
        }

        let order = Self::evaluation_order(&circuit, &nodes, &index)?;

        let taps = nodes
            .iter()
            .enumerate()
            .filter(|(_, m)| matches!(circuit.node(m.node).kind(), NodeKind::SignalTap { .. }))
            .map(|(i, _)| i)
            .collect();

        let mut clocked: BTreeMap<ClockId, Vec<usize>> = BTreeMap::new();
        for (i, mapped) in nodes.iter().enumerate() {
            if let Some(clock) = circuit.node(mapped.node).clock() {
                clocked.entry(clock).or_default().push(i);
            }
        }

        let state_width = alloc.next;
        tracing::debug!(
            nodes = nodes.len(),
            state_bits = state_width,
            clocks = clocked.len(),
            "compiled simulation program"
        );

        Ok(Self {
            circuit,
            nodes,
            index,
            output_slots,
            order,
            taps,
            clocked,
            state_width,
        })
    }

    /// Topological order over combinational edges.
    ///
    /// Edges from latched and constant outputs are left out, so registers,
    /// memories, pins and constants break every cycle through them.
    fn evaluation_order(
        circuit: &Circuit,
        nodes: &[MappedNode],
        index: &HashMap<NodeId, usize>,
    ) -> Result<Vec<usize>, SimError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(nodes.len(), nodes.len());
        let handles: Vec<NodeIndex> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();
        for (i, mapped) in nodes.iter().enumerate() {
            for port in 0..circuit.node(mapped.node).num_inputs() {
                let Some(source) = circuit.non_signal_driver(mapped.node, port) else {
                    continue;
                };
                let Some(&from) = index.get(&source.node) else {
                    continue;
                };
                let driver = circuit.node(source.node);
                if driver.kind().output_timing(source.port) == OutputTiming::Immediate {
                    graph.add_edge(handles[from], handles[i], ());
                }
            }
        }
        let sorted = toposort(&graph, None).map_err(|cycle| SimError::CombinationalLoop {
            node: circuit.node(nodes[graph[cycle.node_id()]].node).label(),
        })?;
        Ok(sorted.into_iter().map(|h| graph[h]).collect())
    }

    /// The compiled circuit.
    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    /// All mapped nodes.
    pub fn nodes(&self) -> &[MappedNode] {
        &self.nodes
    }

    /// Index of a node in [`nodes`](Self::nodes), `None` for signals and unknown IDs.
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    /// Storage of an output port, including aliased signal outputs.
    pub fn output_slot(&self, port: NodePort) -> Option<Slot> {
        self.output_slots.get(&port).copied()
    }

    /// Nodes in combinational evaluation order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Signal tap nodes, evaluated in the commit pass.
    pub fn taps(&self) -> &[usize] {
        &self.taps
    }

    /// Nodes clocked by `clock`.
    pub fn clocked_by(&self, clock: ClockId) -> &[usize] {
        self.clocked.get(&clock).map_or(&[], Vec::as_slice)
    }

    /// A fresh, fully undefined state of the right size.
    pub fn new_state(&self) -> BitState {
        BitState::new(self.state_width)
    }

    /// Total number of state bits.
    pub fn state_width(&self) -> usize {
        self.state_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlim_common::ClockRational;
    use hlim_ir::{ClockConfig, LogicOp};

    #[test]
    fn allocator_keeps_small_ranges_in_one_word() {
        let mut alloc = Allocator::default();
        let a = alloc.alloc(60);
        let b = alloc.alloc(8);
        let c = alloc.alloc(100);
        let d = alloc.alloc(4);
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 64);
        assert_eq!(c.offset, 128);
        assert_eq!(d.offset, 228);
        for slot in [a, b, d] {
            assert!(hlim_common::bit_state::is_non_straddling(slot.offset, slot.width));
        }
    }

    #[test]
    fn signals_alias_their_driver() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let k = c.constant_u64(root, 5, 4).unwrap();
        let s1 = c.signal(root, "s1", Some(k)).unwrap();
        let s2 = c.signal(root, "s2", Some(s1)).unwrap();
        let pin = c.output_pin(root, "out", s2).unwrap();
        let program = Program::compile(c).unwrap();
        let slot = program.output_slot(k).unwrap();
        assert_eq!(program.output_slot(s1), Some(slot));
        assert_eq!(program.output_slot(s2), Some(slot));
        let mapped = &program.nodes()[program.index_of(pin).unwrap()];
        assert_eq!(mapped.inputs, vec![Some(slot)]);
        assert_eq!(program.index_of(s1.node), None);
    }

    #[test]
    fn order_respects_dependencies() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let a = c.constant_u64(root, 1, 2).unwrap();
        let x = c.not(root, a).unwrap();
        let y = c.logic(root, LogicOp::And, x, a).unwrap();
        let z = c.logic(root, LogicOp::Or, y, x).unwrap();
        let program = Program::compile(c).unwrap();
        let pos = |p: NodePort| {
            let idx = program.index_of(p.node).unwrap();
            program.order().iter().position(|&i| i == idx).unwrap()
        };
        assert!(pos(a) < pos(x));
        assert!(pos(x) < pos(y));
        assert!(pos(y) < pos(z));
    }

    #[test]
    fn register_breaks_feedback() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = c
            .create_clock(ClockConfig::new("clk", ClockRational::from_integer(1_000_000)))
            .unwrap();
        let zero = c.constant_u64(root, 0, 4).unwrap();
        let reg = c.register(root, clk, None, Some(zero), None).unwrap();
        let one = c.constant_u64(root, 1, 4).unwrap();
        let next = c
            .arithmetic(root, hlim_ir::ArithmeticOp::Add, NodePort::first(reg), one)
            .unwrap();
        c.connect_input(reg, hlim_ir::kind::register::DATA, next).unwrap();
        let program = Program::compile(c).unwrap();
        assert_eq!(program.clocked_by(clk).len(), 1);
    }

    #[test]
    fn combinational_cycle_is_rejected() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let k = c.constant_u64(root, 1, 1).unwrap();
        let loop_sig = c.signal(root, "loop", Some(k)).unwrap();
        let x = c.logic(root, LogicOp::Xor, loop_sig, k).unwrap();
        c.connect_input(loop_sig.node, 0, x).unwrap();
        let err = Program::compile(c).unwrap_err();
        assert!(matches!(err, SimError::CombinationalLoop { .. }));
    }

    #[test]
    fn memory_ports_share_storage() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let mem = c.memory(root, 4, 8, None).unwrap();
        let rd = c.memory_port(root, mem, None).unwrap();
        let program = Program::compile(c).unwrap();
        let mem_slot = program.nodes()[program.index_of(mem).unwrap()].internal[0];
        let port = &program.nodes()[program.index_of(rd).unwrap()];
        assert_eq!(port.internal.len(), 4);
        assert_eq!(port.internal[3], mem_slot);
        assert_eq!(mem_slot.width, 32);
    }
}
