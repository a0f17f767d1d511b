//! Detection of unguarded clock-domain crossings.
//!
//! Every data, enable and address input of a clocked register or memory
//! port is walked backwards through combinational logic to the registers
//! driving it. A memory read port contributes the clocks of the ports that
//! write its memory, whether or not the read port has a clock of its own.
//! A source on a clock that is not related to the sink's clock is a
//! crossing unless the path passes through a [`NodeKind::CdcMarker`].

use crate::domains::memory_write_clocks;
use hlim_ir::kind::{mem_port, register};
use hlim_ir::{Circuit, ClockId, NodeId, NodeKind, NodePort};
use serde::Serialize;
use std::collections::HashSet;

/// One unguarded path between unrelated clocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct CdcCrossing {
    /// The register or memory port receiving the crossing value.
    pub node: NodeId,
    /// The input of `node` the value arrives on.
    pub input: usize,
    /// The register or memory port the value originates from.
    pub source: NodeId,
    /// Clock of `node`.
    pub sink_clock: ClockId,
    /// Clock of `source`.
    pub source_clock: ClockId,
}

fn sink_inputs(kind: &NodeKind) -> &'static [usize] {
    match kind {
        NodeKind::Register => &[register::DATA, register::ENABLE],
        NodeKind::MemPort { .. } => &[
            mem_port::ENABLE,
            mem_port::WR_ENABLE,
            mem_port::ADDRESS,
            mem_port::WR_DATA,
        ],
        _ => &[],
    }
}

/// Registers and memory write ports whose values reach `start` without
/// passing a register or a marker.
fn clocked_sources(circuit: &Circuit, start: NodePort) -> Vec<(NodeId, ClockId)> {
    let mut sources = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![start.node];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let node = circuit.node(id);
        match node.kind() {
            NodeKind::CdcMarker | NodeKind::Constant { .. } | NodeKind::InputPin { .. } => {}
            NodeKind::Register => sources.extend(node.clock().map(|clock| (id, clock))),
            // Reads are combinational, so read data changes with the write clocks.
            NodeKind::MemPort { .. } => {
                if let Some(memory) = node.driver(mem_port::MEMORY) {
                    sources.extend(memory_write_clocks(circuit, memory.node));
                }
                stack.extend(
                    [mem_port::ENABLE, mem_port::ADDRESS]
                        .into_iter()
                        .filter_map(|port| node.driver(port))
                        .map(|driver| driver.node),
                );
            }
            _ => stack.extend(
                (0..node.num_inputs())
                    .filter(|&port| !node.kind().expects_dependency(port))
                    .filter_map(|port| node.driver(port))
                    .map(|driver| driver.node),
            ),
        }
    }
    sources
}

/// Reports every unguarded crossing to `report` and returns how many were found.
///
/// Clocks are related when they share a root clock. At most one crossing is
/// reported per sink and source pair.
pub fn detect_unguarded_cdc(circuit: &Circuit, mut report: impl FnMut(&CdcCrossing)) -> usize {
    let mut seen = HashSet::new();
    for (id, node) in circuit.nodes() {
        let Some(sink_clock) = node.clock() else {
            continue;
        };
        for &input in sink_inputs(node.kind()) {
            let Some(driver) = node.driver(input) else {
                continue;
            };
            for (source, source_clock) in clocked_sources(circuit, driver) {
                if circuit.clocks_related(sink_clock, source_clock) || !seen.insert((id, source)) {
                    continue;
                }
                let crossing = CdcCrossing {
                    node: id,
                    input,
                    source,
                    sink_clock,
                    source_clock,
                };
                tracing::debug!(
                    sink = %node.label(),
                    source = %circuit.node(source).label(),
                    "unguarded clock domain crossing"
                );
                report(&crossing);
            }
        }
    }
    seen.len()
}
