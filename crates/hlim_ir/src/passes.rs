//! Structural cleanup and rewrite passes over a circuit.
//!
//! Passes rewire consumers and remove nodes but never change what a pin or
//! signal tap observes.

use crate::circuit::Circuit;
use crate::connection::NodePort;
use crate::error::IrError;
use crate::ids::NodeId;
use crate::kind::{mem_port, NodeKind, RewireSource};
use std::collections::{BTreeMap, BTreeSet, HashSet};

impl Circuit {
    /// Returns `true` for nodes that are observable without any consumer.
    fn is_observable(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        match node.kind() {
            NodeKind::InputPin { .. } | NodeKind::OutputPin | NodeKind::SignalTap { .. } => true,
            NodeKind::MemPort { .. } => node.driver(mem_port::WR_ENABLE).is_some(),
            _ => false,
        }
    }

    /// Removes every node that cannot influence an observable node.
    ///
    /// Observable nodes are pins, signal taps and memory ports that write.
    /// Registers and memories survive only if they feed one of those.
    /// Returns the number of nodes removed.
    pub fn cull_unused_nodes(&mut self) -> usize {
        let mut live: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<NodeId> = self.nodes.ids().filter(|id| self.is_observable(*id)).collect();
        while let Some(id) = stack.pop() {
            if !live.insert(id) {
                continue;
            }
            for driver in self.nodes[id].inputs().iter().flatten() {
                if !live.contains(&driver.node) {
                    stack.push(driver.node);
                }
            }
        }
        let dead: Vec<NodeId> = self.nodes.ids().filter(|id| !live.contains(id)).collect();
        for id in &dead {
            self.remove_live_node(*id);
        }
        if !dead.is_empty() {
            tracing::debug!(removed = dead.len(), remaining = self.node_count(), "culled unused nodes");
        }
        dead.len()
    }

    /// Removes signal nodes that have neither a driver nor a consumer.
    ///
    /// Returns the number of nodes removed.
    pub fn cull_orphaned_signal_nodes(&mut self) -> usize {
        let orphans: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.kind().is_signal() && n.driver(0).is_none() && !n.has_consumers())
            .map(|(id, _)| id)
            .collect();
        for id in &orphans {
            self.remove_live_node(*id);
        }
        if !orphans.is_empty() {
            tracing::debug!(removed = orphans.len(), "culled orphaned signal nodes");
        }
        orphans.len()
    }

    /// Returns `true` for a rewire that hands its single input through unchanged.
    fn is_no_op_rewire(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        let NodeKind::Rewire { inputs: 1, ranges } = node.kind() else {
            return false;
        };
        let [range] = ranges.as_slice() else {
            return false;
        };
        let Some(driver) = node.driver(0) else {
            return false;
        };
        range.source == RewireSource::Input { input: 0, offset: 0 }
            && self.output_type(driver) == Some(node.output_type(0))
    }

    /// Removes rewire nodes that pass their input through unchanged.
    ///
    /// Consumers are reconnected to the rewire's driver. Returns the number
    /// of nodes removed.
    pub fn remove_no_ops(&mut self) -> Result<usize, IrError> {
        let no_ops: Vec<NodeId> = self.nodes.ids().filter(|id| self.is_no_op_rewire(*id)).collect();
        for id in &no_ops {
            if let Some(driver) = self.nodes[*id].driver(0) {
                self.bypass_output(NodePort::first(*id), driver)?;
            }
            self.remove_live_node(*id);
        }
        if !no_ops.is_empty() {
            tracing::debug!(removed = no_ops.len(), "removed no-op rewires");
        }
        Ok(no_ops.len())
    }

    /// Bypasses multiplexers whose selector is a fully defined constant.
    ///
    /// Consumers are reconnected to the selected data input. The bypassed
    /// multiplexers stay in the circuit until [`cull_unused_nodes`](Self::cull_unused_nodes)
    /// removes them. Selectors beyond the data inputs select an undefined
    /// value and are left alone. Returns the number of bypassed multiplexers.
    pub fn remove_const_select_muxes(&mut self) -> Result<usize, IrError> {
        let mut bypasses = Vec::new();
        for (id, node) in self.nodes.iter() {
            let NodeKind::Multiplexer { data_inputs } = *node.kind() else {
                continue;
            };
            let Some(select) = self.non_signal_driver(id, 0) else {
                continue;
            };
            let NodeKind::Constant { value, .. } = self.nodes[select.node].kind() else {
                continue;
            };
            let Some(index) = value.to_u64() else {
                continue;
            };
            if index >= data_inputs as u64 || !node.has_consumers() {
                continue;
            }
            if let Some(selected) = node.driver(1 + index as usize) {
                bypasses.push((id, selected));
            }
        }
        for (id, selected) in &bypasses {
            self.bypass_output(NodePort::first(*id), *selected)?;
        }
        Ok(bypasses.len())
    }

    /// Copies the logic that drives `outputs` and returns the map from
    /// original to copied node.
    ///
    /// The walk follows every driver back from `outputs` except through the
    /// inputs listed in `stop_at`; those inputs stay unconnected in the copy.
    /// Input pins are not copied, the copied logic reads the original pin.
    /// Copies keep group, name and clocks of their originals. On error every
    /// copy made so far is removed again.
    pub fn copy_subnet(
        &mut self,
        outputs: &[NodePort],
        stop_at: &[NodePort],
    ) -> Result<BTreeMap<NodeId, NodeId>, IrError> {
        let stop: HashSet<NodePort> = stop_at.iter().copied().collect();
        let mut originals = BTreeSet::new();
        let mut stack: Vec<NodeId> = outputs.iter().map(|p| p.node).collect();
        while let Some(id) = stack.pop() {
            let node = self.try_node(id)?;
            if matches!(node.kind(), NodeKind::InputPin { .. }) || !originals.insert(id) {
                continue;
            }
            for (port, driver) in node.inputs().iter().enumerate() {
                if let Some(driver) = driver {
                    if !stop.contains(&NodePort::new(id, port)) {
                        stack.push(driver.node);
                    }
                }
            }
        }

        let mut copies = BTreeMap::new();
        let result = self.clone_and_wire(&originals, &stop, &mut copies);
        if let Err(err) = result {
            for copy in copies.values() {
                self.remove_live_node(*copy);
            }
            return Err(err);
        }
        tracing::debug!(copied = copies.len(), "copied subnet");
        Ok(copies)
    }

    fn clone_and_wire(
        &mut self,
        originals: &BTreeSet<NodeId>,
        stop: &HashSet<NodePort>,
        copies: &mut BTreeMap<NodeId, NodeId>,
    ) -> Result<(), IrError> {
        for &id in originals {
            let copy = self.clone_unconnected(id)?;
            copies.insert(id, copy);
        }
        for (&original, &copy) in copies.iter() {
            let inputs = self.nodes[original].inputs().to_vec();
            for (port, driver) in inputs.into_iter().enumerate() {
                let Some(driver) = driver else {
                    continue;
                };
                if stop.contains(&NodePort::new(original, port)) {
                    continue;
                }
                let source = match copies.get(&driver.node) {
                    Some(&copied) => NodePort::new(copied, driver.port),
                    None => driver,
                };
                self.connect_input(copy, port, source)?;
            }
        }
        Ok(())
    }
}
