//! Per-kind simulation behavior.
//!
//! Each [`NodeKind`] maps to one [`NodeBehavior`] through [`behavior`]. A
//! behavior only sees the node's slots in the shared state through
//! [`NodeIo`], so kinds can be added without touching the kernel.

mod logic;
mod memory;
mod register;
mod routing;
mod tap;

use crate::callbacks::SimulatorCallbacks;
use crate::program::{MappedNode, Slot};
use hlim_common::{BitState, Logic, Plane, WORD_BITS};
use hlim_ir::{Node, NodeKind, ResetPolicy};

pub use logic::{ArithmeticEval, CompareEval, LogicEval, ShiftEval};
pub use memory::{MemPortEval, MemoryEval};
pub use register::RegisterEval;
pub use routing::{ConstantEval, MuxEval, PassThroughEval, RewireEval};
pub use tap::SignalTapEval;

/// Everything a behavior hook may touch.
pub struct NodeIo<'a> {
    /// The shared simulation state.
    pub state: &'a mut BitState,
    /// Observer hooks.
    pub callbacks: &'a mut dyn SimulatorCallbacks,
    /// The node being simulated.
    pub node: &'a Node,
    /// Its storage layout.
    pub slots: &'a MappedNode,
    /// Reset policy of the node's clock, the default for unclocked nodes.
    pub reset: ResetPolicy,
}

impl NodeIo<'_> {
    /// Driver slot of an input, `None` when unconnected.
    pub fn input(&self, port: usize) -> Option<Slot> {
        self.slots.inputs.get(port).copied().flatten()
    }

    /// Slot of an output.
    pub fn output(&self, port: usize) -> Slot {
        self.slots.outputs[port]
    }

    /// Internal state slot.
    pub fn internal(&self, index: usize) -> Slot {
        self.slots.internal[index]
    }

    /// Returns `true` if the input is connected and fully defined.
    pub fn input_defined(&self, port: usize) -> bool {
        self.input(port)
            .is_some_and(|s| self.state.all_defined(s.offset, s.width))
    }

    /// Value of an input of at most 64 bits, `None` if unconnected or not fully defined.
    pub fn input_u64(&self, port: usize) -> Option<u64> {
        let slot = self.input(port)?;
        if slot.width > WORD_BITS || !self.state.all_defined(slot.offset, slot.width) {
            return None;
        }
        Some(self.state.extract(Plane::Value, slot.offset, slot.width))
    }

    /// A single-bit input as [`Logic`], `unconnected` if it has no driver.
    pub fn input_logic(&self, port: usize, unconnected: Logic) -> Logic {
        match self.input(port) {
            Some(slot) if slot.width > 0 => self.state.get_logic(slot.offset),
            _ => unconnected,
        }
    }

    /// Makes every bit of a slot undefined.
    pub fn set_undefined(&mut self, slot: Slot) {
        self.state.clear_range(Plane::Defined, slot.offset, slot.width);
    }

    /// Writes a fully defined value into a slot of at most 64 bits.
    pub fn write_u64(&mut self, slot: Slot, value: u64) {
        self.state.insert(Plane::Value, slot.offset, slot.width, value);
        self.state.set_range(Plane::Defined, slot.offset, slot.width, true);
    }

    /// Copies `src` into `dst`, or makes `dst` undefined when `src` is `None`.
    pub fn copy_or_undefined(&mut self, dst: Slot, src: Option<Slot>) {
        match src {
            Some(src) => {
                let len = dst.width.min(src.width);
                self.state.copy_within(dst.offset, src.offset, len);
                if len < dst.width {
                    self.state
                        .clear_range(Plane::Defined, dst.offset + len, dst.width - len);
                }
            }
            None => self.set_undefined(dst),
        }
    }
}

/// Simulation hooks of one node kind. All hooks default to doing nothing.
pub trait NodeBehavior: Sync {
    /// Loads power-on content. The state has been cleared to undefined before.
    fn power_on(&self, _io: &mut NodeIo<'_>) {}

    /// Recomputes combinational outputs from the inputs.
    fn evaluate(&self, _io: &mut NodeIo<'_>) {}

    /// Reacts to an active edge of the node's clock.
    fn advance(&self, _io: &mut NodeIo<'_>) {}

    /// Reacts to the node's clock entering or leaving reset.
    fn reset_change(&self, _io: &mut NodeIo<'_>, _in_reset: bool) {}

    /// Runs once per instant after all evaluation rounds.
    fn commit(&self, _io: &mut NodeIo<'_>) {}
}

struct Inert;

impl NodeBehavior for Inert {}

/// The behavior of a node kind.
pub fn behavior(kind: &NodeKind) -> &'static dyn NodeBehavior {
    match kind {
        NodeKind::Signal | NodeKind::OutputPin | NodeKind::InputPin { .. } => &Inert,
        NodeKind::Constant { .. } => &ConstantEval,
        NodeKind::Logic(_) => &LogicEval,
        NodeKind::Compare(_) => &CompareEval,
        NodeKind::Arithmetic(_) => &ArithmeticEval,
        NodeKind::Shift { .. } => &ShiftEval,
        NodeKind::Multiplexer { .. } => &MuxEval,
        NodeKind::Rewire { .. } => &RewireEval,
        NodeKind::CdcMarker => &PassThroughEval,
        NodeKind::Register => &RegisterEval,
        NodeKind::Memory { .. } => &MemoryEval,
        NodeKind::MemPort { .. } => &MemPortEval,
        NodeKind::SignalTap { .. } => &SignalTapEval,
    }
}
