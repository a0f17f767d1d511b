//! Observer hooks invoked by the simulator.
//!
//! Waveform writers and other collaborators implement [`SimulatorCallbacks`]
//! to follow a run without touching scheduling internals. Every hook has an
//! empty default.

use crate::time::SimTime;
use hlim_ir::{ClockId, NodeId};

/// Receives simulation progress and signal-tap output.
pub trait SimulatorCallbacks {
    /// Called once after the circuit has been powered on.
    fn on_power_on(&mut self) {}

    /// Called when simulated time moves to a new instant.
    fn on_new_tick(&mut self, _time: SimTime) {}

    /// Called for every edge of every clock, active or not.
    fn on_clock_edge(&mut self, _clock: ClockId, _rising: bool) {}

    /// Called when a clock enters or leaves reset.
    fn on_reset(&mut self, _clock: ClockId, _in_reset: bool) {}

    /// Called when a debug signal tap fires.
    fn on_debug_message(&mut self, _node: NodeId, _text: &str) {}

    /// Called when a warning signal tap fires.
    fn on_warning(&mut self, _node: NodeId, _text: &str) {}

    /// Called when an assertion signal tap fires.
    fn on_assert(&mut self, _node: NodeId, _text: &str) {}
}

/// Callbacks that ignore everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCallbacks;

impl SimulatorCallbacks for NullCallbacks {}

/// Callbacks that report signal taps through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct ConsoleCallbacks {
    time: SimTime,
}

impl ConsoleCallbacks {
    /// Creates console callbacks.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulatorCallbacks for ConsoleCallbacks {
    fn on_new_tick(&mut self, time: SimTime) {
        self.time = time;
    }

    fn on_debug_message(&mut self, node: NodeId, text: &str) {
        tracing::info!(time = %self.time, %node, "{text}");
    }

    fn on_warning(&mut self, node: NodeId, text: &str) {
        tracing::warn!(time = %self.time, %node, "{text}");
    }

    fn on_assert(&mut self, node: NodeId, text: &str) {
        tracing::error!(time = %self.time, %node, "assertion failed: {text}");
    }
}

/// Forwards every hook to each of a list of callbacks in order.
#[derive(Default)]
pub struct CallbackList {
    targets: Vec<Box<dyn SimulatorCallbacks>>,
}

impl CallbackList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a receiver.
    pub fn push(&mut self, target: Box<dyn SimulatorCallbacks>) {
        self.targets.push(target);
    }

    /// Number of receivers.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Returns `true` if there are no receivers.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl SimulatorCallbacks for CallbackList {
    fn on_power_on(&mut self) {
        self.targets.iter_mut().for_each(|t| t.on_power_on());
    }

    fn on_new_tick(&mut self, time: SimTime) {
        self.targets.iter_mut().for_each(|t| t.on_new_tick(time));
    }

    fn on_clock_edge(&mut self, clock: ClockId, rising: bool) {
        self.targets.iter_mut().for_each(|t| t.on_clock_edge(clock, rising));
    }

    fn on_reset(&mut self, clock: ClockId, in_reset: bool) {
        self.targets.iter_mut().for_each(|t| t.on_reset(clock, in_reset));
    }

    fn on_debug_message(&mut self, node: NodeId, text: &str) {
        self.targets.iter_mut().for_each(|t| t.on_debug_message(node, text));
    }

    fn on_warning(&mut self, node: NodeId, text: &str) {
        self.targets.iter_mut().for_each(|t| t.on_warning(node, text));
    }

    fn on_assert(&mut self, node: NodeId, text: &str) {
        self.targets.iter_mut().for_each(|t| t.on_assert(node, text));
    }
}
