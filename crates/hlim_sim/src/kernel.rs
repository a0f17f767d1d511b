//! Simulation kernel: event queue, clocks, resets and the delta-round loop.
//!
//! [`Simulator`] owns the compiled [`Program`], the four-state [`BitState`]
//! holding every output and internal slot, and the tasks spawned by the
//! testbench. Time advances from one scheduled event to the next. At each
//! instant the kernel runs evaluation rounds until nothing is scheduled for
//! that instant any more:
//!
//! 1. clock edges advance the registers and memories on their clock,
//! 2. reset releases reach the nodes on their clock,
//! 3. the combinational part is re-evaluated in topological order,
//! 4. tasks due at this instant resume in [`TaskId`] order,
//! 5. task writes to pins are propagated by another evaluation.
//!
//! Signal taps commit once per instant after the last round. Events at one
//! instant are ordered edges first, then reset releases, then task wake-ups,
//! so runs are fully deterministic.

use crate::callbacks::{ConsoleCallbacks, NullCallbacks, SimulatorCallbacks};
use crate::error::SimError;
use crate::eval::{behavior, NodeBehavior, NodeIo};
use crate::program::Program;
use crate::task::{SimContext, TaskFuture, TaskId};
use crate::time::SimTime;
use crate::SimConfig;
use futures::future::FutureExt;
use hlim_common::{BitState, ClockRational};
use hlim_ir::{Circuit, ClockId, NodeId, NodeKind, NodePort, ResetKind, TriggerEdge};
use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};
use tracing::{debug, trace};

const RANK_EDGE: u8 = 0;
const RANK_RESET: u8 = 1;
const RANK_TASK: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Action {
    ClockEdge(ClockId),
    ResetRelease(ClockId),
    Wake(TaskId),
}

/// A scheduled event. Orders by time, then rank, then `order`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Event {
    time: SimTime,
    rank: u8,
    order: u64,
    action: Action,
}

#[derive(Debug)]
struct ClockState {
    half_period: ClockRational,
    trigger: TriggerEdge,
    level: bool,
    edges: i128,
    in_reset: bool,
}

/// A signal tap of level `Assert` that fired.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssertionFailure {
    /// When the tap fired.
    pub time: SimTime,
    /// The tap node.
    pub node: NodeId,
    /// The rendered message.
    pub message: String,
}

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// Every task completed.
    TasksFinished,
    /// A task or the testbench aborted the simulation.
    Aborted,
    /// The configured timeout was reached.
    Timeout,
    /// Nothing is scheduled any more: no clocks and no waiting tasks.
    Idle,
}

/// The result of a completed simulation run.
#[derive(Clone, Debug, Serialize)]
pub struct SimResult {
    /// Simulated time when the run ended.
    pub final_time: SimTime,
    /// Why the run ended.
    pub reason: StopReason,
    /// Assertion taps that fired during the run.
    pub assertion_failures: Vec<AssertionFailure>,
}

/// Kernel state shared between the simulator and its task contexts.
pub(crate) struct Kernel {
    program: Program,
    state: BitState,
    callbacks: Box<dyn SimulatorCallbacks>,
    config: SimConfig,
    now: SimTime,
    queue: BinaryHeap<Reverse<Event>>,
    next_seq: u64,
    clocks: BTreeMap<ClockId, ClockState>,
    clock_waiters: HashMap<ClockId, Vec<TaskId>>,
    ready: BTreeSet<TaskId>,
    forked: Vec<(TaskId, TaskFuture)>,
    next_task: u64,
    dirty: bool,
    aborted: bool,
    powered_on: bool,
    failures: Vec<AssertionFailure>,
}

/// Forwards every hook and records fired assertion taps.
struct Recording<'a> {
    inner: &'a mut dyn SimulatorCallbacks,
    failures: &'a mut Vec<AssertionFailure>,
    time: SimTime,
}

impl SimulatorCallbacks for Recording<'_> {
    fn on_power_on(&mut self) {
        self.inner.on_power_on();
    }

    fn on_new_tick(&mut self, time: SimTime) {
        self.inner.on_new_tick(time);
    }

    fn on_clock_edge(&mut self, clock: ClockId, rising: bool) {
        self.inner.on_clock_edge(clock, rising);
    }

    fn on_reset(&mut self, clock: ClockId, in_reset: bool) {
        self.inner.on_reset(clock, in_reset);
    }

    fn on_debug_message(&mut self, node: NodeId, message: &str) {
        self.inner.on_debug_message(node, message);
    }

    fn on_warning(&mut self, node: NodeId, message: &str) {
        self.inner.on_warning(node, message);
    }

    fn on_assert(&mut self, node: NodeId, message: &str) {
        self.failures.push(AssertionFailure {
            time: self.time,
            node,
            message: message.to_string(),
        });
        self.inner.on_assert(node, message);
    }
}

/// Runs one behavior hook of the node at `index`.
fn run_hook(
    program: &Program,
    state: &mut BitState,
    callbacks: &mut dyn SimulatorCallbacks,
    index: usize,
    hook: impl FnOnce(&dyn NodeBehavior, &mut NodeIo<'_>),
) {
    let mapped = &program.nodes()[index];
    let node = program.circuit().node(mapped.node);
    let reset = node
        .clock()
        .map(|c| program.circuit().clock(c).reset)
        .unwrap_or_default();
    let mut io = NodeIo {
        state,
        callbacks,
        node,
        slots: mapped,
        reset,
    };
    hook(behavior(node.kind()), &mut io);
}

impl Kernel {
    fn new(program: Program, config: SimConfig, callbacks: Box<dyn SimulatorCallbacks>) -> Self {
        let state = program.new_state();
        Self {
            program,
            state,
            callbacks,
            config,
            now: SimTime::ZERO,
            queue: BinaryHeap::new(),
            next_seq: 0,
            clocks: BTreeMap::new(),
            clock_waiters: HashMap::new(),
            ready: BTreeSet::new(),
            forked: Vec::new(),
            next_task: 0,
            dirty: false,
            aborted: false,
            powered_on: false,
            failures: Vec::new(),
        }
    }

    pub(crate) fn now(&self) -> SimTime {
        self.now
    }

    pub(crate) fn allocate_task(&mut self) -> TaskId {
        let id = TaskId(self.next_task);
        self.next_task += 1;
        id
    }

    pub(crate) fn adopt_forked(&mut self, id: TaskId, future: TaskFuture) {
        self.forked.push((id, future));
    }

    pub(crate) fn abort(&mut self) {
        self.aborted = true;
    }

    pub(crate) fn schedule_wake(&mut self, task: TaskId, time: SimTime) {
        self.queue.push(Reverse(Event {
            time,
            rank: RANK_TASK,
            order: task.0,
            action: Action::Wake(task),
        }));
    }

    /// Registers `task` for the next active edge of `clock`. Unknown clocks never wake it.
    pub(crate) fn wait_clock(&mut self, task: TaskId, clock: ClockId) {
        self.clock_waiters.entry(clock).or_default().push(task);
    }

    fn schedule(&mut self, time: SimTime, rank: u8, action: Action) {
        let order = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Event {
            time,
            rank,
            order,
            action,
        }));
    }

    fn peek_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|Reverse(e)| e.time)
    }

    fn take_events_at(&mut self, time: SimTime) -> Vec<Action> {
        let mut actions = Vec::new();
        while self.queue.peek().is_some_and(|Reverse(e)| e.time == time) {
            if let Some(Reverse(event)) = self.queue.pop() {
                actions.push(event.action);
            }
        }
        actions
    }

    fn pin_label(&self, pin: NodeId) -> String {
        match self.program.circuit().try_node(pin) {
            Ok(node) => node.label(),
            Err(_) => pin.to_string(),
        }
    }

    pub(crate) fn pin_width(&self, pin: NodeId) -> Result<usize, SimError> {
        match self.program.circuit().try_node(pin).map(|n| n.kind()) {
            Ok(NodeKind::InputPin { ty }) => Ok(ty.width),
            _ => Err(SimError::InvalidPin {
                node: self.pin_label(pin),
            }),
        }
    }

    /// Drives an input pin. The new value is visible after the next evaluation.
    pub(crate) fn write_pin(&mut self, pin: NodeId, value: &BitState) -> Result<(), SimError> {
        let width = self.pin_width(pin)?;
        if value.size() != width {
            return Err(SimError::WidthMismatch {
                node: self.pin_label(pin),
                expected: width,
                found: value.size(),
            });
        }
        let index = self
            .program
            .index_of(pin)
            .ok_or_else(|| SimError::InvalidPin {
                node: self.pin_label(pin),
            })?;
        let mapped = &self.program.nodes()[index];
        for slot in [mapped.internal[0], mapped.outputs[0]] {
            self.state.copy_range(slot.offset, value, 0, width);
        }
        self.dirty = true;
        Ok(())
    }

    /// Overwrites the output of a register until its next active clock edge.
    pub(crate) fn override_register(&mut self, register: NodeId, value: &BitState) -> Result<(), SimError> {
        let node = self
            .program
            .circuit()
            .try_node(register)
            .map_err(|_| SimError::NotARegister {
                node: register.to_string(),
            })?;
        if !matches!(node.kind(), NodeKind::Register) {
            return Err(SimError::NotARegister { node: node.label() });
        }
        let slot = self
            .program
            .output_slot(NodePort::first(register))
            .ok_or_else(|| SimError::NotARegister { node: node.label() })?;
        if value.size() != slot.width {
            return Err(SimError::WidthMismatch {
                node: node.label(),
                expected: slot.width,
                found: value.size(),
            });
        }
        if !self.state.equal_range(slot.offset, value, 0, slot.width) {
            self.state.copy_range(slot.offset, value, 0, slot.width);
            self.dirty = true;
        }
        Ok(())
    }

    pub(crate) fn read_port(&self, port: NodePort) -> Result<BitState, SimError> {
        let slot = self
            .program
            .output_slot(port)
            .ok_or_else(|| SimError::UnknownOutput {
                port: port.to_string(),
            })?;
        Ok(self.state.extract_state(slot.offset, slot.width))
    }

    pub(crate) fn read_pin(&self, pin: NodeId) -> Result<BitState, SimError> {
        let node = self
            .program
            .circuit()
            .try_node(pin)
            .map_err(|_| SimError::InvalidPin {
                node: pin.to_string(),
            })?;
        match node.kind() {
            NodeKind::InputPin { .. } => self.read_port(NodePort::first(pin)),
            NodeKind::OutputPin => match node.driver(0) {
                Some(driver) => self.read_port(driver),
                None => Ok(BitState::new(0)),
            },
            _ => Err(SimError::InvalidPin { node: node.label() }),
        }
    }

    fn run_hooks_on(&mut self, indices: &[usize], hook: impl Fn(&dyn NodeBehavior, &mut NodeIo<'_>)) {
        for &index in indices {
            run_hook(&self.program, &mut self.state, self.callbacks.as_mut(), index, &hook);
        }
    }

    fn reevaluate(&mut self) {
        let Kernel {
            program,
            state,
            callbacks,
            ..
        } = self;
        for &index in program.order() {
            run_hook(program, state, callbacks.as_mut(), index, |b, io| b.evaluate(io));
        }
        self.dirty = false;
    }

    fn commit(&mut self) {
        let Kernel {
            program,
            state,
            callbacks,
            failures,
            now,
            ..
        } = self;
        let mut recording = Recording {
            inner: callbacks.as_mut(),
            failures,
            time: *now,
        };
        for &index in program.taps() {
            run_hook(program, state, &mut recording, index, |b, io| b.commit(io));
        }
    }

    fn power_on(&mut self) {
        debug!(nodes = self.program.nodes().len(), bits = self.program.state_width(), "powering on");
        self.state = self.program.new_state();
        self.now = SimTime::ZERO;
        self.queue.clear();
        self.clocks.clear();
        self.clock_waiters.clear();
        self.ready.clear();
        self.forked.clear();
        self.failures.clear();
        self.dirty = false;
        self.aborted = false;

        let (unclocked, clocked): (Vec<usize>, Vec<usize>) = (0..self.program.nodes().len())
            .partition(|&i| {
                let node = self.program.circuit().node(self.program.nodes()[i].node);
                node.kind().num_clocks() == 0
            });
        // Registers load reset values computed by the combinational part.
        self.run_hooks_on(&unclocked, |b, io| b.power_on(io));
        self.reevaluate();
        self.run_hooks_on(&clocked, |b, io| b.power_on(io));

        let clocks: Vec<_> = self
            .program
            .circuit()
            .clocks()
            .map(|(id, clock)| (id, clock.trigger, clock.reset))
            .collect();
        for (id, trigger, reset) in clocks {
            let frequency = self.program.circuit().absolute_frequency(id);
            let Some(period) = frequency.recip() else {
                continue;
            };
            let half_period = period / ClockRational::from_integer(2);
            self.clocks.insert(
                id,
                ClockState {
                    half_period,
                    trigger,
                    level: trigger != TriggerEdge::Falling,
                    edges: 0,
                    in_reset: false,
                },
            );
            self.schedule(SimTime::from_seconds(half_period), RANK_EDGE, Action::ClockEdge(id));
            if reset.kind != ResetKind::None && reset.min_reset_cycles > 0 {
                self.set_reset(id, true);
                let release = period * ClockRational::from_integer(i128::from(reset.min_reset_cycles));
                self.schedule(SimTime::from_seconds(release), RANK_RESET, Action::ResetRelease(id));
            }
        }
        self.reevaluate();
        self.powered_on = true;
        self.callbacks.on_power_on();
    }

    fn set_reset(&mut self, clock: ClockId, in_reset: bool) {
        if let Some(state) = self.clocks.get_mut(&clock) {
            state.in_reset = in_reset;
        }
        trace!(%clock, in_reset, time = %self.now, "reset");
        let nodes = self.program.clocked_by(clock).to_vec();
        self.run_hooks_on(&nodes, |b, io| b.reset_change(io, in_reset));
        self.callbacks.on_reset(clock, in_reset);
    }

    fn clock_edge(&mut self, clock: ClockId) {
        let Some(state) = self.clocks.get_mut(&clock) else {
            return;
        };
        state.level = !state.level;
        state.edges += 1;
        let rising = state.level;
        let active = state.trigger.is_active(rising);
        let releases_waiters = active && !state.in_reset;
        let next = state.half_period * ClockRational::from_integer(state.edges + 1);
        self.schedule(SimTime::from_seconds(next), RANK_EDGE, Action::ClockEdge(clock));

        trace!(%clock, rising, time = %self.now, "clock edge");
        self.callbacks.on_clock_edge(clock, rising);
        if active {
            let nodes = self.program.clocked_by(clock).to_vec();
            self.run_hooks_on(&nodes, |b, io| b.advance(io));
        }
        if releases_waiters {
            if let Some(waiters) = self.clock_waiters.remove(&clock) {
                self.ready.extend(waiters);
            }
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::ClockEdge(clock) => self.clock_edge(clock),
            Action::ResetRelease(clock) => self.set_reset(clock, false),
            Action::Wake(task) => {
                self.ready.insert(task);
            }
        }
    }
}

/// A cycle simulator for one circuit, driven by cooperative tasks.
///
/// Construct with [`Simulator::new`], [`spawn`](Simulator::spawn) the
/// testbench tasks, then [`run`](Simulator::run) or step with
/// [`advance`](Simulator::advance). Power-on happens implicitly before the
/// first step.
pub struct Simulator {
    kernel: Rc<RefCell<Kernel>>,
    tasks: BTreeMap<TaskId, TaskFuture>,
}

impl Simulator {
    /// Compiles `circuit` for simulation. Signal taps report to the console
    /// through `tracing` when `config.console_output` is set.
    pub fn new(circuit: Circuit, config: SimConfig) -> Result<Self, SimError> {
        let callbacks: Box<dyn SimulatorCallbacks> = if config.console_output {
            Box::new(ConsoleCallbacks::new())
        } else {
            Box::new(NullCallbacks)
        };
        Self::with_callbacks(circuit, config, callbacks)
    }

    /// Compiles `circuit` for simulation, reporting to `callbacks`.
    pub fn with_callbacks(
        circuit: Circuit,
        config: SimConfig,
        callbacks: Box<dyn SimulatorCallbacks>,
    ) -> Result<Self, SimError> {
        let program = Program::compile(circuit)?;
        Ok(Self {
            kernel: Rc::new(RefCell::new(Kernel::new(program, config, callbacks))),
            tasks: BTreeMap::new(),
        })
    }

    /// The simulated circuit.
    pub fn circuit(&self) -> Ref<'_, Circuit> {
        Ref::map(self.kernel.borrow(), |k| k.program.circuit())
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.kernel.borrow().now
    }

    /// Returns `true` once the simulation has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.kernel.borrow().aborted
    }

    /// Current value of an output port.
    pub fn value(&self, port: NodePort) -> Result<BitState, SimError> {
        self.kernel.borrow().read_port(port)
    }

    /// Assertion taps that fired so far.
    pub fn assertion_failures(&self) -> Vec<AssertionFailure> {
        self.kernel.borrow().failures.clone()
    }

    /// Adds a task. Tasks spawned before power-on start at time zero in spawn
    /// order; later ones start at the current time.
    pub fn spawn<F, Fut>(&mut self, task: F) -> TaskId
    where
        F: FnOnce(SimContext) -> Fut,
        Fut: Future<Output = Result<(), SimError>> + 'static,
    {
        let id = self.kernel.borrow_mut().allocate_task();
        let future = task(SimContext::new(Rc::clone(&self.kernel), id)).boxed_local();
        self.tasks.insert(id, future);
        let mut kernel = self.kernel.borrow_mut();
        if kernel.powered_on {
            let now = kernel.now;
            kernel.schedule_wake(id, now);
        }
        id
    }

    /// Resets all state, loads power-on values, asserts the initial resets
    /// and runs time zero.
    ///
    /// Powering on again restarts the circuit from time zero and drops every
    /// task, since their waits refer to the previous run. Spawn fresh tasks
    /// afterwards.
    pub fn power_on(&mut self) -> Result<(), SimError> {
        {
            let mut kernel = self.kernel.borrow_mut();
            if kernel.powered_on {
                self.tasks.clear();
            }
            kernel.power_on();
            for &id in self.tasks.keys() {
                kernel.schedule_wake(id, SimTime::ZERO);
            }
        }
        self.process_instant(SimTime::ZERO)
    }

    fn ensure_powered_on(&mut self) -> Result<(), SimError> {
        if self.kernel.borrow().powered_on {
            Ok(())
        } else {
            self.power_on()
        }
    }

    /// Processes the next instant that has events. Returns `false` when
    /// nothing is scheduled or the simulation was aborted.
    pub fn advance_event(&mut self) -> Result<bool, SimError> {
        self.ensure_powered_on()?;
        let next = {
            let kernel = self.kernel.borrow();
            if kernel.aborted {
                return Ok(false);
            }
            kernel.peek_time()
        };
        let Some(time) = next else {
            return Ok(false);
        };
        self.process_instant(time)?;
        Ok(true)
    }

    /// Processes every instant up to and including `now + duration`.
    pub fn advance(&mut self, duration: SimTime) -> Result<(), SimError> {
        self.ensure_powered_on()?;
        let target = self.now() + duration;
        loop {
            let next = {
                let kernel = self.kernel.borrow();
                if kernel.aborted {
                    return Ok(());
                }
                kernel.peek_time()
            };
            match next {
                Some(time) if time <= target => self.process_instant(time)?,
                _ => break,
            }
        }
        self.kernel.borrow_mut().now = target;
        Ok(())
    }

    /// Runs until every task finished, the simulation was aborted, the
    /// configured timeout passed or nothing is left to do.
    pub fn run(&mut self) -> Result<SimResult, SimError> {
        self.ensure_powered_on()?;
        let timeout = self.kernel.borrow().config.timeout;
        let reason = loop {
            if self.is_aborted() {
                break StopReason::Aborted;
            }
            if self.tasks.is_empty() {
                break StopReason::TasksFinished;
            }
            let Some(next) = self.kernel.borrow().peek_time() else {
                break StopReason::Idle;
            };
            if let Some(limit) = timeout {
                if next > limit {
                    self.kernel.borrow_mut().now = limit;
                    break StopReason::Timeout;
                }
            }
            self.process_instant(next)?;
        };
        let kernel = self.kernel.borrow();
        debug!(time = %kernel.now, ?reason, "simulation stopped");
        Ok(SimResult {
            final_time: kernel.now,
            reason,
            assertion_failures: kernel.failures.clone(),
        })
    }

    /// Stops the simulation. Pending events stay queued but are not processed.
    pub fn abort(&mut self) {
        self.kernel.borrow_mut().abort();
    }

    fn process_instant(&mut self, time: SimTime) -> Result<(), SimError> {
        let max = {
            let mut kernel = self.kernel.borrow_mut();
            kernel.now = time;
            kernel.callbacks.on_new_tick(time);
            kernel.config.max_delta_cycles
        };
        let mut rounds = 0u32;
        loop {
            let actions = self.kernel.borrow_mut().take_events_at(time);
            if actions.is_empty() {
                break;
            }
            rounds += 1;
            if rounds > max {
                self.kernel.borrow_mut().abort();
                return Err(SimError::DeltaCycleLimit { time, max });
            }
            {
                let mut kernel = self.kernel.borrow_mut();
                for action in actions {
                    kernel.apply(action);
                }
                kernel.reevaluate();
            }
            self.resume_ready()?;
            let mut kernel = self.kernel.borrow_mut();
            if kernel.dirty {
                kernel.reevaluate();
            }
            if kernel.aborted {
                break;
            }
        }
        self.kernel.borrow_mut().commit();
        Ok(())
    }

    fn resume_ready(&mut self) -> Result<(), SimError> {
        loop {
            let next = {
                let mut kernel = self.kernel.borrow_mut();
                if kernel.aborted {
                    return Ok(());
                }
                kernel.ready.pop_first()
            };
            let Some(id) = next else {
                return Ok(());
            };
            self.resume(id)?;
        }
    }

    fn resume(&mut self, id: TaskId) -> Result<(), SimError> {
        let Some(mut future) = self.tasks.remove(&id) else {
            return Ok(());
        };
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        let outcome = future.as_mut().poll(&mut cx);

        let forked = std::mem::take(&mut self.kernel.borrow_mut().forked);
        for (child, child_future) in forked {
            self.tasks.insert(child, child_future);
            self.kernel.borrow_mut().ready.insert(child);
        }

        match outcome {
            Poll::Pending => {
                self.tasks.insert(id, future);
                Ok(())
            }
            Poll::Ready(Ok(())) => {
                trace!(task = %id, "task finished");
                Ok(())
            }
            Poll::Ready(Err(err)) => {
                debug!(task = %id, error = %err, "task failed");
                self.kernel.borrow_mut().abort();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlim_ir::kind::register;
    use hlim_ir::{ArithmeticOp, ClockConfig, ConnectionType, ResetPolicy};

    fn quiet() -> SimConfig {
        SimConfig {
            console_output: false,
            ..SimConfig::default()
        }
    }

    fn clock_100mhz(c: &mut Circuit, reset: ResetPolicy, trigger: TriggerEdge) -> ClockId {
        let mut cfg = ClockConfig::new("clk", ClockRational::from_integer(100_000_000));
        cfg.reset = reset;
        cfg.trigger = trigger;
        c.create_clock(cfg).unwrap()
    }

    /// An 8-bit counter that starts at 0.
    fn counter(reset: ResetPolicy) -> (Circuit, ClockId, NodeId) {
        let mut c = Circuit::new();
        let root = c.root_group();
        let clk = clock_100mhz(&mut c, reset, TriggerEdge::Rising);
        let zero = c.constant_u64(root, 0, 8).unwrap();
        let reg = c.register(root, clk, None, Some(zero), None).unwrap();
        let one = c.constant_u64(root, 1, 8).unwrap();
        let next = c
            .arithmetic(root, ArithmeticOp::Add, NodePort::first(reg), one)
            .unwrap();
        c.connect_input(reg, register::DATA, next).unwrap();
        (c, clk, reg)
    }

    #[derive(Default)]
    struct Recorder {
        time: SimTime,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl SimulatorCallbacks for Recorder {
        fn on_new_tick(&mut self, time: SimTime) {
            self.time = time;
        }

        fn on_clock_edge(&mut self, _clock: ClockId, rising: bool) {
            let edge = if rising { "rise" } else { "fall" };
            self.log.borrow_mut().push(format!("{} {edge}", self.time));
        }

        fn on_reset(&mut self, _clock: ClockId, in_reset: bool) {
            let what = if in_reset { "reset" } else { "release" };
            self.log.borrow_mut().push(format!("{} {what}", self.time));
        }
    }

    fn recorded(circuit: Circuit) -> (Simulator, Rc<RefCell<Vec<String>>>) {
        let recorder = Recorder::default();
        let log = Rc::clone(&recorder.log);
        let sim = Simulator::with_callbacks(circuit, quiet(), Box::new(recorder)).unwrap();
        (sim, log)
    }

    #[test]
    fn clock_edges_every_half_period() {
        let mut c = Circuit::new();
        clock_100mhz(&mut c, ResetPolicy::power_on_only(), TriggerEdge::Rising);
        let (mut sim, log) = recorded(c);
        sim.advance(SimTime::from_ns(30)).unwrap();
        assert_eq!(
            *log.borrow(),
            ["5 ns fall", "10 ns rise", "15 ns fall", "20 ns rise", "25 ns fall", "30 ns rise"]
        );
        assert_eq!(sim.now(), SimTime::from_ns(30));
    }

    #[test]
    fn falling_clock_starts_low() {
        let mut c = Circuit::new();
        clock_100mhz(&mut c, ResetPolicy::power_on_only(), TriggerEdge::Falling);
        let (mut sim, log) = recorded(c);
        sim.advance(SimTime::from_ns(10)).unwrap();
        assert_eq!(*log.borrow(), ["5 ns rise", "10 ns fall"]);
    }

    #[test]
    fn reset_released_after_min_cycles() {
        let mut c = Circuit::new();
        let reset = ResetPolicy {
            min_reset_cycles: 2,
            ..ResetPolicy::default()
        };
        clock_100mhz(&mut c, reset, TriggerEdge::Rising);
        let (mut sim, log) = recorded(c);
        sim.advance(SimTime::from_ns(20)).unwrap();
        assert_eq!(
            *log.borrow(),
            ["0 ns reset", "5 ns fall", "10 ns rise", "15 ns fall", "20 ns rise", "20 ns release"]
        );
    }

    #[test]
    fn counter_counts_after_reset() {
        let (c, clk, reg) = counter(ResetPolicy::default());
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            let count = NodePort::first(reg);
            ctx.check(ctx.get_u64(count)? == Some(0), "counter starts at 0")?;
            // The edge at 10 ns is still in reset.
            ctx.wait_clock(clk).await;
            ctx.check(ctx.now() == SimTime::from_ns(20), "first edge after reset")?;
            ctx.check(ctx.get_u64(count)? == Some(1), "one edge counted")?;
            ctx.wait_clock_cycles(clk, 3).await;
            ctx.check(ctx.now() == SimTime::from_ns(50), "three more edges")?;
            ctx.check(ctx.get_u64(count)? == Some(4), "four edges counted")
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
        assert_eq!(result.final_time, SimTime::from_ns(50));
    }

    #[test]
    fn counter_without_reset_counts_from_first_edge() {
        let (c, clk, reg) = counter(ResetPolicy::power_on_only());
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            ctx.wait_clock(clk).await;
            ctx.check(ctx.now() == SimTime::from_ns(10), "first rising edge")?;
            ctx.check(ctx.get_u64(NodePort::first(reg))? == Some(1), "counted")
        });
        sim.run().unwrap();
    }

    #[test]
    fn tasks_resume_in_spawn_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        for name in ["a", "b", "c"] {
            let log = Rc::clone(&log);
            sim.spawn(move |ctx| async move {
                log.borrow_mut().push(format!("{name}@{}", ctx.now()));
                ctx.wait_for(SimTime::from_ns(10)).await;
                log.borrow_mut().push(format!("{name}@{}", ctx.now()));
                Ok(())
            });
        }
        sim.run().unwrap();
        assert_eq!(
            *log.borrow(),
            ["a@0 ns", "b@0 ns", "c@0 ns", "a@10 ns", "b@10 ns", "c@10 ns"]
        );
    }

    #[test]
    fn forked_task_runs_in_same_round() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        let parent_log = Rc::clone(&log);
        sim.spawn(move |ctx| async move {
            ctx.wait_for(SimTime::from_ns(3)).await;
            let child_log = Rc::clone(&parent_log);
            ctx.fork(move |child| async move {
                child_log.borrow_mut().push(format!("child@{}", child.now()));
                Ok(())
            });
            parent_log.borrow_mut().push(format!("parent@{}", ctx.now()));
            Ok(())
        });
        let result = sim.run().unwrap();
        assert_eq!(*log.borrow(), ["parent@3 ns", "child@3 ns"]);
        assert_eq!(result.final_time, SimTime::from_ns(3));
    }

    #[test]
    fn pin_writes_visible_after_zero_wait() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let pin = c.input_pin(root, "a", ConnectionType::boolean()).unwrap();
        let inverted = c.not(root, NodePort::first(pin)).unwrap();
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            ctx.set_pin(pin, 1)?;
            ctx.check(ctx.get_u64(inverted)?.is_none(), "not yet evaluated")?;
            ctx.wait_for(SimTime::ZERO).await;
            ctx.check(ctx.get_u64(inverted)? == Some(0), "inverted")?;
            ctx.check(ctx.now() == SimTime::ZERO, "still at power-on")?;
            ctx.set_pin_undefined(pin)?;
            ctx.wait_for(SimTime::ZERO).await;
            ctx.check(ctx.get_pin(pin)?.to_u64().is_none(), "pin undefined")
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
    }

    #[test]
    fn pin_errors() {
        let (mut c, _, reg) = counter(ResetPolicy::default());
        let root = c.root_group();
        let pin = c.input_pin(root, "a", ConnectionType::bit_vector(4)).unwrap();
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            let err = ctx.set_pin(reg, 1).unwrap_err();
            assert!(matches!(err, SimError::InvalidPin { .. }));
            let err = ctx.set_pin_state(pin, &BitState::from_u64(1, 5)).unwrap_err();
            assert!(matches!(
                err,
                SimError::WidthMismatch {
                    expected: 4,
                    found: 5,
                    ..
                }
            ));
            let err = ctx.get(NodePort::new(reg, 3)).unwrap_err();
            assert!(matches!(err, SimError::UnknownOutput { .. }));
            Ok(())
        });
        sim.run().unwrap();
    }

    #[test]
    fn endless_zero_waits_hit_delta_limit() {
        let config = SimConfig {
            max_delta_cycles: 10,
            ..quiet()
        };
        let mut sim = Simulator::new(Circuit::new(), config).unwrap();
        sim.spawn(|ctx| async move {
            for _ in 0..100 {
                ctx.wait_for(SimTime::ZERO).await;
            }
            Ok(())
        });
        let err = sim.run().unwrap_err();
        assert!(matches!(err, SimError::DeltaCycleLimit { max: 10, .. }));
        assert!(sim.is_aborted());
    }

    #[test]
    fn failing_task_stops_simulation() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        sim.spawn(|ctx| async move {
            ctx.wait_for(SimTime::from_ns(5)).await;
            ctx.check(false, "boom")
        });
        let late = Rc::clone(&log);
        sim.spawn(move |ctx| async move {
            ctx.wait_for(SimTime::from_ns(20)).await;
            late.borrow_mut().push("late");
            Ok(())
        });
        let err = sim.run().unwrap_err();
        assert_eq!(err.to_string(), "assertion failed at 5 ns: boom");
        assert!(log.borrow().is_empty());
        assert!(!sim.advance_event().unwrap());
    }

    #[test]
    fn abort_from_task() {
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        sim.spawn(|ctx| async move {
            for _ in 0..1000 {
                ctx.wait_for(SimTime::from_ns(1)).await;
            }
            Ok(())
        });
        sim.spawn(|ctx| async move {
            ctx.wait_for(SimTime::from_ns(10)).await;
            ctx.abort();
            Ok(())
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::Aborted);
        assert_eq!(result.final_time, SimTime::from_ns(10));
    }

    #[test]
    fn timeout_stops_run() {
        let config = SimConfig {
            timeout: Some(SimTime::from_ns(50)),
            ..quiet()
        };
        let mut sim = Simulator::new(Circuit::new(), config).unwrap();
        sim.spawn(|ctx| async move {
            for _ in 0..1000 {
                ctx.wait_for(SimTime::from_ns(20)).await;
            }
            Ok(())
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::Timeout);
        assert_eq!(result.final_time, SimTime::from_ns(50));
    }

    #[test]
    fn waiting_on_missing_clock_goes_idle() {
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        sim.spawn(|ctx| async move {
            ctx.wait_clock(ClockId::from_raw(3)).await;
            Ok(())
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::Idle);
    }

    #[test]
    fn assertion_taps_are_recorded() {
        let mut c = Circuit::new();
        let root = c.root_group();
        let ok = c.input_pin(root, "ok", ConnectionType::boolean()).unwrap();
        let tap = c.assert_that(root, NodePort::first(ok), "ok dropped").unwrap();
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            ctx.set_pin(ok, 1)?;
            ctx.wait_for(SimTime::from_ns(10)).await;
            ctx.set_pin(ok, 0)?;
            ctx.wait_for(SimTime::from_ns(10)).await;
            ctx.set_pin(ok, 1)?;
            ctx.wait_for(SimTime::from_ns(10)).await;
            Ok(())
        });
        let result = sim.run().unwrap();
        assert_eq!(
            result.assertion_failures,
            [AssertionFailure {
                time: SimTime::from_ns(10),
                node: tap,
                message: "ok dropped".into(),
            }]
        );
    }

    #[test]
    fn spawn_after_power_on_starts_now() {
        let mut sim = Simulator::new(Circuit::new(), quiet()).unwrap();
        sim.advance(SimTime::from_ns(8)).unwrap();
        let started = Rc::new(RefCell::new(None));
        let seen = Rc::clone(&started);
        sim.spawn(move |ctx| async move {
            *seen.borrow_mut() = Some(ctx.now());
            Ok(())
        });
        sim.run().unwrap();
        assert_eq!(*started.borrow(), Some(SimTime::from_ns(8)));
    }

    #[test]
    fn register_override_lasts_until_next_edge() {
        let (c, clk, reg) = counter(ResetPolicy::power_on_only());
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            let count = NodePort::first(reg);
            ctx.wait_clock(clk).await;
            ctx.check(ctx.get_u64(count)? == Some(1), "first edge counted")?;
            ctx.override_register(reg, &BitState::from_u64(100, 8))?;
            ctx.wait_for(SimTime::ZERO).await;
            ctx.check(ctx.get_u64(count)? == Some(100), "override visible")?;
            ctx.wait_clock(clk).await;
            ctx.check(ctx.get_u64(count)? == Some(101), "counting resumes from the override")
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
        assert_eq!(result.final_time, SimTime::from_ns(20));
    }

    #[test]
    fn register_override_rejects_other_nodes() {
        let (mut c, _, reg) = counter(ResetPolicy::power_on_only());
        let root = c.root_group();
        let pin = c.input_pin(root, "in", ConnectionType::bit_vector(8)).unwrap();
        let mut sim = Simulator::new(c, quiet()).unwrap();
        let outcome = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&outcome);
        sim.spawn(move |ctx| async move {
            let mut seen = seen.borrow_mut();
            seen.push(ctx.override_register(pin, &BitState::from_u64(1, 8)).map_err(|e| e.to_string()));
            seen.push(ctx.override_register(reg, &BitState::from_u64(1, 4)).map_err(|e| e.to_string()));
            Ok(())
        });
        sim.run().unwrap();
        let outcome = outcome.borrow();
        assert!(matches!(&outcome[0], Err(msg) if msg.ends_with("is not a register")));
        assert!(matches!(&outcome[1], Err(msg) if msg.contains("expected 8 bits, found 4")));
    }

    #[test]
    fn repeated_power_on_restarts_and_drops_tasks() {
        let (c, clk, reg) = counter(ResetPolicy::power_on_only());
        let count = NodePort::first(reg);
        let mut sim = Simulator::new(c, quiet()).unwrap();
        sim.spawn(move |ctx| async move {
            ctx.wait_for(SimTime::from_ns(100)).await;
            Ok(())
        });
        sim.advance(SimTime::from_ns(35)).unwrap();
        assert_eq!(sim.value(count).unwrap().to_u64(), Some(3));

        sim.power_on().unwrap();
        assert_eq!(sim.now(), SimTime::ZERO);
        assert_eq!(sim.value(count).unwrap().to_u64(), Some(0));
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
        assert_eq!(result.final_time, SimTime::ZERO);

        sim.spawn(move |ctx| async move {
            ctx.wait_clock(clk).await;
            ctx.check(ctx.get_u64(count)? == Some(1), "counts again from zero")
        });
        let result = sim.run().unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
        assert_eq!(result.final_time, SimTime::from_ns(10));
    }
}
