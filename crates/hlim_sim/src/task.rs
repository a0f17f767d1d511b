//! Simulation tasks and the context they run with.
//!
//! A task is an `async` block driven by the simulator. It suspends only by
//! awaiting [`SimContext::wait_for`] or [`SimContext::wait_clock`]; each wait
//! registers a wake condition with the kernel and completes when the kernel
//! resumes the task. Tasks never run in parallel, so a task may read and
//! write the simulation state freely between waits.

use crate::error::SimError;
use crate::kernel::Kernel;
use crate::time::SimTime;
use futures::future::{FutureExt, LocalBoxFuture};
use hlim_common::BitState;
use hlim_ir::{ClockId, NodeId, NodePort};
use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// A boxed simulation task.
pub(crate) type TaskFuture = LocalBoxFuture<'static, Result<(), SimError>>;

/// Identifies a task. IDs grow in spawn order, which is also resumption order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

#[derive(Clone, Copy, Debug)]
enum WakeCondition {
    After(SimTime),
    Clock(ClockId),
}

/// Future returned by the wait operations of [`SimContext`].
#[must_use = "waits do nothing unless awaited"]
pub struct Wait {
    kernel: Rc<RefCell<Kernel>>,
    task: TaskId,
    condition: WakeCondition,
    registered: bool,
}

impl Future for Wait {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        let this = self.get_mut();
        if this.registered {
            return Poll::Ready(());
        }
        this.registered = true;
        let mut kernel = this.kernel.borrow_mut();
        match this.condition {
            WakeCondition::After(duration) => {
                let at = kernel.now() + duration;
                kernel.schedule_wake(this.task, at);
            }
            WakeCondition::Clock(clock) => kernel.wait_clock(this.task, clock),
        }
        Poll::Pending
    }
}

/// A task's handle on the running simulation.
#[derive(Clone)]
pub struct SimContext {
    kernel: Rc<RefCell<Kernel>>,
    task: TaskId,
}

impl SimContext {
    pub(crate) fn new(kernel: Rc<RefCell<Kernel>>, task: TaskId) -> Self {
        Self { kernel, task }
    }

    /// The task this context belongs to.
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.kernel.borrow().now()
    }

    /// Suspends for `duration`. A zero duration resumes in the next
    /// evaluation round of the same instant.
    pub fn wait_for(&self, duration: SimTime) -> Wait {
        self.wait(WakeCondition::After(duration))
    }

    /// Suspends until the next active edge of `clock` outside of reset.
    pub fn wait_clock(&self, clock: ClockId) -> Wait {
        self.wait(WakeCondition::Clock(clock))
    }

    /// Suspends for `cycles` active edges of `clock`.
    pub async fn wait_clock_cycles(&self, clock: ClockId, cycles: u64) {
        for _ in 0..cycles {
            self.wait_clock(clock).await;
        }
    }

    fn wait(&self, condition: WakeCondition) -> Wait {
        Wait {
            kernel: Rc::clone(&self.kernel),
            task: self.task,
            condition,
            registered: false,
        }
    }

    /// Current value of an output port.
    pub fn get(&self, port: NodePort) -> Result<BitState, SimError> {
        self.kernel.borrow().read_port(port)
    }

    /// Current value of an output port of at most 64 bits, `None` if any bit is undefined.
    pub fn get_u64(&self, port: NodePort) -> Result<Option<u64>, SimError> {
        Ok(self.get(port)?.to_u64())
    }

    /// Current value of a pin: the value driving an output pin or the value of an input pin.
    pub fn get_pin(&self, pin: NodeId) -> Result<BitState, SimError> {
        self.kernel.borrow().read_pin(pin)
    }

    /// Like [`get_pin`](Self::get_pin), `None` if any bit is undefined.
    pub fn get_pin_u64(&self, pin: NodeId) -> Result<Option<u64>, SimError> {
        Ok(self.get_pin(pin)?.to_u64())
    }

    /// Drives an input pin with a fully defined value.
    pub fn set_pin(&self, pin: NodeId, value: u64) -> Result<(), SimError> {
        let mut kernel = self.kernel.borrow_mut();
        let width = kernel.pin_width(pin)?;
        kernel.write_pin(pin, &BitState::from_u64(value, width))
    }

    /// Drives an input pin with an arbitrary state of the pin's width.
    pub fn set_pin_state(&self, pin: NodeId, value: &BitState) -> Result<(), SimError> {
        self.kernel.borrow_mut().write_pin(pin, value)
    }

    /// Makes every bit of an input pin undefined.
    pub fn set_pin_undefined(&self, pin: NodeId) -> Result<(), SimError> {
        let mut kernel = self.kernel.borrow_mut();
        let width = kernel.pin_width(pin)?;
        kernel.write_pin(pin, &BitState::undefined(width))
    }

    /// Forces the output of a register to `value`.
    ///
    /// The register keeps the forced value until its next active clock
    /// edge captures regular data again.
    pub fn override_register(&self, register: NodeId, value: &BitState) -> Result<(), SimError> {
        self.kernel.borrow_mut().override_register(register, value)
    }

    /// Fails the task with [`SimError::AssertionFailed`] unless `condition` holds.
    pub fn check(&self, condition: bool, message: impl Into<String>) -> Result<(), SimError> {
        if condition {
            Ok(())
        } else {
            Err(SimError::AssertionFailed {
                time: self.now(),
                message: message.into(),
            })
        }
    }

    /// Starts a sibling task. It runs later in the current round and is not
    /// joined by this task.
    pub fn fork<F, Fut>(&self, task: F) -> TaskId
    where
        F: FnOnce(SimContext) -> Fut,
        Fut: Future<Output = Result<(), SimError>> + 'static,
    {
        let id = self.kernel.borrow_mut().allocate_task();
        let future = task(SimContext::new(Rc::clone(&self.kernel), id)).boxed_local();
        self.kernel.borrow_mut().adopt_forked(id, future);
        id
    }

    /// Stops the whole simulation after the current task suspends.
    pub fn abort(&self) {
        self.kernel.borrow_mut().abort();
    }
}
