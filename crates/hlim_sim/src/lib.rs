//! Four-state cycle simulator for hlim circuits.
//!
//! This crate compiles a [`Circuit`] into a flat bit-level state layout and
//! runs it against testbench tasks written as `async` blocks. Every bit has a
//! value and a defined flag, so uninitialized registers and undriven inputs
//! propagate as X instead of silently reading as zero.
//!
//! # Architecture
//!
//! - [`program`] lays out storage for every output and internal state and
//!   sorts the combinational nodes topologically.
//! - [`eval`] holds one [`NodeBehavior`](eval::NodeBehavior) per node kind.
//! - [`kernel`] schedules clock edges, resets and task wake-ups at exact
//!   rational times and runs delta rounds until each instant settles.
//! - [`fold`] reuses the behaviors to replace constant logic with constants.
//! - [`task`] gives tasks a [`SimContext`] to read ports, drive pins and wait.
//!
//! # Usage
//!
//! ```ignore
//! use hlim_sim::{SimConfig, Simulator};
//!
//! let mut sim = Simulator::new(circuit, SimConfig::default())?;
//! sim.spawn(|ctx| async move {
//!     ctx.set_pin(reset_pin, 0)?;
//!     ctx.wait_clock_cycles(clock, 10).await;
//!     ctx.check(ctx.get_pin_u64(done)? == Some(1), "not done after 10 cycles")
//! });
//! let result = sim.run()?;
//! println!("simulation ended at {}", result.final_time);
//! ```

#![warn(missing_docs)]

pub mod callbacks;
pub mod error;
pub mod eval;
pub mod fold;
pub mod kernel;
pub mod program;
pub mod task;
pub mod time;

use hlim_config::SimulationSettings;
use hlim_ir::Circuit;
use std::future::Future;

pub use callbacks::{CallbackList, ConsoleCallbacks, NullCallbacks, SimulatorCallbacks};
pub use error::SimError;
pub use fold::propagate_constants;
pub use kernel::{AssertionFailure, SimResult, Simulator, StopReason};
pub use program::{MappedNode, Program, Slot};
pub use task::{SimContext, TaskId, Wait};
pub use time::SimTime;

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Simulated time after which [`Simulator::run`] stops. `None` runs until
    /// every task finished.
    pub timeout: Option<SimTime>,
    /// Maximum number of evaluation rounds at a single instant.
    pub max_delta_cycles: u32,
    /// Report signal taps through `tracing`.
    pub console_output: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            max_delta_cycles: 1_000,
            console_output: true,
        }
    }
}

impl SimConfig {
    /// Builds a configuration from the `[simulation]` table of `hlim.toml`.
    pub fn from_settings(settings: &SimulationSettings) -> Result<Self, SimError> {
        Ok(Self {
            timeout: settings.timeout_seconds()?.map(SimTime::from_seconds),
            max_delta_cycles: settings.max_delta_cycles,
            console_output: settings.console_output,
        })
    }
}

/// Runs `circuit` with a single testbench task until it finishes.
pub fn simulate<F, Fut>(circuit: Circuit, config: SimConfig, testbench: F) -> Result<SimResult, SimError>
where
    F: FnOnce(SimContext) -> Fut,
    Fut: Future<Output = Result<(), SimError>> + 'static,
{
    let mut sim = Simulator::new(circuit, config)?;
    sim.spawn(testbench);
    sim.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlim_common::ClockRational;

    #[test]
    fn sim_config_default() {
        let config = SimConfig::default();
        assert!(config.timeout.is_none());
        assert_eq!(config.max_delta_cycles, 1000);
        assert!(config.console_output);
    }

    #[test]
    fn sim_config_from_settings() {
        let settings = SimulationSettings {
            timeout: Some("10us".into()),
            max_delta_cycles: 50,
            console_output: false,
        };
        let config = SimConfig::from_settings(&settings).unwrap();
        assert_eq!(
            config.timeout,
            Some(SimTime::from_seconds(ClockRational::new(1, 100_000)))
        );
        assert_eq!(config.max_delta_cycles, 50);
        assert!(!config.console_output);
    }

    #[test]
    fn sim_config_rejects_bad_timeout() {
        let settings = SimulationSettings {
            timeout: Some("soon".into()),
            ..SimulationSettings::default()
        };
        let err = SimConfig::from_settings(&settings).unwrap_err();
        assert!(matches!(err, SimError::Config(_)));
    }

    #[test]
    fn simulate_runs_single_task() {
        let config = SimConfig {
            console_output: false,
            ..SimConfig::default()
        };
        let result = simulate(Circuit::new(), config, |ctx| async move {
            ctx.wait_for(SimTime::from_ns(7)).await;
            Ok(())
        })
        .unwrap();
        assert_eq!(result.reason, StopReason::TasksFinished);
        assert_eq!(result.final_time, SimTime::from_ns(7));
    }
}
