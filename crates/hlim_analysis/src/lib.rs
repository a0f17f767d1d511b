//! Read-only analysis passes over hlim circuits.
//!
//! - [`infer_clock_domains`] assigns every output port the clock domain its
//!   value changes in.
//! - [`detect_unguarded_cdc`] reports paths between registers or memory
//!   ports on unrelated clocks that were not marked as intentional.
//!
//! Neither pass mutates the circuit.

#![warn(missing_docs)]

mod cdc;
mod domains;

pub use cdc::{detect_unguarded_cdc, CdcCrossing};
pub use domains::{infer_clock_domains, memory_write_clocks, ClockDomain};
