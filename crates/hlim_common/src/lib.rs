//! Shared foundational types used across the hlim hardware IR and simulator.
//!
//! This crate provides two-plane bit states for three-valued signal values,
//! the single-bit [`Logic`] type, and exact rational numbers for clock
//! frequencies and simulated time.

#![warn(missing_docs)]

pub mod bit_state;
pub mod logic;
pub mod rational;

pub use bit_state::{BitState, Plane, WORD_BITS};
pub use logic::Logic;
pub use rational::{ClockRational, ParseRationalError};
