//! Clocks, derived clocks and reset policies.
//!
//! Root clocks carry an absolute frequency. Derived clocks carry a rational
//! multiplier relative to exactly one parent, so absolute frequencies are
//! computed exactly by walking up the chain.

use crate::circuit::Circuit;
use crate::error::IrError;
use crate::ids::ClockId;
use hlim_common::ClockRational;
use serde::{Deserialize, Serialize};

/// Which clock transitions are active.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum TriggerEdge {
    /// Low-to-high transitions.
    #[default]
    Rising,
    /// High-to-low transitions.
    Falling,
    /// Both transitions.
    Both,
}

impl TriggerEdge {
    /// The opposite edge. `Both` stays `Both`.
    pub fn inverted(self) -> Self {
        match self {
            TriggerEdge::Rising => TriggerEdge::Falling,
            TriggerEdge::Falling => TriggerEdge::Rising,
            TriggerEdge::Both => TriggerEdge::Both,
        }
    }

    /// Returns `true` if a transition to `rising` is active for this trigger.
    pub fn is_active(self, rising: bool) -> bool {
        match self {
            TriggerEdge::Rising => rising,
            TriggerEdge::Falling => !rising,
            TriggerEdge::Both => true,
        }
    }
}

/// How registers on a clock are reset.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ResetKind {
    /// No reset.
    None,
    /// Reset value loaded on active edges while reset is asserted.
    #[default]
    Sync,
    /// Reset value loaded immediately when reset is asserted.
    Async,
}

/// Active level of the reset signal in emitted hardware.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
pub enum ResetActive {
    /// Reset when high.
    #[default]
    High,
    /// Reset when low.
    Low,
}

/// Reset behavior shared by every register and memory port on a clock.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct ResetPolicy {
    /// Reset style.
    pub kind: ResetKind,
    /// Active level.
    pub active: ResetActive,
    /// Whether registers start with their reset value at power-on.
    pub initialize_regs: bool,
    /// Number of clock periods the reset is held after power-on.
    pub min_reset_cycles: u32,
}

impl Default for ResetPolicy {
    fn default() -> Self {
        Self {
            kind: ResetKind::Sync,
            active: ResetActive::High,
            initialize_regs: true,
            min_reset_cycles: 1,
        }
    }
}

impl ResetPolicy {
    /// A policy without reset that initializes registers at power-on.
    pub fn power_on_only() -> Self {
        Self {
            kind: ResetKind::None,
            min_reset_cycles: 0,
            ..Self::default()
        }
    }

    /// Returns `true` if registers on this clock get a defined start value somehow.
    pub fn provides_reset(&self) -> bool {
        self.kind != ResetKind::None || self.initialize_regs
    }
}

/// Where a clock's frequency comes from.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ClockSource {
    /// An independent clock with an absolute frequency in Hertz.
    Root {
        /// Frequency in Hertz.
        frequency: ClockRational,
    },
    /// A clock running at `multiplier` times its parent's frequency.
    Derived {
        /// The parent clock.
        parent: ClockId,
        /// Frequency multiplier relative to the parent.
        multiplier: ClockRational,
    },
}

/// A clock of the circuit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Clock {
    /// Name for diagnostics and export.
    pub name: String,
    /// Frequency source.
    pub source: ClockSource,
    /// Active edge.
    pub trigger: TriggerEdge,
    /// Reset behavior.
    pub reset: ResetPolicy,
}

impl Clock {
    /// The parent clock, `None` for root clocks.
    pub fn parent(&self) -> Option<ClockId> {
        match self.source {
            ClockSource::Root { .. } => None,
            ClockSource::Derived { parent, .. } => Some(parent),
        }
    }
}

/// Parameters of a root clock.
#[derive(Clone, Debug, PartialEq)]
pub struct ClockConfig {
    /// Clock name.
    pub name: String,
    /// Frequency in Hertz.
    pub frequency: ClockRational,
    /// Active edge.
    pub trigger: TriggerEdge,
    /// Reset behavior.
    pub reset: ResetPolicy,
}

impl ClockConfig {
    /// A rising-edge clock with the default synchronous reset.
    pub fn new(name: impl Into<String>, frequency: ClockRational) -> Self {
        Self {
            name: name.into(),
            frequency,
            trigger: TriggerEdge::Rising,
            reset: ResetPolicy::default(),
        }
    }
}

/// Parameters of a derived clock. Unset fields are inherited from the parent.
#[derive(Clone, Debug, PartialEq)]
pub struct DerivedClockConfig {
    /// Clock name.
    pub name: String,
    /// Frequency multiplier relative to the parent.
    pub multiplier: ClockRational,
    /// Whether the active edge is the inverse of the parent's.
    pub invert_edge: bool,
    /// Reset behavior, inherited when `None`.
    pub reset: Option<ResetPolicy>,
}

impl DerivedClockConfig {
    /// A derived clock inheriting edge and reset from its parent.
    pub fn new(name: impl Into<String>, multiplier: ClockRational) -> Self {
        Self {
            name: name.into(),
            multiplier,
            invert_edge: false,
            reset: None,
        }
    }
}

impl Circuit {
    /// Creates a root clock.
    pub fn create_clock(&mut self, config: ClockConfig) -> Result<ClockId, IrError> {
        if !config.frequency.is_positive() {
            return Err(IrError::InvalidClock {
                name: config.name,
                reason: format!("frequency must be positive, got {}", config.frequency),
            });
        }
        Ok(self.clocks.alloc(Clock {
            name: config.name,
            source: ClockSource::Root {
                frequency: config.frequency,
            },
            trigger: config.trigger,
            reset: config.reset,
        }))
    }

    /// Creates a clock running at a rational multiple of `parent`.
    pub fn derive_clock(
        &mut self,
        parent: ClockId,
        config: DerivedClockConfig,
    ) -> Result<ClockId, IrError> {
        let parent_clock = self.try_clock(parent)?;
        if !config.multiplier.is_positive() {
            return Err(IrError::InvalidClock {
                name: config.name,
                reason: format!("multiplier must be positive, got {}", config.multiplier),
            });
        }
        let trigger = if config.invert_edge {
            parent_clock.trigger.inverted()
        } else {
            parent_clock.trigger
        };
        let reset = config.reset.unwrap_or(parent_clock.reset);
        Ok(self.clocks.alloc(Clock {
            name: config.name,
            source: ClockSource::Derived {
                parent,
                multiplier: config.multiplier,
            },
            trigger,
            reset,
        }))
    }

    /// Returns the clock, or an error for an unknown ID.
    pub fn try_clock(&self, id: ClockId) -> Result<&Clock, IrError> {
        self.clocks.try_get(id).ok_or(IrError::UnknownClock(id))
    }

    /// Returns the clock.
    ///
    /// # Panics
    ///
    /// Panics for an unknown ID.
    pub fn clock(&self, id: ClockId) -> &Clock {
        &self.clocks[id]
    }

    /// Iterates over all clocks in creation order.
    pub fn clocks(&self) -> impl Iterator<Item = (ClockId, &Clock)> {
        self.clocks.iter()
    }

    /// Absolute frequency in Hertz, multiplied up the parent chain.
    pub fn absolute_frequency(&self, id: ClockId) -> ClockRational {
        let mut factor = ClockRational::ONE;
        let mut current = id;
        loop {
            match self.clocks[current].source {
                ClockSource::Root { frequency } => return frequency * factor,
                ClockSource::Derived { parent, multiplier } => {
                    factor = factor * multiplier;
                    current = parent;
                }
            }
        }
    }

    /// Frequency of `id` relative to `other`.
    pub fn frequency_relative_to(&self, id: ClockId, other: ClockId) -> ClockRational {
        self.absolute_frequency(id) / self.absolute_frequency(other)
    }

    /// The root clock at the top of `id`'s parent chain.
    pub fn root_clock(&self, id: ClockId) -> ClockId {
        let mut current = id;
        while let Some(parent) = self.clocks[current].parent() {
            current = parent;
        }
        current
    }

    /// Returns `true` if `ancestor` is `id` or appears in its parent chain.
    pub fn is_clock_ancestor(&self, ancestor: ClockId, id: ClockId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.clocks[c].parent();
        }
        false
    }

    /// Returns `true` if the clocks have a known phase relation.
    ///
    /// Clocks are related when they descend from the same root clock. Root
    /// clocks of equal frequency are still unrelated.
    pub fn clocks_related(&self, a: ClockId, b: ClockId) -> bool {
        self.root_clock(a) == self.root_clock(b)
    }
}
