//! Configuration types deserialized from `hlim.toml`.

use crate::error::ConfigError;
use hlim_common::ClockRational;
use hlim_ir::{ClockConfig, ResetActive, ResetKind, ResetPolicy, TriggerEdge};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The top-level configuration parsed from `hlim.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project metadata.
    pub project: ProjectMeta,
    /// Simulation settings.
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Named root clock definitions.
    #[serde(default)]
    pub clocks: BTreeMap<String, ClockDef>,
    /// Output locations handed through to export collaborators.
    #[serde(default)]
    pub paths: OutputPaths,
}

/// Project metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// A brief description of the project.
    #[serde(default)]
    pub description: String,
}

fn default_max_delta_cycles() -> u32 {
    1_000
}

fn default_true() -> bool {
    true
}

/// Settings for simulation runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Simulated time after which a run stops, such as `"10us"`.
    #[serde(default)]
    pub timeout: Option<String>,
    /// Maximum number of evaluation rounds at a single instant.
    #[serde(default = "default_max_delta_cycles")]
    pub max_delta_cycles: u32,
    /// Whether signal taps are reported on the console.
    #[serde(default = "default_true")]
    pub console_output: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            max_delta_cycles: default_max_delta_cycles(),
            console_output: true,
        }
    }
}

impl SimulationSettings {
    /// The timeout in seconds, if configured.
    pub fn timeout_seconds(&self) -> Result<Option<ClockRational>, ConfigError> {
        self.timeout
            .as_deref()
            .map(|value| {
                ClockRational::parse_duration(value).map_err(|_| ConfigError::InvalidDuration {
                    field: "simulation.timeout".into(),
                    value: value.to_string(),
                })
            })
            .transpose()
    }
}

/// Active clock edge as written in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerDef {
    /// Rising edges.
    #[default]
    Rising,
    /// Falling edges.
    Falling,
    /// Both edges.
    Both,
}

/// Reset style as written in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetDef {
    /// No reset.
    None,
    /// Synchronous reset.
    #[default]
    Sync,
    /// Asynchronous reset.
    Async,
}

/// Reset level as written in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetLevelDef {
    /// Active high.
    #[default]
    High,
    /// Active low.
    Low,
}

fn default_min_reset_cycles() -> u32 {
    1
}

/// A named root clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockDef {
    /// Frequency string such as `"50MHz"`.
    pub frequency: String,
    /// Active edge.
    #[serde(default)]
    pub trigger: TriggerDef,
    /// Reset style.
    #[serde(default)]
    pub reset: ResetDef,
    /// Reset level.
    #[serde(default)]
    pub reset_active: ResetLevelDef,
    /// Whether registers start with their reset value.
    #[serde(default = "default_true")]
    pub initialize_regs: bool,
    /// Number of periods the reset is held after power-on.
    #[serde(default = "default_min_reset_cycles")]
    pub min_reset_cycles: u32,
}

impl ClockDef {
    /// Converts the definition into a root clock configuration named `name`.
    pub fn to_clock_config(&self, name: &str) -> Result<ClockConfig, ConfigError> {
        let frequency = ClockRational::parse_frequency(&self.frequency).map_err(|_| {
            ConfigError::InvalidFrequency {
                clock: name.to_string(),
                value: self.frequency.clone(),
            }
        })?;
        let trigger = match self.trigger {
            TriggerDef::Rising => TriggerEdge::Rising,
            TriggerDef::Falling => TriggerEdge::Falling,
            TriggerDef::Both => TriggerEdge::Both,
        };
        let kind = match self.reset {
            ResetDef::None => ResetKind::None,
            ResetDef::Sync => ResetKind::Sync,
            ResetDef::Async => ResetKind::Async,
        };
        let active = match self.reset_active {
            ResetLevelDef::High => ResetActive::High,
            ResetLevelDef::Low => ResetActive::Low,
        };
        Ok(ClockConfig {
            name: name.to_string(),
            frequency,
            trigger,
            reset: ResetPolicy {
                kind,
                active,
                initialize_regs: self.initialize_regs,
                min_reset_cycles: self.min_reset_cycles,
            },
        })
    }
}

/// Output locations owned by surrounding tooling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputPaths {
    /// Waveform capture file.
    #[serde(default)]
    pub vcd: Option<String>,
    /// Directory for emitted HDL.
    #[serde(default)]
    pub hdl_export: Option<String>,
    /// File for the graph visualization dump.
    #[serde(default)]
    pub graph_visualization: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_def_defaults() {
        let def: ClockDef = toml::from_str(r#"frequency = "50MHz""#).unwrap();
        let cfg = def.to_clock_config("sys").unwrap();
        assert_eq!(cfg.name, "sys");
        assert_eq!(cfg.frequency, ClockRational::from_integer(50_000_000));
        assert_eq!(cfg.trigger, TriggerEdge::Rising);
        assert_eq!(cfg.reset, ResetPolicy::default());
    }

    #[test]
    fn clock_def_full() {
        let def: ClockDef = toml::from_str(
            r#"
frequency = "12.5MHz"
trigger = "falling"
reset = "async"
reset_active = "low"
initialize_regs = false
min_reset_cycles = 4
"#,
        )
        .unwrap();
        let cfg = def.to_clock_config("slow").unwrap();
        assert_eq!(cfg.frequency, ClockRational::from_integer(12_500_000));
        assert_eq!(cfg.trigger, TriggerEdge::Falling);
        assert_eq!(cfg.reset.kind, ResetKind::Async);
        assert_eq!(cfg.reset.active, ResetActive::Low);
        assert!(!cfg.reset.initialize_regs);
        assert_eq!(cfg.reset.min_reset_cycles, 4);
    }

    #[test]
    fn bad_frequency_is_reported() {
        let def: ClockDef = toml::from_str(r#"frequency = "quick""#).unwrap();
        assert!(matches!(
            def.to_clock_config("clk"),
            Err(ConfigError::InvalidFrequency { .. })
        ));
    }

    #[test]
    fn timeout_parsing() {
        let mut settings = SimulationSettings::default();
        assert_eq!(settings.timeout_seconds().unwrap(), None);
        settings.timeout = Some("2us".into());
        assert_eq!(
            settings.timeout_seconds().unwrap(),
            Some(ClockRational::new(1, 500_000))
        );
        settings.timeout = Some("later".into());
        assert!(settings.timeout_seconds().is_err());
    }

    #[test]
    fn settings_serialize_to_json() {
        let settings = SimulationSettings::default();
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["max_delta_cycles"], 1000);
        assert_eq!(json["console_output"], true);
        let def = ClockDef {
            frequency: "1MHz".into(),
            trigger: TriggerDef::Both,
            reset: ResetDef::None,
            reset_active: ResetLevelDef::High,
            initialize_regs: true,
            min_reset_cycles: 0,
        };
        let json = serde_json::to_value(&def).unwrap();
        assert_eq!(json["trigger"], "both");
        assert_eq!(json["reset"], "none");
    }
}
