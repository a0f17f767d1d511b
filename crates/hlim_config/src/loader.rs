//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use hlim_ir::{Circuit, ClockId};
use std::collections::BTreeMap;
use std::path::Path;

/// Loads and validates an `hlim.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let config_path = project_dir.join("hlim.toml");
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates an `hlim.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Checks required fields and that every frequency and duration parses.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.simulation.max_delta_cycles == 0 {
        return Err(ConfigError::ValidationError(
            "simulation.max_delta_cycles must be at least 1".to_string(),
        ));
    }
    config.simulation.timeout_seconds()?;
    for (name, def) in &config.clocks {
        def.to_clock_config(name)?;
    }
    Ok(())
}

/// Creates every configured clock as a root clock of `circuit`.
///
/// Returns the new clock IDs keyed by configured name.
pub fn create_clocks(
    config: &ProjectConfig,
    circuit: &mut Circuit,
) -> Result<BTreeMap<String, ClockId>, ConfigError> {
    let mut ids = BTreeMap::new();
    for (name, def) in &config.clocks {
        let id = circuit.create_clock(def.to_clock_config(name)?)?;
        ids.insert(name.clone(), id);
    }
    Ok(ids)
}
