//! Error types for configuration loading and validation.

use hlim_ir::IrError;

/// Errors that can occur when loading or validating an `hlim.toml` configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A clock frequency string could not be parsed.
    #[error("invalid frequency '{value}' for clock '{clock}'")]
    InvalidFrequency {
        /// The clock name.
        clock: String,
        /// The offending value.
        value: String,
    },

    /// A duration string could not be parsed.
    #[error("invalid duration '{value}' for {field}")]
    InvalidDuration {
        /// The field holding the duration.
        field: String,
        /// The offending value.
        value: String,
    },

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A configured clock was rejected by the circuit.
    #[error("cannot create configured clock: {0}")]
    Circuit(#[from] IrError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("project.name".to_string());
        assert_eq!(format!("{err}"), "missing required field: project.name");
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::ParseError("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_invalid_frequency() {
        let err = ConfigError::InvalidFrequency {
            clock: "sys".into(),
            value: "fast".into(),
        };
        assert_eq!(format!("{err}"), "invalid frequency 'fast' for clock 'sys'");
    }

    #[test]
    fn display_invalid_duration() {
        let err = ConfigError::InvalidDuration {
            field: "simulation.timeout".into(),
            value: "soon".into(),
        };
        assert_eq!(
            format!("{err}"),
            "invalid duration 'soon' for simulation.timeout"
        );
    }

    #[test]
    fn display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ConfigError::IoError(io_err);
        assert!(format!("{err}").starts_with("failed to read configuration:"));
    }

    #[test]
    fn display_circuit_error() {
        let err = ConfigError::Circuit(IrError::InvalidClock {
            name: "clk".into(),
            reason: "frequency must be positive, got 0".into(),
        });
        assert_eq!(
            format!("{err}"),
            "cannot create configured clock: invalid clock 'clk': frequency must be positive, got 0"
        );
    }
}
