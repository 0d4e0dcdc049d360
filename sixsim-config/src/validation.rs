//! Custom validation functions for configuration.

use validator::ValidationError;

pub const CONN_CLASSES: [&str; 3] = ["Linear", "FullyMeshed", "K7"];
pub const TOPOLOGY_CLASSES: [&str; 2] = ["Linear", "Random"];

/// Validate the connectivity model name.
pub fn validate_conn_class(class: &str) -> Result<(), ValidationError> {
    if CONN_CLASSES.contains(&class) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_conn_class"))
    }
}

/// Validate the placement strategy name.
pub fn validate_topology_class(class: &str) -> Result<(), ValidationError> {
    if TOPOLOGY_CLASSES.contains(&class) {
        Ok(())
    } else {
        Err(ValidationError::new("unknown_topology_class"))
    }
}

/// Validate a default log level.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error", "off"]
        .contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_classes() {
        assert!(validate_conn_class("K7").is_ok());
        assert!(validate_conn_class("k7").is_err());
        assert!(validate_topology_class("Random").is_ok());
        assert!(validate_topology_class("Grid").is_err());
    }

    #[test]
    fn log_level_is_case_insensitive() {
        assert!(validate_log_level("DEBUG").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }
}
