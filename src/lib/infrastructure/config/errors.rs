//! Configuration errors

use std::fmt;

use thiserror::Error;

/// One missing or invalid setting
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// The setting, named after its flag
    pub field: &'static str,

    /// What is wrong with it
    pub problem: String,
}

impl Violation {
    /// Creates a violation
    pub fn new(field: &'static str, problem: impl Into<String>) -> Self {
        Self {
            field,
            problem: problem.into(),
        }
    }

    /// A required setting that neither the flag nor the environment provides
    pub fn missing(field: &'static str, variable: &str) -> Self {
        Self::new(field, format!("not set (use --{field} or {variable})"))
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.problem)
    }
}

/// Every problem found while resolving the configuration
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid configuration:{}", list(.violations))]
pub struct ConfigError {
    /// The problems, in the order they were found
    pub violations: Vec<Violation>,
}

impl ConfigError {
    /// Whether `field` is among the violations
    pub fn names(&self, field: &str) -> bool {
        self.violations.iter().any(|v| v.field == field)
    }
}

fn list(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|violation| format!("\n  - {violation}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_lists_every_violation() {
        let err = ConfigError {
            violations: vec![
                Violation::missing("host", "MAIL_HOST"),
                Violation::new("port", "must be a positive integer"),
            ],
        };

        assert_eq!(
            err.to_string(),
            "invalid configuration:\n  - host: not set (use --host or MAIL_HOST)\n  - port: must be a positive integer"
        );
        assert!(err.names("host"));
        assert!(!err.names("user"));
    }
}
