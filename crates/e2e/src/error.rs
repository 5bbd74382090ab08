//! Error types for E2E testing

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing setting '{0}' and no default was given")]
    MissingSetting(String),

    #[error("Fixture section '{section}': {reason}")]
    Fixture { section: String, reason: String },

    #[error("Server failed to start: {0}")]
    ServerStartup(String),

    #[error("Server health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install chromium")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("UI flow '{flow}' failed: {reason}")]
    Ui { flow: String, reason: String },

    #[error("{0}")]
    Assertion(AssertionFailure),

    #[error("Hook '{hook}' failed: {reason}")]
    Hook { hook: String, reason: String },

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Case panicked: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl E2eError {
    /// Short machine-readable kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            E2eError::Config(_) | E2eError::MissingSetting(_) => "config",
            E2eError::Fixture { .. } => "fixture",
            E2eError::ServerStartup(_) | E2eError::ServerHealthCheck(_) => "server",
            E2eError::PlaywrightNotFound | E2eError::Playwright(_) => "playwright",
            E2eError::Ui { .. } => "ui",
            E2eError::Assertion(_) => "assertion",
            E2eError::Hook { .. } => "hook",
            E2eError::Timeout(_) => "timeout",
            E2eError::Panic(_) => "panic",
            E2eError::Io(_) => "io",
            E2eError::Json(_) | E2eError::Yaml(_) => "serialization",
            E2eError::Http(_) => "transport",
        }
    }

    /// Configuration and fixture problems abort the run before any suite starts
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            E2eError::Config(_) | E2eError::MissingSetting(_) | E2eError::Fixture { .. }
        )
    }

    pub fn fixture(section: impl Into<String>, reason: impl Into<String>) -> Self {
        E2eError::Fixture {
            section: section.into(),
            reason: reason.into(),
        }
    }

    pub fn ui(flow: impl Into<String>, reason: impl Into<String>) -> Self {
        E2eError::Ui {
            flow: flow.into(),
            reason: reason.into(),
        }
    }
}

/// A failed check raised by [`crate::verify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl fmt::Display for AssertionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Assertion failed: {}", self.message)?;
        match (&self.expected, &self.actual) {
            (Some(expected), Some(actual)) => {
                write!(f, " (expected [{}] but found [{}])", expected, actual)
            }
            (None, Some(actual)) => write!(f, " (found [{}])", actual),
            _ => Ok(()),
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertion_failure_renders_expected_and_actual() {
        let err = E2eError::Assertion(AssertionFailure {
            message: "Expected status code 200 for valid login".to_string(),
            expected: Some("200".to_string()),
            actual: Some("401".to_string()),
        });
        assert_eq!(
            err.to_string(),
            "Assertion failed: Expected status code 200 for valid login (expected [200] but found [401])"
        );
        assert_eq!(err.kind(), "assertion");
    }

    #[test]
    fn only_config_and_fixture_errors_are_fatal() {
        assert!(E2eError::MissingSetting("base_url".into()).is_fatal());
        assert!(E2eError::fixture("validUsers", "missing").is_fatal());
        assert!(!E2eError::Timeout("login".into()).is_fatal());
        assert!(!E2eError::ui("logout", "button not visible").is_fatal());
    }
}
