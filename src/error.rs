//! Error taxonomy for the build core.
//!
//! `Tool` and `NotSupported` both come from a spawned process exiting with a
//! nonzero code; the backend's classifier decides which one applies.
//! `Configuration` is raised before any scanning starts. `Timeout` means the
//! scheduler's wall-clock budget ran out and every worker was torn down.

use crate::build::BuildReport;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// A tool exited with a nonzero code.
    #[error("{message}")]
    Tool { message: String, output: String },

    /// A tool failed because the target or feature is not supported.
    #[error("not supported: {}", first_line(.output))]
    NotSupported { output: String },

    /// Unknown target or backend name, or an unusable project setup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The compile queue did not drain before the deadline.
    #[error("compile did not finish in {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub fn tool(message: impl Into<String>, output: impl Into<String>) -> Self {
        BuildError::Tool {
            message: message.into(),
            output: output.into(),
        }
    }

    /// Soft failures are reported as a skip rather than a broken build.
    pub fn is_not_supported(&self) -> bool {
        matches!(self, BuildError::NotSupported { .. })
    }
}

fn first_line(output: &str) -> &str {
    output.lines().find(|l| !l.trim().is_empty()).unwrap_or("")
}

/// A fatal build error together with everything the build printed so far.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct BuildFailure {
    #[source]
    pub error: BuildError,
    pub report: Box<BuildReport>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_supported_message_uses_first_line() {
        let err = BuildError::NotSupported {
            output: "\nmain.c:3: error: #error [NOT_SUPPORTED] no BLE\nmore".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "not supported: main.c:3: error: #error [NOT_SUPPORTED] no BLE"
        );
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_failure_stays_small() {
        assert!(std::mem::size_of::<BuildFailure>() <= 128);
    }

    #[test]
    fn test_timeout_message() {
        let err = BuildError::Timeout(Duration::from_secs(300));
        assert_eq!(err.to_string(), "compile did not finish in 300 seconds");
        assert!(!err.is_not_supported());
    }
}
