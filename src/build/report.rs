use crate::memap::MemoryUsage;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Ok,
    Fail,
    NotSupported,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Ok => "OK",
            BuildStatus::Fail => "FAIL",
            BuildStatus::NotSupported => "NOT_SUPPORTED",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one project or library build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub project: String,
    pub target: String,
    pub toolchain: String,
    pub status: BuildStatus,
    pub elapsed: Duration,
    /// Every line the build printed, including parsed diagnostics.
    pub output: String,
    pub memory_usage: Option<MemoryUsage>,
    /// The flashable image, or the archive for library builds.
    pub artifact: Option<PathBuf>,
    /// Whether any step actually ran a tool.
    pub updated: bool,
}

impl BuildReport {
    pub fn new(project: &str, target: &str, toolchain: &str) -> Self {
        Self {
            project: project.to_string(),
            target: target.to_string(),
            toolchain: toolchain.to_string(),
            status: BuildStatus::Ok,
            elapsed: Duration::ZERO,
            output: String::new(),
            memory_usage: None,
            artifact: None,
            updated: false,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == BuildStatus::Ok
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}::{}::{} {} in {:.2}s",
            self.target,
            self.toolchain,
            self.project,
            self.status,
            self.elapsed.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line() {
        let mut report = BuildReport::new("blinky", "K64F", "GCC_ARM");
        report.elapsed = Duration::from_millis(1500);
        assert_eq!(report.to_string(), "K64F::GCC_ARM::blinky OK in 1.50s");
        report.status = BuildStatus::NotSupported;
        assert!(!report.is_ok());
        assert!(report.to_string().contains("NOT_SUPPORTED"));
    }
}
