//! Project configuration (`xf.toml`).
//!
//! Every field is optional; command-line flags override whatever the file
//! sets.

use crate::toolchain::{Backend, BuildOptions};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "xf.toml";
pub const TARGETS_FILE: &str = "targets.json";
pub const DEFAULT_BUILD_DIR: &str = "BUILD";

#[derive(Deserialize, Debug, Default, Clone)]
pub struct XfConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub build: BuildConfig,
    /// Backend name to tool directory.
    #[serde(default)]
    pub tool_paths: BTreeMap<String, PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ProjectConfig {
    pub name: Option<String>,
    pub target: Option<String>,
    pub toolchain: Option<String>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    pub build_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Debug,
    #[default]
    Release,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct BuildConfig {
    pub jobs: Option<usize>,
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub macros: Vec<String>,
    /// Extra roots scanned into the program.
    #[serde(default)]
    pub libraries: Vec<PathBuf>,
    pub linker_script: Option<PathBuf>,
    #[serde(default)]
    pub exclude: Vec<PathBuf>,
    #[serde(default)]
    pub inc_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub profile: Profile,
    /// `save-asm`, `small-build`, `big-build`.
    #[serde(default)]
    pub options: Vec<String>,
}

impl BuildConfig {
    pub fn build_options(&self) -> BuildOptions {
        let mut options = BuildOptions::from_names(&self.options);
        options.debug_info = self.profile == Profile::Debug;
        options
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl XfConfig {
    /// Tool directory for `backend`: the `[tool_paths]` entry, then the
    /// `XF_<BACKEND>_PATH` variable. Empty means tools come from `PATH`.
    pub fn tool_path(&self, backend: Backend) -> PathBuf {
        let configured = backend
            .aliases()
            .iter()
            .chain(std::iter::once(&backend.name()))
            .find_map(|name| self.tool_paths.get(*name));
        if let Some(path) = configured {
            return path.clone();
        }
        std::env::var_os(backend.path_env_var())
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    pub fn build_dir(&self) -> PathBuf {
        self.project
            .build_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BUILD_DIR))
    }
}

pub fn parse_config(content: &str) -> Result<XfConfig> {
    toml::from_str(content)
        .context("Failed to parse xf.toml - check for syntax errors (missing quotes, brackets)")
}

/// Reads `xf.toml` from `dir`. A missing file is an empty configuration.
pub fn load_config(dir: &Path) -> Result<XfConfig> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(XfConfig::default());
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[project]
name = "blinky"
target = "K64F"
toolchain = "GCC_ARM"
sources = ["src", "drivers"]

[build]
jobs = 4
timeout_secs = 60
macros = ["LED=1"]
profile = "debug"
options = ["small-build"]

[tool_paths]
GCC_ARM = "/opt/gcc-arm/bin"
"#,
        )
        .unwrap();

        assert_eq!(config.project.name.as_deref(), Some("blinky"));
        assert_eq!(config.project.sources.len(), 2);
        assert_eq!(config.build.jobs, Some(4));
        assert_eq!(config.build.timeout(), Some(Duration::from_secs(60)));
        let options = config.build.build_options();
        assert!(options.debug_info && options.small_build);
        assert_eq!(
            config.tool_path(Backend::GccArm),
            PathBuf::from("/opt/gcc-arm/bin")
        );
        assert_eq!(config.build_dir(), PathBuf::from("BUILD"));
    }

    #[test]
    fn test_empty_config_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.build.profile, Profile::Release);
        assert!(!config.build.build_options().debug_info);
        assert!(config.project.target.is_none());
    }

    #[test]
    fn test_tool_path_accepts_aliases() {
        let config = parse_config("[tool_paths]\nARM_STD = \"/opt/armcc\"\n").unwrap();
        assert_eq!(config.tool_path(Backend::ArmStd), PathBuf::from("/opt/armcc"));
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert!(config.tool_paths.is_empty());
    }

    #[test]
    fn test_syntax_error_has_context() {
        let err = parse_config("[project\nname = 1").unwrap_err();
        assert!(err.to_string().contains("Failed to parse xf.toml"));
    }
}
