//! CLI command handlers
//!
//! Each `xf` subcommand is implemented here; `main.rs` only parses
//! arguments and sets up logging.

pub mod build;
pub mod scan;
pub mod target;

use crate::config::{TARGETS_FILE, XfConfig};
use crate::target::TargetDb;
use anyhow::{Result, anyhow};
use std::path::Path;

/// Built-in targets plus the project's `targets.json`, if any.
pub fn load_targets(dir: &Path) -> Result<TargetDb> {
    let mut db = TargetDb::builtin();
    let extra = dir.join(TARGETS_FILE);
    if extra.exists() {
        db.extend_from_file(&extra)?;
    }
    Ok(db)
}

/// Target and toolchain names from the flags, falling back to `xf.toml`.
pub fn resolve_names(
    config: &XfConfig,
    target: Option<&str>,
    toolchain: Option<&str>,
) -> Result<(String, String)> {
    let target = target
        .map(str::to_string)
        .or_else(|| config.project.target.clone())
        .ok_or_else(|| anyhow!("No target given. Pass -m <TARGET> or set [project] target in xf.toml"))?;
    let toolchain = toolchain
        .map(str::to_string)
        .or_else(|| config.project.toolchain.clone())
        .ok_or_else(|| {
            anyhow!("No toolchain given. Pass -t <TOOLCHAIN> or set [project] toolchain in xf.toml")
        })?;
    Ok((target, toolchain))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_flags_override_config_names() {
        let config = parse_config("[project]\ntarget = \"K64F\"\ntoolchain = \"IAR\"\n").unwrap();
        let (target, toolchain) = resolve_names(&config, None, Some("GCC_ARM")).unwrap();
        assert_eq!(target, "K64F");
        assert_eq!(toolchain, "GCC_ARM");
    }

    #[test]
    fn test_missing_target_is_reported() {
        let err = resolve_names(&XfConfig::default(), None, Some("GCC_ARM")).unwrap_err();
        assert!(err.to_string().contains("No target given"));
    }

    #[test]
    fn test_project_targets_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(TARGETS_FILE),
            r#"{"MY_BOARD": {"core": "Cortex-M3"}}"#,
        )
        .unwrap();
        let db = load_targets(dir.path()).unwrap();
        assert!(db.get("MY_BOARD").is_ok());
        assert!(db.get("K64F").is_ok());
    }
}
