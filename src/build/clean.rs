//! Build artifact cleanup.
//!
//! `xf clean` removes the build directory, or a single
//! `<build>/<target>/<toolchain>` tree when both are given.

use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Build directory for one target and toolchain.
pub fn build_dir_for(root: &Path, target: &str, toolchain: &str) -> PathBuf {
    root.join(target).join(toolchain)
}

/// Removes `dir`. Returns whether there was anything to remove.
pub fn clean(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        println!("{} Nothing to clean", "!".yellow());
        return Ok(false);
    }
    fs::remove_dir_all(dir)
        .with_context(|| format!("Failed to remove {} directory", dir.display()))?;
    println!("{} Removed {}", "✓".green(), dir.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let build = build_dir_for(&dir.path().join("BUILD"), "K64F", "GCC_ARM");
        fs::create_dir_all(build.join("drivers")).unwrap();
        fs::write(build.join("drivers/uart.o"), "").unwrap();

        assert!(clean(&build).unwrap());
        assert!(!build.exists());
        assert!(dir.path().join("BUILD/K64F").exists());
        assert!(!clean(&build).unwrap());
    }
}
