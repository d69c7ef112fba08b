//! Directory traversal that turns a source tree into [`Resources`].

use super::{IgnoreRules, LabelSet, Resources};
use crate::toolchain::Backend;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Internal repository metadata directory, recorded for exporters.
pub const REPO_DIR: &str = ".hg";
const REPO_IGNORE_FILE: &str = ".hgignore";
const TESTS_DIR: &str = "TESTS";

const TARGET_PREFIX: &str = "TARGET_";
const TOOLCHAIN_PREFIX: &str = "TOOLCHAIN_";
const FEATURE_PREFIX: &str = "FEATURE_";

pub struct Scanner {
    labels: LabelSet,
    legacy_ignore: BTreeSet<String>,
    object_ext: &'static str,
    library_ext: &'static str,
    linker_ext: &'static str,
    warnings: Vec<String>,
}

impl Scanner {
    pub fn new(labels: LabelSet, backend: Backend) -> Self {
        let spec = backend.spec();
        Self {
            legacy_ignore: labels.legacy_ignore_dirs(),
            labels,
            object_ext: spec.object_ext,
            library_ext: spec.library_ext,
            linker_ext: spec.linker_ext,
            warnings: Vec::new(),
        }
    }

    /// Scans a directory tree, or classifies a single file.
    ///
    /// The base path is the directory itself, or the file's parent.
    pub fn scan(&mut self, path: &Path, exclude_paths: &[PathBuf]) -> Resources {
        let base = if path.is_file() {
            path.parent().unwrap_or(Path::new("")).to_path_buf()
        } else {
            path.to_path_buf()
        };
        self.scan_with_base(path, exclude_paths, &base)
    }

    pub fn scan_with_base(
        &mut self,
        path: &Path,
        exclude_paths: &[PathBuf],
        base_path: &Path,
    ) -> Resources {
        let mut resources = Resources::new(base_path);
        let mut rules = IgnoreRules::new();
        let excludes: Vec<PathBuf> = exclude_paths.iter().map(|p| absolute(p)).collect();

        if path.is_file() {
            self.add_file(path, &mut resources, base_path, &rules);
        } else {
            self.add_dir(path, &mut resources, base_path, &excludes, &mut rules);
        }
        resources
    }

    /// Warnings collected since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    fn add_dir(
        &mut self,
        dir: &Path,
        resources: &mut Resources,
        base_path: &Path,
        excludes: &[PathBuf],
        rules: &mut IgnoreRules,
    ) {
        let (subdirs, files) = match list_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), "cannot read directory: {}", e);
                return;
            }
        };

        if files.iter().any(|f| f.file_name() == Some(super::IGNORE_FILE.as_ref())) {
            rules.load_dir(dir);
        }

        if rules.is_dir_ignored(dir) {
            return;
        }

        let mut descend = Vec::new();
        for sub in subdirs {
            let name = match sub.file_name() {
                Some(n) => n.to_string_lossy().to_string(),
                None => continue,
            };

            if name == REPO_DIR {
                resources.repo_files.extend(scan_repository(&sub));
                resources.repo_dirs.push(sub.clone());
            }

            if self.is_hidden_dir(&name) || rules.is_dir_ignored(&sub) {
                continue;
            }

            if is_excluded(&sub, excludes) {
                continue;
            }

            if let Some(feature) = name.strip_prefix(FEATURE_PREFIX) {
                // Scanned now, merged only if the config activates it
                let mut nested = Resources::new(base_path);
                self.add_dir(&sub, &mut nested, base_path, excludes, rules);
                resources.features.insert(feature.to_string(), nested);
                continue;
            }

            descend.push(sub);
        }

        resources.inc_dirs.insert(dir.to_path_buf());

        for file in &files {
            self.add_file(file, resources, base_path, rules);
        }

        for sub in descend {
            self.add_dir(&sub, resources, base_path, excludes, rules);
        }
    }

    fn is_hidden_dir(&self, name: &str) -> bool {
        if name.starts_with('.') || name == TESTS_DIR || self.legacy_ignore.contains(name) {
            return true;
        }
        if let Some(label) = name.strip_prefix(TARGET_PREFIX) {
            return !self.labels.has_target(label);
        }
        if let Some(label) = name.strip_prefix(TOOLCHAIN_PREFIX) {
            return !self.labels.has_toolchain(label);
        }
        false
    }

    fn add_file(
        &mut self,
        file: &Path,
        resources: &mut Resources,
        base_path: &Path,
        rules: &IgnoreRules,
    ) {
        if rules.is_ignored(file) {
            return;
        }
        resources
            .file_basepath
            .insert(file.to_path_buf(), base_path.to_path_buf());

        if file.file_name() == Some(REPO_IGNORE_FILE.as_ref()) {
            resources.repo_files.push(file.to_path_buf());
            return;
        }

        let ext = file
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let path = file.to_path_buf();

        match ext.as_str() {
            "s" => resources.s_sources.push(path),
            "c" => resources.c_sources.push(path),
            "cpp" | "cc" | "cxx" => resources.cpp_sources.push(path),
            "h" | "hpp" => resources.headers.push(path),
            e if e == self.object_ext => resources.objects.push(path),
            e if e == self.library_ext => {
                if let Some(dir) = file.parent() {
                    resources.lib_dirs.insert(dir.to_path_buf());
                }
                resources.libraries.push(path);
            }
            e if e == self.linker_ext => match &resources.linker_script {
                Some(first) => {
                    self.warnings.push(format!(
                        "Warning: Multiple linker scripts detected: {} -> {} (keeping the first)",
                        first.display(),
                        file.display()
                    ));
                }
                None => resources.linker_script = Some(path),
            },
            "lib" => resources.lib_refs.push(path),
            "bld" => resources.lib_builds.push(path),
            "hex" => resources.hex_files.push(path),
            "bin" => resources.bin_files.push(path),
            "json" => resources.json_files.push(path),
            _ => {}
        }
    }
}

/// Immediate subdirectories and files of `dir`, each sorted by name.
fn list_dir(dir: &Path) -> std::io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut subdirs = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        // `is_dir` follows symlinks
        if path.is_dir() {
            subdirs.push(path);
        } else {
            files.push(path);
        }
    }
    subdirs.sort();
    files.sort();
    Ok((subdirs, files))
}

/// Every file under a repository metadata directory, unclassified.
fn scan_repository(path: &Path) -> Vec<PathBuf> {
    WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn is_excluded(dir: &Path, excludes: &[PathBuf]) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let dir = absolute(dir);
    excludes.iter().any(|ex| dir.starts_with(ex))
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
