//! Resource sets: everything a scan discovers under one or more roots.
//!
//! A [`Resources`] value is filled by the [`Scanner`] and then only grows
//! through [`Resources::add`] (merging another scan), extra include
//! directories, and objects produced by compilation.

mod ignore;
mod labels;
mod scan;

pub use ignore::{IGNORE_FILE, IgnoreRules};
pub use labels::{LEGACY_IGNORE_DIRS, LabelSet};
pub use scan::{REPO_DIR, Scanner};

use indexmap::IndexSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources {
    pub base_path: Option<PathBuf>,

    /// Every discovered file mapped to the root it was scanned from.
    pub file_basepath: BTreeMap<PathBuf, PathBuf>,

    pub inc_dirs: IndexSet<PathBuf>,
    pub headers: Vec<PathBuf>,

    pub s_sources: Vec<PathBuf>,
    pub c_sources: Vec<PathBuf>,
    pub cpp_sources: Vec<PathBuf>,

    pub lib_dirs: BTreeSet<PathBuf>,
    pub objects: Vec<PathBuf>,
    pub libraries: Vec<PathBuf>,

    // Legacy library markers
    pub lib_builds: Vec<PathBuf>,
    pub lib_refs: Vec<PathBuf>,

    // Only used by exporters
    pub repo_dirs: Vec<PathBuf>,
    pub repo_files: Vec<PathBuf>,

    pub linker_script: Option<PathBuf>,

    pub hex_files: Vec<PathBuf>,
    pub bin_files: Vec<PathBuf>,
    pub json_files: Vec<PathBuf>,

    /// Feature subtrees, scanned but not part of this set until activated.
    pub features: BTreeMap<String, Resources>,
}

impl Resources {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
            ..Default::default()
        }
    }

    /// Merges `other` into `self`.
    ///
    /// Lists are concatenated and sets unioned. The linker script keeps the
    /// first one found; feature subtrees are overridden per name.
    pub fn add(&mut self, other: Resources) -> &mut Self {
        self.file_basepath.extend(other.file_basepath);

        self.inc_dirs.extend(other.inc_dirs);
        self.headers.extend(other.headers);

        self.s_sources.extend(other.s_sources);
        self.c_sources.extend(other.c_sources);
        self.cpp_sources.extend(other.cpp_sources);

        self.lib_dirs.extend(other.lib_dirs);
        self.objects.extend(other.objects);
        self.libraries.extend(other.libraries);

        self.lib_builds.extend(other.lib_builds);
        self.lib_refs.extend(other.lib_refs);

        self.repo_dirs.extend(other.repo_dirs);
        self.repo_files.extend(other.repo_files);

        if self.linker_script.is_none() {
            self.linker_script = other.linker_script;
        }

        self.hex_files.extend(other.hex_files);
        self.bin_files.extend(other.bin_files);
        self.json_files.extend(other.json_files);

        self.features.extend(other.features);

        self
    }

    pub fn add_include_dirs<I, P>(&mut self, dirs: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.inc_dirs.extend(dirs.into_iter().map(Into::into));
    }

    pub fn add_objects<I>(&mut self, objects: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.objects.extend(objects);
    }

    /// Assembly, C and C++ sources in one sorted list.
    pub fn sources(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self
            .s_sources
            .iter()
            .chain(&self.c_sources)
            .chain(&self.cpp_sources)
            .cloned()
            .collect();
        files.sort();
        files
    }

    /// The root a file was found under, falling back to the set's base path.
    pub fn base_of(&self, file: &Path) -> Option<&Path> {
        self.file_basepath
            .get(file)
            .map(PathBuf::as_path)
            .or(self.base_path.as_deref())
    }
}

impl fmt::Display for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lib_dirs: Vec<&PathBuf> = self.lib_dirs.iter().collect();
        let inc_dirs: Vec<&PathBuf> = self.inc_dirs.iter().collect();
        let features: Vec<PathBuf> = self.features.keys().map(PathBuf::from).collect();
        let features: Vec<&PathBuf> = features.iter().collect();

        let sections: [(&str, Vec<&PathBuf>); 11] = [
            ("Include Directories", inc_dirs),
            ("Headers", self.headers.iter().collect()),
            ("Assembly sources", self.s_sources.iter().collect()),
            ("C sources", self.c_sources.iter().collect()),
            ("C++ sources", self.cpp_sources.iter().collect()),
            ("Library directories", lib_dirs),
            ("Objects", self.objects.iter().collect()),
            ("Libraries", self.libraries.iter().collect()),
            ("Hex files", self.hex_files.iter().collect()),
            ("Bin files", self.bin_files.iter().collect()),
            ("Features", features),
        ];

        let mut first = true;
        for (label, items) in sections {
            if items.is_empty() {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{}:", label)?;
            for item in items {
                write!(f, "\n  {}", item.display())?;
            }
        }

        if let Some(script) = &self.linker_script {
            if !first {
                writeln!(f)?;
            }
            write!(f, "Linker Script: {}", script.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tag: &str, linker: Option<&str>) -> Resources {
        let mut r = Resources::new(format!("/{tag}"));
        r.inc_dirs.insert(PathBuf::from(format!("/{tag}")));
        r.inc_dirs.insert(PathBuf::from("/shared"));
        r.c_sources.push(PathBuf::from(format!("/{tag}/main.c")));
        r.headers.push(PathBuf::from(format!("/{tag}/main.h")));
        r.lib_dirs.insert(PathBuf::from(format!("/{tag}/lib")));
        r.file_basepath
            .insert(PathBuf::from(format!("/{tag}/main.c")), PathBuf::from(format!("/{tag}")));
        r.linker_script = linker.map(PathBuf::from);
        r.features
            .insert("BLE".to_string(), Resources::new(format!("/{tag}/FEATURE_BLE")));
        r
    }

    fn merged(parts: Vec<Resources>) -> Resources {
        let mut iter = parts.into_iter();
        let mut first = iter.next().unwrap();
        for r in iter {
            first.add(r);
        }
        first
    }

    #[test]
    fn test_add_is_associative() {
        let (a, b, c) = (set("a", None), set("b", None), set("c", None));

        let mut left = a.clone();
        left.add(b.clone());
        left.add(c.clone());

        let mut bc = b;
        bc.add(c);
        let mut right = a;
        right.add(bc);

        assert_eq!(left, right);
        assert_eq!(
            left.inc_dirs.iter().collect::<Vec<_>>(),
            right.inc_dirs.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_include_dirs_deduplicated_in_insertion_order() {
        let r = merged(vec![set("a", None), set("b", None)]);
        let dirs: Vec<_> = r.inc_dirs.iter().map(|p| p.to_str().unwrap()).collect();
        assert_eq!(dirs, vec!["/a", "/shared", "/b"]);
    }

    #[test]
    fn test_first_linker_script_wins() {
        let r = merged(vec![
            set("a", None),
            set("b", Some("/b/first.ld")),
            set("c", Some("/c/second.ld")),
        ]);
        assert_eq!(r.linker_script, Some(PathBuf::from("/b/first.ld")));
    }

    #[test]
    fn test_features_last_write_wins() {
        let r = merged(vec![set("a", None), set("b", None)]);
        assert_eq!(r.features.len(), 1);
        assert_eq!(
            r.features["BLE"].base_path,
            Some(PathBuf::from("/b/FEATURE_BLE"))
        );
    }

    #[test]
    fn test_sources_sorted_across_kinds() {
        let mut r = Resources::new("/p");
        r.cpp_sources.push(PathBuf::from("/p/a.cpp"));
        r.s_sources.push(PathBuf::from("/p/z.s"));
        r.c_sources.push(PathBuf::from("/p/m.c"));
        assert_eq!(
            r.sources(),
            vec![
                PathBuf::from("/p/a.cpp"),
                PathBuf::from("/p/m.c"),
                PathBuf::from("/p/z.s")
            ]
        );
    }

    #[test]
    fn test_display_lists_non_empty_sections() {
        let r = set("a", Some("/a/app.ld"));
        let text = r.to_string();
        assert!(text.starts_with("Include Directories:\n  /a\n  /shared"));
        assert!(text.contains("C sources:\n  /a/main.c"));
        assert!(text.contains("Features:\n  BLE"));
        assert!(text.ends_with("Linker Script: /a/app.ld"));
        assert!(!text.contains("Objects"));
    }
}
