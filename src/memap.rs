//! Post-link memory usage.
//!
//! The build asks a [`MemoryMapAnalyzer`] for a summary after every
//! successful link. An analyzer that does not understand a backend's map
//! format returns `None`, which is never an error.

use crate::toolchain::{Backend, Family};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    pub static_ram: u64,
    pub total_flash: u64,
    pub stack: u64,
    pub heap: u64,
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Static RAM: {} bytes, Flash: {} bytes, Stack: {} bytes, Heap: {} bytes",
            self.static_ram, self.total_flash, self.stack, self.heap
        )
    }
}

pub trait MemoryMapAnalyzer {
    fn analyze(&self, map_file: &Path, backend: Backend) -> Option<MemoryUsage>;
}

// Top-level output section lines: `.text  0x00000000  0x1a2c`
static SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>\.[A-Za-z_][\w.]*)\s+0x[0-9a-fA-F]+\s+0x(?P<size>[0-9a-fA-F]+)")
        .expect("section pattern is valid")
});

/// Reads GNU ld map files. Other backends are not recognized.
pub struct GnuMapAnalyzer;

impl GnuMapAnalyzer {
    pub fn parse(content: &str) -> MemoryUsage {
        let mut usage = MemoryUsage::default();
        for line in content.lines() {
            let Some(caps) = SECTION.captures(line) else {
                continue;
            };
            let size = u64::from_str_radix(&caps["size"], 16).unwrap_or(0);
            match &caps["name"] {
                ".text" | ".rodata" | ".ARM.exidx" | ".ARM.extab" => usage.total_flash += size,
                ".data" => {
                    usage.total_flash += size;
                    usage.static_ram += size;
                }
                ".bss" => usage.static_ram += size,
                ".heap" => usage.heap += size,
                ".stack_dummy" | ".stack" => usage.stack += size,
                _ => {}
            }
        }
        usage
    }
}

impl MemoryMapAnalyzer for GnuMapAnalyzer {
    fn analyze(&self, map_file: &Path, backend: Backend) -> Option<MemoryUsage> {
        if backend.family() != Family::Gcc {
            return None;
        }
        let content = fs::read_to_string(map_file).ok()?;
        Some(Self::parse(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAP: &str = "\
Memory Configuration

.text           0x00000000     0x1a2c
 .text          0x00000000       0x10 main.o
.ARM.exidx      0x00001a2c        0x8
.data           0x20000000       0x40 load address 0x00001a34
.bss            0x20000040      0x200
.heap           0x20000240     0x1000
.stack_dummy    0x20000240      0x400
";

    #[test]
    fn test_parse_gnu_map() {
        let usage = GnuMapAnalyzer::parse(MAP);
        assert_eq!(usage.total_flash, 0x1a2c + 0x8 + 0x40);
        assert_eq!(usage.static_ram, 0x40 + 0x200);
        assert_eq!(usage.heap, 0x1000);
        assert_eq!(usage.stack, 0x400);
    }

    #[test]
    fn test_other_backends_are_unrecognized() {
        let dir = tempfile::tempdir().unwrap();
        let map = dir.path().join("app.map");
        fs::write(&map, MAP).unwrap();
        assert!(GnuMapAnalyzer.analyze(&map, Backend::IAR).is_none());
        assert!(GnuMapAnalyzer.analyze(&map, Backend::GccArm).is_some());
        assert!(GnuMapAnalyzer.analyze(&dir.path().join("missing.map"), Backend::GccArm).is_none());
    }
}
