//! Per-family command syntax.
//!
//! A [`Dialect`] knows how one compiler family spells its flags: where
//! response files go, how dependency records are requested and read back,
//! and the exact argument lists for each step. Everything stateful (symbols,
//! response files on disk, staleness) lives in [`super::Toolchain`].

use super::types::{Backend, BuildOptions, Family, ToolSet};
use crate::target::Target;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Inputs of one link step.
pub struct LinkInputs<'a> {
    pub output: &'a Path,
    pub map_file: &'a Path,
    pub objects: &'a [PathBuf],
    pub libraries: &'a [PathBuf],
    pub lib_dirs: &'a BTreeSet<PathBuf>,
    pub linker_script: Option<&'a Path>,
}

pub trait Dialect: Sync {
    fn tools(
        &self,
        backend: Backend,
        target: &Target,
        options: &BuildOptions,
        tool_path: &Path,
    ) -> ToolSet;

    /// Arguments that make the tool read further arguments from `file`.
    fn response_option(&self, file: &Path) -> Vec<String>;

    /// Arguments that force-include the generated config header.
    fn config_option(&self, header: &Path) -> Vec<String>;

    /// Arguments asking the compiler to write a dependency record.
    fn dependency_option(&self, object: &Path) -> Vec<String>;

    /// Extra per-object compile arguments.
    fn compile_extra(&self, _object: &Path) -> Vec<String> {
        Vec::new()
    }

    /// The assembler cannot preinclude a header, so config values are
    /// passed as plain definitions.
    fn asm_needs_config_macros(&self) -> bool {
        false
    }

    /// One or more commands, run in order.
    fn assemble(
        &self,
        tools: &ToolSet,
        options: Vec<String>,
        source: &Path,
        object: &Path,
    ) -> Vec<Vec<String>>;

    /// The full link command. The caller moves everything after the
    /// program name into a response file.
    fn link(&self, tools: &ToolSet, inputs: &LinkInputs<'_>) -> Vec<String>;

    fn archive(&self, tools: &ToolSet, library: &Path, response_file: &Path) -> Vec<String>;

    fn binary(&self, tools: &ToolSet, elf: &Path, bin: &Path) -> Vec<String>;

    /// Dependency paths listed in a record written by this compiler.
    fn parse_dependencies(&self, content: &str) -> Vec<PathBuf>;
}

pub fn for_family(family: Family) -> &'static dyn Dialect {
    match family {
        Family::Gcc => &super::gcc::Gcc,
        Family::Arm => &super::arm::Arm,
        Family::Iar => &super::iar::Iar,
    }
}

/// `tool_path/name`, or just `name` when the tools come from `PATH`.
pub fn tool(tool_path: &Path, name: &str) -> String {
    if tool_path.as_os_str().is_empty() {
        name.to_string()
    } else {
        tool_path.join(name).to_string_lossy().to_string()
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

pub fn strs(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Response file body: arguments joined by spaces, non-flag arguments
/// quoted, backslashes turned into forward slashes.
pub fn response_body(args: &[String]) -> String {
    args.iter()
        .filter(|a| !a.is_empty())
        .map(|a| {
            if a.starts_with('-') {
                a.clone()
            } else {
                format!("\"{}\"", a)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\\', "/")
}

/// Dependency records sit next to the object with a `.d` extension.
pub fn dependency_path(object: &Path) -> PathBuf {
    object.with_extension("d")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_body_quotes_paths_only() {
        let args = strs(&["-o", "out dir\\app.elf", "-Wl,--gc-sections", "", "main.o"]);
        assert_eq!(
            response_body(&args),
            "-o \"out dir/app.elf\" -Wl,--gc-sections \"main.o\""
        );
    }

    #[test]
    fn test_tool_without_path_uses_bare_name() {
        assert_eq!(tool(Path::new(""), "armcc"), "armcc");
        assert_eq!(tool(Path::new("/opt/arm/bin"), "armcc"), "/opt/arm/bin/armcc");
    }
}
