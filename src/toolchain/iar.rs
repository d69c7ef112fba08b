use super::dialect::{Dialect, LinkInputs, dependency_path, path_str, strs, tool};
use super::types::{Backend, BuildOptions, ToolSet};
use crate::target::Target;
use std::path::{Path, PathBuf};

const COMMON: &[&str] = &[
    "--no_wrap_diagnostics",
    "-e",
    "--diag_suppress=Pa050,Pa084,Pa093,Pa082",
];
const C: &[&str] = &["--vla"];
const CXX: &[&str] = &["--guard_calls", "--no_static_destruction"];
const LD: &[&str] = &["--skip_dynamic_initialization", "--threaded_lib"];

pub struct Iar;

impl Dialect for Iar {
    fn tools(
        &self,
        _backend: Backend,
        target: &Target,
        options: &BuildOptions,
        tool_path: &Path,
    ) -> ToolSet {
        let bin = if tool_path.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            tool_path.join("bin")
        };

        let core = target.core.as_str();
        let cpu = match core {
            "Cortex-M7F" | "Cortex-M7FD" => "Cortex-M7",
            other => other,
        };

        let mut common = strs(COMMON);
        common.extend([format!("--cpu={}", cpu), "--thumb".to_string()]);
        match core {
            "Cortex-M7F" => common.push("--fpu=VFPv5_sp".to_string()),
            "Cortex-M7FD" => common.push("--fpu=VFPv5".to_string()),
            _ => {}
        }
        if options.debug_info {
            common.extend(strs(&["-r", "-On"]));
        } else {
            common.push("-Oh".to_string());
        }

        let main_cc = tool(&bin, "iccarm");

        let mut cc = vec![main_cc.clone()];
        if !tool_path.as_os_str().is_empty() {
            let dlib = tool_path.join("inc").join("c").join("DLib_Config_Full.h");
            cc.extend(["--dlib_config".to_string(), path_str(&dlib)]);
        }
        cc.extend(common.iter().cloned());
        cc.extend(strs(C));

        let mut cppc = vec![main_cc];
        cppc.extend(strs(&["--c++", "--no_rtti", "--no_exceptions"]));
        cppc.extend(common);
        cppc.extend(strs(CXX));

        let mut ld = vec![tool(&bin, "ilinkarm")];
        ld.extend(strs(LD));

        ToolSet {
            asm: vec![tool(&bin, "iasmarm"), "--cpu".to_string(), cpu.to_string()],
            assembler: None,
            cc,
            cppc,
            ld,
            ar: tool(&bin, "iarchive"),
            elf2bin: tool(&bin, "ielftool"),
            sys_libs: Vec::new(),
            macros: Vec::new(),
        }
    }

    fn response_option(&self, file: &Path) -> Vec<String> {
        vec!["-f".to_string(), path_str(file)]
    }

    fn config_option(&self, header: &Path) -> Vec<String> {
        vec![format!("--preinclude={}", header.display())]
    }

    fn dependency_option(&self, object: &Path) -> Vec<String> {
        vec!["--dependencies".to_string(), path_str(&dependency_path(object))]
    }

    /// Assembler listing next to the object.
    fn compile_extra(&self, object: &Path) -> Vec<String> {
        vec!["-l".to_string(), path_str(&object.with_extension("s.txt"))]
    }

    fn asm_needs_config_macros(&self) -> bool {
        true
    }

    fn assemble(
        &self,
        tools: &ToolSet,
        options: Vec<String>,
        source: &Path,
        object: &Path,
    ) -> Vec<Vec<String>> {
        let mut cmd = tools.asm.clone();
        cmd.extend(options);
        cmd.extend(["-o".to_string(), path_str(object), path_str(source)]);
        vec![cmd]
    }

    fn link(&self, tools: &ToolSet, inputs: &LinkInputs<'_>) -> Vec<String> {
        let mut cmd = tools.ld.clone();
        cmd.extend([
            "-o".to_string(),
            path_str(inputs.output),
            format!("--map={}", inputs.map_file.display()),
        ]);
        cmd.extend(inputs.objects.iter().map(|o| path_str(o)));
        cmd.extend(inputs.libraries.iter().map(|l| path_str(l)));
        if let Some(script) = inputs.linker_script {
            cmd.extend(["--config".to_string(), path_str(script)]);
        }
        cmd
    }

    fn archive(&self, tools: &ToolSet, library: &Path, response_file: &Path) -> Vec<String> {
        vec![
            tools.ar.clone(),
            path_str(library),
            "-f".to_string(),
            path_str(response_file),
        ]
    }

    fn binary(&self, tools: &ToolSet, elf: &Path, bin: &Path) -> Vec<String> {
        vec![
            tools.elf2bin.clone(),
            "--bin".to_string(),
            path_str(elf),
            path_str(bin),
        ]
    }

    /// One dependency path per line.
    fn parse_dependencies(&self, content: &str) -> Vec<PathBuf> {
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetDb;

    #[test]
    fn test_m7_fpu_selection() {
        let target = TargetDb::builtin().get("DISCO_F746NG").unwrap().clone();
        let tools = Iar.tools(Backend::IAR, &target, &BuildOptions::default(), Path::new(""));
        assert_eq!(tools.asm, vec!["iasmarm", "--cpu", "Cortex-M7"]);
        assert!(tools.cc.contains(&"--fpu=VFPv5_sp".to_string()));
        assert!(tools.cc.contains(&"-Oh".to_string()));
    }

    #[test]
    fn test_compile_extra_writes_listing() {
        assert_eq!(
            Iar.compile_extra(Path::new("BUILD/main.o")),
            vec!["-l", "BUILD/main.s.txt"]
        );
    }

    #[test]
    fn test_parse_path_per_line_dependencies() {
        let content = "main.c\n\n  inc/util.h  \n";
        assert_eq!(
            Iar.parse_dependencies(content),
            vec![PathBuf::from("main.c"), PathBuf::from("inc/util.h")]
        );
    }
}
