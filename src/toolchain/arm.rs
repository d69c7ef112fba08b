use super::dialect::{Dialect, LinkInputs, dependency_path, path_str, strs, tool};
use super::types::{Backend, BuildOptions, ToolSet};
use crate::target::Target;
use std::path::{Path, PathBuf};

const COMMON: &[&str] = &[
    "-c",
    "--gnu",
    "-Otime",
    "--split_sections",
    "--apcs=interwork",
    "--brief_diagnostics",
    "--restrict",
    "--multibyte_chars",
];
const C: &[&str] = &["--md", "--no_depend_system_headers", "--c99", "-D__ASSERT_MSG"];
const CXX: &[&str] = &["--cpp", "--no_rtti", "--no_vla"];

pub struct Arm;

/// armcc spelling of a core name.
fn cpu_name(core: &str) -> String {
    match core {
        "Cortex-M0+" => "Cortex-M0".to_string(),
        "Cortex-M4F" => "Cortex-M4.fp".to_string(),
        "Cortex-M7FD" => "Cortex-M7.fp.dp".to_string(),
        "Cortex-M7F" => "Cortex-M7.fp.sp".to_string(),
        other => other.to_string(),
    }
}

impl Dialect for Arm {
    fn tools(
        &self,
        backend: Backend,
        target: &Target,
        options: &BuildOptions,
        tool_path: &Path,
    ) -> ToolSet {
        let bin = tool_path.join("bin");
        let bin = if tool_path.as_os_str().is_empty() {
            PathBuf::new()
        } else {
            bin
        };

        let mut common = strs(COMMON);
        common.push(format!("--cpu={}", cpu_name(&target.core)));
        if options.save_asm {
            common.extend(strs(&["--asm", "--interleave"]));
        }

        let mut c = strs(C);
        if options.debug_info {
            common.push("-g".to_string());
            c.push("-O0".to_string());
        } else {
            c.push("-O3".to_string());
        }

        let main_cc = tool(&bin, "armcc");
        let system_inc = if tool_path.as_os_str().is_empty() {
            Vec::new()
        } else {
            vec![format!("-I{}", tool_path.join("include").display())]
        };

        let mut asm = vec![main_cc.clone()];
        asm.extend(common.iter().cloned());
        asm.extend(system_inc.iter().cloned());

        let mut cc = vec![main_cc.clone()];
        cc.extend(common.iter().cloned());
        cc.extend(c.iter().cloned());
        cc.extend(system_inc.iter().cloned());

        let mut cppc = vec![main_cc];
        cppc.extend(common.iter().cloned());
        cppc.extend(c);
        cppc.extend(strs(CXX));
        cppc.extend(system_inc);

        let mut ld = vec![tool(&bin, "armlink")];

        match backend {
            Backend::ArmMicro => {
                asm.push("-D__MICROLIB".to_string());
                for cmd in [&mut cc, &mut cppc] {
                    cmd.extend(strs(&["-D__MICROLIB", "--library_type=microlib"]));
                }
                ld.push("--library_type=microlib".to_string());
            }
            _ => {
                if !tool_path.as_os_str().is_empty() {
                    ld.extend(["--libpath".to_string(), path_str(&tool_path.join("lib"))]);
                }
            }
        }

        ToolSet {
            asm,
            assembler: Some(tool(&bin, "armasm")),
            cc,
            cppc,
            ld,
            ar: tool(&bin, "armar"),
            elf2bin: tool(&bin, "fromelf"),
            sys_libs: Vec::new(),
            macros: Vec::new(),
        }
    }

    fn response_option(&self, file: &Path) -> Vec<String> {
        vec!["--via".to_string(), path_str(file)]
    }

    fn config_option(&self, header: &Path) -> Vec<String> {
        vec![format!("--preinclude={}", header.display())]
    }

    fn dependency_option(&self, object: &Path) -> Vec<String> {
        vec!["--depend".to_string(), path_str(&dependency_path(object))]
    }

    /// Preprocess with armcc into `.temp/<object>.E.s`, then run armasm.
    fn assemble(
        &self,
        tools: &ToolSet,
        options: Vec<String>,
        source: &Path,
        object: &Path,
    ) -> Vec<Vec<String>> {
        let dir = object.parent().unwrap_or(Path::new("")).join(".temp");
        let file_name = object
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let preprocessed = dir.join(format!("{}.E.s", file_name));

        let mut pre = tools.asm.clone();
        pre.extend(options);
        pre.extend([
            "-E".to_string(),
            "-o".to_string(),
            path_str(&preprocessed),
            path_str(source),
        ]);

        // armcc -E cannot assemble, so the second step runs armasm
        let assembler = tools
            .assembler
            .clone()
            .unwrap_or_else(|| "armasm".to_string());
        let cpu = tools.asm.iter().find(|a| a.starts_with("--cpu="));
        let mut asm = vec![assembler];
        asm.extend(cpu.cloned());
        asm.extend(["-o".to_string(), path_str(object), path_str(&preprocessed)]);

        vec![pre, asm]
    }

    fn link(&self, tools: &ToolSet, inputs: &LinkInputs<'_>) -> Vec<String> {
        let mut cmd = tools.ld.clone();
        cmd.extend(["-o".to_string(), path_str(inputs.output)]);
        if !inputs.lib_dirs.is_empty() {
            let dirs: Vec<String> = inputs.lib_dirs.iter().map(|d| path_str(d)).collect();
            cmd.extend(["--userlibpath".to_string(), dirs.join(",")]);
        }
        cmd.extend([
            "--info=totals".to_string(),
            "--map".to_string(),
            format!("--list={}", inputs.map_file.display()),
        ]);
        if let Some(script) = inputs.linker_script {
            cmd.extend(["--scatter".to_string(), path_str(script)]);
        }
        cmd.extend(inputs.objects.iter().map(|o| path_str(o)));
        cmd.extend(inputs.libraries.iter().map(|l| path_str(l)));
        cmd.extend(tools.sys_libs.iter().cloned());
        cmd
    }

    fn archive(&self, tools: &ToolSet, library: &Path, response_file: &Path) -> Vec<String> {
        vec![
            tools.ar.clone(),
            "-r".to_string(),
            path_str(library),
            "--via".to_string(),
            path_str(response_file),
        ]
    }

    fn binary(&self, tools: &ToolSet, elf: &Path, bin: &Path) -> Vec<String> {
        vec![
            tools.elf2bin.clone(),
            "--bin".to_string(),
            "-o".to_string(),
            path_str(bin),
            path_str(elf),
        ]
    }

    /// One `obj.o: dependency` pair per line.
    fn parse_dependencies(&self, content: &str) -> Vec<PathBuf> {
        content
            .lines()
            .filter_map(|line| line.split_once(": "))
            .map(|(_, dep)| dep.trim())
            .filter(|dep| !dep.is_empty())
            .map(PathBuf::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetDb;

    fn k64f() -> Target {
        TargetDb::builtin().get("K64F").unwrap().clone()
    }

    #[test]
    fn test_cpu_names() {
        assert_eq!(cpu_name("Cortex-M4F"), "Cortex-M4.fp");
        assert_eq!(cpu_name("Cortex-M7FD"), "Cortex-M7.fp.dp");
        assert_eq!(cpu_name("Cortex-M3"), "Cortex-M3");
    }

    #[test]
    fn test_microlib_flags() {
        let tools = Arm.tools(Backend::ArmMicro, &k64f(), &BuildOptions::default(), Path::new(""));
        assert_eq!(tools.cc[0], "armcc");
        assert!(tools.cc.contains(&"--library_type=microlib".to_string()));
        assert!(tools.asm.contains(&"-D__MICROLIB".to_string()));
        assert_eq!(tools.ld, vec!["armlink", "--library_type=microlib"]);
    }

    #[test]
    fn test_standard_library_path_from_tool_dir() {
        let tools = Arm.tools(Backend::ArmStd, &k64f(), &BuildOptions::default(), Path::new("/opt/armcc"));
        assert_eq!(tools.cc[0], "/opt/armcc/bin/armcc");
        assert_eq!(tools.ld, vec!["/opt/armcc/bin/armlink", "--libpath", "/opt/armcc/lib"]);
        assert!(tools.cc.contains(&"-I/opt/armcc/include".to_string()));
    }

    #[test]
    fn test_assembly_is_preprocess_then_assemble() {
        let tools = Arm.tools(Backend::ArmStd, &k64f(), &BuildOptions::default(), Path::new(""));
        let cmds = Arm.assemble(
            &tools,
            vec!["-DFOO".to_string()],
            Path::new("startup.S"),
            Path::new("BUILD/startup.o"),
        );
        assert_eq!(cmds.len(), 2);
        assert!(cmds[0].ends_with(&[
            "-DFOO".to_string(),
            "-E".to_string(),
            "-o".to_string(),
            "BUILD/.temp/startup.o.E.s".to_string(),
            "startup.S".to_string()
        ]));
        assert_eq!(
            cmds[1],
            vec!["armasm", "--cpu=Cortex-M4.fp", "-o", "BUILD/startup.o", "BUILD/.temp/startup.o.E.s"]
        );
    }

    #[test]
    fn test_assembler_resolved_in_tool_dir() {
        let tools = Arm.tools(Backend::ArmMicro, &k64f(), &BuildOptions::default(), Path::new("/opt/armcc"));
        let cmds = Arm.assemble(&tools, Vec::new(), Path::new("startup.S"), Path::new("startup.o"));
        assert_eq!(cmds[0][0], "/opt/armcc/bin/armcc");
        assert_eq!(cmds[1][0], "/opt/armcc/bin/armasm");
    }

    #[test]
    fn test_parse_pair_per_line_dependencies() {
        let content = "main.o: main.c\nmain.o: inc/util.h\nmain.o: C:\\Keil\\include\\stdio.h\n";
        assert_eq!(
            Arm.parse_dependencies(content),
            vec![
                PathBuf::from("main.c"),
                PathBuf::from("inc/util.h"),
                PathBuf::from("C:\\Keil\\include\\stdio.h"),
            ]
        );
    }
}
