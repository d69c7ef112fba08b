use super::dialect::{Dialect, LinkInputs, dependency_path, path_str, strs, tool};
use super::types::{Backend, BuildOptions, ToolSet};
use crate::target::Target;
use std::path::{Path, PathBuf};

const COMMON: &[&str] = &[
    "-c",
    "-Wall",
    "-Wextra",
    "-Wno-unused-parameter",
    "-Wno-missing-field-initializers",
    "-fmessage-length=0",
    "-fno-exceptions",
    "-fno-builtin",
    "-ffunction-sections",
    "-fdata-sections",
    "-funsigned-char",
    "-MMD",
    "-fno-delete-null-pointer-checks",
    "-fomit-frame-pointer",
];
const ASM: &[&str] = &["-x", "assembler-with-cpp"];
const C: &[&str] = &["-std=gnu99"];
const CXX: &[&str] = &["-std=gnu++98", "-fno-rtti", "-Wvla"];
const LD: &[&str] = &[
    "-Wl,--gc-sections",
    "-Wl,--wrap,main",
    "-Wl,--wrap,_malloc_r",
    "-Wl,--wrap,_free_r",
    "-Wl,--wrap,_realloc_r",
];

const CODE_RED_DEFINES: &[&str] = &["-D__NEWLIB__", "-D__CODE_RED", "-D__USE_CMSIS", "-DCPP_USE_HEAP"];

/// Targets whose printf/scanf need float support linked in.
const FLOAT_IO_SPACED: &[&str] = &["LPC1768", "LPC4088", "LPC4088_DM", "LPC4330", "UBLOX_C027", "LPC2368"];
const FLOAT_IO: &[&str] = &["NUCLEO_F401RE", "NUCLEO_F411RE", "NUCLEO_F429ZI", "NUCLEO_F446RE", "DISCO_F746NG"];

pub struct Gcc;

/// `-mcpu` and FPU flags for a core name such as `Cortex-M4F`.
pub fn cpu_flags(target: &Target) -> Vec<String> {
    let core = target.core.as_str();
    let base = core.trim_end_matches("FD").trim_end_matches('F');
    let fpu = target.fpu.as_deref().or(if core.ends_with("FD") {
        Some("double")
    } else if core.ends_with('F') {
        Some("single")
    } else {
        None
    });

    let cpu = if core == "Cortex-M0+" {
        "cortex-m0plus".to_string()
    } else {
        base.to_lowercase()
    };

    let mut flags = vec![format!("-mcpu={}", cpu)];
    if core.starts_with("Cortex") {
        flags.push("-mthumb".to_string());
    }

    match (base, fpu) {
        ("Cortex-M4", Some("single")) => {
            flags.extend(strs(&["-mfpu=fpv4-sp-d16", "-mfloat-abi=softfp"]));
        }
        ("Cortex-M7", Some("single")) => {
            flags.extend(strs(&["-mfpu=fpv5-sp-d16", "-mfloat-abi=softfp"]));
        }
        ("Cortex-M7", Some("double")) => {
            flags.extend(strs(&["-mfpu=fpv5-d16", "-mfloat-abi=softfp"]));
        }
        _ => {}
    }

    if base == "Cortex-A9" {
        flags.extend(strs(&[
            "-mthumb-interwork",
            "-marm",
            "-march=armv7-a",
            "-mfpu=vfpv3",
            "-mfloat-abi=hard",
            "-mno-unaligned-access",
        ]));
    }
    flags
}

/// Whether the reduced newlib (`nano.specs`) is linked.
fn use_nano(target: &Target, options: &BuildOptions) -> bool {
    if options.big_build {
        false
    } else if options.small_build {
        true
    } else {
        target.default_build == "small"
    }
}

impl Dialect for Gcc {
    fn tools(
        &self,
        backend: Backend,
        target: &Target,
        options: &BuildOptions,
        tool_path: &Path,
    ) -> ToolSet {
        let cpu = cpu_flags(target);

        let mut common = strs(COMMON);
        common.extend(cpu.iter().cloned());
        if options.save_asm {
            common.push("-save-temps".to_string());
        }
        if options.debug_info {
            common.extend(strs(&["-g", "-O0"]));
        } else {
            common.push("-Os".to_string());
        }

        let main_cc = tool(tool_path, "arm-none-eabi-gcc");
        let main_cppc = tool(tool_path, "arm-none-eabi-g++");

        let mut asm = vec![main_cc.clone()];
        asm.extend(strs(ASM));
        asm.extend(common.iter().cloned());

        let mut cc = vec![main_cc.clone()];
        cc.extend(strs(C));
        cc.extend(common.iter().cloned());

        let mut cppc = vec![main_cppc];
        cppc.extend(strs(CXX));
        cppc.extend(common.iter().cloned());

        let mut ld = vec![main_cc];
        ld.extend(strs(LD));
        ld.extend(cpu);

        let mut tools = ToolSet {
            asm,
            assembler: None,
            cc,
            cppc,
            ld,
            ar: tool(tool_path, "arm-none-eabi-ar"),
            elf2bin: tool(tool_path, "arm-none-eabi-objcopy"),
            sys_libs: strs(&["stdc++", "supc++", "m", "c", "gcc"]),
            macros: Vec::new(),
        };

        match backend {
            Backend::GccCr => {
                tools.cc.extend(strs(CODE_RED_DEFINES));
                tools.cppc.extend(strs(CODE_RED_DEFINES));
                tools.ld.push("--specs=nano.specs".to_string());
                if FLOAT_IO_SPACED.contains(&target.name.as_str()) {
                    tools.ld.extend(strs(&["-u _printf_float", "-u _scanf_float"]));
                }
                tools.ld.push("-nostdlib".to_string());
            }
            _ => {
                if use_nano(target, options) {
                    tools.ld.push("--specs=nano.specs".to_string());
                    tools.macros.push("XF_RTOS_SINGLE_THREAD".to_string());
                }
                if FLOAT_IO_SPACED.contains(&target.name.as_str()) {
                    tools.ld.extend(strs(&["-u _printf_float", "-u _scanf_float"]));
                } else if FLOAT_IO.contains(&target.name.as_str()) {
                    tools.ld.extend(strs(&["-u_printf_float", "-u_scanf_float"]));
                }
                tools.sys_libs.push("nosys".to_string());
            }
        }
        tools
    }

    fn response_option(&self, file: &Path) -> Vec<String> {
        vec![format!("@{}", file.display())]
    }

    fn config_option(&self, header: &Path) -> Vec<String> {
        vec!["-include".to_string(), path_str(header)]
    }

    fn dependency_option(&self, object: &Path) -> Vec<String> {
        vec![
            "-MD".to_string(),
            "-MF".to_string(),
            path_str(&dependency_path(object)),
        ]
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
        let mut libs: Vec<String> = inputs
            .libraries
            .iter()
            .filter_map(|l| l.file_stem())
            .map(|stem| {
                let stem = stem.to_string_lossy();
                format!("-l{}", stem.strip_prefix("lib").unwrap_or(&stem))
            })
            .collect();
        libs.extend(tools.sys_libs.iter().map(|l| format!("-l{}", l)));

        let mut cmd = tools.ld.clone();
        cmd.extend([
            "-o".to_string(),
            path_str(inputs.output),
            format!("-Wl,-Map={}", inputs.map_file.display()),
        ]);
        cmd.extend(inputs.objects.iter().map(|o| path_str(o)));
        cmd.push("-Wl,--start-group".to_string());
        cmd.extend(libs.iter().cloned());
        cmd.push("-Wl,--end-group".to_string());
        if let Some(script) = inputs.linker_script {
            cmd.extend(["-T".to_string(), path_str(script)]);
        }
        for dir in inputs.lib_dirs {
            cmd.extend(["-L".to_string(), path_str(dir)]);
        }
        cmd.extend(libs);
        cmd
    }

    fn archive(&self, tools: &ToolSet, library: &Path, response_file: &Path) -> Vec<String> {
        vec![
            tools.ar.clone(),
            "rcs".to_string(),
            path_str(library),
            format!("@{}", response_file.display()),
        ]
    }

    fn binary(&self, tools: &ToolSet, elf: &Path, bin: &Path) -> Vec<String> {
        vec![
            tools.elf2bin.clone(),
            "-O".to_string(),
            "binary".to_string(),
            path_str(elf),
            path_str(bin),
        ]
    }

    /// Make-format record: `obj.o: a.c b.h \` with continuation lines.
    /// A space inside a path is written as `\ `.
    fn parse_dependencies(&self, content: &str) -> Vec<PathBuf> {
        const SPACE: char = '\u{7}';

        let mut deps = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = if i == 0 {
                line.split_once(": ").map_or(line, |(_, rest)| rest)
            } else {
                line
            };
            let line = line.trim_end();
            let line = line.strip_suffix('\\').unwrap_or(line).trim();
            if line.is_empty() {
                continue;
            }
            let escaped = line.replace("\\ ", &SPACE.to_string());
            deps.extend(
                escaped
                    .split(' ')
                    .filter(|s| !s.is_empty())
                    .map(|s| PathBuf::from(s.replace(SPACE, " "))),
            );
        }
        deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetDb;
    use std::collections::BTreeSet;

    fn target(name: &str) -> Target {
        TargetDb::builtin().get(name).unwrap().clone()
    }

    #[test]
    fn test_cpu_flags_for_single_precision_m4() {
        let flags = cpu_flags(&target("K64F"));
        assert_eq!(
            flags,
            vec!["-mcpu=cortex-m4", "-mthumb", "-mfpu=fpv4-sp-d16", "-mfloat-abi=softfp"]
        );
    }

    #[test]
    fn test_cpu_flags_for_m0plus_and_a9() {
        let m0 = Target {
            core: "Cortex-M0+".to_string(),
            ..Default::default()
        };
        assert_eq!(cpu_flags(&m0), vec!["-mcpu=cortex-m0plus", "-mthumb"]);

        let a9 = Target {
            core: "Cortex-A9".to_string(),
            ..Default::default()
        };
        let flags = cpu_flags(&a9);
        assert!(flags.contains(&"-mfloat-abi=hard".to_string()));
        assert!(flags.contains(&"-march=armv7-a".to_string()));
    }

    #[test]
    fn test_nano_specs_follow_default_build() {
        let opts = BuildOptions::default();
        let small = Gcc.tools(Backend::GccArm, &target("NUCLEO_F401RE"), &opts, Path::new(""));
        assert!(small.ld.contains(&"--specs=nano.specs".to_string()));
        assert_eq!(small.macros, vec!["XF_RTOS_SINGLE_THREAD"]);

        let big = BuildOptions {
            big_build: true,
            ..Default::default()
        };
        let full = Gcc.tools(Backend::GccArm, &target("NUCLEO_F401RE"), &big, Path::new(""));
        assert!(!full.ld.contains(&"--specs=nano.specs".to_string()));
        assert!(full.sys_libs.contains(&"nosys".to_string()));
    }

    #[test]
    fn test_code_red_adds_newlib_defines() {
        let tools = Gcc.tools(
            Backend::GccCr,
            &target("LPC1768"),
            &BuildOptions::default(),
            Path::new("/opt/cr"),
        );
        assert_eq!(tools.cc[0], "/opt/cr/arm-none-eabi-gcc");
        assert!(tools.cc.contains(&"-D__CODE_RED".to_string()));
        assert_eq!(tools.ld.last().unwrap(), "-nostdlib");
        assert!(!tools.sys_libs.contains(&"nosys".to_string()));
    }

    #[test]
    fn test_debug_info_disables_optimisation() {
        let opts = BuildOptions {
            debug_info: true,
            ..Default::default()
        };
        let tools = Gcc.tools(Backend::GccArm, &target("K64F"), &opts, Path::new(""));
        assert!(tools.cc.contains(&"-O0".to_string()));
        assert!(!tools.cc.contains(&"-Os".to_string()));
    }

    #[test]
    fn test_parse_make_dependencies() {
        let content = "BUILD/main.o: main.c util.h \\\n  lib/my\\ dir/x.h \\\n  /usr/include/stdio.h\n";
        assert_eq!(
            Gcc.parse_dependencies(content),
            vec![
                PathBuf::from("main.c"),
                PathBuf::from("util.h"),
                PathBuf::from("lib/my dir/x.h"),
                PathBuf::from("/usr/include/stdio.h"),
            ]
        );
    }

    #[test]
    fn test_link_command_layout() {
        let tools = Gcc.tools(Backend::GccArm, &target("K64F"), &BuildOptions::default(), Path::new(""));
        let lib_dirs: BTreeSet<PathBuf> = [PathBuf::from("/l")].into_iter().collect();
        let objects = vec![PathBuf::from("a.o")];
        let libraries = vec![PathBuf::from("/l/libfoo.a")];
        let cmd = Gcc.link(
            &tools,
            &LinkInputs {
                output: Path::new("out/app.elf"),
                map_file: Path::new("out/app.map"),
                objects: &objects,
                libraries: &libraries,
                lib_dirs: &lib_dirs,
                linker_script: Some(Path::new("app.ld")),
            },
        );
        let text = cmd.join(" ");
        assert!(text.starts_with("arm-none-eabi-gcc -Wl,--gc-sections"));
        assert!(text.contains("-o out/app.elf -Wl,-Map=out/app.map a.o -Wl,--start-group -lfoo"));
        assert!(text.contains("-T app.ld -L /l -lfoo"));
    }
}
