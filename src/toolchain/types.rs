use crate::error::BuildError;
use std::fmt;

/// Supported compiler backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(clippy::upper_case_acronyms)]
pub enum Backend {
    /// GNU Arm Embedded (arm-none-eabi-gcc)
    GccArm,
    /// GCC shipped with the LPCXpresso / Code Red IDE
    GccCr,
    /// Arm Compiler 5 with the standard C library
    ArmStd,
    /// Arm Compiler 5 with microlib
    ArmMicro,
    /// IAR Embedded Workbench for Arm
    IAR,
}

/// Backends sharing command-line conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Gcc,
    Arm,
    Iar,
}

/// The fixed facts about one backend. Everything a scanner or the staleness
/// logic needs to know without building a full toolchain.
#[derive(Debug)]
pub struct BackendSpec {
    pub name: &'static str,
    pub family: Family,
    /// The backend and its ancestor classes, most specific first.
    pub labels: &'static [&'static str],
    /// Name used by the pre-label directory convention.
    pub legacy_name: &'static str,
    pub linker_ext: &'static str,
    pub library_ext: &'static str,
    pub object_ext: &'static str,
    /// `{}` is replaced with the library name.
    pub library_name: &'static str,
    pub diagnostic_pattern: &'static str,
    pub not_supported_marker: &'static str,
}

const GCC_DIAGNOSTIC: &str =
    r"^((?P<file>[^:]+):(?P<line>\d+):)(\d+:)? (?P<severity>warning|error): (?P<message>.+)";
const ARM_DIAGNOSTIC: &str = r#"^"(?P<file>[^"]+)", line (?P<line>\d+)( \(column (?P<column>\d+)\)|): (?P<severity>Warning|Error): (?P<message>.+)"#;
const IAR_DIAGNOSTIC: &str =
    r#"^"(?P<file>[^"]+)",(?P<line>\d+)\s+(?P<severity>Warning|Error)(?P<message>.+)"#;

const DEFAULT_NOT_SUPPORTED: &str = "#error directive: [NOT_SUPPORTED]";

static GCC_ARM: BackendSpec = BackendSpec {
    name: "GCC_ARM",
    family: Family::Gcc,
    labels: &["GCC_ARM", "GCC"],
    legacy_name: "GCC_ARM",
    linker_ext: "ld",
    library_ext: "a",
    object_ext: "o",
    library_name: "lib{}.a",
    diagnostic_pattern: GCC_DIAGNOSTIC,
    not_supported_marker: "error: #error [NOT_SUPPORTED]",
};

static GCC_CR: BackendSpec = BackendSpec {
    name: "GCC_CR",
    family: Family::Gcc,
    labels: &["GCC_CR", "GCC"],
    legacy_name: "GCC_CR",
    linker_ext: "ld",
    library_ext: "a",
    object_ext: "o",
    library_name: "lib{}.a",
    diagnostic_pattern: GCC_DIAGNOSTIC,
    not_supported_marker: "error: #error [NOT_SUPPORTED]",
};

static ARM_STD: BackendSpec = BackendSpec {
    name: "ARM",
    family: Family::Arm,
    labels: &["ARM_STD", "ARM"],
    legacy_name: "ARM",
    linker_ext: "sct",
    library_ext: "ar",
    object_ext: "o",
    library_name: "{}.ar",
    diagnostic_pattern: ARM_DIAGNOSTIC,
    not_supported_marker: DEFAULT_NOT_SUPPORTED,
};

static ARM_MICRO: BackendSpec = BackendSpec {
    name: "uARM",
    family: Family::Arm,
    labels: &["ARM_MICRO", "ARM"],
    legacy_name: "uARM",
    linker_ext: "sct",
    library_ext: "ar",
    object_ext: "o",
    library_name: "{}.ar",
    diagnostic_pattern: ARM_DIAGNOSTIC,
    not_supported_marker: DEFAULT_NOT_SUPPORTED,
};

static IAR: BackendSpec = BackendSpec {
    name: "IAR",
    family: Family::Iar,
    labels: &["IAR"],
    legacy_name: "IAR",
    linker_ext: "icf",
    library_ext: "a",
    object_ext: "o",
    library_name: "{}.a",
    diagnostic_pattern: IAR_DIAGNOSTIC,
    not_supported_marker: DEFAULT_NOT_SUPPORTED,
};

impl Backend {
    pub const ALL: [Backend; 5] = [
        Backend::GccArm,
        Backend::GccCr,
        Backend::ArmStd,
        Backend::ArmMicro,
        Backend::IAR,
    ];

    pub fn from_name(name: &str) -> Result<Self, BuildError> {
        match name.to_uppercase().as_str() {
            "GCC_ARM" => Ok(Backend::GccArm),
            "GCC_CR" => Ok(Backend::GccCr),
            "ARM" | "ARM_STD" => Ok(Backend::ArmStd),
            "UARM" | "ARM_MICRO" => Ok(Backend::ArmMicro),
            "IAR" => Ok(Backend::IAR),
            _ => Err(BuildError::Configuration(format!(
                "Toolchain {} not supported",
                name
            ))),
        }
    }

    pub fn spec(self) -> &'static BackendSpec {
        match self {
            Backend::GccArm => &GCC_ARM,
            Backend::GccCr => &GCC_CR,
            Backend::ArmStd => &ARM_STD,
            Backend::ArmMicro => &ARM_MICRO,
            Backend::IAR => &IAR,
        }
    }

    /// Canonical name, as used in target descriptors and build paths.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn family(self) -> Family {
        self.spec().family
    }

    pub fn labels(self) -> &'static [&'static str] {
        self.spec().labels
    }

    /// Names accepted in a target's `supported_toolchains` for this backend.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Backend::GccArm => &["GCC_ARM"],
            Backend::GccCr => &["GCC_CR"],
            Backend::ArmStd => &["ARM", "ARM_STD"],
            Backend::ArmMicro => &["uARM", "ARM_MICRO"],
            Backend::IAR => &["IAR"],
        }
    }

    pub fn library_file_name(self, name: &str) -> String {
        self.spec().library_name.replace("{}", name)
    }

    /// Environment variable that may hold the tool directory.
    pub fn path_env_var(self) -> String {
        format!("XF_{}_PATH", self.name().to_uppercase())
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Build options that change generated flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Debug info and no optimisation; also selects the `DEBUG` label.
    pub debug_info: bool,
    /// Keep intermediate assembly next to objects.
    pub save_asm: bool,
    /// Force the reduced C library.
    pub small_build: bool,
    /// Force the full C library.
    pub big_build: bool,
}

impl BuildOptions {
    pub fn from_names(names: &[String]) -> Self {
        let has = |n: &str| names.iter().any(|o| o == n);
        Self {
            debug_info: has("debug-info"),
            save_asm: has("save-asm"),
            small_build: has("small-build"),
            big_build: has("big-build"),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.debug_info {
            out.push("debug-info");
        }
        if self.save_asm {
            out.push("save-asm");
        }
        if self.small_build {
            out.push("small-build");
        }
        if self.big_build {
            out.push("big-build");
        }
        out
    }
}

/// Prepared command prefixes for one toolchain instance.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    pub asm: Vec<String>,
    /// Standalone assembler, for backends whose `asm` prefix only
    /// preprocesses.
    pub assembler: Option<String>,
    pub cc: Vec<String>,
    pub cppc: Vec<String>,
    pub ld: Vec<String>,
    pub ar: String,
    pub elf2bin: String,
    pub sys_libs: Vec<String>,
    /// Macros the backend itself adds to every compile.
    pub macros: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_accepts_aliases() {
        assert_eq!(Backend::from_name("GCC_ARM").unwrap(), Backend::GccArm);
        assert_eq!(Backend::from_name("arm_std").unwrap(), Backend::ArmStd);
        assert_eq!(Backend::from_name("uARM").unwrap(), Backend::ArmMicro);
        assert!(matches!(
            Backend::from_name("MSVC"),
            Err(BuildError::Configuration(_))
        ));
    }

    #[test]
    fn test_every_backend_round_trips_by_name() {
        for backend in Backend::ALL {
            assert_eq!(Backend::from_name(backend.name()).unwrap(), backend);
            for alias in backend.aliases() {
                assert_eq!(Backend::from_name(alias).unwrap(), backend);
            }
        }
    }

    #[test]
    fn test_library_file_names() {
        assert_eq!(Backend::GccArm.library_file_name("xf"), "libxf.a");
        assert_eq!(Backend::ArmStd.library_file_name("xf"), "xf.ar");
        assert_eq!(Backend::IAR.library_file_name("xf"), "xf.a");
    }

    #[test]
    fn test_build_options_from_names() {
        let opts = BuildOptions::from_names(&["debug-info".to_string(), "small-build".to_string()]);
        assert!(opts.debug_info && opts.small_build);
        assert!(!opts.save_asm && !opts.big_build);
        assert_eq!(opts.names(), vec!["debug-info", "small-build"]);
    }
}
