//! Toolchain abstraction.
//!
//! A [`Toolchain`] is one backend bound to one target. It turns scanned
//! resources into compile jobs, runs them through the scheduler, and drives
//! the archive and link steps. Every step that produces a file is gated by
//! [`needs_rebuild`].

mod arm;
mod dialect;
mod gcc;
mod iar;
pub mod types;

pub use dialect::LinkInputs;
pub use types::{Backend, BackendSpec, BuildOptions, Family, ToolSet};

use crate::build::process::{CommandOutcome, run_command};
use crate::build::staleness::needs_rebuild;
use crate::build::{BuildJob, JobResult, Scheduler};
use crate::error::BuildError;
use crate::features::ConfigData;
use crate::memap::{GnuMapAnalyzer, MemoryMapAnalyzer, MemoryUsage};
use crate::notify::{Diagnostic, Event, Reporter, Severity};
use crate::resources::{LabelSet, Resources, Scanner};
use crate::target::Target;
use dialect::{Dialect, dependency_path, response_body};
use indexmap::IndexSet;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::cell::OnceCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::time::{SystemTime, UNIX_EPOCH};

/// Generated header force-included into every compile.
pub const CONFIG_HEADER: &str = "xf_config.h";
pub const LINK_FILES: &str = ".link_files.txt";
pub const ARCHIVE_FILES: &str = ".archive_files.txt";

fn core_symbols(core: &str) -> &'static [&'static str] {
    match core.trim_end_matches("FD").trim_end_matches('F') {
        "Cortex-M0" => &["__CORTEX_M0", "ARM_MATH_CM0", "__CMSIS_RTOS", "__XF_CMSIS_RTOS_CM"],
        "Cortex-M0+" => &["__CORTEX_M0PLUS", "ARM_MATH_CM0PLUS", "__CMSIS_RTOS", "__XF_CMSIS_RTOS_CM"],
        "Cortex-M1" => &["__CORTEX_M3", "ARM_MATH_CM1"],
        "Cortex-M3" => &["__CORTEX_M3", "ARM_MATH_CM3", "__CMSIS_RTOS", "__XF_CMSIS_RTOS_CM"],
        "Cortex-M4" => &["__CORTEX_M4", "ARM_MATH_CM4", "__CMSIS_RTOS", "__XF_CMSIS_RTOS_CM"],
        "Cortex-M7" => &["__CORTEX_M7", "ARM_MATH_CM7", "__CMSIS_RTOS", "__XF_CMSIS_RTOS_CM"],
        "Cortex-A9" => &[
            "__CORTEX_A9",
            "ARM_MATH_CA9",
            "__FPU_PRESENT",
            "__CMSIS_RTOS",
            "__EVAL",
            "__XF_CMSIS_RTOS_CA9",
        ],
        _ => &[],
    }
}

fn has_fpu(target: &Target) -> bool {
    matches!(target.fpu.as_deref(), Some("single") | Some("double"))
        || target.core.ends_with('F')
        || target.core.ends_with("FD")
}

/// Result of [`Toolchain::link_program`].
#[derive(Debug, Clone)]
pub struct LinkOutcome {
    pub binary: PathBuf,
    pub updated: bool,
    pub memory_usage: Option<MemoryUsage>,
}

pub struct Toolchain {
    backend: Backend,
    target: Target,
    options: BuildOptions,
    /// Caller-supplied definitions.
    macros: Vec<String>,
    tools: ToolSet,
    dialect: &'static dyn Dialect,
    diagnostic: Regex,

    /// Rebuild everything regardless of timestamps.
    pub build_all: bool,
    pub scheduler: Scheduler,

    /// Where response files and the config header are written.
    build_dir: PathBuf,
    inc_hash: String,
    config: Option<ConfigData>,
    timestamp: u64,
    work_dir: PathBuf,

    reporter: Reporter,
    memory_map: Box<dyn MemoryMapAnalyzer>,

    symbols: OnceCell<Vec<String>>,
    labels: OnceCell<LabelSet>,

    compiled: usize,
    to_be_compiled: usize,
}

impl Toolchain {
    pub fn new(
        target: Target,
        backend: Backend,
        options: BuildOptions,
        macros: Vec<String>,
        tool_path: &Path,
        reporter: Reporter,
    ) -> Result<Self, BuildError> {
        let spec = backend.spec();
        let diagnostic = Regex::new(spec.diagnostic_pattern).map_err(|e| {
            BuildError::Configuration(format!("bad diagnostic pattern for {}: {}", backend, e))
        })?;
        let dialect = dialect::for_family(spec.family);
        let tools = dialect.tools(backend, &target, &options, tool_path);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut toolchain = Self {
            backend,
            target,
            options,
            macros,
            tools,
            dialect,
            diagnostic,
            build_all: false,
            scheduler: Scheduler::default(),
            build_dir: PathBuf::new(),
            inc_hash: String::new(),
            config: None,
            timestamp,
            work_dir: std::env::current_dir()?,
            reporter,
            memory_map: Box::new(GnuMapAnalyzer),
            symbols: OnceCell::new(),
            labels: OnceCell::new(),
            compiled: 0,
            to_be_compiled: 0,
        };

        let names = toolchain.options.names();
        if !names.is_empty() {
            toolchain
                .reporter
                .info(format!("Build Options: {}", names.join(", ")));
        }
        Ok(toolchain)
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn reporter(&mut self) -> &mut Reporter {
        &mut self.reporter
    }

    pub fn output(&self) -> &str {
        self.reporter.output()
    }

    /// Sources compiled by the last [`Toolchain::compile_sources`] call.
    pub fn compiled(&self) -> usize {
        self.compiled
    }

    /// Directory commands run in; relative dependency paths resolve here.
    pub fn set_work_dir(&mut self, dir: impl Into<PathBuf>) {
        self.work_dir = dir.into();
    }

    pub fn set_memory_map(&mut self, analyzer: Box<dyn MemoryMapAnalyzer>) {
        self.memory_map = analyzer;
    }

    pub fn set_config_data(&mut self, config: ConfigData) {
        self.config = Some(config);
    }

    /// Adds caller definitions. Clears the cached symbol list.
    pub fn add_macros<I: IntoIterator<Item = String>>(&mut self, macros: I) {
        self.macros.extend(macros);
        self.symbols = OnceCell::new();
    }

    /// Labels for this target, backend and profile. Computed once.
    pub fn labels(&self) -> &LabelSet {
        self.labels
            .get_or_init(|| LabelSet::for_build(&self.target, self.backend, &self.options))
    }

    /// Every preprocessor definition passed to compiles, without duplicates.
    pub fn symbols(&self) -> &[String] {
        self.symbols.get_or_init(|| {
            let labels = self.labels();
            let mut symbols: IndexSet<String> = IndexSet::new();

            symbols.extend(labels.targets.iter().map(|t| format!("TARGET_{}", t)));
            symbols.insert(format!("TARGET_{}", labels.profile));
            symbols.extend(labels.toolchains.iter().map(|t| format!("TOOLCHAIN_{}", t)));

            symbols.extend(core_symbols(&self.target.core).iter().map(|s| s.to_string()));
            if has_fpu(&self.target) {
                symbols.insert("__FPU_PRESENT=1".to_string());
            }

            symbols.insert(format!("XF_BUILD_TIMESTAMP={}", self.timestamp));
            symbols.insert("TARGET_LIKE_XF".to_string());
            symbols.insert("__XF__=1".to_string());

            symbols.extend(self.target.macros.iter().cloned());
            symbols.extend(self.target.device_has.iter().map(|d| format!("DEVICE_{}=1", d)));
            symbols.extend(self.target.features.iter().map(|f| format!("FEATURE_{}=1", f)));
            symbols.extend(self.macros.iter().cloned());
            symbols.extend(self.tools.macros.iter().cloned());
            symbols.extend(
                self.target
                    .supported_form_factors
                    .iter()
                    .map(|f| format!("TARGET_FF_{}", f)),
            );
            symbols.into_iter().collect()
        })
    }

    /// Scans `path` with this toolchain's labels and extensions.
    pub fn scan_resources(&mut self, path: &Path, exclude_paths: &[PathBuf]) -> Resources {
        let mut scanner = Scanner::new(self.labels().clone(), self.backend);
        let resources = scanner.scan(path, exclude_paths);
        for warning in scanner.take_warnings() {
            self.reporter.info(warning);
        }
        resources
    }

    /// `<build_path>/<source dir relative to base>/<stem>.o`, with the
    /// directory created.
    pub fn relative_object_path(
        &self,
        build_path: &Path,
        base_dir: &Path,
        source: &Path,
    ) -> Result<PathBuf, BuildError> {
        let source_dir = source.parent().unwrap_or(Path::new(""));
        let relative = match source_dir.strip_prefix(base_dir) {
            Ok(rel) => rel.to_path_buf(),
            // Outside its base: keep the plain directory names
            Err(_) => source_dir
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect(),
        };
        let obj_dir = build_path.join(relative);
        fs::create_dir_all(&obj_dir)?;

        let stem = source.file_stem().unwrap_or_default().to_string_lossy();
        let object = format!("{}.{}", stem, self.backend.spec().object_ext);
        Ok(obj_dir.join(object))
    }

    /// The include response file for `includes`, written on first use.
    pub fn inc_file(&self, includes: &[String]) -> Result<PathBuf, BuildError> {
        let path = self.build_dir.join(format!(".includes_{}.txt", self.inc_hash));
        if !path.exists() {
            let body = includes
                .iter()
                .filter(|i| !i.is_empty())
                .map(|i| format!("-I\"{}\"", i))
                .collect::<Vec<_>>()
                .join(" ")
                .replace('\\', "/");
            fs::write(&path, body)?;
        }
        Ok(path)
    }

    /// Writes the config header when its content changed.
    pub fn config_header(&self) -> Result<Option<PathBuf>, BuildError> {
        let Some(body) = self.config.as_ref().and_then(ConfigData::header) else {
            return Ok(None);
        };
        let path = self.build_dir.join(CONFIG_HEADER);
        if fs::read_to_string(&path).ok().as_deref() != Some(body.as_str()) {
            fs::create_dir_all(&self.build_dir)?;
            fs::write(&path, body)?;
        }
        Ok(Some(path))
    }

    fn compile_options(&self, includes: &[String], for_asm: bool) -> Result<Vec<String>, BuildError> {
        let mut defines: Vec<String> = self.symbols().to_vec();
        if let Some(config) = &self.config {
            defines.extend(config.macros.iter().cloned());
            if for_asm && self.dialect.asm_needs_config_macros() {
                defines.extend(config.param_macros());
            }
        }

        let mut opts: Vec<String> = defines.iter().map(|d| format!("-D{}", d)).collect();
        opts.extend(self.dialect.response_option(&self.inc_file(includes)?));

        if !(for_asm && self.dialect.asm_needs_config_macros()) {
            if let Some(header) = self.config_header()? {
                opts.extend(self.dialect.config_option(&header));
            }
        }
        Ok(opts)
    }

    fn compile(&self, cc: &[String], source: &Path, object: &Path, includes: &[String]) -> Result<Vec<Vec<String>>, BuildError> {
        let mut cmd = cc.to_vec();
        cmd.extend(self.compile_options(includes, false)?);
        cmd.extend(self.dialect.dependency_option(object));
        cmd.extend(self.dialect.compile_extra(object));
        cmd.extend([
            "-o".to_string(),
            object.to_string_lossy().to_string(),
            source.to_string_lossy().to_string(),
        ]);
        Ok(vec![cmd])
    }

    fn assemble(&self, source: &Path, object: &Path, includes: &[String]) -> Result<Vec<Vec<String>>, BuildError> {
        let opts = self.compile_options(includes, true)?;
        Ok(self.dialect.assemble(&self.tools, opts, source, object))
    }

    /// Dependency paths recorded for `object` by its last compile.
    pub fn recorded_dependencies(&self, object: &Path) -> Vec<PathBuf> {
        let Ok(content) = fs::read_to_string(dependency_path(object)) else {
            return Vec::new();
        };
        self.dialect
            .parse_dependencies(&content)
            .into_iter()
            .map(|dep| {
                if dep.is_relative() {
                    self.work_dir.join(dep)
                } else {
                    dep
                }
            })
            .collect()
    }

    /// Commands needed to bring `object` up to date, or `None` when the
    /// existing object can be reused.
    pub fn compile_command(
        &self,
        source: &Path,
        object: &Path,
        includes: &[String],
    ) -> Result<Option<Vec<Vec<String>>>, BuildError> {
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let commands = match ext.as_str() {
            "c" | "cpp" | "cc" | "cxx" => {
                let deps = self.recorded_dependencies(object);
                if !deps.is_empty() && !needs_rebuild(object, &deps, self.build_all) {
                    return Ok(None);
                }
                if ext == "c" {
                    self.compile(&self.tools.cc, source, object, includes)?
                } else {
                    self.compile(&self.tools.cppc, source, object, includes)?
                }
            }
            "s" => {
                if !needs_rebuild(object, &[source], self.build_all) {
                    return Ok(None);
                }
                self.assemble(source, object, includes)?
            }
            _ => return Ok(None),
        };

        ensure_output_dirs(&commands)?;
        Ok(Some(commands))
    }

    /// Compiles every stale source and returns all objects, reused ones
    /// included.
    pub fn compile_sources(
        &mut self,
        resources: &Resources,
        build_path: &Path,
        inc_dirs: &[PathBuf],
    ) -> Result<Vec<PathBuf>, BuildError> {
        let files = resources.sources();
        self.to_be_compiled = files.len();
        self.compiled = 0;

        let inc_paths: BTreeSet<String> = resources
            .inc_dirs
            .iter()
            .chain(inc_dirs)
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        let inc_paths: Vec<String> = inc_paths.into_iter().collect();
        self.inc_hash = format!("{:x}", Sha256::digest(inc_paths.join(" ").as_bytes()));

        self.build_dir = build_path.to_path_buf();
        fs::create_dir_all(&self.build_dir)?;

        let mut objects = Vec::new();
        let mut queue = Vec::new();
        for source in &files {
            let base = resources.base_of(source).unwrap_or(Path::new(""));
            let object = self.relative_object_path(build_path, base, source)?;

            match self.compile_command(source, &object, &inc_paths)? {
                Some(commands) => queue.push(BuildJob {
                    source: source.clone(),
                    object,
                    commands,
                    work_dir: self.work_dir.clone(),
                }),
                None => objects.push(object),
            }
        }

        let scheduler = self.scheduler;
        scheduler.execute(queue, |result| {
            let object = self.handle_result(result)?;
            objects.push(object);
            Ok(())
        })?;
        Ok(objects)
    }

    fn handle_result(&mut self, result: JobResult) -> Result<PathBuf, BuildError> {
        self.compiled += 1;
        let percent = 100.0 * self.compiled as f32 / self.to_be_compiled.max(1) as f32;
        self.reporter
            .progress("compile", &result.source, Some(percent));
        for outcome in &result.results {
            self.reporter
                .debug(format!("Command: {}", outcome.command.join(" ")));
            self.compile_output(outcome)?;
        }
        Ok(result.object)
    }

    /// Reports a finished command's diagnostics and classifies a failure.
    pub fn compile_output(&mut self, outcome: &CommandOutcome) -> Result<(), BuildError> {
        self.parse_output(&outcome.stderr);
        self.reporter.debug(format!("Return: {}", outcome.code));
        for line in outcome.stderr.lines() {
            self.reporter.debug(format!("Output: {}", line));
        }

        if outcome.success() {
            return Ok(());
        }
        for line in outcome.stderr.lines() {
            self.reporter.tool_error(line);
        }
        if outcome.stderr.contains(self.backend.spec().not_supported_marker) {
            Err(BuildError::NotSupported {
                output: outcome.stderr.clone(),
            })
        } else {
            Err(BuildError::tool(
                format!("{} failed with exit code {}", tool_name(&outcome.command), outcome.code),
                outcome.stderr.clone(),
            ))
        }
    }

    /// Emits a diagnostic event for every line matching the backend pattern.
    pub fn parse_output(&mut self, output: &str) {
        for line in output.lines() {
            let Some(caps) = self.diagnostic.captures(line) else {
                continue;
            };
            let Some(severity) = Severity::parse(&caps["severity"]) else {
                continue;
            };
            let diagnostic = Diagnostic {
                severity,
                file: PathBuf::from(&caps["file"]),
                line: caps["line"].parse().unwrap_or(0),
                message: caps["message"].trim().to_string(),
                target: self.target.name.clone(),
                toolchain: self.backend.name().to_string(),
            };
            self.reporter.emit(Event::Diagnostic(diagnostic));
        }
    }

    /// Runs a single tool outside the scheduler. Any failure is fatal.
    pub fn default_cmd(&mut self, command: &[String]) -> Result<(), BuildError> {
        self.reporter.debug(format!("Command: {}", command.join(" ")));
        let outcome = run_command(command, &self.work_dir, &AtomicBool::new(false));
        self.reporter.debug(format!("Return: {}", outcome.code));
        for line in outcome.stdout.lines() {
            self.reporter.debug(format!("Output: {}", line));
        }
        for line in outcome.stderr.lines() {
            self.reporter.debug(format!("Errors: {}", line));
        }

        if !outcome.success() {
            for line in outcome.stderr.lines() {
                self.reporter.tool_error(line);
            }
            return Err(BuildError::tool(
                format!("{} failed with exit code {}", tool_name(command), outcome.code),
                outcome.stderr,
            ));
        }
        Ok(())
    }

    /// Archives `objects` into `dir` under the backend's library name.
    /// Returns whether the archive was rebuilt.
    pub fn build_library(&mut self, objects: &[PathBuf], dir: &Path, name: &str) -> Result<bool, BuildError> {
        let lib = self.backend.library_file_name(name);
        let path = dir.join(&lib);
        if !needs_rebuild(&path, objects, self.build_all) {
            return Ok(false);
        }
        self.reporter.info(format!("Library: {}", lib));
        self.archive(objects, &path)?;
        Ok(true)
    }

    fn archive(&mut self, objects: &[PathBuf], library: &Path) -> Result<(), BuildError> {
        let dir = library.parent().unwrap_or(Path::new(""));
        fs::create_dir_all(dir)?;
        let response = dir.join(ARCHIVE_FILES);
        let args: Vec<String> = objects.iter().map(|o| o.to_string_lossy().to_string()).collect();
        fs::write(&response, response_body(&args))?;

        // Start from an empty archive so removed objects do not linger
        if library.exists() {
            fs::remove_file(library)?;
        }
        let cmd = self.dialect.archive(&self.tools, library, &response);
        self.default_cmd(&cmd)
    }

    /// Links `resources` into `<tmp_path>/<name>.elf` and extracts the
    /// binary image. Each step runs only when its output is stale.
    pub fn link_program(&mut self, resources: &Resources, tmp_path: &Path, name: &str) -> Result<LinkOutcome, BuildError> {
        let elf = tmp_path.join(format!("{}.elf", name));
        let bin = tmp_path.join(format!("{}.bin", name));
        let map = tmp_path.join(format!("{}.map", name));
        if let Some(parent) = elf.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut deps: Vec<&Path> = resources
            .objects
            .iter()
            .chain(&resources.libraries)
            .map(PathBuf::as_path)
            .collect();
        if let Some(script) = &resources.linker_script {
            deps.push(script);
        }

        let mut updated = false;
        if needs_rebuild(&elf, &deps, self.build_all) {
            updated = true;
            self.reporter.progress("link", Path::new(name), None);
            let inputs = LinkInputs {
                output: &elf,
                map_file: &map,
                objects: &resources.objects,
                libraries: &resources.libraries,
                lib_dirs: &resources.lib_dirs,
                linker_script: resources.linker_script.as_deref(),
            };
            self.link(&inputs)?;
        }

        if needs_rebuild(&bin, &[&elf], self.build_all) {
            updated = true;
            self.reporter.progress("elf2bin", Path::new(name), None);
            let cmd = self.dialect.binary(&self.tools, &elf, &bin);
            self.default_cmd(&cmd)?;
        }

        let memory_usage = self.memory_map.analyze(&map, self.backend);
        match &memory_usage {
            Some(usage) => self.reporter.info(usage.to_string()),
            None => self
                .reporter
                .debug(format!("No memory statistics for {}", self.backend)),
        }

        Ok(LinkOutcome {
            binary: bin,
            updated,
            memory_usage,
        })
    }

    fn link(&mut self, inputs: &LinkInputs<'_>) -> Result<(), BuildError> {
        let cmd = self.dialect.link(&self.tools, inputs);
        let Some((linker, args)) = cmd.split_first() else {
            return Err(BuildError::Configuration(format!("{} has no linker", self.backend)));
        };

        let dir = inputs.output.parent().unwrap_or(Path::new(""));
        let response = dir.join(LINK_FILES);
        fs::write(&response, response_body(args))?;

        let mut run = vec![linker.clone()];
        run.extend(self.dialect.response_option(&response));
        self.default_cmd(&run)
    }

    /// Copies files into `trg_path`, keeping their position relative to
    /// the scan root they were found under. Fresh copies are skipped.
    pub fn copy_files(&mut self, files: &[PathBuf], trg_path: &Path, resources: Option<&Resources>) -> Result<(), BuildError> {
        for source in files {
            let relative = match resources.and_then(|r| r.base_of(source)) {
                Some(base) => source.strip_prefix(base).unwrap_or(source).to_path_buf(),
                None => PathBuf::from(source.file_name().unwrap_or_default()),
            };
            let target = trg_path.join(&relative);

            if target != *source && needs_rebuild(&target, &[source], false) {
                self.reporter.progress("copy", &relative, None);
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source, &target)?;
            }
        }
        Ok(())
    }
}

fn tool_name(command: &[String]) -> String {
    command
        .first()
        .map(|c| {
            Path::new(c)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| c.clone())
        })
        .unwrap_or_default()
}

/// Creates the parent directory of every `-o` output.
fn ensure_output_dirs(commands: &[Vec<String>]) -> Result<(), BuildError> {
    for cmd in commands {
        let outputs = cmd.windows(2).filter(|w| w[0] == "-o").map(|w| Path::new(&w[1]));
        for output in outputs {
            if let Some(parent) = output.parent() {
                fs::create_dir_all(parent)?;
            }
        }
    }
    Ok(())
}
