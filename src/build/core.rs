use super::report::{BuildReport, BuildStatus};
use super::scheduler::Scheduler;
use crate::error::{BuildError, BuildFailure};
use crate::features::{ConfigProvider, JsonConfig, load_resources};
use crate::notify::Reporter;
use crate::resources::Resources;
use crate::target::TargetDb;
use crate::toolchain::{Backend, BuildOptions, Toolchain};
use indexmap::IndexSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Directory library builds compile into before archiving.
pub const LIBRARY_TEMP_DIR: &str = ".temp";

/// Everything one project or library build needs.
#[derive(Debug, Clone, Default)]
pub struct BuildRequest {
    /// Scan roots. The first one names the project.
    pub src_paths: Vec<PathBuf>,
    pub build_path: PathBuf,
    pub target: String,
    pub toolchain: String,
    pub options: BuildOptions,
    /// Output name; defaults to the first source directory's name.
    pub name: Option<String>,
    pub macros: Vec<String>,
    /// Extra roots scanned into the same resource set.
    pub libraries_paths: Vec<PathBuf>,
    /// Roots whose include directories are added but nothing else.
    pub dependencies_paths: Vec<PathBuf>,
    pub linker_script: Option<PathBuf>,
    pub inc_dirs: Vec<PathBuf>,
    pub exclude_paths: Vec<PathBuf>,
    /// Remove the build directory first and rebuild everything.
    pub clean: bool,
    pub scheduler: Scheduler,
    /// Directory holding the backend's tools; empty means `PATH`.
    pub tool_path: PathBuf,
}

impl BuildRequest {
    /// Source roots with later duplicates of any entry removed.
    fn unique_src_paths(&self) -> Vec<PathBuf> {
        let unique: IndexSet<&PathBuf> = self.src_paths.iter().collect();
        unique.into_iter().cloned().collect()
    }

    /// Scan exclusions. The build directory is always one of them, so
    /// outputs under a source root are never scanned back in.
    fn excludes(&self) -> Vec<PathBuf> {
        let mut excludes = self.exclude_paths.clone();
        if !self.build_path.as_os_str().is_empty() {
            excludes.push(self.build_path.clone());
        }
        excludes
    }

    fn project_name(&self) -> String {
        let first = self
            .src_paths
            .first()
            .map(PathBuf::as_path)
            .unwrap_or(Path::new("."));
        let absolute = fs::canonicalize(first).unwrap_or_else(|_| first.to_path_buf());
        absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }
}

/// What a finished driver hands back before it becomes a report.
struct Built {
    artifact: PathBuf,
    updated: bool,
    memory_usage: Option<crate::memap::MemoryUsage>,
}

fn prepare(
    request: &BuildRequest,
    targets: &TargetDb,
    reporter: Reporter,
) -> Result<Toolchain, BuildError> {
    let target = targets.get(&request.target)?.clone();
    let backend = Backend::from_name(&request.toolchain)?;
    if !target.supports(backend) {
        tracing::warn!(
            mcu = %target.name,
            toolchain = backend.name(),
            "toolchain is not listed as supported for this target"
        );
    }

    for path in &request.src_paths {
        if !path.exists() {
            return Err(BuildError::Configuration(format!(
                "The source folder does not exist: {}",
                path.display()
            )));
        }
    }

    let mut toolchain = Toolchain::new(
        target,
        backend,
        request.options.clone(),
        request.macros.clone(),
        &request.tool_path,
        reporter,
    )?;
    toolchain.build_all = request.clean;
    toolchain.scheduler = request.scheduler;
    Ok(toolchain)
}

fn scan_all(toolchain: &mut Toolchain, roots: &[PathBuf], exclude: &[PathBuf]) -> Resources {
    let mut resources = Resources::default();
    for root in roots {
        let scanned = toolchain.scan_resources(root, exclude);
        if resources.base_path.is_none() {
            resources = scanned;
        } else {
            resources.add(scanned);
        }
    }
    resources
}

/// Runs the config layer over `resources` and hands its results to the
/// toolchain.
fn apply_config(toolchain: &mut Toolchain, resources: Resources) -> Result<Resources, BuildError> {
    let mut config = JsonConfig::new(toolchain.target());
    let (resources, features) = load_resources(&mut config, resources)?;

    let own = toolchain.target().features.clone();
    let extra: Vec<String> = features
        .iter()
        .filter(|f| !own.contains(f))
        .map(|f| format!("FEATURE_{}=1", f))
        .collect();
    if !extra.is_empty() {
        toolchain.add_macros(extra);
    }

    toolchain.set_config_data(config.config_data()?);
    Ok(resources)
}

fn finish(
    mut report: BuildReport,
    start: Instant,
    toolchain: Option<&Toolchain>,
    result: Result<Built, BuildError>,
) -> Result<BuildReport, BuildFailure> {
    report.elapsed = start.elapsed();
    if let Some(toolchain) = toolchain {
        report.output.push_str(toolchain.output());
    }
    match result {
        Ok(built) => {
            report.artifact = Some(built.artifact);
            report.updated = built.updated;
            report.memory_usage = built.memory_usage;
            Ok(report)
        }
        Err(error) => {
            report.status = if error.is_not_supported() {
                BuildStatus::NotSupported
            } else {
                BuildStatus::Fail
            };
            if toolchain.is_none() {
                report.output.push_str(&format!("{}\n", error));
            }
            Err(BuildFailure {
                error,
                report: Box::new(report),
            })
        }
    }
}

/// Scans, compiles and links a program.
///
/// Returns the report of a successful build. A failure carries the same
/// report with everything printed up to the failing step.
pub fn build_project(
    request: &BuildRequest,
    targets: &TargetDb,
    reporter: Reporter,
) -> Result<BuildReport, BuildFailure> {
    let start = Instant::now();
    let project = request.project_name();
    let name = request.name.clone().unwrap_or_else(|| project.clone());
    let report = BuildReport::new(&name, &request.target, &request.toolchain);

    let mut toolchain = match prepare(request, targets, reporter) {
        Ok(t) => t,
        Err(e) => return finish(report, start, None, Err(e)),
    };

    if name == project {
        toolchain.reporter().info(format!(
            "Building project {} ({}, {})",
            project, request.target, request.toolchain
        ));
    } else {
        toolchain.reporter().info(format!(
            "Building project {} to {} ({}, {})",
            project, name, request.target, request.toolchain
        ));
    }

    let result = link_project(&mut toolchain, request, &name);
    finish(report, start, Some(&toolchain), result)
}

fn link_project(toolchain: &mut Toolchain, request: &BuildRequest, name: &str) -> Result<Built, BuildError> {
    let mut roots = request.unique_src_paths();
    roots.extend(request.libraries_paths.iter().cloned());
    let mut resources = scan_all(toolchain, &roots, &request.excludes());

    if let Some(script) = &request.linker_script {
        resources.linker_script = Some(script.clone());
    }

    if request.clean && request.build_path.exists() {
        fs::remove_dir_all(&request.build_path)?;
    }
    fs::create_dir_all(&request.build_path)?;

    resources.add_include_dirs(request.inc_dirs.iter().cloned());
    let mut resources = apply_config(toolchain, resources)?;

    let inc_dirs: Vec<PathBuf> = resources.inc_dirs.iter().cloned().collect();
    let objects = toolchain.compile_sources(&resources, &request.build_path, &inc_dirs)?;
    let compiled = toolchain.compiled();
    resources.add_objects(objects);

    let linked = toolchain.link_program(&resources, &request.build_path, name)?;
    Ok(Built {
        artifact: linked.binary,
        updated: compiled > 0 || linked.updated,
        memory_usage: linked.memory_usage,
    })
}

/// Scans and compiles a static library.
///
/// Headers, prebuilt objects and libraries, the linker script and hex images
/// are copied into the build directory next to the archive.
pub fn build_library(
    request: &BuildRequest,
    targets: &TargetDb,
    reporter: Reporter,
) -> Result<BuildReport, BuildFailure> {
    let start = Instant::now();
    let name = request.name.clone().unwrap_or_else(|| request.project_name());
    let report = BuildReport::new(&name, &request.target, &request.toolchain);

    let mut toolchain = match prepare(request, targets, reporter) {
        Ok(t) => t,
        Err(e) => return finish(report, start, None, Err(e)),
    };
    toolchain.reporter().info(format!(
        "Building library {} ({}, {})",
        name, request.target, request.toolchain
    ));

    let result = archive_library(&mut toolchain, request, &name);
    finish(report, start, Some(&toolchain), result)
}

fn archive_library(toolchain: &mut Toolchain, request: &BuildRequest, name: &str) -> Result<Built, BuildError> {
    let excludes = request.excludes();
    let mut resources = scan_all(toolchain, &request.unique_src_paths(), &excludes);
    resources.add_include_dirs(request.inc_dirs.iter().cloned());

    for path in &request.libraries_paths {
        let extra = toolchain.scan_resources(path, &excludes);
        resources.add(extra);
    }
    for path in &request.dependencies_paths {
        let dependency = toolchain.scan_resources(path, &excludes);
        resources.add_include_dirs(dependency.inc_dirs);
    }

    if request.clean && request.build_path.exists() {
        fs::remove_dir_all(&request.build_path)?;
    }
    let tmp_path = request.build_path.join(LIBRARY_TEMP_DIR);
    fs::create_dir_all(&tmp_path)?;
    let tmp_path = fs::canonicalize(&tmp_path)?;

    let mut resources = apply_config(toolchain, resources)?;

    let build_path = &request.build_path;
    toolchain.copy_files(&resources.headers, build_path, Some(&resources))?;
    toolchain.copy_files(&resources.objects, build_path, Some(&resources))?;
    toolchain.copy_files(&resources.libraries, build_path, Some(&resources))?;
    if let Some(script) = resources.linker_script.clone() {
        toolchain.copy_files(&[script], build_path, Some(&resources))?;
    }
    if !resources.hex_files.is_empty() {
        toolchain.copy_files(&resources.hex_files, build_path, Some(&resources))?;
    }

    let inc_dirs: Vec<PathBuf> = resources.inc_dirs.iter().cloned().collect();
    let objects = toolchain.compile_sources(&resources, &tmp_path, &inc_dirs)?;
    let compiled = toolchain.compiled();
    resources.add_objects(objects.iter().cloned());

    let archived = toolchain.build_library(&objects, build_path, name)?;
    let artifact = build_path.join(toolchain.backend().library_file_name(name));
    Ok(Built {
        artifact,
        updated: compiled > 0 || archived,
        memory_usage: None,
    })
}
