//! `xf build`

use anyhow::{Result, anyhow};
use colored::*;
use std::path::PathBuf;

use crate::build::scheduler::DEFAULT_TIMEOUT;
use crate::build::{
    BuildReport, BuildRequest, BuildStatus, FeedbackAnalyzer, Scheduler, build_dir_for,
    build_library, build_project,
};
use crate::config::{XfConfig, load_config};
use crate::error::BuildError;
use crate::notify::{ConsoleNotifier, Reporter};
use crate::toolchain::{Backend, BuildOptions};

/// Flags accepted by `xf build`.
#[derive(Debug, Clone, Default)]
pub struct BuildArgs {
    pub target: Option<String>,
    pub toolchain: Option<String>,
    pub sources: Vec<PathBuf>,
    pub build_dir: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub clean: bool,
    pub release: bool,
    pub debug: bool,
    pub library: bool,
    pub name: Option<String>,
    pub macros: Vec<String>,
    pub linker_script: Option<PathBuf>,
    pub options: Vec<String>,
}

/// Merges flags over `xf.toml` into a driver request.
pub fn request_from(args: &BuildArgs, config: &XfConfig) -> Result<BuildRequest> {
    let (target, toolchain) =
        super::resolve_names(config, args.target.as_deref(), args.toolchain.as_deref())?;
    let backend = Backend::from_name(&toolchain)?;

    let src_paths = if !args.sources.is_empty() {
        args.sources.clone()
    } else if !config.project.sources.is_empty() {
        config.project.sources.clone()
    } else {
        vec![PathBuf::from(".")]
    };
    let root = args.build_dir.clone().unwrap_or_else(|| config.build_dir());

    let mut options: BuildOptions = config.build.build_options();
    let extra = BuildOptions::from_names(&args.options);
    options.save_asm |= extra.save_asm;
    options.small_build |= extra.small_build;
    options.big_build |= extra.big_build;
    if args.debug {
        options.debug_info = true;
    }
    if args.release {
        options.debug_info = false;
    }

    // Outputs of every target live under the build root
    let mut exclude_paths = config.build.exclude.clone();
    exclude_paths.push(root.clone());

    let mut macros = config.build.macros.clone();
    macros.extend(args.macros.iter().cloned());

    Ok(BuildRequest {
        src_paths,
        build_path: build_dir_for(&root, &target, backend.name()),
        target,
        toolchain,
        options,
        name: args.name.clone().or_else(|| config.project.name.clone()),
        macros,
        libraries_paths: config.build.libraries.clone(),
        dependencies_paths: Vec::new(),
        linker_script: args
            .linker_script
            .clone()
            .or_else(|| config.build.linker_script.clone()),
        inc_dirs: config.build.inc_dirs.clone(),
        exclude_paths,
        clean: args.clean,
        scheduler: Scheduler::new(
            args.jobs.or(config.build.jobs),
            config.build.timeout().unwrap_or(DEFAULT_TIMEOUT),
        ),
        tool_path: config.tool_path(backend),
    })
}

pub fn handle_build(args: &BuildArgs, verbose: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd)?;
    let targets = super::load_targets(&cwd)?;
    let request = request_from(args, &config)?;

    let reporter = Reporter::new(Box::new(ConsoleNotifier::new(verbose)));
    let result = if args.library {
        build_library(&request, &targets, reporter)
    } else {
        build_project(&request, &targets, reporter)
    };

    match result {
        Ok(report) => {
            print_success(&report);
            Ok(())
        }
        Err(failure) if failure.report.status == BuildStatus::NotSupported => {
            println!(
                "{} {} ({})",
                "!".yellow(),
                failure.report.to_string().yellow(),
                failure.error
            );
            Ok(())
        }
        Err(failure) => {
            println!("{} {}", "x".red(), failure.report.to_string().red());
            let output = match &failure.error {
                BuildError::Tool { output, .. } => output.as_str(),
                _ => failure.report.output.as_str(),
            };
            if let Some(hint) = FeedbackAnalyzer::analyze(output) {
                println!("\n{} {}", "💡".yellow(), hint);
            }
            Err(anyhow!(failure.error))
        }
    }
}

fn print_success(report: &BuildReport) {
    println!("{} {}", "✓".green(), report.to_string().green());
    if let Some(usage) = &report.memory_usage {
        println!("   {}", usage.to_string().dimmed());
    }
    if let Some(artifact) = &report.artifact {
        let state = if report.updated { "" } else { " (up to date)" };
        println!("   {} {}{}", "Image:".cyan(), artifact.display(), state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_request_merges_flags_over_config() {
        let config = parse_config(
            r#"
[project]
target = "K64F"
toolchain = "GCC_ARM"
sources = ["app"]

[build]
jobs = 2
macros = ["FROM_FILE=1"]
profile = "debug"
"#,
        )
        .unwrap();
        let args = BuildArgs {
            toolchain: Some("uARM".to_string()),
            jobs: Some(8),
            release: true,
            macros: vec!["FROM_FLAG=1".to_string()],
            options: vec!["small-build".to_string()],
            ..Default::default()
        };

        let request = request_from(&args, &config).unwrap();
        assert_eq!(request.target, "K64F");
        assert_eq!(request.toolchain, "uARM");
        assert_eq!(request.src_paths, vec![PathBuf::from("app")]);
        assert_eq!(request.build_path, PathBuf::from("BUILD/K64F/uARM"));
        assert_eq!(request.scheduler.jobs, Some(8));
        assert!(!request.options.debug_info);
        assert!(request.options.small_build);
        assert_eq!(request.macros, vec!["FROM_FILE=1", "FROM_FLAG=1"]);
        assert_eq!(request.exclude_paths, vec![PathBuf::from("BUILD")]);
    }

    #[test]
    fn test_unknown_toolchain_rejected() {
        let args = BuildArgs {
            target: Some("K64F".to_string()),
            toolchain: Some("MSVC".to_string()),
            ..Default::default()
        };
        let err = request_from(&args, &XfConfig::default()).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
