//! `xf scan`

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::config::load_config;
use crate::notify::{ConsoleNotifier, Reporter};
use crate::toolchain::{Backend, Toolchain};

/// Prints what a build for `target`/`toolchain` would see under `path`.
pub fn handle_scan(
    target: Option<&str>,
    toolchain: Option<&str>,
    path: &Path,
    verbose: bool,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let config = load_config(&cwd)?;
    let targets = super::load_targets(&cwd)?;
    let (target_name, toolchain_name) = super::resolve_names(&config, target, toolchain)?;

    let target = targets.get(&target_name)?.clone();
    let backend = Backend::from_name(&toolchain_name)?;
    let mut toolchain = Toolchain::new(
        target,
        backend,
        config.build.build_options(),
        Vec::new(),
        &config.tool_path(backend),
        Reporter::new(Box::new(ConsoleNotifier::new(verbose))),
    )?;

    let mut exclude = config.build.exclude.clone();
    exclude.push(config.build_dir());
    let resources = toolchain.scan_resources(path, &exclude);
    println!(
        "{} {} ({}, {})",
        "🔍".cyan(),
        path.display().to_string().bold(),
        target_name,
        backend
    );
    println!("{}", resources);
    Ok(())
}
