//! # xfirm CLI Entry Point
//!
//! This is the main executable for the `xf` command-line tool.
//! It parses CLI arguments using clap and routes commands to the handlers in
//! [`xfirm::commands`].

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

use xfirm::build;
use xfirm::commands;
use xfirm::commands::build::BuildArgs;
use xfirm::config;
use xfirm::toolchain::Backend;

#[derive(Parser)]
#[command(name = "xf")]
#[command(about = "Cross-toolchain firmware builds without makefiles", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Show every tool command and its raw output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and link the project for one target and toolchain
    Build {
        /// Target MCU (e.g. K64F)
        #[arg(short = 'm', long = "mcu")]
        target: Option<String>,
        /// Toolchain (GCC_ARM, GCC_CR, ARM, uARM, IAR)
        #[arg(short = 't', long)]
        toolchain: Option<String>,
        /// Source directory; may be repeated
        #[arg(long = "source")]
        sources: Vec<PathBuf>,
        /// Build directory root
        #[arg(long = "build")]
        build_dir: Option<PathBuf>,
        /// Parallel compile jobs (0 = one per CPU)
        #[arg(short, long)]
        jobs: Option<usize>,
        /// Remove previous outputs and rebuild everything
        #[arg(short, long)]
        clean: bool,
        /// Optimized build without debug info
        #[arg(long, conflicts_with = "debug")]
        release: bool,
        /// Debug info, no optimization
        #[arg(long)]
        debug: bool,
        /// Build a static library instead of a program
        #[arg(long)]
        library: bool,
        /// Output name (defaults to the first source directory's name)
        #[arg(short = 'n', long)]
        name: Option<String>,
        /// Extra preprocessor definition; may be repeated
        #[arg(short = 'D', long = "macro")]
        macros: Vec<String>,
        /// Linker script overriding the one found by the scan
        #[arg(long)]
        linker_script: Option<PathBuf>,
        /// Build option: save-asm, small-build, big-build
        #[arg(short = 'o', long = "option")]
        options: Vec<String>,
    },
    /// Print the resources a build would use
    Scan {
        #[arg(short = 'm', long = "mcu")]
        target: Option<String>,
        #[arg(short = 't', long)]
        toolchain: Option<String>,
        /// Directory to scan
        #[arg(default_value = ".")]
        path: PathBuf,
    },
    /// List known targets and their toolchains
    Targets,
    /// Remove build outputs
    Clean {
        /// Only this target's outputs (requires --toolchain)
        #[arg(short = 'm', long = "mcu", requires = "toolchain")]
        target: Option<String>,
        #[arg(short = 't', long)]
        toolchain: Option<String>,
        /// Build directory root
        #[arg(long = "build")]
        build_dir: Option<PathBuf>,
    },
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            target,
            toolchain,
            sources,
            build_dir,
            jobs,
            clean,
            release,
            debug,
            library,
            name,
            macros,
            linker_script,
            options,
        } => {
            let args = BuildArgs {
                target,
                toolchain,
                sources,
                build_dir,
                jobs,
                clean,
                release,
                debug,
                library,
                name,
                macros,
                linker_script,
                options,
            };
            commands::build::handle_build(&args, cli.verbose)
        }

        Commands::Scan {
            target,
            toolchain,
            path,
        } => commands::scan::handle_scan(
            target.as_deref(),
            toolchain.as_deref(),
            &path,
            cli.verbose,
        ),

        Commands::Targets => commands::target::handle_targets(),

        Commands::Clean {
            target,
            toolchain,
            build_dir,
        } => {
            let cwd = std::env::current_dir()?;
            let config = config::load_config(&cwd)?;
            let root = build_dir.unwrap_or_else(|| config.build_dir());
            let dir = match (target, toolchain) {
                (Some(target), Some(toolchain)) => {
                    let backend = Backend::from_name(&toolchain)?;
                    build::build_dir_for(&root, &target, backend.name())
                }
                _ => root,
            };
            build::clean(&dir).map(|_| ())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    fmt().with_max_level(max_level).with_target(false).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}
