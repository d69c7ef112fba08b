//! # xfirm - Embedded Firmware Build Orchestrator
//!
//! xfirm builds one firmware source tree for many MCUs and compilers without
//! makefiles. Directory names select what gets built: `TARGET_<label>`,
//! `TOOLCHAIN_<label>` and `FEATURE_<name>` subtrees are included only when
//! the active target, backend or configuration asks for them.
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the current directory for a K64F board with GNU Arm
//! xf build -m K64F -t GCC_ARM
//!
//! # See what a scan picks up
//! xf scan -m K64F -t GCC_ARM
//! ```
//!
//! ## Module Organization
//!
//! - [`resources`] - Source tree scanning and label filtering
//! - [`toolchain`] - Backends and the compile/link/archive steps
//! - [`build`] - Scheduling, staleness checks and the build drivers
//! - [`features`] - Feature activation and generated configuration
//! - [`commands`] - CLI command handlers

/// Build drivers, scheduler and staleness checks.
pub mod build;

/// CLI command handlers.
pub mod commands;

/// Project configuration (`xf.toml`).
pub mod config;

/// Error types of the build core.
pub mod error;

/// Feature activation and configuration data.
pub mod features;

/// Linker map analysis.
pub mod memap;

/// Build notifications.
pub mod notify;

/// Source tree scanning.
pub mod resources;

/// Target MCU descriptors.
pub mod target;

/// Compiler backends.
pub mod toolchain;

/// Terminal UI utilities (tables).
pub mod ui;
