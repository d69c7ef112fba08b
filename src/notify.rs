//! Build notifications.
//!
//! Everything the build wants to tell the user goes through a [`Reporter`]:
//! it renders the event into the accumulated build output and hands it to a
//! [`Notifier`]. Compiler diagnostics arrive here already parsed.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "warning" => Some(Severity::Warning),
            "error" | "fatal error" => Some(Severity::Error),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// One compiler message matched by a backend's diagnostic pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: PathBuf,
    pub line: u32,
    pub message: String,
    pub target: String,
    pub toolchain: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Info(String),
    Debug(String),
    Diagnostic(Diagnostic),
    Progress {
        action: String,
        file: PathBuf,
        percent: Option<f32>,
    },
    ToolError(String),
}

impl Event {
    /// The line this event contributes to the accumulated build output.
    pub fn render(&self) -> Option<String> {
        match self {
            Event::Info(msg) | Event::ToolError(msg) => Some(msg.clone()),
            Event::Debug(_) => None,
            Event::Diagnostic(d) => Some(format!(
                "[{}] {}@{}: {}",
                d.severity,
                file_name(&d.file),
                d.line,
                d.message
            )),
            Event::Progress { action, file, .. } => {
                Some(format!("{}: {}", title_case(action), file_name(file)))
            }
        }
    }
}

pub trait Notifier {
    fn notify(&self, event: &Event);
}

/// Discards everything. Used for silent scans.
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: &Event) {}
}

/// Colored terminal output with a progress bar for the compile phase.
pub struct ConsoleNotifier {
    verbose: bool,
    bar: ProgressBar,
}

impl ConsoleNotifier {
    pub fn new(verbose: bool) -> Self {
        let bar = ProgressBar::new(100);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Self { verbose, bar }
    }

    fn print(&self, line: String) {
        self.bar.suspend(|| println!("{}", line));
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, event: &Event) {
        match event {
            Event::Info(msg) => self.print(format!("{} {}", "→".dimmed(), msg)),
            Event::Debug(msg) => {
                if self.verbose {
                    self.print(format!("  {}", msg.dimmed()));
                }
            }
            Event::Diagnostic(d) => {
                let tag = match d.severity {
                    Severity::Warning => format!("[{}]", d.severity).yellow(),
                    Severity::Error => format!("[{}]", d.severity).red(),
                };
                if self.verbose {
                    self.print(format!(
                        "{} {}::{}::{}@{}: {}",
                        tag,
                        d.target.to_uppercase(),
                        d.toolchain.to_uppercase(),
                        file_name(&d.file),
                        d.line,
                        d.message
                    ));
                } else {
                    self.print(format!(
                        "{} {}@{}: {}",
                        tag,
                        file_name(&d.file).bold(),
                        d.line,
                        d.message
                    ));
                }
            }
            Event::Progress {
                action,
                file,
                percent: Some(percent),
            } => {
                self.bar.set_position(percent.clamp(0.0, 100.0) as u64);
                self.bar
                    .set_message(format!("{} {}", title_case(action), file_name(file)));
                if *percent >= 100.0 {
                    self.bar.finish_and_clear();
                }
            }
            Event::Progress { action, file, .. } => {
                self.print(format!(
                    "   {} {}",
                    format!("{}:", title_case(action)).cyan(),
                    file_name(file)
                ));
            }
            Event::ToolError(msg) => {
                if !self.verbose {
                    self.print(format!("{} {}", "x".red(), msg));
                }
            }
        }
    }
}

/// Owns the notifier and the text of everything reported so far.
pub struct Reporter {
    notifier: Box<dyn Notifier>,
    output: String,
}

impl Reporter {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self {
            notifier,
            output: String::new(),
        }
    }

    pub fn silent() -> Self {
        Self::new(Box::new(NullNotifier))
    }

    pub fn emit(&mut self, event: Event) {
        if let Event::Debug(msg) = &event {
            tracing::debug!("{}", msg);
        }
        if let Some(line) = event.render() {
            self.output.push_str(&line);
            self.output.push('\n');
        }
        self.notifier.notify(&event);
    }

    pub fn info(&mut self, msg: impl Into<String>) {
        self.emit(Event::Info(msg.into()));
    }

    pub fn debug(&mut self, msg: impl Into<String>) {
        self.emit(Event::Debug(msg.into()));
    }

    pub fn tool_error(&mut self, msg: impl Into<String>) {
        self.emit(Event::ToolError(msg.into()));
    }

    pub fn progress(&mut self, action: &str, file: &Path, percent: Option<f32>) {
        self.emit(Event::Progress {
            action: action.to_string(),
            file: file.to_path_buf(),
            percent,
        });
    }

    pub fn output(&self) -> &str {
        &self.output
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
