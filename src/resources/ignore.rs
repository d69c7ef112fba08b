use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::Path;

/// Per-directory ignore file. Each line is a glob anchored at the directory
/// holding the file; `#` starts a comment line.
pub const IGNORE_FILE: &str = ".xfignore";

// `*` crosses directory separators, so `dir/*` also hides everything below.
const MATCH: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Ignore patterns collected during one traversal. Patterns only ever get
/// added; a pattern can only match paths under the directory declaring it.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `dir/.xfignore` if present. Returns whether a file was loaded.
    pub fn load_dir(&mut self, dir: &Path) -> bool {
        let path = dir.join(IGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                self.extend(dir, &content);
                true
            }
            Err(e) => {
                if path.exists() {
                    tracing::warn!(path = %path.display(), "cannot read ignore file: {}", e);
                }
                false
            }
        }
    }

    pub fn extend(&mut self, dir: &Path, content: &str) {
        let anchor = Pattern::escape(&normalize(dir));
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let glob = format!("{}/{}", anchor, line.trim_start_matches('/'));
            match Pattern::new(&glob) {
                Ok(p) => self.patterns.push(p),
                Err(e) => tracing::warn!(pattern = line, "invalid ignore pattern: {}", e),
            }
        }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.patterns.iter().any(|p| p.matches_with(&path, MATCH))
    }

    /// Directories are tried with and without a trailing separator, so a
    /// bare `*` in an ignore file hides the declaring directory itself.
    pub fn is_dir_ignored(&self, dir: &Path) -> bool {
        let path = normalize(dir);
        let slashed = format!("{}/", path);
        self.patterns
            .iter()
            .any(|p| p.matches_with(&path, MATCH) || p.matches_with(&slashed, MATCH))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn normalize(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "/")
        .trim_end_matches('/')
        .to_string()
}
