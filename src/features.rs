//! Feature activation and configuration data.
//!
//! After scanning, the build hands the merged [`Resources`] to a
//! [`ConfigProvider`]. The provider reads the JSON fragments the scan found
//! and names the active features; [`load_resources`] merges the matching
//! feature subtrees and repeats until the set of active features stops
//! growing.

use crate::error::BuildError;
use crate::resources::Resources;
use crate::target::Target;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

pub const LIB_CONFIG_FILE: &str = "xf_lib.json";
pub const APP_CONFIG_FILE: &str = "xf_app.json";

const HEADER_GUARD: &str = "__XF_CONFIG_DATA__";

/// What the config layer contributes to compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigData {
    /// Definitions passed on every compile.
    pub macros: Vec<String>,
    /// Configuration values keyed by macro name.
    pub params: BTreeMap<String, String>,
}

impl ConfigData {
    /// Parameters as `NAME=value` definitions.
    pub fn param_macros(&self) -> Vec<String> {
        self.params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect()
    }

    /// Body of the generated config header, if there is anything to put
    /// in it.
    pub fn header(&self) -> Option<String> {
        if self.params.is_empty() {
            return None;
        }
        let mut out = String::new();
        out.push_str("// Automatically generated configuration file.\n");
        out.push_str("// DO NOT EDIT, content will be overwritten.\n\n");
        out.push_str(&format!("#ifndef {0}\n#define {0}\n\n", HEADER_GUARD));
        for (name, value) in &self.params {
            out.push_str(&format!("#define {} {}\n", name, value));
        }
        out.push_str(&format!("\n#endif // {}\n", HEADER_GUARD));
        Some(out)
    }
}

pub trait ConfigProvider {
    /// Reads configuration fragments found by a scan. Fragments already
    /// read are skipped.
    fn add_config_files(&mut self, files: &[PathBuf]) -> Result<(), BuildError>;

    /// Features that should be active given everything read so far.
    fn features(&self) -> BTreeSet<String>;

    fn config_data(&self) -> Result<ConfigData, BuildError>;
}

/// Merges feature subtrees until nothing more can be merged.
///
/// A feature may be requested before its subtree is known, for instance when
/// the subtree is nested in another feature; it is merged on the pass that
/// finds it. Returns the expanded resources and the requested features.
pub fn load_resources(
    provider: &mut dyn ConfigProvider,
    mut resources: Resources,
) -> Result<(Resources, BTreeSet<String>), BuildError> {
    let mut merged = BTreeSet::new();
    loop {
        provider.add_config_files(&resources.json_files)?;

        let ready: Vec<String> = provider
            .features()
            .into_iter()
            .filter(|f| !merged.contains(f) && resources.features.contains_key(f))
            .collect();
        if ready.is_empty() {
            break;
        }
        for feature in ready {
            if let Some(subtree) = resources.features.get(&feature).cloned() {
                tracing::debug!(feature = %feature, "activating feature");
                resources.add(subtree);
            }
            merged.insert(feature);
        }
    }
    Ok((resources, provider.features()))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ParamDecl {
    Detailed {
        value: Value,
        #[serde(default)]
        macro_name: Option<String>,
    },
    Plain(Value),
}

#[derive(Debug, Default, Deserialize)]
struct Fragment {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    features: Vec<String>,
    #[serde(default)]
    macros: Vec<String>,
    #[serde(default)]
    config: BTreeMap<String, ParamDecl>,
    /// Keyed by target label, or `*` for every target.
    #[serde(default)]
    target_overrides: BTreeMap<String, BTreeMap<String, Value>>,
}

const FEATURES_ADD: &str = "features_add";

#[derive(Debug)]
struct Param {
    value: Option<String>,
    macro_name: String,
}

/// Default provider reading `xf_lib.json` and `xf_app.json` fragments.
///
/// Library parameters are named `<lib>.<param>` and application parameters
/// `app.<param>`; each becomes `XF_CONF_<NAME>` unless it sets its own
/// `macro_name`. The application's `target_overrides` may override any
/// parameter by full name.
#[derive(Debug, Default)]
pub struct JsonConfig {
    target_labels: Vec<String>,
    target_features: Vec<String>,
    seen: BTreeSet<PathBuf>,
    libs: Vec<(String, Fragment)>,
    app: Option<Fragment>,
}

fn macro_for(full_name: &str) -> String {
    let name: String = full_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("XF_CONF_{}", name)
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl JsonConfig {
    pub fn new(target: &Target) -> Self {
        Self {
            target_labels: target.labels(),
            target_features: target.features.clone(),
            ..Default::default()
        }
    }

    fn read_fragment(path: &Path) -> Result<Fragment, BuildError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            BuildError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    fn matching_overrides<'a>(
        &'a self,
        fragment: &'a Fragment,
    ) -> impl Iterator<Item = &'a BTreeMap<String, Value>> + 'a {
        fragment
            .target_overrides
            .iter()
            .filter(|(label, _)| *label == "*" || self.target_labels.contains(label))
            .map(|(_, values)| values)
    }

    fn fragments(&self) -> impl Iterator<Item = &Fragment> {
        self.libs.iter().map(|(_, f)| f).chain(self.app.iter())
    }

    fn declare(params: &mut BTreeMap<String, Param>, prefix: &str, fragment: &Fragment) {
        for (name, decl) in &fragment.config {
            let full = format!("{}.{}", prefix, name);
            let (value, macro_name) = match decl {
                ParamDecl::Detailed { value, macro_name } => (value, macro_name.clone()),
                ParamDecl::Plain(value) => (value, None),
            };
            params.insert(
                full.clone(),
                Param {
                    value: render(value),
                    macro_name: macro_name.unwrap_or_else(|| macro_for(&full)),
                },
            );
        }
    }

    fn apply_overrides(
        &self,
        params: &mut BTreeMap<String, Param>,
        prefix: &str,
        fragment: &Fragment,
        origin: &str,
    ) -> Result<(), BuildError> {
        for overrides in self.matching_overrides(fragment) {
            for (name, value) in overrides {
                if name == FEATURES_ADD {
                    continue;
                }
                let full = if name.contains('.') {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                match params.get_mut(&full) {
                    Some(param) => param.value = render(value),
                    None => {
                        return Err(BuildError::Configuration(format!(
                            "{} overrides undefined parameter '{}'",
                            origin, full
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl ConfigProvider for JsonConfig {
    fn add_config_files(&mut self, files: &[PathBuf]) -> Result<(), BuildError> {
        for path in files {
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if file_name != LIB_CONFIG_FILE && file_name != APP_CONFIG_FILE {
                continue;
            }
            if !self.seen.insert(path.clone()) {
                continue;
            }

            let fragment = Self::read_fragment(path)?;
            tracing::debug!(path = %path.display(), "read config fragment");

            if file_name == LIB_CONFIG_FILE {
                let name = fragment.name.clone().ok_or_else(|| {
                    BuildError::Configuration(format!(
                        "library config {} has no name",
                        path.display()
                    ))
                })?;
                if self.libs.iter().any(|(n, _)| *n == name) {
                    return Err(BuildError::Configuration(format!(
                        "library '{}' is configured twice ({})",
                        name,
                        path.display()
                    )));
                }
                self.libs.push((name, fragment));
            } else {
                if self.app.is_some() {
                    return Err(BuildError::Configuration(format!(
                        "more than one {} found ({})",
                        APP_CONFIG_FILE,
                        path.display()
                    )));
                }
                self.app = Some(fragment);
            }
        }
        Ok(())
    }

    fn features(&self) -> BTreeSet<String> {
        let mut features: BTreeSet<String> = self.target_features.iter().cloned().collect();
        for fragment in self.fragments() {
            features.extend(fragment.features.iter().cloned());
            for overrides in self.matching_overrides(fragment) {
                if let Some(Value::Array(added)) = overrides.get(FEATURES_ADD) {
                    features.extend(added.iter().filter_map(|v| v.as_str().map(String::from)));
                }
            }
        }
        features
    }

    fn config_data(&self) -> Result<ConfigData, BuildError> {
        let mut params = BTreeMap::new();
        for (name, fragment) in &self.libs {
            Self::declare(&mut params, name, fragment);
        }
        if let Some(app) = &self.app {
            Self::declare(&mut params, "app", app);
        }

        for (name, fragment) in &self.libs {
            self.apply_overrides(&mut params, name, fragment, &format!("library '{}'", name))?;
        }
        if let Some(app) = &self.app {
            self.apply_overrides(&mut params, "app", app, "application")?;
        }

        let macros = self.fragments().flat_map(|f| f.macros.iter().cloned()).collect();
        let params = params
            .into_values()
            .filter_map(|p| p.value.map(|v| (p.macro_name, v)))
            .collect();
        Ok(ConfigData { macros, params })
    }
}
