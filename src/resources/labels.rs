use crate::target::Target;
use crate::toolchain::{Backend, BuildOptions};
use std::collections::BTreeSet;

/// Directory names that were target or toolchain specific before the
/// `TARGET_`/`TOOLCHAIN_` prefixes existed.
pub const LEGACY_IGNORE_DIRS: &[&str] = &[
    "LPC11U24", "LPC1768", "LPC2368", "LPC4088", "LPC812", "KL25Z", "ARM", "GCC_ARM", "GCC_CR",
    "IAR", "uARM",
];

/// The labels a scan is filtered with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    /// The MCU, its core family and its ancestor families.
    pub targets: Vec<String>,
    /// The backend and its ancestor classes.
    pub toolchains: Vec<String>,
    pub features: Vec<String>,
    /// `DEBUG` or `RELEASE`.
    pub profile: String,
    /// Names from [`LEGACY_IGNORE_DIRS`] that stay visible for this build.
    legacy_visible: Vec<String>,
}

impl LabelSet {
    pub fn for_build(target: &Target, backend: Backend, options: &BuildOptions) -> Self {
        Self {
            targets: target.labels(),
            toolchains: backend.labels().iter().map(|l| l.to_string()).collect(),
            features: target.features.clone(),
            profile: if options.debug_info { "DEBUG" } else { "RELEASE" }.to_string(),
            legacy_visible: vec![
                target.name.clone(),
                backend.spec().legacy_name.to_string(),
            ],
        }
    }

    /// `TARGET_<name>` directories match target labels and the profile label.
    pub fn has_target(&self, name: &str) -> bool {
        self.profile == name || self.targets.iter().any(|l| l == name)
    }

    pub fn has_toolchain(&self, name: &str) -> bool {
        self.toolchains.iter().any(|l| l == name)
    }

    /// Legacy directory names still hidden for this build.
    pub fn legacy_ignore_dirs(&self) -> BTreeSet<String> {
        LEGACY_IGNORE_DIRS
            .iter()
            .filter(|d| !self.legacy_visible.iter().any(|v| v == *d))
            .map(|d| d.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::TargetDb;

    #[test]
    fn test_labels_for_gcc_build() {
        let db = TargetDb::builtin();
        let target = db.get("LPC1768").unwrap();
        let labels = LabelSet::for_build(target, Backend::GccArm, &BuildOptions::default());

        assert!(labels.has_target("LPC1768"));
        assert!(labels.has_target("NXP"));
        assert!(labels.has_target("RELEASE"));
        assert!(!labels.has_target("DEBUG"));
        assert!(labels.has_toolchain("GCC"));
        assert!(labels.has_toolchain("GCC_ARM"));
        assert!(!labels.has_toolchain("ARM"));
    }

    #[test]
    fn test_active_target_and_backend_stay_visible() {
        let db = TargetDb::builtin();
        let target = db.get("LPC1768").unwrap();
        let labels = LabelSet::for_build(target, Backend::ArmMicro, &BuildOptions::default());
        let hidden = labels.legacy_ignore_dirs();

        assert!(!hidden.contains("LPC1768"));
        assert!(!hidden.contains("uARM"));
        assert!(hidden.contains("ARM"));
        assert!(hidden.contains("GCC_ARM"));
        assert!(hidden.contains("KL25Z"));
    }
}
