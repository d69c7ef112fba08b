//! Target MCU descriptors.
//!
//! The build core only reads these fields. A small database of common boards
//! is built in; a project may add or override entries with a `targets.json`
//! file of the same shape.

use crate::error::BuildError;
use crate::toolchain::Backend;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const BUILTIN_TARGETS: &str = r#"{
    "K64F": {
        "core": "Cortex-M4F",
        "fpu": "single",
        "extra_labels": ["Freescale", "KSDK2_MCUS", "FRDM", "KPSDK_MCUS", "KPSDK_CODE", "MCU_K64F"],
        "supported_toolchains": ["ARM_STD", "ARM_MICRO", "GCC_ARM", "IAR"],
        "macros": ["CPU_MK64FN1M0VMD12", "FSL_RTOS_MBED"],
        "device_has": ["ANALOGIN", "ANALOGOUT", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI", "STORAGE"],
        "features": ["IPV4", "STORAGE"],
        "default_build": "standard",
        "supported_form_factors": ["ARDUINO"]
    },
    "NUCLEO_F401RE": {
        "core": "Cortex-M4F",
        "fpu": "single",
        "extra_labels": ["STM", "STM32F4", "STM32F401xE", "STM32F401RE"],
        "supported_toolchains": ["ARM_STD", "ARM_MICRO", "GCC_ARM", "IAR"],
        "macros": ["TRANSACTION_QUEUE_SIZE_SPI=2"],
        "device_has": ["ANALOGIN", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI", "STDIO_MESSAGES"],
        "default_build": "small",
        "supported_form_factors": ["ARDUINO", "MORPHO"]
    },
    "NUCLEO_F427VI": {
        "core": "Cortex-M4F",
        "fpu": "single",
        "extra_labels": ["STM", "STM32F4", "STM32F427xI"],
        "supported_toolchains": ["ARM_STD", "GCC_ARM", "IAR"],
        "device_has": ["ANALOGIN", "ANALOGOUT", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI"],
        "default_build": "standard"
    },
    "DISCO_F746NG": {
        "core": "Cortex-M7F",
        "fpu": "single",
        "extra_labels": ["STM", "STM32F7", "STM32F746", "STM32F746NG"],
        "supported_toolchains": ["ARM_STD", "GCC_ARM", "IAR"],
        "device_has": ["ANALOGIN", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI"],
        "features": ["LWIP"],
        "default_build": "standard"
    },
    "LPC1768": {
        "core": "Cortex-M3",
        "extra_labels": ["NXP", "LPC176X", "MBED_LPC1768"],
        "supported_toolchains": ["ARM_STD", "ARM_MICRO", "GCC_ARM", "GCC_CR", "IAR"],
        "device_has": ["ANALOGIN", "ANALOGOUT", "CAN", "ETHERNET", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI"],
        "default_build": "standard"
    },
    "NRF52_DK": {
        "core": "Cortex-M4F",
        "fpu": "single",
        "extra_labels": ["NORDIC", "NRF5", "MCU_NRF52", "MCU_NRF52832"],
        "supported_toolchains": ["ARM_STD", "GCC_ARM", "IAR"],
        "macros": ["NRF52", "S132"],
        "device_has": ["ANALOGIN", "I2C", "INTERRUPTIN", "PWMOUT", "SERIAL", "SPI"],
        "features": ["BLE"],
        "default_build": "small",
        "supported_form_factors": ["ARDUINO"]
    }
}"#;

#[derive(Deserialize, Debug, Clone, Default)]
pub struct Target {
    #[serde(skip)]
    pub name: String,
    pub core: String,
    #[serde(default)]
    pub fpu: Option<String>,
    #[serde(default)]
    pub extra_labels: Vec<String>,
    #[serde(default)]
    pub supported_toolchains: Vec<String>,
    #[serde(default)]
    pub macros: Vec<String>,
    #[serde(default)]
    pub device_has: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_build")]
    pub default_build: String,
    #[serde(default)]
    pub supported_form_factors: Vec<String>,
}

fn default_build() -> String {
    "standard".to_string()
}

/// Labels every Cortex core contributes on top of the target's own.
fn core_labels(core: &str) -> &'static [&'static str] {
    match core {
        "Cortex-M0" | "Cortex-M0+" => &["M0", "CORTEX_M", "LIKE_CORTEX_M0"],
        "Cortex-M1" => &["M1", "CORTEX_M"],
        "Cortex-M3" => &["M3", "CORTEX_M", "LIKE_CORTEX_M3"],
        "Cortex-M4" => &["M4", "CORTEX_M", "RTOS_M4_M7", "LIKE_CORTEX_M4"],
        "Cortex-M4F" => &["M4", "CORTEX_M", "RTOS_M4_M7", "LIKE_CORTEX_M4"],
        "Cortex-M7" | "Cortex-M7F" | "Cortex-M7FD" => {
            &["M7", "CORTEX_M", "RTOS_M4_M7", "LIKE_CORTEX_M7"]
        }
        "Cortex-A9" => &["A9", "CORTEX_A", "LIKE_CORTEX_A9"],
        _ => &[],
    }
}

impl Target {
    /// The target's name, its core family labels and its ancestor families.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = vec![self.name.clone()];
        labels.extend(core_labels(&self.core).iter().map(|l| l.to_string()));
        labels.extend(self.extra_labels.iter().cloned());
        labels
    }

    pub fn supports(&self, backend: Backend) -> bool {
        self.supported_toolchains
            .iter()
            .any(|t| backend.aliases().contains(&t.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct TargetDb {
    targets: BTreeMap<String, Target>,
}

impl TargetDb {
    pub fn builtin() -> Self {
        // The embedded JSON is fixed, a parse failure here is a packaging bug.
        Self::from_json(BUILTIN_TARGETS).unwrap_or_else(|_| Self {
            targets: BTreeMap::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, Target> =
            serde_json::from_str(json).context("Failed to parse target database")?;
        let targets = raw
            .into_iter()
            .map(|(name, mut target)| {
                target.name = name.clone();
                (name, target)
            })
            .collect();
        Ok(Self { targets })
    }

    /// Adds or replaces targets from a project `targets.json`.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let extra = Self::from_json(&content)
            .with_context(|| format!("Invalid target file {}", path.display()))?;
        self.targets.extend(extra.targets);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Target, BuildError> {
        self.targets
            .get(name)
            .ok_or_else(|| BuildError::Configuration(format!("Target '{}' not found", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }
}

impl Default for TargetDb {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_database_parses() {
        let db = TargetDb::builtin();
        let k64f = db.get("K64F").unwrap();
        assert_eq!(k64f.name, "K64F");
        assert_eq!(k64f.core, "Cortex-M4F");
        assert!(k64f.supports(Backend::GccArm));
        assert!(!k64f.supports(Backend::GccCr));
    }

    #[test]
    fn test_labels_include_name_core_and_families() {
        let db = TargetDb::builtin();
        let labels = db.get("NUCLEO_F401RE").unwrap().labels();
        assert_eq!(labels[0], "NUCLEO_F401RE");
        assert!(labels.contains(&"CORTEX_M".to_string()));
        assert!(labels.contains(&"STM32F4".to_string()));
    }

    #[test]
    fn test_unknown_target_is_configuration_error() {
        let db = TargetDb::builtin();
        let err = db.get("NOPE").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
    }

    #[test]
    fn test_project_targets_override_builtin() {
        let mut db = TargetDb::builtin();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        std::fs::write(
            &path,
            r#"{"K64F": {"core": "Cortex-M4", "supported_toolchains": ["GCC_ARM"]},
                "MY_BOARD": {"core": "Cortex-M0+"}}"#,
        )
        .unwrap();
        db.extend_from_file(&path).unwrap();

        assert_eq!(db.get("K64F").unwrap().core, "Cortex-M4");
        let board = db.get("MY_BOARD").unwrap();
        assert_eq!(board.default_build, "standard");
        assert!(board.labels().contains(&"M0".to_string()));
    }
}
