//! Scan properties over real directory trees.

use std::fs;
use std::path::{Path, PathBuf};

use xfirm::resources::{IGNORE_FILE, LabelSet, Resources, Scanner};
use xfirm::target::TargetDb;
use xfirm::toolchain::{Backend, BuildOptions};

fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "").unwrap();
    path
}

fn scanner(target: &str, backend: Backend) -> Scanner {
    let db = TargetDb::builtin();
    let labels = LabelSet::for_build(db.get(target).unwrap(), backend, &BuildOptions::default());
    Scanner::new(labels, backend)
}

fn names(paths: &[PathBuf]) -> Vec<String> {
    let mut out: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    out.sort();
    out
}

fn firmware_tree(root: &Path) {
    touch(root, "main.cpp");
    touch(root, "hal/gpio.c");
    touch(root, "hal/gpio.h");
    touch(root, "hal/TARGET_K64F/pins.c");
    touch(root, "hal/TARGET_K64F/TOOLCHAIN_GCC_ARM/startup.S");
    touch(root, "hal/TARGET_K64F/TOOLCHAIN_GCC_ARM/K64F.ld");
    touch(root, "hal/TARGET_K64F/TOOLCHAIN_ARM_STD/startup.s");
    touch(root, "hal/TARGET_K64F/TOOLCHAIN_ARM_STD/K64F.sct");
    touch(root, "hal/TARGET_NRF52_DK/pins.c");
    touch(root, "hal/TARGET_DEBUG/trace.c");
    touch(root, "FEATURE_BLE/ble.c");
    touch(root, "FEATURE_BLE/TARGET_K64F/ble_k64f.c");
    touch(root, "TESTS/unit/test.c");
    touch(root, "docs/notes.c");
    touch(root, "generated/gen.c");
}

#[test]
fn test_labels_select_target_and_toolchain_subtrees() {
    let dir = tempfile::tempdir().unwrap();
    firmware_tree(dir.path());

    let r = scanner("K64F", Backend::GccArm).scan(dir.path(), &[]);
    let mut c = names(&r.c_sources);
    c.dedup();
    assert_eq!(c, vec!["gen.c", "gpio.c", "notes.c", "pins.c"]);
    assert!(r.c_sources.iter().all(|p| !p.to_string_lossy().contains("NRF52")));
    assert_eq!(names(&r.s_sources), vec!["startup.S"]);
    assert_eq!(r.linker_script.as_deref().and_then(Path::file_name).unwrap(), "K64F.ld");
    assert!(!r.c_sources.iter().any(|p| p.ends_with("trace.c")));

    let r = scanner("K64F", Backend::ArmStd).scan(dir.path(), &[]);
    assert_eq!(names(&r.s_sources), vec!["startup.s"]);
    assert_eq!(r.linker_script.as_deref().and_then(Path::file_name).unwrap(), "K64F.sct");
}

#[test]
fn test_feature_subtrees_stay_out_of_primary_lists() {
    let dir = tempfile::tempdir().unwrap();
    firmware_tree(dir.path());

    let r = scanner("K64F", Backend::GccArm).scan(dir.path(), &[]);
    assert!(!r.c_sources.iter().any(|p| p.ends_with("ble.c")));
    let ble = &r.features["BLE"];
    assert_eq!(names(&ble.c_sources), vec!["ble.c", "ble_k64f.c"]);
}

#[test]
fn test_ignore_file_and_tests_dirs() {
    let dir = tempfile::tempdir().unwrap();
    firmware_tree(dir.path());
    fs::write(dir.path().join(IGNORE_FILE), "docs/*\ngenerated\n").unwrap();

    let r = scanner("K64F", Backend::GccArm).scan(dir.path(), &[]);
    let all: Vec<&PathBuf> = r.file_basepath.keys().collect();
    assert!(all.iter().all(|p| !p.to_string_lossy().contains("/docs/")));
    assert!(all.iter().all(|p| !p.to_string_lossy().contains("/generated/")));
    assert!(all.iter().all(|p| !p.to_string_lossy().contains("/TESTS/")));
    assert_eq!(names(&r.c_sources), vec!["gpio.c", "pins.c"]);
}

#[test]
fn test_rescan_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    firmware_tree(dir.path());
    let first = scanner("K64F", Backend::GccArm).scan(dir.path(), &[]);
    let second = scanner("K64F", Backend::GccArm).scan(dir.path(), &[]);
    assert_eq!(first, second);
}

#[test]
fn test_merge_of_scans_is_associative() {
    let dirs: Vec<tempfile::TempDir> = (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
    for (i, d) in dirs.iter().enumerate() {
        touch(d.path(), &format!("src{}.c", i));
        touch(d.path(), "inc/common.h");
    }
    let scans: Vec<Resources> = dirs
        .iter()
        .map(|d| scanner("K64F", Backend::GccArm).scan(d.path(), &[]))
        .collect();

    let mut left = scans[0].clone();
    left.add(scans[1].clone());
    left.add(scans[2].clone());

    let mut right_tail = scans[1].clone();
    right_tail.add(scans[2].clone());
    let mut right = scans[0].clone();
    right.add(right_tail);

    assert_eq!(left, right);
    assert_eq!(left.c_sources.len(), 3);
}
