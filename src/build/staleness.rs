use std::fs;
use std::path::Path;
use std::time::SystemTime;

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Whether `target` has to be produced again.
///
/// A missing target, a missing or unreadable dependency, or a dependency
/// that is not strictly older than the target all force a rebuild.
pub fn needs_rebuild<P: AsRef<Path>>(target: &Path, dependencies: &[P], build_all: bool) -> bool {
    if build_all {
        return true;
    }

    let Some(target_time) = modified(target) else {
        return true;
    };

    dependencies.iter().any(|dep| {
        let dep = dep.as_ref();
        if dep.as_os_str().is_empty() {
            return true;
        }
        match modified(dep) {
            Some(dep_time) => dep_time >= target_time,
            // Some objects are referenced without a resolvable path
            None => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::PathBuf;
    use std::time::Duration;

    fn write_at(path: &Path, time: SystemTime) {
        fs::write(path, "x").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_missing_target_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let none: [PathBuf; 0] = [];
        assert!(needs_rebuild(&dir.path().join("app.elf"), &none, false));
    }

    #[test]
    fn test_fresh_target_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let dep = dir.path().join("main.c");
        let target = dir.path().join("main.o");
        write_at(&dep, now - Duration::from_secs(60));
        write_at(&target, now);

        assert!(!needs_rebuild(&target, &[&dep], false));
        assert!(needs_rebuild(&target, &[&dep], true));
    }

    #[test]
    fn test_equal_or_newer_dependency_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let now = SystemTime::now();
        let dep = dir.path().join("util.h");
        let target = dir.path().join("main.o");

        write_at(&target, now);
        write_at(&dep, now);
        assert!(needs_rebuild(&target, &[&dep], false));

        write_at(&dep, now + Duration::from_secs(5));
        assert!(needs_rebuild(&target, &[&dep], false));
    }

    #[test]
    fn test_missing_dependency_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("main.o");
        write_at(&target, SystemTime::now());
        assert!(needs_rebuild(&target, &[dir.path().join("gone.h")], false));
        assert!(needs_rebuild(&target, &[PathBuf::new()], false));
    }
}
