use super::process::{CommandOutcome, run_command};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

/// One compilation unit. Jobs never read each other's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildJob {
    pub source: PathBuf,
    pub object: PathBuf,
    /// Run in order; the first nonzero exit stops the job.
    pub commands: Vec<Vec<String>>,
    pub work_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub source: PathBuf,
    pub object: PathBuf,
    pub results: Vec<CommandOutcome>,
}

impl JobResult {
    pub fn failed(&self) -> bool {
        self.results.iter().any(|r| !r.success())
    }
}

pub fn run_job(job: &BuildJob, cancel: &AtomicBool) -> JobResult {
    let mut results = Vec::with_capacity(job.commands.len());
    for command in &job.commands {
        if cancel.load(Ordering::SeqCst) {
            break;
        }
        let outcome = run_command(command, &job.work_dir, cancel);
        let ok = outcome.success();
        results.push(outcome);
        if !ok {
            break;
        }
    }
    JobResult {
        source: job.source.clone(),
        object: job.object.clone(),
        results,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_stops_at_first_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let job = BuildJob {
            source: PathBuf::from("a.s"),
            object: PathBuf::from("a.o"),
            commands: vec![sh("echo one >&2"), sh("exit 2"), sh("touch never")],
            work_dir: dir.path().to_path_buf(),
        };

        let result = run_job(&job, &AtomicBool::new(false));
        assert!(result.failed());
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].stderr, "one\n");
        assert_eq!(result.results[1].code, 2);
        assert!(!dir.path().join("never").exists());
    }

    #[test]
    fn test_runs_in_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let job = BuildJob {
            source: PathBuf::from("a.c"),
            object: PathBuf::from("a.o"),
            commands: vec![sh("touch made")],
            work_dir: dir.path().to_path_buf(),
        };
        let result = run_job(&job, &AtomicBool::new(false));
        assert!(!result.failed());
        assert!(dir.path().join("made").exists());
    }
}
