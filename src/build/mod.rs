mod clean;
mod core;
mod feedback;
pub mod job;
pub mod process;
mod report;
pub mod scheduler;
pub mod staleness;

pub use clean::{build_dir_for, clean};
pub use core::{BuildRequest, LIBRARY_TEMP_DIR, build_library, build_project};
pub use feedback::FeedbackAnalyzer;
pub use job::{BuildJob, JobResult};
pub use report::{BuildReport, BuildStatus};
pub use scheduler::Scheduler;
pub use staleness::needs_rebuild;
