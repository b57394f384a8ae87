//! Job records tracked by the download registry.

use std::fmt;
use std::path::{Path, PathBuf};

/// Lifecycle of a download job.
///
/// Transitions are monotonic: `Pending -> InProgress -> {Completed | Failed}`,
/// or `Pending -> Failed` when no cache file name can be derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Accepted, waiting for a worker.
    Pending,
    /// A worker is running attempts.
    InProgress,
    /// The file is fully written at the job's save path.
    Completed,
    /// Every attempt failed; the job stays failed for the registry's lifetime.
    Failed,
}

impl JobStatus {
    /// Returns the stable string label for logs and display.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if moving from `self` to `next` respects the lifecycle.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress | Self::Failed)
                | (Self::InProgress, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One download job, created once per distinct URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    url: String,
    target: Option<PathBuf>,
    save_path: Option<PathBuf>,
    status: JobStatus,
    attempts: u32,
}

impl Job {
    pub(crate) fn pending(url: impl Into<String>, target: Option<PathBuf>) -> Self {
        Self {
            url: url.into(),
            target,
            save_path: None,
            status: JobStatus::Pending,
            attempts: 0,
        }
    }

    /// The image URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Where the worker writes the file (reserved at creation).
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// The readable file path; only set once the job is `Completed`.
    #[must_use]
    pub fn save_path(&self) -> Option<&Path> {
        self.save_path.as_deref()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Number of fetch attempts started so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// Moves to `next` if the lifecycle allows it; returns whether it did.
    pub(crate) fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == JobStatus::Completed {
            self.save_path.clone_from(&self.target);
        }
        true
    }
}
