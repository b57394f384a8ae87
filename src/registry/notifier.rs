//! Completion notifications from download workers.
//!
//! Workers never touch consumer state. When a job reaches a terminal state the
//! registry hands a [`CompletionEvent`] to its [`CompletionNotifier`]; the
//! stock [`ChannelNotifier`] forwards it over a bounded channel that the
//! consumer drains from its own loop.

use std::path::Path;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::error::DownloadFailed;

/// Default capacity of the completion channel.
pub const DEFAULT_COMPLETION_CAPACITY: usize = 64;

/// Terminal result of a download job.
#[derive(Debug)]
pub enum JobOutcome {
    /// The file was written to this path.
    Completed(PathBuf),
    /// Every attempt failed.
    Failed(DownloadFailed),
}

/// Announces that the job for `url` reached a terminal state.
#[derive(Debug)]
pub struct CompletionEvent {
    /// The image URL.
    pub url: String,
    /// How the job ended.
    pub outcome: JobOutcome,
}

impl CompletionEvent {
    pub(crate) fn completed(url: impl Into<String>, path: PathBuf) -> Self {
        Self {
            url: url.into(),
            outcome: JobOutcome::Completed(path),
        }
    }

    pub(crate) fn failed(url: impl Into<String>, failure: DownloadFailed) -> Self {
        Self {
            url: url.into(),
            outcome: JobOutcome::Failed(failure),
        }
    }

    /// The saved file, for successful jobs.
    #[must_use]
    pub fn save_path(&self) -> Option<&Path> {
        match &self.outcome {
            JobOutcome::Completed(path) => Some(path),
            JobOutcome::Failed(_) => None,
        }
    }

    /// Returns true if the download succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed(_))
    }
}

/// Receives terminal job events from the registry's workers.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Called exactly once per job, after its terminal transition.
    async fn notify(&self, event: CompletionEvent);
}

/// Forwards events into a bounded `mpsc` channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::Sender<CompletionEvent>,
}

impl ChannelNotifier {
    /// Wraps an existing sender.
    #[must_use]
    pub fn new(sender: mpsc::Sender<CompletionEvent>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl CompletionNotifier for ChannelNotifier {
    async fn notify(&self, event: CompletionEvent) {
        if let Err(mpsc::error::SendError(event)) = self.sender.send(event).await {
            debug!(url = %event.url, "completion receiver dropped, event discarded");
        }
    }
}

/// Creates a notifier and the receiver the consumer drains.
#[must_use]
pub fn completion_channel(capacity: usize) -> (ChannelNotifier, mpsc::Receiver<CompletionEvent>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (ChannelNotifier::new(sender), receiver)
}
