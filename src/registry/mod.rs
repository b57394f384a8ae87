//! Deduplicating download job registry.
//!
//! The registry turns image URLs into files in a cache directory. Each
//! distinct URL gets exactly one [`Job`] for the registry's lifetime: the first
//! [`DownloadRegistry::ensure`] call creates it and spawns a worker task, later
//! calls just report its status. At most [`DEFAULT_WORKERS`] downloads run at
//! once; every download makes up to `retry` attempts before it is marked
//! `Failed` for good.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use imgview_core::fetch::HttpClient;
//! use imgview_core::registry::{
//!     DEFAULT_COMPLETION_CAPACITY, DownloadRegistry, RegistryOptions, completion_channel,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (notifier, mut events) = completion_channel(DEFAULT_COMPLETION_CAPACITY);
//! let registry = DownloadRegistry::new(
//!     "./cache/session",
//!     Arc::new(HttpClient::new(None)?),
//!     Arc::new(notifier),
//!     RegistryOptions::default(),
//! )?;
//!
//! registry.ensure("https://example.com/a.png");
//! if let Some(event) = events.recv().await {
//!     println!("{} -> {:?}", event.url, event.save_path());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod filename;
mod job;
mod notifier;
mod retry;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

pub use error::{DownloadFailed, RegistryError};
pub use job::{Job, JobStatus};
pub use notifier::{
    ChannelNotifier, CompletionEvent, CompletionNotifier, DEFAULT_COMPLETION_CAPACITY, JobOutcome,
    completion_channel,
};
pub use retry::{RetryDecision, RetryPolicy};

use crate::config::DownloadConfig;
use crate::fetch::Fetcher;

/// Default number of concurrent downloads.
pub const DEFAULT_WORKERS: usize = 10;

const MIN_WORKERS: usize = 1;
const MAX_WORKERS: usize = 100;

/// Tuning for a [`DownloadRegistry`].
#[derive(Debug, Clone)]
pub struct RegistryOptions {
    /// Maximum downloads in flight.
    pub workers: usize,
    /// Attempt budget and backoff.
    pub retry_policy: RetryPolicy,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl RegistryOptions {
    /// Default workers with the snapshot's attempt budget.
    #[must_use]
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            retry_policy: RetryPolicy::with_max_attempts(config.retry),
        }
    }
}

/// Concurrent URL-to-file download registry.
///
/// Cloning is cheap; clones share the same jobs and worker pool.
#[derive(Clone)]
pub struct DownloadRegistry {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: DashMap<String, Job>,
    /// File names handed out so far, so two URLs never share a target.
    reserved: Mutex<HashSet<String>>,
    cache_dir: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn CompletionNotifier>,
    semaphore: Arc<Semaphore>,
    workers: usize,
    retry_policy: RetryPolicy,
    runtime: Handle,
}

impl fmt::Debug for DownloadRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadRegistry")
            .field("cache_dir", &self.inner.cache_dir)
            .field("jobs", &self.inner.jobs.len())
            .field("workers", &self.inner.workers)
            .field("max_attempts", &self.inner.retry_policy.max_attempts())
            .finish_non_exhaustive()
    }
}

impl DownloadRegistry {
    /// Creates a registry writing into `cache_dir` (created if missing).
    ///
    /// Must be called from within a tokio runtime; worker tasks are spawned
    /// on that runtime.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::InvalidWorkers`] if `options.workers` is 0 or above 100
    /// - [`RegistryError::NoRuntime`] outside a tokio runtime
    /// - [`RegistryError::Io`] if the cache directory cannot be created
    #[instrument(level = "debug", skip(cache_dir, fetcher, notifier, options), fields(cache_dir = %cache_dir.as_ref().display()))]
    pub fn new(
        cache_dir: impl AsRef<Path>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn CompletionNotifier>,
        options: RegistryOptions,
    ) -> Result<Self, RegistryError> {
        let RegistryOptions {
            workers,
            retry_policy,
        } = options;
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(RegistryError::InvalidWorkers {
                value: workers,
                min: MIN_WORKERS,
                max: MAX_WORKERS,
            });
        }
        let runtime = Handle::try_current().map_err(|_| RegistryError::NoRuntime)?;

        let cache_dir = cache_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&cache_dir).map_err(|e| RegistryError::io(&cache_dir, e))?;

        debug!(
            workers,
            max_attempts = retry_policy.max_attempts(),
            "creating download registry"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                jobs: DashMap::new(),
                reserved: Mutex::new(HashSet::new()),
                cache_dir,
                fetcher,
                notifier,
                semaphore: Arc::new(Semaphore::new(workers)),
                workers,
                retry_policy,
                runtime,
            }),
        })
    }

    /// Makes sure a download exists for `url` and returns its status.
    ///
    /// A new URL gets a `Pending` job and a worker task; the call returns
    /// without waiting for it. A known URL returns its current status and
    /// starts nothing, so a `Failed` job stays failed.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub fn ensure(&self, url: &str) -> JobStatus {
        match self.inner.jobs.entry(url.to_string()) {
            Entry::Occupied(entry) => return entry.get().status(),
            Entry::Vacant(entry) => {
                let target = self.inner.reserve_target(url);
                entry.insert(Job::pending(url, target));
            }
        }

        debug!("download job created");
        self.inner
            .runtime
            .spawn(run_job(Arc::clone(&self.inner), url.to_string()));
        JobStatus::Pending
    }

    /// Returns the saved file for `url` once its job has completed.
    #[must_use]
    pub fn path_for(&self, url: &str) -> Option<PathBuf> {
        let job = self.inner.jobs.get(url)?;
        match job.status() {
            JobStatus::Completed => job.save_path().map(Path::to_path_buf),
            _ => None,
        }
    }

    /// Returns the status of `url`'s job, if one exists.
    #[must_use]
    pub fn status(&self, url: &str) -> Option<JobStatus> {
        self.inner.jobs.get(url).map(|job| job.status())
    }

    /// Returns a snapshot of `url`'s job.
    #[must_use]
    pub fn job(&self, url: &str) -> Option<Job> {
        self.inner.jobs.get(url).map(|job| job.clone())
    }

    /// Number of jobs ever created.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.jobs.len()
    }

    /// Returns true if no job was ever created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.jobs.is_empty()
    }

    /// Directory downloads are written into.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.inner.cache_dir
    }

    /// Maximum downloads in flight.
    #[must_use]
    pub fn workers(&self) -> usize {
        self.inner.workers
    }

    /// Attempt budget and backoff.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.retry_policy
    }
}

impl Inner {
    fn reserve_target(&self, url: &str) -> Option<PathBuf> {
        let name = filename::cache_file_name(url)?;
        let mut reserved = self.reserved.lock().unwrap_or_else(PoisonError::into_inner);
        Some(filename::reserve_unique_path(
            &self.cache_dir,
            &name,
            &mut reserved,
        ))
    }

    fn transition(&self, url: &str, next: JobStatus) -> bool {
        self.jobs
            .get_mut(url)
            .is_some_and(|mut job| job.transition(next))
    }

    fn record_attempt(&self, url: &str) {
        if let Some(mut job) = self.jobs.get_mut(url) {
            job.record_attempt();
        }
    }

    fn target_of(&self, url: &str) -> Option<PathBuf> {
        self.jobs
            .get(url)
            .and_then(|job| job.target().map(Path::to_path_buf))
    }
}

/// Worker task for one job: acquire a slot, download, record, notify.
async fn run_job(inner: Arc<Inner>, url: String) {
    let Some(target) = inner.target_of(&url) else {
        inner.transition(&url, JobStatus::Failed);
        let failure = DownloadFailed::no_file_name(&url);
        warn!(url = %url, error = %failure, "no cache file name for URL");
        inner
            .notifier
            .notify(CompletionEvent::failed(url, failure))
            .await;
        return;
    };

    // The semaphore is never closed while the registry lives.
    let Ok(permit) = Arc::clone(&inner.semaphore).acquire_owned().await else {
        warn!(url = %url, "download worker pool closed");
        inner.transition(&url, JobStatus::Failed);
        return;
    };

    inner.transition(&url, JobStatus::InProgress);
    let result = download_with_retry(&inner, &url, &target).await;
    drop(permit);

    let event = match result {
        Ok(bytes) => {
            inner.transition(&url, JobStatus::Completed);
            info!(url = %url, path = %target.display(), bytes, "download completed");
            CompletionEvent::completed(url, target)
        }
        Err(failure) => {
            inner.transition(&url, JobStatus::Failed);
            warn!(
                url = %url,
                attempts = failure.attempts,
                error = %failure.source,
                "download failed"
            );
            CompletionEvent::failed(url, failure)
        }
    };
    inner.notifier.notify(event).await;
}

/// Runs fetch attempts until one succeeds or the policy gives up.
#[instrument(skip(inner, target), fields(url = %url))]
async fn download_with_retry(
    inner: &Inner,
    url: &str,
    target: &Path,
) -> Result<u64, DownloadFailed> {
    let policy = &inner.retry_policy;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        inner.record_attempt(url);
        debug!(attempt, "attempting download");

        match inner.fetcher.fetch_to_file(url, target).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => match policy.should_retry(attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying download"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, %reason, "not retrying download");
                    return Err(DownloadFailed::exhausted(url, attempt, e));
                }
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use super::*;
    use crate::fetch::FetchError;

    /// Writes the URL into the file; fails the first `failures` calls per fetcher.
    #[derive(Default)]
    struct StubFetcher {
        failures: u32,
        calls: AtomicU32,
    }

    impl StubFetcher {
        fn failing_first(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
            Ok(url.to_string())
        }

        async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(FetchError::bad_status(url, 503));
            }
            tokio::fs::write(dest, url.as_bytes())
                .await
                .map_err(|e| FetchError::io(dest, e))?;
            Ok(url.len() as u64)
        }
    }

    fn registry(
        dir: &TempDir,
        fetcher: Arc<StubFetcher>,
        attempts: u32,
    ) -> (DownloadRegistry, mpsc::Receiver<CompletionEvent>) {
        let (notifier, events) = completion_channel(DEFAULT_COMPLETION_CAPACITY);
        let registry = DownloadRegistry::new(
            dir.path(),
            fetcher,
            Arc::new(notifier),
            RegistryOptions {
                workers: DEFAULT_WORKERS,
                retry_policy: RetryPolicy::immediate(attempts),
            },
        )
        .unwrap();
        (registry, events)
    }

    async fn next_event(events: &mut mpsc::Receiver<CompletionEvent>) -> CompletionEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_downloads_and_completes() {
        let dir = TempDir::new().unwrap();
        let (registry, mut events) = registry(&dir, Arc::new(StubFetcher::default()), 3);

        assert_eq!(registry.ensure("http://h/a.png"), JobStatus::Pending);
        assert_eq!(registry.len(), 1);

        let event = next_event(&mut events).await;
        assert_eq!(event.url, "http://h/a.png");
        let expected = dir.path().join("a.png");
        assert_eq!(event.save_path(), Some(expected.as_path()));
        assert_eq!(registry.path_for("http://h/a.png"), Some(expected.clone()));
        assert_eq!(registry.status("http://h/a.png"), Some(JobStatus::Completed));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), "http://h/a.png");
    }

    #[tokio::test]
    async fn test_second_ensure_reports_existing_status() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let (registry, mut events) = registry(&dir, Arc::clone(&fetcher), 3);

        registry.ensure("http://h/a.png");
        next_event(&mut events).await;

        assert_eq!(registry.ensure("http://h/a.png"), JobStatus::Completed);
        assert_eq!(registry.len(), 1);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::failing_first(2));
        let (registry, mut events) = registry(&dir, Arc::clone(&fetcher), 3);

        registry.ensure("http://h/flaky.jpg");
        let event = next_event(&mut events).await;

        assert!(event.is_success());
        assert_eq!(registry.job("http://h/flaky.jpg").unwrap().attempts(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_marks_failed_permanently() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::failing_first(u32::MAX));
        let (registry, mut events) = registry(&dir, Arc::clone(&fetcher), 4);

        registry.ensure("http://h/gone.png");
        let event = next_event(&mut events).await;

        match event.outcome {
            JobOutcome::Failed(failed) => {
                assert_eq!(failed.attempts, 4);
                assert_eq!(failed.source.status(), Some(503));
            }
            JobOutcome::Completed(_) => panic!("expected failure"),
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
        assert_eq!(registry.ensure("http://h/gone.png"), JobStatus::Failed);
        assert!(registry.path_for("http://h/gone.png").is_none());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4, "no new attempts");
    }

    #[tokio::test]
    async fn test_shared_final_segment_gets_suffix() {
        let dir = TempDir::new().unwrap();
        let (registry, mut events) = registry(&dir, Arc::new(StubFetcher::default()), 1);

        registry.ensure("http://one/x.png");
        registry.ensure("http://two/x.png");
        next_event(&mut events).await;
        next_event(&mut events).await;

        let first = registry.path_for("http://one/x.png").unwrap();
        let second = registry.path_for("http://two/x.png").unwrap();
        assert_ne!(first, second);
        let mut names = vec![first, second];
        names.sort();
        assert_eq!(
            names,
            vec![dir.path().join("x.png"), dir.path().join("x_2.png")]
        );
    }

    #[tokio::test]
    async fn test_url_without_file_name_fails_without_fetching() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let (registry, mut events) = registry(&dir, Arc::clone(&fetcher), 3);

        assert_eq!(registry.ensure("http://h/dir/"), JobStatus::Pending);
        let event = next_event(&mut events).await;

        assert!(!event.is_success());
        assert_eq!(registry.status("http://h/dir/"), Some(JobStatus::Failed));
        assert_eq!(registry.job("http://h/dir/").unwrap().attempts(), 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_worker_count_rejected() {
        let dir = TempDir::new().unwrap();
        let (notifier, _events) = completion_channel(1);
        let result = DownloadRegistry::new(
            dir.path(),
            Arc::new(StubFetcher::default()),
            Arc::new(notifier),
            RegistryOptions {
                workers: 0,
                retry_policy: RetryPolicy::default(),
            },
        );
        assert!(matches!(
            result,
            Err(RegistryError::InvalidWorkers { value: 0, .. })
        ));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let dir = TempDir::new().unwrap();
        let (notifier, _events) = completion_channel(1);
        let result = DownloadRegistry::new(
            dir.path(),
            Arc::new(StubFetcher::default()),
            Arc::new(notifier),
            RegistryOptions::default(),
        );
        assert!(matches!(result, Err(RegistryError::NoRuntime)));
    }

    #[test]
    fn test_options_from_config_uses_retry() {
        let config = DownloadConfig::default().with_retry(7);
        let options = RegistryOptions::from_config(&config);
        assert_eq!(options.workers, DEFAULT_WORKERS);
        assert_eq!(options.retry_policy.max_attempts(), 7);
    }
}
