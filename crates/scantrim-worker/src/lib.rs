//! Native batch runner for the scantrim content stage.
//!
//! Pages are loaded and processed on a rayon thread pool. Every worker
//! posts exactly one [`WorkerMessage`] per page to an `mpsc` channel, and
//! the thread that called [`BatchRunner::run`] acts as the single
//! coordinator: it drains the channel and calls
//! [`TaskResult::update_ui`] for every finished page.
//!
//! Running the analysis on the pool keeps the coordinating thread free
//! for UI updates and user edits.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use scantrim_pipeline::{
    BatchDiagnostics, CacheOutcome, CancellationToken, ContentAnalyzer, FilterData, FilterUi,
    PageId, PipelineError, Point, Rotation, Settings, SystemClock, Task, TaskConfig,
    TaskDiagnostics, TaskResult, TaskStatus, prepare_page,
};
use serde::{Deserialize, Serialize};

/// Errors surfaced by the batch runner itself.
///
/// Per-page load failures and cancellations are not errors; they are
/// recorded in the [`BatchSummary`].
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker thread pool could not be created.
    #[error("failed to build worker thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The task configuration was rejected.
    #[error(transparent)]
    Config(#[from] PipelineError),

    /// A worker panicked while processing a page.
    #[error("worker panicked while processing {page}")]
    TaskPanicked {
        /// Page whose task panicked.
        page: PageId,
    },
}

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker threads. `0` lets rayon pick (one per CPU).
    pub threads: usize,
}

impl WorkerConfig {
    /// Default thread count (rayon's choice).
    pub const DEFAULT_THREADS: usize = 0;
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            threads: Self::DEFAULT_THREADS,
        }
    }
}

/// Where a page's image bytes come from.
#[derive(Debug, Clone)]
pub enum PageSource {
    /// Read from a file on the worker thread.
    File(PathBuf),
    /// Already in memory.
    Bytes(Arc<[u8]>),
}

/// One page to process.
#[derive(Debug, Clone)]
pub struct PageJob {
    pub page: PageId,
    pub source: PageSource,
    /// Pre-rotation applied by an earlier stage.
    pub rotation: Rotation,
    /// Crop polygon in rotated coordinates, if an earlier stage set one.
    pub crop_area: Option<Vec<Point>>,
}

impl PageJob {
    /// Unrotated, uncropped page read from `path`.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            page: PageId::single(path.clone()),
            source: PageSource::File(path),
            rotation: Rotation::None,
            crop_area: None,
        }
    }

    /// Unrotated, uncropped page decoded from `bytes`.
    #[must_use]
    pub fn from_bytes(page: PageId, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            page,
            source: PageSource::Bytes(bytes.into()),
            rotation: Rotation::None,
            crop_area: None,
        }
    }

    #[must_use]
    pub const fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    #[must_use]
    pub fn with_crop_area(mut self, polygon: Vec<Point>) -> Self {
        self.crop_area = Some(polygon);
        self
    }

    fn load(&self) -> Result<FilterData, PipelineError> {
        match &self.source {
            PageSource::File(path) => {
                let bytes = std::fs::read(path).map_err(|source| PipelineError::Io {
                    path: path.clone(),
                    source,
                })?;
                prepare_page(&bytes, self.rotation, self.crop_area.clone())
            }
            PageSource::Bytes(bytes) => {
                prepare_page(bytes, self.rotation, self.crop_area.clone())
            }
        }
    }
}

/// Message posted by a worker for one page.
#[derive(Debug)]
pub enum WorkerMessage {
    /// The task finished.
    Done {
        result: TaskResult,
        diagnostics: TaskDiagnostics,
    },
    /// The page could not be loaded.
    LoadFailed { page: PageId, error: PipelineError },
    /// Cancellation was observed before the task finished.
    Cancelled { page: PageId },
    /// The worker panicked.
    Panicked { page: PageId },
}

/// Outcome of one [`BatchRunner::run`].
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// Diagnostics of every finished task, in completion order.
    pub diagnostics: BatchDiagnostics,
    /// Pages that failed to load, with the error message.
    pub failed: Vec<(PageId, String)>,
    /// Pages whose task observed cancellation.
    pub cancelled: Vec<PageId>,
    /// Wall-clock duration of the whole batch.
    pub elapsed: Duration,
}

impl BatchSummary {
    /// Number of pages that finished.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.diagnostics.tasks.len()
    }

    /// Number of finished pages with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: CacheOutcome) -> usize {
        self.diagnostics.count(outcome)
    }

    /// Diagnostics table followed by failures and the batch time.
    #[must_use]
    pub fn report(&self) -> String {
        use std::fmt::Write;

        let mut s = self.diagnostics.report();
        for (page, error) in &self.failed {
            let _ = writeln!(s, "failed: {page}: {error}");
        }
        if !self.cancelled.is_empty() {
            let _ = writeln!(s, "{} pages cancelled", self.cancelled.len());
        }
        let _ = writeln!(s, "batch: {:.3}ms", self.elapsed.as_secs_f64() * 1000.0);
        s
    }
}

/// Runs content selection tasks for a session on a worker pool.
pub struct BatchRunner {
    pool: rayon::ThreadPool,
    settings: Arc<Settings>,
    analyzer: Arc<dyn ContentAnalyzer>,
    config: TaskConfig,
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("threads", &self.pool.current_num_threads())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchRunner {
    /// Runner for the session backed by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Config`] if `config` fails validation and
    /// [`WorkerError::ThreadPool`] if the pool cannot be created.
    pub fn new(
        settings: Arc<Settings>,
        analyzer: Arc<dyn ContentAnalyzer>,
        config: TaskConfig,
        worker: &WorkerConfig,
    ) -> Result<Self, WorkerError> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker.threads)
            .thread_name(|i| format!("scantrim-worker-{i}"))
            .build()?;
        Ok(Self {
            pool,
            settings,
            analyzer,
            config,
        })
    }

    /// The session's settings store.
    #[must_use]
    pub const fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Process `jobs`, presenting every finished page in `ui`.
    ///
    /// Blocks until every job has reported back. Manual edits queued in
    /// the UI's options panel are committed after each update.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::TaskPanicked`] for the first page whose
    /// worker panicked, after all other pages were delivered.
    pub fn run(
        &self,
        jobs: Vec<PageJob>,
        status: &CancellationToken,
        ui: &mut impl FilterUi,
    ) -> Result<BatchSummary, WorkerError> {
        let started = Instant::now();
        let total = jobs.len();
        tracing::info!(pages = total, threads = self.threads(), "batch started");

        let (tx, rx) = mpsc::channel();
        for job in jobs {
            let tx = tx.clone();
            let status = status.clone();
            let settings = Arc::clone(&self.settings);
            let analyzer = Arc::clone(&self.analyzer);
            let config = self.config.clone();
            self.pool.spawn(move || {
                let page = job.page.clone();
                let message = panic::catch_unwind(AssertUnwindSafe(|| {
                    run_job(job, &status, settings, analyzer, &config)
                }))
                .unwrap_or(WorkerMessage::Panicked { page });
                // The coordinator only stops listening once every sender is gone.
                let _ = tx.send(message);
            });
        }
        drop(tx);

        let mut summary = BatchSummary::default();
        let mut panicked = None;
        for message in rx {
            match message {
                WorkerMessage::Done {
                    result,
                    diagnostics,
                } => {
                    summary.diagnostics.tasks.push(diagnostics);
                    result.update_ui(ui);
                    ui.options_panel().apply_pending_overrides();
                }
                WorkerMessage::LoadFailed { page, error } => {
                    tracing::warn!(%page, %error, "failed to load page");
                    summary.failed.push((page, error.to_string()));
                }
                WorkerMessage::Cancelled { page } => {
                    tracing::debug!(%page, "task cancelled");
                    summary.cancelled.push(page);
                }
                WorkerMessage::Panicked { page } => {
                    tracing::error!(%page, "worker panicked");
                    panicked.get_or_insert(page);
                }
            }
        }
        summary.elapsed = started.elapsed();

        tracing::info!(
            pages = total,
            completed = summary.completed(),
            reused = summary.count(CacheOutcome::Reused),
            refreshed = summary.count(CacheOutcome::Refreshed),
            recomputed = summary.count(CacheOutcome::Recomputed),
            failed = summary.failed.len(),
            cancelled = summary.cancelled.len(),
            elapsed_ms = summary.elapsed.as_secs_f64() * 1000.0,
            "batch finished"
        );

        match panicked {
            Some(page) => Err(WorkerError::TaskPanicked { page }),
            None => Ok(summary),
        }
    }
}

/// Load one page and run its task. Runs on a pool thread.
fn run_job(
    job: PageJob,
    status: &CancellationToken,
    settings: Arc<Settings>,
    analyzer: Arc<dyn ContentAnalyzer>,
    config: &TaskConfig,
) -> WorkerMessage {
    if status.is_cancelled() {
        return WorkerMessage::Cancelled { page: job.page };
    }
    let data = match job.load() {
        Ok(data) => data,
        Err(error) => {
            return WorkerMessage::LoadFailed {
                page: job.page,
                error,
            };
        }
    };
    let page = job.page.clone();
    match Task::new(job.page, settings, analyzer, config).process_with_diagnostics(
        status,
        data,
        &SystemClock,
    ) {
        Ok((result, diagnostics)) => WorkerMessage::Done {
            result,
            diagnostics,
        },
        Err(_) => WorkerMessage::Cancelled { page },
    }
}
