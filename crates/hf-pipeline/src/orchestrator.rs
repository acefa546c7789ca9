//! Job orchestrator: runs [`VariantJob`]s against the encoder, one
//! [`RenditionResult`] per job.
//!
//! Per job: `Pending -> Running -> {Succeeded, Failed}`. A job cancelled
//! before it starts goes straight from `Pending` to `Failed`. Failures are
//! isolated: one job failing never stops the others, and nothing is retried.
//!
//! Jobs run through a bounded, order-preserving pool. With a pool size of 1
//! (the default) execution is strictly sequential in rendition order.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hf_av::{StreamExit, ToolCommand, ToolRegistry, FFMPEG};
use hf_core::events::{EventBus, EventPayload, ProgressEvent};
use hf_core::{
    ConversionId, EncryptionConfig, Error, JobFailure, JobFailureKind, RenditionSpec, VideoEncoder,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::encryption::EncryptionManager;
use crate::jobs::VariantJob;

/// Diagnostic lines kept per job for failure reports.
const DIAGNOSTIC_TAIL_LINES: usize = 200;

/// Whether an encoder stderr line reports progress.
pub fn is_progress_line(line: &str) -> bool {
    line.contains("frame=") || line.contains("speed=") || line.contains("time=")
}

/// Pool size for a profile: hardware encoders get a single slot.
pub fn effective_parallelism(encoder: VideoEncoder, configured: usize) -> usize {
    if encoder.is_hardware() {
        1
    } else {
        configured.max(1)
    }
}

// ---------------------------------------------------------------------------
// JobState
// ---------------------------------------------------------------------------

/// Lifecycle state of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn advance(self, next: JobState) -> hf_core::Result<JobState> {
        let allowed = matches!(
            (self, next),
            (JobState::Pending, JobState::Running)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        );
        if allowed {
            Ok(next)
        } else {
            Err(Error::Internal(format!(
                "invalid job transition {self:?} -> {next:?}"
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// RenditionResult
// ---------------------------------------------------------------------------

/// Outcome of one job.
#[derive(Debug, Clone, Serialize)]
pub struct RenditionResult {
    pub rendition: RenditionSpec,
    /// `Succeeded` or `Failed`.
    pub state: JobState,
    /// Rendition playlist, on success.
    pub playlist: Option<PathBuf>,
    /// Failure kind and captured diagnostics, on failure.
    pub failure: Option<JobFailure>,
    pub elapsed: Duration,
}

impl RenditionResult {
    fn succeeded(rendition: RenditionSpec, playlist: PathBuf, elapsed: Duration) -> Self {
        Self {
            rendition,
            state: JobState::Succeeded,
            playlist: Some(playlist),
            failure: None,
            elapsed,
        }
    }

    fn failed(rendition: RenditionSpec, failure: JobFailure, elapsed: Duration) -> Self {
        Self {
            rendition,
            state: JobState::Failed,
            playlist: None,
            failure: Some(failure),
            elapsed,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == JobState::Succeeded
    }

    pub fn label(&self) -> &str {
        &self.rendition.label
    }

    /// This result's failure as an [`Error::Job`], if it failed.
    pub fn error(&self) -> Option<Error> {
        self.failure
            .clone()
            .map(|f| f.into_error(self.rendition.label.clone()))
    }
}

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// Routes a job's progress lines to the observer channel and the event bus.
#[derive(Clone)]
pub struct JobObserver {
    rendition: String,
    conversion_id: ConversionId,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    events: Option<Arc<EventBus>>,
}

impl JobObserver {
    /// An observer that only logs.
    pub fn detached(rendition: impl Into<String>) -> Self {
        Self {
            rendition: rendition.into(),
            conversion_id: ConversionId::new(),
            progress: None,
            events: None,
        }
    }

    /// Offer one stderr line. Returns `true` if it was a progress line (and
    /// was forwarded); other lines are left to the caller as diagnostics.
    ///
    /// Progress lines are dropped rather than queued when the observer lags.
    pub fn observe(&self, line: &str) -> bool {
        if !is_progress_line(line) {
            return false;
        }
        tracing::debug!(rendition = %self.rendition, "{line}");
        if let Some(tx) = &self.progress {
            let _ = tx.try_send(ProgressEvent {
                rendition: self.rendition.clone(),
                line: line.to_string(),
            });
        }
        if let Some(bus) = &self.events {
            bus.broadcast(EventPayload::JobProgress {
                conversion_id: self.conversion_id,
                rendition: self.rendition.clone(),
                line: line.to_string(),
            });
        }
        true
    }
}

impl std::fmt::Debug for JobObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobObserver")
            .field("rendition", &self.rendition)
            .finish_non_exhaustive()
    }
}

/// Bounded tail of diagnostic lines.
#[derive(Debug, Default)]
struct DiagnosticTail {
    lines: VecDeque<String>,
}

impl DiagnosticTail {
    fn push(&mut self, line: &str) {
        if self.lines.len() == DIAGNOSTIC_TAIL_LINES {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn text(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Executes one job to completion.
#[async_trait]
pub trait JobRunner: Send + Sync {
    /// Run the encoder for `job`, reporting lines to `observer`.
    ///
    /// Returns the rendition playlist path on success. Must kill the
    /// underlying process when `cancel` fires.
    async fn run(
        &self,
        job: &VariantJob,
        observer: &JobObserver,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, JobFailure>;
}

/// Production runner: spawns ffmpeg with the job's argument vector.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(ffmpeg_path: PathBuf, timeout: Duration) -> Self {
        Self {
            ffmpeg_path,
            timeout,
        }
    }

    /// Use the registry's ffmpeg entry and its timeout.
    pub fn from_registry(tools: &ToolRegistry) -> hf_core::Result<Self> {
        let ffmpeg = tools.require(FFMPEG)?;
        Ok(Self::new(ffmpeg.path.clone(), ffmpeg.timeout))
    }
}

#[async_trait]
impl JobRunner for FfmpegRunner {
    async fn run(
        &self,
        job: &VariantJob,
        observer: &JobObserver,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, JobFailure> {
        let mut cmd = ToolCommand::new(self.ffmpeg_path.clone());
        cmd.timeout(self.timeout);
        cmd.args(job.args.iter().cloned());

        let mut tail = DiagnosticTail::default();
        let exit = cmd
            .execute_streaming(
                |line| {
                    if !observer.observe(line) {
                        tail.push(line);
                    }
                },
                cancel,
            )
            .await
            .map_err(|e| JobFailure::new(JobFailureKind::Spawn, e.to_string()))?;

        match exit {
            StreamExit::Exited(status) if status.success() => Ok(job.playlist_path.clone()),
            StreamExit::Exited(status) => {
                let mut diagnostics = tail.text();
                if diagnostics.is_empty() {
                    diagnostics = format!("ffmpeg exited with {status} and no diagnostic output");
                }
                Err(JobFailure::new(
                    JobFailureKind::ExitStatus(status.code()),
                    diagnostics,
                ))
            }
            StreamExit::Cancelled => Err(JobFailure::new(
                JobFailureKind::Cancelled,
                "encode cancelled; ffmpeg was terminated",
            )),
            StreamExit::TimedOut => Err(JobFailure::new(
                JobFailureKind::TimedOut,
                format!("ffmpeg ran longer than {:?} and was terminated", self.timeout),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Supervises the jobs of one conversion.
pub struct Orchestrator {
    runner: Arc<dyn JobRunner>,
    encryption: Option<EncryptionManager>,
    parallelism: usize,
    cancel: CancellationToken,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    events: Option<Arc<EventBus>>,
    conversion_id: ConversionId,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn JobRunner>) -> Self {
        Self {
            runner,
            encryption: None,
            parallelism: 1,
            cancel: CancellationToken::new(),
            progress: None,
            events: None,
            conversion_id: ConversionId::new(),
        }
    }

    /// Builder: prepare key material before each job.
    pub fn with_encryption(mut self, config: &EncryptionConfig) -> Self {
        self.encryption = EncryptionManager::new(config);
        self
    }

    /// Builder: number of jobs in flight (clamped to at least 1).
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Builder: attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Builder: forward progress lines to a channel.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Builder: publish lifecycle events.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Builder: tag events with this conversion id.
    pub fn with_conversion_id(mut self, id: ConversionId) -> Self {
        self.conversion_id = id;
        self
    }

    /// Run every job; results come back in job order regardless of
    /// completion order. Resolves only after every job has resolved.
    pub async fn run_all(&self, jobs: Vec<VariantJob>) -> Vec<RenditionResult> {
        tracing::info!(
            jobs = jobs.len(),
            parallelism = self.parallelism,
            "starting rendition jobs"
        );
        stream::iter(jobs)
            .map(|job| self.run_job(job))
            .buffered(self.parallelism)
            .collect()
            .await
    }

    /// Run a single job to a terminal state.
    pub async fn run_job(&self, job: VariantJob) -> RenditionResult {
        let started = Instant::now();
        let label = job.rendition.label.clone();
        let state = JobState::Pending;

        if self.cancel.is_cancelled() {
            let failure = JobFailure::new(
                JobFailureKind::Cancelled,
                "conversion cancelled before this rendition started",
            );
            return self.finish(job.rendition, state, Err(failure), started);
        }

        let state = match state.advance(JobState::Running) {
            Ok(s) => s,
            Err(e) => {
                let failure = JobFailure::new(JobFailureKind::Spawn, e.to_string());
                return self.finish(job.rendition, state, Err(failure), started);
            }
        };
        tracing::info!(rendition = %label, dir = %job.output_dir.display(), "rendition started");
        self.publish(EventPayload::JobStarted {
            conversion_id: self.conversion_id,
            rendition: label.clone(),
        });

        if let Some(manager) = &self.encryption {
            if let Err(e) = manager.prepare(&job.rendition, &job.output_dir) {
                let failure = JobFailure::new(JobFailureKind::EncryptionSetup, e.to_string());
                return self.finish(job.rendition, state, Err(failure), started);
            }
        }

        let observer = JobObserver {
            rendition: label,
            conversion_id: self.conversion_id,
            progress: self.progress.clone(),
            events: self.events.clone(),
        };
        let outcome = self.runner.run(&job, &observer, &self.cancel).await;
        self.finish(job.rendition, state, outcome, started)
    }

    fn finish(
        &self,
        rendition: RenditionSpec,
        state: JobState,
        outcome: Result<PathBuf, JobFailure>,
        started: Instant,
    ) -> RenditionResult {
        let elapsed = started.elapsed();
        let label = rendition.label.clone();
        match outcome {
            Ok(playlist) => {
                debug_assert!(state.advance(JobState::Succeeded).is_ok());
                tracing::info!(
                    rendition = %label,
                    playlist = %playlist.display(),
                    elapsed_secs = elapsed.as_secs_f64(),
                    "rendition succeeded"
                );
                self.publish(EventPayload::JobSucceeded {
                    conversion_id: self.conversion_id,
                    rendition: label,
                    playlist: playlist.clone(),
                });
                RenditionResult::succeeded(rendition, playlist, elapsed)
            }
            Err(failure) => {
                debug_assert!(state.advance(JobState::Failed).is_ok());
                tracing::warn!(
                    rendition = %label,
                    kind = %failure.kind,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "rendition failed"
                );
                self.publish(EventPayload::JobFailed {
                    conversion_id: self.conversion_id,
                    rendition: label,
                    error: failure.kind.to_string(),
                });
                RenditionResult::failed(rendition, failure, elapsed)
            }
        }
    }

    fn publish(&self, payload: EventPayload) {
        if let Some(bus) = &self.events {
            bus.broadcast(payload);
        }
    }
}
