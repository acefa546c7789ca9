//! End-to-end conversion runner.
//!
//! Planning (probe, recommend, overrides) runs first and any error there
//! aborts before a single encoder is launched. Execution then builds jobs,
//! runs them, and writes the master manifest over the successes. Partial
//! success is a normal outcome and is reported, not raised.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone};
use hf_av::{detect_capabilities_async, extract_thumbnail, FfprobeProber, Prober, ToolRegistry};
use hf_core::config::Config;
use hf_core::events::{EventBus, EventPayload, ProgressEvent};
use hf_core::{ConversionId, EncodeProfile, Error, HostCapabilities, SourceProbe};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::jobs::{build_jobs, JobLayout};
use crate::manifest::assemble_master;
use crate::orchestrator::{
    effective_parallelism, FfmpegRunner, JobRunner, Orchestrator, RenditionResult,
};
use crate::recommend::{recommend, ProfileOverrides};

// ---------------------------------------------------------------------------
// Request / plan / report
// ---------------------------------------------------------------------------

/// What to convert and where.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    pub input: PathBuf,
    /// Run directory; defaults to a timestamped directory under the
    /// configured output root.
    pub output_dir: Option<PathBuf>,
    pub overrides: ProfileOverrides,
}

impl ConversionRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }
}

/// The validated result of planning.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionPlan {
    pub probe: SourceProbe,
    pub capabilities: HostCapabilities,
    pub profile: EncodeProfile,
}

/// Terminal state of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Every rendition succeeded.
    Complete,
    /// Some renditions succeeded; the manifest lists only those.
    Partial,
    /// No rendition succeeded; no manifest was written.
    Failed,
}

impl ConversionOutcome {
    pub fn from_results(results: &[RenditionResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        if succeeded == 0 {
            ConversionOutcome::Failed
        } else if succeeded == results.len() {
            ConversionOutcome::Complete
        } else {
            ConversionOutcome::Partial
        }
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConversionOutcome::Complete => "complete",
            ConversionOutcome::Partial => "partial",
            ConversionOutcome::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Run summary.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub id: ConversionId,
    pub input: PathBuf,
    pub run_dir: PathBuf,
    pub profile: EncodeProfile,
    /// One result per rendition, in profile order.
    pub results: Vec<RenditionResult>,
    /// Master manifest path; `None` when nothing succeeded.
    pub master: Option<PathBuf>,
    pub thumbnail: Option<PathBuf>,
    /// Non-fatal problems (thumbnail extraction and the like).
    pub warnings: Vec<String>,
    pub outcome: ConversionOutcome,
}

impl ConversionReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &RenditionResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RenditionResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    /// `Err(NoRenditionsSucceeded)` for a failed conversion, `Ok` otherwise
    /// (partial success included).
    pub fn ensure_success(&self) -> hf_core::Result<()> {
        match self.outcome {
            ConversionOutcome::Failed => Err(Error::NoRenditionsSucceeded {
                attempted: self.results.len(),
            }),
            _ => Ok(()),
        }
    }
}

/// `<root>/<YYYYMMDD>_<unix timestamp>`.
pub fn default_run_dir<Tz>(root: &Path, now: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    root.join(format!("{}_{}", now.format("%Y%m%d"), now.timestamp()))
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

/// Drives one input through planning, encoding and manifest assembly.
pub struct Conversion {
    config: Config,
    tools: ToolRegistry,
    prober: Arc<dyn Prober>,
    runner: Arc<dyn JobRunner>,
    capabilities: Option<HostCapabilities>,
    events: Option<Arc<EventBus>>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
    cancel: CancellationToken,
}

impl Conversion {
    /// Discover ffmpeg and ffprobe and use them for probing and encoding.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] if either tool cannot be found.
    pub fn new(config: Config) -> hf_core::Result<Self> {
        let tools = ToolRegistry::discover(&config.tools);
        let prober = Arc::new(FfprobeProber::from_registry(&tools)?);
        let runner = Arc::new(FfmpegRunner::from_registry(&tools)?);
        Ok(Self::from_parts(config, tools, prober, runner))
    }

    /// Assemble a conversion from explicit collaborators.
    pub fn from_parts(
        config: Config,
        tools: ToolRegistry,
        prober: Arc<dyn Prober>,
        runner: Arc<dyn JobRunner>,
    ) -> Self {
        Self {
            config,
            tools,
            prober,
            runner,
            capabilities: None,
            events: None,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Builder: plan against these capabilities instead of detecting them.
    pub fn with_capabilities(mut self, caps: HostCapabilities) -> Self {
        self.capabilities = Some(caps);
        self
    }

    /// Builder: publish lifecycle events.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// Builder: forward encoder progress lines.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Builder: abort the run when this token fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Injected capabilities, or the cached host detection.
    pub async fn capabilities(&self) -> hf_core::Result<HostCapabilities> {
        match &self.capabilities {
            Some(caps) => Ok(caps.clone()),
            None => detect_capabilities_async(&self.tools).await,
        }
    }

    /// Probe `input`, recommend a profile, and apply `overrides`.
    ///
    /// # Errors
    ///
    /// [`Error::Probe`] or [`Error::UnsupportedConfiguration`]; nothing has
    /// been written or launched when either is returned.
    pub async fn plan(
        &self,
        input: &Path,
        overrides: &ProfileOverrides,
    ) -> hf_core::Result<ConversionPlan> {
        tracing::info!(input = %input.display(), prober = self.prober.name(), "probing source");
        let probe = self.prober.probe(input).await?;
        let capabilities = self.capabilities().await?;

        let mut profile = recommend(&probe, &capabilities);
        if !overrides.is_empty() {
            profile = overrides.apply(profile, &probe, &capabilities)?;
            tracing::info!(renditions = ?profile.labels(), "overrides applied");
        }
        profile.validate()?;

        Ok(ConversionPlan {
            probe,
            capabilities,
            profile,
        })
    }

    /// Run a planned conversion into `run_dir`.
    ///
    /// # Errors
    ///
    /// Only for failures outside any single rendition (the run directory or
    /// the manifest cannot be written). Per-rendition failures, including
    /// all of them failing, are reported in the returned summary.
    pub async fn execute(
        &self,
        plan: ConversionPlan,
        run_dir: &Path,
    ) -> hf_core::Result<ConversionReport> {
        let id = ConversionId::new();
        let input = plan.probe.path.clone();
        let profile = plan.profile;
        std::fs::create_dir_all(run_dir)?;

        let layout = JobLayout {
            input: &input,
            run_dir,
            playlist_stem: self.config.conversion.playlist_stem(),
        };
        let jobs = build_jobs(&profile, &self.config.encryption, &layout)?;

        tracing::info!(
            conversion_id = %id,
            run_dir = %run_dir.display(),
            encoder = %profile.video_encoder,
            renditions = ?profile.labels(),
            encrypted = self.config.encryption.enabled,
            "conversion started"
        );
        self.publish(EventPayload::ConversionStarted {
            conversion_id: id,
            renditions: profile.labels().into_iter().map(String::from).collect(),
        });

        let parallelism =
            effective_parallelism(profile.video_encoder, self.config.conversion.parallelism());
        let mut orchestrator = Orchestrator::new(self.runner.clone())
            .with_encryption(&self.config.encryption)
            .with_parallelism(parallelism)
            .with_cancellation(self.cancel.clone())
            .with_conversion_id(id);
        if let Some(tx) = &self.progress {
            orchestrator = orchestrator.with_progress(tx.clone());
        }
        if let Some(bus) = &self.events {
            orchestrator = orchestrator.with_events(bus.clone());
        }
        let results = orchestrator.run_all(jobs).await;

        let master = match assemble_master(&results, run_dir) {
            Ok(path) => {
                self.publish(EventPayload::ManifestWritten {
                    conversion_id: id,
                    path: path.clone(),
                    renditions: results.iter().filter(|r| r.is_success()).count(),
                });
                Some(path)
            }
            Err(Error::NoRenditionsSucceeded { .. }) => None,
            Err(e) => return Err(e),
        };

        let mut warnings = Vec::new();
        let thumbnail = if master.is_some()
            && self.config.conversion.generate_thumbnail
            && !self.cancel.is_cancelled()
        {
            match extract_thumbnail(&self.tools, &input, run_dir).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!(error = %e, "thumbnail extraction failed");
                    warnings.push(format!("thumbnail not generated: {e}"));
                    None
                }
            }
        } else {
            None
        };

        let outcome = ConversionOutcome::from_results(&results);
        let succeeded = results.iter().filter(|r| r.is_success()).count();
        self.publish(EventPayload::ConversionFinished {
            conversion_id: id,
            succeeded,
            failed: results.len() - succeeded,
        });
        tracing::info!(
            conversion_id = %id,
            outcome = %outcome,
            succeeded,
            failed = results.len() - succeeded,
            "conversion finished"
        );

        Ok(ConversionReport {
            id,
            input,
            run_dir: run_dir.to_path_buf(),
            profile,
            results,
            master,
            thumbnail,
            warnings,
            outcome,
        })
    }

    /// Plan and execute `request`.
    pub async fn run(&self, request: ConversionRequest) -> hf_core::Result<ConversionReport> {
        let plan = self.plan(&request.input, &request.overrides).await?;
        let run_dir = request.output_dir.unwrap_or_else(|| {
            default_run_dir(&self.config.conversion.output_root, &Local::now())
        });
        self.execute(plan, &run_dir).await
    }

    fn publish(&self, payload: EventPayload) {
        if let Some(bus) = &self.events {
            bus.broadcast(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::VariantJob;
    use crate::orchestrator::JobObserver;
    use async_trait::async_trait;
    use chrono::Utc;
    use hf_core::{AudioStream, JobFailure, JobFailureKind, VideoStream};
    use std::time::Duration;

    struct FixedProber(SourceProbe);

    #[async_trait]
    impl Prober for FixedProber {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn probe(&self, path: &Path) -> hf_core::Result<SourceProbe> {
            if path.to_string_lossy().contains("missing") {
                return Err(Error::probe("no such file"));
            }
            Ok(SourceProbe {
                path: path.to_path_buf(),
                ..self.0.clone()
            })
        }
    }

    /// Writes a playlist for labels it accepts, fails the rest.
    struct WritingRunner {
        fail: Vec<&'static str>,
    }

    #[async_trait]
    impl JobRunner for WritingRunner {
        async fn run(
            &self,
            job: &VariantJob,
            _observer: &JobObserver,
            _cancel: &CancellationToken,
        ) -> Result<PathBuf, JobFailure> {
            if self.fail.contains(&job.label()) {
                return Err(JobFailure::new(JobFailureKind::ExitStatus(Some(1)), "nope"));
            }
            std::fs::write(&job.playlist_path, "#EXTM3U\n#EXT-X-ENDLIST\n")
                .map_err(|e| JobFailure::new(JobFailureKind::Spawn, e.to_string()))?;
            Ok(job.playlist_path.clone())
        }
    }

    fn hevc_1440() -> SourceProbe {
        SourceProbe {
            path: PathBuf::new(),
            video: VideoStream {
                codec: "hevc".into(),
                width: 2560,
                height: 1440,
                frame_rate: Some(24.0),
                bitrate: Some(12_000_000),
            },
            audio: Some(AudioStream {
                codec: "ac3".into(),
                sample_rate: Some(48000),
                channels: Some(6),
                bitrate: Some(384_000),
            }),
            duration: Some(Duration::from_secs(1200)),
        }
    }

    fn conversion(fail: Vec<&'static str>) -> Conversion {
        let mut config = Config::default();
        config.conversion.generate_thumbnail = false;
        Conversion::from_parts(
            config,
            ToolRegistry::default(),
            Arc::new(FixedProber(hevc_1440())),
            Arc::new(WritingRunner { fail }),
        )
        .with_capabilities(HostCapabilities::software_only())
    }

    #[test]
    fn run_dir_naming() {
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(
            default_run_dir(Path::new("out"), &now),
            PathBuf::from("out/20231114_1700000000")
        );
    }

    #[test]
    fn outcome_classification() {
        assert_eq!(ConversionOutcome::from_results(&[]), ConversionOutcome::Failed);
        assert_eq!(ConversionOutcome::Partial.to_string(), "partial");
    }

    #[tokio::test]
    async fn plan_uses_probe_and_capabilities() {
        let conv = conversion(vec![]);
        let plan = conv
            .plan(Path::new("in.mkv"), &ProfileOverrides::default())
            .await
            .unwrap();
        assert_eq!(plan.profile.labels(), vec!["2560x1440", "1920x1080", "1280x720"]);
        assert_eq!(plan.probe.path, PathBuf::from("in.mkv"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn plan_detects_capabilities_off_the_runtime() {
        let conv = Conversion::from_parts(
            Config::default(),
            ToolRegistry::default(),
            Arc::new(FixedProber(hevc_1440())),
            Arc::new(WritingRunner { fail: vec![] }),
        );
        let plan = conv
            .plan(Path::new("in.mkv"), &ProfileOverrides::default())
            .await
            .unwrap();
        assert_eq!(plan.capabilities, conv.capabilities().await.unwrap());
        assert_eq!(plan.profile.renditions.len(), 3);
    }

    #[tokio::test]
    async fn probe_error_aborts_before_any_output() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversion(vec![]);
        let mut request = ConversionRequest::new("missing.mkv");
        request.output_dir = Some(dir.path().join("run"));
        let err = conv.run(request).await.unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
        assert!(!dir.path().join("run").exists());
    }

    #[tokio::test]
    async fn bad_override_is_unsupported_configuration() {
        let conv = conversion(vec![]);
        let overrides = ProfileOverrides {
            renditions: Some(vec![]),
            ..ProfileOverrides::default()
        };
        let err = conv.plan(Path::new("in.mkv"), &overrides).await.unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfiguration(_)));
    }

    #[tokio::test]
    async fn partial_run_reports_and_lists_successes() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new(64));
        let conv = conversion(vec!["1920x1080"]).with_events(bus.clone());
        let mut request = ConversionRequest::new("in.mkv");
        request.output_dir = Some(dir.path().to_path_buf());
        let report = conv.run(request).await.unwrap();

        assert_eq!(report.outcome, ConversionOutcome::Partial);
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.failed().next().unwrap().label(), "1920x1080");
        report.ensure_success().unwrap();

        let master = std::fs::read_to_string(report.master.unwrap()).unwrap();
        assert!(master.contains("2k/playlist.m3u8"));
        assert!(!master.contains("1080p/playlist.m3u8"));
        assert!(master.contains("720p/playlist.m3u8"));

        let finished = bus.recent_events(1).remove(0);
        assert!(matches!(
            finished.payload,
            EventPayload::ConversionFinished { succeeded: 2, failed: 1, .. }
        ));
    }

    #[tokio::test]
    async fn total_failure_is_reported_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let conv = conversion(vec!["2560x1440", "1920x1080", "1280x720"]);
        let mut request = ConversionRequest::new("in.mkv");
        request.output_dir = Some(dir.path().to_path_buf());
        let report = conv.run(request).await.unwrap();

        assert_eq!(report.outcome, ConversionOutcome::Failed);
        assert!(report.master.is_none());
        assert!(!dir.path().join("master.m3u8").exists());
        let err = report.ensure_success().unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
