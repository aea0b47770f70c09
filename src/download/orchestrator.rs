//! One download job, from status message to delivered document.
//!
//! Stages: `Preparing → Downloading → Postprocessing → Uploading → Done`, with
//! `Failed` reachable from every non-terminal stage. Each job gets its own
//! directory under the download root, its own progress channel and its own
//! [`ProgressReporter`]. The whole pipeline races the job's cancellation
//! token; losing the race drops the backend future, which kills yt-dlp.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use strum::Display;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::AppError;
use crate::download::error::DownloadError;
use crate::download::progress::{ProgressPhase, ProgressReporter};
use crate::download::source::{AudioTranscode, DownloadRequest, MediaBackend};
use crate::storage::MediaMode;
use crate::telegram::transport::ChatTransport;

/// First status text of every job
pub const PREPARING_TEXT: &str = "⏳ Preparing download...";

/// Caption of the delivered document
pub const DONE_CAPTION: &str = "Done ✔";

/// Pipeline stage, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobStage {
    Preparing,
    Downloading,
    Postprocessing,
    Uploading,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
}

/// One download-transcode-deliver operation.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: Uuid,
    pub chat_id: ChatId,
    pub url: String,
    pub mode: MediaMode,
    /// Rendition token, video only
    pub quality_selector: Option<String>,
    pub result_artifact_path: Option<PathBuf>,
    pub status: JobStatus,
    /// User-facing failure text when `status` is `Failed`
    pub failure: Option<String>,
}

impl DownloadJob {
    pub fn new(
        id: Uuid,
        chat_id: ChatId,
        url: impl Into<String>,
        mode: MediaMode,
        quality_selector: Option<String>,
    ) -> Self {
        Self {
            id,
            chat_id,
            url: url.into(),
            mode,
            quality_selector,
            result_artifact_path: None,
            status: JobStatus::Running,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Running
    }

    fn succeed(mut self, path: PathBuf) -> Self {
        self.result_artifact_path = Some(path);
        self.status = JobStatus::Succeeded;
        self
    }

    fn fail(mut self, message: String) -> Self {
        self.status = JobStatus::Failed;
        self.failure = Some(message);
        self
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Root under which per-job directories are created
    pub download_dir: PathBuf,
    /// Keep per-job directories after the job ends
    pub keep_artifacts: bool,
    /// Within-phase progress throttle
    pub throttle: Duration,
}

impl OrchestratorConfig {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            keep_artifacts: false,
            throttle: config::progress::throttle(),
        }
    }

    /// Settings from `DOWNLOAD_DIR` and `KEEP_DOWNLOADS`.
    pub fn from_env() -> Self {
        Self {
            keep_artifacts: *config::KEEP_DOWNLOADS,
            ..Self::new(config::download_dir())
        }
    }

    pub fn keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }
}

/// Runs download jobs against a backend and a chat transport.
#[derive(Clone)]
pub struct DownloadOrchestrator {
    backend: Arc<dyn MediaBackend>,
    transport: Arc<dyn ChatTransport>,
    config: OrchestratorConfig,
}

impl DownloadOrchestrator {
    pub fn new(backend: Arc<dyn MediaBackend>, transport: Arc<dyn ChatTransport>, config: OrchestratorConfig) -> Self {
        Self {
            backend,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Drives `job` to a terminal status.
    ///
    /// Never returns a job in `Running`. Every failure is reported once to
    /// the chat through the job's status message.
    pub async fn run(&self, job: DownloadJob, cancel: CancellationToken) -> DownloadJob {
        let started = Instant::now();
        log_stage(&job, JobStage::Preparing);

        let message_id = match self.transport.send_message(job.chat_id, PREPARING_TEXT, None).await {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Job {}: could not send status message: {}", job.id, e);
                None
            }
        };
        let mut reporter =
            ProgressReporter::new(Arc::clone(&self.transport), job.chat_id, message_id).with_throttle(self.config.throttle);
        let job_dir = self.config.download_dir.join(job.id.to_string());

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled),
            result = self.execute(&job, &job_dir, &mut reporter) => result,
        };

        let job = match result {
            Ok(path) => {
                log_stage(&job, JobStage::Done);
                reporter.phase(ProgressPhase::Done).await;
                log::info!(
                    "Job {} delivered {} in {:.1}s",
                    job.id,
                    path.display(),
                    started.elapsed().as_secs_f64()
                );
                job.succeed(path)
            }
            Err(e) => {
                log_stage(&job, JobStage::Failed);
                log::error!("Job {} failed [{}]: {}", job.id, e.category(), e);
                let message = e.user_message();
                reporter.fail(&message).await;
                job.fail(message)
            }
        };

        self.cleanup(&job_dir).await;
        job
    }

    async fn execute(
        &self,
        job: &DownloadJob,
        job_dir: &Path,
        reporter: &mut ProgressReporter,
    ) -> Result<PathBuf, AppError> {
        fs_err::tokio::create_dir_all(job_dir).await?;
        let request = build_request(job, job_dir);

        log_stage(job, JobStage::Downloading);
        let (tx, mut rx) = mpsc::channel(config::progress::CHANNEL_CAPACITY);
        let download = self.backend.download(&request, tx);
        let consume = async {
            while let Some(snapshot) = rx.recv().await {
                reporter.report(snapshot).await;
            }
        };
        let (produced, ()) = tokio::join!(download, consume);
        let produced = produced?;

        log_stage(job, JobStage::Postprocessing);
        reporter.phase(ProgressPhase::Converting).await;
        let artifact = resolve_artifact(&produced, job.mode)?;

        log_stage(job, JobStage::Uploading);
        reporter.phase(ProgressPhase::Uploading).await;
        self.upload(job.chat_id, &artifact).await?;

        Ok(artifact)
    }

    async fn upload(&self, chat_id: ChatId, path: &Path) -> Result<(), AppError> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| AppError::DeliveryFailed(format!("cannot open {}: {}", path.display(), e)))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "download".to_string());

        self.transport
            .send_document(chat_id, file, &filename, DONE_CAPTION)
            .await
            .map_err(|e| match e {
                AppError::DeliveryFailed(_) => e,
                other => AppError::DeliveryFailed(other.to_string()),
            })
    }

    async fn cleanup(&self, job_dir: &Path) {
        if self.config.keep_artifacts || !job_dir.exists() {
            return;
        }
        if let Err(e) = fs_err::tokio::remove_dir_all(job_dir).await {
            log::warn!("Failed to remove job directory: {}", e);
        }
    }
}

/// Backend request for a job.
pub fn build_request(job: &DownloadJob, job_dir: &Path) -> DownloadRequest {
    let audio = job.mode == MediaMode::Audio;
    DownloadRequest {
        url: job.url.clone(),
        mode: if audio { MediaMode::Audio } else { MediaMode::Video },
        format_token: if audio { None } else { job.quality_selector.clone() },
        output_dir: job_dir.to_path_buf(),
        name_template: DownloadRequest::TITLE_TEMPLATE.to_string(),
        audio: audio.then(AudioTranscode::default),
    }
}

/// Final file for a produced path.
///
/// Audio is expected with an `.mp3` extension; video is the produced file or
/// its `.mp4` sibling after merging.
pub fn resolve_artifact(produced: &Path, mode: MediaMode) -> Result<PathBuf, DownloadError> {
    let candidates = match mode {
        MediaMode::Audio => [produced.with_extension("mp3"), produced.to_path_buf()],
        _ => [produced.to_path_buf(), produced.with_extension("mp4")],
    };
    candidates
        .into_iter()
        .find(|path| path.is_file())
        .ok_or_else(|| DownloadError::FileNotFound("The downloaded file could not be found".to_string()))
}

fn log_stage(job: &DownloadJob, stage: JobStage) {
    log::info!("Job {} [chat {}, {}] → {}", job.id, job.chat_id, job.mode, stage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, FakeOutput, OutboundCall, RecordingTransport};
    use crate::download::progress::ProgressSnapshot;
    use pretty_assertions::assert_eq;

    fn setup(backend: FakeBackend, dir: &Path) -> (Arc<FakeBackend>, Arc<RecordingTransport>, DownloadOrchestrator) {
        let backend = Arc::new(backend);
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(
            backend.clone(),
            transport.clone(),
            OrchestratorConfig::new(dir).with_throttle(Duration::ZERO),
        );
        (backend, transport, orchestrator)
    }

    fn job(mode: MediaMode, selector: Option<&str>) -> DownloadJob {
        DownloadJob::new(
            Uuid::new_v4(),
            ChatId(42),
            "https://youtu.be/abc123",
            mode,
            selector.map(str::to_string),
        )
    }

    #[test]
    fn test_build_request_audio_ignores_selector() {
        let request = build_request(&job(MediaMode::Audio, Some("137")), Path::new("/tmp/j"));
        assert_eq!(request.format_token, None);
        assert_eq!(request.audio, Some(AudioTranscode::default()));
    }

    #[test]
    fn test_build_request_video() {
        let request = build_request(&job(MediaMode::Video, Some("id_b")), Path::new("/tmp/j"));
        assert_eq!(request.format_token.as_deref(), Some("id_b"));
        assert_eq!(request.audio, None);
        assert_eq!(request.output_template(), PathBuf::from("/tmp/j/%(title)s.%(ext)s"));
    }

    #[test]
    fn test_resolve_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let webm = dir.path().join("a.webm");
        let mp4 = dir.path().join("a.mp4");
        std::fs::write(&mp4, b"x").unwrap();
        assert_eq!(resolve_artifact(&webm, MediaMode::Video).unwrap(), mp4);

        let mp3 = dir.path().join("a.mp3");
        std::fs::write(&mp3, b"x").unwrap();
        assert_eq!(resolve_artifact(&webm, MediaMode::Audio).unwrap(), mp3);

        let missing = dir.path().join("b.webm");
        assert!(resolve_artifact(&missing, MediaMode::Video).is_err());
    }

    #[tokio::test]
    async fn test_successful_audio_job() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FakeBackend::new().with_progress(vec![
            ProgressSnapshot::downloading(0, Some(1000)),
            ProgressSnapshot::downloading(1000, Some(1000)),
        ]);
        let (backend, transport, orchestrator) = setup(backend, dir.path());

        let done = orchestrator.run(job(MediaMode::Audio, None), CancellationToken::new()).await;

        assert_eq!(done.status, JobStatus::Succeeded);
        assert_eq!(backend.download_calls(), 1);
        let texts = transport.texts();
        assert_eq!(texts.first().map(String::as_str), Some(PREPARING_TEXT));
        assert!(texts.contains(&"🔄 Converting / Finalizing...".to_string()));
        assert!(texts.contains(&"📤 Uploading...".to_string()));
        assert_eq!(texts.last().map(String::as_str), Some("✅ Done!"));

        match transport.documents().as_slice() {
            [OutboundCall::Document { filename, caption, .. }] => {
                assert_eq!(filename, "Fake title.mp3");
                assert_eq!(caption, DONE_CAPTION);
            }
            other => panic!("unexpected documents: {:?}", other),
        }

        // Job directory is gone
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_keep_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeBackend::new());
        let transport = Arc::new(RecordingTransport::new());
        let orchestrator = DownloadOrchestrator::new(
            backend,
            transport,
            OrchestratorConfig::new(dir.path()).keep_artifacts(true),
        );

        let done = orchestrator.run(job(MediaMode::Video, None), CancellationToken::new()).await;
        let path = done.result_artifact_path.unwrap();
        assert!(path.is_file());
        assert!(path.starts_with(dir.path().join(done.id.to_string())));
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported_once() {
        let dir = tempfile::tempdir().unwrap();
        let (_, transport, orchestrator) = setup(FakeBackend::new().failing_download("Video unavailable"), dir.path());

        let done = orchestrator.run(job(MediaMode::Video, Some("137")), CancellationToken::new()).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.failure.as_deref(), Some("⚠️ Error: Video unavailable"));
        assert_eq!(transport.last_text().as_deref(), Some("⚠️ Error: Video unavailable"));
        assert!(transport.documents().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_, _, orchestrator) = setup(FakeBackend::new().with_output(FakeOutput::Missing), dir.path());
        let done = orchestrator.run(job(MediaMode::Audio, None), CancellationToken::new()).await;
        assert_eq!(done.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_upload_failure_is_delivery_failed() {
        let dir = tempfile::tempdir().unwrap();
        let (_, transport, orchestrator) = setup(FakeBackend::new(), dir.path());
        transport.fail_documents(true);

        let done = orchestrator.run(job(MediaMode::Video, None), CancellationToken::new()).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.failure.unwrap().starts_with("⚠️ Could not send the file"));
    }

    #[tokio::test]
    async fn test_status_message_failure_does_not_abort_job() {
        let dir = tempfile::tempdir().unwrap();
        let (_, transport, orchestrator) = setup(FakeBackend::new(), dir.path());
        transport.fail_sends(true);

        let done = orchestrator.run(job(MediaMode::Audio, None), CancellationToken::new()).await;
        assert_eq!(done.status, JobStatus::Succeeded);
        assert!(transport.edits().is_empty());
        assert_eq!(transport.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, transport, orchestrator) = setup(FakeBackend::new().hanging(), dir.path());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { orchestrator.run(job(MediaMode::Audio, None), cancel).await }
        });
        while backend.download_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let done = handle.await.unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.failure.as_deref(), Some("🛑 Download cancelled."));
        assert_eq!(transport.last_text().as_deref(), Some("🛑 Download cancelled."));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
