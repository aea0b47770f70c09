//! Scriptable [`MediaBackend`] for tests
//!
//! Formats, progress events and the produced file are configured up front;
//! every call is counted and every download request kept for assertions.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::error::AppError;
use crate::download::error::DownloadError;
use crate::download::progress::ProgressSnapshot;
use crate::download::source::{DownloadRequest, MediaBackend, RawFormat};
use crate::storage::MediaMode;

/// File name (without extension) the fake writes
pub const FAKE_TITLE: &str = "Fake title";

/// What a fake download leaves on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeOutput {
    /// `mp3` for audio, `mp4` for video
    ByMode,
    /// A file with this extension
    Ext(String),
    /// Nothing; the returned path does not exist
    Missing,
}

#[derive(Debug)]
pub struct FakeBackend {
    formats: Mutex<Vec<RawFormat>>,
    formats_error: Option<String>,
    progress: Vec<ProgressSnapshot>,
    download_error: Option<String>,
    output: FakeOutput,
    content: Vec<u8>,
    hang: bool,
    list_calls: AtomicUsize,
    download_calls: AtomicUsize,
    requests: Mutex<Vec<DownloadRequest>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            formats: Mutex::new(Vec::new()),
            formats_error: None,
            progress: Vec::new(),
            download_error: None,
            output: FakeOutput::ByMode,
            content: b"fake media".to_vec(),
            hang: false,
            list_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_formats(self, formats: Vec<RawFormat>) -> Self {
        self.set_formats(formats);
        self
    }

    /// `list_formats` fails with `ExtractionFailed(cause)`.
    pub fn failing_formats(mut self, cause: &str) -> Self {
        self.formats_error = Some(cause.to_string());
        self
    }

    /// Snapshots sent, in order, before the download completes.
    pub fn with_progress(mut self, progress: Vec<ProgressSnapshot>) -> Self {
        self.progress = progress;
        self
    }

    /// `download` fails with `DownloadError::YtDlp(message)` after the progress script.
    pub fn failing_download(mut self, message: &str) -> Self {
        self.download_error = Some(message.to_string());
        self
    }

    pub fn with_output(mut self, output: FakeOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_content(mut self, content: &[u8]) -> Self {
        self.content = content.to_vec();
        self
    }

    /// `download` never completes on its own; only cancellation ends it.
    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Replaces the formats returned by later `list_formats` calls.
    pub fn set_formats(&self, formats: Vec<RawFormat>) {
        *self.formats.lock().unwrap_or_else(PoisonError::into_inner) = formats;
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<DownloadRequest> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn list_formats(&self, _url: &str) -> Result<Vec<RawFormat>, AppError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(cause) = &self.formats_error {
            return Err(AppError::ExtractionFailed(cause.clone()));
        }
        Ok(self.formats.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> Result<PathBuf, DownloadError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        for snapshot in &self.progress {
            let _ = progress.send(snapshot.clone()).await;
        }

        if self.hang {
            std::future::pending::<()>().await;
        }

        if let Some(message) = &self.download_error {
            return Err(DownloadError::YtDlp(message.clone()));
        }

        let ext = match &self.output {
            FakeOutput::ByMode | FakeOutput::Missing => match request.mode {
                MediaMode::Audio => "mp3".to_string(),
                _ => "mp4".to_string(),
            },
            FakeOutput::Ext(ext) => ext.clone(),
        };
        let path = request.output_dir.join(format!("{}.{}", FAKE_TITLE, ext));

        if self.output != FakeOutput::Missing {
            fs_err::tokio::write(&path, &self.content)
                .await
                .map_err(|e| DownloadError::Process(e.to_string()))?;
        }
        Ok(path)
    }
}
