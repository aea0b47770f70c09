//! Media extraction backend abstraction.
//!
//! The bot never talks to YouTube directly: listing renditions, fetching the
//! media and transcoding it are all delegated to a [`MediaBackend`]. The
//! production backend is [`ytdlp::YtDlpBackend`]; tests plug in
//! `crate::testing::FakeBackend`.

pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::core::error::AppError;
use crate::download::error::DownloadError;
use crate::download::progress::ProgressSnapshot;
use crate::storage::MediaMode;

/// One rendition as reported by the extractor, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RawFormat {
    /// Extractor-specific id, passed back to select this rendition
    pub format_id: String,
    /// Container extension ("mp4", "webm", "m4a", ...)
    #[serde(default)]
    pub ext: String,
    /// Frame height; absent for audio-only renditions
    #[serde(default)]
    pub height: Option<u32>,
}

impl RawFormat {
    pub fn new(format_id: impl Into<String>, ext: impl Into<String>, height: Option<u32>) -> Self {
        Self {
            format_id: format_id.into(),
            ext: ext.into(),
            height,
        }
    }
}

/// Audio post-processing requested from the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    /// yt-dlp quality scale, 0 is best
    pub quality: u8,
}

impl Default for AudioTranscode {
    fn default() -> Self {
        Self {
            codec: "mp3".to_string(),
            quality: 0,
        }
    }
}

/// Everything a backend needs to produce one file.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub mode: MediaMode,
    /// Rendition token from the catalog; `None` means "best available"
    pub format_token: Option<String>,
    /// Per-job directory the output must land in
    pub output_dir: PathBuf,
    /// yt-dlp output name template, without extension
    pub name_template: String,
    pub audio: Option<AudioTranscode>,
}

impl DownloadRequest {
    /// Default output name: the media title
    pub const TITLE_TEMPLATE: &'static str = "%(title)s";

    /// Full yt-dlp `-o` template inside the job directory.
    pub fn output_template(&self) -> PathBuf {
        self.output_dir.join(format!("{}.%(ext)s", self.name_template))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Extraction capability: list renditions and produce a file.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Lists every rendition the extractor knows for `url`, unfiltered.
    ///
    /// # Errors
    /// `AppError::ExtractionFailed` when the extractor cannot describe the URL.
    async fn list_formats(&self, url: &str) -> Result<Vec<RawFormat>, AppError>;

    /// Downloads (and transcodes) the media, reporting progress on `progress`.
    ///
    /// Returns the path of the produced file. The sender is lossy from the
    /// backend's side: a full channel drops intermediate ticks, never phase
    /// transitions.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> Result<PathBuf, DownloadError>;
}
