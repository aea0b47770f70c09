//! The production [`MediaBackend`], powered by yt-dlp.
//!
//! Format listing runs `yt-dlp -J`; downloads run yt-dlp with a machine
//! readable progress template and `--print after_move:` so the final path
//! does not have to be guessed. Child processes are spawned with
//! `kill_on_drop`, so a cancelled or timed out job never leaves yt-dlp behind.
//!
//! yt-dlp rewrites the cookie jar it is given on exit. The configured cookie
//! file is therefore copied next to the job and only the copy is passed on.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::config;
use crate::core::error::AppError;
use crate::download::error::DownloadError;
use crate::download::progress::{ProgressPhase, ProgressSnapshot};
use crate::download::source::{DownloadRequest, MediaBackend, RawFormat};
use crate::download::ytdlp_errors::{analyze_ytdlp_error, get_error_message, last_error_line};
use crate::storage::MediaMode;

/// `--progress-template` used for downloads; parsed by [`parse_output_line`]
pub const PROGRESS_TEMPLATE: &str = "download:[progress] %(progress.downloaded_bytes)s %(progress.total_bytes)s \
                                     %(progress.total_bytes_estimate)s %(progress.status)s";

/// `--print` template announcing the final file path
pub const FINAL_PATH_TEMPLATE: &str = "after_move:FILE:%(filepath)s";

const PROGRESS_PREFIX: &str = "[progress]";
const FINAL_PATH_PREFIX: &str = "FILE:";
const POSTPROCESS_MARKERS: &[&str] = &["[ExtractAudio]", "[Merger]", "[VideoConvertor]", "[VideoRemuxer]"];

/// How many stderr lines to keep for error classification
const STDERR_TAIL_LINES: usize = 50;

/// One classified line of yt-dlp output.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress {
        downloaded: u64,
        total: Option<u64>,
        finished: bool,
    },
    Postprocessing,
    FinalPath(PathBuf),
    Other,
}

/// Parses one line of yt-dlp stdout/stderr.
///
/// Byte counts may be `NA` or floats (estimates); a total of 0 is unknown.
pub fn parse_output_line(line: &str) -> OutputLine {
    let line = line.trim();

    if let Some(path) = line.strip_prefix(FINAL_PATH_PREFIX) {
        let path = path.trim();
        if !path.is_empty() {
            return OutputLine::FinalPath(PathBuf::from(path));
        }
    }

    if let Some(rest) = line.strip_prefix(PROGRESS_PREFIX) {
        let parts: Vec<&str> = rest.split_whitespace().collect();
        if parts.len() >= 4 {
            let downloaded = parse_bytes(parts[0]).unwrap_or(0);
            let total = parse_bytes(parts[1]).or_else(|| parse_bytes(parts[2])).filter(|t| *t > 0);
            return OutputLine::Progress {
                downloaded,
                total,
                finished: parts[3] == "finished",
            };
        }
        return OutputLine::Other;
    }

    if POSTPROCESS_MARKERS.iter().any(|marker| line.starts_with(marker)) {
        return OutputLine::Postprocessing;
    }

    OutputLine::Other
}

fn parse_bytes(raw: &str) -> Option<u64> {
    raw.parse::<u64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0).map(|v| v as u64))
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Extracts the rendition list from `yt-dlp -J` output.
///
/// yt-dlp lists formats worst-first; the result is best-first so that the
/// first rendition seen for a height is the best one.
pub fn parse_formats_json(json: &str) -> Result<Vec<RawFormat>, AppError> {
    let info: VideoInfo = serde_json::from_str(json)?;
    let mut formats = info.formats;
    formats.reverse();
    Ok(formats)
}

/// Builds the yt-dlp argument list for a download.
pub fn build_download_args(request: &DownloadRequest, cookies: Option<&Path>) -> Vec<String> {
    let template = request.output_template();
    let mut args: Vec<String> = vec![
        "--no-playlist".into(),
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--print".into(),
        FINAL_PATH_TEMPLATE.into(),
        "-o".into(),
        template.to_string_lossy().into_owned(),
    ];

    if let Some(cookies) = cookies {
        args.push("--cookies".into());
        args.push(cookies.to_string_lossy().into_owned());
    }

    match request.mode {
        MediaMode::Audio => {
            let audio = request.audio.clone().unwrap_or_default();
            args.extend([
                "-f".into(),
                "bestaudio/best".into(),
                "-x".into(),
                "--audio-format".into(),
                audio.codec,
                "--audio-quality".into(),
                audio.quality.to_string(),
            ]);
        }
        MediaMode::Video | MediaMode::Unset => {
            let selector = match &request.format_token {
                Some(token) => format!("{}+bestaudio/best", token),
                None => "bestvideo+bestaudio/best".to_string(),
            };
            args.extend(["-f".into(), selector, "--merge-output-format".into(), "mp4".into()]);
        }
    }

    args.push(request.url.clone());
    args
}

/// Finds the produced file when yt-dlp did not announce it.
///
/// The job directory holds a single job, so any finished file in it is the
/// output. Prefers `preferred_ext`; skips partial downloads and the staged
/// cookie jar.
pub fn find_downloaded_file(dir: &Path, preferred_ext: &str) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs_err::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| !matches!(ext, "part" | "ytdl" | "txt" | "json"))
        })
        .collect();
    candidates.sort();

    let preferred = candidates
        .iter()
        .position(|path| path.extension().is_some_and(|ext| ext == preferred_ext));
    match preferred {
        Some(index) => Some(candidates.swap_remove(index)),
        None => candidates.into_iter().next(),
    }
}

/// Copies the cookie jar into `dir`; yt-dlp may rewrite the copy freely.
async fn stage_cookies(source: Option<&Path>, dir: &Path) -> Option<PathBuf> {
    let source = source.filter(|p| p.is_file())?;
    let target = dir.join("cookies.txt");
    match fs_err::tokio::copy(source, &target).await {
        Ok(_) => Some(target),
        Err(e) => {
            log::warn!("Could not copy cookie file, continuing without cookies: {}", e);
            None
        }
    }
}

/// yt-dlp powered backend.
#[derive(Debug, Clone)]
pub struct YtDlpBackend {
    bin: String,
    cookies: Option<PathBuf>,
    scratch_dir: PathBuf,
    formats_timeout: Duration,
    download_timeout: Duration,
}

impl YtDlpBackend {
    pub fn new(bin: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            cookies: None,
            scratch_dir: scratch_dir.into(),
            formats_timeout: config::download::formats_timeout(),
            download_timeout: config::download::download_timeout(),
        }
    }

    /// Backend configured from `YTDL_BIN`, `YTDL_COOKIES_FILE` and `DOWNLOAD_DIR`.
    pub fn from_env() -> Self {
        Self::new(config::YTDL_BIN.as_str(), config::download_dir())
            .with_cookies(Some(config::cookies_path()))
    }

    /// Cookie jar to use when it exists at call time.
    pub fn with_cookies(mut self, cookies: Option<PathBuf>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_timeouts(mut self, formats: Duration, download: Duration) -> Self {
        self.formats_timeout = formats;
        self.download_timeout = download;
        self
    }

    async fn run_download(
        &self,
        request: &DownloadRequest,
        progress: &mpsc::Sender<ProgressSnapshot>,
    ) -> Result<PathBuf, DownloadError> {
        let cookies = stage_cookies(self.cookies.as_deref(), &request.output_dir).await;
        let args = build_download_args(request, cookies.as_deref());
        log::debug!("{} {}", self.bin, args.join(" "));

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DownloadError::Process(format!("Failed to start {}: {}", self.bin, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DownloadError::Process("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| DownloadError::Process("yt-dlp stderr unavailable".to_string()))?;

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut stdout_done = false;
        let mut stderr_done = false;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
        let mut final_path: Option<PathBuf> = None;
        let mut converting = false;

        while !(stdout_done && stderr_done) {
            let (line, from_stderr) = tokio::select! {
                line = stdout.next_line(), if !stdout_done => (line, false),
                line = stderr.next_line(), if !stderr_done => (line, true),
            };

            let line = match line {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => {
                    if from_stderr {
                        stderr_done = true;
                    } else {
                        stdout_done = true;
                    }
                    continue;
                }
            };

            match parse_output_line(&line) {
                OutputLine::Progress { finished: true, .. } | OutputLine::Postprocessing => {
                    if !converting {
                        converting = true;
                        let _ = progress.send(ProgressSnapshot::phase(ProgressPhase::Converting)).await;
                    }
                }
                OutputLine::Progress { downloaded, total, .. } => {
                    // Video and audio streams are fetched one after the other
                    converting = false;
                    let _ = progress.try_send(ProgressSnapshot::downloading(downloaded, total));
                }
                OutputLine::FinalPath(path) => final_path = Some(path),
                OutputLine::Other => {
                    if from_stderr {
                        if stderr_tail.len() == STDERR_TAIL_LINES {
                            stderr_tail.pop_front();
                        }
                        stderr_tail.push_back(line);
                    }
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| DownloadError::Process(format!("Failed to wait for yt-dlp: {}", e)))?;

        if !status.success() {
            let stderr_text = stderr_tail.into_iter().collect::<Vec<_>>().join("\n");
            let error_type = analyze_ytdlp_error(&stderr_text);
            log::error!(
                "yt-dlp exited with {} ({:?}): {}",
                status,
                error_type,
                last_error_line(&stderr_text).unwrap_or("no error line")
            );
            return Err(DownloadError::YtDlp(get_error_message(&error_type)));
        }

        if let Some(path) = final_path.filter(|p| p.is_file()) {
            return Ok(path);
        }

        let preferred_ext = match request.mode {
            MediaMode::Audio => request.audio.clone().unwrap_or_default().codec,
            _ => "mp4".to_string(),
        };
        find_downloaded_file(&request.output_dir, &preferred_ext).ok_or_else(|| {
            DownloadError::FileNotFound(format!("yt-dlp finished but no file appeared in {}", request.output_dir.display()))
        })
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_formats(&self, url: &str) -> Result<Vec<RawFormat>, AppError> {
        let scratch = self.scratch_dir.join(format!("formats-{}", Uuid::new_v4()));
        fs_err::tokio::create_dir_all(&scratch).await?;
        let cookies = stage_cookies(self.cookies.as_deref(), &scratch).await;

        let mut command = Command::new(&self.bin);
        command.args(["-J", "--no-playlist", "--no-warnings"]);
        if let Some(cookies) = &cookies {
            command.arg("--cookies").arg(cookies);
        }
        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = tokio::time::timeout(self.formats_timeout, command.output()).await;
        if let Err(e) = fs_err::tokio::remove_dir_all(&scratch).await {
            log::warn!("Failed to remove {}: {}", scratch.display(), e);
        }

        let output = match result {
            Ok(output) => output.map_err(|e| AppError::ExtractionFailed(format!("Failed to start {}: {}", self.bin, e)))?,
            Err(_) => {
                return Err(AppError::ExtractionFailed(format!(
                    "yt-dlp did not answer within {}s",
                    self.formats_timeout.as_secs()
                )))
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let error_type = analyze_ytdlp_error(&stderr);
            log::warn!(
                "yt-dlp -J failed for {} ({:?}): {}",
                url,
                error_type,
                last_error_line(&stderr).unwrap_or("no error line")
            );
            return Err(AppError::ExtractionFailed(get_error_message(&error_type)));
        }

        parse_formats_json(&String::from_utf8_lossy(&output.stdout))
            .map_err(|e| AppError::ExtractionFailed(format!("Unreadable yt-dlp output: {}", e)))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<ProgressSnapshot>,
    ) -> Result<PathBuf, DownloadError> {
        match tokio::time::timeout(self.download_timeout, self.run_download(request, &progress)).await {
            Ok(result) => result,
            Err(_) => Err(DownloadError::Timeout(format!(
                "Download did not finish within {} minutes",
                self.download_timeout.as_secs() / 60
            ))),
        }
    }
}
