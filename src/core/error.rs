use thiserror::Error;

use crate::download::error::DownloadError;

/// Centralized error types for the application
///
/// Every failure a conversation or a download job can run into is converted
/// to this enum. The controller and the orchestrator turn it into exactly one
/// outbound status message via [`AppError::user_message`]; nothing here is
/// allowed to take the process down.
///
/// # Example
///
/// ```
/// use ytdl_bot::core::error::AppError;
///
/// let err = AppError::ExtractionFailed("HTTP Error 404".to_string());
/// assert!(err.user_message().contains("HTTP Error 404"));
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// User text did not contain a supported media link
    #[error("No supported media URL found in message")]
    NoUrlFound,

    /// Renditions could not be listed, or the selected one vanished
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Network/transcode failure while the job was running
    #[error("Download failed: {0}")]
    DownloadFailed(#[from] DownloadError),

    /// The finished file could not be handed to the chat transport
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// An action referenced a chat that has no pending URL
    #[error("Session expired: no pending URL for this chat")]
    SessionExpired,

    /// A download-triggering event arrived while a job is running
    #[error("A download is already running for this chat")]
    JobAlreadyRunning,

    /// The job was cancelled through its cancellation token
    #[error("Download cancelled")]
    Cancelled,

    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Another bot instance holds the run lock
    #[error("Another instance is already running (lock: {0})")]
    AlreadyRunning(String),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors (yt-dlp `-J` output)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Text shown to the chat when this error ends an interaction.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NoUrlFound => "Please send a valid YouTube link.".to_string(),
            AppError::ExtractionFailed(cause) => format!("⚠️ Could not get the list of qualities: {}", cause),
            AppError::DownloadFailed(err) => format!("⚠️ Error: {}", err.message()),
            AppError::DeliveryFailed(cause) => format!("⚠️ Could not send the file: {}", cause),
            AppError::SessionExpired => "⚠️ Link not found. Please send it again.".to_string(),
            AppError::JobAlreadyRunning => {
                "⏳ A download is already running in this chat. Wait for it to finish or send /cancel.".to_string()
            }
            AppError::Cancelled => "🛑 Download cancelled.".to_string(),
            other => format!("⚠️ Error: {}", other),
        }
    }

    /// Short machine-friendly category used in log lines.
    pub fn category(&self) -> &'static str {
        match self {
            AppError::NoUrlFound => "no_url",
            AppError::ExtractionFailed(_) => "extraction",
            AppError::DownloadFailed(err) => err.subcategory(),
            AppError::DeliveryFailed(_) => "delivery",
            AppError::SessionExpired => "session_expired",
            AppError::JobAlreadyRunning => "busy",
            AppError::Cancelled => "cancelled",
            AppError::Config(_) => "config",
            AppError::AlreadyRunning(_) => "instance_lock",
            AppError::Telegram(_) => "telegram",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_expired_message() {
        assert_eq!(
            AppError::SessionExpired.user_message(),
            "⚠️ Link not found. Please send it again."
        );
    }

    #[test]
    fn test_download_failed_uses_inner_message() {
        let err: AppError = DownloadError::YtDlp("Video unavailable".into()).into();
        assert_eq!(err.user_message(), "⚠️ Error: Video unavailable");
        assert_eq!(err.category(), "ytdlp");
    }

    #[test]
    fn test_extraction_failed_carries_cause() {
        let err = AppError::ExtractionFailed("720p is no longer available".into());
        assert!(err.user_message().contains("720p is no longer available"));
        assert_eq!(err.category(), "extraction");
    }
}
