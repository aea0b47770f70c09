use thiserror::Error;

/// Why a backend could not produce a file.
///
/// Wrapped by `AppError::DownloadFailed`. Every variant carries a message
/// that is already fit to show in the chat; the variant itself only feeds
/// log categories.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// yt-dlp exited unsuccessfully; message comes from stderr classification
    #[error("{0}")]
    YtDlp(String),
    /// The backend finished but the expected file is not on disk
    #[error("{0}")]
    FileNotFound(String),
    #[error("{0}")]
    Timeout(String),
    /// Spawning or talking to the child process failed
    #[error("{0}")]
    Process(String),
}

impl DownloadError {
    /// Log tag, e.g. `ytdlp` or `timeout`.
    pub fn subcategory(&self) -> &'static str {
        match self {
            DownloadError::YtDlp(_) => "ytdlp",
            DownloadError::FileNotFound(_) => "file_not_found",
            DownloadError::Timeout(_) => "timeout",
            DownloadError::Process(_) => "process",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DownloadError::YtDlp(msg)
            | DownloadError::FileNotFound(msg)
            | DownloadError::Timeout(msg)
            | DownloadError::Process(msg) => msg,
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        DownloadError::Process(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_the_message() {
        let err = DownloadError::Timeout("Download did not finish within 60 minutes".into());
        assert_eq!(err.to_string(), "Download did not finish within 60 minutes");
        assert_eq!(err.message(), err.to_string());
    }

    #[test]
    fn test_subcategories() {
        let cases = [
            (DownloadError::YtDlp(String::new()), "ytdlp"),
            (DownloadError::FileNotFound(String::new()), "file_not_found"),
            (DownloadError::Timeout(String::new()), "timeout"),
            (DownloadError::Process(String::new()), "process"),
        ];
        for (err, expected) in cases {
            assert_eq!(err.subcategory(), expected);
        }
    }

    #[test]
    fn test_io_errors_are_process_failures() {
        let err: DownloadError = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file").into();
        assert!(matches!(err, DownloadError::Process(_)));
    }
}
