//! yt-dlp failure classification
//!
//! Maps yt-dlp stderr to a small set of categories and a message that can be
//! shown to the chat as-is.

/// yt-dlp error categories
#[derive(Debug, Clone, PartialEq)]
pub enum YtDlpErrorType {
    /// Cookies are missing, invalid or rotated
    InvalidCookies,
    /// YouTube flagged the request as automated
    BotDetection,
    /// Private, removed or region-locked video
    VideoUnavailable,
    /// Unsupported URL
    UnsupportedUrl,
    /// Network problems (timeouts, resets, DNS)
    NetworkError,
    /// ffmpeg/postprocessing failure
    Postprocessing,
    Unknown,
}

/// Classifies yt-dlp stderr output.
pub fn analyze_ytdlp_error(stderr: &str) -> YtDlpErrorType {
    let stderr_lower = stderr.to_lowercase();

    if stderr_lower.contains("cookies are no longer valid")
        || stderr_lower.contains("cookies have likely been rotated")
        || stderr_lower.contains("sign in to confirm you're not a bot")
        || stderr_lower.contains("please sign in")
        || stderr_lower.contains("use --cookies")
    {
        return YtDlpErrorType::InvalidCookies;
    }

    if stderr_lower.contains("bot detection")
        || stderr_lower.contains("http error 403")
        || stderr_lower.contains("unable to extract")
        || stderr_lower.contains("signature extraction failed")
    {
        return YtDlpErrorType::BotDetection;
    }

    if stderr_lower.contains("private video")
        || stderr_lower.contains("video unavailable")
        || stderr_lower.contains("this video is not available")
        || stderr_lower.contains("video has been removed")
        || stderr_lower.contains("this video does not exist")
    {
        return YtDlpErrorType::VideoUnavailable;
    }

    if stderr_lower.contains("unsupported url") || stderr_lower.contains("is not a valid url") {
        return YtDlpErrorType::UnsupportedUrl;
    }

    if stderr_lower.contains("postprocessing")
        || stderr_lower.contains("ffmpeg not found")
        || stderr_lower.contains("ffprobe and ffmpeg not found")
    {
        return YtDlpErrorType::Postprocessing;
    }

    if stderr_lower.contains("timed out")
        || stderr_lower.contains("timeout")
        || stderr_lower.contains("connection")
        || stderr_lower.contains("network")
        || stderr_lower.contains("failed to resolve")
        || stderr_lower.contains("temporary failure in name resolution")
    {
        return YtDlpErrorType::NetworkError;
    }

    YtDlpErrorType::Unknown
}

/// Returns the user-facing message for an error category.
pub fn get_error_message(error_type: &YtDlpErrorType) -> String {
    match error_type {
        YtDlpErrorType::InvalidCookies => "YouTube asked to sign in. Try another video or retry later.".to_string(),
        YtDlpErrorType::BotDetection => "YouTube blocked the request. Try again in a few minutes.".to_string(),
        YtDlpErrorType::VideoUnavailable => {
            "The video is unavailable. It may be private, removed or blocked in this region.".to_string()
        }
        YtDlpErrorType::UnsupportedUrl => "This link is not supported.".to_string(),
        YtDlpErrorType::NetworkError => "Network problem. Try again in a minute.".to_string(),
        YtDlpErrorType::Postprocessing => "Converting the file failed.".to_string(),
        YtDlpErrorType::Unknown => "Could not download the video. Check that the link is correct.".to_string(),
    }
}

/// Last `ERROR:` line of yt-dlp stderr, for logs.
pub fn last_error_line(stderr: &str) -> Option<&str> {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| line.starts_with("ERROR:"))
}
