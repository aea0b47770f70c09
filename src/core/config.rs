use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::error::AppError;

/// Bot token
/// Read from TELEGRAM_BOT_TOKEN, BOT_TOKEN or TELOXIDE_TOKEN environment variable
/// Empty when none is set; `require_bot_token` turns that into a startup error
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("TELEGRAM_BOT_TOKEN")
        .or_else(|_| env::var("BOT_TOKEN"))
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_default()
});

/// Download folder path
/// Read from DOWNLOAD_DIR environment variable, defaults to "downloads"
/// Supports tilde (~) expansion for home directory
pub static DOWNLOAD_DIR: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "downloads".to_string()));

/// Cached yt-dlp binary path
/// Read once at startup from YTDL_BIN environment variable or defaults to "yt-dlp"
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// Path to the Netscape cookie file written by the cookie-refresh sidecar
/// Read from YTDL_COOKIES_FILE environment variable
/// Only used when the file exists; the bot never writes it
pub static YTDL_COOKIES_FILE: Lazy<String> =
    Lazy::new(|| env::var("YTDL_COOKIES_FILE").unwrap_or_else(|_| "/tmp/cookies.txt".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: ytdl-bot.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "ytdl-bot.log".to_string()));

/// Log level for both sinks (`error` … `trace`)
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Single-instance lock file
/// Read from LOCK_FILE_PATH environment variable
pub static LOCK_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOCK_FILE_PATH").unwrap_or_else(|_| "/tmp/ytdlbot.lock".to_string()));

/// Keep per-job download directories after delivery ("1" or "true")
pub static KEEP_DOWNLOADS: Lazy<bool> = Lazy::new(|| {
    env::var("KEEP_DOWNLOADS")
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
});

/// Returns the bot token or a configuration error when it is missing.
pub fn require_bot_token() -> Result<String, AppError> {
    let token = BOT_TOKEN.trim();
    if token.is_empty() {
        return Err(AppError::Config(
            "TELEGRAM_BOT_TOKEN (or BOT_TOKEN / TELOXIDE_TOKEN) is not set".to_string(),
        ));
    }
    Ok(token.to_string())
}

/// Download root with `~` expanded.
pub fn download_dir() -> PathBuf {
    expand_path(&DOWNLOAD_DIR)
}

/// Configured cookie file path with `~` expanded.
pub fn cookies_path() -> PathBuf {
    expand_path(&YTDL_COOKIES_FILE)
}

/// Cookie file path, if the file currently exists.
pub fn cookies_file() -> Option<PathBuf> {
    let path = cookies_path();
    path.is_file().then_some(path)
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for `yt-dlp -J` format listing (in seconds)
    pub const FORMATS_TIMEOUT_SECS: u64 = 120;

    /// Upper bound for one whole download + transcode (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 3600;

    /// Format listing timeout duration
    pub fn formats_timeout() -> Duration {
        Duration::from_secs(FORMATS_TIMEOUT_SECS)
    }

    /// Download timeout duration
    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Progress reporting configuration
pub mod progress {
    use super::Duration;

    /// Minimum interval between two within-phase progress edits (milliseconds)
    pub const THROTTLE_MS: u64 = 500;

    /// Capacity of the backend → reporter channel
    pub const CHANNEL_CAPACITY: usize = 32;

    /// Upper bound for a single status-message edit (seconds)
    pub const EDIT_TIMEOUT_SECS: u64 = 10;

    /// Throttle window duration
    pub fn throttle() -> Duration {
        Duration::from_millis(THROTTLE_MS)
    }

    /// Status edit timeout duration
    pub fn edit_timeout() -> Duration {
        Duration::from_secs(EDIT_TIMEOUT_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Long enough for large document uploads
    pub const REQUEST_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
