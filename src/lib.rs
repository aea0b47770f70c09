//! ytdl-bot - Telegram bot that downloads YouTube media as MP3 or MP4
//!
//! A user sends a link, picks audio or video (and, for video, a quality), and
//! gets the file back while a single status message shows the progress.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, URL recognition, instance lock
//! - `storage`: per-chat conversation sessions
//! - `download`: yt-dlp backend, rendition catalog, progress reporting, job orchestration
//! - `telegram`: transport, dispatcher schema and the conversation controller
//! - `testing`: fakes for the chat transport and the media backend

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cli;
pub mod core;
pub mod download;
pub mod storage;
pub mod telegram;
pub mod testing;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError, AppResult};
pub use download::{DownloadOrchestrator, FormatCatalog, MediaBackend, ProgressReporter, YtDlpBackend};
pub use storage::SessionStore;
pub use telegram::{ConversationController, InboundEvent};
