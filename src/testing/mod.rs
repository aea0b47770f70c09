//! Test doubles for the two external boundaries
//!
//! [`RecordingTransport`] replaces Telegram and [`FakeBackend`] replaces
//! yt-dlp, so the conversation flow and the job pipeline can be driven end to
//! end without network access.
//!
//! ```rust
//! use std::sync::Arc;
//! use ytdl_bot::download::source::RawFormat;
//! use ytdl_bot::testing::{FakeBackend, RecordingTransport};
//!
//! let backend = Arc::new(FakeBackend::new().with_formats(vec![RawFormat::new("137", "mp4", Some(1080))]));
//! let transport = Arc::new(RecordingTransport::new());
//! assert!(transport.calls().is_empty());
//! assert_eq!(backend.list_calls(), 0);
//! ```

pub mod fake_backend;
pub mod recorder;

pub use fake_backend::{FakeBackend, FakeOutput, FAKE_TITLE};
pub use recorder::{OutboundCall, RecordingTransport};
