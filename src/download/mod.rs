//! Download management and processing

pub mod cookies;
pub mod error;
pub mod formats;
pub mod orchestrator;
pub mod progress;
pub mod source;
pub mod ytdlp_errors;

// Re-exports for convenience
pub use error::DownloadError;
pub use formats::{FormatCatalog, FormatOption};
pub use orchestrator::{DownloadJob, DownloadOrchestrator, JobStage, JobStatus, OrchestratorConfig};
pub use progress::{ProgressPhase, ProgressReporter, ProgressSnapshot};
pub use source::ytdlp::YtDlpBackend;
pub use source::{DownloadRequest, MediaBackend, RawFormat};
