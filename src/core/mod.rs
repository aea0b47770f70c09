//! Core utilities, configuration, errors and process bootstrap helpers

pub mod config;
pub mod error;
pub mod instance_lock;
pub mod logging;
pub mod urls;

// Re-exports for convenience
pub use error::{AppError, AppResult};
pub use instance_lock::InstanceLock;
pub use logging::{init_logger, log_cookies_configuration};
pub use urls::{HostPattern, UrlMatcher, UrlPattern};
