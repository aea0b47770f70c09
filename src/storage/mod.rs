//! In-memory conversation state

pub mod session;

// Re-exports for convenience
pub use session::{ConversationSession, JobHandle, MediaMode, SessionState, SessionStore};
