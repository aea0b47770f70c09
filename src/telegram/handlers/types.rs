//! Handler types and dependencies

use std::sync::Arc;

use crate::telegram::controller::ConversationController;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub controller: Arc<ConversationController>,
}

impl HandlerDeps {
    /// Create new handler dependencies
    pub fn new(controller: Arc<ConversationController>) -> Self {
        Self { controller }
    }
}
