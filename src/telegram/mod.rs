//! Telegram integration: transport, dispatcher schema and the conversation controller

pub mod bot;
pub mod controller;
pub mod handlers;
pub mod transport;
pub mod types;

/// Bot type used across the crate
pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands, Command};
pub use controller::ConversationController;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use transport::{Button, ChatTransport, Keyboard, TeloxideTransport};
pub use types::{CallbackAction, InboundEvent};
