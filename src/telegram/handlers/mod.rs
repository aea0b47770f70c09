//! Telegram bot handler tree configuration
//!
//! The same schema is used in production and can be driven from tests.

mod schema;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
