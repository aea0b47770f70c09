//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::telegram::types::InboundEvent;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Text messages and button presses are turned into [`InboundEvent`]s and
/// handed to the conversation controller. The dispatcher's default
/// distribution serializes updates per chat, so events of one chat are
/// handled in order while chats run in parallel.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    dptree::entry()
        .branch(message_handler(deps.clone()))
        .branch(callback_handler(deps))
}

/// Handler for plain text (links and slash commands)
fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                if let Some(text) = msg.text() {
                    deps.controller.handle(InboundEvent::text(msg.chat.id, text)).await;
                }
                Ok(())
            }
        })
}

/// Handler for inline keyboard presses
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            // Stops the loading spinner on the pressed button
            if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
                log::warn!("Failed to answer callback query: {}", e);
            }

            let (Some(data), Some(message)) = (q.data.clone(), q.message.as_ref()) else {
                log::debug!("Callback query without data or message from user {}", q.from.id);
                return Ok(());
            };

            let event = InboundEvent::callback(message.chat().id, Some(message.id()), data);
            deps.controller.handle(event).await;
            Ok(())
        }
    })
}
