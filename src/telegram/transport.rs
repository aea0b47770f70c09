//! Outbound chat operations
//!
//! Everything the core says to a chat goes through [`ChatTransport`]: plain
//! messages with optional inline buttons, edits of an earlier message, and
//! document uploads. [`TeloxideTransport`] is the Telegram implementation;
//! tests use `crate::testing::RecordingTransport`.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId};
use tokio::fs::File;

use crate::core::error::AppError;
use crate::telegram::Bot;

/// One inline button: the label shown and the callback data sent back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub label: String,
    pub data: String,
}

impl Button {
    pub fn new(label: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            data: data.into(),
        }
    }
}

/// Rows of buttons.
pub type Keyboard = Vec<Vec<Button>>;

/// Chat transport boundary.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a new message and returns its id.
    async fn send_message(&self, chat_id: ChatId, text: &str, buttons: Option<&Keyboard>)
        -> Result<MessageId, AppError>;

    /// Replaces the text (and keyboard) of an earlier message.
    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> Result<(), AppError>;

    /// Uploads a file as a document.
    ///
    /// The handle is consumed; it is closed when the upload finishes or fails.
    async fn send_document(&self, chat_id: ChatId, file: File, filename: &str, caption: &str)
        -> Result<(), AppError>;
}

/// Converts button rows into Telegram's inline keyboard.
pub fn to_inline_keyboard(buttons: &Keyboard) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(buttons.iter().map(|row| {
        row.iter()
            .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
            .collect::<Vec<_>>()
    }))
}

/// [`ChatTransport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> Result<MessageId, AppError> {
        let mut request = self.bot.send_message(chat_id, text);
        if let Some(buttons) = buttons {
            request = request.reply_markup(to_inline_keyboard(buttons));
        }
        let message = request.await?;
        Ok(message.id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> Result<(), AppError> {
        let mut request = self.bot.edit_message_text(chat_id, message_id, text);
        if let Some(buttons) = buttons {
            request = request.reply_markup(to_inline_keyboard(buttons));
        }
        request.await?;
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, file: File, filename: &str, caption: &str) -> Result<(), AppError> {
        let document = InputFile::read(file).file_name(filename.to_string());
        self.bot
            .send_document(chat_id, document)
            .caption(caption)
            .await
            .map_err(|e| AppError::DeliveryFailed(e.to_string()))?;
        Ok(())
    }
}
