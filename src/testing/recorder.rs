//! Chat transport that records every outbound call
//!
//! Stands in for Telegram in unit and integration tests. Message ids are
//! handed out sequentially starting at 100; each kind of call can be made to
//! fail to exercise delivery-error paths.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use teloxide::types::{ChatId, MessageId};
use tokio::fs::File;

use crate::core::error::AppError;
use crate::telegram::transport::{ChatTransport, Keyboard};

/// One recorded outbound call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundCall {
    Send {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        buttons: Option<Keyboard>,
    },
    Edit {
        chat_id: ChatId,
        message_id: MessageId,
        text: String,
        buttons: Option<Keyboard>,
    },
    Document {
        chat_id: ChatId,
        filename: String,
        caption: String,
        size: u64,
    },
}

impl OutboundCall {
    /// Message text (or caption for documents).
    pub fn text(&self) -> &str {
        match self {
            OutboundCall::Send { text, .. } | OutboundCall::Edit { text, .. } => text,
            OutboundCall::Document { caption, .. } => caption,
        }
    }

    pub fn buttons(&self) -> Option<&Keyboard> {
        match self {
            OutboundCall::Send { buttons, .. } | OutboundCall::Edit { buttons, .. } => buttons.as_ref(),
            OutboundCall::Document { .. } => None,
        }
    }
}

/// Recording [`ChatTransport`]
#[derive(Debug)]
pub struct RecordingTransport {
    calls: Mutex<Vec<OutboundCall>>,
    next_message_id: AtomicI32,
    fail_sends: AtomicBool,
    fail_edits: AtomicBool,
    fail_documents: AtomicBool,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI32::new(100),
            fail_sends: AtomicBool::new(false),
            fail_edits: AtomicBool::new(false),
            fail_documents: AtomicBool::new(false),
        }
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn fail_documents(&self, fail: bool) {
        self.fail_documents.store(fail, Ordering::SeqCst);
    }

    /// All successful calls in order.
    pub fn calls(&self) -> Vec<OutboundCall> {
        self.lock().clone()
    }

    pub fn sent(&self) -> Vec<OutboundCall> {
        self.filter(|c| matches!(c, OutboundCall::Send { .. }))
    }

    pub fn edits(&self) -> Vec<OutboundCall> {
        self.filter(|c| matches!(c, OutboundCall::Edit { .. }))
    }

    pub fn documents(&self) -> Vec<OutboundCall> {
        self.filter(|c| matches!(c, OutboundCall::Document { .. }))
    }

    /// Texts of all sends and edits, in order.
    pub fn texts(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter(|c| !matches!(c, OutboundCall::Document { .. }))
            .map(|c| c.text().to_string())
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    /// Buttons of the most recent call that carried any.
    pub fn last_buttons(&self) -> Option<Keyboard> {
        self.lock().iter().rev().find_map(|c| c.buttons().cloned())
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn filter(&self, f: impl Fn(&OutboundCall) -> bool) -> Vec<OutboundCall> {
        self.lock().iter().filter(|c| f(c)).cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<OutboundCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> Result<MessageId, AppError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AppError::DeliveryFailed("send_message rejected".to_string()));
        }
        let message_id = MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst));
        self.lock().push(OutboundCall::Send {
            chat_id,
            message_id,
            text: text.to_string(),
            buttons: buttons.cloned(),
        });
        Ok(message_id)
    }

    async fn edit_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> Result<(), AppError> {
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(AppError::DeliveryFailed("message to edit not found".to_string()));
        }
        self.lock().push(OutboundCall::Edit {
            chat_id,
            message_id,
            text: text.to_string(),
            buttons: buttons.cloned(),
        });
        Ok(())
    }

    async fn send_document(&self, chat_id: ChatId, file: File, filename: &str, caption: &str) -> Result<(), AppError> {
        if self.fail_documents.load(Ordering::SeqCst) {
            return Err(AppError::DeliveryFailed("Request Entity Too Large".to_string()));
        }
        let size = file.metadata().await?.len();
        self.lock().push(OutboundCall::Document {
            chat_id,
            filename: filename.to_string(),
            caption: caption.to_string(),
            size,
        });
        Ok(())
    }
}
