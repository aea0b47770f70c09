//! Test fixtures for end-to-end conversation tests
//!
//! `TestEnvironment` wires the real controller, session store, catalog and
//! orchestrator to a fake backend and a recording transport, with downloads
//! landing in a temporary directory.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::{ChatId, MessageId};
use tempfile::TempDir;
use tokio::task::JoinHandle;

use ytdl_bot::download::orchestrator::DownloadJob;
use ytdl_bot::download::{DownloadOrchestrator, FormatCatalog, OrchestratorConfig};
use ytdl_bot::storage::{ConversationSession, SessionStore};
use ytdl_bot::telegram::{ConversationController, InboundEvent};
use ytdl_bot::testing::{FakeBackend, OutboundCall, RecordingTransport};

/// Complete test environment
///
/// # Example
/// ```ignore
/// let env = TestEnvironment::new(FakeBackend::new());
/// env.send_text(chat, "https://youtu.be/abc123").await;
/// let job = env.press(chat, "audio").await.unwrap().await.unwrap();
/// ```
pub struct TestEnvironment {
    pub backend: Arc<FakeBackend>,
    pub transport: Arc<RecordingTransport>,
    pub store: Arc<SessionStore>,
    pub controller: ConversationController,
    pub download_dir: TempDir,
}

impl TestEnvironment {
    /// Environment with progress throttling disabled, so every snapshot is delivered.
    pub fn new(backend: FakeBackend) -> Self {
        Self::with_config(backend, |config| config.with_throttle(Duration::ZERO))
    }

    pub fn with_config(backend: FakeBackend, configure: impl FnOnce(OrchestratorConfig) -> OrchestratorConfig) -> Self {
        let download_dir = tempfile::tempdir().expect("temp dir");
        let backend = Arc::new(backend);
        let transport = Arc::new(RecordingTransport::new());
        let store = Arc::new(SessionStore::new());

        let orchestrator = DownloadOrchestrator::new(
            backend.clone(),
            transport.clone(),
            configure(OrchestratorConfig::new(download_dir.path())),
        );
        let controller = ConversationController::new(
            store.clone(),
            FormatCatalog::new(backend.clone()),
            orchestrator,
            transport.clone(),
        );

        Self {
            backend,
            transport,
            store,
            controller,
            download_dir,
        }
    }

    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Option<JoinHandle<DownloadJob>> {
        self.controller.handle(InboundEvent::text(chat_id, text)).await
    }

    /// Presses a button on the most recent message sent to the chat.
    pub async fn press(&self, chat_id: ChatId, data: &str) -> Option<JoinHandle<DownloadJob>> {
        let message_id = self.last_sent_id(chat_id);
        self.controller
            .handle(InboundEvent::callback(chat_id, message_id, data))
            .await
    }

    pub fn session(&self, chat_id: ChatId) -> Option<ConversationSession> {
        self.store.get(chat_id)
    }

    /// Id of the last message sent (not edited) to the chat.
    pub fn last_sent_id(&self, chat_id: ChatId) -> Option<MessageId> {
        self.transport.sent().into_iter().rev().find_map(|call| match call {
            OutboundCall::Send {
                chat_id: to, message_id, ..
            } if to == chat_id => Some(message_id),
            _ => None,
        })
    }

    /// Labels and callback data of the most recent keyboard, row by row.
    pub fn last_keyboard(&self) -> Vec<(String, String)> {
        self.transport
            .last_buttons()
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .map(|b| (b.label, b.data))
            .collect()
    }

    /// Number of entries left in the download root.
    pub fn download_dir_entries(&self) -> usize {
        std::fs::read_dir(self.download_dir.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}
