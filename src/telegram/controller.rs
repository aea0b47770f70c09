//! Per-chat conversation state machine
//!
//! `AwaitingUrl → AwaitingModeChoice → (AwaitingQualityChoice) → Running`.
//! The controller answers every event with at most a couple of outbound
//! messages and never waits for a download: jobs run on their own task and
//! clear the session when they finish.

use std::sync::Arc;

use teloxide::types::{ChatId, MessageId};
use tokio::task::JoinHandle;

use crate::core::error::{AppError, AppResult};
use crate::core::urls::UrlMatcher;
use crate::download::formats::FormatCatalog;
use crate::download::orchestrator::{DownloadJob, DownloadOrchestrator};
use crate::storage::{JobHandle, MediaMode, SessionState, SessionStore};
use crate::telegram::transport::{Button, ChatTransport, Keyboard};
use crate::telegram::types::{CallbackAction, InboundEvent, AUDIO_DATA, VIDEO_DATA};

pub const USAGE_TEXT: &str = "👋 Send me a YouTube link and I will send back the audio (MP3) or the video (MP4).\n\n\
                              /help - show this message\n\
                              /cancel - stop the running download";
pub const MODE_PROMPT: &str = "What would you like to download?";
pub const QUALITY_PROMPT: &str = "Choose the video quality:";
pub const COLLECTING_FORMATS_TEXT: &str = "🔎 Collecting available formats...";
pub const AUDIO_STARTED_TEXT: &str = "🎧 Downloading audio...";
pub const STALE_BUTTON_TEXT: &str = "⚠️ This button is no longer active.";
pub const CANCELLING_TEXT: &str = "🛑 Cancelling the download...";
pub const NOTHING_TO_CANCEL_TEXT: &str = "Nothing to cancel.";

/// Audio / video chooser shown after a link is recognized.
pub fn mode_keyboard() -> Keyboard {
    vec![
        vec![Button::new("🎧 Audio (MP3)", AUDIO_DATA)],
        vec![Button::new("🎬 Video (MP4)", VIDEO_DATA)],
    ]
}

/// Slash command at the start of a message, lowercased, without `@botname`.
fn command_name(text: &str) -> Option<String> {
    let word = text.split_whitespace().next()?.strip_prefix('/')?;
    let name = word.split('@').next().unwrap_or(word);
    Some(name.to_ascii_lowercase())
}

pub struct ConversationController {
    store: Arc<SessionStore>,
    catalog: FormatCatalog,
    orchestrator: DownloadOrchestrator,
    transport: Arc<dyn ChatTransport>,
    matcher: UrlMatcher,
}

impl ConversationController {
    pub fn new(
        store: Arc<SessionStore>,
        catalog: FormatCatalog,
        orchestrator: DownloadOrchestrator,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Self {
            store,
            catalog,
            orchestrator,
            transport,
            matcher: UrlMatcher::default(),
        }
    }

    pub fn with_matcher(mut self, matcher: UrlMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Handles one inbound event.
    ///
    /// Returns the handle of the job this event started, if any. Failures to
    /// talk to the chat are logged here; they never reach the dispatcher.
    pub async fn handle(&self, event: InboundEvent) -> Option<JoinHandle<DownloadJob>> {
        let chat_id = event.chat_id();
        let result = match event {
            InboundEvent::TextMessage { text, .. } => self.on_text(chat_id, &text).await.map(|()| None),
            InboundEvent::Callback { message_id, data, .. } => self.on_callback(chat_id, message_id, &data).await,
        };

        match result {
            Ok(job) => job,
            Err(e) => {
                log::warn!("Chat {}: failed to answer [{}]: {}", chat_id, e.category(), e);
                None
            }
        }
    }

    async fn on_text(&self, chat_id: ChatId, text: &str) -> AppResult<()> {
        match command_name(text).as_deref() {
            Some("start") | Some("help") => return self.send(chat_id, USAGE_TEXT, None).await,
            Some("cancel") => return self.cancel(chat_id).await,
            _ => {}
        }

        if self.store.get(chat_id).is_some_and(|session| session.is_running()) {
            return self.send(chat_id, &AppError::JobAlreadyRunning.user_message(), None).await;
        }

        let Some(url) = self.matcher.find_media_url(text) else {
            return self.send(chat_id, &AppError::NoUrlFound.user_message(), None).await;
        };

        match self.store.submit_url(chat_id, url.as_str()) {
            Ok(()) => {
                log::info!("Chat {}: link received {}", chat_id, url);
                self.send(chat_id, MODE_PROMPT, Some(&mode_keyboard())).await
            }
            Err(e) => self.send(chat_id, &e.user_message(), None).await,
        }
    }

    async fn cancel(&self, chat_id: ChatId) -> AppResult<()> {
        let job = self.store.get(chat_id).and_then(|session| session.active_job);
        match job {
            Some(job) => {
                log::info!("Chat {}: cancelling job {}", chat_id, job.job_id);
                job.cancel.cancel();
                self.send(chat_id, CANCELLING_TEXT, None).await
            }
            None => {
                self.store.clear(chat_id);
                self.send(chat_id, NOTHING_TO_CANCEL_TEXT, None).await
            }
        }
    }

    async fn on_callback(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        data: &str,
    ) -> AppResult<Option<JoinHandle<DownloadJob>>> {
        let action = match data.parse::<CallbackAction>() {
            Ok(action) => action,
            Err(e) => {
                log::warn!("Chat {}: ignoring callback: {}", chat_id, e);
                return Ok(None);
            }
        };

        let Some(session) = self.store.get(chat_id) else {
            self.reply(chat_id, message_id, &AppError::SessionExpired.user_message(), None)
                .await?;
            return Ok(None);
        };
        let Some(url) = session.pending_url.clone() else {
            self.reply(chat_id, message_id, &AppError::SessionExpired.user_message(), None)
                .await?;
            return Ok(None);
        };

        if session.is_running() {
            self.send(chat_id, &AppError::JobAlreadyRunning.user_message(), None).await?;
            return Ok(None);
        }

        match (action, session.state) {
            (CallbackAction::Audio, SessionState::AwaitingModeChoice) => {
                self.start_job(chat_id, message_id, MediaMode::Audio, None, AUDIO_STARTED_TEXT)
                    .await
            }
            (CallbackAction::Video, SessionState::AwaitingModeChoice) => {
                self.offer_qualities(chat_id, message_id, &url).await?;
                Ok(None)
            }
            (CallbackAction::VideoQuality(height), SessionState::AwaitingQualityChoice) => {
                self.pick_quality(chat_id, message_id, &url, height).await
            }
            (action, state) => {
                log::debug!("Chat {}: callback {} does not fit state {}", chat_id, action, state);
                self.send(chat_id, STALE_BUTTON_TEXT, None).await?;
                Ok(None)
            }
        }
    }

    async fn offer_qualities(&self, chat_id: ChatId, message_id: Option<MessageId>, url: &str) -> AppResult<()> {
        self.reply(chat_id, message_id, COLLECTING_FORMATS_TEXT, None).await?;

        let options = match self.catalog.list_renditions(url).await {
            Ok(options) if !options.is_empty() => options,
            Ok(_) => {
                self.store.clear(chat_id);
                let e = AppError::ExtractionFailed("no downloadable video formats found".to_string());
                return self.reply(chat_id, message_id, &e.user_message(), None).await;
            }
            Err(e) => {
                log::warn!("Chat {}: listing formats failed: {}", chat_id, e);
                self.store.clear(chat_id);
                return self.reply(chat_id, message_id, &e.user_message(), None).await;
            }
        };

        let keyboard: Keyboard = options
            .iter()
            .map(|option| vec![Button::new(option.label(), CallbackAction::VideoQuality(option.height).to_string())])
            .collect();

        self.store.update(chat_id, |session| {
            session.mode = MediaMode::Video;
            session.state = SessionState::AwaitingQualityChoice;
        });
        self.reply(chat_id, message_id, QUALITY_PROMPT, Some(&keyboard)).await
    }

    async fn pick_quality(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        url: &str,
        height: u32,
    ) -> AppResult<Option<JoinHandle<DownloadJob>>> {
        match self.catalog.resolve(url, height).await {
            Ok(option) => {
                let text = format!("🎬 Downloading {}p...", height);
                self.start_job(chat_id, message_id, MediaMode::Video, Some(option.format_token), &text)
                    .await
            }
            Err(e) => {
                // The quality keyboard stays so another height can be picked
                self.send(chat_id, &e.user_message(), None).await?;
                Ok(None)
            }
        }
    }

    async fn start_job(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        mode: MediaMode,
        quality_selector: Option<String>,
        started_text: &str,
    ) -> AppResult<Option<JoinHandle<DownloadJob>>> {
        let handle = JobHandle::new();
        let session = match self.store.begin_job(chat_id, mode, handle.clone()) {
            Ok(session) => session,
            Err(e) => {
                self.send(chat_id, &e.user_message(), None).await?;
                return Ok(None);
            }
        };
        let url = session.pending_url.unwrap_or_default();

        if let Err(e) = self.reply(chat_id, message_id, started_text, None).await {
            log::warn!("Chat {}: could not update prompt: {}", chat_id, e);
        }

        let job = DownloadJob::new(handle.job_id, chat_id, url, mode, quality_selector);
        log::info!("Chat {}: starting {} job {}", chat_id, mode, job.id);

        let orchestrator = self.orchestrator.clone();
        let store = Arc::clone(&self.store);
        Ok(Some(tokio::spawn(async move {
            let job = orchestrator.run(job, handle.cancel).await;
            store.finish_job(job.chat_id, job.id);
            job
        })))
    }

    /// Edits the message carrying the pressed button, or sends a new one.
    async fn reply(
        &self,
        chat_id: ChatId,
        message_id: Option<MessageId>,
        text: &str,
        buttons: Option<&Keyboard>,
    ) -> AppResult<()> {
        match message_id {
            Some(message_id) => self.transport.edit_message(chat_id, message_id, text, buttons).await,
            None => self.send(chat_id, text, buttons).await,
        }
    }

    async fn send(&self, chat_id: ChatId, text: &str, buttons: Option<&Keyboard>) -> AppResult<()> {
        self.transport.send_message(chat_id, text, buttons).await.map(|_| ())
    }
}
