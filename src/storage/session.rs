//! Per-chat conversation state
//!
//! `SessionStore` replaces a global "chat → URL" map with an owned, sharded
//! store. Each chat id hashes to one shard of a [`DashMap`], so operations on
//! unrelated chats never contend, while all operations on one chat are
//! linearized by that shard's lock. No guard ever escapes this module, so no
//! lock can be held across an `.await`.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use strum::{AsRefStr, Display};
use teloxide::types::ChatId;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::error::AppError;

/// What the user asked to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum MediaMode {
    #[default]
    Unset,
    Audio,
    Video,
}

/// Where a chat is in the URL → mode → quality → job flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum SessionState {
    /// No link yet (also the implicit state of a chat with no entry)
    #[default]
    AwaitingUrl,
    AwaitingModeChoice,
    AwaitingQualityChoice,
    Running,
}

/// Handle to the job running for a session.
///
/// Cancelling the token makes the orchestrator abandon the job and kill the
/// extraction process.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub cancel: CancellationToken,
}

impl JobHandle {
    pub fn new() -> Self {
        Self {
            job_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
        }
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Conversation state of one chat.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    pub chat_id: ChatId,
    pub pending_url: Option<String>,
    pub mode: MediaMode,
    pub state: SessionState,
    pub active_job: Option<JobHandle>,
}

impl ConversationSession {
    /// Fresh session for a newly recognized link.
    pub fn with_url(chat_id: ChatId, url: impl Into<String>) -> Self {
        Self {
            chat_id,
            pending_url: Some(url.into()),
            mode: MediaMode::Unset,
            state: SessionState::AwaitingModeChoice,
            active_job: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active_job.is_some()
    }
}

/// Concurrent session store keyed by chat id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<ChatId, ConversationSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the chat's session, if any.
    pub fn get(&self, chat_id: ChatId) -> Option<ConversationSession> {
        self.sessions.get(&chat_id).map(|entry| entry.value().clone())
    }

    /// Stores a session, replacing whatever the chat had (last write wins).
    pub fn put(&self, chat_id: ChatId, session: ConversationSession) {
        self.sessions.insert(chat_id, session);
    }

    /// Removes the chat's session, returning it to the implicit `AwaitingUrl` state.
    pub fn clear(&self, chat_id: ChatId) {
        self.sessions.remove(&chat_id);
    }

    /// Atomic read-modify-write of an existing session.
    ///
    /// Returns `None` when the chat has no session.
    pub fn update<R>(&self, chat_id: ChatId, f: impl FnOnce(&mut ConversationSession) -> R) -> Option<R> {
        self.sessions.get_mut(&chat_id).map(|mut entry| f(entry.value_mut()))
    }

    /// Starts a fresh session for `url` unless the chat has a running job.
    ///
    /// A pending (not yet running) session is replaced.
    ///
    /// # Errors
    /// * `AppError::JobAlreadyRunning` - the chat already has an active job
    pub fn submit_url(&self, chat_id: ChatId, url: impl Into<String>) -> Result<(), AppError> {
        match self.sessions.entry(chat_id) {
            Entry::Occupied(entry) if entry.get().is_running() => Err(AppError::JobAlreadyRunning),
            Entry::Occupied(mut entry) => {
                entry.insert(ConversationSession::with_url(chat_id, url));
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(ConversationSession::with_url(chat_id, url));
                Ok(())
            }
        }
    }

    /// Atomically installs `handle` as the chat's active job.
    ///
    /// On success the session moves to `Running` with the given mode and a
    /// snapshot of it is returned.
    ///
    /// # Errors
    /// * `AppError::SessionExpired` - no session or no pending URL
    /// * `AppError::JobAlreadyRunning` - the chat already has an active job
    pub fn begin_job(
        &self,
        chat_id: ChatId,
        mode: MediaMode,
        handle: JobHandle,
    ) -> Result<ConversationSession, AppError> {
        match self.sessions.entry(chat_id) {
            Entry::Vacant(_) => Err(AppError::SessionExpired),
            Entry::Occupied(mut entry) => {
                let session = entry.get_mut();
                if session.active_job.is_some() {
                    return Err(AppError::JobAlreadyRunning);
                }
                if session.pending_url.is_none() {
                    return Err(AppError::SessionExpired);
                }
                session.mode = mode;
                session.state = SessionState::Running;
                session.active_job = Some(handle);
                Ok(session.clone())
            }
        }
    }

    /// Clears the chat's session if `job_id` is still its active job.
    ///
    /// Returns whether the entry was removed.
    pub fn finish_job(&self, chat_id: ChatId, job_id: Uuid) -> bool {
        self.sessions
            .remove_if(&chat_id, |_, session| {
                session.active_job.as_ref().is_some_and(|job| job.job_id == job_id)
            })
            .is_some()
    }

    /// Number of chats with a session.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
