use std::sync::Arc;
use std::time::{Duration, Instant};

use strum::Display;
use teloxide::types::{ChatId, MessageId};

use crate::core::config;
use crate::telegram::transport::ChatTransport;

/// Number of segments in the progress bar
pub const BAR_SEGMENTS: usize = 20;

const MIB: f64 = 1024.0 * 1024.0;

/// Stage of a job as seen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProgressPhase {
    Downloading,
    Converting,
    Uploading,
    Done,
    Failed,
}

/// One progress event emitted by the download backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub phase: ProgressPhase,
    pub bytes_done: u64,
    /// `None` when the source cannot report a total size
    pub bytes_total: Option<u64>,
    pub timestamp: Instant,
}

impl ProgressSnapshot {
    pub fn downloading(bytes_done: u64, bytes_total: Option<u64>) -> Self {
        Self {
            phase: ProgressPhase::Downloading,
            bytes_done,
            bytes_total,
            timestamp: Instant::now(),
        }
    }

    /// A bare phase transition with no byte counts.
    pub fn phase(phase: ProgressPhase) -> Self {
        Self {
            phase,
            bytes_done: 0,
            bytes_total: None,
            timestamp: Instant::now(),
        }
    }

    pub fn at(mut self, timestamp: Instant) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Percentage done, when a positive total is known (clamped to 0..=100).
    pub fn percent(&self) -> Option<f64> {
        match self.bytes_total {
            Some(total) if total > 0 => Some((self.bytes_done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)),
            _ => None,
        }
    }
}

/// Number of filled bar segments for a percentage: `floor(percent / 5)`.
pub fn filled_segments(percent: f64) -> usize {
    let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
    ((percent / 5.0).floor() as usize).min(BAR_SEGMENTS)
}

/// Renders `[████░░…] 47.3%`.
///
/// The label is rounded down like the bar, so `100.0%` only shows with a full bar.
pub fn make_progress_bar(percent: f64) -> String {
    let filled = filled_segments(percent);
    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(BAR_SEGMENTS - filled),
        floor_to_tenth(percent)
    )
}

fn floor_to_tenth(percent: f64) -> f64 {
    let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
    // Epsilon absorbs binary noise such as 47.3 * 10 = 472.999…
    ((percent * 10.0 + 1e-6).floor() / 10.0).min(100.0)
}

/// Status text for a snapshot.
pub fn render_snapshot(snapshot: &ProgressSnapshot) -> String {
    match snapshot.phase {
        ProgressPhase::Downloading => match snapshot.percent() {
            Some(percent) => format!("⬇️ Downloading...\n{}", make_progress_bar(percent)),
            None => format!("⬇️ Downloading...\n{:.1} MB", snapshot.bytes_done as f64 / MIB),
        },
        ProgressPhase::Converting => "🔄 Converting / Finalizing...".to_string(),
        ProgressPhase::Uploading => "📤 Uploading...".to_string(),
        ProgressPhase::Done => "✅ Done!".to_string(),
        ProgressPhase::Failed => "⚠️ Error".to_string(),
    }
}

/// Per-job status message updater.
///
/// Edits one status message as snapshots arrive. Within a phase, updates are
/// throttled to one per window; a change of phase is always delivered at
/// once. Delivery failures (deleted message, rate limit, timeouts) are logged
/// and swallowed: the job never depends on its status message.
pub struct ProgressReporter {
    transport: Arc<dyn ChatTransport>,
    chat_id: ChatId,
    message_id: Option<MessageId>,
    throttle: Duration,
    edit_timeout: Duration,
    /// Wall-clock time of the last accepted snapshot
    last_emit: Option<tokio::time::Instant>,
    last_phase: Option<ProgressPhase>,
    last_text: Option<String>,
    delivered: u32,
}

impl ProgressReporter {
    /// Creates a reporter editing `message_id` in `chat_id`.
    ///
    /// With no message id the reporter still tracks phases but delivers nothing.
    pub fn new(transport: Arc<dyn ChatTransport>, chat_id: ChatId, message_id: Option<MessageId>) -> Self {
        Self {
            transport,
            chat_id,
            message_id,
            throttle: config::progress::throttle(),
            edit_timeout: config::progress::edit_timeout(),
            last_emit: None,
            last_phase: None,
            last_text: None,
            delivered: 0,
        }
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }

    pub fn last_phase(&self) -> Option<ProgressPhase> {
        self.last_phase
    }

    /// Number of edits that reached the transport successfully.
    pub fn delivered(&self) -> u32 {
        self.delivered
    }

    /// Throttle decision. Returns the text to show, or `None` to drop the snapshot.
    ///
    /// The window is measured on the clock at the moment of the decision, not
    /// on the snapshot's own timestamp: snapshots that queued up behind a slow
    /// edit must not all be delivered at once.
    pub fn accept(&mut self, snapshot: &ProgressSnapshot) -> Option<String> {
        let now = tokio::time::Instant::now();
        let is_transition = self.last_phase != Some(snapshot.phase);
        let window_elapsed = self
            .last_emit
            .is_none_or(|last| now.saturating_duration_since(last) >= self.throttle);

        if !is_transition && !window_elapsed {
            return None;
        }

        self.last_phase = Some(snapshot.phase);
        self.last_emit = Some(now);
        Some(render_snapshot(snapshot))
    }

    /// Feeds one snapshot through the throttle and delivers it if accepted.
    pub async fn report(&mut self, snapshot: ProgressSnapshot) {
        if let Some(text) = self.accept(&snapshot) {
            self.deliver(text).await;
        }
    }

    /// Immediate phase transition (Converting, Uploading, Done).
    pub async fn phase(&mut self, phase: ProgressPhase) {
        self.report(ProgressSnapshot::phase(phase)).await;
    }

    /// Terminal failure: shows `text` regardless of the throttle.
    pub async fn fail(&mut self, text: &str) {
        self.last_phase = Some(ProgressPhase::Failed);
        self.last_emit = Some(tokio::time::Instant::now());
        self.deliver(text.to_string()).await;
    }

    async fn deliver(&mut self, text: String) {
        let Some(message_id) = self.message_id else {
            log::debug!("No status message for chat {}, dropping update", self.chat_id);
            return;
        };

        // Telegram rejects edits that do not change the text
        if self.last_text.as_deref() == Some(text.as_str()) {
            return;
        }

        let edit = self.transport.edit_message(self.chat_id, message_id, &text, None);
        match tokio::time::timeout(self.edit_timeout, edit).await {
            Ok(Ok(())) => {
                self.delivered += 1;
                self.last_text = Some(text);
            }
            Ok(Err(e)) => log::warn!("Failed to update status message in chat {}: {}", self.chat_id, e),
            Err(_) => log::warn!(
                "Status message edit in chat {} timed out after {}s",
                self.chat_id,
                self.edit_timeout.as_secs()
            ),
        }
    }
}
