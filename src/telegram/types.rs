use std::fmt;
use std::str::FromStr;

use teloxide::types::{ChatId, MessageId};

/// Callback data of the audio button
pub const AUDIO_DATA: &str = "audio";
/// Callback data of the video button
pub const VIDEO_DATA: &str = "video";
/// Prefix of quality button data, followed by the height
pub const QUALITY_PREFIX: &str = "video_quality:";

/// Inbound chat event, stripped of everything the controller does not need
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    TextMessage {
        chat_id: ChatId,
        text: String,
    },
    Callback {
        chat_id: ChatId,
        /// Message carrying the pressed button, if Telegram still knows it
        message_id: Option<MessageId>,
        data: String,
    },
}

impl InboundEvent {
    pub fn text(chat_id: ChatId, text: impl Into<String>) -> Self {
        InboundEvent::TextMessage {
            chat_id,
            text: text.into(),
        }
    }

    pub fn callback(chat_id: ChatId, message_id: Option<MessageId>, data: impl Into<String>) -> Self {
        InboundEvent::Callback {
            chat_id,
            message_id,
            data: data.into(),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            InboundEvent::TextMessage { chat_id, .. } | InboundEvent::Callback { chat_id, .. } => *chat_id,
        }
    }
}

/// Parsed button press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    Audio,
    Video,
    VideoQuality(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized callback data: {0:?}")]
pub struct UnknownCallback(pub String);

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data {
            AUDIO_DATA => Ok(CallbackAction::Audio),
            VIDEO_DATA => Ok(CallbackAction::Video),
            _ => data
                .strip_prefix(QUALITY_PREFIX)
                .and_then(|height| height.parse::<u32>().ok())
                .filter(|height| *height > 0)
                .map(CallbackAction::VideoQuality)
                .ok_or_else(|| UnknownCallback(data.to_string())),
        }
    }
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackAction::Audio => f.write_str(AUDIO_DATA),
            CallbackAction::Video => f.write_str(VIDEO_DATA),
            CallbackAction::VideoQuality(height) => write!(f, "{}{}", QUALITY_PREFIX, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_callback_data() {
        assert_eq!("audio".parse(), Ok(CallbackAction::Audio));
        assert_eq!("video".parse(), Ok(CallbackAction::Video));
        assert_eq!("video_quality:720".parse(), Ok(CallbackAction::VideoQuality(720)));
    }

    #[test]
    fn test_reject_bad_callback_data() {
        for data in ["", "Audio", "video_quality:", "video_quality:abc", "video_quality:0", "video_quality:-1"] {
            assert!(data.parse::<CallbackAction>().is_err(), "{data:?} should be rejected");
        }
    }

    #[test]
    fn test_display_matches_wire_format() {
        for action in [CallbackAction::Audio, CallbackAction::Video, CallbackAction::VideoQuality(1080)] {
            assert_eq!(action.to_string().parse(), Ok(action));
        }
    }
}
