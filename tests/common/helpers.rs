//! Test helpers for chat ids and extractor formats

#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, Ordering};

use teloxide::types::ChatId;
use ytdl_bot::download::RawFormat;

static NEXT_CHAT_ID: AtomicI64 = AtomicI64::new(1_000);

/// A chat id no other test in this binary uses.
pub fn create_test_chat_id() -> ChatId {
    ChatId(NEXT_CHAT_ID.fetch_add(1, Ordering::SeqCst))
}

pub fn raw(format_id: &str, ext: &str, height: Option<u32>) -> RawFormat {
    RawFormat::new(format_id, ext, height)
}

/// Best-first format list offering 1080p (`id_a`) and 720p (`id_b`), plus noise.
pub fn youtube_formats() -> Vec<RawFormat> {
    vec![
        raw("id_a", "mp4", Some(1080)),
        raw("id_a_webm", "webm", Some(1080)),
        raw("id_b", "mp4", Some(720)),
        raw("140", "m4a", None),
        raw("sb0", "mhtml", Some(45)),
    ]
}
