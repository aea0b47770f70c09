//! Logging initialization and configuration checking
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Cookie file validation and logging at startup

use anyhow::Result;
use simplelog::*;

use crate::core::config;
use crate::download::cookies::diagnose_cookies_content;

/// Starts the terminal + file logger.
///
/// The level comes from `LOG_LEVEL` (default `info`). Connection chatter from
/// the HTTP stack is filtered out of both sinks.
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = fs_err::File::create(log_file_path)?;
    let level = parse_level(&config::LOG_LEVEL);
    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .add_filter_ignore_str("rustls")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

fn parse_level(raw: &str) -> LevelFilter {
    raw.trim().parse().unwrap_or(LevelFilter::Info)
}

/// Logs the cookie file state at application startup.
///
/// The file is produced by the external refresher and only read here.
pub fn log_cookies_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("🍪 Cookies Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let Some(path) = config::cookies_file() else {
        log::warn!(
            "⚠️  YTDL_COOKIES_FILE: {} (not found) - downloads run without cookies",
            config::YTDL_COOKIES_FILE.as_str()
        );
        return;
    };

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let diagnostic = diagnose_cookies_content(&content);
            log::info!(
                "✅ YTDL_COOKIES_FILE: {} ({} cookies, {} session, {} expired)",
                path.display(),
                diagnostic.total_cookies,
                diagnostic.session_cookies,
                diagnostic.expired_cookies
            );
            for issue in &diagnostic.issues {
                log::warn!("   ⚠️  {}", issue);
            }
        }
        Err(e) => {
            log::error!("❌ YTDL_COOKIES_FILE: {} (cannot read: {})", path.display(), e);
        }
    }
}
