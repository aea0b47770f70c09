use anyhow::Result;
use dotenvy::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use ytdl_bot::cli::{Cli, Commands};
use ytdl_bot::core::{config, init_logger, log_cookies_configuration, InstanceLock};
use ytdl_bot::download::cookies::diagnose_cookies_file;
use ytdl_bot::download::{
    DownloadOrchestrator, FormatCatalog, MediaBackend, OrchestratorConfig, YtDlpBackend,
};
use ytdl_bot::storage::SessionStore;
use ytdl_bot::telegram::{
    create_bot, schema, setup_bot_commands, ChatTransport, ConversationController, HandlerDeps, TeloxideTransport,
};

/// Main entry point for the Telegram bot
///
/// Parses CLI arguments and dispatches to appropriate subcommand.
///
/// # Errors
/// Returns an error if initialization fails (logging, instance lock, token, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Panics inside handlers or jobs are logged instead of vanishing with the task
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present, before any config is read
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    match cli.command {
        Some(Commands::Run) | None => run_bot().await,
        Some(Commands::Formats { url, json }) => run_formats(url, json).await,
        Some(Commands::CheckCookies { path }) => run_check_cookies(path),
    }
}

/// Runs the bot with long polling until Ctrl-C.
async fn run_bot() -> Result<()> {
    let lock = InstanceLock::acquire(config::LOCK_FILE_PATH.as_str())?;
    log::info!("Instance lock acquired: {}", lock.path().display());

    let token = config::require_bot_token()?;
    log_cookies_configuration();

    let download_dir = config::download_dir();
    fs_err::create_dir_all(&download_dir)?;
    log::info!("Download directory: {}", download_dir.display());

    let bot = create_bot(&token)?;
    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let transport: Arc<dyn ChatTransport> = Arc::new(TeloxideTransport::new(bot.clone()));
    let backend: Arc<dyn MediaBackend> = Arc::new(YtDlpBackend::from_env());
    let orchestrator = DownloadOrchestrator::new(Arc::clone(&backend), Arc::clone(&transport), OrchestratorConfig::from_env());
    let controller = Arc::new(ConversationController::new(
        Arc::new(SessionStore::new()),
        FormatCatalog::new(backend),
        orchestrator,
        transport,
    ));

    let handler = schema(HandlerDeps::new(controller));

    log::info!("🤖 Bot started (polling)...");
    // Drop updates that piled up while the bot was offline
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher shutdown gracefully");
    drop(lock);
    Ok(())
}

/// Prints the qualities the bot would offer for `url`.
async fn run_formats(url: String, json: bool) -> Result<()> {
    fs_err::create_dir_all(config::download_dir())?;
    let catalog = FormatCatalog::new(Arc::new(YtDlpBackend::from_env()));
    let options = catalog.list_renditions(&url).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&options)?);
        return Ok(());
    }

    if options.is_empty() {
        println!("No downloadable video formats found");
        return Ok(());
    }
    for option in &options {
        println!("{:>6}  {:<10} {}", option.label(), option.format_token, option.container);
    }
    Ok(())
}

/// Prints a diagnostic of the cookie file; fails when it is unusable.
fn run_check_cookies(path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(config::cookies_path);
    let diagnostic = diagnose_cookies_file(&path)?;

    println!("Cookie file:     {}", path.display());
    println!("Header present:  {}", diagnostic.has_header);
    println!("Cookies:         {}", diagnostic.total_cookies);
    println!("Session cookies: {}", diagnostic.session_cookies);
    println!("Expired cookies: {}", diagnostic.expired_cookies);
    println!("Domains:         {}", diagnostic.domains.join(", "));
    for issue in &diagnostic.issues {
        println!("⚠️  {}", issue);
    }

    if !diagnostic.is_usable() {
        anyhow::bail!("cookie file {} is not usable", path.display());
    }
    Ok(())
}
