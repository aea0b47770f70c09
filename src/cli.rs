use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ytdl-bot")]
#[command(author, version, about = "Telegram bot that turns YouTube links into MP3 or MP4 files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// List the video qualities the bot would offer for a link
    Formats {
        /// YouTube URL
        url: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Diagnose the Netscape cookie file handed to yt-dlp
    CheckCookies {
        /// Cookie file (defaults to YTDL_COOKIES_FILE)
        path: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
