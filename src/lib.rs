//! Audiogram - a Telegram bot that turns YouTube links into MP3 files
//!
//! This library wires a yt-dlp based media fetcher and a Telegram delivery
//! sink into a small orchestration core: single videos and playlists are
//! downloaded, transcoded to tagged MP3, delivered to the requesting chat,
//! and the staged files are cleaned up afterwards.

pub mod bot;
pub mod cli;
pub mod config;
pub mod delivery;
pub mod fetcher;
pub mod orchestrator;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use delivery::{DeliverySink, TelegramSink};
pub use fetcher::{DownloadJob, FetchResult, MediaFetcher, YtDlpOptions};
pub use orchestrator::{Orchestrator, PlaylistSummary};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Failure modes of a single download-and-deliver job
#[derive(thiserror::Error, Debug)]
pub enum DeliveryError {
    #[error("invalid source URL: {0}")]
    InvalidUrl(String),

    #[error("failed to fetch audio from {url}")]
    Fetch {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to deliver \"{title}\" to chat {chat_id}")]
    Delivery {
        chat_id: i64,
        title: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to remove staged files at {path}")]
    Cleanup {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DeliveryError {
    /// Short, single-line description suitable for sending back to the chat.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl(url) => {
                format!("that does not look like a URL I can download: {url}")
            }
            Self::Fetch { source, .. } => {
                format!(
                    "could not download the audio ({})",
                    utils::truncate_line(&source.to_string(), 200)
                )
            }
            Self::Delivery { title, source, .. } => {
                format!(
                    "could not upload \"{title}\" ({})",
                    utils::truncate_line(&source.to_string(), 200)
                )
            }
            Self::Cleanup { .. } => {
                "the track was delivered, but temporary files could not be removed".to_string()
            }
        }
    }
}
