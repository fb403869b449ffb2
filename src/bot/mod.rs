//! Request router: classifies inbound chat messages and drives the
//! orchestration core
//!
//! Telegram updates are handled per-chat sequentially (teloxide's default
//! distribution), so one chat's playlist never interleaves with itself while
//! separate chats still proceed concurrently.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::delivery::TelegramSink;
use crate::fetcher::YtDlpFetcher;
use crate::orchestrator::Orchestrator;

/// The orchestrator variant the bot runs in production
pub type BotCore = Orchestrator<YtDlpFetcher, TelegramSink>;

type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

static PLAYLIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/playlist\?list=[A-Za-z0-9_-]+")
        .expect("playlist pattern compiles")
});

static VIDEO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?youtube\.com/watch\?v=[A-Za-z0-9_-]{11}|(?:https?://)?youtu\.be/[A-Za-z0-9_-]{11}",
    )
    .expect("video pattern compiles")
});

/// A classified chat request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// A single video URL
    Video(String),

    /// A playlist URL to expand
    Playlist(String),
}

/// Classify message text into a request, or `None` for anything that is
/// neither a video nor a playlist URL
///
/// Playlists are checked first; the extracted URL is canonicalized so the
/// core and yt-dlp always see an explicit scheme.
pub fn classify(text: &str) -> Option<Request> {
    if let Some(matched) = PLAYLIST_RE.find(text) {
        return Some(Request::Playlist(canonicalize(matched.as_str())));
    }
    if let Some(matched) = VIDEO_RE.find(text) {
        return Some(Request::Video(canonicalize(matched.as_str())));
    }
    None
}

/// Prefix a scheme when the user pasted a bare youtube.com/... link
fn canonicalize(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    /// Show the welcome message
    Start,
}

/// Run the long-polling dispatcher until the process is stopped
pub async fn run(bot: Bot, core: Arc<BotCore>) {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(
            dptree::filter_map(|msg: Message| msg.text().and_then(classify))
                .endpoint(on_request),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![core])
        .default_handler(|update| async move {
            tracing::trace!(update_id = update.id, "ignoring unrecognized update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn on_command(bot: Bot, msg: Message, command: Command) -> HandlerResult {
    match command {
        Command::Start => {
            bot.send_message(
                msg.chat.id,
                "Send me a YouTube video or playlist URL, and I'll download \
                 the audio tracks for you!",
            )
            .await?;
        }
    }
    Ok(())
}

async fn on_request(
    bot: Bot,
    msg: Message,
    request: Request,
    core: Arc<BotCore>,
) -> HandlerResult {
    let chat_id = msg.chat.id;

    match request {
        Request::Video(url) => {
            info!(chat_id = chat_id.0, url = %url, "video request");
            bot.send_message(
                chat_id,
                "Downloading and converting audio. This may take a while...",
            )
            .await?;

            if let Err(error) = core.deliver_single(chat_id.0, &url, None).await {
                error!(chat_id = chat_id.0, error = %error, "video delivery failed");
                bot.send_message(chat_id, format!("Sorry - {}", error.user_message()))
                    .await?;
            }
        }
        Request::Playlist(url) => {
            info!(chat_id = chat_id.0, url = %url, "playlist request");
            bot.send_message(
                chat_id,
                "Downloading and converting playlist. This may take a while...",
            )
            .await?;

            match core.deliver_playlist(chat_id.0, &url).await {
                Ok(summary) if summary.total == 0 => {
                    bot.send_message(chat_id, "That playlist appears to be empty.")
                        .await?;
                }
                Ok(summary) if summary.is_complete() => {
                    bot.send_message(
                        chat_id,
                        format!("Done - delivered all {} tracks.", summary.total),
                    )
                    .await?;
                }
                Ok(summary) => {
                    bot.send_message(
                        chat_id,
                        format!(
                            "Done - delivered {} of {} tracks.",
                            summary.delivered, summary.total
                        ),
                    )
                    .await?;
                }
                Err(error) => {
                    error!(chat_id = chat_id.0, error = %error, "playlist delivery failed");
                    bot.send_message(chat_id, format!("Sorry - {}", error.user_message()))
                        .await?;
                }
            }
        }
    }

    Ok(())
}
