use anyhow::Context;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};

use crate::fetcher::FetchResult;
use crate::utils;
use crate::Result;

/// Trait for delivering fetched audio and status text to a chat
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Upload a staged audio file to the chat as an audio attachment.
    /// Resolves only once the transport has acknowledged the upload.
    async fn deliver(&self, chat_id: i64, audio: FetchResult) -> Result<()>;

    /// Send a plain status message to the chat
    async fn notify(&self, chat_id: i64, text: String) -> Result<()>;
}

/// Delivery sink backed by the Telegram Bot API
pub struct TelegramSink {
    bot: Bot,
    max_upload_bytes: u64,
}

impl TelegramSink {
    pub fn new(bot: Bot, max_upload_bytes: u64) -> Self {
        Self {
            bot,
            max_upload_bytes,
        }
    }

    /// Filename shown in the chat client
    fn attachment_name(audio: &FetchResult) -> String {
        audio
            .local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.mp3", utils::sanitize_filename(&audio.title)))
    }
}

#[async_trait]
impl DeliverySink for TelegramSink {
    async fn deliver(&self, chat_id: i64, audio: FetchResult) -> Result<()> {
        // The Bot API rejects oversized uploads only after the whole file
        // has been transferred; checking up front turns that into a fast,
        // explainable failure.
        if let Some(size) = audio.file_size {
            if size > self.max_upload_bytes {
                anyhow::bail!(
                    "file is {}, which exceeds the {} Telegram upload limit",
                    utils::format_file_size(size),
                    utils::format_file_size(self.max_upload_bytes)
                );
            }
        }

        let input = InputFile::file(audio.local_path.clone())
            .file_name(Self::attachment_name(&audio));

        self.bot
            .send_audio(ChatId(chat_id), input)
            .title(audio.title.clone())
            .await
            .with_context(|| format!("Telegram upload failed for \"{}\"", audio.title))?;

        let size = audio
            .file_size
            .map_or_else(|| "unknown".to_string(), utils::format_file_size);
        let duration = audio.duration.map_or_else(
            || "unknown".to_string(),
            |d| utils::format_duration(d.num_seconds() as f64),
        );
        tracing::info!(
            chat_id,
            title = %audio.title,
            size = %size,
            duration = %duration,
            "upload acknowledged"
        );
        Ok(())
    }

    async fn notify(&self, chat_id: i64, text: String) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .context("Telegram message send failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_audio(file_size: Option<u64>) -> FetchResult {
        FetchResult {
            local_path: PathBuf::from("/tmp/staging/01 - Song.mp3"),
            title: "Song".to_string(),
            duration: Some(chrono::Duration::seconds(212)),
            file_size,
        }
    }

    #[test]
    fn test_attachment_name_uses_staged_filename() {
        let audio = sample_audio(None);
        assert_eq!(TelegramSink::attachment_name(&audio), "01 - Song.mp3");
    }

    #[test]
    fn test_attachment_name_falls_back_to_title() {
        let mut audio = sample_audio(None);
        audio.local_path = PathBuf::from("/");
        assert_eq!(TelegramSink::attachment_name(&audio), "Song.mp3");
    }

    #[tokio::test]
    async fn test_oversized_file_is_rejected_before_upload() {
        let sink = TelegramSink::new(Bot::new("123:TEST"), 50 * 1024 * 1024);
        let audio = sample_audio(Some(60 * 1024 * 1024));

        let err = sink.deliver(42, audio).await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }
}
