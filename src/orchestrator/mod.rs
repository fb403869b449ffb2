//! Download-and-deliver orchestration core
//!
//! Sequences fetch -> deliver -> cleanup for a single item, and drives
//! playlist expansion into an ordered run of single-item jobs with spacing
//! between them. Strictly one item at a time: a later playlist item is
//! never started before the previous one has completed or failed.

use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::delivery::DeliverySink;
use crate::fetcher::{validate_source_url, DownloadJob, MediaFetcher};
use crate::DeliveryError;

/// Outcome of a playlist run
#[derive(Debug)]
pub struct PlaylistSummary {
    /// Number of items the playlist resolved to
    pub total: usize,

    /// Items delivered successfully
    pub delivered: usize,

    /// Items that failed, in playlist order
    pub failed: Vec<FailedItem>,
}

impl PlaylistSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// A playlist item that could not be delivered
#[derive(Debug)]
pub struct FailedItem {
    /// 1-based playlist position
    pub index: u32,

    /// Item URL as enumerated from the playlist
    pub url: String,

    /// What went wrong
    pub error: DeliveryError,
}

/// Orchestration core: converts one chat request into one or more completed
/// deliveries, with deterministic ordering and staged-file cleanup
///
/// Collaborators are injected, so the core runs against mocks in tests and
/// against yt-dlp plus Telegram in production.
pub struct Orchestrator<F, S> {
    fetcher: F,
    sink: S,
    staging_dir: PathBuf,
    item_delay: Duration,
}

impl<F, S> Orchestrator<F, S>
where
    F: MediaFetcher,
    S: DeliverySink,
{
    pub fn new(fetcher: F, sink: S, staging_dir: PathBuf, item_delay: Duration) -> Self {
        Self {
            fetcher,
            sink,
            staging_dir,
            item_delay,
        }
    }

    /// Fetch a single video's audio and deliver it to the chat
    ///
    /// The job gets its own working directory under the staging root; that
    /// directory is removed exactly once, after the delivery attempt has
    /// completed, never before. One attempt per job, no retries.
    pub async fn deliver_single(
        &self,
        chat_id: i64,
        source_url: &str,
        sequence_index: Option<u32>,
    ) -> Result<(), DeliveryError> {
        // The router only forwards URLs its patterns matched; this guard is
        // the fail-fast path for anything else.
        validate_source_url(source_url)
            .map_err(|_| DeliveryError::InvalidUrl(source_url.to_string()))?;

        let job = DownloadJob::new(source_url, sequence_index);
        let workdir = tempfile::Builder::new()
            .prefix(&format!("job-{}-", job.id))
            .tempdir_in(&self.staging_dir)
            .map_err(|e| DeliveryError::Fetch {
                url: job.source_url.clone(),
                source: e.into(),
            })?;

        debug!(job_id = %job.id, url = %job.source_url, "fetching");
        let audio = match self
            .fetcher
            .fetch(job.clone(), workdir.path().to_path_buf())
            .await
        {
            Ok(audio) => audio,
            Err(source) => {
                // Partial download artifacts go with the working directory.
                Self::cleanup(workdir);
                return Err(DeliveryError::Fetch {
                    url: job.source_url,
                    source,
                });
            }
        };

        debug!(job_id = %job.id, title = %audio.title, "delivering");
        let delivered = self.sink.deliver(chat_id, audio.clone()).await;

        Self::cleanup(workdir);

        match delivered {
            Ok(()) => {
                info!(job_id = %job.id, chat_id, title = %audio.title, "delivered");
                Ok(())
            }
            Err(source) => Err(DeliveryError::Delivery {
                chat_id,
                title: audio.title,
                source,
            }),
        }
    }

    /// Expand a playlist and deliver every item, in source order
    ///
    /// A failed item is reported to the chat and recorded in the summary;
    /// the remaining items are still attempted. Only a failure to enumerate
    /// the playlist itself aborts the run.
    pub async fn deliver_playlist(
        &self,
        chat_id: i64,
        playlist_url: &str,
    ) -> Result<PlaylistSummary, DeliveryError> {
        let items = self
            .fetcher
            .enumerate(playlist_url.to_string())
            .await
            .map_err(|source| DeliveryError::Fetch {
                url: playlist_url.to_string(),
                source,
            })?;

        info!(chat_id, total = items.len(), "expanding playlist");

        let mut summary = PlaylistSummary {
            total: items.len(),
            delivered: 0,
            failed: Vec::new(),
        };

        for (position, item_url) in items.iter().enumerate() {
            if position > 0 {
                // Spacing between items keeps the extraction backend's
                // implicit rate limits at bay.
                sleep(self.item_delay).await;
            }

            let index = position as u32 + 1;
            match self.deliver_single(chat_id, item_url, Some(index)).await {
                Ok(()) => summary.delivered += 1,
                Err(error) => {
                    warn!(
                        chat_id,
                        index,
                        url = %item_url,
                        error = %error,
                        "playlist item failed; continuing"
                    );

                    let notice = format!(
                        "Track {index} of {}: {}",
                        summary.total,
                        error.user_message()
                    );
                    if let Err(notify_error) = self.sink.notify(chat_id, notice).await {
                        warn!(chat_id, error = %notify_error, "failure notice could not be sent");
                    }

                    summary.failed.push(FailedItem {
                        index,
                        url: item_url.clone(),
                        error,
                    });
                }
            }
        }

        Ok(summary)
    }

    /// Remove a job's working directory and everything staged inside it
    ///
    /// A cleanup failure never changes the job outcome; the delivery already
    /// succeeded or failed on its own terms.
    fn cleanup(workdir: TempDir) {
        let path = workdir.path().to_path_buf();
        if let Err(source) = workdir.close() {
            let error = DeliveryError::Cleanup { path, source };
            warn!(error = %error, "staged files were not removed");
        }
    }
}
