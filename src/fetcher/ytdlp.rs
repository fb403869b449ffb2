use anyhow::Context;
use async_trait::async_trait;
use chrono::Duration;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{DownloadJob, FetchResult, MediaFetcher, YtDlpOptions};
use crate::Result;

/// Media fetcher shelling out to yt-dlp
///
/// Fetching is a two-step affair: a metadata-only probe first, so the output
/// filename can be derived from the title before anything is written, then
/// the actual download with an explicit output template.
pub struct YtDlpFetcher {
    options: YtDlpOptions,
}

/// Subset of the yt-dlp `--dump-json` output the bot cares about
#[derive(Debug, Deserialize)]
struct TrackProbe {
    id: String,
    title: String,
    duration: Option<f64>,
    #[serde(default)]
    filesize_approx: Option<u64>,
}

/// One line of `--flat-playlist --dump-json` output
#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: String,
}

impl YtDlpFetcher {
    pub fn new(options: YtDlpOptions) -> Self {
        Self { options }
    }

    /// Run yt-dlp with the given arguments, failing on a non-zero exit
    async fn run(&self, args: &[String]) -> Result<std::process::Output> {
        let output = Command::new(&self.options.binary)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.options.binary.display()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("yt-dlp failed: {}", error.trim());
        }

        Ok(output)
    }

    /// Get video metadata without downloading
    async fn probe(&self, url: &str) -> Result<TrackProbe> {
        tracing::debug!("Probing video metadata for: {}", url);

        let output = self.run(&self.options.probe_args(url)).await?;
        let json_str = String::from_utf8(output.stdout)
            .context("yt-dlp metadata output was not valid UTF-8")?;

        serde_json::from_str(&json_str).context("Failed to parse yt-dlp metadata JSON")
    }

    /// Locate the downloaded file inside the job directory
    ///
    /// The predicted path is tried first; postprocessors occasionally pick a
    /// different extension, so a directory scan is the fallback.
    fn locate_output(dir: &Path, stem: &str, extension: &str) -> Option<PathBuf> {
        let predicted = dir.join(format!("{stem}.{extension}"));
        if predicted.is_file() {
            return Some(predicted);
        }

        let mut fallback = None;
        for entry in std::fs::read_dir(dir).ok()?.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                return Some(path);
            }
            fallback.get_or_insert(path);
        }
        fallback
    }

    /// Turn flat-playlist JSON lines into watch URLs, preserving order
    fn parse_playlist_entries(stdout: &str) -> Vec<String> {
        stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<PlaylistEntry>(line) {
                Ok(entry) => Some(format!("https://youtube.com/watch?v={}", entry.id)),
                Err(e) => {
                    tracing::warn!("Skipping unparseable playlist entry: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn fetch(&self, job: DownloadJob, dest_dir: PathBuf) -> Result<FetchResult> {
        let probe = self.probe(&job.source_url).await?;
        tracing::debug!(
            job_id = %job.id,
            video_id = %probe.id,
            title = %probe.title,
            "downloading audio"
        );

        let stem = job.file_stem(&probe.title);
        let template = dest_dir.join(format!("{stem}.%(ext)s"));
        let args = self
            .options
            .download_args(&job.source_url, &template.to_string_lossy());

        self.run(&args).await?;

        let extension = self.options.audio_format.as_str();
        let local_path = Self::locate_output(&dest_dir, &stem, extension).ok_or_else(|| {
            anyhow::anyhow!(
                "yt-dlp reported success but no output file was found in {}",
                dest_dir.display()
            )
        })?;

        let file_size = fs_err::metadata(&local_path)
            .ok()
            .map(|metadata| metadata.len())
            .or(probe.filesize_approx);

        Ok(FetchResult {
            local_path,
            title: probe.title,
            duration: probe.duration.map(|secs| Duration::seconds(secs as i64)),
            file_size,
        })
    }

    async fn enumerate(&self, playlist_url: String) -> Result<Vec<String>> {
        tracing::debug!("Enumerating playlist: {}", playlist_url);

        let output = self
            .run(&self.options.enumerate_args(&playlist_url))
            .await
            .context("yt-dlp playlist enumeration failed")?;

        let stdout = String::from_utf8(output.stdout)
            .context("yt-dlp playlist output was not valid UTF-8")?;

        Ok(Self::parse_playlist_entries(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_probe() {
        let json = r#"{
            "id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "duration": 212.0,
            "uploader": "Rick Astley",
            "ext": "webm"
        }"#;
        let probe: TrackProbe = serde_json::from_str(json).unwrap();
        assert_eq!(probe.id, "dQw4w9WgXcQ");
        assert_eq!(probe.title, "Never Gonna Give You Up");
        assert_eq!(probe.duration, Some(212.0));
        assert_eq!(probe.filesize_approx, None);
    }

    #[test]
    fn test_parse_playlist_entries_preserves_order() {
        let stdout = concat!(
            r#"{"id": "aaaaaaaaaaa", "title": "first"}"#,
            "\n",
            r#"{"id": "bbbbbbbbbbb", "title": "second"}"#,
            "\n",
            r#"{"id": "ccccccccccc", "title": "third"}"#,
            "\n",
        );
        let urls = YtDlpFetcher::parse_playlist_entries(stdout);
        assert_eq!(
            urls,
            vec![
                "https://youtube.com/watch?v=aaaaaaaaaaa",
                "https://youtube.com/watch?v=bbbbbbbbbbb",
                "https://youtube.com/watch?v=ccccccccccc",
            ]
        );
    }

    #[test]
    fn test_parse_playlist_entries_skips_garbage_lines() {
        let stdout = "not json\n{\"id\": \"aaaaaaaaaaa\"}\n\n";
        let urls = YtDlpFetcher::parse_playlist_entries(stdout);
        assert_eq!(urls, vec!["https://youtube.com/watch?v=aaaaaaaaaaa"]);
    }

    #[test]
    fn test_locate_output_prefers_predicted_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01 - Song.mp3"), b"audio").unwrap();
        std::fs::write(dir.path().join("01 - Song.webp"), b"cover").unwrap();

        let found = YtDlpFetcher::locate_output(dir.path(), "01 - Song", "mp3").unwrap();
        assert_eq!(found, dir.path().join("01 - Song.mp3"));
    }

    #[test]
    fn test_locate_output_scans_for_renamed_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Song #1.mp3"), b"audio").unwrap();

        // Predicted stem differs from what the postprocessor wrote
        let found = YtDlpFetcher::locate_output(dir.path(), "Song _1", "mp3").unwrap();
        assert_eq!(found, dir.path().join("Song #1.mp3"));
    }

    #[test]
    fn test_locate_output_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(YtDlpFetcher::locate_output(dir.path(), "nothing", "mp3").is_none());
    }
}
