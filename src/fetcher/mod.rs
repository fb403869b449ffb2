use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

pub mod ytdlp;

pub use ytdlp::YtDlpFetcher;

use crate::config::FetcherConfig;
use crate::utils;
use crate::Result;

/// One unit of work: a single source video to fetch and deliver
///
/// Immutable once created, consumed exactly once. The `id` keeps staging
/// paths collision-proof even when two chats download identically titled
/// tracks at the same time.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Unique job identifier, used for staging paths and log correlation
    pub id: Uuid,

    /// Source video URL
    pub source_url: String,

    /// 1-based playlist position; used only as a filename prefix
    pub sequence_index: Option<u32>,
}

impl DownloadJob {
    pub fn new(source_url: impl Into<String>, sequence_index: Option<u32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_url: source_url.into(),
            sequence_index,
        }
    }

    /// File stem for the downloaded track: the sanitized title, prefixed
    /// with a zero-padded ordinal when the job came out of a playlist.
    pub fn file_stem(&self, title: &str) -> String {
        let title = utils::sanitize_filename(title);
        let title = if title.is_empty() {
            "track".to_string()
        } else {
            title
        };

        match self.sequence_index {
            Some(index) => format!("{index:02} - {title}"),
            None => title,
        }
    }
}

/// A fetched, transcoded audio file with its metadata
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Local path of the staged audio file
    pub local_path: PathBuf,

    /// Track title from the source metadata
    pub title: String,

    /// Duration if the source reported one
    pub duration: Option<Duration>,

    /// Size of the staged file in bytes
    pub file_size: Option<u64>,
}

/// Target audio container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Mp3,
    M4a,
    Opus,
    Flac,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Opus => "opus",
            AudioFormat::Flac => "flac",
        }
    }
}

/// Explicit record of every yt-dlp option the bot passes
///
/// Every recognized option and its effect lives here, so the fetcher
/// invocation is statically checkable instead of an ad-hoc argument soup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YtDlpOptions {
    /// Path to the yt-dlp binary
    pub binary: PathBuf,

    /// Format selector for the initial download (`--format`)
    pub format_selector: String,

    /// Target audio container (`--audio-format`)
    pub audio_format: AudioFormat,

    /// Target bitrate for the audio postprocessor (`--audio-quality`)
    pub audio_quality: String,

    /// Embed the video thumbnail as cover art (`--embed-thumbnail`)
    pub embed_thumbnail: bool,

    /// Write title/artist tags into the output file (`--add-metadata`)
    pub embed_metadata: bool,

    /// Network timeout for each connection, in seconds (`--socket-timeout`)
    pub socket_timeout_secs: u64,
}

impl Default for YtDlpOptions {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            format_selector: "bestaudio/best".to_string(),
            audio_format: AudioFormat::Mp3,
            audio_quality: "192K".to_string(),
            embed_thumbnail: true,
            embed_metadata: true,
            socket_timeout_secs: 30,
        }
    }
}

impl YtDlpOptions {
    /// Build options from the fetcher section of the bot configuration
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            binary: config.yt_dlp_path.clone(),
            audio_quality: config.audio_quality.clone(),
            embed_thumbnail: config.embed_thumbnail,
            embed_metadata: config.embed_metadata,
            ..Self::default()
        }
    }

    /// Arguments for a metadata-only probe of a single video
    pub fn probe_args(&self, url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            url.to_string(),
        ]
    }

    /// Arguments for downloading and transcoding a single video's audio
    pub fn download_args(&self, url: &str, output_template: &str) -> Vec<String> {
        let mut args = vec![
            "--format".to_string(),
            self.format_selector.clone(),
            "--extract-audio".to_string(),
            "--audio-format".to_string(),
            self.audio_format.as_str().to_string(),
            "--audio-quality".to_string(),
            self.audio_quality.clone(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
        ];

        if self.embed_thumbnail {
            args.push("--embed-thumbnail".to_string());
        }
        if self.embed_metadata {
            args.push("--add-metadata".to_string());
        }

        args.push("--output".to_string());
        args.push(output_template.to_string());
        args.push(url.to_string());

        args
    }

    /// Arguments for flat playlist enumeration (no downloads)
    pub fn enumerate_args(&self, playlist_url: &str) -> Vec<String> {
        vec![
            "--flat-playlist".to_string(),
            "--dump-json".to_string(),
            "--socket-timeout".to_string(),
            self.socket_timeout_secs.to_string(),
            playlist_url.to_string(),
        ]
    }
}

/// Trait for fetching remote media as local audio files
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download a single video's audio into `dest_dir` and return the
    /// staged file with its metadata
    async fn fetch(&self, job: DownloadJob, dest_dir: PathBuf) -> Result<FetchResult>;

    /// Resolve a playlist URL into its member video URLs, in source order
    async fn enumerate(&self, playlist_url: String) -> Result<Vec<String>>;
}

/// Validate that a source URL is well-formed http(s)
pub fn validate_source_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url)
        .map_err(|_| anyhow::anyhow!("Invalid URL format: {}", url))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("URL must use HTTP or HTTPS protocol");
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_file_stem_without_index() {
        let job = DownloadJob::new("https://youtube.com/watch?v=abc", None);
        assert_eq!(job.file_stem("Some Song"), "Some Song");
    }

    #[test]
    fn test_file_stem_with_index_is_zero_padded() {
        let job = DownloadJob::new("https://youtube.com/watch?v=abc", Some(7));
        assert_eq!(job.file_stem("Some Song"), "07 - Some Song");
    }

    #[test]
    fn test_file_stem_sanitizes_title() {
        let job = DownloadJob::new("https://youtube.com/watch?v=abc", None);
        assert_eq!(job.file_stem("a/b: c?"), "a_b_ c_");
    }

    #[test]
    fn test_file_stem_falls_back_for_empty_title() {
        let job = DownloadJob::new("https://youtube.com/watch?v=abc", Some(3));
        assert_eq!(job.file_stem("///"), "03 - track");
    }

    #[test]
    fn test_file_stems_are_distinct_across_playlist() {
        // Same title for every item; the ordinal prefix must keep the
        // stems pairwise distinct.
        let stems: HashSet<String> = (1..=100)
            .map(|index| {
                DownloadJob::new("https://youtube.com/watch?v=abc", Some(index))
                    .file_stem("Same Title")
            })
            .collect();
        assert_eq!(stems.len(), 100);
    }

    #[test]
    fn test_validate_source_url() {
        assert!(validate_source_url("https://youtube.com/watch?v=abc").is_ok());
        assert!(validate_source_url("http://youtu.be/abc").is_ok());
        assert!(validate_source_url("ftp://example.com/file").is_err());
        assert!(validate_source_url("not-a-url").is_err());
    }

    #[test]
    fn test_download_args_cover_the_postprocessing_chain() {
        let options = YtDlpOptions::default();
        let args = options.download_args("https://youtube.com/watch?v=abc", "/tmp/x.%(ext)s");

        let expect_pair = |flag: &str, value: &str| {
            let pos = args.iter().position(|a| a == flag).unwrap();
            assert_eq!(args[pos + 1], value, "value for {flag}");
        };
        expect_pair("--format", "bestaudio/best");
        expect_pair("--audio-format", "mp3");
        expect_pair("--audio-quality", "192K");
        expect_pair("--output", "/tmp/x.%(ext)s");
        assert!(args.contains(&"--extract-audio".to_string()));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        assert!(args.contains(&"--add-metadata".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtube.com/watch?v=abc");
    }

    #[test]
    fn test_download_args_respect_embed_toggles() {
        let options = YtDlpOptions {
            embed_thumbnail: false,
            embed_metadata: false,
            ..YtDlpOptions::default()
        };
        let args = options.download_args("https://youtube.com/watch?v=abc", "/tmp/x.%(ext)s");
        assert!(!args.contains(&"--embed-thumbnail".to_string()));
        assert!(!args.contains(&"--add-metadata".to_string()));
    }

    #[test]
    fn test_enumerate_args_never_download() {
        let options = YtDlpOptions::default();
        let args = options.enumerate_args("https://youtube.com/playlist?list=PL123");
        assert!(args.contains(&"--flat-playlist".to_string()));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert_eq!(args.last().unwrap(), "https://youtube.com/playlist?list=PL123");
    }
}
