use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the environment variable holding the Telegram bot token.
pub const API_TOKEN_VAR: &str = "API_TOKEN";

/// Bot configuration
///
/// Values are layered: built-in defaults, then an optional YAML file, then
/// environment variables. The bot token never lives in the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Telegram bot token, taken from the `API_TOKEN` environment variable
    #[serde(skip)]
    pub api_token: String,

    /// yt-dlp fetcher settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Staging and delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Path to the yt-dlp binary
    pub yt_dlp_path: PathBuf,

    /// Target bitrate for the extracted MP3 (yt-dlp `--audio-quality`)
    pub audio_quality: String,

    /// Embed the video thumbnail as cover art
    pub embed_thumbnail: bool,

    /// Embed title/artist tags into the output file
    pub embed_metadata: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: PathBuf::from("yt-dlp"),
            audio_quality: "192K".to_string(),
            embed_thumbnail: true,
            embed_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory holding downloaded files between fetch and upload
    pub staging_dir: PathBuf,

    /// Minimum pause between successive playlist items, in seconds
    pub item_delay_secs: u64,

    /// Upper bound the Bot API accepts for uploads, in bytes
    pub max_upload_bytes: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("downloads"),
            item_delay_secs: 1,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl DeliveryConfig {
    /// Inter-item pause as a [`Duration`]
    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            fetcher: FetcherConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file (if present), then the environment
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let mut config = if path.exists() {
            let content = fs_err::read_to_string(&path)
                .context("Failed to read config file")?;

            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("audiogram").join("config.yaml"))
    }

    /// Apply environment-style overrides on top of file/default values
    fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = get(API_TOKEN_VAR) {
            self.api_token = token;
        }
        if let Some(path) = get("YTDLP_PATH") {
            self.fetcher.yt_dlp_path = PathBuf::from(path);
        }
        if let Some(quality) = get("AUDIO_QUALITY") {
            self.fetcher.audio_quality = quality;
        }
        if let Some(dir) = get("STAGING_DIR") {
            self.delivery.staging_dir = PathBuf::from(dir);
        }
        if let Some(delay) = get("ITEM_DELAY_SECS").and_then(|s| s.parse().ok()) {
            self.delivery.item_delay_secs = delay;
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_token.is_empty() {
            anyhow::bail!(
                "{API_TOKEN_VAR} environment variable is not set; \
                 the bot cannot start without a Telegram token"
            );
        }

        if self.delivery.item_delay_secs == 0 {
            anyhow::bail!("delivery.item_delay_secs must be at least 1");
        }

        Ok(())
    }

    /// Log the effective configuration (token excluded)
    pub fn display(&self) {
        tracing::info!("yt-dlp binary: {}", self.fetcher.yt_dlp_path.display());
        tracing::info!("Audio quality: {}", self.fetcher.audio_quality);
        tracing::info!("Staging dir: {}", self.delivery.staging_dir.display());
        tracing::info!("Playlist item delay: {}s", self.delivery.item_delay_secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.fetcher.yt_dlp_path, PathBuf::from("yt-dlp"));
        assert_eq!(config.fetcher.audio_quality, "192K");
        assert_eq!(config.delivery.staging_dir, PathBuf::from("downloads"));
        assert_eq!(config.delivery.item_delay(), Duration::from_secs(1));
        assert_eq!(config.delivery.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn test_parse_yaml_sections() {
        let yaml = r#"
fetcher:
  yt_dlp_path: /usr/local/bin/yt-dlp
  audio_quality: 320K
  embed_thumbnail: false
  embed_metadata: true
delivery:
  staging_dir: /tmp/audiogram
  item_delay_secs: 3
  max_upload_bytes: 1048576
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.fetcher.audio_quality, "320K");
        assert!(!config.fetcher.embed_thumbnail);
        assert_eq!(config.delivery.item_delay_secs, 3);
        assert_eq!(config.delivery.staging_dir, PathBuf::from("/tmp/audiogram"));
    }

    #[test]
    fn test_overrides_take_precedence() {
        let mut env = HashMap::new();
        env.insert(API_TOKEN_VAR, "123:abc".to_string());
        env.insert("STAGING_DIR", "/var/cache/audiogram".to_string());
        env.insert("ITEM_DELAY_SECS", "5".to_string());

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).cloned());

        assert_eq!(config.api_token, "123:abc");
        assert_eq!(config.delivery.staging_dir, PathBuf::from("/var/cache/audiogram"));
        assert_eq!(config.delivery.item_delay_secs, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_token_is_rejected() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains(API_TOKEN_VAR));
    }

    #[test]
    fn test_zero_item_delay_is_rejected() {
        let mut config = Config::default();
        config.api_token = "123:abc".to_string();
        config.delivery.item_delay_secs = 0;
        assert!(config.validate().is_err());
    }
}
