use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "audiogram",
    about = "Audiogram - Telegram bot that turns YouTube links into tagged MP3 files",
    version,
    long_about = "A Telegram bot that accepts YouTube video and playlist URLs, extracts the \
audio with yt-dlp, transcodes it to MP3 with embedded cover art and tags, and sends the \
result back to the requesting chat."
)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to a .env file with the bot credentials
    #[arg(long, value_name = "FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Path to the YAML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the staging directory for downloaded files
    #[arg(long, value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,
}
