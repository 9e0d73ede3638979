use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
pub struct Args {
    #[clap(long, default_value = "AmItheAsshole")]
    pub subreddit: String,

    #[clap(long, default_value_t = 25)]
    pub fetch_limit: usize,

    #[clap(long, default_value = "video/pending")]
    pub pending_dir: PathBuf,

    #[clap(long, default_value = "video/published")]
    pub archive_dir: PathBuf,

    #[clap(long, default_value = "audio/text-to-speech")]
    pub audio_dir: PathBuf,

    #[clap(long, default_value = "video/pending/processedPosts.txt")]
    pub history_file: PathBuf,

    #[clap(long, default_value = "private/token.json")]
    pub credential_file: PathBuf,

    #[clap(long, default_value = "screenshot.py")]
    pub screenshot_script: PathBuf,

    #[clap(long, default_value = "screenshot.png")]
    pub snapshot_file: PathBuf,

    #[clap(long, default_value = "sub.py")]
    pub transcribe_script: PathBuf,
}
