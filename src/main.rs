use std::fs;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};

mod args;
mod auth;
mod config;
mod dedup;
mod error;
mod parts;
mod pipeline;
mod reddit;
mod snapshot;
mod subtitle;
mod tts;
mod upload;

use args::Args;
use auth::{AuthBroker, CredentialFile, OAuthConfig};
use config::Config;
use dedup::{DedupStore, HistoryFile};
use error::Error;
use pipeline::Coordinator;
use snapshot::CommandSnapshotter;
use subtitle::WhisperTranscriber;
use tts::AzureSpeech;
use upload::{Uploader, YouTubePublisher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info") // set to "debug" for more logs
        .init();

    let args = Args::parse();
    let config = Config::from_env().context("loading configuration")?;

    fs::create_dir_all(&args.pending_dir)?;
    fs::create_dir_all(&args.archive_dir)?;
    fs::create_dir_all(&args.audio_dir)?;

    let http = reqwest::Client::new();

    info!(
        "Fetching up to {} candidate posts from r/{}",
        args.fetch_limit, args.subreddit
    );
    let candidates = reddit::fetch_candidates(&http, &args.subreddit, args.fetch_limit).await?;
    info!("Fetched {} usable candidates", candidates.len());

    let dedup = DedupStore::new(HistoryFile::new(&args.history_file));
    let coordinator = Coordinator::new(
        AzureSpeech::new(http.clone(), &config.speech_region, &config.speech_key),
        CommandSnapshotter::new(&args.screenshot_script, &args.snapshot_file),
        WhisperTranscriber::new(&args.transcribe_script),
        args.audio_dir.clone(),
    );

    let ready = match coordinator.process_one(&dedup, candidates).await {
        Ok(ready) => ready,
        Err(Error::Exhausted) => {
            info!("Every fetched post was already processed today; nothing to do");
            return Ok(());
        }
        Err(e) => return Err(e).context("preparing a post"),
    };

    let broker = AuthBroker::new(
        http.clone(),
        OAuthConfig {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            scope: config.scope.clone(),
            redirect_port: config.redirect_port,
            consent_timeout: Duration::from_secs(config.consent_timeout_secs),
        },
        Box::new(CredentialFile::new(&args.credential_file)),
    );
    let uploader = Uploader::new(
        broker,
        YouTubePublisher::new(&config.upload_url),
        args.pending_dir.clone(),
        args.archive_dir.clone(),
        config.interval_hours,
    );

    match uploader.publish(&ready).await {
        Ok(published) if !published.is_empty() => {
            dedup
                .record(&ready.post.id)
                .context("recording the processed post")?;
            info!(
                "Published {} part(s) for post {}: {}",
                published.len(),
                ready.post.id,
                published.join(", ")
            );
        }
        Ok(_) => {
            warn!(
                "No parts made it up for post {}; leaving it unrecorded so the next run retries",
                ready.post.id
            );
        }
        Err(Error::NoParts(id)) => {
            error!("No pending video parts found for post {id}; was the renderer run?");
        }
        Err(e) => return Err(e).context("publishing"),
    }

    info!("Run complete.");
    Ok(())
}
