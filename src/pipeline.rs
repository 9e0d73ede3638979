use std::path::{Path, PathBuf};

use rand::Rng;
use tracing::{error, info, warn};

use crate::dedup::{DedupStore, HistoryStore};
use crate::error::Error;
use crate::reddit::SourceItem;
use crate::snapshot::Snapshotter;
use crate::subtitle::{self, Transcriber};
use crate::tts::Synthesizer;

/// A post that has been through narration and both side-tasks and is ready
/// for the uploader. Side-task outputs are per-task: a failed snapshot does
/// not take the subtitles with it.
#[derive(Debug)]
pub struct ReadyItem {
    pub post: SourceItem,
    pub title_audio: Option<PathBuf>,
    pub body_audio: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub subtitles: Option<PathBuf>,
}

/// Drives one post from candidate selection to publish-ready.
pub struct Coordinator<Sy, Sn, Tr> {
    tts: Sy,
    snapshotter: Sn,
    transcriber: Tr,
    audio_dir: PathBuf,
}

impl<Sy, Sn, Tr> Coordinator<Sy, Sn, Tr>
where
    Sy: Synthesizer,
    Sn: Snapshotter,
    Tr: Transcriber,
{
    pub fn new(tts: Sy, snapshotter: Sn, transcriber: Tr, audio_dir: PathBuf) -> Self {
        Self {
            tts,
            snapshotter,
            transcriber,
            audio_dir,
        }
    }

    /// Selects one unseen candidate and prepares it for upload.
    ///
    /// Selection is a uniform-random pick among the unseen set rather than
    /// the listing's top entry, so reruns during the day spread across
    /// posts. Narration failures are logged and the post still proceeds;
    /// the two side-tasks run concurrently and both always run to
    /// completion even when one fails.
    pub async fn process_one<H: HistoryStore>(
        &self,
        dedup: &DedupStore<H>,
        candidates: Vec<SourceItem>,
    ) -> Result<ReadyItem, Error> {
        let mut unseen = dedup.unseen(candidates)?;
        let pick = rand::thread_rng().gen_range(0..unseen.len());
        let mut post = unseen.swap_remove(pick);

        post.title = normalize_title(&post.title);
        info!("Selected post: {}", post.title);

        let body_audio = self.synthesize_to_file(&post.body, "post_body").await;
        let title_audio = self.synthesize_to_file(&post.title, "post_title").await;

        let (snapshot, subtitles) = tokio::join!(
            self.capture_snapshot(&post.url),
            self.build_subtitles(body_audio.as_deref()),
        );

        Ok(ReadyItem {
            post,
            title_audio,
            body_audio,
            snapshot,
            subtitles,
        })
    }

    async fn synthesize_to_file(&self, text: &str, name: &str) -> Option<PathBuf> {
        let audio = match self.tts.synthesize(text).await {
            Ok(audio) => audio,
            Err(e) => {
                error!("Speech synthesis for {name} failed: {e}");
                return None;
            }
        };
        let path = self.audio_dir.join(format!("{name}.mp3"));
        match std::fs::write(&path, &audio) {
            Ok(()) => {
                info!("Saved audio to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Failed to save audio file {}: {e}", path.display());
                None
            }
        }
    }

    async fn capture_snapshot(&self, url: &str) -> Option<PathBuf> {
        info!("Grabbing post snapshot....");
        match self.snapshotter.capture(url).await {
            Ok(path) => {
                info!("Got post snapshot!");
                Some(path)
            }
            Err(e) => {
                error!("Snapshot capture failed: {e}");
                None
            }
        }
    }

    async fn build_subtitles(&self, body_audio: Option<&Path>) -> Option<PathBuf> {
        let audio = match body_audio {
            Some(audio) => audio,
            None => {
                warn!("No narration audio, skipping transcription");
                return None;
            }
        };

        info!("Creating subtitles....");
        let segments = match self.transcriber.transcribe(audio).await {
            Ok(segments) => segments,
            Err(e) => {
                error!("Error transcribing audio: {e}");
                return None;
            }
        };

        let entries = subtitle::to_entries(&segments);
        let path = self.audio_dir.join("subtitles.txt");
        match subtitle::write_subtitles(&path, &entries) {
            Ok(()) => {
                info!("Subtitles written to {}", path.display());
                Some(path)
            }
            Err(e) => {
                error!("Error saving subtitles: {e}");
                None
            }
        }
    }
}

/// Expands the community shorthand in a title so the narration reads it out
/// in full. Applying it twice is a no-op: the expanded title no longer
/// carries the shorthand prefix.
pub fn normalize_title(title: &str) -> String {
    match title.strip_prefix("AITA") {
        Some(rest) => format!("Am I the asshole{rest}"),
        None => title.to_string(),
    }
}
