use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

/// One transcribed span as emitted by the transcription tool, times in
/// seconds from the start of the audio.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A numbered subtitle with resolved timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("failed to run transcription tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("transcription tool exited with {0}")]
    Failed(ExitStatus),

    #[error("unreadable transcription output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Speech-to-text collaborator turning narration audio into timed segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>, TranscribeError>;
}

/// Runs the Whisper wrapper script, which prints its segments as JSON on
/// stdout.
pub struct WhisperTranscriber {
    script: PathBuf,
}

impl WhisperTranscriber {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self { script: script.into() }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<Vec<Segment>, TranscribeError> {
        let output = Command::new("python3")
            .arg(&self.script)
            .arg(audio)
            .output()
            .await?;

        if !output.status.success() {
            return Err(TranscribeError::Failed(output.status));
        }
        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

pub fn to_entries(segments: &[Segment]) -> Vec<SubtitleEntry> {
    segments
        .iter()
        .enumerate()
        .map(|(i, segment)| SubtitleEntry {
            index: i + 1,
            start: Duration::from_secs_f64(segment.start.max(0.0)),
            end: Duration::from_secs_f64(segment.end.max(0.0)),
            text: segment.text.trim().to_string(),
        })
        .collect()
}

pub fn write_subtitles(path: &Path, entries: &[SubtitleEntry]) -> io::Result<()> {
    let mut f = File::create(path)?;
    for entry in entries {
        writeln!(f, "{}", entry.index)?;
        writeln!(
            f,
            "{} --> {}",
            format_timestamp(entry.start),
            format_timestamp(entry.end)
        )?;
        writeln!(f, "{}", entry.text)?;
        writeln!(f)?;
    }
    Ok(())
}

fn format_timestamp(d: Duration) -> String {
    let s = d.as_secs();
    let ms = d.subsec_millis();
    format!("{s:02},{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_parse_from_tool_output() {
        let json = r#"[{"start":0.0,"end":1.5,"text":" Hello there."},{"start":1.5,"end":2.25,"text":"Bye."}]"#;
        let segments: Vec<Segment> = serde_json::from_str(json).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].start, 1.5);
    }

    #[test]
    fn entries_are_numbered_from_one_and_trimmed() {
        let segments = vec![
            Segment { start: 0.0, end: 1.5, text: " Hello there. ".to_string() },
            Segment { start: 1.5, end: 2.25, text: "Bye.".to_string() },
        ];
        let entries = to_entries(&segments);
        assert_eq!(entries[0].index, 1);
        assert_eq!(entries[0].text, "Hello there.");
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].start, Duration::from_millis(1500));
    }

    #[test]
    fn timestamps_use_seconds_comma_millis() {
        assert_eq!(format_timestamp(Duration::from_millis(1500)), "01,500");
        assert_eq!(format_timestamp(Duration::from_millis(90040)), "90,040");
    }

    #[test]
    fn subtitle_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subtitles.txt");
        let entries = to_entries(&[Segment {
            start: 0.0,
            end: 0.4,
            text: "Am I the asshole?".to_string(),
        }]);
        write_subtitles(&path, &entries).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "1\n00,000 --> 00,400\nAm I the asshole?\n\n");
    }
}
