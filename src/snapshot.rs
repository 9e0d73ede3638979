use std::path::PathBuf;
use std::process::ExitStatus;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Prefix turning a post URL into its embeddable render.
const EMBED_URL: &str = "https://publish.reddit.com/embed?url=";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to run screenshot tool: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("screenshot tool exited with {0}")]
    Failed(ExitStatus),
}

/// Captures a visual snapshot of a post for use as the video's title card.
#[async_trait]
pub trait Snapshotter: Send + Sync {
    /// Captures the post at `url` and returns the image path.
    async fn capture(&self, url: &str) -> Result<PathBuf, SnapshotError>;
}

/// Shells out to the headless-browser screenshot script, which writes its
/// capture to a fixed output path.
pub struct CommandSnapshotter {
    script: PathBuf,
    output: PathBuf,
}

impl CommandSnapshotter {
    pub fn new(script: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            output: output.into(),
        }
    }
}

#[async_trait]
impl Snapshotter for CommandSnapshotter {
    async fn capture(&self, url: &str) -> Result<PathBuf, SnapshotError> {
        let status = Command::new("python3")
            .arg(&self.script)
            .arg(format!("{EMBED_URL}{url}"))
            .status()
            .await?;

        if !status.success() {
            return Err(SnapshotError::Failed(status));
        }
        Ok(self.output.clone())
    }
}
