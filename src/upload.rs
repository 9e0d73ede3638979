use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};

use crate::auth::{AuthBroker, AuthorizedClient};
use crate::error::Error;
use crate::parts::{self, PublishTask};
use crate::pipeline::ReadyItem;
use crate::reddit::SourceItem;

const CATEGORY_ID: &str = "22";

const TAGS: &[&str] = &[
    "#Shorts",
    "#AITA",
    "#r/AmItheAsshole",
    "#Reddit",
    "#Stories",
    "#Funny",
    "#BestOfReddit",
    "#LOL",
    "#Entertainment",
    "#Relatable",
    "#TrueStories",
    "#LifeStories",
    "#Drama",
    "#DailyDose",
];

/// Metadata for one part's upload.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub title: String,
    pub description: String,
    pub category_id: String,
    pub tags: Vec<String>,
    pub task: PublishTask,
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("upload request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload rejected with status {status}: {body}")]
    Api { status: StatusCode, body: String },

    #[error("failed to read part file: {0}")]
    Io(#[from] std::io::Error),
}

/// Publishing collaborator. Submits one part and returns the platform's
/// remote video id.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        client: &AuthorizedClient,
        request: &PublishRequest,
        media: &Path,
    ) -> Result<String, PublishError>;
}

#[derive(Serialize)]
struct VideoResource {
    snippet: VideoSnippet,
    status: VideoStatus,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    title: String,
    description: String,
    category_id: String,
    tags: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatus {
    privacy_status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    publish_at: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    id: String,
}

/// Multipart insert against the videos endpoint.
pub struct YouTubePublisher {
    upload_url: String,
}

impl YouTubePublisher {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            upload_url: upload_url.into(),
        }
    }
}

#[async_trait]
impl Publisher for YouTubePublisher {
    async fn publish(
        &self,
        client: &AuthorizedClient,
        request: &PublishRequest,
        media: &Path,
    ) -> Result<String, PublishError> {
        let resource = VideoResource {
            snippet: VideoSnippet {
                title: request.title.clone(),
                description: request.description.clone(),
                category_id: request.category_id.clone(),
                tags: request.tags.clone(),
            },
            status: VideoStatus {
                privacy_status: request.task.privacy.as_str().to_string(),
                publish_at: request.task.publish_at.map(|at| at.to_rfc3339()),
            },
        };
        let metadata =
            serde_json::to_string(&resource).expect("video resource serializes to JSON");

        let video = tokio::fs::read(media).await?;
        let file_name = media
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        let form = Form::new()
            .part("metadata", Part::text(metadata).mime_str("application/json")?)
            .part("media", Part::bytes(video).file_name(file_name).mime_str("video/mp4")?);

        let response = client.post(&self.upload_url).multipart(form).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Api { status, body });
        }

        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.id)
    }
}

/// Publishes every discovered part of a ready post, first part public and
/// immediate, later parts private on a staggered schedule.
pub struct Uploader<P> {
    broker: AuthBroker,
    publisher: P,
    pending_dir: PathBuf,
    archive_dir: PathBuf,
    interval_hours: i64,
}

impl<P: Publisher> Uploader<P> {
    pub fn new(
        broker: AuthBroker,
        publisher: P,
        pending_dir: PathBuf,
        archive_dir: PathBuf,
        interval_hours: i64,
    ) -> Self {
        Self {
            broker,
            publisher,
            pending_dir,
            archive_dir,
            interval_hours,
        }
    }

    /// Attempts every part in ascending ordinal order and returns the remote
    /// ids that made it. A failed part is logged and left in the pending
    /// directory for the next run; it does not stop the parts after it.
    pub async fn publish(&self, item: &ReadyItem) -> Result<Vec<String>, Error> {
        let parts = parts::discover(&self.pending_dir, &item.post.id)?;
        let mut published = Vec::new();

        for part in parts {
            let client = self.broker.client().await?;
            let task = parts::schedule_for(part.ordinal, self.interval_hours);
            let request = build_request(&item.post, part.ordinal, task);

            info!("Uploading video with title: {}", request.title);
            match self.publisher.publish(&client, &request, &part.path).await {
                Ok(remote_id) => {
                    info!("Video uploaded successfully! Video ID: {remote_id}");
                    self.archive(&part.path);
                    published.push(remote_id);
                }
                Err(e) => {
                    error!("Failed to upload part {}: {e}", part.ordinal);
                }
            }
        }

        Ok(published)
    }

    /// Moves a published part out of the pending directory. The upload
    /// already succeeded, so a failed rename is logged rather than undoing
    /// anything.
    fn archive(&self, path: &Path) {
        let Some(name) = path.file_name() else { return };
        let dest = self.archive_dir.join(name);
        match std::fs::rename(path, &dest) {
            Ok(()) => info!("File moved successfully to {}", dest.display()),
            Err(e) => error!("Error moving file {}: {e}", path.display()),
        }
    }
}

fn build_request(post: &SourceItem, ordinal: u32, task: PublishTask) -> PublishRequest {
    PublishRequest {
        title: format!("Part {} | {}", ordinal, post.title),
        description: format!("Credit: {}\n\n{}\n\nURL: {}", post.author, post.body, post.url),
        category_id: CATEGORY_ID.to_string(),
        tags: TAGS.iter().map(|tag| tag.to_string()).collect(),
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{MemoryCredentials, valid_credential};
    use crate::auth::OAuthConfig;
    use crate::parts::Privacy;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    struct FakePublisher {
        fail_ordinals: Vec<u32>,
        requests: Arc<Mutex<Vec<PublishRequest>>>,
    }

    impl FakePublisher {
        fn new(fail_ordinals: &[u32]) -> (Self, Arc<Mutex<Vec<PublishRequest>>>) {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let publisher = Self {
                fail_ordinals: fail_ordinals.to_vec(),
                requests: Arc::clone(&requests),
            };
            (publisher, requests)
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn publish(
            &self,
            _client: &AuthorizedClient,
            request: &PublishRequest,
            _media: &Path,
        ) -> Result<String, PublishError> {
            self.requests.lock().unwrap().push(request.clone());
            let ordinal: u32 = request
                .title
                .split_whitespace()
                .nth(1)
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            if self.fail_ordinals.contains(&ordinal) {
                Err(PublishError::Api {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "backend error".to_string(),
                })
            } else {
                Ok(format!("remote-{ordinal}"))
            }
        }
    }

    fn broker() -> AuthBroker {
        AuthBroker::new(
            reqwest::Client::new(),
            OAuthConfig {
                client_id: "id".to_string(),
                client_secret: "secret".to_string(),
                auth_url: "http://localhost/auth".to_string(),
                token_url: "http://localhost/token".to_string(),
                scope: "upload".to_string(),
                redirect_port: 0,
                consent_timeout: Duration::from_secs(1),
            },
            Box::new(MemoryCredentials::new(Some(valid_credential()))),
        )
    }

    fn ready_item(id: &str) -> ReadyItem {
        ReadyItem {
            post: SourceItem {
                id: id.to_string(),
                title: "Am I the asshole for testing?".to_string(),
                body: "A story.".to_string(),
                url: "https://www.reddit.com/r/test/abc/".to_string(),
                author: "someone".to_string(),
            },
            title_audio: None,
            body_audio: None,
            snapshot: None,
            subtitles: None,
        }
    }

    #[tokio::test]
    async fn partial_batch_archives_only_the_published_parts() {
        let pending = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        std::fs::write(pending.path().join("abc_part_1.mp4"), b"one").unwrap();
        std::fs::write(pending.path().join("abc_part_2.mp4"), b"two").unwrap();

        let (publisher, _requests) = FakePublisher::new(&[2]);
        let uploader = Uploader::new(
            broker(),
            publisher,
            pending.path().to_path_buf(),
            archive.path().to_path_buf(),
            6,
        );

        let published = uploader.publish(&ready_item("abc")).await.unwrap();

        assert_eq!(published, ["remote-1"]);
        assert!(archive.path().join("abc_part_1.mp4").exists());
        assert!(!pending.path().join("abc_part_1.mp4").exists());
        assert!(pending.path().join("abc_part_2.mp4").exists());
    }

    #[tokio::test]
    async fn requests_carry_ordinal_titles_and_staggered_visibility() {
        let pending = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        std::fs::write(pending.path().join("abc_part_2.mp4"), b"two").unwrap();
        std::fs::write(pending.path().join("abc_part_1.mp4"), b"one").unwrap();

        let (publisher, requests) = FakePublisher::new(&[]);
        let uploader = Uploader::new(
            broker(),
            publisher,
            pending.path().to_path_buf(),
            archive.path().to_path_buf(),
            6,
        );

        let published = uploader.publish(&ready_item("abc")).await.unwrap();
        assert_eq!(published, ["remote-1", "remote-2"]);

        let requests = requests.lock().unwrap();
        assert_eq!(requests[0].title, "Part 1 | Am I the asshole for testing?");
        assert_eq!(requests[0].task.privacy, Privacy::Public);
        assert!(requests[0].task.publish_at.is_none());
        assert_eq!(requests[1].title, "Part 2 | Am I the asshole for testing?");
        assert_eq!(requests[1].task.privacy, Privacy::Private);
        assert!(requests[1].task.publish_at.is_some());
        assert!(requests[0].description.contains("Credit: someone"));
        assert!(requests[0].description.contains("URL: https://www.reddit.com/r/test/abc/"));
        assert_eq!(requests[0].category_id, "22");
        assert!(requests[0].tags.iter().any(|t| t == "#Shorts"));
    }

    #[tokio::test]
    async fn missing_parts_is_a_hard_error() {
        let pending = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();

        let (publisher, requests) = FakePublisher::new(&[]);
        let uploader = Uploader::new(
            broker(),
            publisher,
            pending.path().to_path_buf(),
            archive.path().to_path_buf(),
            6,
        );

        let result = uploader.publish(&ready_item("abc")).await;
        assert!(matches!(result, Err(Error::NoParts(id)) if id == "abc"));
        assert!(requests.lock().unwrap().is_empty());
    }
}
