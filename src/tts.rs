use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

const VOICE: &str = "en-US-AdamMultilingualNeural";
const OUTPUT_FORMAT: &str = "audio-16khz-128kbitrate-mono-mp3";

#[derive(Error, Debug)]
pub enum TtsError {
    #[error("speech request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("speech API returned status {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// Text-to-speech collaborator. The real implementation talks to Azure
/// Cognitive Services; tests substitute a fake.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes the text and returns the encoded audio (mp3).
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError>;
}

pub struct AzureSpeech {
    client: reqwest::Client,
    region: String,
    key: String,
}

impl AzureSpeech {
    pub fn new(client: reqwest::Client, region: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl Synthesizer for AzureSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, TtsError> {
        let url = format!(
            "https://{}.tts.speech.microsoft.com/cognitiveservices/v1",
            self.region
        );
        let ssml = format!(
            "<speak version='1.0' xml:lang='en-US'>\
             <voice xml:lang='en-US' xml:gender='Male' name='{VOICE}'>{text}</voice>\
             </speak>"
        );

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .body(ssml)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api { status, body });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
