use std::env;

use crate::error::Error;

const DEFAULT_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=multipart&part=snippet,status";
const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Startup configuration, read from the environment once in `main` before
/// anything touches the network or the disk. Secrets only live here; path
/// knobs are CLI flags.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub upload_url: String,
    pub scope: String,
    pub redirect_port: u16,
    pub interval_hours: i64,
    pub consent_timeout_secs: u64,
    pub speech_region: String,
    pub speech_key: String,
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// Required: `CLIENT_ID`, `CLIENT_SECRET`, `AZURE_SPEECH_REGION`,
    /// `AZURE_SPEECH_KEY`. The endpoint URLs, redirect port, upload interval
    /// and consent timeout have defaults and are overridable for tests and
    /// odd deployments.
    pub fn from_env() -> Result<Self, Error> {
        Ok(Self {
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
            auth_url: optional("AUTH_URL", DEFAULT_AUTH_URL),
            token_url: optional("TOKEN_URL", DEFAULT_TOKEN_URL),
            upload_url: optional("UPLOAD_URL", DEFAULT_UPLOAD_URL),
            scope: UPLOAD_SCOPE.to_string(),
            redirect_port: parse("REDIRECT_PORT", 8080)?,
            interval_hours: parse("UPLOAD_INTERVAL_HOURS", 6)?,
            consent_timeout_secs: parse("CONSENT_TIMEOUT_SECS", 300)?,
            speech_region: require("AZURE_SPEECH_REGION")?,
            speech_key: require("AZURE_SPEECH_KEY")?,
        })
    }
}

fn require(name: &str) -> Result<String, Error> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(Error::Config(format!("{name} is not set"))),
    }
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, Error> {
    match env::var(name) {
        Ok(v) => v
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {v}"))),
        Err(_) => Ok(default),
    }
}
