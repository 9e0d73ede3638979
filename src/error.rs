use thiserror::Error;

/// Top-level error for a pipeline run.
///
/// `Exhausted` and `NoParts` are expected outcomes on a scheduled invocation
/// (nothing new to process, or the renderer hasn't produced parts yet) and
/// abort only the current run. Everything else is fatal.
#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("no unseen posts available")]
    Exhausted,

    #[error("no pending video parts found for post {0}")]
    NoParts(String),

    #[error("failed to fetch posts: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Authorization failures. All of these are fatal to the run: a broken
/// consent flow or token exchange needs a human to re-consent, not a retry.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("failed to bind redirect listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("invalid authorization endpoint: {0}")]
    ConsentUrl(String),

    #[error("redirect handoff closed before an authorization code arrived")]
    ChannelClosed,

    #[error("timed out waiting for the authorization redirect")]
    Timeout,

    #[error("token exchange failed: {0}")]
    Exchange(#[source] reqwest::Error),

    #[error("token endpoint returned status {status}: {body}")]
    ExchangeRejected {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to persist credential: {0}")]
    Persist(#[source] std::io::Error),

    #[error("failed to encode credential: {0}")]
    Encode(#[from] serde_json::Error),
}
