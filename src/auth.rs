use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, oneshot};
use tracing::{error, info, warn};

use crate::error::AuthError;

const STATE_TOKEN: &str = "state-token";

/// How long the listener stays up after answering the browser, so the
/// confirmation page flushes before the socket closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const CONFIRMATION_PAGE: &str =
    "<h1>Authorization Successful</h1><p>You can close this window and return to the application.</p>";

/// The persisted OAuth2 credential. Owned exclusively by [`AuthBroker`];
/// replaced wholesale whenever the user re-consents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub token_type: String,
}

impl Credential {
    /// An absent expiry means the token never expires. A small delta keeps
    /// us from handing out a token that dies mid-request.
    pub fn is_valid(&self) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry - chrono::Duration::seconds(10) > Utc::now(),
            None => true,
        }
    }
}

/// Where credentials live between runs. File-backed in production, in-memory
/// in tests.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credential>, AuthError>;
    fn save(&self, credential: &Credential) -> Result<(), AuthError>;
}

/// Credential file on disk, written with owner-only permissions.
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for CredentialFile {
    fn load(&self) -> Result<Option<Credential>, AuthError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&self.path).map_err(AuthError::Persist)?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(AuthError::Persist)?;
        }
        let data = serde_json::to_string(credential)?;
        std::fs::write(&self.path, data).map_err(AuthError::Persist)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(AuthError::Persist)?;
        }
        Ok(())
    }
}

/// Everything the broker needs to talk to the platform's OAuth endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub token_url: String,
    pub scope: String,
    pub redirect_port: u16,
    pub consent_timeout: Duration,
}

/// An HTTP client that attaches the bearer token to every request it builds.
#[derive(Debug, Clone)]
pub struct AuthorizedClient {
    http: reqwest::Client,
    access_token: String,
}

impl AuthorizedClient {
    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.http.post(url).bearer_auth(&self.access_token)
    }
}

/// Obtains and persists the publishing platform's credential.
///
/// `client()` is safe to call repeatedly within one process: a persisted
/// unexpired credential is reused silently, an expired one is refreshed, and
/// only when neither works does the broker run the interactive consent flow.
pub struct AuthBroker {
    http: reqwest::Client,
    oauth: OAuthConfig,
    store: Box<dyn CredentialStore>,
}

impl AuthBroker {
    pub fn new(http: reqwest::Client, oauth: OAuthConfig, store: Box<dyn CredentialStore>) -> Self {
        Self { http, oauth, store }
    }

    pub async fn client(&self) -> Result<AuthorizedClient, AuthError> {
        let credential = match self.store.load()? {
            Some(credential) if credential.is_valid() => credential,
            Some(credential) => match credential.refresh_token.as_deref() {
                Some(refresh_token) => match self.refresh(refresh_token).await {
                    Ok(refreshed) => {
                        self.store.save(&refreshed)?;
                        refreshed
                    }
                    Err(e) => {
                        warn!("token refresh failed, falling back to consent flow: {e}");
                        self.consent().await?
                    }
                },
                None => self.consent().await?,
            },
            None => self.consent().await?,
        };

        Ok(AuthorizedClient {
            http: self.http.clone(),
            access_token: credential.access_token,
        })
    }

    /// Runs the three-legged flow: listener up, consent URL out, wait for the
    /// redirect, exchange the code, persist.
    async fn consent(&self) -> Result<Credential, AuthError> {
        let capture = RedirectCapture::bind(self.oauth.redirect_port).await?;
        let redirect_url = capture.redirect_url();
        let consent_url = self.consent_url(&redirect_url)?;

        info!("go to the following link in your browser to authorize uploads:\n{consent_url}");

        let code = capture.wait(self.oauth.consent_timeout).await?;
        let credential = self.exchange(&code, &redirect_url).await?;
        self.store.save(&credential)?;
        Ok(credential)
    }

    fn consent_url(&self, redirect_url: &str) -> Result<Url, AuthError> {
        Url::parse_with_params(
            &self.oauth.auth_url,
            &[
                ("client_id", self.oauth.client_id.as_str()),
                ("redirect_uri", redirect_url),
                ("response_type", "code"),
                ("scope", self.oauth.scope.as_str()),
                ("access_type", "offline"),
                ("state", STATE_TOKEN),
            ],
        )
        .map_err(|e| AuthError::ConsentUrl(e.to_string()))
    }

    async fn exchange(&self, code: &str, redirect_url: &str) -> Result<Credential, AuthError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_url),
            ("client_id", &self.oauth.client_id),
            ("client_secret", &self.oauth.client_secret),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Credential, AuthError> {
        let mut refreshed = self
            .token_request(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", &self.oauth.client_id),
                ("client_secret", &self.oauth.client_secret),
            ])
            .await?;
        // The token endpoint may omit the refresh token on renewal.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token.to_string());
        }
        Ok(refreshed)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<Credential, AuthError> {
        let response = self
            .http
            .post(&self.oauth.token_url)
            .form(form)
            .send()
            .await
            .map_err(AuthError::Exchange)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeRejected { status, body });
        }

        let token: TokenResponse = response.json().await.map_err(AuthError::Exchange)?;
        Ok(Credential {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expiry: token
                .expires_in
                .map(|secs| Utc::now() + chrono::Duration::seconds(secs)),
            token_type: token.token_type.unwrap_or_else(|| "Bearer".to_string()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
}

/// One-shot local listener that captures the authorization code from the
/// browser redirect. Constructed fresh for every consent attempt; nothing is
/// shared across flows.
pub struct RedirectCapture {
    port: u16,
    code_rx: oneshot::Receiver<String>,
    server: tokio::task::JoinHandle<()>,
}

struct CaptureState {
    code_tx: Mutex<Option<oneshot::Sender<String>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

impl RedirectCapture {
    /// Binds the loopback listener. Port 0 picks a free port, which tests use.
    pub async fn bind(port: u16) -> Result<Self, AuthError> {
        let (code_tx, code_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let state = Arc::new(CaptureState {
            code_tx: Mutex::new(Some(code_tx)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        });

        let app = Router::new().route("/callback", get(callback)).with_state(state);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(AuthError::Bind)?;
        let port = listener.local_addr().map_err(AuthError::Bind)?.port();

        let server = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                error!("redirect listener error: {e}");
            }
        });

        Ok(Self { port, code_rx, server })
    }

    pub fn redirect_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Blocks until the redirect handler hands over a code, or the timeout
    /// expires. The listener keeps running through its grace delay after a
    /// code arrives; on timeout it is torn down immediately.
    pub async fn wait(self, timeout: Duration) -> Result<String, AuthError> {
        match tokio::time::timeout(timeout, self.code_rx).await {
            Ok(Ok(code)) => Ok(code),
            Ok(Err(_)) => Err(AuthError::ChannelClosed),
            Err(_) => {
                self.server.abort();
                Err(AuthError::Timeout)
            }
        }
    }
}

async fn callback(
    State(state): State<Arc<CaptureState>>,
    Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
    if let Some(code) = query.code {
        if let Some(tx) = state.code_tx.lock().await.take() {
            let _ = tx.send(code);
        }
        // Shut down after the response has had time to flush, not before.
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(SHUTDOWN_GRACE).await;
            if let Some(tx) = state.shutdown_tx.lock().await.take() {
                let _ = tx.send(());
            }
        });
    }
    Html(CONFIRMATION_PAGE)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// In-memory credential store for tests.
    pub struct MemoryCredentials {
        slot: StdMutex<Option<Credential>>,
    }

    impl MemoryCredentials {
        pub fn new(credential: Option<Credential>) -> Self {
            Self {
                slot: StdMutex::new(credential),
            }
        }
    }

    impl CredentialStore for MemoryCredentials {
        fn load(&self) -> Result<Option<Credential>, AuthError> {
            Ok(self.slot.lock().unwrap().clone())
        }

        fn save(&self, credential: &Credential) -> Result<(), AuthError> {
            *self.slot.lock().unwrap() = Some(credential.clone());
            Ok(())
        }
    }

    pub fn valid_credential() -> Credential {
        Credential {
            access_token: "test-token".to_string(),
            refresh_token: Some("test-refresh".to_string()),
            expiry: Some(Utc::now() + chrono::Duration::hours(1)),
            token_type: "Bearer".to_string(),
        }
    }
}
