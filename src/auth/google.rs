use super::{Credential, CredentialProvider};
use crate::config::AuthConfig;
use crate::error::{BackupError, Result};
use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecret>,
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientSecret {
    client_id: String,
    client_secret: String,
    #[serde(default = "default_auth_uri")]
    auth_uri: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredToken {
    refresh_token: String,
    #[serde(default)]
    scope: Option<String>,
    saved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn credential(&self) -> Credential {
        let expires_at = self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs));
        Credential::new(self.access_token.clone(), expires_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// OAuth 2.0 installed-application flow against Google.
///
/// A refresh token persisted in `token_file` is used silently. Without one,
/// and when `interactive` is set, a loopback consent flow runs once and the
/// resulting refresh token is written for later runs.
pub struct GoogleAuthorizer {
    config: AuthConfig,
    client: Client,
    cached: Mutex<Option<Credential>>,
}

impl GoogleAuthorizer {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("notes-backup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackupError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            config: config.clone(),
            client,
            cached: Mutex::new(None),
        })
    }

    async fn refresh(&self, secret: &ClientSecret, stored: &StoredToken) -> Result<Credential> {
        debug!("Refreshing access token");
        let tokens = self
            .exchange(
                secret,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", stored.refresh_token.as_str()),
                    ("client_id", secret.client_id.as_str()),
                    ("client_secret", secret.client_secret.as_str()),
                ],
            )
            .await?;
        Ok(tokens.credential())
    }

    async fn consent(&self, secret: &ClientSecret) -> Result<Credential> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| BackupError::Auth(format!("Failed to open redirect listener: {}", e)))?;
        let port = listener.local_addr()?.port();
        let redirect_uri = format!("http://127.0.0.1:{}", port);

        let verifier = pkce_verifier();
        let state = Uuid::new_v4().simple().to_string();
        let url = consent_url(secret, &redirect_uri, &pkce_challenge(&verifier), &state)?;

        println!("\nOpen this URL in your browser to allow Drive access:\n\n  {}\n", url);
        info!("Waiting for authorization redirect on {}", redirect_uri);

        let code = receive_authorization_code(listener, &state).await?;

        let tokens = self
            .exchange(
                secret,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.as_str()),
                    ("redirect_uri", redirect_uri.as_str()),
                    ("code_verifier", verifier.as_str()),
                    ("client_id", secret.client_id.as_str()),
                    ("client_secret", secret.client_secret.as_str()),
                ],
            )
            .await?;

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            BackupError::Auth("Authorization server did not return a refresh token".to_string())
        })?;
        save_token(
            &self.config.token_file,
            &StoredToken {
                refresh_token,
                scope: tokens.scope.clone(),
                saved_at: Utc::now(),
            },
        )?;
        info!("Stored refresh token at {}", self.config.token_file.display());

        Ok(tokens.credential())
    }

    async fn exchange(&self, secret: &ClientSecret, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&secret.token_uri)
            .form(params)
            .send()
            .await
            .map_err(|e| BackupError::Auth(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenError>(&text) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("{} - {}", status, text),
            };
            return Err(BackupError::Auth(reason));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| BackupError::Auth(format!("Malformed token response: {}", e)))
    }
}

#[async_trait]
impl CredentialProvider for GoogleAuthorizer {
    async fn authorize(&self) -> Result<Credential> {
        let mut cached = self.cached.lock().await;
        if let Some(credential) = cached.as_ref() {
            if credential.is_fresh(Utc::now()) {
                debug!("Reusing cached access token");
                return Ok(credential.clone());
            }
        }

        let secret = load_client_secret(&self.config.client_secret_file)?;
        let credential = match load_token(&self.config.token_file)? {
            Some(stored) => match self.refresh(&secret, &stored).await {
                Ok(credential) => credential,
                Err(e) if self.config.interactive && is_revoked_grant(&e) => {
                    warn!("Stored refresh token was rejected ({}), asking for consent again", e);
                    self.consent(&secret).await?
                }
                Err(e) => return Err(e),
            },
            None if self.config.interactive => self.consent(&secret).await?,
            None => {
                return Err(BackupError::Auth(format!(
                    "No refresh token at {}; run `notes-backup auth` first",
                    self.config.token_file.display()
                )))
            }
        };

        *cached = Some(credential.clone());
        Ok(credential)
    }

    fn name(&self) -> &'static str {
        "Google OAuth"
    }
}

/// Google answers a revoked or expired refresh token with `invalid_grant`.
fn is_revoked_grant(err: &BackupError) -> bool {
    matches!(err, BackupError::Auth(reason) if reason.starts_with("invalid_grant"))
}

fn load_client_secret(path: &Path) -> Result<ClientSecret> {
    let contents = fs::read_to_string(path).map_err(|e| {
        BackupError::Auth(format!("Cannot read client secret {}: {}", path.display(), e))
    })?;
    let file: ClientSecretFile = serde_json::from_str(&contents).map_err(|e| {
        BackupError::Auth(format!("Invalid client secret {}: {}", path.display(), e))
    })?;
    file.installed.or(file.web).ok_or_else(|| {
        BackupError::Auth(format!(
            "Client secret {} has neither an \"installed\" nor a \"web\" section",
            path.display()
        ))
    })
}

fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)
        .map_err(|e| BackupError::Auth(format!("Cannot read token {}: {}", path.display(), e)))?;
    let token = serde_json::from_str(&contents)
        .map_err(|e| BackupError::Auth(format!("Invalid token file {}: {}", path.display(), e)))?;
    Ok(Some(token))
}

fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(token)?)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn pkce_verifier() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

fn consent_url(secret: &ClientSecret, redirect_uri: &str, challenge: &str, state: &str) -> Result<Url> {
    Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", DRIVE_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
        ],
    )
    .map_err(|e| BackupError::Auth(format!("Invalid auth_uri {}: {}", secret.auth_uri, e)))
}

#[derive(Debug, Default, Deserialize)]
struct RedirectParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

type CodeSender = oneshot::Sender<Result<String>>;

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    sender: Arc<std::sync::Mutex<Option<CodeSender>>>,
}

/// Serves the loopback redirect until a request carries either a code or
/// an error. Other requests (preconnects, favicon) are answered and ignored.
async fn receive_authorization_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (sender, receiver) = oneshot::channel();
    let (stop, stopped) = oneshot::channel::<()>();

    let app = Router::new().route("/", get(redirect_handler)).with_state(RedirectState {
        expected_state: Arc::from(expected_state),
        sender: Arc::new(std::sync::Mutex::new(Some(sender))),
    });

    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stopped.await;
            })
            .await
    });

    let code = receiver
        .await
        .map_err(|_| BackupError::Auth("Redirect listener stopped before authorization finished".to_string()));
    let _ = stop.send(());

    match tokio::time::timeout(std::time::Duration::from_secs(5), server).await {
        Ok(Ok(Ok(()))) => debug!("Redirect listener stopped"),
        Ok(Ok(Err(e))) => warn!("Redirect listener error: {}", e),
        Ok(Err(e)) => warn!("Redirect listener task failed: {}", e),
        Err(_) => debug!("Redirect listener still draining connections"),
    }
    code?
}

async fn redirect_handler(
    State(state): State<RedirectState>,
    Query(params): Query<RedirectParams>,
) -> (StatusCode, &'static str) {
    if params.code.is_none() && params.error.is_none() {
        return (StatusCode::BAD_REQUEST, "Waiting for Google authorization.");
    }

    let result = redirect_result(params, &state.expected_state);
    let page = if result.is_ok() {
        (StatusCode::OK, "Authorization complete. You can close this tab.")
    } else {
        (StatusCode::BAD_REQUEST, "Authorization failed. You can close this tab.")
    };

    let sender = state.sender.lock().ok().and_then(|mut slot| slot.take());
    match sender {
        Some(sender) => {
            let _ = sender.send(result);
        }
        None => debug!("Ignoring repeated authorization redirect"),
    }
    page
}

fn redirect_result(params: RedirectParams, expected_state: &str) -> Result<String> {
    if let Some(error) = params.error {
        return Err(BackupError::Auth(format!("Authorization denied: {}", error)));
    }
    if params.state.as_deref() != Some(expected_state) {
        return Err(BackupError::Auth("Authorization state mismatch".to_string()));
    }
    params
        .code
        .ok_or_else(|| BackupError::Auth("Authorization redirect carried no code".to_string()))
}
