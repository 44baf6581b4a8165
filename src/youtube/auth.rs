use anyhow::{Context, Result, bail};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Tokens this close to expiry are refreshed rather than used.
const EXPIRY_MARGIN_SECS: i64 = 60;

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_owned()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_owned()
}

/// Google client secrets come wrapped in either an `installed` or a `web` key.
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    pub fn parse(json: &str) -> Result<Self> {
        let file: ClientSecretsFile =
            serde_json::from_str(json).context("Failed to parse client secrets JSON")?;
        file.installed
            .or(file.web)
            .context("Client secrets contain neither an `installed` nor a `web` client")
    }

    pub async fn load(path: &Path) -> Result<Self> {
        Self::parse(
            &tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CachedToken {
    /// Google omits the refresh token on refresh; the previous one stays valid.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh_token: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh_token),
            expires_at: response
                .expires_in
                .map(|seconds| now + Duration::seconds(seconds)),
            scopes: response
                .scope
                .map(|scope| scope.split_whitespace().map(str::to_owned).collect())
                .unwrap_or_else(|| vec![UPLOAD_SCOPE.to_owned()]),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty() && !self.is_expired(now)
    }

    pub async fn load(path: &Path) -> Option<Self> {
        let data = tokio::fs::read(path).await.ok()?;
        match serde_json::from_slice(&data) {
            Ok(token) => Some(token),
            Err(err) => {
                tracing::warn!("Ignoring unreadable token cache {}: {err}", path.display());
                None
            }
        }
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create token cache directory")?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?)
            .await
            .with_context(|| format!("Failed to write token cache {}", path.display()))
    }
}

pub fn build_consent_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    scopes: &[&str],
    state: &str,
) -> String {
    format!(
        "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&state={}&prompt=consent",
        secrets.auth_uri,
        urlencoding::encode(&secrets.client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
        urlencoding::encode(state)
    )
}

/// Query string Google appends to the redirect URI.
#[derive(Debug, Deserialize)]
pub struct RedirectQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl RedirectQuery {
    /// Requests without `code` or `error` (favicon fetches, reloads) are not
    /// the authorization redirect.
    fn is_redirect(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Accepts the redirect only when its state matches the one sent out.
pub fn check_redirect(query: RedirectQuery, expected_state: &str) -> Result<String> {
    if let Some(error) = query.error {
        bail!("Authorization was denied: {error}");
    }
    if query.state.as_deref() != Some(expected_state) {
        bail!("Authorization response state does not match the request");
    }
    query.code.context("Authorization response carries no code")
}

#[derive(Clone)]
struct RedirectState {
    expected_state: Arc<str>,
    outcome: Arc<Mutex<Option<oneshot::Sender<Result<String>>>>>,
}

async fn oauth_redirect(
    State(app): State<RedirectState>,
    Query(query): Query<RedirectQuery>,
) -> (StatusCode, &'static str) {
    if !query.is_redirect() {
        return (StatusCode::NOT_FOUND, "Waiting for the authorization redirect.");
    }

    let outcome = check_redirect(query, &app.expected_state);
    let reply = if outcome.is_ok() {
        (
            StatusCode::OK,
            "The authentication flow has completed. You may close this window.",
        )
    } else {
        (
            StatusCode::BAD_REQUEST,
            "The authentication flow failed. Check the terminal for details.",
        )
    };

    if let Some(sender) = app.outcome.lock().await.take() {
        sender.send(outcome).ok();
    }
    reply
}

/// Serves `/` on `listener` until the authorization redirect arrives, then
/// shuts down and returns its code.
pub async fn receive_code(listener: TcpListener, expected_state: &str) -> Result<String> {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let router = Router::new()
        .route("/", get(oauth_redirect))
        .with_state(RedirectState {
            expected_state: Arc::from(expected_state),
            outcome: Arc::new(Mutex::new(Some(outcome_tx))),
        });

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
    });

    let outcome = outcome_rx
        .await
        .context("Authorization listener stopped before the redirect arrived");
    shutdown_tx.send(()).ok();
    server
        .await
        .context("Authorization listener panicked")?
        .context("Authorization listener failed")?;

    outcome?
}

async fn request_token(
    client: &reqwest::Client,
    secrets: &ClientSecrets,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client
        .post(&secrets.token_uri)
        .form(params)
        .send()
        .await
        .context("Failed to send request to token endpoint")?;

    if !response.status().is_success() {
        let error_text = response.text().await.unwrap_or_default();
        bail!("Token endpoint error: {error_text}");
    }

    response
        .json()
        .await
        .context("Failed to parse token endpoint response")
}

pub async fn refresh(
    client: &reqwest::Client,
    secrets: &ClientSecrets,
    refresh_token: &str,
) -> Result<CachedToken> {
    let response = request_token(
        client,
        secrets,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await?;

    Ok(CachedToken::from_response(
        response,
        Some(refresh_token.to_owned()),
        Utc::now(),
    ))
}

/// Installed-app flow against a loopback listener on an ephemeral port.
pub async fn run_local_flow(client: &reqwest::Client, secrets: &ClientSecrets) -> Result<CachedToken> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .context("Failed to bind loopback listener")?;
    let port = listener.local_addr()?.port();
    let redirect_uri = format!("http://localhost:{port}/");

    let state: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect();

    println!(
        "Please visit this URL to authorize this application: {}",
        build_consent_url(secrets, &redirect_uri, &[UPLOAD_SCOPE], &state)
    );

    let code = receive_code(listener, &state).await?;

    let response = request_token(
        client,
        secrets,
        &[
            ("code", code.as_str()),
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ],
    )
    .await?;

    Ok(CachedToken::from_response(response, None, Utc::now()))
}

/// Returns a usable access token, reusing the cache, refreshing it, or
/// falling back to interactive consent. The cache is rewritten whenever a new
/// token is obtained.
pub async fn authorize(credentials: &Path, token_cache: &Path) -> Result<CachedToken> {
    let cached = CachedToken::load(token_cache).await;
    if let Some(token) = cached.as_ref().filter(|token| token.is_valid(Utc::now())) {
        tracing::info!("Using cached YouTube token");
        return Ok(token.clone());
    }

    let secrets = ClientSecrets::load(credentials).await?;
    let client = reqwest::Client::new();

    let refresh_token = cached
        .filter(|token| token.is_expired(Utc::now()))
        .and_then(|token| token.refresh_token);

    let token = match refresh_token {
        Some(refresh_token) => {
            tracing::info!("Refreshing expired YouTube token");
            refresh(&client, &secrets, &refresh_token).await?
        }
        None => run_local_flow(&client, &secrets).await?,
    };

    token.save(token_cache).await?;
    Ok(token)
}
