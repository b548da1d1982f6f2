//! REST identity provider.
//!
//! Adapter over a GoTrue-style authentication API (Supabase auth). Covers
//! credential sign-up/sign-in, PKCE OAuth with a loopback redirect listener,
//! sign-out, password recovery/update, and a refresh-loop-driven push
//! subscription for out-of-band session changes.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{AuthError, AuthResult};
use crate::models::{Identity, IdentitySource, Session};
use crate::providers::base::{IdentityProvider, SessionChangeCallback, SessionSubscription};
use crate::utils::pkce;

/// The config needed for the REST identity provider.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct RestProviderConfig {
    /// A friendly name for logs.
    pub name: String,
    /// Project base URL, e.g. "https://xyz.supabase.co".
    pub url: String,
    /// The public (anon) API key.
    pub api_key: String,
    /// Seconds between token refresh attempts on the push subscription.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Loopback port for the OAuth redirect listener; 0 picks an ephemeral
    /// port.
    #[serde(default)]
    pub oauth_redirect_port: u16,
    /// Where to persist the token pair so a remote session survives a
    /// restart. Unset means the session lives in memory only.
    #[serde(default)]
    pub session_cache_path: Option<String>,
}

fn default_refresh_interval() -> u64 {
    1800
}

/// The access/refresh token pair issued by the remote provider. Tokens are
/// opaque strings here; this crate never inspects them.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct TokenPair {
    access_token: String,
    refresh_token: Option<String>,
}

/// The current token pair, optionally mirrored to a JSON cache file so a
/// remote session survives a restart.
///
/// Cache IO errors are logged and degrade to "session not persisted"; a
/// corrupt cache reads as empty so a fresh sign-in stays possible.
#[derive(Clone)]
struct TokenSlot {
    inner: Arc<RwLock<Option<TokenPair>>>,
    cache_path: Option<Arc<str>>,
}

impl TokenSlot {
    fn new(cache_path: Option<&str>) -> Self {
        let restored = cache_path.and_then(restore_cached_pair);
        if restored.is_some() {
            debug!("Restored cached session tokens");
        }
        TokenSlot {
            inner: Arc::new(RwLock::new(restored)),
            cache_path: cache_path.map(Arc::from),
        }
    }

    async fn get(&self) -> Option<TokenPair> {
        self.inner.read().await.clone()
    }

    async fn set(&self, pair: Option<TokenPair>) {
        *self.inner.write().await = pair.clone();
        let path = match &self.cache_path {
            Some(path) => path.as_ref(),
            None => return,
        };
        match pair {
            Some(pair) => {
                let contents = match serde_json::to_string(&pair) {
                    Ok(contents) => contents,
                    Err(e) => {
                        warn!("Could not serialize session tokens: {}", e);
                        return;
                    }
                };
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        warn!("Could not create session cache directory: {}", e);
                        return;
                    }
                }
                if let Err(e) = tokio::fs::write(path, contents).await {
                    warn!("Could not write session cache {}: {}", path, e);
                }
            }
            None => match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not clear session cache {}: {}", path, e),
            },
        }
    }
}

/// Read the cached token pair back at construction time.
fn restore_cached_pair(path: &str) -> Option<TokenPair> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read session cache {}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!("Corrupt session cache {}: {}", path, e);
            None
        }
    }
}

/// Shared HTTP plumbing, cloneable into the refresh task.
#[derive(Clone)]
struct RestClient {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl RestClient {
    /// Issue a request against the auth API and map the outcome onto the
    /// error taxonomy: transport failures and 5xx are `Unavailable`, any
    /// other non-success status is `Rejected` with the server's message.
    async fn request(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<Value>,
    ) -> AuthResult<Value> {
        let url = format!("{}{}", self.url.trim_end_matches('/'), path);
        debug!("Sending {} request to {}", method, url);

        let mut request = self
            .client
            .request(method, &url)
            .header("apikey", &self.api_key);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(format!("request failed: {}", e)))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::Unavailable(format!(
                "provider returned server error {}",
                status
            )));
        }
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::Unavailable(format!("error reading response body: {}", e)))?;
        if !status.is_success() {
            return Err(AuthError::Rejected(reject_message(&text)));
        }
        if text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| AuthError::Unavailable(format!("invalid response body: {}", e)))
    }
}

/// Extract a human-readable denial reason from an error response body.
fn reject_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["msg", "error_description", "message", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    if body.is_empty() {
        "request rejected by identity provider".to_string()
    } else {
        body.to_string()
    }
}

/// Build an `Identity` from a GoTrue user object.
fn identity_from_user(user: &Value) -> AuthResult<Identity> {
    let id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::Unavailable("user object missing id".to_string()))?;
    let email = user
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let metadata = user.get("user_metadata");
    let display_name = metadata
        .and_then(|m| m.get("display_name").or_else(|| m.get("full_name")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string());
    let provider = match user
        .get("app_metadata")
        .and_then(|m| m.get("provider"))
        .and_then(Value::as_str)
    {
        Some("google") => IdentitySource::Google,
        _ => IdentitySource::Email,
    };
    Ok(Identity::new(
        id.to_string(),
        email.to_string(),
        display_name,
        provider,
    ))
}

/// A provider that talks to a GoTrue-style REST authentication API.
pub struct RestIdentityProvider {
    pub config: RestProviderConfig,
    rest: RestClient,
    tokens: TokenSlot,
    url_opener: Box<dyn Fn(&str) + Send + Sync>,
}

impl RestIdentityProvider {
    pub fn new(config: &RestProviderConfig) -> Self {
        info!(
            "Creating REST identity provider '{}' for {}",
            config.name, config.url
        );
        Self {
            config: config.clone(),
            rest: RestClient {
                client: reqwest::Client::new(),
                url: config.url.clone(),
                api_key: config.api_key.clone(),
            },
            tokens: TokenSlot::new(config.session_cache_path.as_deref()),
            url_opener: Box::new(|url| {
                info!("Open this URL in a browser to continue sign-in: {}", url);
            }),
        }
    }

    /// Replace the default URL opener (which only logs the authorize URL)
    /// with one supplied by the embedding application.
    pub fn with_url_opener(mut self, opener: Box<dyn Fn(&str) + Send + Sync>) -> Self {
        self.url_opener = opener;
        self
    }

    /// Placeholder credentials (or none at all) mean the provider was never
    /// configured; every operation short-circuits to `Unavailable` without
    /// touching the network.
    fn is_configured(&self) -> bool {
        !self.config.url.is_empty()
            && !self.config.api_key.is_empty()
            && !self.config.url.contains("your-project")
            && !self.config.api_key.contains("demo-key")
    }

    fn require_configured(&self) -> AuthResult<()> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(AuthError::Unavailable(
                "identity provider is not configured".to_string(),
            ))
        }
    }

    async fn store_tokens_from(&self, body: &Value) {
        if let Some(access_token) = body.get("access_token").and_then(Value::as_str) {
            let pair = TokenPair {
                access_token: access_token.to_string(),
                refresh_token: body
                    .get("refresh_token")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            };
            self.tokens.set(Some(pair)).await;
        }
    }

    /// Wait for the browser to come back to the loopback listener and
    /// extract the authorization code from the callback query string.
    async fn wait_for_callback(&self, listener: TcpListener) -> AuthResult<String> {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| AuthError::Unavailable(format!("callback listener failed: {}", e)))?;
        debug!("OAuth callback connection from {}", peer);

        let mut buffer = vec![0u8; 4096];
        let read = stream
            .read(&mut buffer)
            .await
            .map_err(|e| AuthError::Unavailable(format!("error reading callback: {}", e)))?;
        let request = String::from_utf8_lossy(&buffer[..read]).to_string();

        // Request line: "GET /auth/callback?code=... HTTP/1.1"
        let path = request
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .ok_or_else(|| AuthError::Rejected("malformed callback request".to_string()))?;
        let callback = Url::parse(&format!("http://localhost{}", path))
            .map_err(|e| AuthError::Rejected(format!("malformed callback URL: {}", e)))?;

        let mut code = None;
        let mut error = None;
        for (key, value) in callback.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.to_string()),
                "error_description" | "error" if error.is_none() => {
                    error = Some(value.to_string())
                }
                _ => {}
            }
        }

        let body = "<html><body><h3>Sign-in complete.</h3>\
                    You can close this window and return to the app.</body></html>";
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        if let Err(e) = stream.write_all(response.as_bytes()).await {
            warn!("Failed to respond to OAuth callback: {}", e);
        }

        if let Some(error) = error {
            return Err(AuthError::Rejected(error));
        }
        code.ok_or_else(|| AuthError::Rejected("callback carried no authorization code".to_string()))
    }
}

#[async_trait::async_trait]
impl IdentityProvider for RestIdentityProvider {
    fn get_name(&self) -> &str {
        &self.config.name
    }

    async fn get_session(&self) -> AuthResult<Session> {
        self.require_configured()?;
        let access_token = match self.tokens.get().await {
            Some(pair) => pair.access_token,
            None => return Ok(Session::anonymous()),
        };

        match self
            .rest
            .request(Method::GET, "/auth/v1/user", Some(&access_token), None)
            .await
        {
            Ok(user) => Ok(Session::authenticated(identity_from_user(&user)?)),
            Err(AuthError::Rejected(reason)) => {
                // Stored token no longer accepted; drop it.
                debug!("Stored session rejected by provider: {}", reason);
                self.tokens.set(None).await;
                Ok(Session::anonymous())
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Identity> {
        self.require_configured()?;
        let body = json!({
            "email": email,
            "password": password,
            "data": { "display_name": display_name },
        });
        let response = self
            .rest
            .request(Method::POST, "/auth/v1/signup", None, Some(body))
            .await?;
        self.store_tokens_from(&response).await;
        // Token-bearing responses nest the user; confirm-email flows return
        // the user object at the root.
        let user = response.get("user").unwrap_or(&response);
        identity_from_user(user)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        self.require_configured()?;
        let body = json!({ "email": email, "password": password });
        let response = self
            .rest
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=password",
                None,
                Some(body),
            )
            .await?;
        self.store_tokens_from(&response).await;
        let user = response.get("user").unwrap_or(&response);
        identity_from_user(user)
    }

    async fn sign_in_with_oauth(&self, provider_name: &str) -> AuthResult<Identity> {
        self.require_configured()?;

        let listener = TcpListener::bind(("127.0.0.1", self.config.oauth_redirect_port))
            .await
            .map_err(|e| {
                AuthError::Unavailable(format!("could not bind OAuth callback listener: {}", e))
            })?;
        let port = listener
            .local_addr()
            .map_err(|e| AuthError::Unavailable(format!("no callback address: {}", e)))?
            .port();

        let verifier = pkce::generate_verifier();
        let redirect_to = format!("http://127.0.0.1:{}/auth/callback", port);
        let authorize_url = Url::parse_with_params(
            &format!(
                "{}/auth/v1/authorize",
                self.config.url.trim_end_matches('/')
            ),
            &[
                ("provider", provider_name),
                ("redirect_to", redirect_to.as_str()),
                ("code_challenge", pkce::challenge_for(&verifier).as_str()),
                ("code_challenge_method", "s256"),
            ],
        )
        .map_err(|e| AuthError::Unavailable(format!("invalid provider URL: {}", e)))?;

        info!(
            "Starting OAuth sign-in via '{}', callback on port {}",
            provider_name, port
        );
        (self.url_opener)(authorize_url.as_str());

        let code = self.wait_for_callback(listener).await?;
        let body = json!({ "auth_code": code, "code_verifier": verifier });
        let response = self
            .rest
            .request(
                Method::POST,
                "/auth/v1/token?grant_type=pkce",
                None,
                Some(body),
            )
            .await?;
        self.store_tokens_from(&response).await;
        let user = response.get("user").unwrap_or(&response);
        let mut identity = identity_from_user(user)?;
        if provider_name == "google" {
            identity.provider = IdentitySource::Google;
        }
        Ok(identity)
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.require_configured()?;
        // The local token slot is cleared no matter what the remote says.
        let pair = self.tokens.get().await;
        self.tokens.set(None).await;
        let access_token = match pair {
            Some(pair) => pair.access_token,
            None => return Ok(()),
        };
        self.rest
            .request(
                Method::POST,
                "/auth/v1/logout",
                Some(&access_token),
                None,
            )
            .await?;
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> AuthResult<()> {
        self.require_configured()?;
        self.rest
            .request(
                Method::POST,
                "/auth/v1/recover",
                None,
                Some(json!({ "email": email })),
            )
            .await?;
        Ok(())
    }

    async fn update_password(&self, new_password: &str) -> AuthResult<()> {
        self.require_configured()?;
        let access_token = match self.tokens.get().await {
            Some(pair) => pair.access_token,
            None => {
                return Err(AuthError::Rejected(
                    "no active session to update".to_string(),
                ))
            }
        };
        self.rest
            .request(
                Method::PUT,
                "/auth/v1/user",
                Some(&access_token),
                Some(json!({ "password": new_password })),
            )
            .await?;
        Ok(())
    }

    fn on_session_change(
        &self,
        callback: SessionChangeCallback,
    ) -> AuthResult<SessionSubscription> {
        self.require_configured()?;

        let rest = self.rest.clone();
        let tokens = self.tokens.clone();
        let interval = Duration::from_secs(self.config.refresh_interval_secs.max(1));

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                let refresh_token = match tokens.get().await {
                    Some(TokenPair {
                        refresh_token: Some(token),
                        ..
                    }) => token,
                    _ => continue,
                };

                let result = rest
                    .request(
                        Method::POST,
                        "/auth/v1/token?grant_type=refresh_token",
                        None,
                        Some(json!({ "refresh_token": refresh_token })),
                    )
                    .await;

                match result {
                    Ok(response) => {
                        if let Some(access_token) =
                            response.get("access_token").and_then(Value::as_str)
                        {
                            tokens
                                .set(Some(TokenPair {
                                    access_token: access_token.to_string(),
                                    refresh_token: response
                                        .get("refresh_token")
                                        .and_then(Value::as_str)
                                        .map(str::to_string),
                                }))
                                .await;
                        }
                        let user = response.get("user").unwrap_or(&response);
                        match identity_from_user(user) {
                            Ok(identity) => {
                                debug!("Session refreshed for '{}'", identity.email);
                                callback(Session::authenticated(identity));
                            }
                            Err(e) => warn!("Refresh response missing user: {}", e),
                        }
                    }
                    Err(AuthError::Rejected(reason)) => {
                        // Remote revocation: the session is gone.
                        warn!("Session refresh rejected: {}", reason);
                        tokens.set(None).await;
                        callback(Session::anonymous());
                    }
                    Err(AuthError::Unavailable(reason)) => {
                        debug!("Session refresh skipped, provider unavailable: {}", reason);
                    }
                }
            }
        });

        Ok(SessionSubscription::new(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placeholder_config() -> RestProviderConfig {
        RestProviderConfig {
            name: "test".to_string(),
            url: "https://your-project.supabase.co".to_string(),
            api_key: "demo-key".to_string(),
            refresh_interval_secs: 1800,
            oauth_redirect_port: 0,
            session_cache_path: None,
        }
    }

    /// Placeholder credentials short-circuit every operation to Unavailable.
    #[tokio::test]
    async fn test_unconfigured_provider_is_unavailable() {
        let provider = RestIdentityProvider::new(&placeholder_config());

        let result = provider.sign_in("a@x.com", "pw").await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));

        let result = provider.get_session().await;
        assert!(matches!(result, Err(AuthError::Unavailable(_))));

        let result = provider.on_session_change(Box::new(|_| {}));
        assert!(result.is_err());
    }

    #[test]
    fn test_reject_message_prefers_server_fields() {
        assert_eq!(
            reject_message(r#"{"msg":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(
            reject_message(r#"{"error":"invalid_grant","error_description":"bad code"}"#),
            "bad code"
        );
        assert_eq!(reject_message("plain text"), "plain text");
        assert_eq!(reject_message(""), "request rejected by identity provider");
    }

    #[test]
    fn test_identity_from_user_defaults() {
        let user = json!({
            "id": "u-1",
            "email": "ann@example.com",
            "user_metadata": {},
            "app_metadata": { "provider": "email" },
        });
        let identity = identity_from_user(&user).unwrap();
        assert_eq!(identity.id, "u-1");
        assert_eq!(identity.display_name, "ann");
        assert_eq!(identity.provider, IdentitySource::Email);

        let google_user = json!({
            "id": "u-2",
            "email": "g@example.com",
            "user_metadata": { "full_name": "Gee" },
            "app_metadata": { "provider": "google" },
        });
        let identity = identity_from_user(&google_user).unwrap();
        assert_eq!(identity.display_name, "Gee");
        assert_eq!(identity.provider, IdentitySource::Google);
    }

    #[test]
    fn test_identity_from_user_requires_id() {
        let user = json!({ "email": "a@x.com" });
        assert!(identity_from_user(&user).is_err());
    }

    /// A cached token pair comes back in a fresh slot over the same file,
    /// and clearing the slot empties the cache too.
    #[tokio::test]
    async fn test_token_slot_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("session.json")
            .to_string_lossy()
            .into_owned();

        let slot = TokenSlot::new(Some(&path));
        assert!(slot.get().await.is_none());
        slot.set(Some(TokenPair {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
        }))
        .await;

        let reopened = TokenSlot::new(Some(&path));
        let pair = reopened.get().await.expect("cached pair restored");
        assert_eq!(pair.access_token, "access-1");
        assert_eq!(pair.refresh_token.as_deref(), Some("refresh-1"));

        reopened.set(None).await;
        assert!(TokenSlot::new(Some(&path)).get().await.is_none());
    }

    /// A corrupt cache file reads as an empty slot.
    #[tokio::test]
    async fn test_corrupt_token_cache_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("session.json")
            .to_string_lossy()
            .into_owned();
        tokio::fs::write(&path, "not json").await.unwrap();

        assert!(TokenSlot::new(Some(&path)).get().await.is_none());
    }
}
