use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

use super::rest::{RestIdentityProvider, RestProviderConfig};
use crate::errors::AuthResult;
use crate::models::{Identity, Session};

/// Callback invoked when the remote source changes the session out of band
/// (token refresh, remote revocation).
pub type SessionChangeCallback = Box<dyn Fn(Session) + Send + Sync>;

/// Unsubscribe handle for an `on_session_change` registration.
///
/// Dropping the handle without calling `unsubscribe` leaks the background
/// task for the remainder of the process lifetime; the owning component is
/// expected to unsubscribe once at teardown.
pub struct SessionSubscription {
    handle: JoinHandle<()>,
}

impl SessionSubscription {
    pub fn new(handle: JoinHandle<()>) -> Self {
        SessionSubscription { handle }
    }

    pub fn unsubscribe(self) {
        debug!("Releasing session change subscription");
        self.handle.abort();
    }
}

/// Configuration options for each identity provider backend.
#[derive(Deserialize, Serialize, JsonSchema, Debug)]
#[serde(tag = "type")]
pub enum ProviderConfig {
    #[serde(rename = "rest")]
    Rest(RestProviderConfig),
    // Add more variants here as needed, e.g. a native-SDK backend.
}

/// The capability contract over the remote identity service. All operations
/// are asynchronous and may fail with `Unavailable` (provider unreachable or
/// unconfigured) or `Rejected` (provider reached and declined).
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    fn get_name(&self) -> &str;

    /// Retrieve the current remote session, anonymous if none is active.
    async fn get_session(&self) -> AuthResult<Session>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Identity>;

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity>;

    /// Redirect-based OAuth sign-in; resolves only once the user agent
    /// returns from the provider.
    async fn sign_in_with_oauth(&self, provider_name: &str) -> AuthResult<Identity>;

    /// Best-effort remote sign-out; callers treat failure as non-fatal.
    async fn sign_out(&self) -> AuthResult<()>;

    async fn reset_password(&self, email: &str) -> AuthResult<()>;

    async fn update_password(&self, new_password: &str) -> AuthResult<()>;

    /// Register a push-style notification for out-of-band session changes.
    /// Registration itself may fail with `Unavailable`, in which case the
    /// caller proceeds without push updates.
    fn on_session_change(&self, callback: SessionChangeCallback)
        -> AuthResult<SessionSubscription>;
}

/// Create an identity provider from a given config.
pub fn create_identity_provider(config: &ProviderConfig) -> Arc<dyn IdentityProvider> {
    match config {
        ProviderConfig::Rest(cfg) => Arc::new(RestIdentityProvider::new(cfg)),
    }
}
