//! Session facade / state machine.
//!
//! Owns the single current session value, decides which source of identity
//! truth to trust (remote provider vs. local fallback slot), and publishes
//! every transition through the shared session state. A provider failure
//! never escapes bootstrap: the facade only ever narrows the identity to
//! "present" or "absent".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::errors::{AuthError, AuthResult};
use crate::models::{Identity, Session};
use crate::profile::{ProfileRecord, ProfileStore};
use crate::providers::{IdentityProvider, SessionSubscription};
use crate::state::SharedSessionState;
use crate::store::FallbackStore;

/// The public operation set over the current identity session.
///
/// Every identity-establishing operation follows the same two-tier pattern:
/// attempt the remote provider, degrade to the local fallback store on
/// `Unavailable`, and propagate `Rejected` to the caller untouched.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    fallback: Arc<dyn FallbackStore>,
    profiles: Arc<dyn ProfileStore>,
    state: Arc<SharedSessionState>,
    /// Bumped by every push notification. Operations capture it before their
    /// remote attempt so a push arriving mid-flight wins the tie-break.
    push_generation: Arc<AtomicU64>,
    subscription: Mutex<Option<SessionSubscription>>,
}

impl SessionManager {
    /// Construct the facade and run bootstrap: restore a session from the
    /// remote provider if possible, from the local fallback slot otherwise,
    /// and mark the shared state ready either way.
    pub async fn bootstrap(
        provider: Arc<dyn IdentityProvider>,
        fallback: Arc<dyn FallbackStore>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let manager = SessionManager {
            provider,
            fallback,
            profiles,
            state: Arc::new(SharedSessionState::new()),
            push_generation: Arc::new(AtomicU64::new(0)),
            subscription: Mutex::new(None),
        };
        manager.run_bootstrap().await;
        manager
    }

    /// The shared session state, for observers.
    pub fn state(&self) -> Arc<SharedSessionState> {
        self.state.clone()
    }

    /// Convenience accessor for the current session value.
    pub fn session(&self) -> Session {
        self.state.session()
    }

    async fn run_bootstrap(&self) {
        match self.provider.get_session().await {
            Ok(session) if session.is_authenticated() => {
                info!("Session restored from identity provider");
                self.state.publish_session(session);
                self.register_push();
                return;
            }
            Ok(_) => {
                debug!("No active remote session");
                self.register_push();
            }
            Err(e) => {
                warn!("Identity provider unavailable at startup: {}", e);
            }
        }

        match self.fallback.read().await {
            Some(identity) => {
                info!("Demo identity '{}' restored from local store", identity.email);
                self.state.publish_session(Session::authenticated(identity));
            }
            None => {
                self.state.publish_session(Session::anonymous());
            }
        }
    }

    /// Create an account with the remote provider, or synthesize a local
    /// demo identity when the provider is unavailable.
    ///
    /// A remote success additionally kicks off a fire-and-forget profile
    /// record write; its failure is logged and never affects this call.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> AuthResult<Identity> {
        let generation = self.push_generation.load(Ordering::SeqCst);
        match self.provider.sign_up(email, password, display_name).await {
            Ok(identity) => {
                info!("Signed up '{}' with identity provider", identity.email);
                self.spawn_profile_write(&identity);
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(AuthError::Unavailable(reason)) => {
                warn!("Sign-up degraded to demo identity: {}", reason);
                let identity = Identity::demo(email, display_name);
                self.fallback.write(&identity).await;
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                self.state.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Authenticate with the remote provider, or synthesize a local demo
    /// identity when the provider is unavailable.
    ///
    /// The fallback path accepts any email/password combination without a
    /// password check. That is the intended offline/demo-mode policy, not an
    /// oversight; do not tighten it here.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Identity> {
        let generation = self.push_generation.load(Ordering::SeqCst);
        match self.provider.sign_in(email, password).await {
            Ok(identity) => {
                info!("Signed in '{}' with identity provider", identity.email);
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(AuthError::Unavailable(reason)) => {
                warn!("Sign-in degraded to demo identity: {}", reason);
                let identity = Identity::demo(email, "");
                self.fallback.write(&identity).await;
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                self.state.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Redirect-based OAuth sign-in. When the provider (or the OAuth flow
    /// itself) is unavailable, degrades to the fixed-shape demo identity.
    pub async fn sign_in_with_oauth(&self, provider_name: &str) -> AuthResult<Identity> {
        let generation = self.push_generation.load(Ordering::SeqCst);
        match self.provider.sign_in_with_oauth(provider_name).await {
            Ok(identity) => {
                info!("OAuth sign-in completed for '{}'", identity.email);
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(AuthError::Unavailable(reason)) => {
                warn!("OAuth sign-in degraded to demo identity: {}", reason);
                let identity = Identity::demo_oauth();
                self.fallback.write(&identity).await;
                self.apply_session(generation, Session::authenticated(identity.clone()));
                Ok(identity)
            }
            Err(e) => {
                self.state.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Sign out. The remote call is best-effort: its failure is logged, the
    /// local slot is cleared and the session set anonymous regardless, so the
    /// UI is never left stuck signed-in.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!("Remote sign-out failed, clearing local session anyway: {}", e);
        }
        self.fallback.clear().await;
        self.state.publish_session(Session::anonymous());
    }

    /// Request a password-reset email. There is no local equivalent, so an
    /// unavailable provider is surfaced as a failure.
    pub async fn reset_password(&self, email: &str) -> AuthResult<()> {
        match self.provider.reset_password(email).await {
            Ok(()) => {
                self.state.clear_error();
                Ok(())
            }
            Err(e) => {
                self.state.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Update the current account's password. There is no local equivalent,
    /// so an unavailable provider is surfaced as a failure.
    pub async fn update_password(&self, new_password: &str) -> AuthResult<()> {
        match self.provider.update_password(new_password).await {
            Ok(()) => {
                self.state.clear_error();
                Ok(())
            }
            Err(e) => {
                self.state.publish_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Release the push subscription. Called once at teardown.
    pub fn shutdown(&self) {
        if let Some(subscription) = self.subscription.lock().expect("subscription lock").take() {
            subscription.unsubscribe();
        }
    }

    /// Register for out-of-band session changes. A pushed session is
    /// authoritative: it bumps the generation counter and overwrites the
    /// current session unconditionally.
    fn register_push(&self) {
        let state = self.state.clone();
        let generation = self.push_generation.clone();
        let callback = Box::new(move |session: Session| {
            generation.fetch_add(1, Ordering::SeqCst);
            state.publish_session(session);
        });
        match self.provider.on_session_change(callback) {
            Ok(subscription) => {
                *self.subscription.lock().expect("subscription lock") = Some(subscription);
            }
            Err(e) => {
                debug!("Proceeding without push session updates: {}", e);
            }
        }
    }

    /// Publish an operation's computed session unless a push notification
    /// arrived while the operation was in flight; the pushed session wins.
    fn apply_session(&self, generation: u64, session: Session) {
        if self.push_generation.load(Ordering::SeqCst) != generation {
            debug!("Operation result superseded by a pushed session; keeping the push");
            return;
        }
        self.state.publish_session(session);
    }

    /// Fire-and-forget profile record creation. Never awaited by the caller,
    /// never retried, never rolled back.
    fn spawn_profile_write(&self, identity: &Identity) {
        let profiles = self.profiles.clone();
        let record = ProfileRecord::for_identity(identity);
        tokio::spawn(async move {
            if let Err(e) = profiles.create_profile(&record).await {
                warn!("Profile record creation failed (ignored): {}", e);
            }
        });
    }
}
