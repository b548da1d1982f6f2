//! Application wiring.
//!
//! Builds the session manager and its collaborators from configuration, so
//! the embedding application initializes everything from one YAML file.

use tracing::info;

use crate::config::ConfigV1;
use crate::profile::create_profile_store;
use crate::providers::create_identity_provider;
use crate::session::SessionManager;
use crate::store::create_store;

/// Create the identity provider, fallback store, and profile store from the
/// configuration and bootstrap the session manager.
///
/// Never fails: an unreachable or unconfigured provider degrades to the
/// local fallback path during bootstrap.
pub async fn init(config: &ConfigV1) -> SessionManager {
    let provider = create_identity_provider(&config.provider);
    let fallback = create_store(&config.store);
    let profiles = create_profile_store(&config.profile);

    info!("Bootstrapping session manager with provider '{}'", provider.get_name());
    SessionManager::bootstrap(provider, fallback, profiles).await
}
