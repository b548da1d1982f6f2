use std::sync::Arc;

use fitroom_session::profile::NoProfileStore;
use fitroom_session::providers::rest::{RestIdentityProvider, RestProviderConfig};
use fitroom_session::session::SessionManager;
use fitroom_session::store::FallbackStore;

/// Nothing listens here; connection attempts fail fast.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

pub fn rest_config(url: &str) -> RestProviderConfig {
    RestProviderConfig {
        name: "test-provider".to_string(),
        url: url.to_string(),
        api_key: "test-anon-key".to_string(),
        refresh_interval_secs: 1,
        oauth_redirect_port: 0,
        session_cache_path: None,
    }
}

pub async fn build_manager(url: &str, fallback: Arc<dyn FallbackStore>) -> SessionManager {
    let provider = Arc::new(RestIdentityProvider::new(&rest_config(url)));
    SessionManager::bootstrap(provider, fallback, Arc::new(NoProfileStore::new())).await
}
