//! Profile store collaborator.
//!
//! A record store keyed by identity id, written once on sign-up. The write is
//! fire-and-forget from the session facade's point of view: failures are
//! logged, never retried, never surfaced, and never rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::{Identity, IdentitySource};

/// The profile row created for a newly signed-up identity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub provider: IdentitySource,
    pub created_at: DateTime<Utc>,
}

impl ProfileRecord {
    pub fn for_identity(identity: &Identity) -> Self {
        ProfileRecord {
            id: identity.id.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            provider: identity.provider,
            created_at: Utc::now(),
        }
    }
}

/// A profile store must be able to persist a record or report why it
/// couldn't. Errors are log-only for the caller.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn create_profile(&self, record: &ProfileRecord) -> Result<(), String>;
}

/// A wrapper for the profile store configuration.
#[derive(Deserialize, Serialize, Debug, JsonSchema)]
pub struct ProfileConfig {
    pub enabled: bool,
    #[serde(flatten)]
    pub backend: Option<RestProfileConfig>,
}

/// Config for the REST profile backend.
#[derive(Deserialize, Serialize, Debug, JsonSchema, Clone)]
pub struct RestProfileConfig {
    /// Project base URL, usually the same as the identity provider's.
    pub url: String,
    pub api_key: String,
    /// Table the profile rows live in.
    #[serde(default = "default_table")]
    pub table: String,
}

fn default_table() -> String {
    "users".to_string()
}

/// Inserts profile rows over the project's REST data API.
pub struct RestProfileStore {
    config: RestProfileConfig,
    client: reqwest::Client,
}

impl RestProfileStore {
    pub fn new(config: &RestProfileConfig) -> Self {
        Self {
            config: config.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ProfileStore for RestProfileStore {
    async fn create_profile(&self, record: &ProfileRecord) -> Result<(), String> {
        let url = format!(
            "{}/rest/v1/{}",
            self.config.url.trim_end_matches('/'),
            self.config.table
        );
        debug!("Creating profile row for identity '{}'", record.id);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.config.api_key)
            .json(record)
            .send()
            .await
            .map_err(|e| format!("profile insert failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(format!("profile insert returned {}: {}", status, body));
        }
        Ok(())
    }
}

/// A no-op store used when no profile backend is configured.
pub struct NoProfileStore;

impl NoProfileStore {
    pub fn new() -> Self {
        NoProfileStore
    }
}

impl Default for NoProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for NoProfileStore {
    async fn create_profile(&self, _record: &ProfileRecord) -> Result<(), String> {
        Err("profile store is disabled".into())
    }
}

/// Creates a concrete profile store based on the ProfileConfig.
pub fn create_profile_store(config: &ProfileConfig) -> Arc<dyn ProfileStore> {
    if !config.enabled {
        info!("Profile store is disabled. Using NoProfileStore.");
        return Arc::new(NoProfileStore::new());
    }
    match &config.backend {
        Some(rest_config) => Arc::new(RestProfileStore::new(rest_config)),
        None => {
            info!("Profile store enabled but no backend configured; using NoProfileStore.");
            Arc::new(NoProfileStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Identity;

    /// Test that the disabled store reports failure without panicking; the
    /// facade only ever logs this.
    #[tokio::test]
    async fn test_no_profile_store_reports_disabled() {
        let store = NoProfileStore::new();
        let record = ProfileRecord::for_identity(&Identity::demo("p@x.com", "Pea"));
        let res = store.create_profile(&record).await;
        assert!(res.is_err(), "Expected create_profile to return an error");
    }

    #[test]
    fn test_record_copies_identity_fields() {
        let identity = Identity::demo("p@x.com", "Pea");
        let record = ProfileRecord::for_identity(&identity);
        assert_eq!(record.id, identity.id);
        assert_eq!(record.email, "p@x.com");
        assert_eq!(record.display_name, "Pea");
        assert_eq!(record.provider, IdentitySource::Demo);
    }
}
