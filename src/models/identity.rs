use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where an identity originates. `Demo` identities are synthesized locally
/// when the remote provider is unreachable; their ids are only unique within
/// this device.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdentitySource {
    Email,
    Google,
    Demo,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Email => "email",
            IdentitySource::Google => "google",
            IdentitySource::Demo => "demo",
        }
    }
}

/// The `Identity` struct defines the authenticated actor: an opaque id,
/// email, display name, and the provider the identity came from.
///
/// The id is unique within its source only. Switching sources (remote vs.
/// local fallback) can change the id for the same email.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub provider: IdentitySource,
}

impl Identity {
    pub fn new(
        id: String,
        email: String,
        display_name: String,
        provider: IdentitySource,
    ) -> Self {
        Identity {
            id,
            email,
            display_name,
            provider,
        }
    }

    /// Synthesize a local demo identity with a fresh opaque id.
    ///
    /// An empty display name falls back to the local part of the email, the
    /// same default the sign-in form applies.
    pub fn demo(email: &str, display_name: &str) -> Self {
        let display_name = if display_name.is_empty() {
            email.split('@').next().unwrap_or(email).to_string()
        } else {
            display_name.to_string()
        };
        Identity {
            id: format!("demo-{}", uuid::Uuid::new_v4()),
            email: email.to_string(),
            display_name,
            provider: IdentitySource::Demo,
        }
    }

    /// The fixed-shape demo identity used when OAuth sign-in degrades to
    /// the local fallback.
    pub fn demo_oauth() -> Self {
        Identity {
            id: format!("demo-google-{}", uuid::Uuid::new_v4()),
            email: "demo.google@example.com".to_string(),
            display_name: "Demo Google User".to_string(),
            provider: IdentitySource::Demo,
        }
    }
}

// Simple tests to verify identity construction and demo synthesis.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_identity_defaults_display_name() {
        let identity = Identity::demo("ann@example.com", "");
        assert_eq!(identity.email, "ann@example.com");
        assert_eq!(identity.display_name, "ann");
        assert_eq!(identity.provider, IdentitySource::Demo);
        assert!(identity.id.starts_with("demo-"));
    }

    #[test]
    fn test_demo_identities_get_fresh_ids() {
        let a = Identity::demo("a@x.com", "A");
        let b = Identity::demo("a@x.com", "A");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_demo_oauth_shape() {
        let identity = Identity::demo_oauth();
        assert_eq!(identity.email, "demo.google@example.com");
        assert_eq!(identity.display_name, "Demo Google User");
        assert_eq!(identity.provider, IdentitySource::Demo);
        assert!(identity.id.starts_with("demo-google-"));
    }

    #[test]
    fn test_identity_source_serializes_lowercase() {
        let json = serde_json::to_string(&IdentitySource::Google).unwrap();
        assert_eq!(json, "\"google\"");
        assert_eq!(IdentitySource::Demo.as_str(), "demo");
    }
}
