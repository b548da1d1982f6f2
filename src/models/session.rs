use serde::{Deserialize, Serialize};

use super::identity::Identity;

/// A `Session` wraps the current identity, or represents "no authenticated
/// actor". It is a value, never shared mutable structure: every observer
/// receives an immutable snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub identity: Option<Identity>,
}

impl Session {
    pub fn authenticated(identity: Identity) -> Self {
        Session {
            identity: Some(identity),
        }
    }

    pub fn anonymous() -> Self {
        Session { identity: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::{Identity, IdentitySource};

    #[test]
    fn test_anonymous_is_default() {
        assert_eq!(Session::default(), Session::anonymous());
        assert!(!Session::anonymous().is_authenticated());
    }

    #[test]
    fn test_authenticated_carries_identity() {
        let identity = Identity::new(
            "id-1".to_string(),
            "a@x.com".to_string(),
            "Ann".to_string(),
            IdentitySource::Email,
        );
        let session = Session::authenticated(identity.clone());
        assert!(session.is_authenticated());
        assert_eq!(session.identity, Some(identity));
    }
}
