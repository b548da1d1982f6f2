use thiserror::Error;

/// Failure modes of the remote identity provider, as seen by callers.
///
/// `Unavailable` means the provider could not be reached (or is not
/// configured); identity-establishing operations recover from it via the
/// local fallback store. `Rejected` means the provider was reached and said
/// no; it is surfaced verbatim and never triggers fallback, since falling
/// back would grant access after a legitimate denial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl AuthError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AuthError::Unavailable(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, AuthError::Rejected(_))
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
