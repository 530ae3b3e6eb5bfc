//! Registry-level error types.
//!
//! These errors are transport agnostic. Callers map them onto whatever
//! envelope their protocol needs, usually via [`RegistryError::code`].

use serde::{Deserialize, Serialize};

use super::ValidationError;
use super::ports::{DomainRepositoryError, DomainUserRepositoryError};

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// The request collides with existing state.
    Conflict,
    /// A backing store could not be reached.
    ServiceUnavailable,
    /// An unexpected error occurred inside a store.
    InternalError,
}

/// Errors returned by [`crate::domain::DomainRegistry`] operations.
///
/// Writes against built-in domains are not errors: they return `Ok(None)`.
///
/// # Examples
/// ```
/// use domain_registry::domain::{ErrorCode, RegistryError};
///
/// let err = RegistryError::domain_already_exists("system");
/// assert_eq!(err.code(), ErrorCode::Conflict);
/// assert_eq!(err.to_string(), "domain system already exists");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An argument failed format validation before any store access.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The domain id is built-in or already persisted.
    #[error("domain {domain_id} already exists")]
    DomainAlreadyExists { domain_id: String },
    /// The domain store failed.
    #[error(transparent)]
    DomainStore(#[from] DomainRepositoryError),
    /// The domain-user store failed.
    #[error(transparent)]
    UserStore(#[from] DomainUserRepositoryError),
}

impl RegistryError {
    /// Convenience constructor for [`RegistryError::DomainAlreadyExists`].
    pub fn domain_already_exists(domain_id: impl Into<String>) -> Self {
        Self::DomainAlreadyExists {
            domain_id: domain_id.into(),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidRequest,
            Self::DomainAlreadyExists { .. } => ErrorCode::Conflict,
            Self::DomainStore(DomainRepositoryError::Connection { .. })
            | Self::UserStore(DomainUserRepositoryError::Connection { .. }) => {
                ErrorCode::ServiceUnavailable
            }
            Self::DomainStore(DomainRepositoryError::DuplicateKey { .. }) => ErrorCode::Conflict,
            Self::DomainStore(DomainRepositoryError::Query { .. })
            | Self::UserStore(DomainUserRepositoryError::Query { .. }) => ErrorCode::InternalError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(
        RegistryError::from(ValidationError::EmptyName),
        ErrorCode::InvalidRequest
    )]
    #[case(RegistryError::domain_already_exists("algo"), ErrorCode::Conflict)]
    #[case(
        RegistryError::from(DomainRepositoryError::connection("refused")),
        ErrorCode::ServiceUnavailable
    )]
    #[case(
        RegistryError::from(DomainUserRepositoryError::query("syntax")),
        ErrorCode::InternalError
    )]
    fn codes_follow_error_category(#[case] error: RegistryError, #[case] expected: ErrorCode) {
        assert_eq!(error.code(), expected);
    }

    #[rstest]
    fn store_errors_display_unchanged() {
        let inner = DomainUserRepositoryError::connection("pool closed");
        let outer = RegistryError::from(inner.clone());
        assert_eq!(outer.to_string(), inner.to_string());
    }

    #[rstest]
    fn error_code_serialises_in_snake_case() {
        let encoded = serde_json::to_string(&ErrorCode::ServiceUnavailable).expect("encodes");
        assert_eq!(encoded, "\"service_unavailable\"");
    }
}
