//! Validated identifiers shared by domains, roles, and domain users.
//!
//! Every constructor here runs before the registry touches a store, so a
//! malformed identifier never reaches an adapter.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Validation errors returned by the identifier constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    InvalidDomainId { value: String },
    EmptyName,
    NameTooLong { max: usize },
    NameUntrimmed,
    InvalidRole { value: String },
    InvalidAttributeKey { value: String },
    ReservedAttributeKey { value: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDomainId { value } => write!(
                f,
                "domain id {value:?} must be 1 to {DOMAIN_ID_MAX} characters without whitespace or '/'",
            ),
            Self::EmptyName => write!(f, "name must not be empty"),
            Self::NameTooLong { max } => write!(f, "name must be at most {max} characters"),
            Self::NameUntrimmed => {
                write!(f, "name must not start or end with whitespace")
            }
            Self::InvalidRole { value } => write!(
                f,
                "role {value:?} may only contain letters, digits, or underscores (1 to {ROLE_NAME_MAX} characters)",
            ),
            Self::InvalidAttributeKey { value } => write!(
                f,
                "attribute key {value:?} must start with a letter or underscore and use at most {ATTRIBUTE_KEY_MAX} word characters",
            ),
            Self::ReservedAttributeKey { value } => {
                write!(f, "attribute key {value:?} is reserved for a built-in field")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum length of a domain identifier.
pub const DOMAIN_ID_MAX: usize = 64;
/// Maximum length of a domain display name.
pub const NAME_MAX: usize = 255;
/// Maximum length of a role name.
pub const ROLE_NAME_MAX: usize = 256;
/// Maximum length of a domain-user attribute key.
pub const ATTRIBUTE_KEY_MAX: usize = 64;

/// Field names owned by [`crate::domain::DomainUser`] itself. Extension
/// attributes may not shadow them.
pub const RESERVED_ATTRIBUTE_KEYS: [&str; 6] =
    ["domain_id", "uid", "role", "num_submit", "num_accept", "score"];

static DOMAIN_ID_RE: OnceLock<Regex> = OnceLock::new();
static ROLE_NAME_RE: OnceLock<Regex> = OnceLock::new();
static ATTRIBUTE_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &'static str) -> &'static Regex {
    cell.get_or_init(|| {
        Regex::new(pattern)
            .unwrap_or_else(|error| panic!("pattern {pattern:?} failed to compile: {error}"))
    })
}

fn domain_id_regex() -> &'static Regex {
    compiled(&DOMAIN_ID_RE, r"^[^\s/]{1,64}$")
}

fn role_name_regex() -> &'static Regex {
    compiled(&ROLE_NAME_RE, r"^[_0-9A-Za-z]{1,256}$")
}

fn attribute_key_regex() -> &'static Regex {
    compiled(&ATTRIBUTE_KEY_RE, r"^[A-Za-z_][A-Za-z0-9_]{0,63}$")
}

macro_rules! string_newtype {
    ($name:ident) => {
        impl $name {
            /// Borrow the validated value.
            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_owned(value)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ValidationError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::from_owned(value.to_owned())
            }
        }
    };
}

/// Globally unique tenant identifier.
///
/// ## Invariants
/// - 1 to [`DOMAIN_ID_MAX`] characters.
/// - No whitespace and no `/`.
///
/// # Examples
/// ```
/// use domain_registry::domain::DomainId;
///
/// assert!(DomainId::new("acm-club").is_ok());
/// assert!(DomainId::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DomainId(String);

impl DomainId {
    /// Validate and construct a [`DomainId`].
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_owned(id.into())
    }

    fn from_owned(id: String) -> Result<Self, ValidationError> {
        if domain_id_regex().is_match(&id) {
            Ok(Self(id))
        } else {
            Err(ValidationError::InvalidDomainId { value: id })
        }
    }
}

string_newtype!(DomainId);

impl DomainId {
    /// Wrap a compile-time constant known to satisfy the format rule.
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(domain_id_regex().is_match(id), "invalid static domain id");
        Self(id.to_owned())
    }
}

/// Human readable domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`].
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_owned(name.into())
    }

    fn from_owned(name: String) -> Result<Self, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if name.trim() != name {
            return Err(ValidationError::NameUntrimmed);
        }
        if name.chars().count() > NAME_MAX {
            return Err(ValidationError::NameTooLong { max: NAME_MAX });
        }
        Ok(Self(name))
    }
}

string_newtype!(DisplayName);

/// Name of a role inside a domain's role map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoleName(String);

impl RoleName {
    /// Validate and construct a [`RoleName`].
    pub fn new(role: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_owned(role.into())
    }

    fn from_owned(role: String) -> Result<Self, ValidationError> {
        if role_name_regex().is_match(&role) {
            Ok(Self(role))
        } else {
            Err(ValidationError::InvalidRole { value: role })
        }
    }
}

string_newtype!(RoleName);

impl RoleName {
    /// Wrap a compile-time constant known to satisfy the format rule.
    pub(crate) fn from_static(role: &'static str) -> Self {
        debug_assert!(role_name_regex().is_match(role), "invalid static role name");
        Self(role.to_owned())
    }
}

/// Key of an open-ended domain-user attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AttributeKey(String);

impl AttributeKey {
    /// Validate and construct an [`AttributeKey`].
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        Self::from_owned(key.into())
    }

    fn from_owned(key: String) -> Result<Self, ValidationError> {
        if !attribute_key_regex().is_match(&key) {
            return Err(ValidationError::InvalidAttributeKey { value: key });
        }
        if RESERVED_ATTRIBUTE_KEYS.contains(&key.as_str()) {
            return Err(ValidationError::ReservedAttributeKey { value: key });
        }
        Ok(Self(key))
    }
}

string_newtype!(AttributeKey);

/// Numeric principal identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Uid(i64);

impl Uid {
    /// Wrap a raw user id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// The raw integer value.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Uid {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
