//! Domain primitives and the registry service.
//!
//! Purpose: define the strongly typed tenant model (domains, role maps,
//! per-domain users), the built-in overlay, and the [`DomainRegistry`] that
//! enforces their invariants over the driven ports in [`ports`].
//!
//! Public surface:
//! - `DomainId`, `DisplayName`, `RoleName`, `AttributeKey`, `Uid`: validated
//!   identifiers.
//! - `Domain`, `RoleMap`, `PermissionMask`: tenant records.
//! - `DomainUser` and its patch, field, and counter types.
//! - `BuiltinCatalog`: reserved, immutable domains.
//! - `DomainRegistry`, `RegistryError`, `ErrorCode`: the service and its
//!   errors.

pub mod builtin;
pub mod domain_record;
pub mod domain_user;
pub mod error;
pub mod identifiers;
pub mod ports;
pub mod projection;
pub mod registry;
pub mod roles;

pub use self::builtin::{
    BuiltinCatalog, PERM_DEFAULT, PERM_GUEST, ROLE_ADMIN, ROLE_DEFAULT, ROLE_GUEST,
    SYSTEM_DOMAIN_ID, SYSTEM_OWNER_UID,
};
pub use self::domain_record::{
    Domain, DomainEdit, DomainField, DomainFilter, DomainPatch, NewDomainRequest,
    clear_domain_fields,
};
pub use self::domain_user::{
    Counter, DomainUser, DomainUserFilter, DomainUserPatch, IncrementError, UserField,
};
pub use self::error::{ErrorCode, RegistryError};
pub use self::identifiers::{
    AttributeKey, DisplayName, DomainId, RoleName, Uid, ValidationError,
};
pub use self::projection::Projection;
pub use self::registry::{DEFAULT_STREAM_BATCH_SIZE, DomainRegistry};
pub use self::roles::{PermissionMask, RoleMap};

/// Projection over domain fields.
pub type DomainProjection = Projection<DomainField>;
/// Projection over domain-user fields.
pub type UserProjection = Projection<UserField>;
