//! Built-in domains that shadow the persisted store.
//!
//! The catalog is built once per process and never mutated. Reads of a
//! built-in id return the catalog record whole; writes against one are no-ops.

use std::sync::OnceLock;

use super::{Domain, DomainId, PermissionMask, RoleMap, RoleName, Uid};

/// Identifier of the always-present system domain.
pub const SYSTEM_DOMAIN_ID: &str = "system";
/// Principal that owns every built-in domain.
pub const SYSTEM_OWNER_UID: Uid = Uid::new(0);

/// Role granted to anonymous visitors.
pub const ROLE_GUEST: &str = "guest";
/// Role granted to signed-in members without an explicit assignment.
pub const ROLE_DEFAULT: &str = "default";
/// Role granted to domain administrators.
pub const ROLE_ADMIN: &str = "admin";

/// Permission bits held by the guest role.
pub const PERM_GUEST: PermissionMask = PermissionMask::new(0b0001);
/// Permission bits held by the default role.
pub const PERM_DEFAULT: PermissionMask = PermissionMask::new(0b0111);

static STANDARD: OnceLock<BuiltinCatalog> = OnceLock::new();

impl RoleMap {
    /// Role map assigned to new domains when the caller supplies none.
    pub fn default_system_roles() -> Self {
        [
            (RoleName::from_static(ROLE_GUEST), PERM_GUEST),
            (RoleName::from_static(ROLE_DEFAULT), PERM_DEFAULT),
            (RoleName::from_static(ROLE_ADMIN), PermissionMask::ALL),
        ]
        .into_iter()
        .collect()
    }
}

/// Read-only lookup table of reserved domains.
///
/// # Examples
/// ```
/// use domain_registry::domain::{BuiltinCatalog, SYSTEM_DOMAIN_ID};
///
/// let catalog = BuiltinCatalog::standard();
/// assert!(catalog.contains(SYSTEM_DOMAIN_ID));
/// assert!(catalog.get("algo").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinCatalog {
    domains: Vec<Domain>,
}

impl BuiltinCatalog {
    /// Build a catalog from explicit records.
    pub fn new(domains: Vec<Domain>) -> Self {
        Self { domains }
    }

    /// The process-wide catalog holding the system domain.
    pub fn standard() -> &'static Self {
        STANDARD.get_or_init(|| Self::new(vec![system_domain()]))
    }

    /// Look up a built-in record by id.
    pub fn get(&self, domain_id: &str) -> Option<&Domain> {
        self.domains
            .iter()
            .find(|domain| domain.id.as_str() == domain_id)
    }

    /// Whether `domain_id` names a built-in domain.
    pub fn contains(&self, domain_id: &str) -> bool {
        self.get(domain_id).is_some()
    }
}

fn system_domain() -> Domain {
    Domain {
        id: DomainId::from_static(SYSTEM_DOMAIN_ID),
        owner_uid: SYSTEM_OWNER_UID,
        name: None,
        gravatar: None,
        roles: RoleMap::default_system_roles(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn standard_catalog_holds_the_system_domain() {
        let system = BuiltinCatalog::standard()
            .get(SYSTEM_DOMAIN_ID)
            .expect("system domain present");
        assert_eq!(system.owner_uid, SYSTEM_OWNER_UID);
        assert_eq!(system.roles, RoleMap::default_system_roles());
    }

    #[rstest]
    fn standard_catalog_is_shared() {
        assert!(std::ptr::eq(
            BuiltinCatalog::standard(),
            BuiltinCatalog::standard()
        ));
    }

    #[rstest]
    fn default_roles_grant_admin_every_bit() {
        let roles = RoleMap::default_system_roles();
        let admin = RoleName::new(ROLE_ADMIN).expect("valid role");
        assert_eq!(roles.get(&admin), Some(PermissionMask::ALL));
        assert_eq!(roles.len(), 3);
    }

    #[rstest]
    #[case("System")]
    #[case("system2")]
    #[case("")]
    fn lookup_is_exact(#[case] id: &str) {
        assert!(!BuiltinCatalog::standard().contains(id));
    }
}
