//! Domain (tenant) records and the payloads used to create, edit, and query
//! them.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{DisplayName, DomainId, Projection, RoleMap, Uid, ValidationError};

/// A tenant namespace with its owner, display metadata, and role map.
///
/// ## Invariants
/// - `id` is unique across persisted domains and never collides with a
///   built-in domain id.
/// - `owner_uid` changes only through a compare-and-swap transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    /// Primary key.
    pub id: DomainId,
    /// Owning principal.
    pub owner_uid: Uid,
    /// Optional display name.
    pub name: Option<DisplayName>,
    /// Optional gravatar address.
    pub gravatar: Option<String>,
    /// Role name to permission mask mapping.
    pub roles: RoleMap,
}

impl Domain {
    /// Trim the record down to the fields selected by `projection`.
    ///
    /// `id` and `owner_uid` are always kept.
    pub fn project(mut self, projection: &Projection<DomainField>) -> Self {
        if !projection.includes(&DomainField::Name) {
            self.name = None;
        }
        if !projection.includes(&DomainField::Gravatar) {
            self.gravatar = None;
        }
        if !projection.includes(&DomainField::Roles) {
            self.roles = RoleMap::new();
        }
        self
    }
}

/// Optional domain fields, used both for projections and for `unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainField {
    /// The display name.
    Name,
    /// The gravatar address.
    Gravatar,
    /// The role map. Unsetting it leaves an empty map.
    Roles,
}

/// Raw input for creating a domain. Validated by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDomainRequest {
    /// Requested domain id.
    pub domain_id: String,
    /// Owning principal.
    pub owner_uid: Uid,
    /// Initial role map; the system default roles when `None`.
    pub roles: Option<RoleMap>,
    /// Optional display name.
    pub name: Option<String>,
    /// Optional gravatar address.
    pub gravatar: Option<String>,
}

impl NewDomainRequest {
    /// Start a request for `domain_id` owned by `owner_uid`.
    pub fn new(domain_id: impl Into<String>, owner_uid: Uid) -> Self {
        Self {
            domain_id: domain_id.into(),
            owner_uid,
            roles: None,
            name: None,
            gravatar: None,
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the gravatar address.
    pub fn with_gravatar(mut self, gravatar: impl Into<String>) -> Self {
        self.gravatar = Some(gravatar.into());
        self
    }

    /// Replace the default role map.
    pub fn with_roles(mut self, roles: RoleMap) -> Self {
        self.roles = Some(roles);
        self
    }
}

/// Raw field changes for `edit`. There is no owner field: ownership only
/// moves through `transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainEdit {
    /// New display name.
    pub name: Option<String>,
    /// New gravatar address.
    pub gravatar: Option<String>,
    /// Replacement role map.
    pub roles: Option<RoleMap>,
}

impl DomainEdit {
    /// Set the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the gravatar address.
    pub fn gravatar(mut self, gravatar: impl Into<String>) -> Self {
        self.gravatar = Some(gravatar.into());
        self
    }

    /// Replace the whole role map.
    pub fn roles(mut self, roles: RoleMap) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Validate the edit into a [`DomainPatch`].
    pub fn validate(self) -> Result<DomainPatch, ValidationError> {
        Ok(DomainPatch {
            name: self.name.map(DisplayName::new).transpose()?,
            gravatar: self.gravatar,
            roles: self.roles,
        })
    }
}

/// Validated partial update applied by a single conditional write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainPatch {
    /// New display name.
    pub name: Option<DisplayName>,
    /// New gravatar address.
    pub gravatar: Option<String>,
    /// Replacement role map.
    pub roles: Option<RoleMap>,
}

impl DomainPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.gravatar.is_none() && self.roles.is_none()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, domain: &mut Domain) {
        if let Some(name) = &self.name {
            domain.name = Some(name.clone());
        }
        if let Some(gravatar) = &self.gravatar {
            domain.gravatar = Some(gravatar.clone());
        }
        if let Some(roles) = &self.roles {
            domain.roles = roles.clone();
        }
    }
}

/// Remove `fields` from an in-memory record.
pub fn clear_domain_fields(domain: &mut Domain, fields: &BTreeSet<DomainField>) {
    for field in fields {
        match field {
            DomainField::Name => domain.name = None,
            DomainField::Gravatar => domain.gravatar = None,
            DomainField::Roles => domain.roles = RoleMap::new(),
        }
    }
}

/// Filter for streaming persisted domains. Empty matches every domain.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainFilter {
    /// Only domains owned by this principal.
    pub owner_uid: Option<Uid>,
    /// Only domains whose id is in this list.
    pub ids: Option<Vec<DomainId>>,
}

impl DomainFilter {
    /// Match every persisted domain.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match domains owned by `owner_uid`.
    pub fn owned_by(owner_uid: Uid) -> Self {
        Self {
            owner_uid: Some(owner_uid),
            ids: None,
        }
    }

    /// Whether `domain` satisfies the filter.
    pub fn matches(&self, domain: &Domain) -> bool {
        self.owner_uid.is_none_or(|owner| domain.owner_uid == owner)
            && self
                .ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&domain.id))
    }
}
