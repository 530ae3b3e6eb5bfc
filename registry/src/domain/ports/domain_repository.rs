//! Port for persisted domain records.
//!
//! Every mutating method is one atomic conditional write that returns the
//! post-update record, or `None` when no record matched.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::{
    Domain, DomainField, DomainFilter, DomainId, DomainPatch, PermissionMask, RoleName, Uid,
};

use super::{Page, define_port_error};

define_port_error! {
    /// Errors raised by domain repository adapters.
    pub enum DomainRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "domain repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "domain repository query failed: {message}",
        /// An insert collided with an existing primary key.
        DuplicateKey { domain_id: String } =>
            "domain repository rejected duplicate id {domain_id}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// Insert a new record and return it as stored.
    ///
    /// Fails with [`DomainRepositoryError::DuplicateKey`] when the id exists.
    async fn insert(&self, domain: &Domain) -> Result<Domain, DomainRepositoryError>;

    /// Fetch a record by id.
    async fn find_by_id(&self, id: &DomainId) -> Result<Option<Domain>, DomainRepositoryError>;

    /// Fetch up to `limit` records matching `filter` with ids after `after`,
    /// in id order.
    async fn find_page(
        &self,
        filter: &DomainFilter,
        after: Option<DomainId>,
        limit: usize,
    ) -> Result<Page<Domain, DomainId>, DomainRepositoryError>;

    /// Overwrite the fields set in `patch`.
    async fn update(
        &self,
        id: &DomainId,
        patch: &DomainPatch,
    ) -> Result<Option<Domain>, DomainRepositoryError>;

    /// Remove the listed optional fields.
    async fn clear_fields(
        &self,
        id: &DomainId,
        fields: &BTreeSet<DomainField>,
    ) -> Result<Option<Domain>, DomainRepositoryError>;

    /// Set one role map entry, creating it if absent.
    async fn set_role(
        &self,
        id: &DomainId,
        role: &RoleName,
        mask: PermissionMask,
    ) -> Result<Option<Domain>, DomainRepositoryError>;

    /// Remove one role map entry. Removing an absent role still returns the
    /// record.
    async fn remove_role(
        &self,
        id: &DomainId,
        role: &RoleName,
    ) -> Result<Option<Domain>, DomainRepositoryError>;

    /// Set the owner to `new_owner` only if it currently equals `expected`.
    async fn compare_and_set_owner(
        &self,
        id: &DomainId,
        expected: Uid,
        new_owner: Uid,
    ) -> Result<Option<Domain>, DomainRepositoryError>;
}
