//! Port for per-domain user records.
//!
//! Writes are upserts keyed by `(domain_id, uid)`: each one creates the record
//! if absent, applies its change, and returns the result in one atomic step.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;

use crate::domain::{
    Counter, DomainId, DomainUser, DomainUserFilter, DomainUserPatch, RoleName, Uid, UserField,
};

use super::{Page, define_port_error};

define_port_error! {
    /// Errors raised by domain-user repository adapters.
    pub enum DomainUserRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "domain user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "domain user repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainUserRepository: Send + Sync {
    /// Fetch the record for `(domain_id, uid)`.
    async fn find(
        &self,
        domain_id: &DomainId,
        uid: Uid,
    ) -> Result<Option<DomainUser>, DomainUserRepositoryError>;

    /// Upsert and overwrite the fields set in `patch`.
    async fn upsert_set(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        patch: &DomainUserPatch,
    ) -> Result<DomainUser, DomainUserRepositoryError>;

    /// Upsert and remove the listed fields.
    async fn upsert_clear(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        fields: &BTreeSet<UserField>,
    ) -> Result<DomainUser, DomainUserRepositoryError>;

    /// Upsert and add each delta to its counter, treating absent as zero.
    async fn upsert_increment(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        deltas: &BTreeMap<Counter, i64>,
    ) -> Result<DomainUser, DomainUserRepositoryError>;

    /// Clear `role` on every record in `domain_id` that holds it. Returns the
    /// number of records changed.
    async fn clear_role(
        &self,
        domain_id: &DomainId,
        role: &RoleName,
    ) -> Result<u64, DomainUserRepositoryError>;

    /// Fetch up to `limit` records matching `filter` whose storage key follows
    /// `after`, in key order.
    async fn find_page(
        &self,
        filter: &DomainUserFilter,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Page<(i64, DomainUser), i64>, DomainUserRepositoryError>;
}
