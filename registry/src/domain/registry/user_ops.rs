//! Domain-user store operations. Users have no built-in overlay.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};

use super::DomainRegistry;
use super::streams::keyset_stream;
use crate::domain::ports::{DomainRepository, DomainUserRepository};
use crate::domain::{
    Counter, DomainId, DomainUser, DomainUserFilter, DomainUserPatch, Projection, RegistryError,
    RoleName, Uid, UserField,
};

impl<D, U> DomainRegistry<D, U>
where
    D: DomainRepository + 'static,
    U: DomainUserRepository + 'static,
{
    /// Fetch the record of `uid` in `domain_id`.
    pub async fn get_user(
        &self,
        domain_id: &str,
        uid: Uid,
        fields: &Projection<UserField>,
    ) -> Result<Option<DomainUser>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        let found = self.users.find(&id, uid).await?;
        Ok(found.map(|user| user.project(fields)))
    }

    /// Upsert the record and overwrite the fields set in `patch`.
    pub async fn set_user(
        &self,
        domain_id: &str,
        uid: Uid,
        patch: &DomainUserPatch,
    ) -> Result<DomainUser, RegistryError> {
        let id = DomainId::new(domain_id)?;
        Ok(self.users.upsert_set(&id, uid, patch).await?)
    }

    /// Upsert the record and remove the listed fields.
    ///
    /// A record is materialised even when nothing is removed.
    pub async fn unset_user(
        &self,
        domain_id: &str,
        uid: Uid,
        fields: &[UserField],
    ) -> Result<DomainUser, RegistryError> {
        let id = DomainId::new(domain_id)?;
        let fields: BTreeSet<UserField> = fields.iter().cloned().collect();
        Ok(self.users.upsert_clear(&id, uid, &fields).await?)
    }

    /// Assign `role` to the user. The role is not checked against the
    /// domain's role map.
    pub async fn set_user_role(
        &self,
        domain_id: &str,
        uid: Uid,
        role: &str,
    ) -> Result<DomainUser, RegistryError> {
        let role = RoleName::new(role)?;
        self.set_user(domain_id, uid, &DomainUserPatch::default().role(role))
            .await
    }

    /// Remove the user's role assignment.
    pub async fn unset_user_role(
        &self,
        domain_id: &str,
        uid: Uid,
    ) -> Result<DomainUser, RegistryError> {
        self.unset_user(domain_id, uid, &[UserField::Role]).await
    }

    /// Atomically add each delta to its counter, treating absent as zero.
    ///
    /// Concurrent increments never lose updates.
    pub async fn inc_user(
        &self,
        domain_id: &str,
        uid: Uid,
        deltas: &BTreeMap<Counter, i64>,
    ) -> Result<DomainUser, RegistryError> {
        let id = DomainId::new(domain_id)?;
        Ok(self.users.upsert_increment(&id, uid, deltas).await?)
    }

    /// Lazily stream domain-user records matching `filter`.
    pub fn get_multi_user(
        &self,
        filter: DomainUserFilter,
        fields: Projection<UserField>,
    ) -> BoxStream<'static, Result<DomainUser, RegistryError>> {
        let repo = Arc::clone(&self.users);
        let batch_size = self.batch_size;
        keyset_stream(move |after: Option<i64>| {
            let repo = Arc::clone(&repo);
            let filter = filter.clone();
            async move { repo.find_page(&filter, after, batch_size).await }
        })
        .map_err(RegistryError::from)
        .map_ok(move |(_, user)| user.project(&fields))
        .boxed()
    }

    /// Records of `domain_id` for each distinct uid in `uids`, keyed by uid.
    ///
    /// Uids with no record are absent from the map.
    pub async fn get_dict_user_by_uid(
        &self,
        domain_id: &str,
        uids: impl IntoIterator<Item = Uid>,
        fields: Projection<UserField>,
    ) -> Result<HashMap<Uid, DomainUser>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        let uids: BTreeSet<Uid> = uids.into_iter().collect();
        if uids.is_empty() {
            return Ok(HashMap::new());
        }
        let filter = DomainUserFilter {
            domain_id: Some(id),
            uids: Some(uids.into_iter().collect()),
            ..DomainUserFilter::default()
        };
        self.get_multi_user(filter, fields)
            .try_fold(HashMap::new(), |mut found, user| async move {
                found.insert(user.uid, user);
                Ok(found)
            })
            .await
    }

    /// Records of `uid` across every domain, keyed by domain id.
    pub async fn get_dict_user_by_domain_id(
        &self,
        uid: Uid,
        fields: Projection<UserField>,
    ) -> Result<HashMap<DomainId, DomainUser>, RegistryError> {
        self.get_multi_user(DomainUserFilter::for_uid(uid), fields)
            .try_fold(HashMap::new(), |mut found, user| async move {
                found.insert(user.domain_id.clone(), user);
                Ok(found)
            })
            .await
    }
}
