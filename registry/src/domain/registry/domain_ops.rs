//! Domain store operations, guarded by the built-in overlay.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::DomainRegistry;
use super::streams::keyset_stream;
use crate::domain::ports::{DomainRepository, DomainRepositoryError, DomainUserRepository};
use crate::domain::{
    DisplayName, Domain, DomainEdit, DomainField, DomainFilter, DomainId, NewDomainRequest,
    PermissionMask, Projection, RegistryError, RoleMap, RoleName, Uid,
};

impl<D, U> DomainRegistry<D, U>
where
    D: DomainRepository + 'static,
    U: DomainUserRepository + 'static,
{
    /// Create a domain and return it as stored.
    ///
    /// Roles default to [`RoleMap::default_system_roles`].
    ///
    /// # Errors
    ///
    /// - [`RegistryError::Validation`] for a malformed id or name.
    /// - [`RegistryError::DomainAlreadyExists`] when the id is built-in or a
    ///   persisted record already holds it, including when a concurrent
    ///   `add` won the race.
    pub async fn add(&self, request: NewDomainRequest) -> Result<Domain, RegistryError> {
        let NewDomainRequest {
            domain_id,
            owner_uid,
            roles,
            name,
            gravatar,
        } = request;
        let id = DomainId::new(domain_id)?;
        let name = name.map(DisplayName::new).transpose()?;
        if self.builtins.contains(id.as_str()) {
            return Err(RegistryError::domain_already_exists(id));
        }

        let domain = Domain {
            id,
            owner_uid,
            name,
            gravatar,
            roles: roles.unwrap_or_else(RoleMap::default_system_roles),
        };
        match self.domains.insert(&domain).await {
            Ok(stored) => {
                info!(domain_id = %stored.id, owner_uid = %stored.owner_uid, "domain created");
                Ok(stored)
            }
            Err(DomainRepositoryError::DuplicateKey { .. }) => {
                Err(RegistryError::domain_already_exists(domain.id))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Fetch a domain. Built-in domains are returned whole, ignoring
    /// `fields`.
    pub async fn get(
        &self,
        domain_id: &str,
        fields: &Projection<DomainField>,
    ) -> Result<Option<Domain>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        if let Some(builtin) = self.builtins.get(id.as_str()) {
            return Ok(Some(builtin.clone()));
        }
        let found = self.domains.find_by_id(&id).await?;
        Ok(found.map(|domain| domain.project(fields)))
    }

    /// Lazily stream persisted domains matching `filter`.
    ///
    /// Built-in domains are not part of the sequence. Nothing is fetched
    /// until the stream is polled.
    pub fn get_multi(
        &self,
        filter: DomainFilter,
        fields: Projection<DomainField>,
    ) -> BoxStream<'static, Result<Domain, RegistryError>> {
        let repo = Arc::clone(&self.domains);
        let batch_size = self.batch_size;
        keyset_stream(move |after: Option<DomainId>| {
            let repo = Arc::clone(&repo);
            let filter = filter.clone();
            async move { repo.find_page(&filter, after, batch_size).await }
        })
        .map_err(RegistryError::from)
        .map_ok(move |domain| domain.project(&fields))
        .boxed()
    }

    /// Apply a partial update and return the updated record.
    ///
    /// Returns `Ok(None)` for built-in ids and for ids with no record. An
    /// empty edit issues no write and returns the current record.
    pub async fn edit(
        &self,
        domain_id: &str,
        edit: DomainEdit,
    ) -> Result<Option<Domain>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        if self.builtins.contains(id.as_str()) {
            debug!(domain_id = %id, "edit of built-in domain ignored");
            return Ok(None);
        }
        let patch = edit.validate()?;
        if patch.is_empty() {
            return Ok(self.domains.find_by_id(&id).await?);
        }
        Ok(self.domains.update(&id, &patch).await?)
    }

    /// Remove optional fields and return the updated record.
    ///
    /// There is no built-in guard: a built-in id reaches the store, which
    /// holds no record for it.
    pub async fn unset(
        &self,
        domain_id: &str,
        fields: &[DomainField],
    ) -> Result<Option<Domain>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        if self.builtins.contains(id.as_str()) {
            warn!(domain_id = %id, "unset targets a built-in domain id");
        }
        let fields: BTreeSet<DomainField> = fields.iter().copied().collect();
        if fields.is_empty() {
            return Ok(self.domains.find_by_id(&id).await?);
        }
        Ok(self.domains.clear_fields(&id, &fields).await?)
    }

    /// Set `roles[role] = mask`, creating the entry if absent.
    pub async fn set_role(
        &self,
        domain_id: &str,
        role: &str,
        mask: PermissionMask,
    ) -> Result<Option<Domain>, RegistryError> {
        let role = RoleName::new(role)?;
        let id = DomainId::new(domain_id)?;
        if self.builtins.contains(id.as_str()) {
            debug!(domain_id = %id, %role, "set_role on built-in domain ignored");
            return Ok(None);
        }
        Ok(self.domains.set_role(&id, &role, mask).await?)
    }

    /// Remove a role, first clearing it from every user of the domain.
    ///
    /// The two steps are separate atomic writes. Re-running after a failure
    /// between them finishes both.
    pub async fn delete_role(
        &self,
        domain_id: &str,
        role: &str,
    ) -> Result<Option<Domain>, RegistryError> {
        let role = RoleName::new(role)?;
        let id = DomainId::new(domain_id)?;
        if self.builtins.contains(id.as_str()) {
            debug!(domain_id = %id, %role, "delete_role on built-in domain ignored");
            return Ok(None);
        }
        let cleared = self.users.clear_role(&id, &role).await?;
        debug!(domain_id = %id, %role, cleared, "role cleared from domain users");
        Ok(self.domains.remove_role(&id, &role).await?)
    }

    /// Hand the domain to `new_owner` if `old_owner` still owns it.
    ///
    /// A stale owner yields `Ok(None)`, the same as a missing or built-in id.
    pub async fn transfer(
        &self,
        domain_id: &str,
        old_owner: Uid,
        new_owner: Uid,
    ) -> Result<Option<Domain>, RegistryError> {
        let id = DomainId::new(domain_id)?;
        if self.builtins.contains(id.as_str()) {
            debug!(domain_id = %id, "transfer of built-in domain ignored");
            return Ok(None);
        }
        Ok(self
            .domains
            .compare_and_set_owner(&id, old_owner, new_owner)
            .await?)
    }
}
