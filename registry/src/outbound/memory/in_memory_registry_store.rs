//! In-memory implementation of both registry ports.
//!
//! One mutex guards both collections. Every port method takes the lock once,
//! applies its change, and copies the result out, which gives the same
//! single-request atomicity the PostgreSQL adapters get from one statement.
//! The lock is never held across an `.await`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::ports::{
    DomainRepository, DomainRepositoryError, DomainUserRepository, DomainUserRepositoryError,
    Page,
};
use crate::domain::{
    Counter, Domain, DomainField, DomainFilter, DomainId, DomainPatch, DomainUser,
    DomainUserFilter, DomainUserPatch, PermissionMask, RoleName, Uid, UserField,
    clear_domain_fields,
};

#[derive(Debug, Default)]
struct State {
    domains: BTreeMap<DomainId, Domain>,
    users: BTreeMap<i64, DomainUser>,
    user_keys: HashMap<(DomainId, Uid), i64>,
    next_user_key: i64,
}

impl State {
    fn upsert_user(&mut self, domain_id: &DomainId, uid: Uid) -> &mut DomainUser {
        let identity = (domain_id.clone(), uid);
        let key = match self.user_keys.get(&identity).copied() {
            Some(key) => key,
            None => {
                self.next_user_key += 1;
                self.user_keys.insert(identity, self.next_user_key);
                self.next_user_key
            }
        };
        self.users
            .entry(key)
            .or_insert_with(|| DomainUser::empty(domain_id.clone(), uid))
    }

    fn update_domain(
        &mut self,
        id: &DomainId,
        change: impl FnOnce(&mut Domain),
    ) -> Option<Domain> {
        self.domains.get_mut(id).map(|domain| {
            change(domain);
            domain.clone()
        })
    }
}

/// Registry store kept entirely in process memory.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use domain_registry::domain::DomainRegistry;
/// use domain_registry::outbound::memory::InMemoryRegistryStore;
///
/// let store = Arc::new(InMemoryRegistryStore::new());
/// let _registry = DomainRegistry::new(Arc::clone(&store), store);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRegistryStore {
    state: Mutex<State>,
}

impl InMemoryRegistryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, String> {
        self.state
            .lock()
            .map_err(|_| "in-memory registry state is poisoned".to_owned())
    }

    fn lock_domains(&self) -> Result<MutexGuard<'_, State>, DomainRepositoryError> {
        self.lock().map_err(DomainRepositoryError::query)
    }

    fn lock_users(&self) -> Result<MutexGuard<'_, State>, DomainUserRepositoryError> {
        self.lock().map_err(DomainUserRepositoryError::query)
    }
}

#[async_trait]
impl DomainRepository for InMemoryRegistryStore {
    async fn insert(&self, domain: &Domain) -> Result<Domain, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        if state.domains.contains_key(&domain.id) {
            return Err(DomainRepositoryError::duplicate_key(domain.id.as_str()));
        }
        state.domains.insert(domain.id.clone(), domain.clone());
        Ok(domain.clone())
    }

    async fn find_by_id(&self, id: &DomainId) -> Result<Option<Domain>, DomainRepositoryError> {
        Ok(self.lock_domains()?.domains.get(id).cloned())
    }

    async fn find_page(
        &self,
        filter: &DomainFilter,
        after: Option<DomainId>,
        limit: usize,
    ) -> Result<Page<Domain, DomainId>, DomainRepositoryError> {
        let state = self.lock_domains()?;
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        let rows: Vec<Domain> = state
            .domains
            .range((lower, Bound::Unbounded))
            .map(|(_, domain)| domain)
            .filter(|domain| filter.matches(domain))
            .take(limit.saturating_add(1))
            .cloned()
            .collect();
        Ok(Page::from_overfetch(rows, limit, |domain| domain.id.clone()))
    }

    async fn update(
        &self,
        id: &DomainId,
        patch: &DomainPatch,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        Ok(state.update_domain(id, |domain| patch.apply_to(domain)))
    }

    async fn clear_fields(
        &self,
        id: &DomainId,
        fields: &BTreeSet<DomainField>,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        Ok(state.update_domain(id, |domain| clear_domain_fields(domain, fields)))
    }

    async fn set_role(
        &self,
        id: &DomainId,
        role: &RoleName,
        mask: PermissionMask,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        Ok(state.update_domain(id, |domain| {
            domain.roles.insert(role.clone(), mask);
        }))
    }

    async fn remove_role(
        &self,
        id: &DomainId,
        role: &RoleName,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        Ok(state.update_domain(id, |domain| {
            domain.roles.remove(role);
        }))
    }

    async fn compare_and_set_owner(
        &self,
        id: &DomainId,
        expected: Uid,
        new_owner: Uid,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut state = self.lock_domains()?;
        Ok(state
            .domains
            .get_mut(id)
            .filter(|domain| domain.owner_uid == expected)
            .map(|domain| {
                domain.owner_uid = new_owner;
                domain.clone()
            }))
    }
}

#[async_trait]
impl DomainUserRepository for InMemoryRegistryStore {
    async fn find(
        &self,
        domain_id: &DomainId,
        uid: Uid,
    ) -> Result<Option<DomainUser>, DomainUserRepositoryError> {
        let state = self.lock_users()?;
        Ok(state
            .user_keys
            .get(&(domain_id.clone(), uid))
            .and_then(|key| state.users.get(key))
            .cloned())
    }

    async fn upsert_set(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        patch: &DomainUserPatch,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let mut state = self.lock_users()?;
        let user = state.upsert_user(domain_id, uid);
        user.apply(patch);
        Ok(user.clone())
    }

    async fn upsert_clear(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        fields: &BTreeSet<UserField>,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let mut state = self.lock_users()?;
        let user = state.upsert_user(domain_id, uid);
        user.clear(fields);
        Ok(user.clone())
    }

    async fn upsert_increment(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        deltas: &BTreeMap<Counter, i64>,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let mut state = self.lock_users()?;
        let user = state.upsert_user(domain_id, uid);
        user.increment(deltas)
            .map_err(|err| DomainUserRepositoryError::query(err.to_string()))?;
        Ok(user.clone())
    }

    async fn clear_role(
        &self,
        domain_id: &DomainId,
        role: &RoleName,
    ) -> Result<u64, DomainUserRepositoryError> {
        let mut state = self.lock_users()?;
        let mut cleared = 0;
        for user in state.users.values_mut() {
            if &user.domain_id == domain_id && user.role.as_ref() == Some(role) {
                user.role = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn find_page(
        &self,
        filter: &DomainUserFilter,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Page<(i64, DomainUser), i64>, DomainUserRepositoryError> {
        let state = self.lock_users()?;
        let start = after.map_or(i64::MIN, |key| key.saturating_add(1));
        let rows: Vec<(i64, DomainUser)> = state
            .users
            .range(start..)
            .filter(|(_, user)| filter.matches(user))
            .take(limit.saturating_add(1))
            .map(|(key, user)| (*key, user.clone()))
            .collect();
        Ok(Page::from_overfetch(rows, limit, |(key, _)| *key))
    }
}
