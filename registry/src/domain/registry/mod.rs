//! The domain/role registry service.
//!
//! `DomainRegistry` validates every argument, consults the built-in catalog
//! first, and only then issues a single atomic request per step against the
//! driven ports. It holds no mutable state of its own.

use std::sync::Arc;

use super::BuiltinCatalog;
use super::ports::{DomainRepository, DomainUserRepository};

mod domain_ops;
mod streams;
mod user_ops;

#[cfg(test)]
mod tests;

/// Batch size used by lazy sequences when none is configured.
pub const DEFAULT_STREAM_BATCH_SIZE: usize = 100;

/// Registry of domains, their role maps, and their per-domain users.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use domain_registry::domain::{DomainRegistry, NewDomainRequest, Uid};
/// use domain_registry::outbound::memory::InMemoryRegistryStore;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = Arc::new(InMemoryRegistryStore::new());
/// let registry = DomainRegistry::new(Arc::clone(&store), store);
/// let created = registry
///     .add(NewDomainRequest::new("algo", Uid::new(5)))
///     .await
///     .expect("domain created");
/// assert_eq!(created.owner_uid, Uid::new(5));
/// # });
/// ```
pub struct DomainRegistry<D, U> {
    domains: Arc<D>,
    users: Arc<U>,
    builtins: &'static BuiltinCatalog,
    batch_size: usize,
}

impl<D, U> Clone for DomainRegistry<D, U> {
    fn clone(&self) -> Self {
        Self {
            domains: Arc::clone(&self.domains),
            users: Arc::clone(&self.users),
            builtins: self.builtins,
            batch_size: self.batch_size,
        }
    }
}

impl<D, U> DomainRegistry<D, U>
where
    D: DomainRepository + 'static,
    U: DomainUserRepository + 'static,
{
    /// Create a registry over the given stores and the standard catalog.
    pub fn new(domains: Arc<D>, users: Arc<U>) -> Self {
        Self {
            domains,
            users,
            builtins: BuiltinCatalog::standard(),
            batch_size: DEFAULT_STREAM_BATCH_SIZE,
        }
    }

    /// Set how many records lazy sequences fetch per request. Zero is
    /// treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Records fetched per request by lazy sequences.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}
