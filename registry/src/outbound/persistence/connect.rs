//! Build a PostgreSQL-backed registry from loaded settings.

use std::sync::Arc;

use crate::config::RegistrySettings;
use crate::domain::DomainRegistry;

use super::diesel_domain_repository::DieselDomainRepository;
use super::diesel_domain_user_repository::DieselDomainUserRepository;
use super::pool::{DbPool, PoolError};

/// Registry over the Diesel adapters sharing one pool.
pub type PostgresRegistry = DomainRegistry<DieselDomainRepository, DieselDomainUserRepository>;

/// Open a pool sized by `settings` and wire both adapters into a registry
/// using the configured stream batch size.
///
/// # Errors
///
/// Returns [`PoolError::Build`] when the pool cannot be constructed.
pub async fn connect(
    database_url: &str,
    settings: &RegistrySettings,
) -> Result<PostgresRegistry, PoolError> {
    let pool = DbPool::new(settings.pool_config(database_url)).await?;
    Ok(DomainRegistry::new(
        Arc::new(DieselDomainRepository::new(pool.clone())),
        Arc::new(DieselDomainUserRepository::new(pool)),
    )
    .with_batch_size(settings.stream_batch_size()))
}
