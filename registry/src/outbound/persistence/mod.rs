//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the registry's driven ports backed by
//! PostgreSQL via Diesel, with async support through `diesel-async` and
//! `bb8` connection pooling.
//!
//! - **Thin adapters**: repositories only translate between rows and domain
//!   records. Validation and the built-in overlay live in the domain.
//! - **One statement per operation**: every port method is a single SQL
//!   statement, so PostgreSQL's row-level atomicity is the only concurrency
//!   control needed.
//! - **Internal models**: row structs (`models.rs`) and the schema
//!   (`schema.rs`) never leave this module.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use domain_registry::domain::DomainRegistry;
//! use domain_registry::outbound::persistence::{
//!     DbPool, DieselDomainRepository, DieselDomainUserRepository, PoolConfig, ensure_indexes,
//! };
//!
//! # async fn connect() -> Result<(), Box<dyn std::error::Error>> {
//! let url = "postgres://localhost/registry";
//! ensure_indexes(url).await?;
//! let pool = DbPool::new(PoolConfig::new(url)).await?;
//! let registry = DomainRegistry::new(
//!     Arc::new(DieselDomainRepository::new(pool.clone())),
//!     Arc::new(DieselDomainUserRepository::new(pool)),
//! );
//! # let _ = registry;
//! # Ok(())
//! # }
//! ```

mod connect;
mod diesel_basic_error_mapping;
mod diesel_domain_repository;
mod diesel_domain_user_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use connect::{PostgresRegistry, connect};
pub use diesel_domain_repository::DieselDomainRepository;
pub use diesel_domain_user_repository::DieselDomainUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, ensure_indexes, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
