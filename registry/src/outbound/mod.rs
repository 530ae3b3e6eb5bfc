//! Outbound adapters implementing the registry's driven ports.
//!
//! - **persistence**: PostgreSQL-backed repositories using Diesel ORM
//! - **memory**: an in-process store implementing both ports, used by tests
//!   and embedders without a database
//!
//! Adapters are thin translators that convert between domain types and
//! storage representations. They contain no business logic.

pub mod memory;
pub mod persistence;
