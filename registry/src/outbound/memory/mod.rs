//! In-process adapters for embedding the registry without PostgreSQL.

mod in_memory_registry_store;

pub use in_memory_registry_store::InMemoryRegistryStore;
