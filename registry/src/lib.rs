//! Multi-tenant domain and role registry.
//!
//! The [`domain`] module holds the records, validation rules, the built-in
//! overlay, and the [`domain::DomainRegistry`] service. Storage lives behind
//! the ports in [`domain::ports`], implemented by the adapters in
//! [`outbound`].

pub mod config;
pub mod domain;
pub mod outbound;
