//! Driven ports for the registry's two persisted collections.

mod macros;
pub(crate) use macros::define_port_error;

mod domain_repository;
mod domain_user_repository;
mod page;

#[cfg(test)]
pub use domain_repository::MockDomainRepository;
pub use domain_repository::{DomainRepository, DomainRepositoryError};
#[cfg(test)]
pub use domain_user_repository::MockDomainUserRepository;
pub use domain_user_repository::{DomainUserRepository, DomainUserRepositoryError};
pub use page::Page;
