//! Field projections applied to records returned by read operations.

use std::collections::BTreeSet;

/// Selects which optional fields of a record a caller wants back.
///
/// Identity fields are always returned; a projection only trims the rest.
///
/// # Examples
/// ```
/// use domain_registry::domain::{DomainField, Projection};
///
/// let only_name = Projection::only([DomainField::Name]);
/// assert!(only_name.includes(&DomainField::Name));
/// assert!(!only_name.includes(&DomainField::Roles));
/// assert!(Projection::<DomainField>::All.includes(&DomainField::Roles));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection<F: Ord> {
    /// Return every field.
    #[default]
    All,
    /// Return only the listed fields.
    Only(BTreeSet<F>),
}

impl<F: Ord> Projection<F> {
    /// Build a projection keeping only `fields`.
    pub fn only(fields: impl IntoIterator<Item = F>) -> Self {
        Self::Only(fields.into_iter().collect())
    }

    /// Whether `field` survives the projection.
    pub fn includes(&self, field: &F) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(field),
        }
    }
}
