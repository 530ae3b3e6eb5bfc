//! Internal Diesel row structs for registry tables.
//!
//! These types are implementation details of the persistence layer and must
//! never be exposed to the domain. Conversions into domain records live here
//! so both adapters decode rows the same way.

use std::collections::BTreeMap;

use diesel::prelude::*;
use serde_json::Value;

use crate::domain::{AttributeKey, DisplayName, Domain, DomainId, DomainUser, RoleMap, RoleName, Uid};

use super::schema::{domain_users, domains};

/// Row struct for reading from the domains table.
///
/// Derives `QueryableByName` as well so raw `UPDATE … RETURNING` statements
/// decode into the same type.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = domains)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DomainRow {
    pub id: String,
    pub owner_uid: i64,
    pub name: Option<String>,
    pub gravatar: Option<String>,
    pub roles: Value,
}

/// Changeset for `edit`; `None` members are left untouched.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = domains)]
pub(crate) struct DomainPatchRow<'a> {
    pub name: Option<&'a str>,
    pub gravatar: Option<&'a str>,
    pub roles: Option<Value>,
}

/// Changeset for `unset`; `Some(None)` writes `NULL`.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = domains)]
pub(crate) struct ClearDomainFieldsRow {
    pub name: Option<Option<String>>,
    pub gravatar: Option<Option<String>>,
    pub roles: Option<Value>,
}

/// Insertable struct for creating domain records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = domains)]
pub(crate) struct NewDomainRow<'a> {
    pub id: &'a str,
    pub owner_uid: i64,
    pub name: Option<&'a str>,
    pub gravatar: Option<&'a str>,
    pub roles: Value,
}

impl<'a> NewDomainRow<'a> {
    pub(crate) fn from_domain(domain: &'a Domain) -> Self {
        Self {
            id: domain.id.as_str(),
            owner_uid: domain.owner_uid.get(),
            name: domain.name.as_ref().map(DisplayName::as_str),
            gravatar: domain.gravatar.as_deref(),
            roles: domain.roles.to_json(),
        }
    }
}

impl TryFrom<DomainRow> for Domain {
    type Error = String;

    fn try_from(row: DomainRow) -> Result<Self, Self::Error> {
        let id = DomainId::new(row.id).map_err(|err| err.to_string())?;
        let name = row
            .name
            .map(DisplayName::new)
            .transpose()
            .map_err(|err| format!("domain {id}: {err}"))?;
        let roles =
            RoleMap::from_json(row.roles).map_err(|err| format!("domain {id} roles: {err}"))?;
        Ok(Self {
            id,
            owner_uid: Uid::new(row.owner_uid),
            name,
            gravatar: row.gravatar,
            roles,
        })
    }
}

/// Row struct for reading from the domain_users table.
#[derive(Debug, Clone, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = domain_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct DomainUserRow {
    pub id: i64,
    pub domain_id: String,
    pub uid: i64,
    pub role: Option<String>,
    pub num_submit: Option<i64>,
    pub num_accept: Option<i64>,
    pub score: Option<i64>,
    pub attributes: Value,
}

impl DomainUserRow {
    /// Decode the row, keeping its storage key for pagination.
    pub(crate) fn into_keyed(self) -> Result<(i64, DomainUser), String> {
        let key = self.id;
        let domain_id = DomainId::new(self.domain_id).map_err(|err| err.to_string())?;
        let role = self
            .role
            .map(RoleName::new)
            .transpose()
            .map_err(|err| format!("domain user {domain_id}/{}: {err}", self.uid))?;
        let attributes = decode_attributes(self.attributes)
            .map_err(|err| format!("domain user {domain_id}/{}: {err}", self.uid))?;
        Ok((
            key,
            DomainUser {
                domain_id,
                uid: Uid::new(self.uid),
                role,
                num_submit: self.num_submit,
                num_accept: self.num_accept,
                score: self.score,
                attributes,
            },
        ))
    }
}

fn decode_attributes(value: Value) -> Result<BTreeMap<AttributeKey, Value>, String> {
    match value {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(key, value)| {
                AttributeKey::new(key)
                    .map(|key| (key, value))
                    .map_err(|err| err.to_string())
            })
            .collect(),
        Value::Null => Ok(BTreeMap::new()),
        other => Err(format!("attributes must be a JSON object, found {other}")),
    }
}

/// Encode an attribute map as the stored JSON object.
pub(crate) fn encode_attributes(attributes: &BTreeMap<AttributeKey, Value>) -> Value {
    Value::Object(
        attributes
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    )
}
