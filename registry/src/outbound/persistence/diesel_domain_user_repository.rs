//! PostgreSQL-backed `DomainUserRepository` implementation using Diesel ORM.
//!
//! Writes are single `INSERT … ON CONFLICT (domain_id, uid) DO UPDATE …
//! RETURNING` statements, so creating the record, applying the change, and
//! reading the result happen atomically. Increments add to the stored value
//! inside that statement and never read it first.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Array, BigInt, Bool, Jsonb, Nullable, Text};
use diesel_async::RunQueryDsl;
use serde_json::Value;

use crate::domain::ports::{DomainUserRepository, DomainUserRepositoryError, Page};
use crate::domain::{
    Counter, DomainId, DomainUser, DomainUserFilter, DomainUserPatch, RoleName, Uid, UserField,
};

use super::diesel_basic_error_mapping::{
    map_basic_diesel_error, map_basic_pool_error, overfetch_limit,
};
use super::models::{DomainUserRow, encode_attributes};
use super::pool::{DbPool, PoolError};
use super::schema::domain_users;

const UPSERT_SET_SQL: &str = r#"
INSERT INTO domain_users (domain_id, uid, role, num_submit, num_accept, score, attributes)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (domain_id, uid) DO UPDATE SET
    role = COALESCE(EXCLUDED.role, domain_users.role),
    num_submit = COALESCE(EXCLUDED.num_submit, domain_users.num_submit),
    num_accept = COALESCE(EXCLUDED.num_accept, domain_users.num_accept),
    score = COALESCE(EXCLUDED.score, domain_users.score),
    attributes = domain_users.attributes || EXCLUDED.attributes
RETURNING id, domain_id, uid, role, num_submit, num_accept, score, attributes
"#;

const UPSERT_CLEAR_SQL: &str = r#"
INSERT INTO domain_users (domain_id, uid)
VALUES ($1, $2)
ON CONFLICT (domain_id, uid) DO UPDATE SET
    role = CASE WHEN $3 THEN NULL ELSE domain_users.role END,
    num_submit = CASE WHEN $4 THEN NULL ELSE domain_users.num_submit END,
    num_accept = CASE WHEN $5 THEN NULL ELSE domain_users.num_accept END,
    score = CASE WHEN $6 THEN NULL ELSE domain_users.score END,
    attributes = domain_users.attributes - $7::text[]
RETURNING id, domain_id, uid, role, num_submit, num_accept, score, attributes
"#;

// Attribute deltas arrive as a JSON object of integers; each is added to the
// stored value (absent or null counts as zero) in the same statement. A stored
// value that is not a JSON integer fails the cast, aborting the whole statement.
const UPSERT_INCREMENT_SQL: &str = r#"
INSERT INTO domain_users (domain_id, uid, num_submit, num_accept, score, attributes)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (domain_id, uid) DO UPDATE SET
    num_submit = CASE WHEN EXCLUDED.num_submit IS NULL THEN domain_users.num_submit
        ELSE COALESCE(domain_users.num_submit, 0) + EXCLUDED.num_submit END,
    num_accept = CASE WHEN EXCLUDED.num_accept IS NULL THEN domain_users.num_accept
        ELSE COALESCE(domain_users.num_accept, 0) + EXCLUDED.num_accept END,
    score = CASE WHEN EXCLUDED.score IS NULL THEN domain_users.score
        ELSE COALESCE(domain_users.score, 0) + EXCLUDED.score END,
    attributes = domain_users.attributes || COALESCE((
        SELECT jsonb_object_agg(
            delta.key,
            CASE
                WHEN domain_users.attributes -> delta.key IS NULL THEN 0
                WHEN jsonb_typeof(domain_users.attributes -> delta.key) = 'null' THEN 0
                WHEN jsonb_typeof(domain_users.attributes -> delta.key) = 'number'
                    THEN (domain_users.attributes ->> delta.key)::bigint
                ELSE ('attribute ' || delta.key || ' is not an integer')::bigint
            END + delta.value::bigint
        )
        FROM jsonb_each_text(EXCLUDED.attributes) AS delta
    ), '{}'::jsonb)
RETURNING id, domain_id, uid, role, num_submit, num_accept, score, attributes
"#;

/// Diesel-backed implementation of the `DomainUserRepository` port.
#[derive(Clone)]
pub struct DieselDomainUserRepository {
    pool: DbPool,
}

impl DieselDomainUserRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DomainUserRepositoryError {
    map_basic_pool_error(error, DomainUserRepositoryError::connection)
}

fn map_diesel_error(
    operation: &'static str,
) -> impl FnOnce(diesel::result::Error) -> DomainUserRepositoryError {
    move |error| {
        map_basic_diesel_error(
            error,
            operation,
            DomainUserRepositoryError::query,
            DomainUserRepositoryError::connection,
        )
    }
}

fn row_to_user(row: DomainUserRow) -> Result<DomainUser, DomainUserRepositoryError> {
    row.into_keyed()
        .map(|(_, user)| user)
        .map_err(DomainUserRepositoryError::query)
}

/// Split increment deltas into the well-known columns and the attribute
/// object bound as JSONB.
struct IncrementBinds {
    num_submit: Option<i64>,
    num_accept: Option<i64>,
    score: Option<i64>,
    attributes: Value,
}

impl IncrementBinds {
    fn new(deltas: &BTreeMap<Counter, i64>) -> Self {
        let mut num_submit = None;
        let mut num_accept = None;
        let mut score = None;
        let mut attributes = serde_json::Map::new();
        for (counter, delta) in deltas {
            match counter {
                Counter::NumSubmit => num_submit = Some(*delta),
                Counter::NumAccept => num_accept = Some(*delta),
                Counter::Score => score = Some(*delta),
                Counter::Attribute(key) => {
                    attributes.insert(key.to_string(), Value::from(*delta));
                }
            }
        }
        Self {
            num_submit,
            num_accept,
            score,
            attributes: Value::Object(attributes),
        }
    }
}

#[async_trait]
impl DomainUserRepository for DieselDomainUserRepository {
    async fn find(
        &self,
        domain_id: &DomainId,
        uid: Uid,
    ) -> Result<Option<DomainUser>, DomainUserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = domain_users::table
            .filter(domain_users::domain_id.eq(domain_id.as_str()))
            .filter(domain_users::uid.eq(uid.get()))
            .select(DomainUserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("find domain user"))?;
        row.map(row_to_user).transpose()
    }

    async fn upsert_set(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        patch: &DomainUserPatch,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: DomainUserRow = sql_query(UPSERT_SET_SQL)
            .bind::<Text, _>(domain_id.as_str())
            .bind::<BigInt, _>(uid.get())
            .bind::<Nullable<Text>, _>(patch.role.as_ref().map(RoleName::as_str))
            .bind::<Nullable<BigInt>, _>(patch.num_submit)
            .bind::<Nullable<BigInt>, _>(patch.num_accept)
            .bind::<Nullable<BigInt>, _>(patch.score)
            .bind::<Jsonb, _>(encode_attributes(&patch.attributes))
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error("set domain user"))?;
        row_to_user(row)
    }

    async fn upsert_clear(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        fields: &BTreeSet<UserField>,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let attribute_keys: Vec<&str> = fields
            .iter()
            .filter_map(|field| match field {
                UserField::Attribute(key) => Some(key.as_str()),
                _ => None,
            })
            .collect();
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: DomainUserRow = sql_query(UPSERT_CLEAR_SQL)
            .bind::<Text, _>(domain_id.as_str())
            .bind::<BigInt, _>(uid.get())
            .bind::<Bool, _>(fields.contains(&UserField::Role))
            .bind::<Bool, _>(fields.contains(&UserField::NumSubmit))
            .bind::<Bool, _>(fields.contains(&UserField::NumAccept))
            .bind::<Bool, _>(fields.contains(&UserField::Score))
            .bind::<Array<Text>, _>(attribute_keys)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error("unset domain user fields"))?;
        row_to_user(row)
    }

    async fn upsert_increment(
        &self,
        domain_id: &DomainId,
        uid: Uid,
        deltas: &BTreeMap<Counter, i64>,
    ) -> Result<DomainUser, DomainUserRepositoryError> {
        let binds = IncrementBinds::new(deltas);
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: DomainUserRow = sql_query(UPSERT_INCREMENT_SQL)
            .bind::<Text, _>(domain_id.as_str())
            .bind::<BigInt, _>(uid.get())
            .bind::<Nullable<BigInt>, _>(binds.num_submit)
            .bind::<Nullable<BigInt>, _>(binds.num_accept)
            .bind::<Nullable<BigInt>, _>(binds.score)
            .bind::<Jsonb, _>(binds.attributes)
            .get_result(&mut conn)
            .await
            .map_err(map_diesel_error("increment domain user"))?;
        row_to_user(row)
    }

    async fn clear_role(
        &self,
        domain_id: &DomainId,
        role: &RoleName,
    ) -> Result<u64, DomainUserRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let cleared = diesel::update(
            domain_users::table
                .filter(domain_users::domain_id.eq(domain_id.as_str()))
                .filter(domain_users::role.eq(role.as_str())),
        )
        .set(domain_users::role.eq(None::<String>))
        .execute(&mut conn)
        .await
        .map_err(map_diesel_error("clear role from domain users"))?;
        Ok(u64::try_from(cleared).unwrap_or(u64::MAX))
    }

    async fn find_page(
        &self,
        filter: &DomainUserFilter,
        after: Option<i64>,
        limit: usize,
    ) -> Result<Page<(i64, DomainUser), i64>, DomainUserRepositoryError> {
        let mut query = domain_users::table
            .select(DomainUserRow::as_select())
            .into_boxed();
        if let Some(domain_id) = &filter.domain_id {
            query = query.filter(domain_users::domain_id.eq(domain_id.as_str().to_owned()));
        }
        if let Some(uid) = filter.uid {
            query = query.filter(domain_users::uid.eq(uid.get()));
        }
        if let Some(uids) = &filter.uids {
            let uids: Vec<i64> = uids.iter().map(|uid| uid.get()).collect();
            query = query.filter(domain_users::uid.eq_any(uids));
        }
        if let Some(role) = &filter.role {
            query = query.filter(domain_users::role.eq(role.as_str().to_owned()));
        }
        if let Some(after) = after {
            query = query.filter(domain_users::id.gt(after));
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DomainUserRow> = query
            .order(domain_users::id.asc())
            .limit(overfetch_limit(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error("page domain users"))?;
        let records = rows
            .into_iter()
            .map(DomainUserRow::into_keyed)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DomainUserRepositoryError::query)?;
        Ok(Page::from_overfetch(records, limit, |(key, _)| *key))
    }
}
