//! PostgreSQL-backed `DomainRepository` implementation using Diesel ORM.
//!
//! Each method issues exactly one statement. Mutations use
//! `UPDATE … RETURNING` so the post-update row comes back atomically; role
//! map edits use JSONB operators inside that single statement.

use std::collections::BTreeSet;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Text};
use diesel_async::RunQueryDsl;

use crate::domain::ports::{DomainRepository, DomainRepositoryError, Page};
use crate::domain::{
    DisplayName, Domain, DomainField, DomainFilter, DomainId, DomainPatch, PermissionMask,
    RoleName, Uid,
};

use super::diesel_basic_error_mapping::{
    is_unique_violation, map_basic_diesel_error, map_basic_pool_error, overfetch_limit,
};
use super::models::{ClearDomainFieldsRow, DomainPatchRow, DomainRow, NewDomainRow};
use super::pool::{DbPool, PoolError};
use super::schema::domains;

const SET_ROLE_SQL: &str = r#"
UPDATE domains
SET roles = roles || jsonb_build_object($2::text, $3::bigint)
WHERE id = $1
RETURNING id, owner_uid, name, gravatar, roles
"#;

const REMOVE_ROLE_SQL: &str = r#"
UPDATE domains
SET roles = roles - $2::text
WHERE id = $1
RETURNING id, owner_uid, name, gravatar, roles
"#;

/// Diesel-backed implementation of the `DomainRepository` port.
#[derive(Clone)]
pub struct DieselDomainRepository {
    pool: DbPool,
}

impl DieselDomainRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> DomainRepositoryError {
    map_basic_pool_error(error, DomainRepositoryError::connection)
}

fn map_diesel_error(
    operation: &'static str,
) -> impl FnOnce(diesel::result::Error) -> DomainRepositoryError {
    move |error| {
        map_basic_diesel_error(
            error,
            operation,
            DomainRepositoryError::query,
            DomainRepositoryError::connection,
        )
    }
}

fn row_to_domain(row: DomainRow) -> Result<Domain, DomainRepositoryError> {
    Domain::try_from(row).map_err(DomainRepositoryError::query)
}

fn optional_row(row: Option<DomainRow>) -> Result<Option<Domain>, DomainRepositoryError> {
    row.map(row_to_domain).transpose()
}

#[async_trait]
impl DomainRepository for DieselDomainRepository {
    async fn insert(&self, domain: &Domain) -> Result<Domain, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::insert_into(domains::table)
            .values(NewDomainRow::from_domain(domain))
            .returning(DomainRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|error| {
                if is_unique_violation(&error) {
                    DomainRepositoryError::duplicate_key(domain.id.as_str())
                } else {
                    map_diesel_error("insert domain")(error)
                }
            })?;
        row_to_domain(row)
    }

    async fn find_by_id(&self, id: &DomainId) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = domains::table
            .find(id.as_str())
            .select(DomainRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("find domain"))?;
        optional_row(row)
    }

    async fn find_page(
        &self,
        filter: &DomainFilter,
        after: Option<DomainId>,
        limit: usize,
    ) -> Result<Page<Domain, DomainId>, DomainRepositoryError> {
        let mut query = domains::table.select(DomainRow::as_select()).into_boxed();
        if let Some(owner) = filter.owner_uid {
            query = query.filter(domains::owner_uid.eq(owner.get()));
        }
        if let Some(ids) = &filter.ids {
            let ids: Vec<&str> = ids.iter().map(DomainId::as_str).collect();
            query = query.filter(domains::id.eq_any(ids));
        }
        if let Some(after) = &after {
            query = query.filter(domains::id.gt(after.as_str().to_owned()));
        }

        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let rows: Vec<DomainRow> = query
            .order(domains::id.asc())
            .limit(overfetch_limit(limit))
            .load(&mut conn)
            .await
            .map_err(map_diesel_error("page domains"))?;
        let records = rows
            .into_iter()
            .map(row_to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Page::from_overfetch(records, limit, |domain| domain.id.clone()))
    }

    async fn update(
        &self,
        id: &DomainId,
        patch: &DomainPatch,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        if patch.is_empty() {
            return self.find_by_id(id).await;
        }
        let changes = DomainPatchRow {
            name: patch.name.as_ref().map(DisplayName::as_str),
            gravatar: patch.gravatar.as_deref(),
            roles: patch.roles.as_ref().map(|roles| roles.to_json()),
        };
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::update(domains::table.find(id.as_str()))
            .set(&changes)
            .returning(DomainRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("update domain"))?;
        optional_row(row)
    }

    async fn clear_fields(
        &self,
        id: &DomainId,
        fields: &BTreeSet<DomainField>,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        if fields.is_empty() {
            return self.find_by_id(id).await;
        }
        let mut changes = ClearDomainFieldsRow::default();
        for field in fields {
            match field {
                DomainField::Name => changes.name = Some(None),
                DomainField::Gravatar => changes.gravatar = Some(None),
                DomainField::Roles => changes.roles = Some(serde_json::json!({})),
            }
        }
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::update(domains::table.find(id.as_str()))
            .set(&changes)
            .returning(DomainRow::as_returning())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("unset domain fields"))?;
        optional_row(row)
    }

    async fn set_role(
        &self,
        id: &DomainId,
        role: &RoleName,
        mask: PermissionMask,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DomainRow> = sql_query(SET_ROLE_SQL)
            .bind::<Text, _>(id.as_str())
            .bind::<Text, _>(role.as_str())
            .bind::<BigInt, _>(mask.bits())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("set domain role"))?;
        optional_row(row)
    }

    async fn remove_role(
        &self,
        id: &DomainId,
        role: &RoleName,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<DomainRow> = sql_query(REMOVE_ROLE_SQL)
            .bind::<Text, _>(id.as_str())
            .bind::<Text, _>(role.as_str())
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(map_diesel_error("remove domain role"))?;
        optional_row(row)
    }

    async fn compare_and_set_owner(
        &self,
        id: &DomainId,
        expected: Uid,
        new_owner: Uid,
    ) -> Result<Option<Domain>, DomainRepositoryError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row = diesel::update(
            domains::table
                .filter(domains::id.eq(id.as_str()))
                .filter(domains::owner_uid.eq(expected.get())),
        )
        .set(domains::owner_uid.eq(new_owner.get()))
        .returning(DomainRow::as_returning())
        .get_result(&mut conn)
        .await
        .optional()
        .map_err(map_diesel_error("transfer domain"))?;
        optional_row(row)
    }
}
