//! Tests for the registry service against mocked ports.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::TryStreamExt;
use mockall::Sequence;
use rstest::rstest;

use super::*;
use crate::domain::ports::{
    DomainRepositoryError, DomainUserRepositoryError, MockDomainRepository,
    MockDomainUserRepository, Page,
};
use crate::domain::{
    Counter, Domain, DomainEdit, DomainField, DomainFilter, DomainId, DomainUser, ErrorCode,
    NewDomainRequest, PermissionMask, Projection, RegistryError, RoleMap, RoleName,
    SYSTEM_DOMAIN_ID, Uid, ValidationError,
};

type MockRegistry = DomainRegistry<MockDomainRepository, MockDomainUserRepository>;

fn make_registry(domains: MockDomainRepository, users: MockDomainUserRepository) -> MockRegistry {
    DomainRegistry::new(Arc::new(domains), Arc::new(users))
}

fn domain_id(raw: &str) -> DomainId {
    DomainId::new(raw).expect("valid domain id")
}

fn stored_domain(raw: &str, owner: i64) -> Domain {
    Domain {
        id: domain_id(raw),
        owner_uid: Uid::new(owner),
        name: None,
        gravatar: None,
        roles: RoleMap::default_system_roles(),
    }
}

#[tokio::test]
async fn add_fills_default_roles_and_returns_stored_record() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_insert()
        .withf(|domain| domain.roles == RoleMap::default_system_roles())
        .times(1)
        .returning(|domain| Ok(domain.clone()));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let created = registry
        .add(NewDomainRequest::new("algo", Uid::new(5)).with_name("Algorithms"))
        .await
        .expect("domain created");

    assert_eq!(created.id.as_str(), "algo");
    assert_eq!(created.name.as_ref().map(|name| name.as_str()), Some("Algorithms"));
}

#[tokio::test]
async fn add_rejects_builtin_ids_without_touching_the_store() {
    let mut domains = MockDomainRepository::new();
    domains.expect_insert().times(0);
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let err = registry
        .add(NewDomainRequest::new(SYSTEM_DOMAIN_ID, Uid::new(1)))
        .await
        .expect_err("built-in collision");

    assert_eq!(err, RegistryError::domain_already_exists(SYSTEM_DOMAIN_ID));
}

#[tokio::test]
async fn add_translates_duplicate_keys_into_domain_already_exists() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_insert()
        .times(1)
        .returning(|domain| Err(DomainRepositoryError::duplicate_key(domain.id.as_str())));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let err = registry
        .add(NewDomainRequest::new("algo", Uid::new(1)))
        .await
        .expect_err("duplicate");

    assert_eq!(err, RegistryError::domain_already_exists("algo"));
    assert_eq!(err.code(), ErrorCode::Conflict);
}

#[tokio::test]
async fn add_passes_other_store_errors_through() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_insert()
        .times(1)
        .returning(|_| Err(DomainRepositoryError::connection("refused")));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let err = registry
        .add(NewDomainRequest::new("algo", Uid::new(1)))
        .await
        .expect_err("connection failure");

    assert_eq!(
        err,
        RegistryError::DomainStore(DomainRepositoryError::connection("refused"))
    );
}

#[rstest]
#[case(NewDomainRequest::new("has space", Uid::new(1)))]
#[case(NewDomainRequest::new("algo", Uid::new(1)).with_name("   "))]
#[tokio::test]
async fn add_validates_before_any_store_access(#[case] request: NewDomainRequest) {
    let registry = make_registry(MockDomainRepository::new(), MockDomainUserRepository::new());

    let err = registry.add(request).await.expect_err("validation failure");

    assert!(matches!(err, RegistryError::Validation(_)));
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn builtin_writes_are_no_ops_that_never_reach_the_store() {
    let mut domains = MockDomainRepository::new();
    domains.expect_update().times(0);
    domains.expect_set_role().times(0);
    domains.expect_remove_role().times(0);
    domains.expect_compare_and_set_owner().times(0);
    let mut users = MockDomainUserRepository::new();
    users.expect_clear_role().times(0);
    let registry = make_registry(domains, users);

    let edited = registry
        .edit(SYSTEM_DOMAIN_ID, DomainEdit::default().name("Renamed"))
        .await
        .expect("edit succeeds");
    let role_set = registry
        .set_role(SYSTEM_DOMAIN_ID, "judge", PermissionMask::new(3))
        .await
        .expect("set_role succeeds");
    let role_deleted = registry
        .delete_role(SYSTEM_DOMAIN_ID, "admin")
        .await
        .expect("delete_role succeeds");
    let transferred = registry
        .transfer(SYSTEM_DOMAIN_ID, Uid::new(0), Uid::new(9))
        .await
        .expect("transfer succeeds");

    assert!(edited.is_none());
    assert!(role_set.is_none());
    assert!(role_deleted.is_none());
    assert!(transferred.is_none());
}

#[tokio::test]
async fn get_returns_builtins_whole_ignoring_projection() {
    let mut domains = MockDomainRepository::new();
    domains.expect_find_by_id().times(0);
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let system = registry
        .get(SYSTEM_DOMAIN_ID, &Projection::only([DomainField::Name]))
        .await
        .expect("lookup succeeds")
        .expect("system domain present");

    assert_eq!(system.roles, RoleMap::default_system_roles());
}

#[tokio::test]
async fn get_projects_persisted_records() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_find_by_id()
        .times(1)
        .returning(|id| Ok(Some(stored_domain(id.as_str(), 5))));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let found = registry
        .get("algo", &Projection::only([DomainField::Name]))
        .await
        .expect("lookup succeeds")
        .expect("record present");

    assert!(found.roles.is_empty());
    assert_eq!(found.owner_uid, Uid::new(5));
}

#[tokio::test]
async fn unset_on_builtin_ids_still_reaches_the_store() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_clear_fields()
        .withf(|id, fields| id.as_str() == SYSTEM_DOMAIN_ID && fields.len() == 1)
        .times(1)
        .returning(|_, _| Ok(None));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let result = registry
        .unset(
            SYSTEM_DOMAIN_ID,
            &[DomainField::Gravatar, DomainField::Gravatar],
        )
        .await
        .expect("unset succeeds");

    assert!(result.is_none());
}

#[tokio::test]
async fn empty_edit_is_a_plain_fetch() {
    let mut domains = MockDomainRepository::new();
    domains.expect_update().times(0);
    domains
        .expect_find_by_id()
        .times(1)
        .returning(|id| Ok(Some(stored_domain(id.as_str(), 2))));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let current = registry
        .edit("algo", DomainEdit::default())
        .await
        .expect("edit succeeds");

    assert_eq!(current.map(|domain| domain.owner_uid), Some(Uid::new(2)));
}

#[rstest]
#[case(DomainEdit::default().name("  "), ValidationError::EmptyName)]
#[case(DomainEdit::default().name(" Algorithms"), ValidationError::NameUntrimmed)]
#[tokio::test]
async fn edit_rejects_invalid_names_without_touching_the_store(
    #[case] edit: DomainEdit,
    #[case] expected: ValidationError,
) {
    let mut domains = MockDomainRepository::new();
    domains.expect_update().times(0);
    domains.expect_find_by_id().times(0);
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let err = registry
        .edit("algo", edit)
        .await
        .expect_err("invalid name");

    assert_eq!(err, RegistryError::Validation(expected));
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[tokio::test]
async fn delete_role_clears_users_before_removing_the_role() {
    let mut sequence = Sequence::new();
    let mut users = MockDomainUserRepository::new();
    users
        .expect_clear_role()
        .withf(|id, role| id.as_str() == "algo" && role.as_str() == "judge")
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _| Ok(2));
    let mut domains = MockDomainRepository::new();
    domains
        .expect_remove_role()
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|id, _| Ok(Some(stored_domain(id.as_str(), 1))));
    let registry = make_registry(domains, users);

    let updated = registry
        .delete_role("algo", "judge")
        .await
        .expect("delete_role succeeds");

    assert!(updated.is_some());
}

#[tokio::test]
async fn delete_role_stops_when_the_cascade_fails() {
    let mut users = MockDomainUserRepository::new();
    users
        .expect_clear_role()
        .times(1)
        .returning(|_, _| Err(DomainUserRepositoryError::connection("refused")));
    let mut domains = MockDomainRepository::new();
    domains.expect_remove_role().times(0);
    let registry = make_registry(domains, users);

    let err = registry
        .delete_role("algo", "judge")
        .await
        .expect_err("cascade failure");

    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[case("bad role")]
#[case("")]
#[tokio::test]
async fn role_names_are_validated_first(#[case] role: &str) {
    let registry = make_registry(MockDomainRepository::new(), MockDomainUserRepository::new());

    let set = registry
        .set_role("algo", role, PermissionMask::NONE)
        .await
        .expect_err("invalid role");
    let assigned = registry
        .set_user_role("algo", Uid::new(1), role)
        .await
        .expect_err("invalid role");

    assert!(matches!(
        set,
        RegistryError::Validation(ValidationError::InvalidRole { .. })
    ));
    assert!(matches!(assigned, RegistryError::Validation(_)));
}

#[tokio::test]
async fn inc_user_forwards_deltas_in_one_request() {
    let mut users = MockDomainUserRepository::new();
    users
        .expect_upsert_increment()
        .withf(|_, uid, deltas| *uid == Uid::new(42) && deltas.get(&Counter::Score) == Some(&10))
        .times(1)
        .returning(|id, uid, _| {
            let mut user = DomainUser::empty(id.clone(), uid);
            user.score = Some(10);
            Ok(user)
        });
    let registry = make_registry(MockDomainRepository::new(), users);

    let user = registry
        .inc_user("algo", Uid::new(42), &BTreeMap::from([(Counter::Score, 10)]))
        .await
        .expect("increment succeeds");

    assert_eq!(user.score, Some(10));
}

#[tokio::test]
async fn get_dict_user_by_uid_skips_the_store_for_no_uids() {
    let mut users = MockDomainUserRepository::new();
    users.expect_find_page().times(0);
    let registry = make_registry(MockDomainRepository::new(), users);

    let found = registry
        .get_dict_user_by_uid("algo", Vec::new(), Projection::All)
        .await
        .expect("lookup succeeds");

    assert!(found.is_empty());
}

#[tokio::test]
async fn get_dict_user_by_uid_deduplicates_uids() {
    let mut users = MockDomainUserRepository::new();
    users
        .expect_find_page()
        .withf(|filter, after, _| {
            filter.uids.as_deref() == Some(&[Uid::new(1), Uid::new(2), Uid::new(3)][..])
                && after.is_none()
        })
        .times(1)
        .returning(|_, _, _| {
            let id = DomainId::new("algo").expect("valid id");
            Ok(Page::last(vec![
                (1, DomainUser::empty(id.clone(), Uid::new(1))),
                (2, DomainUser::empty(id, Uid::new(3))),
            ]))
        });
    let registry = make_registry(MockDomainRepository::new(), users);

    let found = registry
        .get_dict_user_by_uid(
            "algo",
            [1, 2, 2, 3].map(Uid::new),
            Projection::All,
        )
        .await
        .expect("lookup succeeds");

    let mut keys: Vec<i64> = found.keys().map(|uid| uid.get()).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec![1, 3]);
}

#[tokio::test]
async fn get_multi_pages_with_the_configured_batch_size() {
    let mut sequence = Sequence::new();
    let mut domains = MockDomainRepository::new();
    domains
        .expect_find_page()
        .withf(|_, after, limit| after.is_none() && *limit == 2)
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _, _| {
            Ok(Page {
                items: vec![stored_domain("a", 1), stored_domain("b", 1)],
                next: Some(DomainId::new("b").expect("valid id")),
            })
        });
    domains
        .expect_find_page()
        .withf(|_, after, limit| after.as_ref().map(DomainId::as_str) == Some("b") && *limit == 2)
        .times(1)
        .in_sequence(&mut sequence)
        .returning(|_, _, _| Ok(Page::last(vec![stored_domain("c", 1)])));
    let registry =
        make_registry(domains, MockDomainUserRepository::new()).with_batch_size(2);

    let ids: Vec<String> = registry
        .get_multi(DomainFilter::owned_by(Uid::new(1)), Projection::All)
        .map_ok(|domain| domain.id.to_string())
        .try_collect()
        .await
        .expect("stream succeeds");

    assert_eq!(ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn transfer_forwards_the_expected_owner() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_compare_and_set_owner()
        .withf(|id, expected, new_owner| {
            id.as_str() == "algo" && *expected == Uid::new(5) && *new_owner == Uid::new(9)
        })
        .times(1)
        .returning(|id, _, new_owner| Ok(Some(stored_domain(id.as_str(), new_owner.get()))));
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let moved = registry
        .transfer("algo", Uid::new(5), Uid::new(9))
        .await
        .expect("transfer succeeds")
        .expect("owner matched");

    assert_eq!(moved.owner_uid, Uid::new(9));
}

#[tokio::test]
async fn set_role_targets_the_validated_role() {
    let mut domains = MockDomainRepository::new();
    domains
        .expect_set_role()
        .withf(|_, role, mask| role == &RoleName::new("judge").expect("valid role") && mask.bits() == 7)
        .times(1)
        .returning(|id, role, mask| {
            let mut domain = stored_domain(id.as_str(), 1);
            domain.roles.insert(role.clone(), mask);
            Ok(Some(domain))
        });
    let registry = make_registry(domains, MockDomainUserRepository::new());

    let updated = registry
        .set_role("algo", "judge", PermissionMask::new(7))
        .await
        .expect("set_role succeeds")
        .expect("record present");

    assert_eq!(
        updated.roles.get(&RoleName::new("judge").expect("valid role")),
        Some(PermissionMask::new(7))
    );
}
