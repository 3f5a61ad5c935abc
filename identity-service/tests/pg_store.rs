mod support;

use anyhow::Result;
use common_auth::Role;
use identity_service::store::{
    CredentialStore, NewPrincipal, PgCredentialStore, PrincipalChanges, StoreError,
};
use support::{unique_email, TestDatabase};

async fn prepared_store() -> Result<Option<PgCredentialStore>> {
    let Some(db) = TestDatabase::setup().await? else {
        return Ok(None);
    };
    let pool = db.pool_clone();
    sqlx::migrate!("./migrations").run(&pool).await?;
    let store = PgCredentialStore::new(pool);
    store.sync_catalog().await?;
    Ok(Some(store))
}

fn new_principal(email: &str) -> NewPrincipal {
    NewPrincipal {
        full_name: "Store Test".to_string(),
        email: email.to_string(),
        password_hash: "$argon2id$placeholder".to_string(),
    }
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres)")]
async fn catalog_sync_is_idempotent() -> Result<()> {
    let Some(store) = prepared_store().await? else {
        return Ok(());
    };
    store.sync_catalog().await?;

    let roles: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles")
        .fetch_one(store.pool())
        .await?;
    assert_eq!(roles, Role::ALL.len() as i64);

    let grants: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM role_permissions WHERE role_id = $1")
            .bind(i64::from(Role::Employee.id()))
            .fetch_one(store.pool())
            .await?;
    assert_eq!(grants, Role::Employee.permissions().len() as i64);
    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres)")]
async fn duplicate_email_maps_to_store_error() -> Result<()> {
    let Some(store) = prepared_store().await? else {
        return Ok(());
    };
    let email = unique_email("dup");
    store.create_principal(new_principal(&email)).await?;

    let err = store
        .create_principal(new_principal(&email))
        .await
        .expect_err("unique constraint");
    assert!(matches!(err, StoreError::DuplicateEmail));
    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres)")]
async fn roles_are_replaced_and_cascade_on_delete() -> Result<()> {
    let Some(store) = prepared_store().await? else {
        return Ok(());
    };
    let principal = store.create_principal(new_principal(&unique_email("roles"))).await?;

    store
        .replace_roles(principal.id, &[Role::Employee, Role::Admin])
        .await?;
    assert_eq!(
        store.role_names(principal.id).await?,
        vec!["Admin".to_string(), "Employee".to_string()]
    );

    store.replace_roles(principal.id, &[Role::Accountant]).await?;
    assert_eq!(store.role_names(principal.id).await?, vec!["Accountant".to_string()]);

    let found = store
        .find_by_email(&principal.email)
        .await?
        .expect("principal by email");
    assert_eq!(found.id, principal.id);

    assert!(store.delete_principal(principal.id).await?);
    assert!(store.find_by_id(principal.id).await?.is_none());
    assert!(store.role_names(principal.id).await?.is_empty());
    assert!(matches!(
        store.replace_roles(principal.id, &[Role::Admin]).await,
        Err(StoreError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres)")]
async fn email_uniqueness_and_lookup_ignore_case() -> Result<()> {
    let Some(store) = prepared_store().await? else {
        return Ok(());
    };
    let email = unique_email("case");
    let principal = store.create_principal(new_principal(&email)).await?;

    let shouted = email.to_uppercase();
    let found = store.find_by_email(&shouted).await?.expect("case-insensitive lookup");
    assert_eq!(found.id, principal.id);

    let err = store
        .create_principal(new_principal(&shouted))
        .await
        .expect_err("lower(email) index");
    assert!(matches!(err, StoreError::DuplicateEmail));
    Ok(())
}

#[tokio::test]
#[cfg_attr(not(feature = "integration"), ignore = "enable with --features integration (requires Postgres)")]
async fn profile_update_is_partial_and_keeps_emails_unique() -> Result<()> {
    let Some(store) = prepared_store().await? else {
        return Ok(());
    };
    let first = store.create_principal(new_principal(&unique_email("first"))).await?;
    let second = store.create_principal(new_principal(&unique_email("second"))).await?;

    let renamed = store
        .update_principal(
            first.id,
            PrincipalChanges {
                full_name: Some("Renamed".to_string()),
                email: None,
            },
        )
        .await?;
    assert_eq!(renamed.full_name, "Renamed");
    assert_eq!(renamed.email, first.email);

    let err = store
        .update_principal(
            first.id,
            PrincipalChanges {
                full_name: None,
                email: Some(second.email.clone()),
            },
        )
        .await
        .expect_err("email taken");
    assert!(matches!(err, StoreError::DuplicateEmail));

    let listed = store.list_principals(100, 0).await?;
    assert!(listed.windows(2).all(|pair| pair[0].id < pair[1].id));

    store.delete_principal(first.id).await?;
    assert!(matches!(
        store
            .update_principal(
                first.id,
                PrincipalChanges {
                    full_name: Some("Gone".to_string()),
                    email: None,
                },
            )
            .await,
        Err(StoreError::NotFound)
    ));
    Ok(())
}
