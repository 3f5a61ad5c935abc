mod support;

use anyhow::Result;
use chrono::Duration;
use common_auth::Role;
use identity_service::service::{RegisterRequest, ServiceError};
use support::{Harness, ACCESS_TTL_SECONDS};

#[tokio::test]
async fn login_issues_pair_with_current_roles() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness
        .seed_user("a@x.com", "pw", &[Role::Admin, Role::Employee])
        .await?;

    let issued = harness.auth.login("a@x.com", "pw").await?;
    assert!(!issued.access_token.is_empty());
    assert!(!issued.refresh_token.is_empty());
    assert_eq!(issued.token_type, "Bearer");

    let claims = harness.signer.verify_access(&issued.access_token)?;
    assert_eq!(claims.subject.local_id(), principal.id);
    assert_eq!(claims.roles, vec!["Admin".to_string(), "Employee".to_string()]);
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_tagged_on_password_field() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed_user("a@x.com", "pw", &[]).await?;

    let err = harness.auth.login("a@x.com", "nope").await.expect_err("rejected");
    assert!(matches!(
        err,
        ServiceError::InvalidCredentials {
            field: "password",
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn unknown_email_is_tagged_on_email_field() -> Result<()> {
    let harness = Harness::new()?;

    let err = harness
        .auth
        .login("ghost@x.com", "pw")
        .await
        .expect_err("rejected");
    match err {
        ServiceError::InvalidCredentials { field, message } => {
            assert_eq!(field, "email");
            assert_eq!(message, "email does not exist");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn role_lookup_failure_degrades_to_empty_roles() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed_user("a@x.com", "pw", &[Role::Admin]).await?;
    harness.store.set_role_lookup_failure(true);

    let issued = harness.auth.login("a@x.com", "pw").await?;
    let claims = harness.signer.verify_access(&issued.access_token)?;
    assert!(claims.roles.is_empty());
    Ok(())
}

#[tokio::test]
async fn refresh_picks_up_role_changes() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness.seed_user("a@x.com", "pw", &[Role::Employee]).await?;

    let first = harness.auth.login("a@x.com", "pw").await?;
    let before = harness.signer.verify_access(&first.access_token)?;
    assert_eq!(before.roles, vec!["Employee".to_string()]);

    harness
        .auth
        .assign_roles(&principal.opaque_id()?, &[Role::HrManager.id()])
        .await?;

    // The old access token keeps its snapshot until it expires.
    let stale = harness.signer.verify_access(&first.access_token)?;
    assert_eq!(stale.roles, vec!["Employee".to_string()]);

    harness.clock.advance(Duration::seconds(ACCESS_TTL_SECONDS + 60));
    let refreshed = harness.auth.refresh(&first.refresh_token).await?;
    let after = harness.signer.verify_access(&refreshed.access_token)?;
    assert_eq!(after.roles, vec!["HR Manager".to_string()]);
    assert_eq!(after.subject, before.subject);
    Ok(())
}

#[tokio::test]
async fn refresh_for_deleted_principal_is_unauthorized() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness.seed_user("a@x.com", "pw", &[Role::Admin]).await?;
    let issued = harness.auth.login("a@x.com", "pw").await?;

    harness.auth.delete_user(&principal.opaque_id()?).await?;

    let err = harness
        .auth
        .refresh(&issued.refresh_token)
        .await
        .expect_err("principal is gone");
    assert!(matches!(err, ServiceError::Unauthorized("user not found")));
    Ok(())
}

#[tokio::test]
async fn refresh_rejects_access_token_and_garbage() -> Result<()> {
    let harness = Harness::new()?;
    harness.seed_user("a@x.com", "pw", &[]).await?;
    let issued = harness.auth.login("a@x.com", "pw").await?;

    assert!(matches!(
        harness.auth.refresh(&issued.access_token).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert!(matches!(
        harness.auth.refresh("not.a.token").await,
        Err(ServiceError::Unauthorized(_))
    ));
    Ok(())
}

#[tokio::test]
async fn register_then_login() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness
        .auth
        .register(RegisterRequest {
            full_name: "New Person".into(),
            email: "new@x.com".into(),
            password: "secret".into(),
        })
        .await?;
    assert_ne!(principal.password_hash, "secret");

    let issued = harness.auth.login("new@x.com", "secret").await?;
    let claims = harness.signer.verify_access(&issued.access_token)?;
    assert!(claims.roles.is_empty());

    let err = harness
        .auth
        .register(RegisterRequest {
            full_name: "Someone Else".into(),
            email: "new@x.com".into(),
            password: "other".into(),
        })
        .await
        .expect_err("duplicate");
    assert!(matches!(
        err,
        ServiceError::Validation {
            field: "email",
            message: "email already exists"
        }
    ));
    Ok(())
}

#[tokio::test]
async fn assign_roles_rejects_unknown_ids_and_principals() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness.seed_user("a@x.com", "pw", &[]).await?;

    let err = harness
        .auth
        .assign_roles(&principal.opaque_id()?, &[99])
        .await
        .expect_err("unknown role");
    assert!(matches!(err, ServiceError::Validation { field: "role_ids", .. }));

    let ghost = common_ids::OpaqueId::new(4242, common_ids::EntityKind::User)?;
    let err = harness
        .auth
        .assign_roles(&ghost, &[Role::Admin.id()])
        .await
        .expect_err("unknown principal");
    assert!(matches!(err, ServiceError::UserNotFound));
    Ok(())
}

#[tokio::test]
async fn email_identity_ignores_letter_case() -> Result<()> {
    let harness = Harness::new()?;
    let principal = harness
        .auth
        .register(RegisterRequest {
            full_name: "Mixed Case".into(),
            email: " Mixed@Example.COM ".into(),
            password: "secret".into(),
        })
        .await?;
    assert_eq!(principal.email, "mixed@example.com");

    let issued = harness.auth.login("MIXED@example.com", "secret").await?;
    let claims = harness.signer.verify_access(&issued.access_token)?;
    assert_eq!(claims.subject.local_id(), principal.id);

    let err = harness
        .auth
        .register(RegisterRequest {
            full_name: "Impostor".into(),
            email: "mixed@EXAMPLE.com".into(),
            password: "other".into(),
        })
        .await
        .expect_err("same address in another case");
    assert!(matches!(
        err,
        ServiceError::Validation {
            field: "email",
            message: "email already exists"
        }
    ));
    Ok(())
}
