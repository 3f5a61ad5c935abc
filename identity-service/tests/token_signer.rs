mod support;

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, TimeZone, Utc};
use common_auth::{AuthError, FixedClock, JwtConfig, JwtVerifier};
use common_ids::{EntityKind, OpaqueId};
use identity_service::tokens::{TokenSigner, TokenSubject};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use support::{token_config, ACCESS_SECRET, ACCESS_TTL_SECONDS, REFRESH_SECRET, REFRESH_TTL_SECONDS};

const ISSUED_AT: i64 = 1_700_000_000;

fn signer_at(clock: &FixedClock) -> Result<TokenSigner> {
    Ok(TokenSigner::with_clock(token_config(), Arc::new(clock.clone()))?)
}

fn subject() -> OpaqueId {
    OpaqueId::new(42, EntityKind::User).unwrap()
}

#[test]
fn access_token_expires_exactly_at_ttl() -> Result<()> {
    let clock = FixedClock::at(Utc.timestamp_opt(ISSUED_AT, 0).unwrap());
    let signer = signer_at(&clock)?;
    let token = signer.issue_access_token(&subject(), &["Admin".to_string()])?;
    assert_eq!(token.expires_at.timestamp(), ISSUED_AT + ACCESS_TTL_SECONDS);

    clock.advance(Duration::seconds(ACCESS_TTL_SECONDS - 1));
    let claims = signer.verify_access(&token.token)?;
    assert_eq!(claims.subject, subject());
    assert_eq!(claims.roles, vec!["Admin".to_string()]);

    clock.advance(Duration::seconds(1));
    assert!(matches!(signer.verify_access(&token.token), Err(AuthError::Expired)));

    clock.advance(Duration::seconds(1));
    assert!(matches!(signer.verify_access(&token.token), Err(AuthError::Expired)));
    Ok(())
}

#[test]
fn refresh_token_outlives_access_token() -> Result<()> {
    let clock = FixedClock::at(Utc.timestamp_opt(ISSUED_AT, 0).unwrap());
    let signer = signer_at(&clock)?;
    let issued = signer.issue_tokens(&TokenSubject {
        user_id: subject(),
        roles: vec!["Employee".to_string()],
    })?;

    clock.advance(Duration::seconds(ACCESS_TTL_SECONDS + 1));
    assert!(signer.verify_access(&issued.access_token).is_err());
    let claims = signer.verify_refresh(&issued.refresh_token)?;
    assert_eq!(claims.subject, subject());

    clock.advance(Duration::seconds(REFRESH_TTL_SECONDS));
    assert!(matches!(
        signer.verify_refresh(&issued.refresh_token),
        Err(AuthError::Expired)
    ));
    Ok(())
}

#[test]
fn tokens_do_not_cross_secrets() -> Result<()> {
    let clock = FixedClock::at(Utc.timestamp_opt(ISSUED_AT, 0).unwrap());
    let signer = signer_at(&clock)?;
    let issued = signer.issue_tokens(&TokenSubject {
        user_id: subject(),
        roles: vec!["Admin".to_string()],
    })?;

    assert!(signer.verify_refresh(&issued.access_token).is_err());
    assert!(signer.verify_access(&issued.refresh_token).is_err());

    let access_with_refresh_secret =
        JwtVerifier::with_clock(JwtConfig::new(REFRESH_SECRET), Arc::new(clock.clone()));
    assert!(matches!(
        access_with_refresh_secret.verify_access(&issued.access_token),
        Err(AuthError::Verification(_))
    ));
    Ok(())
}

#[test]
fn wire_format_carries_only_the_documented_claims() -> Result<()> {
    let clock = FixedClock::at(Utc.timestamp_opt(ISSUED_AT, 0).unwrap());
    let signer = signer_at(&clock)?;
    let issued = signer.issue_tokens(&TokenSubject {
        user_id: subject(),
        roles: vec!["HR Manager".to_string(), "Employee".to_string()],
    })?;

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;

    let access = decode::<Value>(
        &issued.access_token,
        &DecodingKey::from_secret(ACCESS_SECRET),
        &validation,
    )?;
    assert_eq!(access.header.alg, Algorithm::HS256);
    assert_eq!(access.claims["sub"], subject().to_string());
    assert_eq!(access.claims["roles"][0], "HR Manager");
    assert_eq!(access.claims["exp"], ISSUED_AT + ACCESS_TTL_SECONDS);

    let refresh = decode::<Value>(
        &issued.refresh_token,
        &DecodingKey::from_secret(REFRESH_SECRET),
        &validation,
    )?;
    assert!(refresh.claims.get("roles").is_none());
    assert_eq!(refresh.claims["exp"], ISSUED_AT + REFRESH_TTL_SECONDS);
    Ok(())
}

#[test]
fn tampered_payload_is_rejected() -> Result<()> {
    let clock = FixedClock::at(Utc.timestamp_opt(ISSUED_AT, 0).unwrap());
    let signer = signer_at(&clock)?;
    let token = signer.issue_access_token(&subject(), &["Employee".to_string()])?;

    let mut parts: Vec<String> = token.token.split('.').map(str::to_string).collect();
    let forged = signer.issue_access_token(&subject(), &["Super Admin".to_string()])?;
    parts[1] = forged.token.split('.').nth(1).unwrap().to_string();
    let spliced = parts.join(".");

    assert!(signer.verify_access(&spliced).is_err());
    Ok(())
}
