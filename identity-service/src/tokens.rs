use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common_auth::{
    AccessClaims, AuthResult, Clock, JwtConfig, JwtVerifier, RefreshClaims, SharedClock,
    SystemClock,
};
use common_ids::OpaqueId;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;

#[derive(Clone)]
pub struct TokenConfig {
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token configuration: {0}")]
    Config(&'static str),
    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

pub struct TokenSubject {
    pub user_id: OpaqueId,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub access_expires_in: i64,
    pub refresh_expires_in: i64,
    pub token_type: &'static str,
}

/// Issues and verifies the HS256 access/refresh pair. Stateless; nothing is
/// persisted, so a token stays valid until its `exp`.
pub struct TokenSigner {
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_key: EncodingKey,
    refresh_key: EncodingKey,
    access_verifier: Arc<JwtVerifier>,
    refresh_verifier: JwtVerifier,
    clock: SharedClock,
}

impl TokenSigner {
    pub fn new(config: TokenConfig) -> Result<Self, TokenError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TokenConfig, clock: SharedClock) -> Result<Self, TokenError> {
        if config.access_secret.is_empty() || config.refresh_secret.is_empty() {
            return Err(TokenError::Config("signing secrets must not be empty"));
        }
        if config.access_secret == config.refresh_secret {
            return Err(TokenError::Config("access and refresh secrets must differ"));
        }
        let access_ttl = lifetime(config.access_ttl_seconds, clock.as_ref())?;
        let refresh_ttl = lifetime(config.refresh_ttl_seconds, clock.as_ref())?;

        Ok(Self {
            access_ttl,
            refresh_ttl,
            access_key: EncodingKey::from_secret(&config.access_secret),
            refresh_key: EncodingKey::from_secret(&config.refresh_secret),
            access_verifier: Arc::new(JwtVerifier::with_clock(
                JwtConfig::new(config.access_secret),
                clock.clone(),
            )),
            refresh_verifier: JwtVerifier::with_clock(
                JwtConfig::new(config.refresh_secret),
                clock.clone(),
            ),
            clock,
        })
    }

    /// Verifier for bearer access tokens, shared with the request extractor.
    pub fn access_verifier(&self) -> Arc<JwtVerifier> {
        self.access_verifier.clone()
    }

    pub fn issue_access_token(
        &self,
        subject: &OpaqueId,
        roles: &[String],
    ) -> Result<SignedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = expiry(now, self.access_ttl)?;
        let claims = AccessClaimsRepr {
            sub: subject.encode(),
            roles,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.access_key)?;
        Ok(SignedToken { token, expires_at })
    }

    pub fn issue_refresh_token(&self, subject: &OpaqueId) -> Result<SignedToken, TokenError> {
        let now = self.clock.now();
        let expires_at = expiry(now, self.refresh_ttl)?;
        let claims = RefreshClaimsRepr {
            sub: subject.encode(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.refresh_key)?;
        Ok(SignedToken { token, expires_at })
    }

    pub fn issue_tokens(&self, subject: &TokenSubject) -> Result<IssuedTokens, TokenError> {
        let access = self.issue_access_token(&subject.user_id, &subject.roles)?;
        let refresh = self.issue_refresh_token(&subject.user_id)?;

        Ok(IssuedTokens {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
            access_expires_in: self.access_ttl.num_seconds(),
            refresh_expires_in: self.refresh_ttl.num_seconds(),
            token_type: "Bearer",
        })
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.access_verifier.verify_access(token)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.refresh_verifier.verify_refresh(token)
    }
}

/// Upper bound on a token lifetime. Expiry instants past this stop fitting
/// the `exp` claim and chrono's range long before `i64::MAX` seconds.
pub const MAX_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;

fn lifetime(seconds: i64, clock: &dyn Clock) -> Result<Duration, TokenError> {
    if seconds <= 0 {
        return Err(TokenError::Config("token lifetimes must be positive"));
    }
    if seconds > MAX_TTL_SECONDS {
        return Err(TokenError::Config("token lifetime exceeds the supported maximum"));
    }
    let ttl = Duration::try_seconds(seconds)
        .ok_or(TokenError::Config("token lifetime out of range"))?;
    expiry(clock.now(), ttl)?;
    Ok(ttl)
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, TokenError> {
    now.checked_add_signed(ttl)
        .ok_or(TokenError::Config("token expiry out of range"))
}

#[derive(Serialize)]
struct AccessClaimsRepr<'a> {
    sub: String,
    roles: &'a [String],
    exp: i64,
    iat: i64,
}

#[derive(Serialize)]
struct RefreshClaimsRepr {
    sub: String,
    exp: i64,
    iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_ids::EntityKind;

    fn config() -> TokenConfig {
        TokenConfig {
            access_secret: b"access".to_vec(),
            refresh_secret: b"refresh".to_vec(),
            access_ttl_seconds: 900,
            refresh_ttl_seconds: 7200,
        }
    }

    #[test]
    fn rejects_shared_secret() {
        let mut config = config();
        config.refresh_secret = config.access_secret.clone();
        assert!(matches!(TokenSigner::new(config), Err(TokenError::Config(_))));
    }

    #[test]
    fn rejects_empty_secret() {
        let mut config = config();
        config.access_secret.clear();
        assert!(matches!(TokenSigner::new(config), Err(TokenError::Config(_))));
    }

    #[test]
    fn oversized_lifetimes_are_config_errors() {
        for seconds in [i64::MAX, i64::MAX / 1000 + 1, MAX_TTL_SECONDS + 1] {
            let mut config = config();
            config.refresh_ttl_seconds = seconds;
            assert!(matches!(TokenSigner::new(config), Err(TokenError::Config(_))));
        }

        let mut config = config();
        config.refresh_ttl_seconds = MAX_TTL_SECONDS;
        let signer = TokenSigner::new(config).unwrap();
        let subject = OpaqueId::new(1, EntityKind::User).unwrap();
        assert!(signer.issue_refresh_token(&subject).is_ok());
    }

    #[test]
    fn issued_pair_has_three_segments_and_bearer_type() {
        let signer = TokenSigner::new(config()).unwrap();
        let subject = TokenSubject {
            user_id: OpaqueId::new(9, EntityKind::User).unwrap(),
            roles: vec!["Employee".into()],
        };
        let issued = signer.issue_tokens(&subject).unwrap();
        assert_eq!(issued.access_token.split('.').count(), 3);
        assert_eq!(issued.refresh_token.split('.').count(), 3);
        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.access_expires_in, 900);
        assert_eq!(issued.refresh_expires_in, 7200);
        assert!(issued.refresh_expires_at > issued.access_expires_at);
    }
}
