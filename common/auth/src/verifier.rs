use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::debug;

use crate::claims::{AccessClaims, RefreshClaims, VerifiedClaims};
use crate::clock::{SharedClock, SystemClock};
use crate::config::JwtConfig;
use crate::error::{AuthError, AuthResult};

/// HS256 verifier bound to one secret. Access and refresh tokens use
/// separate secrets, so each kind gets its own verifier.
#[derive(Clone)]
pub struct JwtVerifier {
    config: JwtConfig,
    key: DecodingKey,
    clock: SharedClock,
}

impl JwtVerifier {
    pub fn new(config: JwtConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: JwtConfig, clock: SharedClock) -> Self {
        let key = DecodingKey::from_secret(&config.secret);
        Self { config, key, clock }
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// Checks signature, algorithm and expiry, then parses the claim set.
    /// Expiry is evaluated against the injected clock: valid iff `now < exp`.
    pub fn verify<C: VerifiedClaims>(&self, token: &str) -> AuthResult<C> {
        let header =
            decode_header(token).map_err(|err| AuthError::InvalidHeader(err.to_string()))?;
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::UnexpectedAlgorithm(format!("{:?}", header.alg)));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Value>(token, &self.key, &validation)?;
        let claims = C::try_from(token_data.claims)?;

        let deadline = claims
            .expires_at()
            .checked_add_signed(Duration::seconds(i64::from(self.config.leeway_seconds)))
            .unwrap_or_else(|| claims.expires_at());
        if self.clock.now() >= deadline {
            return Err(AuthError::Expired);
        }

        debug!(subject = %claims.subject(), "verified JWT successfully");
        Ok(claims)
    }

    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.verify(token)
    }

    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::{TimeZone, Utc};
    use common_ids::{EntityKind, OpaqueId};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &[u8] = b"access-secret";

    fn sign(alg: Algorithm, secret: &[u8], exp: i64) -> String {
        let subject = OpaqueId::new(7, EntityKind::User).unwrap();
        let claims = json!({
            "sub": subject.to_string(),
            "roles": ["Admin"],
            "exp": exp,
            "iat": exp - 900,
        });
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret)).expect("sign token")
    }

    fn verifier_at(timestamp: i64) -> JwtVerifier {
        let clock = FixedClock::at(Utc.timestamp_opt(timestamp, 0).unwrap());
        JwtVerifier::with_clock(JwtConfig::new(SECRET), Arc::new(clock))
    }

    #[test]
    fn accepts_token_before_expiry() {
        let token = sign(Algorithm::HS256, SECRET, 1_700_000_900);
        let claims = verifier_at(1_700_000_899)
            .verify_access(&token)
            .expect("verification succeeds");
        assert_eq!(claims.subject.local_id(), 7);
        assert_eq!(claims.roles, vec!["Admin".to_string()]);
    }

    #[test]
    fn rejects_token_at_expiry_instant() {
        let token = sign(Algorithm::HS256, SECRET, 1_700_000_900);
        let err = verifier_at(1_700_000_900)
            .verify_access(&token)
            .expect_err("expired");
        assert!(matches!(err, AuthError::Expired));
    }

    #[test]
    fn leeway_extends_the_deadline() {
        let token = sign(Algorithm::HS256, SECRET, 1_700_000_900);
        let clock = FixedClock::at(Utc.timestamp_opt(1_700_000_905, 0).unwrap());
        let verifier =
            JwtVerifier::with_clock(JwtConfig::new(SECRET).with_leeway(10), Arc::new(clock));
        assert!(verifier.verify_access(&token).is_ok());
    }

    #[test]
    fn rejects_other_secret() {
        let token = sign(Algorithm::HS256, b"refresh-secret", 1_700_000_900);
        let err = verifier_at(1_700_000_000)
            .verify_access(&token)
            .expect_err("wrong secret");
        assert!(matches!(err, AuthError::Verification(_)));
    }

    #[test]
    fn rejects_other_hmac_algorithm() {
        let token = sign(Algorithm::HS512, SECRET, 1_700_000_900);
        let err = verifier_at(1_700_000_000)
            .verify_access(&token)
            .expect_err("algorithm mismatch");
        assert!(matches!(err, AuthError::UnexpectedAlgorithm(_)));
    }

    #[test]
    fn rejects_garbage() {
        let err = verifier_at(1_700_000_000)
            .verify_refresh("not-a-token")
            .expect_err("garbage");
        assert!(matches!(err, AuthError::InvalidHeader(_)));
    }
}
