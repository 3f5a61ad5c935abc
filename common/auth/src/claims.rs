use chrono::{DateTime, TimeZone, Utc};
use common_ids::{EntityKind, OpaqueId};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims that the verifier can hand back after a signature check.
pub trait VerifiedClaims: TryFrom<serde_json::Value, Error = AuthError> {
    fn subject(&self) -> &OpaqueId;
    fn expires_at(&self) -> DateTime<Utc>;
}

/// Verified access token claims. `roles` is the snapshot taken at issuance.
#[derive(Debug, Clone, Serialize)]
pub struct AccessClaims {
    pub subject: OpaqueId,
    pub roles: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

impl AccessClaims {
    /// Convenience helper for role checks.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }
}

/// Verified refresh token claims. Refresh tokens never carry roles.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshClaims {
    pub subject: OpaqueId,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct AccessRepr {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RefreshRepr {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

fn parse_subject(sub: &str) -> AuthResult<OpaqueId> {
    OpaqueId::decode_as(sub, EntityKind::User)
        .map_err(|_| AuthError::InvalidClaim("sub", sub.to_string()))
}

fn parse_timestamp(name: &'static str, value: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_opt(value, 0)
        .single()
        .ok_or_else(|| AuthError::InvalidClaim(name, value.to_string()))
}

fn parse_issued_at(value: Option<i64>) -> AuthResult<Option<DateTime<Utc>>> {
    value.map(|iat| parse_timestamp("iat", iat)).transpose()
}

impl TryFrom<serde_json::Value> for AccessClaims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: AccessRepr =
            serde_json::from_value(value).map_err(|err| AuthError::InvalidJson(err.to_string()))?;

        Ok(Self {
            subject: parse_subject(&repr.sub)?,
            roles: repr.roles,
            expires_at: parse_timestamp("exp", repr.exp)?,
            issued_at: parse_issued_at(repr.iat)?,
        })
    }
}

impl TryFrom<serde_json::Value> for RefreshClaims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: RefreshRepr =
            serde_json::from_value(value).map_err(|err| AuthError::InvalidJson(err.to_string()))?;

        Ok(Self {
            subject: parse_subject(&repr.sub)?,
            expires_at: parse_timestamp("exp", repr.exp)?,
            issued_at: parse_issued_at(repr.iat)?,
        })
    }
}

impl VerifiedClaims for AccessClaims {
    fn subject(&self) -> &OpaqueId {
        &self.subject
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl VerifiedClaims for RefreshClaims {
    fn subject(&self) -> &OpaqueId {
        &self.subject
    }

    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
