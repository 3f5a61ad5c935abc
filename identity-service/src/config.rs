use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fmt;

use crate::tokens::{TokenConfig, MAX_TTL_SECONDS};

pub const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
pub const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_PORT: u16 = 8085;
const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

#[derive(Clone)]
pub struct IdentityConfig {
    pub database_url: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl IdentityConfig {
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_secret: self.access_secret.as_bytes().to_vec(),
            refresh_secret: self.refresh_secret.as_bytes().to_vec(),
            access_ttl_seconds: self.access_ttl_seconds,
            refresh_ttl_seconds: self.refresh_ttl_seconds,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.access_secret.trim().is_empty() {
            bail!("ACCESS_SECRET_KEY must not be empty");
        }
        if self.refresh_secret.trim().is_empty() {
            bail!("REFRESH_SECRET_KEY must not be empty");
        }
        if self.access_secret == self.refresh_secret {
            bail!("ACCESS_SECRET_KEY and REFRESH_SECRET_KEY must differ");
        }
        if self.access_ttl_seconds <= 0 {
            bail!("ACCESS_TOKEN_TTL_SECONDS must be positive");
        }
        if self.refresh_ttl_seconds > MAX_TTL_SECONDS {
            bail!("REFRESH_TOKEN_TTL_SECONDS must not exceed {MAX_TTL_SECONDS}");
        }
        if self.refresh_ttl_seconds <= self.access_ttl_seconds {
            bail!("REFRESH_TOKEN_TTL_SECONDS must be longer than ACCESS_TOKEN_TTL_SECONDS");
        }
        Ok(())
    }
}

impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("database_url", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl_seconds", &self.access_ttl_seconds)
            .field("refresh_ttl_seconds", &self.refresh_ttl_seconds)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .finish()
    }
}

pub fn load_config() -> Result<IdentityConfig> {
    config_from(|key| env::var(key).ok())
}

/// Builds the config from an arbitrary key lookup; `load_config` passes the
/// process environment.
pub fn config_from<F>(lookup: F) -> Result<IdentityConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let database_url = lookup("DATABASE_URL").context("DATABASE_URL must be set")?;
    let access_secret = lookup("ACCESS_SECRET_KEY").context("ACCESS_SECRET_KEY must be set")?;
    let refresh_secret =
        lookup("REFRESH_SECRET_KEY").context("REFRESH_SECRET_KEY must be set")?;

    let access_ttl_seconds = parse_number(&lookup, "ACCESS_TOKEN_TTL_SECONDS")?
        .unwrap_or(DEFAULT_ACCESS_TTL_SECONDS);
    let refresh_ttl_seconds = parse_number(&lookup, "REFRESH_TOKEN_TTL_SECONDS")?
        .unwrap_or(DEFAULT_REFRESH_TTL_SECONDS);

    let host = lookup("HOST")
        .and_then(|value| normalize_optional(&value))
        .unwrap_or_else(|| "0.0.0.0".to_string());
    let port = lookup("PORT")
        .map(|value| {
            value
                .trim()
                .parse::<u16>()
                .map_err(|err| anyhow!("Invalid PORT '{value}': {err}"))
        })
        .transpose()?
        .unwrap_or(DEFAULT_PORT);

    let cors_allowed_origins = lookup("CORS_ALLOWED_ORIGINS")
        .map(|value| parse_list(&value))
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_CORS_ORIGIN.to_string()]);

    let config = IdentityConfig {
        database_url,
        access_secret,
        refresh_secret,
        access_ttl_seconds,
        refresh_ttl_seconds,
        host,
        port,
        cors_allowed_origins,
    };
    config.validate()?;
    Ok(config)
}

fn parse_number<F>(lookup: &F, key: &str) -> Result<Option<i64>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|value| normalize_optional(&value))
        .map(|value| {
            value
                .parse::<i64>()
                .map_err(|err| anyhow!("Invalid {key} '{value}': {err}"))
        })
        .transpose()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(|c| c == ',' || c == ';' || c == ' ')
        .filter_map(normalize_optional)
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
