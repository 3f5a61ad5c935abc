#![allow(dead_code)]

use std::{env, sync::Arc};

use anyhow::Result;
use chrono::{TimeZone, Utc};
use common_auth::{FixedClock, Role};
use identity_service::metrics::IdentityMetrics;
use identity_service::password::hash_password;
use identity_service::service::AuthService;
use identity_service::store::{CredentialStore, InMemoryCredentialStore, NewPrincipal, Principal};
use identity_service::tokens::{TokenConfig, TokenSigner};
use identity_service::AppState;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub const ACCESS_SECRET: &[u8] = b"test-access-secret";
pub const REFRESH_SECRET: &[u8] = b"test-refresh-secret";
pub const ACCESS_TTL_SECONDS: i64 = 900;
pub const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

pub fn token_config() -> TokenConfig {
    TokenConfig {
        access_secret: ACCESS_SECRET.to_vec(),
        refresh_secret: REFRESH_SECRET.to_vec(),
        access_ttl_seconds: ACCESS_TTL_SECONDS,
        refresh_ttl_seconds: REFRESH_TTL_SECONDS,
    }
}

/// In-memory service stack driven by a manual clock.
pub struct Harness {
    pub store: Arc<InMemoryCredentialStore>,
    pub clock: FixedClock,
    pub signer: Arc<TokenSigner>,
    pub auth: AuthService,
    pub metrics: Arc<IdentityMetrics>,
}

impl Harness {
    pub fn new() -> Result<Self> {
        let clock = FixedClock::at(Utc::now());
        Self::with_clock(clock)
    }

    pub fn at_epoch(seconds: i64) -> Result<Self> {
        let instant = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid timestamp {seconds}"))?;
        Self::with_clock(FixedClock::at(instant))
    }

    fn with_clock(clock: FixedClock) -> Result<Self> {
        let store = Arc::new(InMemoryCredentialStore::new());
        let signer = Arc::new(TokenSigner::with_clock(token_config(), Arc::new(clock.clone()))?);
        let auth = AuthService::new(store.clone(), signer.clone())?;
        let metrics = Arc::new(IdentityMetrics::new()?);
        Ok(Self {
            store,
            clock,
            signer,
            auth,
            metrics,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.auth.clone(), self.metrics.clone())
    }

    pub async fn seed_user(&self, email: &str, password: &str, roles: &[Role]) -> Result<Principal> {
        let principal = self
            .store
            .create_principal(NewPrincipal {
                full_name: "Test User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
            })
            .await?;
        self.store.replace_roles(principal.id, roles).await?;
        Ok(principal)
    }
}

/// External Postgres for store tests, selected by `IDENTITY_TEST_DATABASE_URL`.
pub struct TestDatabase {
    pool: PgPool,
}

impl TestDatabase {
    pub async fn setup() -> Result<Option<Self>> {
        let Ok(database_url) = env::var("IDENTITY_TEST_DATABASE_URL") else {
            eprintln!(
                "Skipping identity-service integration tests: set IDENTITY_TEST_DATABASE_URL to run them.",
            );
            return Ok(None);
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        Ok(Some(Self { pool }))
    }

    pub fn pool_clone(&self) -> PgPool {
        self.pool.clone()
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}
