use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common_auth::{role_permission_rows, Permission, Role};
use common_ids::{EntityKind, IdError, OpaqueId};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already exists")]
    DuplicateEmail,
    #[error("principal not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid row: {0}")]
    InvalidRow(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// An authenticatable account. `id` is the local sequence number.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub id: u64,
    pub full_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn opaque_id(&self) -> Result<OpaqueId, IdError> {
        OpaqueId::new(self.id, EntityKind::User)
    }
}

#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
}

/// Profile fields to overwrite; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct PrincipalChanges {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl PrincipalChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none()
    }
}

/// Emails compare case-insensitively everywhere.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Principal lookup plus role assignment.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError>;

    async fn find_by_id(&self, id: u64) -> Result<Option<Principal>, StoreError>;

    /// One page of principals ordered by id.
    async fn list_principals(&self, limit: u32, offset: u64) -> Result<Vec<Principal>, StoreError>;

    /// Role names ordered by role id. An empty list is valid.
    async fn role_names(&self, user_id: u64) -> Result<Vec<String>, StoreError>;

    async fn create_principal(&self, new: NewPrincipal) -> Result<Principal, StoreError>;

    /// Apply a partial profile update. `NotFound` for unknown principals,
    /// `DuplicateEmail` when the new email belongs to someone else.
    async fn update_principal(
        &self,
        user_id: u64,
        changes: PrincipalChanges,
    ) -> Result<Principal, StoreError>;

    /// Replace the principal's role set. Fails with `NotFound` for unknown principals.
    async fn replace_roles(&self, user_id: u64, roles: &[Role]) -> Result<(), StoreError>;

    /// Returns false when nothing was deleted.
    async fn delete_principal(&self, user_id: u64) -> Result<bool, StoreError>;
}

#[derive(FromRow)]
struct PrincipalRow {
    id: i64,
    full_name: String,
    email: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PrincipalRow> for Principal {
    type Error = StoreError;

    fn try_from(row: PrincipalRow) -> Result<Self, StoreError> {
        let id = u64::try_from(row.id)
            .map_err(|_| StoreError::InvalidRow(format!("negative user id {}", row.id)))?;
        Ok(Principal {
            id,
            full_name: row.full_name,
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at,
        })
    }
}

fn db_id(id: u64) -> Option<i64> {
    i64::try_from(id).ok()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upsert the static role, permission and role/permission catalog.
    pub async fn sync_catalog(&self) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for role in Role::ALL {
            sqlx::query(
                "INSERT INTO roles (id, name, description, created_at) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
            )
            .bind(i64::from(role.id()))
            .bind(role.name())
            .bind(role.description())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for permission in Permission::ALL {
            sqlx::query(
                "INSERT INTO permissions (id, name, description, created_at) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
            )
            .bind(i64::from(permission.id()))
            .bind(permission.name())
            .bind(permission.description())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM role_permissions")
            .execute(&mut *tx)
            .await?;
        let mut granted = 0usize;
        for role in Role::ALL {
            for row in role_permission_rows(role, now) {
                sqlx::query(
                    "INSERT INTO role_permissions (role_id, permission_id, granted_at) VALUES ($1, $2, $3)",
                )
                .bind(i64::from(row.role_id))
                .bind(i64::from(row.permission_id))
                .bind(row.granted_at)
                .execute(&mut *tx)
                .await?;
                granted += 1;
            }
        }

        tx.commit().await?;
        info!(
            roles = Role::ALL.len(),
            permissions = Permission::ALL.len(),
            grants = granted,
            "role catalog synchronised"
        );
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, full_name, email, password_hash, created_at FROM users
             WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .map(Principal::try_from)
        .transpose()
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Principal>, StoreError> {
        let Some(id) = db_id(id) else {
            return Ok(None);
        };
        sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, full_name, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Principal::try_from)
        .transpose()
    }

    async fn list_principals(&self, limit: u32, offset: u64) -> Result<Vec<Principal>, StoreError> {
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        sqlx::query_as::<_, PrincipalRow>(
            "SELECT id, full_name, email, password_hash, created_at FROM users
             ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Principal::try_from)
        .collect()
    }

    async fn role_names(&self, user_id: u64) -> Result<Vec<String>, StoreError> {
        let Some(user_id) = db_id(user_id) else {
            return Ok(Vec::new());
        };
        let names = sqlx::query_scalar::<_, String>(
            "SELECT r.name FROM user_roles ur JOIN roles r ON r.id = ur.role_id
             WHERE ur.user_id = $1 ORDER BY r.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    async fn create_principal(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let row = sqlx::query_as::<_, PrincipalRow>(
            "INSERT INTO users (full_name, email, password_hash) VALUES ($1, $2, $3)
             RETURNING id, full_name, email, password_hash, created_at",
        )
        .bind(&new.full_name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(err)
            }
        })?;
        Principal::try_from(row)
    }

    async fn update_principal(
        &self,
        user_id: u64,
        changes: PrincipalChanges,
    ) -> Result<Principal, StoreError> {
        let user_id = db_id(user_id).ok_or(StoreError::NotFound)?;
        sqlx::query_as::<_, PrincipalRow>(
            "UPDATE users
             SET full_name = COALESCE($2, full_name),
                 email = COALESCE($3, email),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING id, full_name, email, password_hash, created_at",
        )
        .bind(user_id)
        .bind(changes.full_name)
        .bind(changes.email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                StoreError::DuplicateEmail
            } else {
                StoreError::Database(err)
            }
        })?
        .ok_or(StoreError::NotFound)
        .and_then(Principal::try_from)
    }

    async fn replace_roles(&self, user_id: u64, roles: &[Role]) -> Result<(), StoreError> {
        let user_id = db_id(user_id).ok_or(StoreError::NotFound)?;
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound);
        }

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        let unique: BTreeSet<Role> = roles.iter().copied().collect();
        for role in unique {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(user_id)
                .bind(i64::from(role.id()))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_principal(&self, user_id: u64) -> Result<bool, StoreError> {
        let Some(user_id) = db_id(user_id) else {
            return Ok(false);
        };
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn same_email(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

#[derive(Default)]
struct MemoryState {
    next_id: u64,
    principals: BTreeMap<u64, Principal>,
    roles: BTreeMap<u64, BTreeSet<Role>>,
}

/// In-process store for tests and local development.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    state: RwLock<MemoryState>,
    fail_role_lookup: AtomicBool,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `role_names` fail until switched back off.
    pub fn set_role_lookup_failure(&self, fail: bool) {
        self.fail_role_lookup.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, StoreError> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("state lock poisoned".into()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, StoreError> {
        let state = self.read()?;
        Ok(state
            .principals
            .values()
            .find(|principal| same_email(&principal.email, email))
            .cloned())
    }

    async fn find_by_id(&self, id: u64) -> Result<Option<Principal>, StoreError> {
        Ok(self.read()?.principals.get(&id).cloned())
    }

    async fn list_principals(&self, limit: u32, offset: u64) -> Result<Vec<Principal>, StoreError> {
        let state = self.read()?;
        Ok(state
            .principals
            .values()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn role_names(&self, user_id: u64) -> Result<Vec<String>, StoreError> {
        if self.fail_role_lookup.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("role lookup disabled".into()));
        }
        let state = self.read()?;
        Ok(state
            .roles
            .get(&user_id)
            .map(|roles| roles.iter().map(|role| role.name().to_string()).collect())
            .unwrap_or_default())
    }

    async fn create_principal(&self, new: NewPrincipal) -> Result<Principal, StoreError> {
        let mut state = self.write()?;
        if state
            .principals
            .values()
            .any(|principal| same_email(&principal.email, &new.email))
        {
            return Err(StoreError::DuplicateEmail);
        }

        state.next_id += 1;
        let principal = Principal {
            id: state.next_id,
            full_name: new.full_name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: Utc::now(),
        };
        state.principals.insert(principal.id, principal.clone());
        Ok(principal)
    }

    async fn update_principal(
        &self,
        user_id: u64,
        changes: PrincipalChanges,
    ) -> Result<Principal, StoreError> {
        let mut state = self.write()?;
        if let Some(email) = &changes.email {
            if state
                .principals
                .values()
                .any(|other| other.id != user_id && same_email(&other.email, email))
            {
                return Err(StoreError::DuplicateEmail);
            }
        }

        let principal = state
            .principals
            .get_mut(&user_id)
            .ok_or(StoreError::NotFound)?;
        if let Some(full_name) = changes.full_name {
            principal.full_name = full_name;
        }
        if let Some(email) = changes.email {
            principal.email = email;
        }
        Ok(principal.clone())
    }

    async fn replace_roles(&self, user_id: u64, roles: &[Role]) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if !state.principals.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        state.roles.insert(user_id, roles.iter().copied().collect());
        Ok(())
    }

    async fn delete_principal(&self, user_id: u64) -> Result<bool, StoreError> {
        let mut state = self.write()?;
        state.roles.remove(&user_id);
        Ok(state.principals.remove(&user_id).is_some())
    }
}
