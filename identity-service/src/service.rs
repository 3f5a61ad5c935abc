use std::sync::Arc;

use common_auth::{AuthError, Role};
use common_http_errors::ApiError;
use common_ids::{EntityKind, IdError, OpaqueId};
use thiserror::Error;
use tracing::{debug, warn};

use crate::password::{hash_password, verify_password};
use crate::store::{
    normalize_email, CredentialStore, NewPrincipal, Principal, PrincipalChanges, StoreError,
};
use crate::tokens::{IssuedTokens, TokenError, TokenSigner, TokenSubject};

const EMAIL_FIELD: &str = "email";
const PASSWORD_FIELD: &str = "password";

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    InvalidCredentials {
        field: &'static str,
        message: &'static str,
    },
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: &'static str,
    },
    #[error("unauthorized: {0}")]
    Unauthorized(&'static str),
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Identifier(#[from] IdError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("failed to hash password: {0}")]
    Hash(String),
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::InvalidCredentials { field, message } => ApiError::InvalidCredentials {
                field,
                message: message.to_string(),
            },
            ServiceError::Validation { field, message } => {
                ApiError::invalid_field("validation_failed", field, message)
            }
            ServiceError::Unauthorized(reason) => {
                debug!(reason, "refusing request");
                ApiError::Unauthorized
            }
            ServiceError::UserNotFound => ApiError::NotFound { code: "user_not_found" },
            ServiceError::Identifier(err) if err.is_client_error() => {
                ApiError::invalid_field("invalid_id", "id", err.to_string())
            }
            other => ApiError::internal(other),
        }
    }
}

pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

/// 1-based page request. Missing or zero values fall back to the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

/// Login, refresh, registration and role assignment over a credential store.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    signer: Arc<TokenSigner>,
    // PHC hash checked for unknown emails so both login failures do the same work.
    dummy_hash: Arc<str>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, signer: Arc<TokenSigner>) -> Result<Self, ServiceError> {
        let dummy_hash = hash_password("timing-equaliser")
            .map_err(|err| ServiceError::Hash(err.to_string()))?;
        Ok(Self {
            store,
            signer,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    pub fn signer(&self) -> &Arc<TokenSigner> {
        &self.signer
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedTokens, ServiceError> {
        let email = normalize_email(email);
        let Some(principal) = self.store.find_by_email(&email).await? else {
            let _ = verify_password(password, &self.dummy_hash);
            return Err(ServiceError::InvalidCredentials {
                field: EMAIL_FIELD,
                message: "email does not exist",
            });
        };

        let subject = principal.opaque_id()?;

        if !verify_password(password, &principal.password_hash) {
            return Err(ServiceError::InvalidCredentials {
                field: PASSWORD_FIELD,
                message: "invalid password",
            });
        }

        let roles = self.current_roles(principal.id).await;
        let issued = self.signer.issue_tokens(&TokenSubject {
            user_id: subject,
            roles,
        })?;
        debug!(user_id = %subject, "login succeeded");
        Ok(issued)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokens, ServiceError> {
        let claims = self
            .signer
            .verify_refresh(refresh_token)
            .map_err(|err: AuthError| {
                debug!(reason = %err, "refresh token rejected");
                ServiceError::Unauthorized("invalid refresh token")
            })?;

        let principal = self
            .store
            .find_by_id(claims.subject.local_id())
            .await?
            .ok_or(ServiceError::Unauthorized("user not found"))?;

        let roles = self.current_roles(principal.id).await;
        let issued = self.signer.issue_tokens(&TokenSubject {
            user_id: claims.subject,
            roles,
        })?;
        debug!(user_id = %claims.subject, "refresh succeeded");
        Ok(issued)
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<Principal, ServiceError> {
        let full_name = request.full_name.trim().to_string();
        let email = normalize_email(&request.email);

        if full_name.is_empty() {
            return Err(ServiceError::Validation {
                field: "full_name",
                message: "full name is required",
            });
        }
        ensure_email_shape(&email)?;
        if request.password.trim().is_empty() {
            return Err(ServiceError::Validation {
                field: PASSWORD_FIELD,
                message: "password is required",
            });
        }

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(duplicate_email());
        }

        let password_hash =
            hash_password(&request.password).map_err(|err| ServiceError::Hash(err.to_string()))?;

        match self
            .store
            .create_principal(NewPrincipal {
                full_name,
                email,
                password_hash,
            })
            .await
        {
            Ok(principal) => Ok(principal),
            Err(StoreError::DuplicateEmail) => Err(duplicate_email()),
            Err(err) => Err(err.into()),
        }
    }

    /// Replace the principal's roles with the given catalog ids.
    pub async fn assign_roles(
        &self,
        user_id: &OpaqueId,
        role_ids: &[u32],
    ) -> Result<Vec<String>, ServiceError> {
        ensure_user_kind(user_id)?;
        let roles = role_ids
            .iter()
            .map(|id| {
                Role::from_id(*id).ok_or(ServiceError::Validation {
                    field: "role_ids",
                    message: "unknown role id",
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.store.replace_roles(user_id.local_id(), &roles).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(ServiceError::UserNotFound),
            Err(err) => return Err(err.into()),
        }
        Ok(self.store.role_names(user_id.local_id()).await?)
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Vec<Principal>, ServiceError> {
        Ok(self
            .store
            .list_principals(page.limit(), page.offset())
            .await?)
    }

    /// Partial profile update. Blank fields are rejected; an email change is
    /// checked for uniqueness before the store constraint is hit.
    pub async fn update_user(
        &self,
        user_id: &OpaqueId,
        changes: PrincipalChanges,
    ) -> Result<Principal, ServiceError> {
        ensure_user_kind(user_id)?;
        if changes.is_empty() {
            return Err(ServiceError::Validation {
                field: "body",
                message: "no fields to update",
            });
        }

        let full_name = match changes.full_name {
            Some(name) if name.trim().is_empty() => {
                return Err(ServiceError::Validation {
                    field: "full_name",
                    message: "full name is required",
                })
            }
            other => other.map(|name| name.trim().to_string()),
        };
        let email = changes.email.as_deref().map(normalize_email);

        let current = self.find_user(user_id).await?;
        if let Some(email) = &email {
            ensure_email_shape(email)?;
            if *email != current.email {
                if let Some(existing) = self.store.find_by_email(email).await? {
                    if existing.id != current.id {
                        return Err(duplicate_email());
                    }
                }
            }
        }

        match self
            .store
            .update_principal(current.id, PrincipalChanges { full_name, email })
            .await
        {
            Ok(principal) => Ok(principal),
            Err(StoreError::DuplicateEmail) => Err(duplicate_email()),
            Err(StoreError::NotFound) => Err(ServiceError::UserNotFound),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn find_user(&self, user_id: &OpaqueId) -> Result<Principal, ServiceError> {
        ensure_user_kind(user_id)?;
        self.store
            .find_by_id(user_id.local_id())
            .await?
            .ok_or(ServiceError::UserNotFound)
    }

    pub async fn delete_user(&self, user_id: &OpaqueId) -> Result<(), ServiceError> {
        ensure_user_kind(user_id)?;
        if self.store.delete_principal(user_id.local_id()).await? {
            Ok(())
        } else {
            Err(ServiceError::UserNotFound)
        }
    }

    /// Role names for the principal; a store failure degrades to no roles.
    pub async fn current_roles(&self, user_id: u64) -> Vec<String> {
        match self.store.role_names(user_id).await {
            Ok(roles) => roles,
            Err(err) => {
                warn!(user_id, error = %err, "role lookup failed; continuing with no roles");
                Vec::new()
            }
        }
    }
}

fn ensure_user_kind(id: &OpaqueId) -> Result<(), ServiceError> {
    if id.kind() != EntityKind::User {
        return Err(IdError::KindMismatch {
            expected: EntityKind::User,
            found: id.kind(),
        }
        .into());
    }
    Ok(())
}

fn ensure_email_shape(email: &str) -> Result<(), ServiceError> {
    if looks_like_email(email) {
        Ok(())
    } else {
        Err(ServiceError::Validation {
            field: EMAIL_FIELD,
            message: "email is invalid",
        })
    }
}

fn duplicate_email() -> ServiceError {
    ServiceError::Validation {
        field: EMAIL_FIELD,
        message: "email already exists",
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}
