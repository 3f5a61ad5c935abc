pub mod claims;
pub mod clock;
pub mod config;
pub mod error;
pub mod extractors;
pub mod guards;
pub mod permissions;
pub mod roles;
pub mod verifier;

pub use claims::{AccessClaims, RefreshClaims, VerifiedClaims};
pub use clock::{Clock, FixedClock, SharedClock, SystemClock};
pub use config::JwtConfig;
pub use error::{AuthError, AuthResult};
pub use extractors::AuthContext;
pub use guards::{
    authorize, ensure_permission, ensure_role, require_permission, roles_intersect, GuardError,
};
pub use permissions::Permission;
pub use roles::{
    permissions_for_roles, role_permission_rows, Role, RolePermissionRow, ROLE_ACCOUNTANT,
    ROLE_ADMIN, ROLE_EMPLOYEE, ROLE_FINANCE_MANAGER, ROLE_HR_MANAGER, ROLE_HR_STAFF,
    ROLE_PRODUCT_MANAGER, ROLE_SALES_MANAGER, ROLE_SALES_STAFF, ROLE_SUPER_ADMIN,
};
pub use verifier::JwtVerifier;
