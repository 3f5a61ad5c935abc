use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::permissions::Permission;

pub const ROLE_SUPER_ADMIN: &str = "Super Admin";
pub const ROLE_ADMIN: &str = "Admin";
pub const ROLE_HR_MANAGER: &str = "HR Manager";
pub const ROLE_HR_STAFF: &str = "HR Staff";
pub const ROLE_FINANCE_MANAGER: &str = "Finance Manager";
pub const ROLE_ACCOUNTANT: &str = "Accountant";
pub const ROLE_SALES_MANAGER: &str = "Sales Manager";
pub const ROLE_SALES_STAFF: &str = "Sales Staff";
pub const ROLE_PRODUCT_MANAGER: &str = "Product Manager";
pub const ROLE_EMPLOYEE: &str = "Employee";

/// Named permission bundles. Discriminants are the stable catalog ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Role {
    SuperAdmin = 1,
    Admin,
    HrManager,
    HrStaff,
    FinanceManager,
    Accountant,
    SalesManager,
    SalesStaff,
    ProductManager,
    Employee,
}

use Permission::*;

const SUPER_ADMIN_GRANTS: &[Permission] = &Permission::ALL;

const ADMIN_GRANTS: &[Permission] = &[
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    ViewOwnReport,
    CreateReport,
    DeleteReport,
    ManageFinances,
    ManageInventory,
    CreatePosition,
    UpdatePosition,
    CreateDepartment,
    UpdateDepartment,
    CreateCompany,
    UpdateCompany,
    CreateContract,
    UpdateContract,
    ApproveRequests,
    CreateRequest,
    UpdateRequest,
];

const HR_MANAGER_GRANTS: &[Permission] = &[
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    ViewOwnReport,
    CreateReport,
    DeleteReport,
    CreatePosition,
    UpdatePosition,
    CreateDepartment,
    UpdateDepartment,
    DeleteDepartment,
    CreateCompany,
    UpdateCompany,
    CreateContract,
    UpdateContract,
    ApproveRequests,
    CreateRequest,
    UpdateRequest,
];

const HR_STAFF_GRANTS: &[Permission] = &[
    ReadUser,
    UpdateUser,
    ViewOwnReport,
    CreateReport,
    DeleteReport,
    CreatePosition,
    CreateDepartment,
    UpdateDepartment,
    DeleteDepartment,
    CreateRequest,
    UpdateRequest,
];

const FINANCE_MANAGER_GRANTS: &[Permission] = &[
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ViewOwnReport,
    ViewSubordinateReport,
    ViewAllReports,
    ManageFinances,
    ManageInventory,
    CreateReport,
    DeleteReport,
    ApproveRequests,
    CreateRequest,
    UpdateRequest,
];

const ACCOUNTANT_GRANTS: &[Permission] = &[
    ReadUser,
    ViewOwnReport,
    ViewSubordinateReport,
    ViewAllReports,
    ManageFinances,
    CreateReport,
    DeleteReport,
    CreateRequest,
    UpdateRequest,
];

const SALES_MANAGER_GRANTS: &[Permission] = &[
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    ViewOwnReport,
    ViewSubordinateReport,
    ViewAllReports,
    CreateReport,
    DeleteReport,
    ApproveRequests,
    CreateRequest,
    UpdateRequest,
];

const SALES_STAFF_GRANTS: &[Permission] = &[
    ReadUser,
    ViewOwnReport,
    ViewSubordinateReport,
    CreateReport,
    DeleteReport,
    CreateRequest,
    UpdateRequest,
];

const PRODUCT_MANAGER_GRANTS: &[Permission] = &[
    CreateUser,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    ViewOwnReport,
    ViewSubordinateReport,
    CreateReport,
    DeleteReport,
    CreateDepartment,
    UpdateDepartment,
    CreateContract,
    UpdateContract,
    CreateRequest,
    UpdateRequest,
];

const EMPLOYEE_GRANTS: &[Permission] = &[ReadUser, ViewOwnReport, CreateRequest, UpdateRequest];

impl Role {
    pub const ALL: [Role; 10] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::HrManager,
        Role::HrStaff,
        Role::FinanceManager,
        Role::Accountant,
        Role::SalesManager,
        Role::SalesStaff,
        Role::ProductManager,
        Role::Employee,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.id() == id)
    }

    /// Exact, case-sensitive match on the display name carried in tokens.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|role| role.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Role::SuperAdmin => ROLE_SUPER_ADMIN,
            Role::Admin => ROLE_ADMIN,
            Role::HrManager => ROLE_HR_MANAGER,
            Role::HrStaff => ROLE_HR_STAFF,
            Role::FinanceManager => ROLE_FINANCE_MANAGER,
            Role::Accountant => ROLE_ACCOUNTANT,
            Role::SalesManager => ROLE_SALES_MANAGER,
            Role::SalesStaff => ROLE_SALES_STAFF,
            Role::ProductManager => ROLE_PRODUCT_MANAGER,
            Role::Employee => ROLE_EMPLOYEE,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::SuperAdmin => "Full system access with all permissions",
            Role::Admin => "Administrative access to manage users and system",
            Role::HrManager => "Manage human resources and employee data",
            Role::HrStaff => "HR operations and employee management",
            Role::FinanceManager => "Manage financial operations and reports",
            Role::Accountant => "Handle accounting and financial records",
            Role::SalesManager => "Manage sales team and operations",
            Role::SalesStaff => "Sales operations and customer relations",
            Role::ProductManager => "Manage products and development",
            Role::Employee => "Basic employee access",
        }
    }

    /// Static authorization matrix.
    pub fn permissions(self) -> &'static [Permission] {
        match self {
            Role::SuperAdmin => SUPER_ADMIN_GRANTS,
            Role::Admin => ADMIN_GRANTS,
            Role::HrManager => HR_MANAGER_GRANTS,
            Role::HrStaff => HR_STAFF_GRANTS,
            Role::FinanceManager => FINANCE_MANAGER_GRANTS,
            Role::Accountant => ACCOUNTANT_GRANTS,
            Role::SalesManager => SALES_MANAGER_GRANTS,
            Role::SalesStaff => SALES_STAFF_GRANTS,
            Role::ProductManager => PRODUCT_MANAGER_GRANTS,
            Role::Employee => EMPLOYEE_GRANTS,
        }
    }

    pub fn grants(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the role/permission association table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolePermissionRow {
    pub role_id: u32,
    pub permission_id: u32,
    pub granted_at: DateTime<Utc>,
}

pub fn role_permission_rows(role: Role, granted_at: DateTime<Utc>) -> Vec<RolePermissionRow> {
    role.permissions()
        .iter()
        .map(|permission| RolePermissionRow {
            role_id: role.id(),
            permission_id: permission.id(),
            granted_at,
        })
        .collect()
}

/// Union of the permissions granted by the recognised role names.
/// Unknown names contribute nothing.
pub fn permissions_for_roles<I, S>(role_names: I) -> BTreeSet<Permission>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    role_names
        .into_iter()
        .filter_map(|name| Role::from_name(name.as_ref()))
        .flat_map(|role| role.permissions().iter().copied())
        .collect()
}
