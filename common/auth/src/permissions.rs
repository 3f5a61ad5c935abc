/// Fine-grained capabilities granted through roles. Discriminants are the
/// stable catalog ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Permission {
    CreateUser = 1,
    ReadUser,
    UpdateUser,
    DeleteUser,
    ManageRoles,
    ViewOwnReport,
    ViewSubordinateReport,
    ViewAllReports,
    CreateReport,
    DeleteReport,
    ManageFinances,
    ManageInventory,
    CreatePosition,
    UpdatePosition,
    DeletePosition,
    CreateDepartment,
    UpdateDepartment,
    DeleteDepartment,
    CreateCompany,
    UpdateCompany,
    DeleteCompany,
    CreateContract,
    UpdateContract,
    DeleteContract,
    ApproveRequests,
    CreateRequest,
    UpdateRequest,
    DeleteRequest,
}

impl Permission {
    pub const ALL: [Permission; 28] = [
        Permission::CreateUser,
        Permission::ReadUser,
        Permission::UpdateUser,
        Permission::DeleteUser,
        Permission::ManageRoles,
        Permission::ViewOwnReport,
        Permission::ViewSubordinateReport,
        Permission::ViewAllReports,
        Permission::CreateReport,
        Permission::DeleteReport,
        Permission::ManageFinances,
        Permission::ManageInventory,
        Permission::CreatePosition,
        Permission::UpdatePosition,
        Permission::DeletePosition,
        Permission::CreateDepartment,
        Permission::UpdateDepartment,
        Permission::DeleteDepartment,
        Permission::CreateCompany,
        Permission::UpdateCompany,
        Permission::DeleteCompany,
        Permission::CreateContract,
        Permission::UpdateContract,
        Permission::DeleteContract,
        Permission::ApproveRequests,
        Permission::CreateRequest,
        Permission::UpdateRequest,
        Permission::DeleteRequest,
    ];

    pub fn id(self) -> u32 {
        self as u32
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|permission| permission.id() == id)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|permission| permission.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Permission::CreateUser => "Create User",
            Permission::ReadUser => "Read User",
            Permission::UpdateUser => "Update User",
            Permission::DeleteUser => "Delete User",
            Permission::ManageRoles => "Manage Roles",
            Permission::ViewOwnReport => "View Own Report",
            Permission::ViewSubordinateReport => "View Subordinate Report",
            Permission::ViewAllReports => "View All Reports",
            Permission::CreateReport => "Create Report",
            Permission::DeleteReport => "Delete Report",
            Permission::ManageFinances => "Manage Finances",
            Permission::ManageInventory => "Manage Inventory",
            Permission::CreatePosition => "Create Position",
            Permission::UpdatePosition => "Update Position",
            Permission::DeletePosition => "Delete Position",
            Permission::CreateDepartment => "Create Department",
            Permission::UpdateDepartment => "Update Department",
            Permission::DeleteDepartment => "Delete Department",
            Permission::CreateCompany => "Create Company",
            Permission::UpdateCompany => "Update Company",
            Permission::DeleteCompany => "Delete Company",
            Permission::CreateContract => "Create Contract",
            Permission::UpdateContract => "Update Contract",
            Permission::DeleteContract => "Delete Contract",
            Permission::ApproveRequests => "Approve Requests",
            Permission::CreateRequest => "Create Request",
            Permission::UpdateRequest => "Update Request",
            Permission::DeleteRequest => "Delete Request",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Permission::CreateUser => "Create new users",
            Permission::ReadUser => "View user information",
            Permission::UpdateUser => "Update user information",
            Permission::DeleteUser => "Delete users",
            Permission::ManageRoles => "Manage user roles",
            Permission::ViewOwnReport => "View own reports",
            Permission::ViewSubordinateReport => "View subordinate reports",
            Permission::ViewAllReports => "View all reports",
            Permission::CreateReport => "Create new reports",
            Permission::DeleteReport => "Delete reports",
            Permission::ManageFinances => "Manage financial operations",
            Permission::ManageInventory => "Manage inventory",
            Permission::CreatePosition => "Create positions",
            Permission::UpdatePosition => "Update positions",
            Permission::DeletePosition => "Delete positions",
            Permission::CreateDepartment => "Create departments",
            Permission::UpdateDepartment => "Update departments",
            Permission::DeleteDepartment => "Delete departments",
            Permission::CreateCompany => "Create companies",
            Permission::UpdateCompany => "Update companies",
            Permission::DeleteCompany => "Delete companies",
            Permission::CreateContract => "Create contracts",
            Permission::UpdateContract => "Update contracts",
            Permission::DeleteContract => "Delete contracts",
            Permission::ApproveRequests => "Approve requests",
            Permission::CreateRequest => "Create requests",
            Permission::UpdateRequest => "Update requests",
            Permission::DeleteRequest => "Delete requests",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
