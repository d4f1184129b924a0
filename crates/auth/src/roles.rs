use core::str::FromStr;

use serde::{Deserialize, Serialize};

use campusgate_core::DomainError;

/// Platform role of an authenticated user.
///
/// Roles are a closed set: adding one is a source change, and every role
/// dispatch on the decision path is an exhaustive `match` the compiler
/// checks. Free-form role strings exist only at the serde boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator; authorized for every tenant, never selects one.
    SuperAdmin,
    /// Administrator of a single school.
    SchoolAdmin,
    /// Teaching staff within a school.
    Teacher,
    /// Enrolled student.
    Student,
    /// Parent/guardian acting on behalf of one of their students.
    Guardian,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::SuperAdmin,
        Role::SchoolAdmin,
        Role::Teacher,
        Role::Student,
        Role::Guardian,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::SchoolAdmin => "school_admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Guardian => "guardian",
        }
    }

    /// Whether this role acts inside a school context.
    pub fn requires_tenant(&self) -> bool {
        !matches!(self, Role::SuperAdmin)
    }

    /// Whether this role acts *through* a dependent (guardians pick which
    /// of their students they are currently acting for).
    pub fn supports_dependents(&self) -> bool {
        matches!(self, Role::Guardian)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown role: {s}")))
    }
}
