//! Employee existence is owned by the surrounding application; the core only
//! asks.

use std::collections::HashSet;

use hr_kernel::ids::EmployeeId;

pub trait EmployeeDirectory: Send + Sync {
    fn contains(&self, employee: &EmployeeId) -> bool;
}

/// Accepts every employee id.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenDirectory;

impl EmployeeDirectory for OpenDirectory {
    fn contains(&self, _employee: &EmployeeId) -> bool {
        true
    }
}

/// Fixed set of known employees.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    known: HashSet<EmployeeId>,
}

impl StaticDirectory {
    pub fn new(employees: impl IntoIterator<Item = EmployeeId>) -> Self {
        Self {
            known: employees.into_iter().collect(),
        }
    }
}

impl EmployeeDirectory for StaticDirectory {
    fn contains(&self, employee: &EmployeeId) -> bool {
        self.known.contains(employee)
    }
}
