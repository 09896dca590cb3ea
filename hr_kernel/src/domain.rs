/// Core domain types.
///
/// Pure data. Validation and transitions live in `transitions`, `units`,
/// `timeline` and `invariants`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::ids::{EmployeeId, TenantId, UserId};

// ── Hierarchy ──────────────────────────────────────────────────────

/// `level -> parent level`; `None` marks a root level.
pub type Structure = BTreeMap<String, Option<String>>;

/// Per-tenant hierarchy shape. Frozen forever once `locked` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyConfig {
    pub tenant_id: TenantId,
    pub levels: Vec<String>,
    pub structure: Structure,
    pub use_grades: bool,
    pub use_titles: bool,
    pub locked: bool,
    /// Bumped on every accepted write; the optimistic-lock token.
    pub version: u64,
}

impl HierarchyConfig {
    pub fn has_level(&self, level: &str) -> bool {
        self.levels.iter().any(|l| l == level)
    }

    /// `Some(None)` for a root level, `None` for an unknown level.
    pub fn parent_level(&self, level: &str) -> Option<Option<&str>> {
        if !self.has_level(level) {
            return None;
        }
        Some(self.structure.get(level).and_then(|p| p.as_deref()))
    }

    pub fn draft(&self) -> HierarchyDraft {
        HierarchyDraft {
            levels: self.levels.clone(),
            structure: self.structure.clone(),
            use_grades: self.use_grades,
            use_titles: self.use_titles,
        }
    }
}

/// The editable working set of a hierarchy, before commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HierarchyDraft {
    pub levels: Vec<String>,
    pub structure: Structure,
    pub use_grades: bool,
    pub use_titles: bool,
}

impl HierarchyDraft {
    pub fn is_selected(&self, level: &str) -> bool {
        self.levels.iter().any(|l| l == level)
    }
}

// ── Org units ──────────────────────────────────────────────────────

/// A structural unit placed under a locked hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrgUnit {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub parent_id: Option<Uuid>,
    pub unit_type: String,
    pub unit_number: String,
    pub name: String,
    pub manager_id: Option<EmployeeId>,
    pub effective_from: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

/// Creation request for an org unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrgUnit {
    pub tenant_id: TenantId,
    pub name: String,
    pub unit_type: String,
    pub parent_id: Option<Uuid>,
    pub manager_id: Option<EmployeeId>,
    pub effective_from: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
}

/// Partial update. `unit_type` and `parent_id` are accepted only so that
/// attempts to change them can be rejected explicitly.
///
/// The nullable fields are tri-state: absent leaves the value alone, `null`
/// clears it (or, for `parent_id`, asks to move the unit to root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<Option<EmployeeId>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<NaiveDate>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_type: Option<String>,
    #[serde(deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<Uuid>>,
}

/// Present field, possibly `null`, as `Some(..)`. Absent fields never reach
/// this and fall back to the container default.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ── Employee events ────────────────────────────────────────────────

/// One time-bounded version of an employee field group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmployeeEventRecord {
    pub id: Uuid,
    pub employee_id: EmployeeId,
    pub event_code: String,
    pub valid_from: NaiveDate,
    pub valid_to: Option<NaiveDate>,
    pub payload: serde_json::Value,
    pub recorded_by: Option<UserId>,
}

impl EmployeeEventRecord {
    pub fn is_active(&self) -> bool {
        self.valid_to.is_none()
    }

    /// Half-open `[valid_from, valid_to)` membership.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.valid_from && self.valid_to.map_or(true, |end| date < end)
    }
}

/// Audit entry left behind when an active record is cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelledEventRecord {
    pub record: EmployeeEventRecord,
    /// Journal sequence of the cancellation.
    pub cancelled_at: u64,
    pub reopened: Option<Uuid>,
}
