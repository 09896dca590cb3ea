/// Org unit placement and update rules.
///
/// The caller resolves the parent unit and the unit number; everything here
/// is pure.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{HierarchyConfig, NewOrgUnit, OrgUnit, UnitPatch};
use crate::error::{CoreError, Result};

pub const MIN_UNIT_NAME_CHARS: usize = 2;

/// Trimmed name of at least `MIN_UNIT_NAME_CHARS` characters.
pub fn normalize_unit_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.chars().count() < MIN_UNIT_NAME_CHARS {
        return Err(CoreError::validation(
            "name",
            format!("must be at least {} characters", MIN_UNIT_NAME_CHARS),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_validity(effective_from: NaiveDate, expiry_date: Option<NaiveDate>) -> Result<()> {
    if let Some(expiry) = expiry_date {
        if expiry <= effective_from {
            return Err(CoreError::validation(
                "expiry_date",
                format!("{} is not after effective_from {}", expiry, effective_from),
            ));
        }
    }
    Ok(())
}

/// Check that a unit of `unit_type` may sit under `parent` in `config`.
pub fn check_placement(
    config: &HierarchyConfig,
    unit_type: &str,
    parent: Option<&OrgUnit>,
) -> Result<()> {
    if !config.locked {
        return Err(CoreError::state_conflict(format!(
            "hierarchy for tenant {} is not locked yet",
            config.tenant_id
        )));
    }

    let Some(expected_parent_type) = config.parent_level(unit_type) else {
        return Err(CoreError::validation(
            "unit_type",
            format!("unknown level {:?}", unit_type),
        ));
    };

    match (expected_parent_type, parent) {
        (None, None) => Ok(()),
        (None, Some(_)) => Err(CoreError::validation(
            "parent_id",
            format!("{:?} is a root level and cannot have a parent", unit_type),
        )),
        (Some(expected), None) => Err(CoreError::validation(
            "parent_id",
            format!("{:?} requires a parent of type {:?}", unit_type, expected),
        )),
        (Some(expected), Some(parent)) => {
            if parent.tenant_id != config.tenant_id {
                return Err(CoreError::validation(
                    "parent_id",
                    "parent belongs to another tenant",
                ));
            }
            if parent.unit_type != expected {
                return Err(CoreError::validation(
                    "parent_id",
                    format!(
                        "{:?} requires a parent of type {:?}, got {:?}",
                        unit_type, expected, parent.unit_type
                    ),
                ));
            }
            Ok(())
        }
    }
}

/// Validate a creation request and assemble the unit.
pub fn build_unit(
    config: &HierarchyConfig,
    request: &NewOrgUnit,
    parent: Option<&OrgUnit>,
    id: Uuid,
    unit_number: String,
) -> Result<OrgUnit> {
    if request.tenant_id != config.tenant_id {
        return Err(CoreError::validation("tenant_id", "does not match hierarchy"));
    }
    let name = normalize_unit_name(&request.name)?;
    validate_validity(request.effective_from, request.expiry_date)?;
    check_placement(config, &request.unit_type, parent)?;

    Ok(OrgUnit {
        id,
        tenant_id: request.tenant_id.clone(),
        parent_id: parent.map(|p| p.id),
        unit_type: request.unit_type.clone(),
        unit_number,
        name,
        manager_id: request.manager_id.clone(),
        effective_from: request.effective_from,
        expiry_date: request.expiry_date,
    })
}

/// Apply a patch to a copy of `unit`. Structural fields are immutable.
pub fn apply_patch(unit: &OrgUnit, patch: &UnitPatch) -> Result<OrgUnit> {
    if let Some(unit_type) = &patch.unit_type {
        if *unit_type != unit.unit_type {
            return Err(CoreError::immutable("unit_type"));
        }
    }
    if let Some(parent_id) = &patch.parent_id {
        if *parent_id != unit.parent_id {
            return Err(CoreError::immutable("parent_id"));
        }
    }

    let mut next = unit.clone();
    if let Some(name) = &patch.name {
        next.name = normalize_unit_name(name)?;
    }
    if let Some(manager_id) = &patch.manager_id {
        next.manager_id = manager_id.clone();
    }
    if let Some(effective_from) = patch.effective_from {
        next.effective_from = effective_from;
    }
    if let Some(expiry_date) = patch.expiry_date {
        next.expiry_date = expiry_date;
    }
    validate_validity(next.effective_from, next.expiry_date)?;
    Ok(next)
}
