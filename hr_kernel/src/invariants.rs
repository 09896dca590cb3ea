/// Invariant checks.
///
/// Every check returns the first violation as a typed error. Used on the
/// write path before anything is installed, and on snapshot restore.

use std::collections::BTreeSet;

use crate::domain::{EmployeeEventRecord, HierarchyConfig, HierarchyDraft};
use crate::error::{CoreError, Result};
use crate::graph::detect_parent_cycle;
use crate::ids::validate_level_key;

// ---------------------------------------------------------------------------
// Hierarchy
// ---------------------------------------------------------------------------

/// Shape checks that hold for every draft, committed or not.
pub fn validate_hierarchy_shape(draft: &HierarchyDraft) -> Result<()> {
    check_level_keys(draft)?;
    check_no_duplicate_levels(draft)?;
    check_structure_matches_levels(draft)?;
    check_parents_selected(draft)?;
    check_no_parent_cycle(draft)?;
    Ok(())
}

/// Shape checks plus the commit precondition of at least one level.
pub fn validate_committable(draft: &HierarchyDraft) -> Result<()> {
    if draft.levels.is_empty() {
        return Err(CoreError::validation(
            "levels",
            "at least one level must be selected",
        ));
    }
    validate_hierarchy_shape(draft)
}

/// A stored config: its shape, and a locked config can never be empty.
pub fn validate_config(config: &HierarchyConfig) -> Result<()> {
    let draft = config.draft();
    if config.locked {
        validate_committable(&draft)
    } else {
        validate_hierarchy_shape(&draft)
    }
}

fn check_level_keys(draft: &HierarchyDraft) -> Result<()> {
    for level in &draft.levels {
        validate_level_key(level)?;
    }
    Ok(())
}

fn check_no_duplicate_levels(draft: &HierarchyDraft) -> Result<()> {
    let unique: BTreeSet<&String> = draft.levels.iter().collect();
    if unique.len() != draft.levels.len() {
        return Err(CoreError::validation("levels", "duplicate level"));
    }
    Ok(())
}

fn check_structure_matches_levels(draft: &HierarchyDraft) -> Result<()> {
    for level in draft.structure.keys() {
        if !draft.is_selected(level) {
            return Err(CoreError::validation(
                "structure",
                format!("level {:?} is not selected", level),
            ));
        }
    }
    for level in &draft.levels {
        if !draft.structure.contains_key(level) {
            return Err(CoreError::validation(
                "structure",
                format!("level {:?} has no structure entry", level),
            ));
        }
    }
    Ok(())
}

fn check_parents_selected(draft: &HierarchyDraft) -> Result<()> {
    for (level, parent) in &draft.structure {
        if let Some(parent) = parent {
            if parent == level {
                return Err(CoreError::validation(
                    "structure",
                    format!("level {:?} cannot be its own parent", level),
                ));
            }
            if !draft.is_selected(parent) {
                return Err(CoreError::validation(
                    "structure",
                    format!("parent {:?} of {:?} is not a selected level", parent, level),
                ));
            }
        }
    }
    Ok(())
}

fn check_no_parent_cycle(draft: &HierarchyDraft) -> Result<()> {
    if let Some(cycle) = detect_parent_cycle(&draft.structure) {
        return Err(CoreError::validation(
            "structure",
            format!("parent cycle: {}", cycle.join(" -> ")),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Event chains
// ---------------------------------------------------------------------------

/// A chain is one (employee, code), oldest first, contiguous, with only the
/// last record active.
pub fn validate_chain(chain: &[EmployeeEventRecord]) -> Result<()> {
    let Some(first) = chain.first() else {
        return Ok(());
    };

    for (i, record) in chain.iter().enumerate() {
        if record.employee_id != first.employee_id || record.event_code != first.event_code {
            return Err(chain_violation(record, "mixed employee or event code in chain"));
        }
        if let Some(end) = record.valid_to {
            if end <= record.valid_from {
                return Err(chain_violation(record, "empty or inverted validity interval"));
            }
        }

        match chain.get(i + 1) {
            Some(next) => {
                if record.valid_to != Some(next.valid_from) {
                    return Err(chain_violation(
                        record,
                        "record does not end where its successor starts",
                    ));
                }
            }
            None => {
                if !record.is_active() {
                    return Err(chain_violation(record, "chain head is closed"));
                }
            }
        }
    }

    Ok(())
}

fn chain_violation(record: &EmployeeEventRecord, reason: &str) -> CoreError {
    CoreError::validation(
        "chain",
        format!(
            "{} (employee={}, code={}, record={})",
            reason, record.employee_id, record.event_code, record.id
        ),
    )
}
