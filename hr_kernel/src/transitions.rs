/// Hierarchy working-set transitions.
///
/// ALL wizard edits live here. Each edit works on a clone of the draft and
/// either returns the new draft or an error; the input is never mutated.

use serde::{Deserialize, Serialize};

use crate::domain::{HierarchyDraft, Structure};
use crate::error::{CoreError, Result};
use crate::graph::{detect_parent_cycle, repair_structure};
use crate::ids::validate_level_key;
use crate::invariants::{validate_committable, validate_hierarchy_shape};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

/// A single edit to the working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HierarchyEdit {
    SelectLevel(String),
    DeselectLevel(String),
    SetParent { level: String, parent: Option<String> },
    MoveLevel { level: String, direction: Direction },
    SetUseGrades(bool),
    SetUseTitles(bool),
}

// ---------------------------------------------------------------------------
// Public dispatcher
// ---------------------------------------------------------------------------

/// Apply `edit` to `draft` against the tenant's level `catalog`.
pub fn apply_edit(
    draft: &HierarchyDraft,
    catalog: &[String],
    edit: &HierarchyEdit,
) -> Result<HierarchyDraft> {
    let mut next = draft.clone();

    match edit {
        HierarchyEdit::SelectLevel(level) => select_level(&mut next, catalog, level)?,
        HierarchyEdit::DeselectLevel(level) => deselect_level(&mut next, level),
        HierarchyEdit::SetParent { level, parent } => {
            set_parent(&mut next, level, parent.as_deref())?
        }
        HierarchyEdit::MoveLevel { level, direction } => move_level(&mut next, level, *direction)?,
        HierarchyEdit::SetUseGrades(on) => next.use_grades = *on,
        HierarchyEdit::SetUseTitles(on) => next.use_titles = *on,
    }

    validate_hierarchy_shape(&next)?;
    Ok(next)
}

/// Build a committable draft from explicit parts. Levels without a structure
/// entry become roots; structure naming an unselected level is rejected, not
/// repaired.
pub fn draft_from_parts(
    levels: Vec<String>,
    mut structure: Structure,
    use_grades: bool,
    use_titles: bool,
    catalog: &[String],
) -> Result<HierarchyDraft> {
    for level in &levels {
        validate_level_key(level)?;
        if !catalog.contains(level) {
            return Err(CoreError::validation(
                "levels",
                format!("unknown level {:?}", level),
            ));
        }
        structure.entry(level.clone()).or_insert(None);
    }

    let draft = HierarchyDraft {
        levels,
        structure,
        use_grades,
        use_titles,
    };
    validate_committable(&draft)?;
    Ok(draft)
}

// ---------------------------------------------------------------------------
// Individual edits (private)
// ---------------------------------------------------------------------------

fn select_level(draft: &mut HierarchyDraft, catalog: &[String], level: &str) -> Result<()> {
    validate_level_key(level)?;
    let Some(index) = catalog.iter().position(|l| l == level) else {
        return Err(CoreError::validation(
            "level",
            format!("unknown level {:?}", level),
        ));
    };
    if draft.is_selected(level) {
        return Ok(());
    }

    // Parent to the nearest preceding catalog level already selected.
    let default_parent = catalog[..index]
        .iter()
        .rev()
        .find(|candidate| draft.is_selected(candidate))
        .cloned();

    draft.levels.push(level.to_string());
    draft.structure.insert(level.to_string(), default_parent);
    Ok(())
}

fn deselect_level(draft: &mut HierarchyDraft, level: &str) {
    if !draft.is_selected(level) {
        return;
    }
    draft.levels.retain(|l| l != level);
    draft.structure = repair_structure(&draft.levels, &draft.structure);
}

fn set_parent(draft: &mut HierarchyDraft, level: &str, parent: Option<&str>) -> Result<()> {
    if !draft.is_selected(level) {
        return Err(CoreError::validation(
            "level",
            format!("level {:?} is not selected", level),
        ));
    }
    if let Some(parent) = parent {
        if parent == level {
            return Err(CoreError::validation(
                "parent",
                format!("level {:?} cannot report to itself", level),
            ));
        }
        if !draft.is_selected(parent) {
            return Err(CoreError::validation(
                "parent",
                format!("parent {:?} is not selected", parent),
            ));
        }
    }

    let mut candidate = draft.structure.clone();
    candidate.insert(level.to_string(), parent.map(|p| p.to_string()));
    if let Some(cycle) = detect_parent_cycle(&candidate) {
        return Err(CoreError::validation(
            "parent",
            format!("parent cycle: {}", cycle.join(" -> ")),
        ));
    }

    draft.structure = candidate;
    Ok(())
}

fn move_level(draft: &mut HierarchyDraft, level: &str, direction: Direction) -> Result<()> {
    let Some(index) = draft.levels.iter().position(|l| l == level) else {
        return Err(CoreError::validation(
            "level",
            format!("level {:?} is not selected", level),
        ));
    };
    let swap = match direction {
        Direction::Up if index > 0 => index - 1,
        Direction::Down if index + 1 < draft.levels.len() => index + 1,
        _ => return Ok(()),
    };
    draft.levels.swap(index, swap);
    Ok(())
}
