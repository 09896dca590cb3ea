/// Hierarchy setup wizard.
///
/// Stateful wrapper around the pure transition layer. Holds the working set
/// and the config version it was read at, so the store can reject a commit
/// that lost a race with another editor.

use crate::domain::{HierarchyConfig, HierarchyDraft};
use crate::error::{CoreError, Result};
use crate::invariants::validate_committable;
use crate::transitions::{apply_edit, Direction, HierarchyEdit};

#[derive(Debug, Clone)]
pub struct HierarchyWizard {
    draft: HierarchyDraft,
    catalog: Vec<String>,
    base_version: u64,
}

impl HierarchyWizard {
    /// Seed from a stored config. Locked configs cannot be edited.
    pub fn from_config(config: &HierarchyConfig, catalog: Vec<String>) -> Result<Self> {
        if config.locked {
            return Err(CoreError::state_conflict(format!(
                "hierarchy for tenant {} is locked",
                config.tenant_id
            )));
        }
        Ok(Self {
            draft: config.draft(),
            catalog,
            base_version: config.version,
        })
    }

    /// Start from an empty working set.
    pub fn empty(catalog: Vec<String>, base_version: u64) -> Self {
        Self {
            draft: HierarchyDraft::default(),
            catalog,
            base_version,
        }
    }

    pub fn draft(&self) -> &HierarchyDraft {
        &self.draft
    }

    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    /// Apply one edit. On error the working set is unchanged.
    pub fn apply(&mut self, edit: &HierarchyEdit) -> Result<&HierarchyDraft> {
        self.draft = apply_edit(&self.draft, &self.catalog, edit)?;
        Ok(&self.draft)
    }

    /// Apply an ordered list of edits, stopping at the first failure.
    pub fn apply_sequence(&mut self, edits: &[HierarchyEdit]) -> Result<&HierarchyDraft> {
        for edit in edits {
            self.apply(edit)?;
        }
        Ok(&self.draft)
    }

    pub fn select_level(&mut self, level: &str) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::SelectLevel(level.to_string()))
    }

    pub fn deselect_level(&mut self, level: &str) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::DeselectLevel(level.to_string()))
    }

    pub fn set_parent(&mut self, level: &str, parent: Option<&str>) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::SetParent {
            level: level.to_string(),
            parent: parent.map(|p| p.to_string()),
        })
    }

    pub fn move_level(&mut self, level: &str, direction: Direction) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::MoveLevel {
            level: level.to_string(),
            direction,
        })
    }

    pub fn set_use_grades(&mut self, on: bool) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::SetUseGrades(on))
    }

    pub fn set_use_titles(&mut self, on: bool) -> Result<&HierarchyDraft> {
        self.apply(&HierarchyEdit::SetUseTitles(on))
    }

    /// Validate the whole working set for commit and hand it over together
    /// with the version it was based on.
    pub fn into_commit(self) -> Result<(HierarchyDraft, u64)> {
        validate_committable(&self.draft)?;
        Ok((self.draft, self.base_version))
    }
}
