//! Org units placed under a locked hierarchy.
//!
//! Creation runs inside the tenant's sequencer section: number, validation,
//! journal append and insert all happen before the next creation in the same
//! tenant can start. Units are never deleted or reparented.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use hr_kernel::domain::{HierarchyConfig, NewOrgUnit, OrgUnit, UnitPatch};
use hr_kernel::error::{CoreError, Result as CoreResult};
use hr_kernel::ids::TenantId;
use hr_kernel::units::{apply_patch, build_unit};

use crate::error::Result;
use crate::journal::{JournalEntry, SharedJournal};
use crate::sequencer::UnitSequencer;

pub struct OrgTree {
    units: RwLock<BTreeMap<Uuid, OrgUnit>>,
    sequencer: UnitSequencer,
    journal: SharedJournal,
}

impl OrgTree {
    pub fn new(unit_number_width: usize, journal: SharedJournal) -> Self {
        Self {
            units: RwLock::new(BTreeMap::new()),
            sequencer: UnitSequencer::new(unit_number_width),
            journal,
        }
    }

    /// Create a unit under `config`, which must be the request tenant's
    /// locked hierarchy.
    pub fn create_unit(&self, config: &HierarchyConfig, request: &NewOrgUnit) -> Result<OrgUnit> {
        let parent = request
            .parent_id
            .map(|id| self.get_unit(id))
            .transpose()?;

        self.sequencer
            .with_next(&request.tenant_id, |unit_number| -> Result<OrgUnit> {
                let unit = build_unit(config, request, parent.as_ref(), Uuid::new_v4(), unit_number)?;
                self.journal
                    .lock()
                    .append(&JournalEntry::UnitCreated(unit.clone()))?;
                self.units.write().insert(unit.id, unit.clone());
                Ok(unit)
            })
            .map(|unit| {
                info!(
                    tenant = %unit.tenant_id,
                    unit_id = %unit.id,
                    unit_type = %unit.unit_type,
                    unit_number = %unit.unit_number,
                    "org unit created"
                );
                unit
            })
    }

    /// Apply a patch. `unit_type` and `parent_id` cannot change.
    pub fn update_unit(&self, id: Uuid, patch: &UnitPatch) -> Result<OrgUnit> {
        let mut units = self.units.write();
        let current = units.get(&id).ok_or_else(|| CoreError::not_found("org unit", id))?;
        let next = apply_patch(current, patch)?;
        if &next == current {
            return Ok(next);
        }

        self.journal
            .lock()
            .append(&JournalEntry::UnitUpdated(next.clone()))?;
        units.insert(id, next.clone());
        info!(unit_id = %id, "org unit updated");
        Ok(next)
    }

    pub fn get_unit(&self, id: Uuid) -> CoreResult<OrgUnit> {
        self.units
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("org unit", id))
    }

    /// Units of `tenant` in unit number order.
    pub fn list_units(&self, tenant: &TenantId) -> Vec<OrgUnit> {
        let mut units: Vec<OrgUnit> = self
            .units
            .read()
            .values()
            .filter(|u| &u.tenant_id == tenant)
            .cloned()
            .collect();
        sort_by_number(&mut units);
        units
    }

    pub fn children(&self, id: Uuid) -> CoreResult<Vec<OrgUnit>> {
        let units = self.units.read();
        if !units.contains_key(&id) {
            return Err(CoreError::not_found("org unit", id));
        }
        let mut children: Vec<OrgUnit> = units
            .values()
            .filter(|u| u.parent_id == Some(id))
            .cloned()
            .collect();
        sort_by_number(&mut children);
        Ok(children)
    }

    pub fn all_units(&self) -> Vec<OrgUnit> {
        self.units.read().values().cloned().collect()
    }

    pub fn last_unit_number(&self, tenant: &TenantId) -> u64 {
        self.sequencer.current(tenant)
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    /// Re-run placement and field checks for a journaled unit, then install
    /// it and advance the tenant counter.
    pub(crate) fn replay_created(&self, config: &HierarchyConfig, unit: OrgUnit) -> CoreResult<()> {
        let parent = unit.parent_id.map(|id| self.get_unit(id)).transpose()?;
        let request = NewOrgUnit {
            tenant_id: unit.tenant_id.clone(),
            name: unit.name.clone(),
            unit_type: unit.unit_type.clone(),
            parent_id: unit.parent_id,
            manager_id: unit.manager_id.clone(),
            effective_from: unit.effective_from,
            expiry_date: unit.expiry_date,
        };
        let rebuilt = build_unit(config, &request, parent.as_ref(), unit.id, unit.unit_number.clone())?;
        if rebuilt != unit {
            return Err(CoreError::validation("org_unit", "journaled unit is not normalized"));
        }

        self.sequencer.observe(&unit.tenant_id, &unit.unit_number)?;

        let mut units = self.units.write();
        if units.contains_key(&unit.id) {
            return Err(CoreError::state_conflict(format!("org unit {} created twice", unit.id)));
        }
        if units
            .values()
            .any(|u| u.tenant_id == unit.tenant_id && u.unit_number == unit.unit_number)
        {
            return Err(CoreError::state_conflict(format!(
                "unit number {} reused in tenant {}",
                unit.unit_number, unit.tenant_id
            )));
        }
        units.insert(unit.id, unit);
        Ok(())
    }

    pub(crate) fn replay_updated(&self, unit: OrgUnit) -> CoreResult<()> {
        let mut units = self.units.write();
        let current = units
            .get(&unit.id)
            .ok_or_else(|| CoreError::not_found("org unit", unit.id))?;
        if current.unit_number != unit.unit_number {
            return Err(CoreError::immutable("unit_number"));
        }
        if current.tenant_id != unit.tenant_id {
            return Err(CoreError::immutable("tenant_id"));
        }
        let patch = UnitPatch {
            name: Some(unit.name.clone()),
            manager_id: Some(unit.manager_id.clone()),
            effective_from: Some(unit.effective_from),
            expiry_date: Some(unit.expiry_date),
            unit_type: Some(unit.unit_type.clone()),
            parent_id: Some(unit.parent_id),
        };
        let next = apply_patch(current, &patch)?;
        units.insert(next.id, next);
        Ok(())
    }
}

fn sort_by_number(units: &mut [OrgUnit]) {
    units.sort_by(|a, b| {
        (a.unit_number.len(), &a.unit_number).cmp(&(b.unit_number.len(), &b.unit_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hr_kernel::ids::EmployeeId;
    use hr_kernel::state::create_default_config;

    use crate::journal::Journal;

    fn tenant() -> TenantId {
        TenantId::new("t-1").unwrap()
    }

    fn locked() -> HierarchyConfig {
        let mut config = create_default_config(tenant());
        config.locked = true;
        config.version = 1;
        config
    }

    fn request(unit_type: &str, parent_id: Option<Uuid>) -> NewOrgUnit {
        NewOrgUnit {
            tenant_id: tenant(),
            name: format!("{} unit", unit_type),
            unit_type: unit_type.to_string(),
            parent_id,
            manager_id: None,
            effective_from: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            expiry_date: None,
        }
    }

    fn tree() -> OrgTree {
        OrgTree::new(3, Journal::in_memory().shared())
    }

    #[test]
    fn test_numbers_follow_creation_order() {
        let tree = tree();
        let config = locked();
        let a = tree.create_unit(&config, &request("Wing", None)).unwrap();
        let b = tree.create_unit(&config, &request("Wing", None)).unwrap();
        let c = tree.create_unit(&config, &request("Department", Some(a.id))).unwrap();
        assert_eq!(
            [a.unit_number.as_str(), b.unit_number.as_str(), c.unit_number.as_str()],
            ["001", "002", "003"]
        );
        assert_eq!(tree.children(a.id).unwrap(), vec![c]);
        assert_eq!(tree.list_units(&tenant()).len(), 3);
    }

    #[test]
    fn test_rejected_creation_keeps_number() {
        let tree = tree();
        let config = locked();
        assert!(tree.create_unit(&config, &request("Department", None)).is_err());
        let wing = tree.create_unit(&config, &request("Wing", None)).unwrap();
        assert_eq!(wing.unit_number, "001");
    }

    #[test]
    fn test_missing_parent_is_not_found() {
        let tree = tree();
        let err = tree
            .create_unit(&locked(), &request("Department", Some(Uuid::new_v4())))
            .unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_update_keeps_structure() {
        let tree = tree();
        let wing = tree.create_unit(&locked(), &request("Wing", None)).unwrap();
        let updated = tree
            .update_unit(
                wing.id,
                &UnitPatch {
                    manager_id: Some(Some(EmployeeId::new("e-3").unwrap())),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.unit_number, "001");
        assert_eq!(tree.get_unit(wing.id).unwrap(), updated);

        let err = tree
            .update_unit(
                wing.id,
                &UnitPatch {
                    unit_type: Some("Department".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), "immutable_field");
        assert_eq!(tree.update_unit(Uuid::new_v4(), &UnitPatch::default()).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_replay_rejects_reused_number() {
        let tree = tree();
        let config = locked();
        let wing = tree.create_unit(&config, &request("Wing", None)).unwrap();
        let mut copy = wing.clone();
        copy.id = Uuid::new_v4();
        let err = tree.replay_created(&config, copy).unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
    }
}
