//! `HrCore`: the service facade.
//!
//! Owns every store, the shared journal and the employee directory. Opening
//! a core replays its journal, so a core opened on the same file always
//! comes back in the state it was left in.
//!
//! Lock order, everywhere: domain lock (hierarchy store, tenant sequencer,
//! unit map or chain) → journal. The journal lock is never held while
//! waiting for anything else.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use uuid::Uuid;

use hr_kernel::domain::{
    CancelledEventRecord, EmployeeEventRecord, HierarchyConfig, HierarchyDraft, NewOrgUnit,
    OrgUnit, Structure, UnitPatch,
};
use hr_kernel::engine::HierarchyWizard;
use hr_kernel::error::CoreError;
use hr_kernel::events::EventCodeRegistry;
use hr_kernel::ids::{EmployeeId, TenantId};
use hr_kernel::KERNEL_VERSION;

use crate::config::CoreConfig;
use crate::directory::{EmployeeDirectory, OpenDirectory};
use crate::error::Result;
use crate::event_store::{EventStore, RecordEventRequest};
use crate::hierarchy_store::HierarchyStore;
use crate::journal::{Journal, SharedJournal};
use crate::org_tree::OrgTree;
use crate::query::{ProfileSnapshot, QueryEngine};
use crate::replay::{replay_frames, ReplayStats, ReplayTarget};
use crate::snapshot_codec::CoreSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureOutcome {
    pub locked: bool,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelOutcome {
    pub reactivated: Option<EmployeeEventRecord>,
}

pub struct HrCore {
    config: CoreConfig,
    journal: SharedJournal,
    hierarchy: HierarchyStore,
    units: OrgTree,
    events: Arc<EventStore>,
    query: QueryEngine,
    directory: Arc<dyn EmployeeDirectory>,
    replayed: ReplayStats,
}

impl HrCore {
    /// Validate `config`, open its journal (if any) and replay it.
    pub fn open(config: CoreConfig) -> Result<Self> {
        Self::open_with_registry(config, EventCodeRegistry::default())
    }

    pub fn open_with_registry(config: CoreConfig, registry: EventCodeRegistry) -> Result<Self> {
        config.validate()?;

        let journal = match &config.journal.path {
            Some(path) => Journal::open(path, config.journal.sync)?,
            None => Journal::in_memory(),
        };
        let frames = journal.load_frames()?;
        let journal = journal.shared();

        let hierarchy = HierarchyStore::new(config.level_catalog.clone(), journal.clone());
        let units = OrgTree::new(config.unit_number_width, journal.clone());
        let events = Arc::new(EventStore::new(registry, journal.clone()));

        let replayed = replay_frames(
            &frames,
            &ReplayTarget {
                hierarchy: &hierarchy,
                units: &units,
                events: &events,
            },
        )?;

        info!(
            journal = ?config.journal.path,
            replayed = replayed.frames,
            "hr core opened"
        );

        Ok(Self {
            query: QueryEngine::new(events.clone()),
            config,
            journal,
            hierarchy,
            units,
            events,
            directory: Arc::new(OpenDirectory),
            replayed,
        })
    }

    pub fn with_directory(mut self, directory: Arc<dyn EmployeeDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn replay_stats(&self) -> &ReplayStats {
        &self.replayed
    }

    pub fn journal_sequence(&self) -> u64 {
        self.journal.lock().last_sequence()
    }

    fn require_employee(&self, employee: &EmployeeId) -> Result<()> {
        if !self.directory.contains(employee) {
            return Err(CoreError::not_found("employee", employee).into());
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Hierarchy
    // -----------------------------------------------------------------------

    pub fn register_tenant(&self, tenant: &TenantId) -> Result<HierarchyConfig> {
        self.hierarchy.register_tenant(tenant)
    }

    pub fn hierarchy(&self, tenant: &TenantId) -> Result<HierarchyConfig> {
        Ok(self.hierarchy.get(tenant)?)
    }

    pub fn begin_setup(&self, tenant: &TenantId) -> Result<HierarchyWizard> {
        Ok(self.hierarchy.begin_setup(tenant)?)
    }

    /// Persist the wizard's working set without locking.
    pub fn save_hierarchy_draft(&self, tenant: &TenantId, wizard: &HierarchyWizard) -> Result<HierarchyConfig> {
        let draft: HierarchyDraft = wizard.draft().clone();
        self.hierarchy.save_draft(tenant, draft, wizard.base_version())
    }

    /// Validate the wizard's working set and lock it.
    pub fn commit_hierarchy(&self, tenant: &TenantId, wizard: HierarchyWizard) -> Result<ConfigureOutcome> {
        let (draft, version) = wizard.into_commit()?;
        let config = self.hierarchy.commit(tenant, draft, version)?;
        Ok(ConfigureOutcome {
            locked: config.locked,
            version: config.version,
        })
    }

    pub fn configure_hierarchy(
        &self,
        tenant: &TenantId,
        levels: Vec<String>,
        structure: Structure,
        use_grades: bool,
        use_titles: bool,
    ) -> Result<ConfigureOutcome> {
        let config = self
            .hierarchy
            .configure(tenant, levels, structure, use_grades, use_titles)?;
        Ok(ConfigureOutcome {
            locked: config.locked,
            version: config.version,
        })
    }

    pub fn verify_hierarchy_lock(&self, tenant: &TenantId) -> Result<String> {
        Ok(self.hierarchy.verify_lock(tenant)?)
    }

    // -----------------------------------------------------------------------
    // Org units
    // -----------------------------------------------------------------------

    pub fn create_org_unit(&self, request: NewOrgUnit) -> Result<OrgUnit> {
        if let Some(manager) = &request.manager_id {
            self.require_employee(manager)?;
        }
        let config = self.hierarchy.get(&request.tenant_id)?;
        self.units.create_unit(&config, &request)
    }

    pub fn update_org_unit(&self, id: Uuid, patch: UnitPatch) -> Result<OrgUnit> {
        if let Some(Some(manager)) = &patch.manager_id {
            self.require_employee(manager)?;
        }
        self.units.update_unit(id, &patch)
    }

    pub fn get_org_unit(&self, id: Uuid) -> Result<OrgUnit> {
        Ok(self.units.get_unit(id)?)
    }

    pub fn list_org_units(&self, tenant: &TenantId) -> Result<Vec<OrgUnit>> {
        self.hierarchy.get(tenant)?;
        Ok(self.units.list_units(tenant))
    }

    pub fn org_unit_children(&self, id: Uuid) -> Result<Vec<OrgUnit>> {
        Ok(self.units.children(id)?)
    }

    // -----------------------------------------------------------------------
    // Employee events
    // -----------------------------------------------------------------------

    pub fn record_employee_event(&self, request: RecordEventRequest) -> Result<EmployeeEventRecord> {
        self.require_employee(&request.employee_id)?;
        self.events.record_event(request)
    }

    pub fn list_employee_events(
        &self,
        employee: &EmployeeId,
        code: &str,
        include_history: bool,
    ) -> Result<Vec<EmployeeEventRecord>> {
        self.require_employee(employee)?;
        Ok(self.events.list_events(employee, code, include_history)?)
    }

    pub fn cancel_active_event(&self, employee: &EmployeeId, code: &str) -> Result<CancelOutcome> {
        self.require_employee(employee)?;
        let reactivated = self.events.cancel_active(employee, code)?;
        Ok(CancelOutcome { reactivated })
    }

    pub fn cancelled_events(&self, employee: &EmployeeId, code: &str) -> Result<Vec<CancelledEventRecord>> {
        self.require_employee(employee)?;
        Ok(self.events.cancelled_events(employee, code)?)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn resolve_as_of(&self, employee: &EmployeeId, code: &str, as_of: NaiveDate) -> Result<EmployeeEventRecord> {
        self.require_employee(employee)?;
        Ok(self.query.resolve_as_of(employee, code, as_of)?)
    }

    pub fn project_current_state(&self, employee: &EmployeeId, codes: &[&str]) -> Result<ProfileSnapshot> {
        self.require_employee(employee)?;
        Ok(self.query.project_current_state(employee, codes)?)
    }

    pub fn project_as_of(&self, employee: &EmployeeId, codes: &[&str], as_of: NaiveDate) -> Result<ProfileSnapshot> {
        self.require_employee(employee)?;
        Ok(self.query.project_as_of(employee, codes, as_of)?)
    }

    // -----------------------------------------------------------------------
    // Snapshot
    // -----------------------------------------------------------------------

    /// Whole-core state in canonical order. Not atomic across stores; take it
    /// while writers are quiet.
    pub fn export_snapshot(&self) -> CoreSnapshot {
        let journal_sequence = self.journal_sequence();
        let hierarchies = self.hierarchy.configs();

        let mut units = self.units.all_units();
        units.sort_by(|a, b| {
            (&a.tenant_id, a.unit_number.len(), &a.unit_number).cmp(&(
                &b.tenant_id,
                b.unit_number.len(),
                &b.unit_number,
            ))
        });

        CoreSnapshot {
            kernel_version: KERNEL_VERSION,
            journal_sequence,
            hierarchies,
            units,
            chains: self.events.chains(),
        }
    }
}
