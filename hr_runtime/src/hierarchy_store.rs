//! Per-tenant hierarchy configs and the one-time lock.
//!
//! Every write runs under the store's write lock in the order
//! check → validate → journal → install, so a failed journal append leaves
//! the stored config untouched. The lock is a single-writer transition
//! guarded by `version`; it is never a bare flag flip.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{info, warn};

use hr_kernel::domain::{HierarchyConfig, HierarchyDraft, Structure};
use hr_kernel::engine::HierarchyWizard;
use hr_kernel::error::{CoreError, Result as CoreResult};
use hr_kernel::hashing::config_fingerprint;
use hr_kernel::ids::TenantId;
use hr_kernel::invariants::{validate_committable, validate_config, validate_hierarchy_shape};
use hr_kernel::state::create_default_config;
use hr_kernel::transitions::draft_from_parts;

use crate::error::Result;
use crate::journal::{JournalEntry, SharedJournal};

struct TenantHierarchy {
    config: HierarchyConfig,
    /// Recorded at commit; `None` until locked.
    fingerprint: Option<String>,
}

pub struct HierarchyStore {
    tenants: RwLock<BTreeMap<TenantId, TenantHierarchy>>,
    catalog: Vec<String>,
    journal: SharedJournal,
}

impl HierarchyStore {
    pub fn new(catalog: Vec<String>, journal: SharedJournal) -> Self {
        Self {
            tenants: RwLock::new(BTreeMap::new()),
            catalog,
            journal,
        }
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Create the default unlocked config for a new tenant.
    pub fn register_tenant(&self, tenant: &TenantId) -> Result<HierarchyConfig> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(tenant) {
            return Err(CoreError::state_conflict(format!("tenant {} already registered", tenant)).into());
        }

        let config = create_default_config(tenant.clone());
        validate_config(&config)?;
        self.journal.lock().append(&JournalEntry::TenantRegistered {
            tenant_id: tenant.clone(),
        })?;
        tenants.insert(
            tenant.clone(),
            TenantHierarchy {
                config: config.clone(),
                fingerprint: None,
            },
        );
        info!(tenant = %tenant, "tenant registered");
        Ok(config)
    }

    pub fn get(&self, tenant: &TenantId) -> CoreResult<HierarchyConfig> {
        self.tenants
            .read()
            .get(tenant)
            .map(|t| t.config.clone())
            .ok_or_else(|| CoreError::not_found("tenant", tenant))
    }

    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenants.read().keys().cloned().collect()
    }

    /// A wizard over the stored working set. Fails once locked.
    pub fn begin_setup(&self, tenant: &TenantId) -> CoreResult<HierarchyWizard> {
        let config = self.get(tenant)?;
        HierarchyWizard::from_config(&config, self.catalog.clone())
    }

    /// Persist an unlocked working set.
    pub fn save_draft(
        &self,
        tenant: &TenantId,
        draft: HierarchyDraft,
        expected_version: u64,
    ) -> Result<HierarchyConfig> {
        validate_hierarchy_shape(&draft)?;

        let mut tenants = self.tenants.write();
        let current = writable_entry(&mut tenants, tenant, expected_version)?;
        let next = with_draft(&current.config, draft, false);

        self.journal.lock().append(&JournalEntry::DraftSaved(next.clone()))?;
        current.config = next.clone();
        Ok(next)
    }

    /// Lock the hierarchy. Exactly one commit per tenant ever succeeds.
    pub fn commit(
        &self,
        tenant: &TenantId,
        draft: HierarchyDraft,
        expected_version: u64,
    ) -> Result<HierarchyConfig> {
        validate_committable(&draft)?;

        let mut tenants = self.tenants.write();
        let current = match writable_entry(&mut tenants, tenant, expected_version) {
            Ok(current) => current,
            Err(err) => {
                warn!(tenant = %tenant, error = %err, "hierarchy commit rejected");
                return Err(err.into());
            }
        };
        let next = with_draft(&current.config, draft, true);
        let fingerprint = config_fingerprint(&next);

        self.journal.lock().append(&JournalEntry::HierarchyCommitted {
            config: next.clone(),
            fingerprint: fingerprint.clone(),
        })?;
        current.config = next.clone();
        current.fingerprint = Some(fingerprint.clone());

        info!(
            tenant = %tenant,
            levels = next.levels.len(),
            version = next.version,
            fingerprint = %fingerprint,
            "hierarchy locked"
        );
        Ok(next)
    }

    /// One-shot configure and lock, against the version read on entry.
    pub fn configure(
        &self,
        tenant: &TenantId,
        levels: Vec<String>,
        structure: Structure,
        use_grades: bool,
        use_titles: bool,
    ) -> Result<HierarchyConfig> {
        let current = self.get(tenant)?;
        if current.locked {
            warn!(tenant = %tenant, "configure on locked hierarchy");
            return Err(locked_conflict(tenant).into());
        }
        let draft = draft_from_parts(levels, structure, use_grades, use_titles, &self.catalog)?;
        self.commit(tenant, draft, current.version)
    }

    /// Recompute the fingerprint of a locked config and compare it to the one
    /// recorded at commit.
    pub fn verify_lock(&self, tenant: &TenantId) -> CoreResult<String> {
        let tenants = self.tenants.read();
        let entry = tenants
            .get(tenant)
            .ok_or_else(|| CoreError::not_found("tenant", tenant))?;
        let Some(recorded) = &entry.fingerprint else {
            return Err(CoreError::state_conflict(format!(
                "hierarchy for tenant {} is not locked",
                tenant
            )));
        };
        let actual = config_fingerprint(&entry.config);
        if &actual != recorded {
            return Err(CoreError::state_conflict(format!(
                "hierarchy for tenant {} drifted: recorded {}, computed {}",
                tenant, recorded, actual
            )));
        }
        Ok(actual)
    }

    pub fn configs(&self) -> Vec<HierarchyConfig> {
        self.tenants.read().values().map(|t| t.config.clone()).collect()
    }

    // -----------------------------------------------------------------------
    // Replay: same checks, no journaling
    // -----------------------------------------------------------------------

    pub(crate) fn replay_registered(&self, tenant: &TenantId) -> CoreResult<()> {
        let mut tenants = self.tenants.write();
        if tenants.contains_key(tenant) {
            return Err(CoreError::state_conflict(format!("tenant {} already registered", tenant)));
        }
        tenants.insert(
            tenant.clone(),
            TenantHierarchy {
                config: create_default_config(tenant.clone()),
                fingerprint: None,
            },
        );
        Ok(())
    }

    pub(crate) fn replay_draft(&self, config: HierarchyConfig) -> CoreResult<()> {
        if config.locked {
            return Err(CoreError::validation("locked", "draft entry carries a locked config"));
        }
        validate_hierarchy_shape(&config.draft())?;
        self.replay_install(config, None)
    }

    pub(crate) fn replay_commit(&self, config: HierarchyConfig, fingerprint: String) -> CoreResult<()> {
        if !config.locked {
            return Err(CoreError::validation("locked", "commit entry carries an unlocked config"));
        }
        validate_config(&config)?;
        let actual = config_fingerprint(&config);
        if actual != fingerprint {
            return Err(CoreError::state_conflict(format!(
                "journaled fingerprint {} does not match {}",
                fingerprint, actual
            )));
        }
        self.replay_install(config, Some(fingerprint))
    }

    fn replay_install(&self, config: HierarchyConfig, fingerprint: Option<String>) -> CoreResult<()> {
        let mut tenants = self.tenants.write();
        let tenant = config.tenant_id.clone();
        let expected_version = config.version.saturating_sub(1);
        let current = writable_entry(&mut tenants, &tenant, expected_version)?;
        current.config = config;
        current.fingerprint = fingerprint;
        Ok(())
    }
}

/// Entry for `tenant` if it exists, is unlocked and is at `expected_version`.
/// Locked wins over a stale version so a second commit always reads as a
/// state conflict.
fn writable_entry<'a>(
    tenants: &'a mut BTreeMap<TenantId, TenantHierarchy>,
    tenant: &TenantId,
    expected_version: u64,
) -> CoreResult<&'a mut TenantHierarchy> {
    let entry = tenants
        .get_mut(tenant)
        .ok_or_else(|| CoreError::not_found("tenant", tenant))?;
    if entry.config.locked {
        return Err(locked_conflict(tenant));
    }
    if entry.config.version != expected_version {
        return Err(CoreError::ConcurrencyConflict {
            expected: expected_version,
            found: entry.config.version,
        });
    }
    Ok(entry)
}

fn with_draft(base: &HierarchyConfig, draft: HierarchyDraft, locked: bool) -> HierarchyConfig {
    HierarchyConfig {
        tenant_id: base.tenant_id.clone(),
        levels: draft.levels,
        structure: draft.structure,
        use_grades: draft.use_grades,
        use_titles: draft.use_titles,
        locked,
        version: base.version + 1,
    }
}

fn locked_conflict(tenant: &TenantId) -> CoreError {
    CoreError::state_conflict(format!("hierarchy for tenant {} is already locked", tenant))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hr_kernel::state::default_level_catalog;

    use crate::journal::Journal;

    fn store() -> HierarchyStore {
        HierarchyStore::new(default_level_catalog(), Journal::in_memory().shared())
    }

    fn tenant() -> TenantId {
        TenantId::new("t-1").unwrap()
    }

    fn department_under_wing() -> Structure {
        let mut structure = Structure::new();
        structure.insert("Department".to_string(), Some("Wing".to_string()));
        structure
    }

    #[test]
    fn test_register_twice_conflicts() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        assert_eq!(store.register_tenant(&tenant()).unwrap_err().kind(), "state_conflict");
        assert_eq!(
            store.get(&TenantId::new("nobody").unwrap()).unwrap_err().kind(),
            "not_found"
        );
    }

    #[test]
    fn test_configure_locks_once() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        let levels = vec!["Wing".to_string(), "Department".to_string()];

        let locked = store
            .configure(&tenant(), levels.clone(), department_under_wing(), false, true)
            .unwrap();
        assert!(locked.locked);
        assert_eq!(locked.version, 1);
        assert!(locked.use_titles);

        let err = store
            .configure(&tenant(), levels, department_under_wing(), false, true)
            .unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
        assert_eq!(store.get(&tenant()).unwrap(), locked);
    }

    #[test]
    fn test_stale_version_is_concurrency_conflict() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        let wizard = store.begin_setup(&tenant()).unwrap();
        let (draft, version) = wizard.into_commit().unwrap();

        store.save_draft(&tenant(), draft.clone(), version).unwrap();
        let err = store.commit(&tenant(), draft, version).unwrap_err();
        assert_eq!(err.kind(), "concurrency_conflict");
        assert!(!store.get(&tenant()).unwrap().locked);
    }

    #[test]
    fn test_commit_after_lock_is_state_conflict_even_with_old_version() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        let (draft, version) = store.begin_setup(&tenant()).unwrap().into_commit().unwrap();
        store.commit(&tenant(), draft.clone(), version).unwrap();

        let err = store.commit(&tenant(), draft, version).unwrap_err();
        assert_eq!(err.kind(), "state_conflict");
        assert_eq!(store.begin_setup(&tenant()).err().unwrap().kind(), "state_conflict");
    }

    #[test]
    fn test_verify_lock() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        assert_eq!(store.verify_lock(&tenant()).unwrap_err().kind(), "state_conflict");

        let (draft, version) = store.begin_setup(&tenant()).unwrap().into_commit().unwrap();
        let locked = store.commit(&tenant(), draft, version).unwrap();
        assert_eq!(store.verify_lock(&tenant()).unwrap(), config_fingerprint(&locked));
    }

    #[test]
    fn test_configure_rejects_unknown_level_without_writing() {
        let store = store();
        store.register_tenant(&tenant()).unwrap();
        let err = store
            .configure(&tenant(), vec!["Squad".to_string()], Structure::new(), false, false)
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert_eq!(store.get(&tenant()).unwrap().version, 0);
    }
}
