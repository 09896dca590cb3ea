//! Temporal employee event store.
//!
//! One chain per (employee, event code), each behind its own mutex. Record
//! and cancel hold that mutex across check, journal append and install, so
//! no reader ever sees a chain with zero or two active records mid-update.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use hr_kernel::domain::{CancelledEventRecord, EmployeeEventRecord};
use hr_kernel::error::{CoreError, Result as CoreResult};
use hr_kernel::events::EventCodeRegistry;
use hr_kernel::ids::{EmployeeId, UserId};
use hr_kernel::timeline::{active_record, append_record, cancel_active, resolve_as_of};

use crate::error::Result;
use crate::journal::{JournalEntry, SharedJournal};
use crate::snapshot_codec::ChainSnapshot;

/// Request to append a new version of an employee field group.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordEventRequest {
    pub employee_id: EmployeeId,
    pub event_code: String,
    pub valid_from: NaiveDate,
    pub payload: Value,
    pub recorded_by: Option<UserId>,
    /// Retries with the same key return the original record.
    pub idempotency_key: Option<String>,
}

impl RecordEventRequest {
    pub fn new(
        employee_id: EmployeeId,
        event_code: impl Into<String>,
        valid_from: NaiveDate,
        payload: Value,
    ) -> Self {
        Self {
            employee_id,
            event_code: event_code.into(),
            valid_from,
            payload,
            recorded_by: None,
            idempotency_key: None,
        }
    }

    pub fn recorded_by(mut self, user: UserId) -> Self {
        self.recorded_by = Some(user);
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

type ChainKey = (EmployeeId, String);

#[derive(Debug, Default)]
struct ChainState {
    records: Vec<EmployeeEventRecord>,
    cancelled: Vec<CancelledEventRecord>,
    idempotency: HashMap<String, Uuid>,
}

impl ChainState {
    fn replayed_record(&self, key: Option<&str>) -> Option<&EmployeeEventRecord> {
        let id = self.idempotency.get(key?)?;
        self.records.iter().find(|r| &r.id == id)
    }
}

pub struct EventStore {
    chains: Mutex<HashMap<ChainKey, Arc<Mutex<ChainState>>>>,
    registry: EventCodeRegistry,
    journal: SharedJournal,
}

impl EventStore {
    pub fn new(registry: EventCodeRegistry, journal: SharedJournal) -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
            registry,
            journal,
        }
    }

    pub fn registry(&self) -> &EventCodeRegistry {
        &self.registry
    }

    fn chain(&self, employee: &EmployeeId, code: &str) -> Arc<Mutex<ChainState>> {
        let mut chains = self.chains.lock();
        chains
            .entry((employee.clone(), code.to_string()))
            .or_default()
            .clone()
    }

    fn existing_chain(&self, employee: &EmployeeId, code: &str) -> Option<Arc<Mutex<ChainState>>> {
        self.chains
            .lock()
            .get(&(employee.clone(), code.to_string()))
            .cloned()
    }

    /// Close the active record at `valid_from` and append the new one.
    pub fn record_event(&self, request: RecordEventRequest) -> Result<EmployeeEventRecord> {
        self.registry.validate(&request.event_code, &request.payload)?;

        let chain = self.chain(&request.employee_id, &request.event_code);
        let mut state = chain.lock();

        if let Some(existing) = state.replayed_record(request.idempotency_key.as_deref()) {
            debug!(
                employee = %request.employee_id,
                event_code = %request.event_code,
                record_id = %existing.id,
                "idempotent retry, returning original record"
            );
            return Ok(existing.clone());
        }

        let record = EmployeeEventRecord {
            id: Uuid::new_v4(),
            employee_id: request.employee_id.clone(),
            event_code: request.event_code.clone(),
            valid_from: request.valid_from,
            valid_to: None,
            payload: request.payload,
            recorded_by: request.recorded_by,
        };
        let next = append_record(&state.records, record.clone())?;

        self.journal.lock().append(&JournalEntry::EventRecorded {
            record: record.clone(),
            idempotency_key: request.idempotency_key.clone(),
        })?;
        state.records = next;
        if let Some(key) = request.idempotency_key {
            state.idempotency.insert(key, record.id);
        }

        info!(
            employee = %record.employee_id,
            event_code = %record.event_code,
            valid_from = %record.valid_from,
            record_id = %record.id,
            "employee event recorded"
        );
        Ok(record)
    }

    /// The active record only, or the whole chain oldest first.
    pub fn list_events(
        &self,
        employee: &EmployeeId,
        code: &str,
        include_history: bool,
    ) -> CoreResult<Vec<EmployeeEventRecord>> {
        self.registry.schema(code)?;
        let Some(chain) = self.existing_chain(employee, code) else {
            return Ok(Vec::new());
        };
        let state = chain.lock();
        if include_history {
            Ok(state.records.clone())
        } else {
            Ok(active_record(&state.records).cloned().into_iter().collect())
        }
    }

    /// Remove the active record and reopen its predecessor. The removed
    /// record moves to the audit trail. Returns the reopened record.
    pub fn cancel_active(
        &self,
        employee: &EmployeeId,
        code: &str,
    ) -> Result<Option<EmployeeEventRecord>> {
        self.registry.schema(code)?;
        let chain = self
            .existing_chain(employee, code)
            .ok_or_else(|| no_active(employee, code))?;
        let mut state = chain.lock();

        let plan = cancel_active(&state.records).map_err(|_| no_active(employee, code))?;
        let sequence = self.journal.lock().append(&JournalEntry::EventCancelled {
            employee_id: employee.clone(),
            event_code: code.to_string(),
            record_id: plan.removed.id,
        })?;

        info!(
            employee = %employee,
            event_code = %code,
            cancelled = %plan.removed.id,
            reopened = ?plan.reopened.as_ref().map(|r| r.id),
            "active event cancelled"
        );
        state.records = plan.chain;
        let removed_id = plan.removed.id;
        state.idempotency.retain(|_, id| *id != removed_id);
        state.cancelled.push(CancelledEventRecord {
            record: plan.removed,
            cancelled_at: sequence,
            reopened: plan.reopened.as_ref().map(|r| r.id),
        });
        Ok(plan.reopened)
    }

    /// Audit trail of cancelled records, oldest cancellation first.
    pub fn cancelled_events(&self, employee: &EmployeeId, code: &str) -> CoreResult<Vec<CancelledEventRecord>> {
        self.registry.schema(code)?;
        Ok(self
            .existing_chain(employee, code)
            .map(|chain| chain.lock().cancelled.clone())
            .unwrap_or_default())
    }

    /// The record whose interval contains `as_of`, if any.
    pub fn record_as_of(
        &self,
        employee: &EmployeeId,
        code: &str,
        as_of: NaiveDate,
    ) -> CoreResult<Option<EmployeeEventRecord>> {
        self.registry.schema(code)?;
        Ok(self
            .existing_chain(employee, code)
            .and_then(|chain| resolve_as_of(&chain.lock().records, as_of).cloned()))
    }

    /// Every non-empty chain, ordered by employee then code.
    pub fn chains(&self) -> Vec<ChainSnapshot> {
        let handles: Vec<(ChainKey, Arc<Mutex<ChainState>>)> = self
            .chains
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut views: Vec<ChainSnapshot> = handles
            .into_iter()
            .filter_map(|((employee_id, event_code), chain)| {
                let state = chain.lock();
                if state.records.is_empty() && state.cancelled.is_empty() {
                    return None;
                }
                Some(ChainSnapshot {
                    employee_id,
                    event_code,
                    records: state.records.clone(),
                    cancelled: state.cancelled.clone(),
                })
            })
            .collect();
        views.sort_by(|a, b| {
            (&a.employee_id, &a.event_code).cmp(&(&b.employee_id, &b.event_code))
        });
        views
    }

    // -----------------------------------------------------------------------
    // Replay
    // -----------------------------------------------------------------------

    pub(crate) fn replay_recorded(
        &self,
        record: EmployeeEventRecord,
        idempotency_key: Option<String>,
    ) -> CoreResult<()> {
        self.registry.validate(&record.event_code, &record.payload)?;
        let chain = self.chain(&record.employee_id, &record.event_code);
        let mut state = chain.lock();
        let id = record.id;
        state.records = append_record(&state.records, record)?;
        if let Some(key) = idempotency_key {
            state.idempotency.insert(key, id);
        }
        Ok(())
    }

    pub(crate) fn replay_cancelled(
        &self,
        employee: &EmployeeId,
        code: &str,
        record_id: Uuid,
        sequence: u64,
    ) -> CoreResult<()> {
        let chain = self
            .existing_chain(employee, code)
            .ok_or_else(|| no_active(employee, code))?;
        let mut state = chain.lock();
        let plan = cancel_active(&state.records)?;
        if plan.removed.id != record_id {
            return Err(CoreError::state_conflict(format!(
                "journal cancels {} but the active record is {}",
                record_id, plan.removed.id
            )));
        }
        state.records = plan.chain;
        state.idempotency.retain(|_, id| *id != record_id);
        state.cancelled.push(CancelledEventRecord {
            record: plan.removed,
            cancelled_at: sequence,
            reopened: plan.reopened.map(|r| r.id),
        });
        Ok(())
    }
}

fn no_active(employee: &EmployeeId, code: &str) -> CoreError {
    CoreError::not_found("active event record", format!("{}/{}", employee, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::journal::Journal;

    fn store() -> EventStore {
        EventStore::new(EventCodeRegistry::default(), Journal::in_memory().shared())
    }

    fn employee() -> EmployeeId {
        EmployeeId::new("e-1").unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grade(from: NaiveDate, grade: &str) -> RecordEventRequest {
        RecordEventRequest::new(employee(), "203", from, json!({ "grade": grade }))
    }

    #[test]
    fn test_record_and_list() {
        let store = store();
        store.record_event(grade(date(2024, 1, 1), "A")).unwrap();
        store.record_event(grade(date(2024, 6, 1), "B")).unwrap();

        let active = store.list_events(&employee(), "203", false).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].payload["grade"], "B");

        let history = store.list_events(&employee(), "203", true).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].valid_to, Some(date(2024, 6, 1)));
    }

    #[test]
    fn test_unknown_code_and_bad_payload_rejected() {
        let store = store();
        let req = RecordEventRequest::new(employee(), "999", date(2024, 1, 1), json!({}));
        assert_eq!(store.record_event(req).unwrap_err().kind(), "validation");

        let req = RecordEventRequest::new(employee(), "218", date(2024, 1, 1), json!({}));
        assert_eq!(store.record_event(req).unwrap_err().kind(), "validation");
        assert!(store.list_events(&employee(), "218", true).unwrap().is_empty());
    }

    #[test]
    fn test_idempotent_retry_returns_original() {
        let store = store();
        let first = store
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-1"))
            .unwrap();
        let retry = store
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-1"))
            .unwrap();
        assert_eq!(first, retry);
        assert_eq!(store.list_events(&employee(), "203", true).unwrap().len(), 1);
    }

    #[test]
    fn test_idempotency_key_lapses_after_cancel() {
        let store = store();
        let first = store
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-1"))
            .unwrap();
        store.cancel_active(&employee(), "203").unwrap();
        let again = store
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-1"))
            .unwrap();
        assert_ne!(first.id, again.id);
    }

    fn keys(store: &EventStore) -> Vec<String> {
        let chain = store.existing_chain(&employee(), "203").unwrap();
        let mut keys: Vec<String> = chain.lock().idempotency.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_cancel_drops_key_of_removed_record() {
        let store = store();
        store
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-a"))
            .unwrap();
        store
            .record_event(grade(date(2024, 6, 1), "B").idempotency_key("req-b"))
            .unwrap();
        assert_eq!(keys(&store), vec!["req-a", "req-b"]);

        store.cancel_active(&employee(), "203").unwrap();
        assert_eq!(keys(&store), vec!["req-a"]);
    }

    #[test]
    fn test_replayed_cancel_drops_key_of_removed_record() {
        let live = store();
        let a = live
            .record_event(grade(date(2024, 1, 1), "A").idempotency_key("req-a"))
            .unwrap();
        let b = live
            .record_event(grade(date(2024, 6, 1), "B").idempotency_key("req-b"))
            .unwrap();

        let replayed = store();
        replayed.replay_recorded(a, Some("req-a".into())).unwrap();
        replayed.replay_recorded(b.clone(), Some("req-b".into())).unwrap();
        replayed.replay_cancelled(&employee(), "203", b.id, 3).unwrap();
        assert_eq!(keys(&replayed), vec!["req-a"]);

        let again = replayed
            .record_event(grade(date(2024, 6, 1), "B").idempotency_key("req-b"))
            .unwrap();
        assert_ne!(again.id, b.id);
    }

    #[test]
    fn test_cancel_keeps_audit_trail() {
        let store = store();
        let a = store.record_event(grade(date(2024, 1, 1), "A")).unwrap();
        let b = store.record_event(grade(date(2024, 6, 1), "B")).unwrap();

        let reopened = store.cancel_active(&employee(), "203").unwrap().unwrap();
        assert_eq!(reopened.id, a.id);
        assert!(reopened.is_active());

        let trail = store.cancelled_events(&employee(), "203").unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].record.id, b.id);
        assert_eq!(trail[0].reopened, Some(a.id));
        assert_eq!(trail[0].cancelled_at, 3);
    }

    #[test]
    fn test_cancel_without_active_is_not_found() {
        let store = store();
        assert_eq!(store.cancel_active(&employee(), "203").unwrap_err().kind(), "not_found");
        store.record_event(grade(date(2024, 1, 1), "A")).unwrap();
        assert!(store.cancel_active(&employee(), "203").unwrap().is_none());
        assert_eq!(store.cancel_active(&employee(), "203").unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_record_as_of() {
        let store = store();
        store.record_event(grade(date(2024, 1, 1), "A")).unwrap();
        store.record_event(grade(date(2024, 6, 1), "B")).unwrap();
        let found = store.record_as_of(&employee(), "203", date(2024, 3, 1)).unwrap().unwrap();
        assert_eq!(found.payload["grade"], "A");
        assert!(store.record_as_of(&employee(), "203", date(2020, 1, 1)).unwrap().is_none());
    }
}
