//! Temporal queries over the event store.
//!
//! Each chain is read under its own lock, so a projection over several
//! codes is consistent per code, not across codes.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use hr_kernel::domain::EmployeeEventRecord;
use hr_kernel::error::{CoreError, Result};
use hr_kernel::ids::EmployeeId;

use crate::event_store::EventStore;

/// Flat view of an employee across several event codes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSnapshot {
    pub employee_id: EmployeeId,
    /// `None` for the current state.
    pub as_of: Option<NaiveDate>,
    pub records: BTreeMap<String, EmployeeEventRecord>,
    /// Payload fields merged in request order; a later code wins a clash.
    pub fields: Map<String, Value>,
    pub missing: Vec<String>,
}

pub struct QueryEngine {
    events: Arc<EventStore>,
}

impl QueryEngine {
    pub fn new(events: Arc<EventStore>) -> Self {
        Self { events }
    }

    pub fn resolve_as_of(
        &self,
        employee: &EmployeeId,
        code: &str,
        as_of: NaiveDate,
    ) -> Result<EmployeeEventRecord> {
        self.events
            .record_as_of(employee, code, as_of)?
            .ok_or_else(|| {
                CoreError::not_found("event record", format!("{}/{} as of {}", employee, code, as_of))
            })
    }

    pub fn project_current_state(&self, employee: &EmployeeId, codes: &[&str]) -> Result<ProfileSnapshot> {
        self.project(employee, codes, None)
    }

    pub fn project_as_of(
        &self,
        employee: &EmployeeId,
        codes: &[&str],
        as_of: NaiveDate,
    ) -> Result<ProfileSnapshot> {
        self.project(employee, codes, Some(as_of))
    }

    fn project(
        &self,
        employee: &EmployeeId,
        codes: &[&str],
        as_of: Option<NaiveDate>,
    ) -> Result<ProfileSnapshot> {
        let mut snapshot = ProfileSnapshot {
            employee_id: employee.clone(),
            as_of,
            records: BTreeMap::new(),
            fields: Map::new(),
            missing: Vec::new(),
        };

        // Repeated codes resolve once, at their first position.
        let mut seen = BTreeSet::new();
        for code in codes.iter().filter(|code| seen.insert(**code)) {
            let record = match as_of {
                Some(date) => self.events.record_as_of(employee, code, date)?,
                None => self
                    .events
                    .list_events(employee, code, false)?
                    .into_iter()
                    .next(),
            };
            let Some(record) = record else {
                snapshot.missing.push(code.to_string());
                continue;
            };

            if let Some(payload) = record.payload.as_object() {
                for (field, value) in payload {
                    if snapshot.fields.insert(field.clone(), value.clone()).is_some() {
                        debug!(employee = %employee, event_code = %code, field = %field, "projection field overridden");
                    }
                }
            }
            snapshot.records.insert(code.to_string(), record);
        }

        Ok(snapshot)
    }
}
