/// Event chain transitions.
///
/// A chain holds every record of one (employee, code), oldest first. Only
/// the head is ever touched: closed by an append, or removed by a cancel
/// that reopens its predecessor. Each transition returns a new chain that
/// has already passed `validate_chain`.

use chrono::NaiveDate;

use crate::domain::EmployeeEventRecord;
use crate::error::{CoreError, Result};
use crate::invariants::validate_chain;

/// Outcome of a cancellation.
#[derive(Debug, Clone, PartialEq)]
pub struct CancelPlan {
    pub chain: Vec<EmployeeEventRecord>,
    pub removed: EmployeeEventRecord,
    pub reopened: Option<EmployeeEventRecord>,
}

pub fn active_record(chain: &[EmployeeEventRecord]) -> Option<&EmployeeEventRecord> {
    chain.last().filter(|r| r.is_active())
}

/// Close the active record at `record.valid_from` and append `record`.
pub fn append_record(
    chain: &[EmployeeEventRecord],
    record: EmployeeEventRecord,
) -> Result<Vec<EmployeeEventRecord>> {
    if record.valid_to.is_some() {
        return Err(CoreError::validation("valid_to", "new records start active"));
    }

    let mut next = chain.to_vec();
    if let Some(head) = next.last_mut() {
        if head.employee_id != record.employee_id || head.event_code != record.event_code {
            return Err(CoreError::validation(
                "event_code",
                "record does not belong to this chain",
            ));
        }
        if record.valid_from <= head.valid_from {
            return Err(CoreError::TemporalOrder {
                event_code: record.event_code.clone(),
                requested: record.valid_from,
                active_from: head.valid_from,
            });
        }
        head.valid_to = Some(record.valid_from);
    }
    next.push(record);

    validate_chain(&next)?;
    Ok(next)
}

/// Remove the active record and reopen its predecessor.
pub fn cancel_active(chain: &[EmployeeEventRecord]) -> Result<CancelPlan> {
    let Some(head) = active_record(chain) else {
        return Err(CoreError::not_found("active event record", "chain is empty"));
    };
    let removed = head.clone();

    let mut next = chain[..chain.len() - 1].to_vec();
    let reopened = next.last_mut().map(|previous| {
        previous.valid_to = None;
        previous.clone()
    });

    validate_chain(&next)?;
    Ok(CancelPlan {
        chain: next,
        removed,
        reopened,
    })
}

/// The unique record whose `[valid_from, valid_to)` contains `as_of`.
pub fn resolve_as_of(chain: &[EmployeeEventRecord], as_of: NaiveDate) -> Option<&EmployeeEventRecord> {
    let idx = chain.partition_point(|r| r.valid_from <= as_of);
    if idx == 0 {
        return None;
    }
    chain.get(idx - 1).filter(|r| r.covers(as_of))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::EmployeeId;
    use serde_json::json;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn grade(from: NaiveDate, grade: &str) -> EmployeeEventRecord {
        EmployeeEventRecord {
            id: Uuid::new_v4(),
            employee_id: EmployeeId::new("e-1").unwrap(),
            event_code: "203".to_string(),
            valid_from: from,
            valid_to: None,
            payload: json!({ "grade": grade }),
            recorded_by: None,
        }
    }

    fn scenario_c() -> Vec<EmployeeEventRecord> {
        let chain = append_record(&[], grade(date(2024, 1, 1), "A")).unwrap();
        append_record(&chain, grade(date(2024, 6, 1), "B")).unwrap()
    }

    #[test]
    fn test_append_closes_predecessor() {
        let chain = scenario_c();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].valid_to, Some(date(2024, 6, 1)));
        assert!(chain[1].is_active());
        assert_eq!(active_record(&chain).unwrap().payload["grade"], "B");
    }

    #[test]
    fn test_append_before_active_start_rejected() {
        let chain = scenario_c();
        let err = append_record(&chain, grade(date(2023, 1, 1), "Z")).unwrap_err();
        assert_eq!(err.kind(), "temporal_order");

        // Same start date is not strictly after either.
        let err = append_record(&chain, grade(date(2024, 6, 1), "Z")).unwrap_err();
        assert_eq!(err.kind(), "temporal_order");
    }

    #[test]
    fn test_append_rejects_foreign_record() {
        let chain = scenario_c();
        let mut other = grade(date(2025, 1, 1), "C");
        other.event_code = "201".to_string();
        assert_eq!(append_record(&chain, other).unwrap_err().kind(), "validation");
    }

    #[test]
    fn test_cancel_reopens_predecessor() {
        let chain = scenario_c();
        let plan = cancel_active(&chain).unwrap();
        assert_eq!(plan.removed.payload["grade"], "B");
        let reopened = plan.reopened.unwrap();
        assert_eq!(reopened.payload["grade"], "A");
        assert_eq!(reopened.valid_to, None);
        assert_eq!(plan.chain.len(), 1);
    }

    #[test]
    fn test_cancel_last_record_empties_chain() {
        let chain = append_record(&[], grade(date(2024, 1, 1), "A")).unwrap();
        let plan = cancel_active(&chain).unwrap();
        assert!(plan.chain.is_empty());
        assert!(plan.reopened.is_none());
    }

    #[test]
    fn test_cancel_empty_chain_not_found() {
        assert_eq!(cancel_active(&[]).unwrap_err().kind(), "not_found");
    }

    #[test]
    fn test_resolve_as_of_boundaries() {
        let chain = scenario_c();
        assert!(resolve_as_of(&chain, date(2023, 12, 31)).is_none());
        assert_eq!(resolve_as_of(&chain, date(2024, 1, 1)).unwrap().payload["grade"], "A");
        assert_eq!(resolve_as_of(&chain, date(2024, 5, 31)).unwrap().payload["grade"], "A");
        assert_eq!(resolve_as_of(&chain, date(2024, 6, 1)).unwrap().payload["grade"], "B");
        assert_eq!(resolve_as_of(&chain, date(2099, 1, 1)).unwrap().payload["grade"], "B");
    }
}
