//! Per-tenant unit number sequencer.
//!
//! Each tenant has its own counter behind its own mutex, holding the highest
//! number issued so far. `with_next` keeps that mutex for the whole
//! reserve + insert, so numbers are gap-free and ordered by creation within
//! a tenant while other tenants proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use hr_kernel::error::{CoreError, Result};
use hr_kernel::ids::{format_unit_number, next_unit_value, parse_unit_number, TenantId};

pub struct UnitSequencer {
    width: usize,
    counters: Mutex<HashMap<TenantId, Arc<Mutex<u64>>>>,
}

impl UnitSequencer {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            counters: Mutex::new(HashMap::new()),
        }
    }

    fn counter(&self, tenant: &TenantId) -> Arc<Mutex<u64>> {
        let mut counters = self.counters.lock();
        counters
            .entry(tenant.clone())
            .or_insert_with(|| Arc::new(Mutex::new(0)))
            .clone()
    }

    /// Reserve the next number and hand it to `insert`. The number is only
    /// consumed if `insert` succeeds.
    pub fn with_next<T, E: From<CoreError>>(
        &self,
        tenant: &TenantId,
        insert: impl FnOnce(String) -> std::result::Result<T, E>,
    ) -> std::result::Result<T, E> {
        let counter = self.counter(tenant);
        let mut issued = counter.lock();
        let next = next_unit_value(*issued)?;
        let value = insert(format_unit_number(next, self.width))?;
        *issued = next;
        Ok(value)
    }

    /// Raise the counter to at least `unit_number`. Used by replay.
    pub fn observe(&self, tenant: &TenantId, unit_number: &str) -> Result<()> {
        let value = parse_unit_number(unit_number)?;
        let counter = self.counter(tenant);
        let mut issued = counter.lock();
        if value > *issued {
            *issued = value;
        }
        Ok(())
    }

    /// Highest number issued for `tenant`, 0 if none.
    pub fn current(&self, tenant: &TenantId) -> u64 {
        let counters = self.counters.lock();
        counters.get(tenant).map(|c| *c.lock()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(seq: &UnitSequencer, tenant: &TenantId) -> String {
        seq.with_next(tenant, |number| Ok::<_, CoreError>(number)).unwrap()
    }

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[test]
    fn test_numbers_are_padded_and_sequential() {
        let seq = UnitSequencer::new(3);
        let t = tenant("t-1");
        assert_eq!(issue(&seq, &t), "001");
        assert_eq!(issue(&seq, &t), "002");
        assert_eq!(issue(&seq, &tenant("t-2")), "001");
    }

    #[test]
    fn test_failed_insert_does_not_consume() {
        let seq = UnitSequencer::new(3);
        let t = tenant("t-1");
        let failed: Result<String> = seq.with_next(&t, |_| Err(CoreError::validation("name", "short")));
        assert!(failed.is_err());
        assert_eq!(issue(&seq, &t), "001");
    }

    #[test]
    fn test_observe_raises_counter() {
        let seq = UnitSequencer::new(3);
        let t = tenant("t-1");
        seq.observe(&t, "007").unwrap();
        seq.observe(&t, "003").unwrap();
        assert_eq!(seq.current(&t), 7);
        assert_eq!(issue(&seq, &t), "008");
        assert!(seq.observe(&t, "x1").is_err());
    }

    #[test]
    fn test_overflowing_width_is_not_truncated() {
        let seq = UnitSequencer::new(2);
        let t = tenant("t-1");
        seq.observe(&t, "99").unwrap();
        assert_eq!(issue(&seq, &t), "100");
    }
}
